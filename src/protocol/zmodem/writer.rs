use crate::com::Com;

use super::{
    constants::HEADER_PREAMBLE,
    error::{TransmissionError, TransmissionResult},
    escape::append_zdle_encoded,
    header::{Header, HeaderFormat, ZFrameType},
};

/// Sends headers and remembers the exact bytes of the last one,
/// a retransmission repeats them verbatim.
pub struct HeaderWriter {
    format: HeaderFormat,
    last_sent: Option<Vec<u8>>,
}

impl HeaderWriter {
    pub fn new(format: HeaderFormat) -> Self {
        Self {
            format,
            last_sent: None,
        }
    }

    pub fn last_sent(&self) -> Option<&[u8]> {
        self.last_sent.as_deref()
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }

    /// Preamble + encoded header, ready for the line. The CRC is (re)computed here.
    pub fn build(&self, header: &Header) -> TransmissionResult<Vec<u8>> {
        let header = header.with_crc();
        let mut v = HEADER_PREAMBLE.to_vec();
        match self.format {
            HeaderFormat::Hex => v.extend(header.encode(HeaderFormat::Hex)?),
            format => {
                let encoded = header.encode(format)?;
                v.push(format.marker());
                append_zdle_encoded(&mut v, &encoded);
            }
        }
        Ok(v)
    }

    pub fn send_header(&mut self, com: &mut dyn Com, header: &Header) -> TransmissionResult<()> {
        let bytes = self.build(header)?;
        log::debug!("send {header}");
        com.send(&bytes)?;
        self.last_sent = Some(bytes);
        Ok(())
    }

    pub fn send_flags(
        &mut self,
        com: &mut dyn Com,
        frame_type: ZFrameType,
        f3: u8,
        f2: u8,
        f1: u8,
        f0: u8,
    ) -> TransmissionResult<()> {
        self.send_header(com, &Header::from_flags(frame_type, f3, f2, f1, f0))
    }

    pub fn send_number(
        &mut self,
        com: &mut dyn Com,
        frame_type: ZFrameType,
        number: u32,
    ) -> TransmissionResult<()> {
        self.send_header(com, &Header::from_number(frame_type, number))
    }

    pub fn resend_last_header(&mut self, com: &mut dyn Com) -> TransmissionResult<()> {
        let Some(bytes) = &self.last_sent else {
            return Err(TransmissionError::NoPriorHeader);
        };
        log::debug!("resend last header ({} bytes)", bytes.len());
        com.send(bytes)?;
        Ok(())
    }
}
