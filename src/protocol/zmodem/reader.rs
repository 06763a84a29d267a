use serde::Deserialize;

use crate::com::{Com, ComError};

use super::{
    constants::*,
    crc::{crc16_update, CRC_START_XMODEM},
    error::{TransmissionError, TransmissionResult},
    escape::{read_zdle_byte, read_zdle_token, EscapeMode, FrameEnd, ZToken},
    header::{Header, HeaderFormat},
    hex::hex_to_byte,
};

/// Which bytes the CRC of a data subpacket covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataCrc {
    /// data bytes followed by the ZCRCx byte, what every ZMODEM sender does
    #[default]
    IncludeFrameEnd,
    DataOnly,
}

/// Reads the next header, skipping everything up to ZDLE + header type.
///
/// The CRC is checked before the header is returned.
pub fn read_header(com: &mut dyn Com) -> TransmissionResult<Header> {
    let format = loop {
        match read_zdle_token(com, EscapeMode::AwaitHeader)? {
            ZToken::HeaderStart(format) => break format,
            // padding, line noise or the tail of an interrupted subpacket
            ZToken::Byte(_) | ZToken::FrameEnd(_) => {}
        }
    };

    let header = match format {
        HeaderFormat::Hex => read_hex_header(com)?,
        HeaderFormat::Bin16 => read_bin16_header(com)?,
        HeaderFormat::Bin32 => return Err(TransmissionError::Unsupported("BIN32 headers")),
    };
    log::debug!("recv {header}");
    Ok(header)
}

fn read_hex_header(com: &mut dyn Com) -> TransmissionResult<Header> {
    let mut raw = [0u8; HEADER_LEN];
    for b in &mut raw {
        let hi = read_zdle_byte(com)?;
        let lo = read_zdle_byte(com)?;
        *b = hex_to_byte(hi, lo)?;
    }
    let header = Header::from_bytes(&raw);
    header.check_crc()?;
    read_crlf(com)?;
    Ok(header)
}

fn read_bin16_header(com: &mut dyn Com) -> TransmissionResult<Header> {
    let mut raw = [0u8; HEADER_LEN];
    for b in &mut raw {
        *b = read_zdle_byte(com)?;
    }
    let header = Header::from_bytes(&raw);
    header.check_crc()?;
    Ok(header)
}

// CR is optional, LF is not. Both may carry the parity bit.
fn read_crlf(com: &mut dyn Com) -> TransmissionResult<()> {
    let mut c = com.read_u8()?;
    if c & 0x7F == CR {
        c = com.read_u8()?;
    }
    if c & 0x7F == LF {
        Ok(())
    } else {
        Err(TransmissionError::Corrupted("hex header without CR LF"))
    }
}

/// Reads one data subpacket of at most `max_len` bytes together with the
/// frame end that terminated it.
pub fn read_data_block(
    com: &mut dyn Com,
    max_len: usize,
    data_crc: DataCrc,
) -> TransmissionResult<(Vec<u8>, FrameEnd)> {
    let mut data = Vec::with_capacity(max_len.min(DEFAULT_BLOCK_BUFFER_LEN));
    let mut crc = CRC_START_XMODEM;
    let end = loop {
        match read_zdle_token(com, EscapeMode::Stream)? {
            ZToken::Byte(b) => {
                if data.len() >= max_len {
                    return Err(TransmissionError::OutOfSpace {
                        needed: data.len() + 1,
                        available: max_len,
                    });
                }
                crc = crc16_update(crc, b);
                data.push(b);
            }
            ZToken::FrameEnd(end) => break end,
            ZToken::HeaderStart(_) => {
                return Err(TransmissionError::Corrupted("header start inside subpacket"))
            }
        }
    };

    if data_crc == DataCrc::IncludeFrameEnd {
        crc = crc16_update(crc, end.to_byte());
    }
    let crc1 = read_zdle_byte(com)?;
    let crc2 = read_zdle_byte(com)?;
    let check_crc = u16::from_be_bytes([crc1, crc2]);
    if crc != check_crc {
        return Err(TransmissionError::BadCrc {
            expected: crc,
            actual: check_crc,
        });
    }
    Ok((data, end))
}

/// Waits for the session start sequence in the raw byte stream.
/// Timeouts are not an error here, the sender may not have been started yet.
pub fn await_handshake(com: &mut dyn Com, pattern: &[u8]) -> TransmissionResult<()> {
    if pattern.is_empty() {
        return Ok(());
    }
    let mut window = Vec::with_capacity(pattern.len());
    loop {
        match com.read_u8() {
            Ok(b) => {
                if window.len() == pattern.len() {
                    window.remove(0);
                }
                window.push(b);
                if window == pattern {
                    return Ok(());
                }
            }
            Err(ComError::Timeout) => continue,
            Err(err) => return Err(err.into()),
        }
    }
}
