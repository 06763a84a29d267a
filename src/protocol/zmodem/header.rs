use std::fmt::Display;

use serde::Deserialize;

use super::{
    constants::{frame_types, CR, HEADER_LEN, HEX_HEADER_LEN, LF, LF_0X80, ZBIN, ZBIN32, ZHEX},
    crc::{crc16_update, CRC_START_XMODEM},
    error::{TransmissionError, TransmissionResult},
    hex::{byte_to_hex, hex_to_byte},
};

/// Wire encoding of a header, selected by the byte following ZDLE.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderFormat {
    Bin16,
    Hex,
    /// Recognized, never decoded.
    Bin32,
}

impl HeaderFormat {
    pub fn from_marker(b: u8) -> Option<Self> {
        match b {
            ZBIN => Some(HeaderFormat::Bin16),
            ZHEX => Some(HeaderFormat::Hex),
            ZBIN32 => Some(HeaderFormat::Bin32),
            _ => None,
        }
    }

    pub fn marker(self) -> u8 {
        match self {
            HeaderFormat::Bin16 => ZBIN,
            HeaderFormat::Hex => ZHEX,
            HeaderFormat::Bin32 => ZBIN32,
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ZFrameType {
    /// Request receive init (s->r)
    RQInit,
    /// Receive init (r->s)
    RInit,
    /// Send init sequence (optional) (s->r)
    SInit,
    /// ACK to above (r->s)
    Ack,
    /// File name from sender (s->r)
    File,
    /// To sender: skip this file (r->s)
    Skip,
    /// Last packet was garbled
    Nak,
    /// Abort batch transfers
    Abort,
    /// Finish session
    Fin,
    /// Resume data trans at this position (r->s)
    RPos,
    /// Data packet(s) follow (s->r)
    Data,
    /// End of file (s->r)
    Eof,
    /// Fatal Read or Write error Detected
    FErr,
    /// Request for file CRC and response
    Crc,
    /// Receiver's Challenge
    Challenge,
    /// Request is complete
    Compl,
    /// Other end canned session with CAN*5
    Can,
    /// Request for free bytes on filesystem
    FreeCnt,
    /// Command from sending program
    Command,
    /// Output to standard error, data follows
    StdErr,
    Unknown(u8),
}

impl From<u8> for ZFrameType {
    fn from(ftype: u8) -> Self {
        match ftype {
            frame_types::ZRQINIT => ZFrameType::RQInit,
            frame_types::ZRINIT => ZFrameType::RInit,
            frame_types::ZSINIT => ZFrameType::SInit,
            frame_types::ZACK => ZFrameType::Ack,
            frame_types::ZFILE => ZFrameType::File,
            frame_types::ZSKIP => ZFrameType::Skip,
            frame_types::ZNAK => ZFrameType::Nak,
            frame_types::ZABORT => ZFrameType::Abort,
            frame_types::ZFIN => ZFrameType::Fin,
            frame_types::ZRPOS => ZFrameType::RPos,
            frame_types::ZDATA => ZFrameType::Data,
            frame_types::ZEOF => ZFrameType::Eof,
            frame_types::ZFERR => ZFrameType::FErr,
            frame_types::ZCRC => ZFrameType::Crc,
            frame_types::ZCHALLENGE => ZFrameType::Challenge,
            frame_types::ZCOMPL => ZFrameType::Compl,
            frame_types::ZCAN => ZFrameType::Can,
            frame_types::ZFREECNT => ZFrameType::FreeCnt,
            frame_types::ZCOMMAND => ZFrameType::Command,
            frame_types::ZSTDERR => ZFrameType::StdErr,
            unk => ZFrameType::Unknown(unk),
        }
    }
}

impl From<ZFrameType> for u8 {
    fn from(ftype: ZFrameType) -> Self {
        match ftype {
            ZFrameType::RQInit => frame_types::ZRQINIT,
            ZFrameType::RInit => frame_types::ZRINIT,
            ZFrameType::SInit => frame_types::ZSINIT,
            ZFrameType::Ack => frame_types::ZACK,
            ZFrameType::File => frame_types::ZFILE,
            ZFrameType::Skip => frame_types::ZSKIP,
            ZFrameType::Nak => frame_types::ZNAK,
            ZFrameType::Abort => frame_types::ZABORT,
            ZFrameType::Fin => frame_types::ZFIN,
            ZFrameType::RPos => frame_types::ZRPOS,
            ZFrameType::Data => frame_types::ZDATA,
            ZFrameType::Eof => frame_types::ZEOF,
            ZFrameType::FErr => frame_types::ZFERR,
            ZFrameType::Crc => frame_types::ZCRC,
            ZFrameType::Challenge => frame_types::ZCHALLENGE,
            ZFrameType::Compl => frame_types::ZCOMPL,
            ZFrameType::Can => frame_types::ZCAN,
            ZFrameType::FreeCnt => frame_types::ZFREECNT,
            ZFrameType::Command => frame_types::ZCOMMAND,
            ZFrameType::StdErr => frame_types::ZSTDERR,
            ZFrameType::Unknown(ftype) => ftype,
        }
    }
}

/// A zmodem header: frame type, 4 flag/position bytes and the CRC-16 over both.
///
/// `data` is kept in wire order, which is `f3 f2 f1 f0` when read as flags
/// and `p0 p1 p2 p3` (little endian) when read as a position.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Header {
    pub frame_type: ZFrameType,
    pub data: [u8; 4],
    pub crc: u16,
}

impl Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.frame_type {
            ZFrameType::RPos
            | ZFrameType::Eof
            | ZFrameType::Ack
            | ZFrameType::FreeCnt
            | ZFrameType::Data => write!(
                f,
                "[{:?} header number = {}]",
                self.frame_type,
                self.number()
            ),
            ZFrameType::Crc | ZFrameType::Challenge => write!(
                f,
                "[{:?} header number = x{:08X}]",
                self.frame_type,
                self.number()
            ),
            _ => write!(
                f,
                "[{:?} header flags = x{:02X}, x{:02X}, x{:02X}, x{:02X}]",
                self.frame_type,
                self.f3(),
                self.f2(),
                self.f1(),
                self.f0()
            ),
        }
    }
}

impl Header {
    pub fn empty(frame_type: ZFrameType) -> Self {
        Self {
            frame_type,
            data: [0, 0, 0, 0],
            crc: 0,
        }
    }

    pub fn from_flags(frame_type: ZFrameType, f3: u8, f2: u8, f1: u8, f0: u8) -> Self {
        Self {
            frame_type,
            data: [f3, f2, f1, f0],
            crc: 0,
        }
    }

    pub fn from_number(frame_type: ZFrameType, number: u32) -> Self {
        Self {
            frame_type,
            data: u32::to_le_bytes(number),
            crc: 0,
        }
    }

    pub fn f0(&self) -> u8 {
        self.data[3]
    }

    pub fn f1(&self) -> u8 {
        self.data[2]
    }

    pub fn f2(&self) -> u8 {
        self.data[1]
    }

    pub fn f3(&self) -> u8 {
        self.data[0]
    }

    pub fn number(&self) -> u32 {
        u32::from_le_bytes(self.data)
    }

    /// The CRC covered bytes in wire order: type, f3, f2, f1, f0.
    pub fn body(&self) -> [u8; 5] {
        [
            self.frame_type.into(),
            self.data[0],
            self.data[1],
            self.data[2],
            self.data[3],
        ]
    }

    pub fn compute_crc(&self) -> u16 {
        self.body()
            .iter()
            .fold(CRC_START_XMODEM, |crc, b| crc16_update(crc, *b))
    }

    pub fn calc_crc(&mut self) {
        self.crc = self.compute_crc();
    }

    pub fn with_crc(mut self) -> Self {
        self.calc_crc();
        self
    }

    pub fn check_crc(&self) -> TransmissionResult<()> {
        let crc = self.compute_crc();
        if crc == self.crc {
            Ok(())
        } else {
            Err(TransmissionError::BadCrc {
                expected: crc,
                actual: self.crc,
            })
        }
    }

    /// The 7 header bytes as they go over the line, before any escaping.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let body = self.body();
        let [crc1, crc2] = self.crc.to_be_bytes();
        [body[0], body[1], body[2], body[3], body[4], crc1, crc2]
    }

    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Self {
        Self {
            frame_type: ZFrameType::from(bytes[0]),
            data: [bytes[1], bytes[2], bytes[3], bytes[4]],
            crc: u16::from_be_bytes([bytes[5], bytes[6]]),
        }
    }

    pub fn encoded_len(format: HeaderFormat) -> TransmissionResult<usize> {
        match format {
            HeaderFormat::Hex => Ok(HEX_HEADER_LEN),
            HeaderFormat::Bin16 => Ok(HEADER_LEN),
            HeaderFormat::Bin32 => Err(TransmissionError::Unsupported("BIN32 headers")),
        }
    }

    /// Writes the encoded header into `buf`, the CRC has to be calculated before.
    ///
    /// Hex headers include the leading 'B' and the trailing CR LF, binary
    /// headers are the 7 raw bytes. Returns the number of bytes used.
    pub fn encode_into(&self, format: HeaderFormat, buf: &mut [u8]) -> TransmissionResult<usize> {
        let needed = Header::encoded_len(format)?;
        if buf.len() < needed {
            return Err(TransmissionError::OutOfSpace {
                needed,
                available: buf.len(),
            });
        }
        let bytes = self.to_bytes();
        match format {
            HeaderFormat::Hex => {
                buf[0] = ZHEX;
                for (i, b) in bytes.iter().enumerate() {
                    buf[1 + i * 2..3 + i * 2].copy_from_slice(&byte_to_hex(*b));
                }
                buf[15] = CR;
                buf[16] = LF_0X80;
            }
            HeaderFormat::Bin16 => buf[..HEADER_LEN].copy_from_slice(&bytes),
            HeaderFormat::Bin32 => return Err(TransmissionError::Unsupported("BIN32 headers")),
        }
        Ok(needed)
    }

    pub fn encode(&self, format: HeaderFormat) -> TransmissionResult<Vec<u8>> {
        let mut res = vec![0; Header::encoded_len(format)?];
        self.encode_into(format, &mut res)?;
        Ok(res)
    }

    /// Parses an encoded header. The CRC is not checked, see [`Header::check_crc`].
    pub fn decode(bytes: &[u8], format: HeaderFormat) -> TransmissionResult<Header> {
        let needed = Header::encoded_len(format)?;
        if bytes.len() < needed {
            return Err(TransmissionError::Corrupted("truncated header"));
        }
        match format {
            HeaderFormat::Hex => {
                if bytes[0] != ZHEX {
                    return Err(TransmissionError::BadFrameType(bytes[0]));
                }
                let mut raw = [0; HEADER_LEN];
                for (i, b) in raw.iter_mut().enumerate() {
                    *b = hex_to_byte(bytes[1 + i * 2], bytes[2 + i * 2])?;
                }
                if bytes[15] & 0x7F != CR || bytes[16] & 0x7F != LF {
                    return Err(TransmissionError::Corrupted("hex header without CR LF"));
                }
                Ok(Header::from_bytes(&raw))
            }
            HeaderFormat::Bin16 => {
                let mut raw = [0; HEADER_LEN];
                raw.copy_from_slice(&bytes[..HEADER_LEN]);
                Ok(Header::from_bytes(&raw))
            }
            HeaderFormat::Bin32 => Err(TransmissionError::Unsupported("BIN32 headers")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_number() {
        let header = Header::from_number(ZFrameType::RPos, 0x0102_0304);
        assert_eq!([0x04, 0x03, 0x02, 0x01], header.data);
        assert_eq!(0x0102_0304, header.number());
        assert_eq!(0x04, header.f3());
        assert_eq!(0x01, header.f0());
    }

    #[test]
    fn test_hex_header_data() {
        let encoded = Header::empty(ZFrameType::RQInit)
            .with_crc()
            .encode(HeaderFormat::Hex)
            .unwrap();
        assert_eq!(b"B00000000000000\r\x8a".to_vec(), encoded);

        let encoded = Header::empty(ZFrameType::RInit)
            .with_crc()
            .encode(HeaderFormat::Hex)
            .unwrap();
        assert_eq!(b"B0100000000aa51\r\x8a".to_vec(), encoded);
        assert_eq!(HEX_HEADER_LEN, encoded.len());

        let encoded = Header::from_number(ZFrameType::Fin, 2)
            .with_crc()
            .encode(HeaderFormat::Hex)
            .unwrap();
        assert_eq!(b"B0802000000ef45\r\x8a".to_vec(), encoded);

        let encoded = Header::from_flags(ZFrameType::Fin, 126, 4, 0, 0)
            .with_crc()
            .encode(HeaderFormat::Hex)
            .unwrap();
        assert_eq!(b"B087e0400003ec2\r\x8a".to_vec(), encoded);
    }

    #[test]
    fn test_bin16_header_data() {
        let encoded = Header::empty(ZFrameType::Ack)
            .with_crc()
            .encode(HeaderFormat::Bin16)
            .unwrap();
        assert_eq!(vec![0x03, 0, 0, 0, 0, 0xEE, 0xD2], encoded);
    }

    #[test]
    fn test_out_of_space() {
        let header = Header::empty(ZFrameType::RInit).with_crc();
        let mut buf = [0; 16];
        assert!(matches!(
            header.encode_into(HeaderFormat::Hex, &mut buf),
            Err(TransmissionError::OutOfSpace {
                needed: 17,
                available: 16
            })
        ));
        let mut buf = [0; 17];
        assert_eq!(17, header.encode_into(HeaderFormat::Hex, &mut buf).unwrap());
    }

    #[test]
    fn test_bin32_unsupported() {
        let header = Header::empty(ZFrameType::Data).with_crc();
        assert!(matches!(
            header.encode(HeaderFormat::Bin32),
            Err(TransmissionError::Unsupported(_))
        ));
        assert!(matches!(
            Header::decode(&[0; 16], HeaderFormat::Bin32),
            Err(TransmissionError::Unsupported(_))
        ));
    }

    #[test]
    fn test_decode_does_not_check_crc() {
        let header = Header::decode(b"B0100000000ffff\r\n", HeaderFormat::Hex).unwrap();
        assert_eq!(ZFrameType::RInit, header.frame_type);
        assert_eq!(0xFFFF, header.crc);
        assert!(matches!(
            header.check_crc(),
            Err(TransmissionError::BadCrc {
                expected: 0xAA51,
                actual: 0xFFFF
            })
        ));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            Header::decode(b"B01000000", HeaderFormat::Hex),
            Err(TransmissionError::Corrupted(_))
        ));
        assert!(matches!(
            Header::decode(b"A0100000000aa51\r\n", HeaderFormat::Hex),
            Err(TransmissionError::BadFrameType(b'A'))
        ));
        assert!(matches!(
            Header::decode(b"B01000z0000aa51\r\n", HeaderFormat::Hex),
            Err(TransmissionError::BadDigit(b'z'))
        ));
        assert!(matches!(
            Header::decode(b"B0100000000aa51\n\n", HeaderFormat::Hex),
            Err(TransmissionError::Corrupted(_))
        ));
    }

    #[test]
    fn test_unknown_frame_type_survives() {
        let header = Header::empty(ZFrameType::from(0x42)).with_crc();
        assert_eq!(ZFrameType::Unknown(0x42), header.frame_type);
        let encoded = header.encode(HeaderFormat::Bin16).unwrap();
        let decoded = Header::decode(&encoded, HeaderFormat::Bin16).unwrap();
        assert_eq!(header, decoded);
        assert!(decoded.check_crc().is_ok());
    }

    #[test]
    fn test_frame_type_mapping() {
        for b in 0..=255u8 {
            assert_eq!(b, u8::from(ZFrameType::from(b)));
        }
    }

    proptest! {
        #[test]
        fn prop_header_roundtrip(ftype in 0..20u8, data in any::<[u8; 4]>()) {
            let header = Header {
                frame_type: ZFrameType::from(ftype),
                data,
                crc: 0,
            }
            .with_crc();
            for format in [HeaderFormat::Hex, HeaderFormat::Bin16] {
                let decoded = Header::decode(&header.encode(format).unwrap(), format).unwrap();
                prop_assert_eq!(header, decoded);
                prop_assert!(decoded.check_crc().is_ok());
            }
        }
    }
}
