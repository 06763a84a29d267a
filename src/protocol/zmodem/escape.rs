//! ZDLE escaping.
//!
//! ZMODEM signals frame ends, header starts and cancellation in band, all of
//! them introduced by ZDLE. Everything that reads from the line goes through
//! [`read_zdle_token`].

use crate::com::Com;

use super::{
    constants::*,
    error::{TransmissionError, TransmissionResult},
    header::HeaderFormat,
};

/// How a data subpacket ends. Sent as ZDLE + ZCRCx, followed by the CRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEnd {
    /// frame ends, header follows, no ack
    Crce,
    /// frame continues nonstop
    Crcg,
    /// frame continues, ZACK expected
    Crcq,
    /// frame ends, ZACK expected
    Crcw,
}

impl FrameEnd {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            ZCRCE => Some(FrameEnd::Crce),
            ZCRCG => Some(FrameEnd::Crcg),
            ZCRCQ => Some(FrameEnd::Crcq),
            ZCRCW => Some(FrameEnd::Crcw),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            FrameEnd::Crce => ZCRCE,
            FrameEnd::Crcg => ZCRCG,
            FrameEnd::Crcq => ZCRCQ,
            FrameEnd::Crcw => ZCRCW,
        }
    }

    pub fn ends_frame(self) -> bool {
        matches!(self, FrameEnd::Crce | FrameEnd::Crcw)
    }

    pub fn ack_required(self) -> bool {
        matches!(self, FrameEnd::Crcq | FrameEnd::Crcw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZToken {
    Byte(u8),
    FrameEnd(FrameEnd),
    HeaderStart(HeaderFormat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeMode {
    /// Hunting for the next header: ZDLE + A/B/C starts one.
    AwaitHeader,
    /// Inside a header body or data subpacket: ZDLE + A/B/C is returned as is.
    Stream,
}

pub fn read_zdle_token(com: &mut dyn Com, mode: EscapeMode) -> TransmissionResult<ZToken> {
    loop {
        let c = com.read_u8()?;
        if c & NONCONTROL_MASK != 0 {
            return Ok(ZToken::Byte(c));
        }
        match c {
            XON | XOFF => continue,
            ZDLE => return read_escaped(com, mode),
            _ => return Ok(ZToken::Byte(c)),
        }
    }
}

fn read_escaped(com: &mut dyn Com, mode: EscapeMode) -> TransmissionResult<ZToken> {
    // ZDLE == CAN, so the introducer is the first of up to 5 cancel bytes
    let mut cancels = 1;
    let mut c = com.read_u8()?;
    while c == CAN {
        cancels += 1;
        if cancels == 5 {
            return Err(TransmissionError::Cancelled);
        }
        c = com.read_u8()?;
    }

    if let Some(end) = FrameEnd::from_byte(c) {
        return Ok(ZToken::FrameEnd(end));
    }
    if let Some(format) = HeaderFormat::from_marker(c) {
        return Ok(match mode {
            EscapeMode::AwaitHeader => ZToken::HeaderStart(format),
            EscapeMode::Stream => ZToken::Byte(c),
        });
    }
    match c {
        ZRUB0 => Ok(ZToken::Byte(0x7F)),
        ZRUB1 => Ok(ZToken::Byte(0xFF)),
        _ if c & 0x60 == 0x40 => Ok(ZToken::Byte(c ^ 0x40)),
        _ => Err(match mode {
            EscapeMode::AwaitHeader => TransmissionError::BadFrameType(c),
            EscapeMode::Stream => TransmissionError::BadEscape(c),
        }),
    }
}

/// Reads one escaped byte, anything but plain data is an error.
pub fn read_zdle_byte(com: &mut dyn Com) -> TransmissionResult<u8> {
    match read_zdle_token(com, EscapeMode::Stream)? {
        ZToken::Byte(b) => Ok(b),
        ZToken::FrameEnd(end) => {
            log::debug!("unexpected frame end {end:?}");
            Err(TransmissionError::Corrupted("frame end inside escaped byte run"))
        }
        ZToken::HeaderStart(_) => Err(TransmissionError::Corrupted(
            "header start inside escaped byte run",
        )),
    }
}

pub fn append_zdle_encoded(v: &mut Vec<u8>, data: &[u8]) {
    let mut last = 0u8;
    for b in data {
        match *b {
            ZDLE => v.extend_from_slice(&[ZDLE, ZDLEE]),
            DLE => v.extend_from_slice(&[ZDLE, ESC_DLE]),
            DLE_0X80 => v.extend_from_slice(&[ZDLE, ESC_0X90]),
            XON => v.extend_from_slice(&[ZDLE, ESC_XON]),
            XON_0X80 => v.extend_from_slice(&[ZDLE, ESC_0X91]),
            XOFF => v.extend_from_slice(&[ZDLE, ESC_XOFF]),
            XOFF_0X80 => v.extend_from_slice(&[ZDLE, ESC_0X93]),
            // CR after '@' would look like a telenet escape
            CR if last & 0x7F == b'@' => v.extend_from_slice(&[ZDLE, ESC_0X0D]),
            CR_0X80 if last & 0x7F == b'@' => v.extend_from_slice(&[ZDLE, ESC_0X8D]),
            b => v.push(b),
        }
        last = *b;
    }
}

pub fn zdle_encode(data: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(data.len() + data.len() / 8);
    append_zdle_encoded(&mut v, data);
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::com::TestCom;
    use proptest::prelude::*;

    fn decode_all(encoded: &[u8]) -> Vec<u8> {
        let mut com = TestCom::from_bytes(encoded);
        let mut res = Vec::new();
        while com.remaining() > 0 {
            match read_zdle_token(&mut com, EscapeMode::Stream).unwrap() {
                ZToken::Byte(b) => res.push(b),
                token => panic!("unexpected token {token:?}"),
            }
        }
        res
    }

    #[test]
    fn test_plain_bytes() {
        let mut com = TestCom::from_bytes(&[b'a', 0xFF, 0x01, b'*']);
        assert_eq!(ZToken::Byte(b'a'), read_zdle_token(&mut com, EscapeMode::Stream).unwrap());
        assert_eq!(ZToken::Byte(0xFF), read_zdle_token(&mut com, EscapeMode::Stream).unwrap());
        assert_eq!(ZToken::Byte(0x01), read_zdle_token(&mut com, EscapeMode::Stream).unwrap());
        assert_eq!(ZToken::Byte(b'*'), read_zdle_token(&mut com, EscapeMode::Stream).unwrap());
        assert!(matches!(
            read_zdle_token(&mut com, EscapeMode::Stream),
            Err(TransmissionError::Closed)
        ));
    }

    #[test]
    fn test_flow_control_is_dropped() {
        let mut com = TestCom::from_bytes(&[XON, XOFF, XON, b'x']);
        assert_eq!(ZToken::Byte(b'x'), read_zdle_token(&mut com, EscapeMode::Stream).unwrap());
    }

    #[test]
    fn test_escaped_bytes() {
        let mut com = TestCom::from_bytes(&[ZDLE, ZDLEE, ZDLE, ESC_XON, ZDLE, ESC_0X93, ZDLE, ZRUB0, ZDLE, ZRUB1]);
        for expected in [ZDLE, XON, XOFF_0X80, 0x7F, 0xFF] {
            assert_eq!(
                ZToken::Byte(expected),
                read_zdle_token(&mut com, EscapeMode::Stream).unwrap()
            );
        }
    }

    #[test]
    fn test_frame_ends() {
        let mut com = TestCom::from_bytes(&[ZDLE, ZCRCE, ZDLE, ZCRCG, ZDLE, ZCRCQ, ZDLE, ZCRCW]);
        for end in [FrameEnd::Crce, FrameEnd::Crcg, FrameEnd::Crcq, FrameEnd::Crcw] {
            assert_eq!(
                ZToken::FrameEnd(end),
                read_zdle_token(&mut com, EscapeMode::Stream).unwrap()
            );
        }
        assert!(FrameEnd::Crcw.ends_frame() && FrameEnd::Crcw.ack_required());
        assert!(FrameEnd::Crce.ends_frame() && !FrameEnd::Crce.ack_required());
        assert!(!FrameEnd::Crcq.ends_frame() && FrameEnd::Crcq.ack_required());
        assert!(!FrameEnd::Crcg.ends_frame() && !FrameEnd::Crcg.ack_required());
    }

    #[test]
    fn test_header_markers_depend_on_mode() {
        let mut com = TestCom::from_bytes(&[ZDLE, ZHEX, ZDLE, ZBIN, ZDLE, ZBIN32, ZDLE, ZHEX]);
        assert_eq!(
            ZToken::HeaderStart(HeaderFormat::Hex),
            read_zdle_token(&mut com, EscapeMode::AwaitHeader).unwrap()
        );
        assert_eq!(
            ZToken::HeaderStart(HeaderFormat::Bin16),
            read_zdle_token(&mut com, EscapeMode::AwaitHeader).unwrap()
        );
        assert_eq!(
            ZToken::HeaderStart(HeaderFormat::Bin32),
            read_zdle_token(&mut com, EscapeMode::AwaitHeader).unwrap()
        );
        assert_eq!(ZToken::Byte(ZHEX), read_zdle_token(&mut com, EscapeMode::Stream).unwrap());
    }

    #[test]
    fn test_bad_escape() {
        let mut com = TestCom::from_bytes(&[ZDLE, b'z', ZDLE, b'z']);
        assert!(matches!(
            read_zdle_token(&mut com, EscapeMode::Stream),
            Err(TransmissionError::BadEscape(b'z'))
        ));
        assert!(matches!(
            read_zdle_token(&mut com, EscapeMode::AwaitHeader),
            Err(TransmissionError::BadFrameType(b'z'))
        ));
    }

    #[test]
    fn test_five_cans_cancel() {
        let mut com = TestCom::from_bytes(&[CAN; 5]);
        com.push_bytes(b"x");
        assert!(matches!(
            read_zdle_token(&mut com, EscapeMode::Stream),
            Err(TransmissionError::Cancelled)
        ));
        // nothing after the fifth CAN was consumed
        assert_eq!(1, com.remaining());
    }

    #[test]
    fn test_four_cans_are_an_escape() {
        let mut com = TestCom::from_bytes(&[CAN, CAN, CAN, CAN, ZDLEE]);
        assert_eq!(ZToken::Byte(ZDLE), read_zdle_token(&mut com, EscapeMode::Stream).unwrap());

        let mut com = TestCom::from_bytes(&[CAN, CAN, CAN, CAN, ZCRCW]);
        assert_eq!(
            ZToken::FrameEnd(FrameEnd::Crcw),
            read_zdle_token(&mut com, EscapeMode::Stream).unwrap()
        );
    }

    #[test]
    fn test_timeout_inside_escape() {
        let mut com = TestCom::from_bytes(&[ZDLE]);
        com.push_timeout();
        assert!(matches!(
            read_zdle_token(&mut com, EscapeMode::Stream),
            Err(TransmissionError::Timeout)
        ));
    }

    #[test]
    fn test_encode() {
        assert_eq!(vec![b'a', ZDLE, ZDLEE, ZDLE, ESC_XON], zdle_encode(&[b'a', ZDLE, XON]));
        assert_eq!(vec![b'@', ZDLE, ESC_0X0D, CR], zdle_encode(&[b'@', CR, CR]));
    }

    proptest! {
        #[test]
        fn prop_escape_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(data.clone(), decode_all(&zdle_encode(&data)));
        }
    }
}
