use std::io;

use thiserror::Error;

use crate::com::ComError;

use super::header::ZFrameType;

pub type TransmissionResult<T> = Result<T, TransmissionError>;

#[derive(Debug, Error)]
pub enum TransmissionError {
    #[error("hex digit expected, got 0x{0:02X}")]
    BadDigit(u8),

    #[error("corrupted frame: {0}")]
    Corrupted(&'static str),

    #[error("crc16 mismatch got 0x{actual:04X} expected 0x{expected:04X}")]
    BadCrc { expected: u16, actual: u16 },

    #[error("invalid frame type 0x{0:02X} after ZDLE")]
    BadFrameType(u8),

    #[error("invalid byte 0x{0:02X} after ZDLE")]
    BadEscape(u8),

    #[error("buffer too small: need {needed} bytes, have {available}")]
    OutOfSpace { needed: usize, available: usize },

    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    #[error("timeout while waiting for data")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("transfer cancelled by remote")]
    Cancelled,

    #[error("no header sent yet, nothing to resend")]
    NoPriorHeader,

    #[error("giving up after {0} retries")]
    TooManyRetries(u32),

    /// The session ended on a header, replies (if any) are already sent.
    #[error("session aborted on {0:?} header")]
    Aborted(ZFrameType),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransmissionError {
    /// Errors after which the session can't continue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransmissionError::Closed | TransmissionError::Cancelled | TransmissionError::Io(_)
        )
    }

    /// Line noise: the peer gets a ZRPOS and retransmits.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            TransmissionError::BadDigit(_)
                | TransmissionError::Corrupted(_)
                | TransmissionError::BadCrc { .. }
                | TransmissionError::BadFrameType(_)
                | TransmissionError::BadEscape(_)
        )
    }
}

impl From<ComError> for TransmissionError {
    fn from(err: ComError) -> Self {
        match err {
            ComError::Timeout => TransmissionError::Timeout,
            ComError::Closed => TransmissionError::Closed,
            ComError::Io(err) => TransmissionError::Io(err),
        }
    }
}
