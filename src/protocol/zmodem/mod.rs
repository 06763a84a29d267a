//
// ZModem protocol specification http://cristal.inria.fr/~doligez/zmodem/zmodem.txt

pub mod constants;
pub use constants::*;

mod crc;
pub use self::crc::*;

pub mod error;
pub use error::*;

pub mod escape;
pub mod header;
pub use header::*;

pub mod hex;
pub mod reader;
pub use reader::DataCrc;

pub mod writer;

mod rz;
pub use rz::*;


use crate::com::{Com, ComResult};

use self::escape::{append_zdle_encoded, FrameEnd};

pub struct Zmodem;

impl Zmodem {
    pub fn cancel(com: &mut dyn Com) -> ComResult<()> {
        com.send(&ABORT_SEQ)?;
        Ok(())
    }

    /// A data subpacket as a sender puts it on the line: escaped data,
    /// ZDLE + frame end, escaped CRC-16 (MSB first).
    pub fn encode_subpacket(end: FrameEnd, data: &[u8], data_crc: DataCrc) -> Vec<u8> {
        let mut crc = crc16(data);
        if data_crc == DataCrc::IncludeFrameEnd {
            crc = crc16_update(crc, end.to_byte());
        }
        let mut v = Vec::with_capacity(data.len() + 8);
        append_zdle_encoded(&mut v, data);
        v.extend_from_slice(&[ZDLE, end.to_byte()]);
        append_zdle_encoded(&mut v, &crc.to_be_bytes());
        v
    }
}
