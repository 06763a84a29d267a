use ::crc::{Crc, CRC_16_XMODEM, CRC_32_ISO_HDLC};

pub const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);
pub const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Seed for every independently checksummed unit (one header, one data block).
pub const CRC_START_XMODEM: u16 = 0x0000;

pub fn crc16_update(crc: u16, b: u8) -> u16 {
    let mut digest = CRC16.digest_with_initial(crc);
    digest.update(&[b]);
    digest.finalize()
}

pub fn crc16(data: &[u8]) -> u16 {
    data.iter()
        .fold(CRC_START_XMODEM, |crc, b| crc16_update(crc, *b))
}

/// Not used on the wire yet, BIN32 frames are rejected.
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}
