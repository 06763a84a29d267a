use super::error::{TransmissionError, TransmissionResult};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Only the low 4 bits of `n` are used.
pub fn nibble_to_hex(n: u8) -> u8 {
    HEX_DIGITS[(n & 0x0F) as usize]
}

pub fn hex_to_nibble(c: u8) -> TransmissionResult<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(10 + c - b'a'),
        b'A'..=b'F' => Ok(10 + c - b'A'),
        _ => Err(TransmissionError::BadDigit(c)),
    }
}

pub fn byte_to_hex(b: u8) -> [u8; 2] {
    [nibble_to_hex(b >> 4), nibble_to_hex(b)]
}

pub fn hex_to_byte(c1: u8, c2: u8) -> TransmissionResult<u8> {
    Ok(hex_to_nibble(c1)? << 4 | hex_to_nibble(c2)?)
}
