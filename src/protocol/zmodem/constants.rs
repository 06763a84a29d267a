#![allow(dead_code)]

//
// Constants taken from:
//
//   Z M O D E M . H     Manifest constants for ZMODEM
//    application to application file transfer protocol
//    Copyright 1991 Omen Technology Inc All Rights Reserved
//    04-17-89  Chuck Forsberg Omen Technology Inc
//
// See https://www.rpi.edu/dept/acm/packages/zmodem/3.17/sun4c_41/src/

pub const ZPAD: u8 = b'*'; // 052 Padding character begins frames
pub const ZDLE: u8 = 0x18; // Ctrl-X Zmodem escape - `ala BISYNC DLE
pub const ZDLEE: u8 = ZDLE ^ 0x40; // Escaped ZDLE as transmitted
pub const CAN: u8 = ZDLE; // five of them in a row cancel the session
pub const ZBIN: u8 = b'A'; // Binary frame indicator (CRC-16)
pub const ZHEX: u8 = b'B'; // HEX frame indicator
pub const ZBIN32: u8 = b'C'; // Binary frame with 32 bit FCS

pub const CR: u8 = b'\r';
pub const CR_0X80: u8 = CR | 0x80;
pub const LF: u8 = b'\n';
pub const LF_0X80: u8 = LF | 0x80;
pub const DLE: u8 = 0x10;
pub const DLE_0X80: u8 = DLE | 0x80;
pub const XON: u8 = 0x11;
pub const XON_0X80: u8 = XON | 0x80;
pub const XOFF: u8 = 0x13;
pub const XOFF_0X80: u8 = XOFF | 0x80;
pub const ZPAD_0X80: u8 = ZPAD | 0x80;
pub const BS: u8 = 0x08;

/// Mask used to tell printable bytes from the control range.
pub const NONCONTROL_MASK: u8 = 0xE0;

/* ZDLE sequences */
/// CRC next, frame ends, header packet follows
pub const ZCRCE: u8 = b'h';
/// CRC next, frame continues nonstop
pub const ZCRCG: u8 = b'i';
/// CRC next, frame continues, ZACK expected
pub const ZCRCQ: u8 = b'j';
/// CRC next, ZACK expected, end of frame
pub const ZCRCW: u8 = b'k';
pub const ZRUB0: u8 = b'l'; /* Translate to rubout 0177 */
pub const ZRUB1: u8 = b'm'; /* Translate to rubout 0377 */

pub const ESC_DLE: u8 = DLE ^ 0x40;
pub const ESC_0X90: u8 = DLE_0X80 ^ 0x40;
pub const ESC_XON: u8 = XON ^ 0x40;
pub const ESC_0X91: u8 = XON_0X80 ^ 0x40;
pub const ESC_XOFF: u8 = XOFF ^ 0x40;
pub const ESC_0X93: u8 = XOFF_0X80 ^ 0x40;
pub const ESC_0X0D: u8 = CR ^ 0x40;
pub const ESC_0X8D: u8 = CR_0X80 ^ 0x40;

/// Header length without CRC: frame type + 4 flag/position bytes.
pub const HEADER_BODY_LEN: usize = 5;
/// Header length including the CRC-16.
pub const HEADER_LEN: usize = 7;
/// 'B' + 14 hex digits + CR + LF
pub const HEX_HEADER_LEN: usize = 17;
pub const HEADER_PREAMBLE: [u8; 3] = [ZPAD, ZPAD, ZDLE];

/// Max subpacket length is 1024, leave some headroom
pub const DEFAULT_BLOCK_BUFFER_LEN: usize = 2048;

pub const ABORT_SEQ: [u8; 18] = [
    CAN, CAN, CAN, CAN, CAN, CAN, CAN, CAN, /* 8 CAN */
    BS, BS, BS, BS, BS, BS, BS, BS, BS, BS, /* 10 BS */
];

pub mod zfile_flag {
    pub const ZCBIN: u8 = 1; /* Binary transfer - inhibit conversion */
    pub const ZCNL: u8 = 2; /* Convert NL to local end of line convention */
    pub const ZCRESUM: u8 = 3; /* Resume interrupted file transfer */
}

pub mod zrinit_flag {
    // Bit Masks for ZRINIT flags byte ZF0
    pub const CANFDX: u8 = 0x01; // Rx can send and receive true full duplex
    pub const CANOVIO: u8 = 0x02; // Rx can receive data during disk I/O
    pub const CANBRK: u8 = 0x04; // Rx can send a break signal
    pub const CANCRY: u8 = 0x08; // Receiver can decode RLE
    pub const CANLZW: u8 = 0x10; // Receiver can uncompress
    pub const CANFC32: u8 = 0x20; // Receiver can use 32 bit Frame Check
    pub const ESCCTL: u8 = 0x40; // Receiver expects ctl chars to be escaped
    pub const ESC8: u8 = 0x80; // Receiver expects 8th bit to be escaped
}

pub mod frame_types {
    pub const ZRQINIT: u8 = 0; // Request receive init
    pub const ZRINIT: u8 = 1; // Receive init
    pub const ZSINIT: u8 = 2; // Send init sequence (optional)
    pub const ZACK: u8 = 3; // ACK to above
    pub const ZFILE: u8 = 4; // File name from sender
    pub const ZSKIP: u8 = 5; // To sender: skip this file
    pub const ZNAK: u8 = 6; // Last packet was garbled
    pub const ZABORT: u8 = 7; // Abort batch transfers
    pub const ZFIN: u8 = 8; // Finish session
    pub const ZRPOS: u8 = 9; // Resume data trans at this position
    pub const ZDATA: u8 = 10; // Data packet(s) follow
    pub const ZEOF: u8 = 11; // End of file
    pub const ZFERR: u8 = 12; // Fatal Read or Write error Detected
    pub const ZCRC: u8 = 13; // Request for file CRC and response
    pub const ZCHALLENGE: u8 = 14; // Receiver's Challenge
    pub const ZCOMPL: u8 = 15; // Request is complete
    pub const ZCAN: u8 = 16; // Other end canned session with CAN*5
    pub const ZFREECNT: u8 = 17; // Request for free bytes on filesystem
    pub const ZCOMMAND: u8 = 18; // Command from sending program
    pub const ZSTDERR: u8 = 19; // Output to standard error, data follows
}
