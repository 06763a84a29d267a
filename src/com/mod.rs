use std::{io, thread, time::Duration};

use thiserror::Error;

pub mod modem;
pub use modem::*;

pub mod raw;
pub use raw::*;

#[cfg(test)]
pub mod test_com;
#[cfg(test)]
pub use test_com::*;

pub type ComResult<T> = Result<T, ComError>;

#[derive(Debug, Error)]
pub enum ComError {
    #[error("timeout while waiting for data")]
    Timeout,

    #[error("connection closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Single byte transport the zmodem engine runs on.
///
/// `read_u8` blocks up to an implementation defined timeout, `send_u8` retries
/// a bounded number of times before giving up with [`ComError::Closed`].
pub trait Com {
    fn get_name(&self) -> &'static str;

    fn read_u8(&mut self) -> ComResult<u8>;

    fn send_u8(&mut self, b: u8) -> ComResult<()>;

    fn send(&mut self, buf: &[u8]) -> ComResult<()> {
        for b in buf {
            self.send_u8(*b)?;
        }
        Ok(())
    }

    fn disconnect(&mut self) -> ComResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(10),
        }
    }
}

pub(crate) fn read_one(stream: &mut impl io::Read) -> ComResult<u8> {
    let mut b = [0];
    loop {
        match stream.read(&mut b) {
            Ok(0) => return Err(ComError::Closed),
            Ok(_) => return Ok(b[0]),
            Err(err) => match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                    return Err(ComError::Timeout)
                }
                io::ErrorKind::UnexpectedEof
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::ConnectionReset => return Err(ComError::Closed),
                _ => return Err(err.into()),
            },
        }
    }
}

pub(crate) fn write_one(
    stream: &mut impl io::Write,
    b: u8,
    policy: RetryPolicy,
) -> ComResult<()> {
    let mut attempt = 0;
    loop {
        match stream.write(&[b]) {
            Ok(1) => return Ok(()),
            Ok(_) => {}
            Err(err) => match err.kind() {
                io::ErrorKind::Interrupted
                | io::ErrorKind::WouldBlock
                | io::ErrorKind::TimedOut => {}
                io::ErrorKind::BrokenPipe
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::ConnectionReset => return Err(ComError::Closed),
                _ => return Err(err.into()),
            },
        }
        attempt += 1;
        if attempt > policy.retries {
            log::error!("giving up sending byte 0x{b:02X} after {attempt} attempts");
            return Err(ComError::Closed);
        }
        thread::sleep(policy.delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read, Write};

    struct FlakyWriter {
        failures: usize,
        written: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "busy"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct TimingOut;

    impl Read for TimingOut {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
        }
    }

    #[test]
    fn test_read_one() {
        let mut cursor = Cursor::new(vec![0x2A]);
        assert_eq!(0x2A, read_one(&mut cursor).unwrap());
        assert!(matches!(read_one(&mut cursor), Err(ComError::Closed)));
        assert!(matches!(read_one(&mut TimingOut), Err(ComError::Timeout)));
    }

    #[test]
    fn test_write_one_retries() {
        let policy = RetryPolicy {
            retries: 3,
            delay: Duration::from_millis(1),
        };
        let mut w = FlakyWriter {
            failures: 2,
            written: Vec::new(),
        };
        write_one(&mut w, 0x18, policy).unwrap();
        assert_eq!(vec![0x18], w.written);

        let mut w = FlakyWriter {
            failures: 10,
            written: Vec::new(),
        };
        assert!(matches!(write_one(&mut w, 0x18, policy), Err(ComError::Closed)));
        assert!(w.written.is_empty());
    }
}
