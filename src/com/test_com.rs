use std::collections::VecDeque;

use super::{Com, ComError, ComResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestInput {
    Byte(u8),
    Timeout,
}

/// Plays back a scripted input and records everything sent.
/// Reading past the end of the script reports a closed connection.
#[derive(Debug, Default)]
pub struct TestCom {
    input: VecDeque<TestInput>,
    pub sent: Vec<u8>,
    pub disconnected: bool,
}

impl TestCom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        let mut res = Self::new();
        res.push_bytes(data);
        res
    }

    pub fn push_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.input.extend(data.iter().map(|b| TestInput::Byte(*b)));
        self
    }

    pub fn push_timeout(&mut self) -> &mut Self {
        self.input.push_back(TestInput::Timeout);
        self
    }

    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    pub fn take_sent(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.sent)
    }
}

impl Com for TestCom {
    fn get_name(&self) -> &'static str {
        "Test_Com"
    }

    fn read_u8(&mut self) -> ComResult<u8> {
        match self.input.pop_front() {
            Some(TestInput::Byte(b)) => Ok(b),
            Some(TestInput::Timeout) => Err(ComError::Timeout),
            None => Err(ComError::Closed),
        }
    }

    fn send_u8(&mut self, b: u8) -> ComResult<()> {
        if self.disconnected {
            return Err(ComError::Closed);
        }
        self.sent.push(b);
        Ok(())
    }

    fn disconnect(&mut self) -> ComResult<()> {
        self.disconnected = true;
        Ok(())
    }
}

mod communication_tests {
    use super::*;

    #[test]
    fn test_playback() {
        let mut com = TestCom::from_bytes(b"rz");
        com.push_timeout().push_bytes(b"\r");
        assert_eq!(b'r', com.read_u8().unwrap());
        assert_eq!(b'z', com.read_u8().unwrap());
        assert!(matches!(com.read_u8(), Err(ComError::Timeout)));
        assert_eq!(b'\r', com.read_u8().unwrap());
        assert!(matches!(com.read_u8(), Err(ComError::Closed)));

        com.send(b"Hello").unwrap();
        assert_eq!(b"Hello".to_vec(), com.take_sent());
        com.disconnect().unwrap();
        assert!(matches!(com.send_u8(0), Err(ComError::Closed)));
    }
}
