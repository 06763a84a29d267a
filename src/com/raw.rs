use std::{
    net::{Shutdown, TcpStream},
    time::Duration,
};

use super::{read_one, write_one, Com, ComResult, RetryPolicy};

/// Plain TCP, e.g. a socat bridge to a serial line or a pty.
pub struct ComRawImpl {
    tcp_stream: TcpStream,
    retry: RetryPolicy,
}

impl ComRawImpl {
    pub fn connect(address: &str, timeout: Duration, retry: RetryPolicy) -> ComResult<Self> {
        let tcp_stream = TcpStream::connect(address)?;
        tcp_stream.set_read_timeout(Some(timeout))?;
        log::info!("connected to {address}");
        Ok(Self { tcp_stream, retry })
    }
}

impl Com for ComRawImpl {
    fn get_name(&self) -> &'static str {
        "Raw"
    }

    fn read_u8(&mut self) -> ComResult<u8> {
        read_one(&mut self.tcp_stream)
    }

    fn send_u8(&mut self, b: u8) -> ComResult<()> {
        write_one(&mut self.tcp_stream, b, self.retry)
    }

    fn disconnect(&mut self) -> ComResult<()> {
        self.tcp_stream.shutdown(Shutdown::Both)?;
        Ok(())
    }
}
