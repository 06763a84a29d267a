use std::{
    io::{self, Write},
    time::Duration,
};

use serial::prelude::*;

use crate::data::Modem;

use super::{read_one, write_one, Com, ComResult, RetryPolicy};

pub struct ComModemImpl {
    port: Box<dyn serial::SerialPort>,
    retry: RetryPolicy,
}

impl ComModemImpl {
    pub fn open(modem: &Modem, timeout: Duration, retry: RetryPolicy) -> ComResult<Self> {
        let mut port = serial::open(&modem.device).map_err(io::Error::from)?;
        port.reconfigure(&|settings| {
            settings.set_baud_rate(serial::BaudRate::from_speed(modem.baud_rate))?;
            settings.set_char_size(modem.char_size);
            settings.set_parity(modem.parity);
            settings.set_stop_bits(modem.stop_bits);
            settings.set_flow_control(modem.flow_control);
            Ok(())
        })
        .map_err(io::Error::from)?;
        port.set_timeout(timeout).map_err(io::Error::from)?;
        log::info!("opened {} at {} baud", modem.device, modem.baud_rate);
        Ok(Self {
            port: Box::new(port),
            retry,
        })
    }
}

impl Com for ComModemImpl {
    fn get_name(&self) -> &'static str {
        "Modem"
    }

    fn read_u8(&mut self) -> ComResult<u8> {
        read_one(&mut self.port)
    }

    fn send_u8(&mut self, b: u8) -> ComResult<()> {
        write_one(&mut self.port, b, self.retry)
    }

    fn disconnect(&mut self) -> ComResult<()> {
        self.port.flush()?;
        Ok(())
    }
}
