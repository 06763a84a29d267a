use serde::Deserialize;
use serial::{CharSize, FlowControl, StopBits};

#[derive(Clone, Debug, PartialEq)]
pub struct Modem {
    pub device: String,
    pub baud_rate: usize,

    pub char_size: CharSize,
    pub stop_bits: StopBits,
    pub parity: serial::Parity,

    pub flow_control: FlowControl,
}

impl Default for Modem {
    fn default() -> Self {
        Self {
            #[cfg(target_os = "windows")]
            device: "COM1".to_string(),
            #[cfg(not(target_os = "windows"))]
            device: "/dev/ttyS0".to_string(),
            baud_rate: 9600,
            char_size: CharSize::Bits8,
            stop_bits: StopBits::Stop1,
            parity: serial::Parity::ParityNone,
            flow_control: FlowControl::FlowNone,
        }
    }
}

/// `[modem]` table of the options file. Everything is optional and falls back
/// to [`Modem::default`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModemSection {
    pub device: Option<String>,
    pub baud_rate: Option<usize>,
    pub char_size: Option<u8>,
    pub stop_bits: Option<u8>,
    pub parity: Option<String>,
    pub flow_control: Option<String>,
}

impl ModemSection {
    pub fn into_modem(self) -> anyhow::Result<Modem> {
        let mut modem = Modem::default();
        if let Some(device) = self.device {
            modem.device = device;
        }
        if let Some(baud_rate) = self.baud_rate {
            modem.baud_rate = baud_rate;
        }
        if let Some(bits) = self.char_size {
            modem.char_size = match bits {
                5 => CharSize::Bits5,
                6 => CharSize::Bits6,
                7 => CharSize::Bits7,
                8 => CharSize::Bits8,
                _ => return Err(anyhow::anyhow!("invalid char_size {bits}, expected 5-8")),
            };
        }
        if let Some(bits) = self.stop_bits {
            modem.stop_bits = match bits {
                1 => StopBits::Stop1,
                2 => StopBits::Stop2,
                _ => return Err(anyhow::anyhow!("invalid stop_bits {bits}, expected 1 or 2")),
            };
        }
        if let Some(parity) = self.parity {
            modem.parity = match parity.to_ascii_lowercase().as_str() {
                "none" => serial::Parity::ParityNone,
                "odd" => serial::Parity::ParityOdd,
                "even" => serial::Parity::ParityEven,
                _ => return Err(anyhow::anyhow!("invalid parity '{parity}'")),
            };
        }
        if let Some(flow_control) = self.flow_control {
            modem.flow_control = match flow_control.to_ascii_lowercase().as_str() {
                "none" => FlowControl::FlowNone,
                "software" => FlowControl::FlowSoftware,
                "hardware" => FlowControl::FlowHardware,
                _ => return Err(anyhow::anyhow!("invalid flow_control '{flow_control}'")),
            };
        }
        Ok(modem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modem_section_defaults() {
        let modem = ModemSection::default().into_modem().unwrap();
        assert_eq!(Modem::default(), modem);
    }

    #[test]
    fn test_modem_section_override() {
        let section = ModemSection {
            device: Some("/dev/ttyUSB0".to_string()),
            baud_rate: Some(115_200),
            char_size: Some(7),
            stop_bits: Some(2),
            parity: Some("Even".to_string()),
            flow_control: Some("hardware".to_string()),
        };
        let modem = section.into_modem().unwrap();
        assert_eq!("/dev/ttyUSB0", modem.device);
        assert_eq!(115_200, modem.baud_rate);
        assert_eq!(CharSize::Bits7, modem.char_size);
        assert_eq!(StopBits::Stop2, modem.stop_bits);
        assert_eq!(serial::Parity::ParityEven, modem.parity);
        assert_eq!(FlowControl::FlowHardware, modem.flow_control);
    }

    #[test]
    fn test_modem_section_rejects_garbage() {
        let section = ModemSection {
            char_size: Some(9),
            ..Default::default()
        };
        assert!(section.into_modem().is_err());
    }
}
