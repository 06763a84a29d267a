use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;

use crate::{
    com::RetryPolicy,
    protocol::{DataCrc, FileNameBlock, HeaderFormat, RzOptions},
};

use super::{Modem, ModemSection};

#[derive(Debug, Clone)]
pub struct Options {
    pub modem: Modem,
    pub download_dir: PathBuf,
    pub recv_timeout: Duration,
    pub send_retry: RetryPolicy,
    pub log_file: Option<PathBuf>,
    pub rz: RzOptions,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            modem: Modem::default(),
            download_dir: PathBuf::from("."),
            recv_timeout: Duration::from_millis(5000),
            send_retry: RetryPolicy::default(),
            log_file: None,
            rz: RzOptions::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OptionsFile {
    #[serde(default)]
    modem: ModemSection,
    #[serde(default)]
    transfer: TransferSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransferSection {
    download_dir: Option<PathBuf>,
    handshake: Option<String>,
    recv_timeout_ms: Option<u64>,
    send_retries: Option<usize>,
    send_retry_delay_ms: Option<u64>,
    max_header_retries: Option<u32>,
    block_buffer_len: Option<usize>,
    header_format: Option<HeaderFormat>,
    filename_block: Option<FileNameBlock>,
    data_crc: Option<DataCrc>,
    zrinit_flags: Option<u8>,
    log_file: Option<PathBuf>,
}

impl Options {
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "GitHub", "icy_rz")
            .map(|proj_dirs| proj_dirs.config_dir().join("options.toml"))
    }

    /// Loads `path`, or the default options file when `path` is `None`.
    /// A missing default file means default options, a missing explicit one is an error.
    pub fn load_options(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Options::load_from(path);
        }
        if let Some(options_file) = Options::default_path() {
            if options_file.exists() {
                return Options::load_from(&options_file);
            }
        }
        Ok(Options::default())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("can't read options file {}", path.display()))?;
        Options::from_str(&content).with_context(|| format!("in {}", path.display()))
    }

    pub fn from_str(input_text: &str) -> anyhow::Result<Self> {
        let file: OptionsFile = toml::from_str(input_text)?;
        let mut result = Options {
            modem: file.modem.into_modem()?,
            ..Default::default()
        };
        result.apply_transfer(file.transfer)?;
        Ok(result)
    }

    fn apply_transfer(&mut self, transfer: TransferSection) -> anyhow::Result<()> {
        if let Some(dir) = transfer.download_dir {
            self.download_dir = dir;
        }
        if let Some(handshake) = transfer.handshake {
            self.rz.handshake = handshake.into_bytes();
        }
        if let Some(ms) = transfer.recv_timeout_ms {
            if ms == 0 {
                anyhow::bail!("recv_timeout_ms must be greater than 0");
            }
            self.recv_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = transfer.send_retries {
            self.send_retry.retries = retries;
        }
        if let Some(ms) = transfer.send_retry_delay_ms {
            self.send_retry.delay = Duration::from_millis(ms);
        }
        if transfer.max_header_retries.is_some() {
            self.rz.max_header_retries = transfer.max_header_retries;
        }
        if let Some(len) = transfer.block_buffer_len {
            if len < 1024 {
                anyhow::bail!("block_buffer_len {len} is smaller than a 1024 byte subpacket");
            }
            self.rz.block_buffer_len = len;
        }
        if let Some(format) = transfer.header_format {
            if format == HeaderFormat::Bin32 {
                anyhow::bail!("header_format bin32 is not supported");
            }
            self.rz.header_format = format;
        }
        if let Some(policy) = transfer.filename_block {
            self.rz.filename_block = policy;
        }
        if let Some(data_crc) = transfer.data_crc {
            self.rz.data_crc = data_crc;
        }
        if let Some(flags) = transfer.zrinit_flags {
            self.rz.zrinit_flags = flags;
        }
        if transfer.log_file.is_some() {
            self.log_file = transfer.log_file;
        }
        Ok(())
    }
}
