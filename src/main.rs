use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

use icy_rz::{
    com::{Com, ComModemImpl, ComRawImpl},
    data::Options,
    protocol::{DiskStorageHandler, Rz, SessionStatus},
};

const LOG_PATTERN: &str = "{d(%H:%M:%S%.3f)} {h({l})} {t} - {m}{n}";

#[derive(Parser, Debug)]
#[command(name = "icy_rz", version, about = "Receive files with ZMODEM")]
struct Args {
    /// Serial device, overrides the options file
    #[arg(long)]
    device: Option<String>,

    #[arg(long)]
    baud: Option<usize>,

    /// Use a raw TCP connection instead of the serial device
    #[arg(long, value_name = "HOST:PORT")]
    tcp: Option<String>,

    /// Download directory
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Options file, defaults to options.toml in the config directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give up after this many consecutive header timeouts
    #[arg(long)]
    max_retries: Option<u32>,

    /// Start with the header exchange, the sender is already running
    #[arg(long)]
    no_handshake: bool,

    /// -v info, -vv debug, -vvv trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn apply(&self, options: &mut Options) {
        if let Some(device) = &self.device {
            options.modem.device = device.clone();
        }
        if let Some(baud) = self.baud {
            options.modem.baud_rate = baud;
        }
        if let Some(dir) = &self.dir {
            options.download_dir = dir.clone();
        }
        if self.max_retries.is_some() {
            options.rz.max_header_retries = self.max_retries;
        }
        if self.no_handshake {
            options.rz.handshake.clear();
        }
    }
}

fn init_logging(verbose: u8, log_file: Option<&Path>) -> anyhow::Result<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let mut builder =
        Config::builder().appender(Appender::builder().build("stderr", Box::new(stderr)));
    let mut root = Root::builder().appender("stderr");

    if let Some(path) = log_file {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build(path)
            .with_context(|| format!("can't open log file {}", path.display()))?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    let config = builder.build(root.build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn open_connection(args: &Args, options: &Options) -> anyhow::Result<Box<dyn Com>> {
    let com: Box<dyn Com> = match &args.tcp {
        Some(address) => Box::new(
            ComRawImpl::connect(address, options.recv_timeout, options.send_retry)
                .with_context(|| format!("can't connect to {address}"))?,
        ),
        None => Box::new(
            ComModemImpl::open(&options.modem, options.recv_timeout, options.send_retry)
                .with_context(|| format!("can't open {}", options.modem.device))?,
        ),
    };
    Ok(com)
}

/// Returns whether the session completed.
fn run(args: Args) -> anyhow::Result<bool> {
    let mut options = Options::load_options(args.config.as_deref())?;
    args.apply(&mut options);
    init_logging(args.verbose, options.log_file.as_deref())?;

    if !options.download_dir.is_dir() {
        anyhow::bail!(
            "download directory {} doesn't exist",
            options.download_dir.display()
        );
    }

    let mut com = open_connection(&args, &options)?;
    log::info!("receiving via {} into {}", com.get_name(), options.download_dir.display());

    let mut storage = DiskStorageHandler::new(&options.download_dir);
    let mut rz = Rz::new(options.rz.clone());
    let outcome = rz.recv(com.as_mut(), &mut storage);

    for file in &outcome.files {
        match file.announced_size {
            Some(size) => println!("{} {}/{} bytes", file.name, file.bytes, size),
            None => println!("{} {} bytes", file.name, file.bytes),
        }
    }

    match outcome.status {
        SessionStatus::Completed => {
            log::info!(
                "transfer complete, {} bytes, {} errors recovered",
                outcome.bytes_received,
                outcome.errors
            );
            Ok(true)
        }
        SessionStatus::Aborted(err) => {
            log::error!("transfer aborted after {} bytes: {err}", outcome.bytes_received);
            Ok(false)
        }
    }
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("icy_rz: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_options() {
        let args = Args::parse_from([
            "icy_rz",
            "--device",
            "/dev/ttyS1",
            "--baud",
            "38400",
            "--dir",
            "/tmp",
            "--max-retries",
            "4",
            "--no-handshake",
            "-vv",
        ]);
        let mut options = Options::default();
        args.apply(&mut options);
        assert_eq!("/dev/ttyS1", options.modem.device);
        assert_eq!(38400, options.modem.baud_rate);
        assert_eq!(PathBuf::from("/tmp"), options.download_dir);
        assert_eq!(Some(4), options.rz.max_header_retries);
        assert!(options.rz.handshake.is_empty());
        assert_eq!(2, args.verbose);
    }

    #[test]
    fn test_args_keep_options() {
        let args = Args::parse_from(["icy_rz"]);
        let mut options = Options::default();
        args.apply(&mut options);
        assert_eq!(b"rz\r".to_vec(), options.rz.handshake);
        assert_eq!(None, options.rz.max_header_retries);
        assert!(args.tcp.is_none());
    }
}
