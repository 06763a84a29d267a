use std::path::Path;

use serde::Deserialize;

use crate::{com::Com, protocol::FileStorageHandler};

use super::{
    constants::*,
    error::{TransmissionError, TransmissionResult},
    escape::FrameEnd,
    header::{Header, HeaderFormat, ZFrameType},
    reader::{await_handshake, read_data_block, read_header, DataCrc},
    writer::HeaderWriter,
    Zmodem,
};

/// Terminator accepted for the ZFILE name block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileNameBlock {
    #[default]
    RequireZcrcw,
    AnyFrameEnd,
}

impl FileNameBlock {
    pub fn accepts(self, end: FrameEnd) -> bool {
        match self {
            FileNameBlock::RequireZcrcw => end == FrameEnd::Crcw,
            FileNameBlock::AnyFrameEnd => true,
        }
    }
}

/// ZCOMPL status for a ZCOMMAND, commands are never run.
pub const COMMAND_REFUSED: u32 = 1;

#[derive(Debug, Clone)]
pub struct RzOptions {
    /// Raw bytes that start a session, empty to start right away.
    pub handshake: Vec<u8>,
    pub header_format: HeaderFormat,
    /// Consecutive header timeouts tolerated, `None` retries forever.
    pub max_header_retries: Option<u32>,
    pub block_buffer_len: usize,
    pub filename_block: FileNameBlock,
    pub data_crc: DataCrc,
    /// ZF0 of our ZRINIT
    pub zrinit_flags: u8,
}

impl Default for RzOptions {
    fn default() -> Self {
        Self {
            handshake: b"rz\r".to_vec(),
            header_format: HeaderFormat::Hex,
            max_header_retries: None,
            block_buffer_len: DEFAULT_BLOCK_BUFFER_LEN,
            filename_block: FileNameBlock::default(),
            data_crc: DataCrc::default(),
            zrinit_flags: zrinit_flag::CANFDX | zrinit_flag::CANOVIO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvState {
    AwaitingStart,
    AwaitingHeader,
    HandlingFile(Header),
    ReceivingData,
    Done,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub name: String,
    pub announced_size: Option<u64>,
    pub bytes: u64,
}

#[derive(Debug)]
pub enum SessionStatus {
    Completed,
    Aborted(TransmissionError),
}

#[derive(Debug)]
pub struct SessionOutcome {
    pub status: SessionStatus,
    pub bytes_received: u64,
    /// Corrupted headers and blocks that were recovered from.
    pub errors: usize,
    /// Every file that was opened, including one cut short by an abort.
    pub files: Vec<ReceivedFile>,
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, SessionStatus::Completed)
    }
}

pub struct Rz {
    opt: RzOptions,
    state: RecvState,
    writer: HeaderWriter,
    errors: usize,
    timeouts: u32,
    /// bytes of the current file, the position reported in ZRPOS/ZACK
    file_pos: u64,
    bytes_received: u64,
    cur_file: Option<ReceivedFile>,
    files: Vec<ReceivedFile>,
    abort_reason: Option<TransmissionError>,
}

impl Rz {
    pub fn new(opt: RzOptions) -> Self {
        let mut opt = opt;
        // no BIN32 support, never offer it
        opt.zrinit_flags &= !zrinit_flag::CANFC32;
        Self {
            writer: HeaderWriter::new(opt.header_format),
            opt,
            state: RecvState::AwaitingStart,
            errors: 0,
            timeouts: 0,
            file_pos: 0,
            bytes_received: 0,
            cur_file: None,
            files: Vec::new(),
            abort_reason: None,
        }
    }

    pub fn state(&self) -> RecvState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, RecvState::Done | RecvState::Aborted)
    }

    /// Runs one session to its end. The output file and the connection are
    /// closed on every path.
    pub fn recv(
        &mut self,
        com: &mut dyn Com,
        storage: &mut dyn FileStorageHandler,
    ) -> SessionOutcome {
        self.reset();
        while self.is_active() {
            if let Err(err) = self.update(com, storage) {
                self.abort(com, err);
            }
        }
        self.finish(com, storage)
    }

    fn reset(&mut self) {
        self.state = RecvState::AwaitingStart;
        self.writer.reset();
        self.errors = 0;
        self.timeouts = 0;
        self.file_pos = 0;
        self.bytes_received = 0;
        self.cur_file = None;
        self.files.clear();
        self.abort_reason = None;
    }

    pub fn update(
        &mut self,
        com: &mut dyn Com,
        storage: &mut dyn FileStorageHandler,
    ) -> TransmissionResult<()> {
        match self.state {
            RecvState::AwaitingStart => {
                await_handshake(com, &self.opt.handshake)?;
                log::info!("zmodem session start");
                self.state = RecvState::AwaitingHeader;
                Ok(())
            }
            RecvState::AwaitingHeader => self.await_header(com, storage),
            RecvState::HandlingFile(header) => self.handle_file(com, storage, &header),
            RecvState::ReceivingData => self.receive_data(com, storage),
            RecvState::Done | RecvState::Aborted => Ok(()),
        }
    }

    /// Positions on the wire are 32 bit, larger files can't be acknowledged.
    fn position(&self) -> TransmissionResult<u32> {
        u32::try_from(self.file_pos)
            .map_err(|_| TransmissionError::Unsupported("file offset beyond 4 GiB"))
    }

    fn send_zrinit(&mut self, com: &mut dyn Com) -> TransmissionResult<()> {
        let flags = self.opt.zrinit_flags;
        self.writer.send_flags(com, ZFrameType::RInit, 0, 0, 0, flags)
    }

    fn request_zpos(&mut self, com: &mut dyn Com) -> TransmissionResult<()> {
        let pos = self.position()?;
        self.writer.send_number(com, ZFrameType::RPos, pos)
    }

    fn on_timeout(&mut self, com: &mut dyn Com) -> TransmissionResult<()> {
        self.timeouts += 1;
        if let Some(max) = self.opt.max_header_retries {
            if self.timeouts > max {
                return Err(TransmissionError::TooManyRetries(max));
            }
        }
        log::debug!("timeout #{} waiting for header", self.timeouts);
        match self.writer.resend_last_header(com) {
            Err(TransmissionError::NoPriorHeader) => self.send_zrinit(com),
            res => res,
        }
    }

    fn await_header(
        &mut self,
        com: &mut dyn Com,
        storage: &mut dyn FileStorageHandler,
    ) -> TransmissionResult<()> {
        let header = match read_header(com) {
            Ok(header) => header,
            Err(TransmissionError::Timeout) => return self.on_timeout(com),
            Err(err) if err.is_corruption() => {
                self.errors += 1;
                log::warn!("bad header: {err}");
                return self.request_zpos(com);
            }
            Err(err) => return Err(err),
        };
        self.timeouts = 0;

        match header.frame_type {
            ZFrameType::RQInit => self.send_zrinit(com),
            ZFrameType::Eof => {
                if header.number() != self.position()? {
                    log::warn!(
                        "ZEOF at {}, have {} bytes",
                        header.number(),
                        self.file_pos
                    );
                }
                self.finish_file(storage)?;
                self.send_zrinit(com)
            }
            ZFrameType::Fin => {
                self.writer.send_header(com, &Header::empty(ZFrameType::Fin))?;
                self.finish_file(storage)?;
                log::info!(
                    "zmodem session finished, {} bytes received",
                    self.bytes_received
                );
                self.state = RecvState::Done;
                Ok(())
            }
            ZFrameType::File => {
                self.state = RecvState::HandlingFile(header);
                Ok(())
            }
            ZFrameType::Data => {
                if self.cur_file.is_none() {
                    log::error!("got ZDATA without ZFILE");
                    Zmodem::cancel(com)?;
                    return Err(TransmissionError::Aborted(ZFrameType::Data));
                }
                if header.number() != self.position()? {
                    self.errors += 1;
                    log::warn!("ZDATA at {}, expected {}", header.number(), self.file_pos);
                    return self.request_zpos(com);
                }
                self.state = RecvState::ReceivingData;
                Ok(())
            }
            ZFrameType::SInit => {
                match read_data_block(com, self.opt.block_buffer_len, self.opt.data_crc) {
                    Ok((block, _)) => {
                        log::debug!("ZSINIT flags x{:02X}, attention {block:?}", header.f0());
                        self.writer.send_number(com, ZFrameType::Ack, 0)
                    }
                    Err(err) if err.is_fatal() => Err(err),
                    Err(err) => {
                        self.errors += 1;
                        log::warn!("bad ZSINIT block: {err}");
                        self.writer.send_number(com, ZFrameType::Nak, 0)
                    }
                }
            }
            ZFrameType::FreeCnt => {
                // 0 means unlimited, don't tell a remote about local disk space
                self.writer.send_number(com, ZFrameType::Ack, 0)
            }
            ZFrameType::Challenge => self.writer.send_number(com, ZFrameType::Ack, header.number()),
            ZFrameType::Command => {
                match read_data_block(com, self.opt.block_buffer_len, self.opt.data_crc) {
                    Ok((block, _)) => {
                        let cmd = block.split(|b| *b == 0).next().unwrap_or_default();
                        log::warn!(
                            "remote wanted to execute '{}', not executed",
                            String::from_utf8_lossy(cmd)
                        );
                        self.writer
                            .send_number(com, ZFrameType::Compl, COMMAND_REFUSED)
                    }
                    Err(err) if err.is_fatal() => Err(err),
                    Err(err) => {
                        self.errors += 1;
                        log::warn!("bad ZCOMMAND block: {err}");
                        self.writer.send_number(com, ZFrameType::Nak, 0)
                    }
                }
            }
            ZFrameType::Nak => {
                log::error!("sender rejected our last header");
                self.writer.send_number(com, ZFrameType::Abort, 0)?;
                Err(TransmissionError::Aborted(ZFrameType::Nak))
            }
            ZFrameType::Abort | ZFrameType::FErr | ZFrameType::Can => {
                log::error!("sender ended the session: {header}");
                self.writer.send_header(com, &Header::empty(ZFrameType::Fin))?;
                Err(TransmissionError::Aborted(header.frame_type))
            }
            unk => {
                log::error!("unsupported header {header}");
                Err(TransmissionError::Aborted(unk))
            }
        }
    }

    fn handle_file(
        &mut self,
        com: &mut dyn Com,
        storage: &mut dyn FileStorageHandler,
        header: &Header,
    ) -> TransmissionResult<()> {
        self.state = RecvState::AwaitingHeader;
        match header.f0() {
            0 | zfile_flag::ZCBIN => {}
            zfile_flag::ZCNL => log::warn!("newline conversion requested, receiving binary"),
            zfile_flag::ZCRESUM => log::warn!("resume requested, receiving from the start"),
            conv => log::warn!("unknown conversion option {conv}, receiving binary"),
        }

        let (block, end) = match read_data_block(com, self.opt.block_buffer_len, self.opt.data_crc)
        {
            Ok(res) => res,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                self.errors += 1;
                log::warn!("bad file name block: {err}");
                return self.send_zrinit(com);
            }
        };
        if !self.opt.filename_block.accepts(end) {
            self.errors += 1;
            log::warn!("file name block ended with {end:?}");
            return self.send_zrinit(com);
        }
        let Some((name, announced_size)) = parse_file_info(&block) else {
            self.errors += 1;
            log::warn!("no usable file name in ZFILE");
            return self.send_zrinit(com);
        };

        self.finish_file(storage)?;
        storage.open_file(&name, announced_size)?;
        log::info!(
            "receiving {name} ({})",
            announced_size.map_or_else(|| "size unknown".to_string(), |s| format!("{s} bytes"))
        );
        self.cur_file = Some(ReceivedFile {
            name,
            announced_size,
            bytes: 0,
        });
        self.file_pos = 0;
        self.request_zpos(com)
    }

    fn receive_data(
        &mut self,
        com: &mut dyn Com,
        storage: &mut dyn FileStorageHandler,
    ) -> TransmissionResult<()> {
        let (block, end) = match read_data_block(com, self.opt.block_buffer_len, self.opt.data_crc)
        {
            Ok(res) => res,
            Err(err) if err.is_corruption() => {
                self.errors += 1;
                log::warn!("bad subpacket at {}: {err}", self.file_pos);
                self.state = RecvState::AwaitingHeader;
                return self.request_zpos(com);
            }
            Err(err) => return Err(err),
        };

        storage.append(&block)?;
        let len = block.len() as u64;
        self.file_pos += len;
        self.bytes_received += len;
        if let Some(file) = &mut self.cur_file {
            file.bytes += len;
        }

        if end.ack_required() {
            let pos = self.position()?;
            self.writer.send_number(com, ZFrameType::Ack, pos)?;
        }
        if end.ends_frame() {
            self.state = RecvState::AwaitingHeader;
        }
        Ok(())
    }

    fn finish_file(&mut self, storage: &mut dyn FileStorageHandler) -> TransmissionResult<()> {
        if let Some(mut file) = self.cur_file.take() {
            if let Some(name) = storage.current_file_name() {
                file.name = name;
            }
            let written = storage.current_file_length();
            if written != file.bytes {
                log::warn!("{}: {written} bytes stored, {} received", file.name, file.bytes);
            }
            storage.close()?;
            log::info!("received {} ({} bytes)", file.name, file.bytes);
            self.files.push(file);
        }
        Ok(())
    }

    fn abort(&mut self, com: &mut dyn Com, err: TransmissionError) {
        log::error!("zmodem receive aborted: {err}");
        // Aborted: replies already sent, Closed/Cancelled: nobody to tell
        if !matches!(
            err,
            TransmissionError::Aborted(_) | TransmissionError::Closed | TransmissionError::Cancelled
        ) {
            if let Err(send_err) = Zmodem::cancel(com) {
                log::warn!("could not send abort sequence: {send_err}");
            }
        }
        self.abort_reason = Some(err);
        self.state = RecvState::Aborted;
    }

    fn finish(
        &mut self,
        com: &mut dyn Com,
        storage: &mut dyn FileStorageHandler,
    ) -> SessionOutcome {
        if let Err(err) = self.finish_file(storage) {
            log::error!("closing file failed: {err}");
            if self.abort_reason.is_none() {
                self.abort_reason = Some(err);
            }
        }
        if let Err(err) = com.disconnect() {
            log::warn!("disconnect failed: {err}");
        }
        let status = match self.abort_reason.take() {
            Some(err) => SessionStatus::Aborted(err),
            None => SessionStatus::Completed,
        };
        if self.errors > 0 {
            log::info!("recovered from {} transmission errors", self.errors);
        }
        SessionOutcome {
            status,
            bytes_received: self.bytes_received,
            errors: self.errors,
            files: std::mem::take(&mut self.files),
        }
    }
}

/// ZFILE payload: NUL terminated name, then the decimal length
/// (optionally followed by more space separated fields).
fn parse_file_info(block: &[u8]) -> Option<(String, Option<u64>)> {
    let mut parts = block.splitn(2, |b| *b == 0);
    let name = String::from_utf8_lossy(parts.next()?).replace('\\', "/");
    let name = Path::new(&name).file_name()?.to_string_lossy().to_string();
    if name.is_empty() {
        return None;
    }
    let size = parts.next().and_then(|info| {
        let digits: String = info
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .map(|b| *b as char)
            .collect();
        digits.parse::<u64>().ok()
    });
    Some((name, size))
}
