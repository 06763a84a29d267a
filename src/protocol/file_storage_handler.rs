use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Where received files end up. One file is open at a time.
pub trait FileStorageHandler {
    fn open_file(&mut self, file_name: &str, total_size: Option<u64>) -> io::Result<()>;
    fn append(&mut self, data: &[u8]) -> io::Result<()>;
    /// Closing without an open file is a no-op.
    fn close(&mut self) -> io::Result<()>;

    fn current_file_name(&self) -> Option<String>;
    fn current_file_length(&self) -> u64;
}

struct OpenFile {
    name: String,
    writer: BufWriter<File>,
    length: u64,
}

pub struct DiskStorageHandler {
    download_dir: PathBuf,
    cur_file: Option<OpenFile>,
}

impl DiskStorageHandler {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            cur_file: None,
        }
    }
}

impl FileStorageHandler for DiskStorageHandler {
    fn open_file(&mut self, file_name: &str, total_size: Option<u64>) -> io::Result<()> {
        self.close()?;
        let Some(name) = Path::new(file_name).file_name() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid file name '{file_name}'"),
            ));
        };
        let path = self.download_dir.join(name);
        log::info!(
            "writing {} ({} bytes announced)",
            path.display(),
            total_size.map_or_else(|| "no size".to_string(), |s| s.to_string())
        );
        let file = File::create(&path)?;
        self.cur_file = Some(OpenFile {
            name: name.to_string_lossy().to_string(),
            writer: BufWriter::new(file),
            length: 0,
        });
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        let Some(file) = &mut self.cur_file else {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no file open"));
        };
        file.writer.write_all(data)?;
        file.length += data.len() as u64;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.cur_file.take() {
            file.writer.flush()?;
            log::debug!("closed {} after {} bytes", file.name, file.length);
        }
        Ok(())
    }

    fn current_file_name(&self) -> Option<String> {
        self.cur_file.as_ref().map(|f| f.name.clone())
    }

    fn current_file_length(&self) -> u64 {
        self.cur_file.as_ref().map_or(0, |f| f.length)
    }
}

/// Keeps received files in memory.
#[derive(Clone, Default)]
pub struct TestStorageHandler {
    cur_file_name: Option<String>,
    pub announced_sizes: HashMap<String, Option<u64>>,
    pub file: HashMap<String, Vec<u8>>,
    pub closed: usize,
}

impl TestStorageHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileStorageHandler for TestStorageHandler {
    fn open_file(&mut self, file_name: &str, total_size: Option<u64>) -> io::Result<()> {
        self.cur_file_name = Some(file_name.to_string());
        self.announced_sizes.insert(file_name.to_string(), total_size);
        self.file.insert(file_name.to_string(), Vec::new());
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        let Some(file) = self
            .cur_file_name
            .as_ref()
            .and_then(|name| self.file.get_mut(name))
        else {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no file open"));
        };
        file.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if self.cur_file_name.take().is_some() {
            self.closed += 1;
        }
        Ok(())
    }

    fn current_file_name(&self) -> Option<String> {
        self.cur_file_name.clone()
    }

    fn current_file_length(&self) -> u64 {
        self.cur_file_name
            .as_ref()
            .and_then(|name| self.file.get(name))
            .map_or(0, |f| f.len() as u64)
    }
}
