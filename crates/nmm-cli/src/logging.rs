//! Diagnostic sink: plain lines on stdout, or appended to a log file.
//!
//! File output never holds a handle between events. The file is truncated
//! once when the logger is installed; every event then reopens it in append
//! mode, writes its line and closes it again.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing_subscriber::fmt::MakeWriter;

/// [`MakeWriter`] that opens `path` in append mode for every event.
#[derive(Debug, Clone)]
pub struct AppendFile {
    path: PathBuf,
}

impl AppendFile {
    /// Truncate (or create) `path` and return a writer factory for it.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        File::create(path)?;
        Ok(Self { path: path.to_path_buf() })
    }
}

/// Per-event handle. An open failure is reported on the first write.
pub enum AppendWriter {
    Open(File),
    Failed(io::ErrorKind),
}

impl Write for AppendWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Open(f) => f.write(buf),
            Self::Failed(kind) => Err(io::Error::from(*kind)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Open(f) => f.flush(),
            Self::Failed(_) => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for AppendFile {
    type Writer = AppendWriter;

    fn make_writer(&'a self) -> Self::Writer {
        match OpenOptions::new().append(true).create(true).open(&self.path) {
            Ok(f) => AppendWriter::Open(f),
            Err(e) => AppendWriter::Failed(e.kind()),
        }
    }
}

/// Install the process-wide subscriber.
///
/// Lines carry only the message: no timestamp, level or target.
pub fn init(level: tracing::Level, log_file: Option<&Path>) -> io::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_level(false)
        .without_time();
    match log_file {
        Some(path) => builder.with_ansi(false).with_writer(AppendFile::create(path)?).init(),
        None => builder.init(),
    }
    Ok(())
}
