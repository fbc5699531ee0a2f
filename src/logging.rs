//! Logging setup
//!
//! JSON logs on stdout, optionally mirrored into a size-rotated log file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default maximum log file size (10MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default number of rotated files kept next to the live one
pub const DEFAULT_MAX_FILES: usize = 5;

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = fmt::layer().json().with_filter(filter());
    let registry = tracing_subscriber::registry().with(console_layer);

    match log_file {
        Some(path) => {
            let writer = RollingFileWriter::with_defaults(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let file_layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            registry
                .with(file_layer)
                .try_init()
                .context("Failed to install tracing subscriber")?;
        }
        None => registry
            .try_init()
            .context("Failed to install tracing subscriber")?,
    }

    Ok(())
}

/// A log file that rolls over once it grows past `max_size`
///
/// Rolled files get a numeric suffix: `pool.log.1` is the newest,
/// `pool.log.{max_files}` the oldest. Clones share the same file.
#[derive(Debug, Clone)]
pub struct RollingFileWriter {
    state: Arc<Mutex<RollingState>>,
}

#[derive(Debug)]
struct RollingState {
    path: PathBuf,
    file: Option<File>,
    size: u64,
    max_size: u64,
    max_files: usize,
}

impl RollingFileWriter {
    pub fn new(path: impl AsRef<Path>, max_size: u64, max_files: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.file_name().is_none() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("log path {} has no file name", path.display()),
            ));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let file = open_append(&path)?;

        Ok(Self {
            state: Arc::new(Mutex::new(RollingState {
                path,
                file: Some(file),
                size,
                max_size,
                max_files,
            })),
        })
    }

    pub fn with_defaults(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::new(path, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_FILES)
    }

    fn lock(&self) -> MutexGuard<'_, RollingState> {
        // A panic mid-write leaves nothing worse than a torn log line
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RollingState {
    /// Shift the rolled files and start a fresh live file
    ///
    /// The current handle stays open until the shifting succeeded, so a
    /// failed roll leaves the writer appending to the old file.
    fn roll(&mut self) -> io::Result<()> {
        if self.max_files == 0 {
            fs::remove_file(&self.path).or_else(ignore_missing)?;
        } else {
            fs::remove_file(self.rolled_path(self.max_files)).or_else(ignore_missing)?;
            for i in (1..self.max_files).rev() {
                fs::rename(self.rolled_path(i), self.rolled_path(i + 1)).or_else(ignore_missing)?;
            }
            fs::rename(&self.path, self.rolled_path(1)).or_else(ignore_missing)?;
        }

        self.file = None;
        self.reopen()
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = open_append(&self.path)?;
        self.size = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.file = Some(file);
        Ok(())
    }

    fn rolled_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{}", index));
        self.path.with_file_name(name)
    }
}

impl Write for RollingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.lock();

        if state.size > 0 && state.size + buf.len() as u64 > state.max_size {
            if let Err(err) = state.roll() {
                // Keep logging into whatever is open; the next write retries
                eprintln!("Failed to roll log file {}: {}", state.path.display(), err);
            }
        }

        if state.file.is_none() {
            state.reopen()?;
        }
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file not open"))?;
        let written = file.write(buf)?;
        state.size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> fmt::MakeWriter<'a> for RollingFileWriter {
    type Writer = RollingFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn ignore_missing(err: io::Error) -> io::Result<()> {
    if err.kind() == io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_creates_file_and_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("pool.log");

        let _writer = RollingFileWriter::with_defaults(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.log");
        fs::write(&path, "earlier\n").unwrap();

        let mut writer = RollingFileWriter::with_defaults(&path).unwrap();
        writer.write_all(b"later\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
    }

    #[test]
    fn test_rolls_and_keeps_max_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.log");

        let mut writer = RollingFileWriter::new(&path, 64, 2).unwrap();
        for i in 0..20 {
            let line = format!("selection event number {:02} recorded\n", i);
            writer.write_all(line.as_bytes()).unwrap();
        }
        writer.flush().unwrap();

        assert!(dir.path().join("pool.log.1").exists());
        assert!(dir.path().join("pool.log.2").exists());
        assert!(!dir.path().join("pool.log.3").exists());

        let live = fs::read_to_string(&path).unwrap();
        assert!(live.contains("number 19"));
        assert!(live.len() <= 64);
    }

    #[test]
    fn test_failed_roll_keeps_writing_and_recovers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.log");
        let rolled = dir.path().join("pool.log.1");

        // A non-empty directory where the oldest rolled file goes cannot be
        // removed, so rolling fails
        fs::create_dir(&rolled).unwrap();
        fs::write(rolled.join("blocker"), "x").unwrap();

        let mut writer = RollingFileWriter::new(&path, 16, 1).unwrap();
        writer.write_all(b"first line 0001\n").unwrap();
        writer.write_all(b"second line 002\n").unwrap();
        writer.flush().unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "first line 0001\nsecond line 002\n"
        );

        fs::remove_dir_all(&rolled).unwrap();
        writer.write_all(b"third line 0003\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "third line 0003\n");
        assert_eq!(
            fs::read_to_string(&rolled).unwrap(),
            "first line 0001\nsecond line 002\n"
        );
    }

    #[test]
    fn test_clones_share_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.log");

        let mut a = RollingFileWriter::with_defaults(&path).unwrap();
        let mut b = a.clone();
        a.write_all(b"one\n").unwrap();
        b.write_all(b"two\n").unwrap();
        b.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_rejects_path_without_file_name() {
        assert!(RollingFileWriter::with_defaults("/").is_err());
    }
}
