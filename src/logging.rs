// Logging setup, built on tracing-subscriber.
//
// The console layer is always installed. Outside of debug and testing two
// size-rotated files are attached as well: one receiving everything from
// DEBUG up, one receiving only errors.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::AppConfig;

const DEFAULT_FILTER: &str = "bbs=debug,tower_http=debug,axum::rejection=trace";

/// Initialize logging based on configuration.
pub fn init_logging(config: &AppConfig) -> anyhow::Result<()> {
    let console_layer = tracing_subscriber::fmt::layer().with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()),
    );

    let (debug_layer, error_layer) = if config.file_logging_enabled() {
        let debug_file = RotatingFile::open(
            config.debug_log_path(),
            config.log_max_bytes,
            config.log_backup_count,
        )?;
        let error_file = RotatingFile::open(
            config.error_log_path(),
            config.log_max_bytes,
            config.log_backup_count,
        )?;
        (
            Some(file_layer(debug_file, LevelFilter::DEBUG)),
            Some(file_layer(error_file, LevelFilter::ERROR)),
        )
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(debug_layer)
        .with(error_layer)
        .try_init()?;

    tracing::trace!(
        "Logging initialized: files={}, debug_log={}, error_log={}",
        config.file_logging_enabled(),
        config.debug_log_path().display(),
        config.error_log_path().display()
    );

    Ok(())
}

/// Plain-text file layer: `timestamp LEVEL: message [in file:line]` style,
/// with the source location carried by the event metadata.
fn file_layer<S>(writer: RotatingFile, level: LevelFilter) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(writer)
        .with_filter(level)
        .boxed()
}

/// A log file capped at `max_bytes`, keeping up to `backup_count` older
/// generations as `name.1` (newest) to `name.N` (oldest).
#[derive(Debug)]
pub struct RotatingFile {
    inner: Mutex<RotatingState>,
}

#[derive(Debug)]
struct RotatingState {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    backup_count: usize,
}

impl RotatingFile {
    /// Open (or create) the log file in append mode, creating parent
    /// directories as needed.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, backup_count: usize) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = open_append(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            inner: Mutex::new(RotatingState {
                path,
                file,
                written,
                max_bytes,
                backup_count,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RotatingState> {
        // A panic mid-write leaves nothing worth discarding
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn backup_path(path: &Path, generation: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}

impl RotatingState {
    fn should_rotate(&self, incoming: usize) -> bool {
        self.max_bytes > 0 && self.written > 0 && self.written + incoming as u64 > self.max_bytes
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backup_count > 0 {
            for generation in (1..self.backup_count).rev() {
                let from = backup_path(&self.path, generation);
                if from.exists() {
                    fs::rename(&from, backup_path(&self.path, generation + 1))?;
                }
            }
            fs::rename(&self.path, backup_path(&self.path, 1))?;
            self.file = open_append(&self.path)?;
        } else {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
        }

        self.written = 0;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.should_rotate(buf.len()) {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }
}

/// Per-event handle returned by [`RotatingFile::make_writer`].
pub struct RotatingWriter<'a> {
    file: &'a RotatingFile,
}

impl Write for RotatingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.lock().file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingWriter { file: self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_line(file: &RotatingFile, line: &str) {
        let mut writer = file.make_writer();
        writer.write_all(line.as_bytes()).unwrap();
        writer.flush().unwrap();
    }

    #[test]
    fn test_rotates_when_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("debug.log");
        let file = RotatingFile::open(&path, 10, 2).unwrap();

        write_line(&file, "aaaaaaaa\n");
        write_line(&file, "bbbbbbbb\n");
        write_line(&file, "cccccccc\n");
        write_line(&file, "dddddddd\n");

        assert_eq!(fs::read_to_string(&path).unwrap(), "dddddddd\n");
        assert_eq!(fs::read_to_string(backup_path(&path, 1)).unwrap(), "cccccccc\n");
        assert_eq!(fs::read_to_string(backup_path(&path, 2)).unwrap(), "bbbbbbbb\n");
        // Oldest generation dropped
        assert!(!backup_path(&path, 3).exists());
    }

    #[test]
    fn test_zero_max_bytes_never_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.log");
        let file = RotatingFile::open(&path, 0, 3).unwrap();

        for _ in 0..5 {
            write_line(&file, "0123456789\n");
        }

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 5);
        assert!(!backup_path(&path, 1).exists());
    }

    #[test]
    fn test_reopen_counts_existing_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");
        fs::write(&path, "existing!\n").unwrap();

        let file = RotatingFile::open(&path, 12, 1).unwrap();
        write_line(&file, "next\n");

        assert_eq!(fs::read_to_string(&path).unwrap(), "next\n");
        assert_eq!(fs::read_to_string(backup_path(&path, 1)).unwrap(), "existing!\n");
    }

    #[test]
    fn test_file_layers_split_by_level() {
        let dir = tempfile::tempdir().unwrap();
        let debug_path = dir.path().join("debug.log");
        let error_path = dir.path().join("error.log");

        let subscriber = tracing_subscriber::registry()
            .with(file_layer(
                RotatingFile::open(&debug_path, 0, 1).unwrap(),
                LevelFilter::DEBUG,
            ))
            .with(file_layer(
                RotatingFile::open(&error_path, 0, 1).unwrap(),
                LevelFilter::ERROR,
            ));

        tracing::subscriber::with_default(subscriber, || {
            tracing::trace!("trace event");
            tracing::debug!("debug event");
            tracing::warn!("warn event");
            tracing::error!("error event");
        });

        let debug_log = fs::read_to_string(&debug_path).unwrap();
        assert!(!debug_log.contains("trace event"));
        assert!(debug_log.contains("debug event"));
        assert!(debug_log.contains("warn event"));
        assert!(debug_log.contains("error event"));
        assert!(debug_log.contains("logging.rs"));
        assert!(!debug_log.contains("\x1b["));

        let error_log = fs::read_to_string(&error_path).unwrap();
        assert!(!error_log.contains("debug event"));
        assert!(!error_log.contains("warn event"));
        assert!(error_log.contains("ERROR"));
        assert!(error_log.contains("error event"));
    }

    #[test]
    fn test_backup_path() {
        let path = Path::new("/var/log/bbs/error.log");
        assert_eq!(backup_path(path, 3), PathBuf::from("/var/log/bbs/error.log.3"));
    }
}
