//! Logging init: file under the XDG state dir, falling back to stderr.

use anyhow::Result;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Either the log file or stderr (when cloning the file handle fails).
enum FileOrStderr {
    File(fs::File),
    Stderr,
}

impl io::Write for FileOrStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileOrStderr::File(f) => f.write(buf),
            FileOrStderr::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileOrStderr::File(f) => f.flush(),
            FileOrStderr::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct FileMakeWriter(fs::File);

impl<'a> MakeWriter<'a> for FileMakeWriter {
    type Writer = FileOrStderr;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(FileOrStderr::File)
            .unwrap_or(FileOrStderr::Stderr)
    }
}

/// Filter used when `RUST_LOG` is unset. `verbose` raises the crate's own
/// level (`sharegrab` prefixes both crates' targets): 0 → debug, 1+ → trace.
pub fn default_filter(verbose: u8) -> String {
    match verbose {
        0 => "info,sharegrab=debug".to_string(),
        _ => "info,sharegrab=trace".to_string(),
    }
}

fn env_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)))
}

/// `~/.local/state/sharegrab/sharegrab.log`.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sharegrab")?;
    Ok(xdg_dirs.get_state_home().join("sharegrab.log"))
}

/// Initialize structured logging to the state-dir log file.
/// Returns Err (e.g. state dir unwritable) so the caller can fall back to stderr.
pub fn init_logging(verbose: u8) -> Result<()> {
    let path = log_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(BoxMakeWriter::new(FileMakeWriter(file)))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    tracing::info!("sharegrab logging initialized at {}", path.display());
    Ok(())
}

/// Stderr-only logging, for when `init_logging` fails.
pub fn init_logging_stderr(verbose: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}
