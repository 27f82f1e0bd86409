//! Temp-file lifecycle for one media file.
//!
//! Bytes go to a hidden, uniquely named `.part` file next to the final path.
//! `finalize` fsyncs and renames it into place without clobbering. Dropping a
//! `TempDownload` before `finalize` deletes the temp file.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Suffix of in-progress files.
pub const TEMP_SUFFIX: &str = ".part";

/// How a finalize ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalized {
    Written,
    /// Another writer produced the final file first; ours was discarded.
    AlreadyPresent,
}

pub struct TempDownload {
    file: NamedTempFile,
}

impl TempDownload {
    /// Creates `.<final name>.<random>.part` in the final path's directory.
    pub fn create(final_path: &Path) -> io::Result<Self> {
        let dir = final_path.parent().unwrap_or_else(|| Path::new("."));
        let name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(TEMP_SUFFIX)
            .tempfile_in(dir)?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn file_mut(&mut self) -> &mut File {
        self.file.as_file_mut()
    }

    /// Syncs the data and renames the temp file to `final_path` unless that
    /// path already exists.
    pub fn finalize(self, final_path: &Path) -> io::Result<Finalized> {
        self.file.as_file().sync_all()?;
        match self.file.persist_noclobber(final_path) {
            Ok(_) => Ok(Finalized::Written),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                // `e.file` drops here and removes the temp file.
                Ok(Finalized::AlreadyPresent)
            }
            Err(e) => Err(e.error),
        }
    }
}

/// Temp files left in `dir` by this module (for tests and diagnostics).
pub fn leftover_temp_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_temp = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.') && n.ends_with(TEMP_SUFFIX));
        if is_temp {
            found.push(path);
        }
    }
    Ok(found)
}
