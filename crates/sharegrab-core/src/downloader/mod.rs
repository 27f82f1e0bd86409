//! Persists the items of a `MediaDescriptor` to disk.
//!
//! One GET per item, streamed into a temp file beside the destination and
//! renamed into place once complete. An existing destination file is taken
//! as already downloaded.

pub mod storage;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::context::FetchContext;
use crate::error::DownloadError;
use crate::http::{HttpClient, HttpError};
use crate::model::{MediaDescriptor, MediaItem};
use storage::{Finalized, TempDownload};

/// Bound on a single media transfer. API calls use the context timeout; media
/// bodies are much larger.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(3600);

/// An item paired with the path it will be written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub item: MediaItem,
    pub path: PathBuf,
}

/// Destination paths for every item of `descriptor` under `dir`.
///
/// `<title>.<ext>`; when several items share an extension each gets a 1-based
/// `_<n>` suffix so every item has its own file.
pub fn plan(descriptor: &MediaDescriptor, dir: &Path) -> Vec<PlannedFile> {
    let mut per_extension: HashMap<&str, usize> = HashMap::new();
    for item in descriptor.items() {
        *per_extension.entry(&item.suggested_extension).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    descriptor
        .items()
        .iter()
        .map(|item| {
            let ext = item.suggested_extension.as_str();
            let n = seen.entry(ext).or_default();
            *n += 1;
            let stem = if per_extension[ext] > 1 {
                format!("{}_{}", descriptor.title(), n)
            } else {
                descriptor.title().to_string()
            };
            let name = if ext.is_empty() {
                stem
            } else {
                format!("{stem}.{ext}")
            };
            PlannedFile {
                item: item.clone(),
                path: dir.join(name),
            }
        })
        .collect()
}

pub struct Downloader<'a> {
    http: &'a dyn HttpClient,
    context: &'a FetchContext,
    transfer_timeout: Duration,
}

impl<'a> Downloader<'a> {
    /// Media requests carry the headers and cookies of `context` (platforms
    /// check `Referer` on their CDNs).
    pub fn new(http: &'a dyn HttpClient, context: &'a FetchContext) -> Self {
        Self {
            http,
            context,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
        }
    }

    pub fn transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    /// Creates `dir` if needed.
    pub fn prepare_dir(&self, dir: &Path) -> Result<(), DownloadError> {
        std::fs::create_dir_all(dir).map_err(|source| DownloadError::WriteFailure {
            path: dir.to_path_buf(),
            source,
        })
    }

    /// Downloads every item, returning one path per item in order.
    pub fn download(
        &self,
        descriptor: &MediaDescriptor,
        dir: &Path,
    ) -> Result<Vec<PathBuf>, DownloadError> {
        self.prepare_dir(dir)?;
        plan(descriptor, dir)
            .iter()
            .map(|planned| self.fetch_item(planned))
            .collect()
    }

    /// Downloads one planned file unless it already exists.
    pub fn fetch_item(&self, planned: &PlannedFile) -> Result<PathBuf, DownloadError> {
        let path = &planned.path;
        let url = &planned.item.source_url;
        if path.exists() {
            tracing::debug!(path = %path.display(), "already downloaded, skipping");
            return Ok(path.clone());
        }

        let write_failure = |source| DownloadError::WriteFailure {
            path: path.clone(),
            source,
        };
        let mut temp = TempDownload::create(path).map_err(write_failure)?;
        let request = self.context.get(url).timeout(self.transfer_timeout);

        let written = match self.http.fetch_to(&request, temp.file_mut()) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(%url, temp = %temp.path().display(), "download failed, discarding temp file: {e}");
                return Err(match e {
                    HttpError::Sink(source) => write_failure(source),
                    other => DownloadError::NetworkFailure {
                        url: url.clone(),
                        reason: other.to_string(),
                    },
                });
            }
        };
        if written == 0 {
            tracing::warn!(%url, "empty response body, discarding temp file");
            return Err(DownloadError::NetworkFailure {
                url: url.clone(),
                reason: "empty response body".to_string(),
            });
        }

        match temp.finalize(path).map_err(write_failure)? {
            Finalized::Written => {
                tracing::info!(path = %path.display(), bytes = written, "wrote file");
            }
            Finalized::AlreadyPresent => {
                tracing::debug!(path = %path.display(), "written concurrently, keeping existing file");
            }
        }
        Ok(path.clone())
    }
}
