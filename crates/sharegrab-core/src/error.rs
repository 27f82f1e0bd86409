//! Error taxonomy for the pipeline stages.
//!
//! Each stage reports its own typed error. `PipelineError` wraps one together
//! with the stage that produced it, so callers can tell markup drift from a
//! dead network from a full disk without matching on strings.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::control::Cancelled;
use crate::http::HttpError;

/// Failures raised by a platform adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A token, cookie or signature pre-step failed.
    #[error("auth failure: {0}")]
    AuthFailure(String),
    /// The primary data request failed or answered non-2xx.
    #[error("upstream error: {0}")]
    UpstreamError(String),
    /// The expected marker or JSON path is absent. Usually means the site
    /// changed its markup and the adapter needs updating.
    #[error("parse failure: {0}")]
    ParseFailure(String),
}

/// Failures while following a share link to its canonical URL.
///
/// Every variant records the last URL reached.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("too many redirects ({hops}), last location {final_url}")]
    TooManyRedirects { hops: usize, final_url: String },
    #[error("no resource id found in {final_url}")]
    IdNotFound { final_url: String },
    #[error("request to {final_url} failed: {source}")]
    Network {
        final_url: String,
        #[source]
        source: HttpError,
    },
    #[error("{final_url} answered HTTP {status}")]
    BadStatus { final_url: String, status: u32 },
}

impl ResolveError {
    /// Last URL reached before the failure.
    pub fn final_url(&self) -> &str {
        match self {
            ResolveError::TooManyRedirects { final_url, .. }
            | ResolveError::IdNotFound { final_url }
            | ResolveError::Network { final_url, .. }
            | ResolveError::BadStatus { final_url, .. } => final_url,
        }
    }
}

/// Failures while persisting media files.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("fetching {url} failed: {reason}")]
    NetworkFailure { url: String, reason: String },
    #[error("writing {} failed: {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Resolving,
    Fetching,
    Extracting,
    Downloading,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolving => "resolving",
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Downloading => "downloading",
        };
        f.write_str(name)
    }
}

/// Flat classification of a stage failure, for reporting and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    AuthFailure,
    UpstreamError,
    ParseFailure,
    TooManyRedirects,
    IdNotFound,
    NetworkFailure,
    WriteFailure,
    Unsupported,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::AuthFailure => "auth_failure",
            FailureKind::UpstreamError => "upstream_error",
            FailureKind::ParseFailure => "parse_failure",
            FailureKind::TooManyRedirects => "too_many_redirects",
            FailureKind::IdNotFound => "id_not_found",
            FailureKind::NetworkFailure => "network_failure",
            FailureKind::WriteFailure => "write_failure",
            FailureKind::Unsupported => "unsupported",
            FailureKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Any error a single stage can produce.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    /// No share link in the input, or no adapter recognizes it.
    #[error("unsupported input: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl StageError {
    pub fn kind(&self) -> FailureKind {
        match self {
            StageError::Adapter(AdapterError::AuthFailure(_)) => FailureKind::AuthFailure,
            StageError::Adapter(AdapterError::UpstreamError(_)) => FailureKind::UpstreamError,
            StageError::Adapter(AdapterError::ParseFailure(_)) => FailureKind::ParseFailure,
            StageError::Resolve(ResolveError::TooManyRedirects { .. }) => {
                FailureKind::TooManyRedirects
            }
            StageError::Resolve(ResolveError::IdNotFound { .. }) => FailureKind::IdNotFound,
            StageError::Resolve(ResolveError::Network { .. })
            | StageError::Resolve(ResolveError::BadStatus { .. }) => FailureKind::NetworkFailure,
            StageError::Download(DownloadError::NetworkFailure { .. }) => {
                FailureKind::NetworkFailure
            }
            StageError::Download(DownloadError::WriteFailure { .. }) => FailureKind::WriteFailure,
            StageError::Unsupported(_) => FailureKind::Unsupported,
            StageError::Cancelled(_) => FailureKind::Cancelled,
        }
    }
}

/// Terminal failure of a pipeline run: which stage failed and why.
#[derive(Debug, Error)]
#[error("{stage} failed ({kind}): {source}", kind = .source.kind())]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.source.kind()
    }
}
