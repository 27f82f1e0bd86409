pub mod config;
pub mod logging;

pub mod adapter;
pub mod context;
pub mod control;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod http;
pub mod model;
pub mod pipeline;
pub mod resolver;
pub mod sanitize;
pub mod sign;

pub use adapter::{AdapterOptions, AdapterRegistry, PlatformAdapter};
pub use context::FetchContext;
pub use control::CancelToken;
pub use error::{AdapterError, DownloadError, FailureKind, PipelineError, ResolveError, Stage};
pub use http::{CurlClient, HttpClient};
pub use model::{MediaDescriptor, MediaItem, MediaKind, ResourceId, ShareLink};
pub use pipeline::{Pipeline, PipelineOutcome, PipelineState};
