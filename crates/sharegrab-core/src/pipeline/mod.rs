//! One share link through resolve → fetch → extract → download.
//!
//! A `Pipeline` is a single run: it owns its state history and is driven to a
//! terminal state by `run`. Every failure is attributed to the stage that was
//! active, so a `ParseFailure` while extracting is never confused with a dead
//! CDN while downloading.

pub mod batch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::{AdapterRegistry, PlatformAdapter};
use crate::context::FetchContext;
use crate::control::CancelToken;
use crate::downloader::{plan, Downloader, DEFAULT_TRANSFER_TIMEOUT};
use crate::error::{FailureKind, PipelineError, Stage, StageError};
use crate::http::HttpClient;
use crate::model::{MediaDescriptor, RawResponse, ShareLink};
use crate::resolver::{self, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Resolving,
    Fetching,
    Extracting,
    Downloading,
    Done,
    Failed { stage: Stage, kind: FailureKind },
}

impl PipelineState {
    fn active(stage: Stage) -> Self {
        match stage {
            Stage::Resolving => PipelineState::Resolving,
            Stage::Fetching => PipelineState::Fetching,
            Stage::Extracting => PipelineState::Extracting,
            Stage::Downloading => PipelineState::Downloading,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed { .. })
    }
}

/// Result of a successful run. `files` is empty for dry runs.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub adapter: String,
    pub resolution: Resolution,
    pub descriptor: MediaDescriptor,
    pub files: Vec<PathBuf>,
}

pub struct Pipeline<'a> {
    registry: &'a AdapterRegistry,
    http: &'a dyn HttpClient,
    dest_dir: PathBuf,
    cancel: CancelToken,
    dry_run: bool,
    transfer_timeout: Duration,
    history: Vec<PipelineState>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        registry: &'a AdapterRegistry,
        http: &'a dyn HttpClient,
        dest_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            registry,
            http,
            dest_dir: dest_dir.as_ref().to_path_buf(),
            cancel: CancelToken::new(),
            dry_run: false,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Stop after extraction; nothing is written.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = timeout;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }

    /// Every state entered by the last run, starting at `Idle`.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    pub fn run(&mut self, input: &str) -> Result<PipelineOutcome, PipelineError> {
        self.history = vec![PipelineState::Idle];

        let (adapter, context, resolution) =
            self.stage(Stage::Resolving, |p| p.resolve(input))?;
        let raw = self.stage(Stage::Fetching, |p| {
            Ok(adapter.fetch_resource(p.http, &context, &resolution)?)
        })?;
        let descriptor = self.stage(Stage::Extracting, |_| extract(adapter.as_ref(), &raw))?;
        tracing::info!(
            adapter = adapter.name(),
            id = %resolution.resource_id,
            title = descriptor.title(),
            items = descriptor.items().len(),
            "extracted"
        );

        let files = if self.dry_run {
            Vec::new()
        } else {
            self.stage(Stage::Downloading, |p| p.download(&context, &descriptor))?
        };

        self.history.push(PipelineState::Done);
        Ok(PipelineOutcome {
            adapter: adapter.name().to_string(),
            resolution,
            descriptor,
            files,
        })
    }

    /// Enters `stage`, checks for cancellation, runs `f` and records a
    /// failure against `stage`.
    fn stage<T>(
        &mut self,
        stage: Stage,
        f: impl FnOnce(&Self) -> Result<T, StageError>,
    ) -> Result<T, PipelineError> {
        self.history.push(PipelineState::active(stage));
        tracing::debug!(%stage, "entering stage");
        let result = match self.cancel.check() {
            Ok(()) => f(self),
            Err(cancelled) => Err(cancelled.into()),
        };
        result.map_err(|source| self.fail(stage, source))
    }

    fn fail(&mut self, stage: Stage, source: StageError) -> PipelineError {
        let kind = source.kind();
        self.history.push(PipelineState::Failed { stage, kind });
        match kind {
            FailureKind::ParseFailure => {
                tracing::warn!(%stage, "{source} (the adapter likely needs updating for new markup)")
            }
            FailureKind::Cancelled => tracing::info!(%stage, "run cancelled"),
            _ => tracing::warn!(%stage, %kind, "{source}"),
        }
        PipelineError { stage, source }
    }

    /// Link parsing, adapter selection, context building and redirect
    /// resolution all count as `Resolving`. The adapter's `timeout` bounds
    /// every request made with the returned context.
    fn resolve(
        &self,
        input: &str,
    ) -> Result<(Arc<dyn PlatformAdapter>, FetchContext, Resolution), StageError> {
        let link = ShareLink::parse(input)
            .ok_or_else(|| StageError::Unsupported(format!("no URL in {:?}", input.trim())))?;
        let adapter = self
            .registry
            .select(link.as_str())
            .ok_or_else(|| StageError::Unsupported(format!("no adapter recognizes {link}")))?;
        let timeout = adapter.timeout();
        tracing::debug!(adapter = adapter.name(), %link, ?timeout, "selected adapter");
        let context = adapter
            .build_context(self.http, link.as_str())?
            .with_timeout(timeout);
        let resolution = resolver::resolve(self.http, &context, adapter.as_ref(), link.as_str())?;
        Ok((adapter, context, resolution))
    }

    fn download(
        &self,
        context: &FetchContext,
        descriptor: &MediaDescriptor,
    ) -> Result<Vec<PathBuf>, StageError> {
        let downloader =
            Downloader::new(self.http, context).transfer_timeout(self.transfer_timeout);
        downloader.prepare_dir(&self.dest_dir)?;
        let mut files = Vec::with_capacity(descriptor.items().len());
        for planned in plan(descriptor, &self.dest_dir) {
            self.cancel.check()?;
            files.push(downloader.fetch_item(&planned)?);
        }
        Ok(files)
    }
}

fn extract(
    adapter: &dyn PlatformAdapter,
    raw: &RawResponse,
) -> Result<MediaDescriptor, StageError> {
    adapter.extract(raw).map_err(|e| {
        tracing::debug!(
            url = %raw.url,
            status = raw.status,
            content_type = raw.content_type.as_deref().unwrap_or("-"),
            body_len = raw.body.len(),
            "response did not yield a descriptor"
        );
        e.into()
    })
}
