//! Platform adapters and the registry that picks one per link.
//!
//! An adapter owns everything platform-specific: which URLs it accepts, how
//! the share link resolves to an id, which headers/cookies/tokens requests
//! need, where the data lives and how it maps to a `MediaDescriptor`. The
//! resolver, extractor and downloader stay generic.

mod bilibili;
mod douyin;
mod generic;
mod kuaishou;
mod wallpaper;
mod xiaohongshu;

pub use bilibili::BilibiliAdapter;
pub use douyin::DouyinAdapter;
pub use generic::GenericAdapter;
pub use kuaishou::KuaishouAdapter;
pub use wallpaper::WallpaperAdapter;
pub use xiaohongshu::XiaohongshuAdapter;

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::GrabConfig;
use crate::context::{FetchContext, FetchContextBuilder};
use crate::error::AdapterError;
use crate::extractor::RuleError;
use crate::http::{HttpClient, DEFAULT_TIMEOUT};
use crate::model::{MediaDescriptor, RawResponse, ResourceId};
use crate::resolver::{ResolveSpec, Resolution, DEFAULT_MAX_REDIRECTS};
use crate::sign::Signer;

/// Desktop browser UA sent when the config does not override it.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub trait PlatformAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Pure predicate: does this adapter handle `url`? No I/O.
    fn matches(&self, url: &str) -> bool;

    /// Fix-ups applied before redirect resolution.
    fn normalize(&self, url: &str) -> String {
        url.trim().to_string()
    }

    fn resolve_spec(&self) -> &ResolveSpec;

    /// Bound on each request of a run.
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Platform pre-steps (token minting, cookie acquisition). Fails with
    /// `AuthFailure` when a token endpoint is unreachable or misbehaves.
    fn build_context(
        &self,
        http: &dyn HttpClient,
        url: &str,
    ) -> Result<FetchContext, AdapterError>;

    /// Primary data fetch. The default GETs the resolved URL.
    fn fetch_resource(
        &self,
        http: &dyn HttpClient,
        context: &FetchContext,
        resolution: &Resolution,
    ) -> Result<RawResponse, AdapterError> {
        fetch_page(http, context, &resolution.final_url, &resolution.resource_id)
    }

    fn extract(&self, raw: &RawResponse) -> Result<MediaDescriptor, AdapterError>;
}

/// Settings shared by the built-in adapters.
#[derive(Clone)]
pub struct AdapterOptions {
    pub timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
    pub signer: Option<Arc<dyn Signer>>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            signer: None,
        }
    }
}

impl std::fmt::Debug for AdapterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterOptions")
            .field("timeout", &self.timeout)
            .field("max_redirects", &self.max_redirects)
            .field("user_agent", &self.user_agent)
            .field("signer", &self.signer.is_some())
            .finish()
    }
}

impl AdapterOptions {
    /// Context builder preloaded with the user agent, timeout and `referer`.
    pub(crate) fn context(&self, referer: &str) -> FetchContextBuilder {
        FetchContext::builder()
            .header("User-Agent", self.user_agent.as_str())
            .header("Referer", referer)
            .timeout(self.timeout)
    }
}

/// Ordered adapter set; the first adapter whose `matches` is true wins.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.push(adapter);
    }

    /// Registry holding the built-in platforms.
    pub fn with_builtin(options: &AdapterOptions) -> Result<Self, RuleError> {
        let mut registry = Self::new();
        registry.register_builtin(options)?;
        Ok(registry)
    }

    pub fn register_builtin(&mut self, options: &AdapterOptions) -> Result<(), RuleError> {
        self.register(Arc::new(BilibiliAdapter::new(options.clone())?));
        self.register(Arc::new(DouyinAdapter::new(options.clone())?));
        self.register(Arc::new(KuaishouAdapter::new(options.clone())?));
        self.register(Arc::new(XiaohongshuAdapter::new(options.clone())?));
        self.register(Arc::new(WallpaperAdapter::new(options.clone())?));
        Ok(())
    }

    /// Configured `[[sites]]` first (so they can override a built-in), then
    /// the built-ins.
    pub fn from_config(cfg: &GrabConfig) -> anyhow::Result<Self> {
        let options = cfg.adapter_options();
        let mut registry = Self::new();
        for site in &cfg.sites {
            let adapter = GenericAdapter::from_config(site, &options)
                .map_err(|e| anyhow::anyhow!("site {:?}: {e}", site.name))?;
            registry.register(Arc::new(adapter));
        }
        registry.register_builtin(&options)?;
        Ok(registry)
    }

    pub fn select(&self, url: &str) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.iter().find(|a| a.matches(url)).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

/// GET `url` with the context; non-2xx and transport failures become
/// `UpstreamError`.
pub fn fetch_page(
    http: &dyn HttpClient,
    context: &FetchContext,
    url: &str,
    resource_id: &ResourceId,
) -> Result<RawResponse, AdapterError> {
    let response = http
        .send(&context.get(url))
        .map_err(|e| AdapterError::UpstreamError(format!("GET {url}: {e}")))?;
    if !response.is_success() {
        return Err(AdapterError::UpstreamError(format!(
            "GET {url} answered HTTP {}",
            response.status
        )));
    }
    Ok(RawResponse::from_http(response, resource_id.clone()))
}

/// True when the host of `url` is one of `domains` or a subdomain of one.
pub fn host_matches(url: &str, domains: &[&str]) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    domains.iter().any(|d| {
        host == *d
            || host
                .strip_suffix(*d)
                .is_some_and(|rest| rest.ends_with('.'))
    })
}
