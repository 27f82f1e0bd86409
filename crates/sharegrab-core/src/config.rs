use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::{AdapterOptions, DEFAULT_USER_AGENT};
use crate::extractor::ExtractionRules;
use crate::http::{CurlClient, Method};
use crate::resolver::IdRule;
use crate::sign::{CommandSigner, Signer};

/// External signing command (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Program to run; receives the query string on stdin, prints the signature.
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// How a configured site derives the resource id from the resolved URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdRuleConfig {
    Pattern { regex: String },
    PathSegment { index: isize },
    QueryParam { name: String },
    AnyOf { rules: Vec<IdRuleConfig> },
}

impl IdRuleConfig {
    pub fn compile(&self) -> Result<IdRule, regex::Error> {
        Ok(match self {
            IdRuleConfig::Pattern { regex } => IdRule::pattern(regex)?,
            IdRuleConfig::PathSegment { index } => IdRule::PathSegment(*index),
            IdRuleConfig::QueryParam { name } => IdRule::QueryParam(name.clone()),
            IdRuleConfig::AnyOf { rules } => IdRule::AnyOf(
                rules
                    .iter()
                    .map(IdRuleConfig::compile)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

/// A `[[sites]]` entry: a platform described entirely by declarative rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    /// Regex over the share URL selecting this site.
    pub url_pattern: String,
    pub id_rule: IdRuleConfig,
    /// Method for redirect hops (default "get").
    #[serde(default)]
    pub resolve_method: Method,
    /// Extra request headers (override the default User-Agent when set).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub rules: ExtractionRules,
}

/// Global configuration loaded from `~/.config/sharegrab/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabConfig {
    /// Bound on each API/page request, in seconds.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Redirect hops allowed while resolving a share link.
    pub max_redirects: usize,
    /// Links processed in parallel by `grab`.
    pub concurrency: usize,
    pub user_agent: Option<String>,
    /// Default output directory (CLI `--dir` wins; current dir otherwise).
    pub download_dir: Option<PathBuf>,
    pub signer: Option<SignerConfig>,
    pub sites: Vec<SiteConfig>,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 15,
            max_redirects: 5,
            concurrency: 4,
            user_agent: None,
            download_dir: None,
            signer: None,
            sites: Vec::new(),
        }
    }
}

impl GrabConfig {
    pub fn adapter_options(&self) -> AdapterOptions {
        let signer = self.signer.as_ref().map(|s| {
            Arc::new(CommandSigner::new(s.program.clone(), s.args.clone())) as Arc<dyn Signer>
        });
        AdapterOptions {
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            max_redirects: self.max_redirects,
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            signer,
        }
    }

    pub fn http_client(&self) -> CurlClient {
        let connect_timeout = Duration::from_secs(self.connect_timeout_secs.max(1));
        CurlClient::new().with_connect_timeout(connect_timeout)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("sharegrab")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GrabConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

pub fn load_or_init_at(path: &Path) -> Result<GrabConfig> {
    if !path.exists() {
        let default_cfg = GrabConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: GrabConfig =
        toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
