//! Share-link resolution: bounded redirect following plus id extraction.
//!
//! Redirects are followed one hop at a time (the client's own redirect
//! handling is disabled) so every hop reuses the adapter's headers and the
//! last URL reached is known even when resolution fails.

use regex::Regex;
use url::Url;

use crate::adapter::PlatformAdapter;
use crate::context::FetchContext;
use crate::error::ResolveError;
use crate::http::{HttpClient, Method};
use crate::model::ResourceId;

/// Default bound on redirect hops.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// How an adapter turns a canonical URL into a `ResourceId`.
#[derive(Debug, Clone)]
pub enum IdRule {
    /// First capture group (or the whole match) of a regex over the URL.
    Pattern(Regex),
    /// Path segment by index; negative counts from the end (`-1` = last).
    PathSegment(isize),
    /// Value of a query parameter.
    QueryParam(String),
    /// First rule that yields an id.
    AnyOf(Vec<IdRule>),
}

impl IdRule {
    pub fn pattern(regex: &str) -> Result<Self, regex::Error> {
        Ok(IdRule::Pattern(Regex::new(regex)?))
    }

    pub fn extract(&self, url: &str) -> Option<ResourceId> {
        match self {
            IdRule::Pattern(re) => {
                let caps = re.captures(url)?;
                let m = caps.get(1).or_else(|| caps.get(0))?;
                ResourceId::new(m.as_str())
            }
            IdRule::PathSegment(index) => {
                let parsed = Url::parse(url).ok()?;
                let segments: Vec<&str> = parsed
                    .path_segments()?
                    .filter(|s| !s.is_empty())
                    .collect();
                let i = if *index < 0 {
                    segments.len().checked_sub(index.unsigned_abs())?
                } else {
                    *index as usize
                };
                ResourceId::new(*segments.get(i)?)
            }
            IdRule::QueryParam(name) => {
                let parsed = Url::parse(url).ok()?;
                let value = parsed
                    .query_pairs()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.into_owned())?;
                ResourceId::new(value)
            }
            IdRule::AnyOf(rules) => rules.iter().find_map(|r| r.extract(url)),
        }
    }
}

/// Adapter-declared resolution settings.
#[derive(Debug, Clone)]
pub struct ResolveSpec {
    /// Method used for redirect hops (some hosts only redirect on GET).
    pub method: Method,
    pub id_rule: IdRule,
    pub max_redirects: usize,
}

impl ResolveSpec {
    pub fn new(method: Method, id_rule: IdRule) -> Self {
        Self {
            method,
            id_rule,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }
}

/// Canonical identity of a share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub original_url: String,
    pub final_url: String,
    pub resource_id: ResourceId,
    pub hops: usize,
}

/// Normalizes `raw_url` through the adapter, follows redirects and extracts
/// the resource id from the canonical URL.
pub fn resolve(
    http: &dyn HttpClient,
    context: &FetchContext,
    adapter: &dyn PlatformAdapter,
    raw_url: &str,
) -> Result<Resolution, ResolveError> {
    let spec = adapter.resolve_spec();
    let start = adapter.normalize(raw_url);
    let (final_url, hops) =
        follow_redirects(http, context, spec.method, spec.max_redirects, &start)?;

    let resource_id = spec
        .id_rule
        .extract(&final_url)
        .ok_or_else(|| ResolveError::IdNotFound {
            final_url: final_url.clone(),
        })?;
    tracing::debug!(adapter = adapter.name(), %final_url, id = %resource_id, hops, "resolved");

    Ok(Resolution {
        original_url: raw_url.to_string(),
        final_url,
        resource_id,
        hops,
    })
}

/// Follows at most `max_redirects` hops from `url`, returning the first URL
/// that answers 2xx and the number of hops taken.
pub fn follow_redirects(
    http: &dyn HttpClient,
    context: &FetchContext,
    method: Method,
    max_redirects: usize,
    url: &str,
) -> Result<(String, usize), ResolveError> {
    let mut current = url.to_string();
    let mut hops = 0usize;

    loop {
        let request = context.request(method, &current).follow_redirects(false);
        let response = http
            .send(&request)
            .map_err(|source| ResolveError::Network {
                final_url: current.clone(),
                source,
            })?;

        if response.is_redirect() {
            let Some(location) = response.location() else {
                return Err(ResolveError::BadStatus {
                    final_url: current,
                    status: response.status,
                });
            };
            let next = join_location(&current, location);
            hops += 1;
            if hops > max_redirects {
                return Err(ResolveError::TooManyRedirects {
                    hops,
                    final_url: next,
                });
            }
            tracing::debug!(hop = hops, from = %current, to = %next, "following redirect");
            current = next;
            continue;
        }

        if !response.is_success() {
            return Err(ResolveError::BadStatus {
                final_url: current,
                status: response.status,
            });
        }
        return Ok((current, hops));
    }
}

/// Resolves a possibly relative `Location` against the URL that sent it.
fn join_location(base: &str, location: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(location))
        .map(String::from)
        .unwrap_or_else(|_| location.to_string())
}
