//! Data passed between pipeline stages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::http::HttpResponse;
use crate::sanitize::sanitize_title;

/// Raw user input pointing at one media item: a URL, or share text with a URL
/// somewhere inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink(String);

impl ShareLink {
    /// Pulls the first `http(s)://` URL out of `text`.
    ///
    /// Apps share text like `"title… https://v.example/abc 复制此链接"`; the
    /// URL stops at whitespace, quotes, angle brackets and CJK punctuation.
    pub fn parse(text: &str) -> Option<Self> {
        let start = text
            .match_indices("http")
            .map(|(i, _)| i)
            .find(|&i| text[i..].starts_with("https://") || text[i..].starts_with("http://"))?;
        let rest = &text[start..];
        let end = rest
            .char_indices()
            .find(|(_, c)| is_link_terminator(*c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let link = rest[..end].trim_end_matches(['.', ',', ';', ')']);
        let scheme_only = link == "https://" || link == "http://";
        if scheme_only {
            return None;
        }
        Some(ShareLink(link.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_link_terminator(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '"' | '\'' | '<' | '>' | '\\' | '^' | '`' | '{' | '|' | '}'
        )
        || matches!(
            c,
            '，' | '。' | '；' | '！' | '？' | '、' | '【' | '】' | '《' | '》'
        )
}

/// Platform-scoped identifier of the resource behind a link. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let id = id.trim();
        if id.is_empty() {
            None
        } else {
            Some(ResourceId(id.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub source_url: String,
    pub suggested_extension: String,
}

impl MediaItem {
    pub fn new(kind: MediaKind, source_url: impl Into<String>, extension: &str) -> Self {
        Self {
            kind,
            source_url: source_url.into(),
            suggested_extension: extension.trim_start_matches('.').to_string(),
        }
    }
}

/// Normalized extraction result: a sanitized title and at least one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaDescriptor {
    title: String,
    items: Vec<MediaItem>,
}

impl MediaDescriptor {
    /// Sanitizes `title`; fails with `ParseFailure` when `items` is empty.
    pub fn new(title: &str, items: Vec<MediaItem>) -> Result<Self, AdapterError> {
        if items.is_empty() {
            return Err(AdapterError::ParseFailure(
                "payload yielded no media items".to_string(),
            ));
        }
        Ok(Self {
            title: sanitize_title(title),
            items,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }
}

/// Body of the primary data fetch, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub url: String,
    pub resource_id: ResourceId,
    pub status: u32,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn from_http(response: HttpResponse, resource_id: ResourceId) -> Self {
        let content_type = response.header("content-type").map(str::to_string);
        let body = response.text();
        Self {
            url: response.url,
            resource_id,
            status: response.status,
            content_type,
            body,
        }
    }

    /// Fixture constructor for tests and offline extraction.
    pub fn from_body(url: &str, resource_id: ResourceId, body: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            resource_id,
            status: 200,
            content_type: None,
            body: body.into(),
        }
    }
}
