//! HTTP capability injected into adapters, the resolver and the downloader.
//!
//! The core never owns a connection: everything goes through `HttpClient`,
//! whose production implementation is `CurlClient` (libcurl, blocking). Tests
//! substitute scripted clients.

mod curl_client;
mod parse;

pub use curl_client::CurlClient;
pub use parse::{cookie_pair, parse_header_lines};

use std::io::Write;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default bound on a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
}

/// A single outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
    /// When false, 3xx answers are returned to the caller as-is.
    pub follow_redirects: bool,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
            follow_redirects: true,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        let mut request = Self::new(Method::Post, url);
        request.body = Some(body.into());
        request
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// First header value with `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u32,
    /// Effective URL (differs from the request URL only if redirects were followed).
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn location(&self) -> Option<&str> {
        self.header("location").map(str::trim).filter(|l| !l.is_empty())
    }

    /// `name=value` pairs from every `Set-Cookie` header, attributes dropped.
    pub fn set_cookies(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
            .filter_map(|(_, value)| cookie_pair(value))
            .collect()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{url} returned HTTP {code}")]
    Status { code: u32, url: String },
    /// The caller-supplied sink refused bytes (disk full, permission denied).
    #[error("sink write failed: {0}")]
    Sink(#[source] std::io::Error),
}

/// Blocking HTTP capability. Implementations must be shareable across the
/// worker threads of a batch.
pub trait HttpClient: Send + Sync {
    /// Issue a request and buffer the whole response, whatever its status.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError>;

    /// Stream a 2xx response body into `sink`, returning the number of bytes
    /// written. Non-2xx answers fail with `HttpError::Status`; sink failures
    /// with `HttpError::Sink`. Bytes may already be in `sink` when this fails.
    fn fetch_to(&self, request: &HttpRequest, sink: &mut dyn Write) -> Result<u64, HttpError>;
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
pub(crate) mod fake;

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u32, headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status,
            url: "https://example.com/".to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: Vec::new(),
        }
    }

    #[test]
    fn redirect_and_location() {
        let r = response(302, &[("Location", " https://example.com/next ")]);
        assert!(r.is_redirect());
        assert!(!r.is_success());
        assert_eq!(r.location(), Some("https://example.com/next"));
        assert!(!response(304, &[]).is_redirect());
    }

    #[test]
    fn set_cookies_collects_pairs() {
        let r = response(
            200,
            &[
                ("Set-Cookie", "ttwid=1%7Cabc; Path=/; HttpOnly"),
                ("set-cookie", "did=web_123"),
                ("Content-Type", "text/html"),
            ],
        );
        assert_eq!(
            r.set_cookies(),
            vec![
                ("ttwid".to_string(), "1%7Cabc".to_string()),
                ("did".to_string(), "web_123".to_string()),
            ]
        );
    }

    #[test]
    fn request_builder_defaults() {
        let req =
            HttpRequest::get("https://example.com/a").header("Referer", "https://example.com/");
        assert_eq!(req.method, Method::Get);
        assert!(req.follow_redirects);
        assert_eq!(req.timeout, DEFAULT_TIMEOUT);
        assert_eq!(req.header_value("referer"), Some("https://example.com/"));
        let post = HttpRequest::post("https://example.com/b", "{}").follow_redirects(false);
        assert_eq!(post.body.as_deref(), Some(&b"{}"[..]));
        assert!(!post.follow_redirects);
    }
}
