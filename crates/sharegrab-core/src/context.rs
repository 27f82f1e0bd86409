//! Per-run request context produced by a platform adapter.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::http::{HttpRequest, Method, DEFAULT_TIMEOUT};

/// Headers, cookies and tokens for one pipeline run.
///
/// Built once through `FetchContextBuilder` and read-only afterwards. Every
/// request of the run (redirect hops, data fetch, media download) is derived
/// from the same context so platforms see a consistent client.
#[derive(Debug, Clone)]
pub struct FetchContext {
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    tokens: BTreeMap<String, String>,
    timeout: Duration,
}

impl Default for FetchContext {
    fn default() -> Self {
        FetchContext::builder().build()
    }
}

impl FetchContext {
    pub fn builder() -> FetchContextBuilder {
        FetchContextBuilder {
            context: FetchContext {
                headers: Vec::new(),
                cookies: Vec::new(),
                tokens: BTreeMap::new(),
                timeout: DEFAULT_TIMEOUT,
            },
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn token(&self, name: &str) -> Option<&str> {
        self.tokens.get(name).map(String::as_str)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Same context with every derived request bounded by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `Cookie` header value (`a=1; b=2`), or `None` without cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let joined = self
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(joined)
    }

    /// Request carrying this context's headers, cookies and timeout.
    pub fn request(&self, method: Method, url: &str) -> HttpRequest {
        let mut request = HttpRequest::new(method, url).timeout(self.timeout);
        request.headers = self.headers.clone();
        if let Some(cookies) = self.cookie_header() {
            match request
                .headers
                .iter_mut()
                .find(|(n, _)| n.eq_ignore_ascii_case("cookie"))
            {
                Some((_, existing)) => {
                    existing.push_str("; ");
                    existing.push_str(&cookies);
                }
                None => request.headers.push(("Cookie".to_string(), cookies)),
            }
        }
        request
    }

    pub fn get(&self, url: &str) -> HttpRequest {
        self.request(Method::Get, url)
    }
}

pub struct FetchContextBuilder {
    context: FetchContext,
}

impl FetchContextBuilder {
    /// Add a header; a later value for the same name replaces the earlier one.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.context
            .headers
            .retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.context.headers.push((name, value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in headers {
            self = self.header(k, v);
        }
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.context.cookies.retain(|(n, _)| *n != name);
        self.context.cookies.push((name, value.into()));
        self
    }

    pub fn token(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.tokens.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.context.timeout = timeout;
        self
    }

    pub fn build(self) -> FetchContext {
        self.context
    }
}
