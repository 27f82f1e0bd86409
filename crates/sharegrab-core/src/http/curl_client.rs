//! libcurl-backed `HttpClient`.
//!
//! One `Easy` handle per request, configured from the `HttpRequest`. Runs in
//! the calling thread.

use std::io::Write;
use std::str;
use std::time::Duration;

use curl::easy::{Easy, List};

use super::parse::parse_header_lines;
use super::{HttpClient, HttpError, HttpRequest, HttpResponse, Method};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// Cap when a request asks curl to follow redirects itself.
const MAX_FOLLOWED_REDIRECTS: u32 = 10;

#[derive(Debug, Clone)]
pub struct CurlClient {
    connect_timeout: Duration,
}

impl Default for CurlClient {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl CurlClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn prepare(&self, easy: &mut Easy, request: &HttpRequest) -> Result<(), curl::Error> {
        easy.url(&request.url)?;
        match request.method {
            Method::Get => easy.get(true)?,
            Method::Head => easy.nobody(true)?,
            Method::Post => {
                easy.post(true)?;
                easy.post_fields_copy(request.body.as_deref().unwrap_or_default())?;
            }
        }
        easy.follow_location(request.follow_redirects)?;
        if request.follow_redirects {
            easy.max_redirections(MAX_FOLLOWED_REDIRECTS)?;
        }
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(request.timeout)?;
        // Empty string: accept every encoding libcurl can decode.
        easy.accept_encoding("")?;

        let mut list = List::new();
        for (name, value) in &request.headers {
            list.append(&format!("{}: {}", name.trim(), value.trim()))?;
        }
        if !request.headers.is_empty() {
            easy.http_headers(list)?;
        }
        Ok(())
    }
}

impl From<curl::Error> for HttpError {
    fn from(e: curl::Error) -> Self {
        if e.is_operation_timedout() {
            HttpError::Timeout(e.to_string())
        } else {
            HttpError::Transport(e.to_string())
        }
    }
}

impl HttpClient for CurlClient {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut easy = Easy::new();
        self.prepare(&mut easy, request)?;

        let mut lines: Vec<String> = Vec::new();
        let mut body: Vec<u8> = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    lines.push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let status = easy.response_code()?;
        let url = easy
            .effective_url()?
            .map(str::to_string)
            .unwrap_or_else(|| request.url.clone());
        tracing::trace!(%url, status, bytes = body.len(), "response received");

        Ok(HttpResponse {
            status,
            url,
            headers: parse_header_lines(&lines),
            body,
        })
    }

    fn fetch_to(&self, request: &HttpRequest, sink: &mut dyn Write) -> Result<u64, HttpError> {
        let mut easy = Easy::new();
        self.prepare(&mut easy, request)?;
        easy.fail_on_error(true)?;

        let mut written = 0u64;
        let mut sink_error: Option<std::io::Error> = None;
        let performed = {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| match sink.write_all(data) {
                Ok(()) => {
                    written += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    sink_error = Some(e);
                    Ok(0) // abort transfer
                }
            })?;
            transfer.perform()
        };

        if let Some(e) = sink_error {
            return Err(HttpError::Sink(e));
        }
        if let Err(e) = performed {
            if e.is_http_returned_error() {
                let code = easy.response_code().unwrap_or(0);
                return Err(HttpError::Status {
                    code,
                    url: request.url.clone(),
                });
            }
            return Err(e.into());
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(HttpError::Status {
                code,
                url: request.url.clone(),
            });
        }
        sink.flush().map_err(HttpError::Sink)?;
        Ok(written)
    }
}
