//! Shared helpers for integration tests: a scripted in-memory HttpClient and a
//! local HTTP server.

#![allow(dead_code)]

pub mod route_server;

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use sharegrab_core::http::{HttpClient, HttpError, HttpRequest, HttpResponse};

#[derive(Debug, Clone)]
pub enum Scripted {
    Redirect(String),
    Ok(Vec<u8>),
    Status(u32),
    /// Streams the bytes, then fails as if the connection dropped.
    CutOff(Vec<u8>),
}

/// In-memory client answering from a URL → reply table; counts requests.
#[derive(Default)]
pub struct ScriptedHttp {
    routes: Mutex<HashMap<String, Scripted>>,
    hits: Mutex<Vec<String>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: &str, reply: Scripted) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), reply);
        self
    }

    pub fn page(self, url: &str, body: &str) -> Self {
        self.with(url, Scripted::Ok(body.as_bytes().to_vec()))
    }

    /// Redirect chain `prefix/0 → prefix/1 → … → prefix/n`, ending in a page.
    pub fn chain(mut self, prefix: &str, hops: usize) -> Self {
        for i in 0..hops {
            self = self.with(
                &format!("{prefix}/{i}"),
                Scripted::Redirect(format!("{prefix}/{}", i + 1)),
            );
        }
        self.page(&format!("{prefix}/{hops}"), "<html>end</html>")
    }

    /// Number of requests made to `url` so far.
    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().len()
    }

    fn reply(&self, url: &str) -> Scripted {
        self.hits.lock().unwrap().push(url.to_string());
        self.routes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Scripted::Status(404))
    }
}

impl HttpClient for ScriptedHttp {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let (status, headers, body) = match self.reply(&request.url) {
            Scripted::Redirect(to) => (302, vec![("Location".to_string(), to)], Vec::new()),
            Scripted::Ok(body) => (200, Vec::new(), body),
            Scripted::Status(code) => (code, Vec::new(), Vec::new()),
            Scripted::CutOff(_) => {
                return Err(HttpError::Transport("connection reset".to_string()))
            }
        };
        Ok(HttpResponse {
            status,
            url: request.url.clone(),
            headers,
            body,
        })
    }

    fn fetch_to(&self, request: &HttpRequest, sink: &mut dyn Write) -> Result<u64, HttpError> {
        match self.reply(&request.url) {
            Scripted::Ok(body) => {
                sink.write_all(&body).map_err(HttpError::Sink)?;
                Ok(body.len() as u64)
            }
            Scripted::CutOff(partial) => {
                sink.write_all(&partial).map_err(HttpError::Sink)?;
                Err(HttpError::Transport("connection reset mid-body".to_string()))
            }
            Scripted::Redirect(_) => Err(HttpError::Status {
                code: 302,
                url: request.url.clone(),
            }),
            Scripted::Status(code) => Err(HttpError::Status {
                code,
                url: request.url.clone(),
            }),
        }
    }
}
