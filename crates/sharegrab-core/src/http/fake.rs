//! Scripted in-memory client for unit tests.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use super::{HttpClient, HttpError, HttpRequest, HttpResponse};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Redirect(String),
    Page {
        status: u32,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },
    Unreachable,
}

#[derive(Default)]
pub(crate) struct FakeHttp {
    routes: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeHttp {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(self, url: &str, reply: Reply) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), reply);
        self
    }

    pub(crate) fn page(self, url: &str, body: &str) -> Self {
        self.route(
            url,
            Reply::Page {
                status: 200,
                headers: Vec::new(),
                body: body.as_bytes().to_vec(),
            },
        )
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Request URLs with the query string cut off.
    pub(crate) fn requested_paths(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.url.split('?').next().unwrap_or_default().to_string())
            .collect()
    }

    fn lookup(&self, request: &HttpRequest) -> Reply {
        self.requests.lock().unwrap().push(request.clone());
        let routes = self.routes.lock().unwrap();
        routes
            .get(&request.url)
            .or_else(|| {
                let path = request.url.split('?').next().unwrap_or_default();
                routes.get(path)
            })
            .cloned()
            .unwrap_or(Reply::Page {
                status: 404,
                headers: Vec::new(),
                body: Vec::new(),
            })
    }
}

impl HttpClient for FakeHttp {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        match self.lookup(request) {
            Reply::Redirect(to) => Ok(HttpResponse {
                status: 302,
                url: request.url.clone(),
                headers: vec![("Location".to_string(), to)],
                body: Vec::new(),
            }),
            Reply::Page {
                status,
                headers,
                body,
            } => Ok(HttpResponse {
                status,
                url: request.url.clone(),
                headers,
                body,
            }),
            Reply::Unreachable => Err(HttpError::Transport("connection refused".to_string())),
        }
    }

    fn fetch_to(&self, request: &HttpRequest, sink: &mut dyn Write) -> Result<u64, HttpError> {
        let response = self.send(request)?;
        if !response.is_success() {
            return Err(HttpError::Status {
                code: response.status,
                url: request.url.clone(),
            });
        }
        sink.write_all(&response.body).map_err(HttpError::Sink)?;
        Ok(response.body.len() as u64)
    }
}
