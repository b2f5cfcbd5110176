use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;

use crate::secret::Secret;

/// Status codes treated as transient by every HTTP caller in the gate.
pub const RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUS.contains(&status)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// An outbound request. The bearer credential is kept apart from the plain
/// headers so that `Debug` output of a request never contains it.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub bearer: Option<Secret>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self { method: Method::Get, url: url.into(), headers: vec![], bearer: None, body: None, timeout }
    }

    pub fn post_json(url: impl Into<String>, body: String, timeout: Duration) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            bearer: None,
            body: Some(body),
            timeout,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_bearer(mut self, token: Secret) -> Self {
        self.bearer = Some(token);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self { status, headers: vec![], body: String::new() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("Retry-After")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Timeouts and connection failures are transient; anything else (bad
    /// URL, malformed response) is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Timeout(_) | TransportError::Connect(_))
    }
}

/// Single outbound HTTP exchange. Implementations must honour
/// `request.timeout`.
pub trait HttpClient: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

type Reply = Result<HttpResponse, TransportError>;

/// Deterministic [`HttpClient`] for tests: replies are queued per URL and
/// the last reply for a URL repeats once the queue is drained. Every request
/// is recorded.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    inner: Mutex<Scripted>,
}

#[derive(Debug, Default)]
struct Scripted {
    routes: HashMap<String, VecDeque<Reply>>,
    requests: Vec<HttpRequest>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: impl Into<String>, reply: Reply) -> &Self {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.routes.entry(url.into()).or_default().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).requests.clone()
    }

    pub fn requests_to(&self, url: &str) -> Vec<HttpRequest> {
        self.requests().into_iter().filter(|r| r.url == url).collect()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.requests.push(request.clone());
        let Some(queue) = inner.routes.get_mut(&request.url) else {
            return Err(TransportError::Connect(format!("no route for {}", request.url)));
        };
        match queue.len() {
            0 => Err(TransportError::Connect(format!("no route for {}", request.url))),
            1 => queue[0].clone(),
            _ => queue.pop_front().unwrap_or_else(|| Err(TransportError::Other("empty script".into()))),
        }
    }
}
