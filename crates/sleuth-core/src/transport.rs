//! HTTP transport abstraction.
//!
//! [`RequestClient`](crate::request::RequestClient) builds requests and
//! interprets responses; the [`Transport`] trait only moves bytes. This keeps
//! the credential and error-normalization rules testable without a server.
//!
//! ```text
//! Transport (trait)
//!     |
//!     +-- ReqwestTransport (production, fixed timeout)
//!     |
//!     +-- MockTransport (scripted replies, records requests)
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// HTTP methods used by the backend API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A fully-built outbound request.
#[derive(Clone)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    /// Value of the first header named `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Path component of [`Self::url`].
    #[must_use]
    pub fn path(&self) -> &str {
        path_of(&self.url)
    }
}

// Header values carry credentials; only names are printed.
impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &header_names)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Raw response as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
}

impl HttpResponse {
    /// Build a response with a JSON body.
    #[must_use]
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Failures below the HTTP layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection, DNS, TLS or body transfer failure.
    #[error("backend unreachable: {0}")]
    Unreachable(String),
}

/// Moves one request to the backend and returns the raw response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes a request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no HTTP response was received.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Returns the transport name for logging.
    fn name(&self) -> &'static str;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport that aborts every request after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(15)))
            .timeout(timeout)
            .build()
            .map_err(|error| TransportError::Unreachable(error.to_string()))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.http_client.get(&request.url),
            Method::Post => self.http_client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(HttpResponse { status, body })
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Unreachable(error.to_string())
    }
}

/// Path component of an absolute or relative URL, without query string.
#[must_use]
pub fn path_of(url: &str) -> &str {
    let without_scheme = url.find("://").map_or(url, |idx| &url[idx + 3..]);
    let path = without_scheme
        .find('/')
        .map_or("/", |idx| &without_scheme[idx..]);
    path.split('?').next().unwrap_or(path)
}

/// One scripted reply for [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockReply {
    result: Result<HttpResponse, TransportError>,
    delay: Duration,
}

impl MockReply {
    /// Reply with `status` and a JSON body.
    #[must_use]
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            result: Ok(HttpResponse::json(status, &body)),
            delay: Duration::ZERO,
        }
    }

    /// Reply with `status` and a plain body.
    #[must_use]
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            result: Ok(HttpResponse {
                status,
                body: body.into(),
            }),
            delay: Duration::ZERO,
        }
    }

    /// Fail as a timeout.
    #[must_use]
    pub const fn timeout() -> Self {
        Self {
            result: Err(TransportError::Timeout),
            delay: Duration::ZERO,
        }
    }

    /// Fail as a connection error.
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            result: Err(TransportError::Unreachable("connection refused".to_string())),
            delay: Duration::ZERO,
        }
    }

    /// Resolve only after `delay` has elapsed.
    #[must_use]
    pub const fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Test transport that answers from per-route queues.
///
/// Routes are keyed by method and URL path. Each call pops the next reply
/// for its route; an unscripted route fails as unreachable.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<MockReply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Creates an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `reply` for `method path`.
    #[must_use]
    pub fn on(self, method: Method, path: &str, reply: MockReply) -> Self {
        self.push(method, path, reply);
        self
    }

    /// Queues `reply` for `method path` on a shared mock.
    pub fn push(&self, method: Method, path: &str, reply: MockReply) {
        let mut routes = self.routes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// All requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Number of requests received for `method path`.
    #[must_use]
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.method == method && request.path() == path)
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let key = (request.method, request.path().to_string());
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request);

        let reply = self
            .routes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get_mut(&key)
            .and_then(VecDeque::pop_front);

        let Some(reply) = reply else {
            return Err(TransportError::Unreachable(format!(
                "no scripted reply for {} {}",
                key.0, key.1
            )));
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
