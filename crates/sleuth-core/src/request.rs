//! Outbound request gateway.
//!
//! Every backend call in this crate goes through [`RequestClient::send`].
//! The client reads the current credential from a read-only
//! [`SessionView`] at call time:
//!
//! | Session holds | Header attached |
//! |---------------|-----------------|
//! | token | `Authorization: Bearer <token>` |
//! | wallet address only | `X-Wallet-Address: <address>` |
//! | nothing | none |
//!
//! The address-only form is kept for endpoints that identify the caller by
//! wallet alone; a token always wins when one is held.
//!
//! The client never retries and never touches session state. Reacting to a
//! rejected credential is the [`SessionStore`](crate::session::SessionStore)'s
//! job.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::log::truncate_for_log;
use crate::session::SessionView;
use crate::transport::{HttpRequest, Method, Transport, TransportError};

/// Header carrying the wallet address in address-only mode.
pub const WALLET_ADDRESS_HEADER: &str = "X-Wallet-Address";

/// Header carrying the bearer token.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Errors surfaced by [`RequestClient`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RequestError {
    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The backend could not be reached.
    #[error("backend unreachable: {message}")]
    Unreachable {
        /// Transport error description.
        message: String,
    },

    /// The backend answered with a non-2xx status.
    #[error("request rejected with status {status}: {}", detail_of(.body))]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// A 2xx body could not be decoded into the expected shape.
    #[error("invalid response body: {message}")]
    InvalidResponse {
        /// Decoder error description.
        message: String,
    },
}

impl RequestError {
    /// HTTP status for [`RequestError::Rejected`].
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend rejected the caller's credential (401).
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Rejected { status: 401, .. })
    }

    /// Whether the backend reported the resource as absent (404).
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Rejected { status: 404, .. })
    }
}

impl From<TransportError> for RequestError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Timeout => Self::Timeout,
            TransportError::Unreachable(message) => Self::Unreachable { message },
        }
    }
}

/// Human-readable part of an error body.
///
/// The backend reports errors as `{"detail": "..."}`; anything else is shown
/// as-is.
fn detail_of(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "(empty body)".to_string()
            } else {
                truncate_for_log(body)
            }
        })
}

/// Credential attached to an outbound request.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Backend-issued session token.
    Bearer(SecretString),
    /// Wallet address without a token.
    WalletAddress(String),
    /// Anonymous call.
    None,
}

impl Credential {
    fn header(&self) -> Option<(String, String)> {
        match self {
            Self::Bearer(token) => Some((
                AUTHORIZATION_HEADER.to_string(),
                format!("Bearer {}", token.expose_secret()),
            )),
            Self::WalletAddress(address) => {
                Some((WALLET_ADDRESS_HEADER.to_string(), address.clone()))
            },
            Self::None => None,
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Bearer(_) => "bearer",
            Self::WalletAddress(_) => "wallet_address",
            Self::None => "none",
        }
    }
}

/// The single outbound HTTP gateway.
///
/// Cheap to clone; clones share the transport and observe the same session.
#[derive(Clone)]
pub struct RequestClient {
    base_url: Arc<str>,
    transport: Arc<dyn Transport>,
    session: SessionView,
}

impl std::fmt::Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("base_url", &self.base_url)
            .field("transport", &self.transport.name())
            .finish_non_exhaustive()
    }
}

impl RequestClient {
    /// Creates a client rooted at `base_url`.
    #[must_use]
    pub fn new(
        base_url: impl AsRef<str>,
        transport: Arc<dyn Transport>,
        session: SessionView,
    ) -> Self {
        Self {
            base_url: Arc::from(base_url.as_ref().trim_end_matches('/')),
            transport,
            session,
        }
    }

    /// Backend base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The session view this client reads credentials from.
    #[must_use]
    pub const fn session(&self) -> &SessionView {
        &self.session
    }

    /// Credential that the next request would carry.
    #[must_use]
    pub fn credential(&self) -> Credential {
        self.session.credential()
    }

    /// Sends one request and returns the decoded JSON body.
    ///
    /// An empty 2xx body decodes to `Value::Null`.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Timeout`] when the transport times out
    /// - [`RequestError::Unreachable`] on network failure
    /// - [`RequestError::Rejected`] on any non-2xx status
    /// - [`RequestError::InvalidResponse`] when a 2xx body is not JSON
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, RequestError> {
        let credential = self.credential();
        let request = HttpRequest {
            method,
            url: self.url_for(path),
            headers: credential.header().into_iter().collect(),
            body: body.cloned(),
        };

        debug!(
            method = %method,
            path,
            credential = credential.kind(),
            transport = self.transport.name(),
            "sending request"
        );

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(method = %method, path, error = %error, "request failed");
                return Err(error.into());
            },
        };

        if !response.is_success() {
            warn!(
                method = %method,
                path,
                status = response.status,
                body = %truncate_for_log(&response.body),
                "request rejected"
            );
            return Err(RequestError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        debug!(method = %method, path, status = response.status, "request succeeded");

        if response.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&response.body).map_err(|error| RequestError::InvalidResponse {
            message: error.to_string(),
        })
    }

    /// `GET path`, decoding the body into `T`.
    ///
    /// # Errors
    ///
    /// See [`Self::send`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        let value = self.send(Method::Get, path, None).await?;
        decode(value)
    }

    /// `POST path` with a JSON body, decoding the response into `T`.
    ///
    /// # Errors
    ///
    /// See [`Self::send`]. Also fails with
    /// [`RequestError::InvalidResponse`] if `body` cannot be serialized.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(|error| RequestError::InvalidResponse {
            message: format!("request body not serializable: {error}"),
        })?;
        let value = self.send(Method::Post, path, Some(&body)).await?;
        decode(value)
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, RequestError> {
    serde_json::from_value(value).map_err(|error| RequestError::InvalidResponse {
        message: error.to_string(),
    })
}
