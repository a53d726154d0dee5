//! Session error types.

use thiserror::Error;

use super::storage::StorageError;
use crate::request::RequestError;

/// Errors reported by [`SessionStore`](super::SessionStore) operations.
///
/// None of these leave the store in an inconsistent state; the session has
/// already been moved to wherever the failure puts it when the error is
/// returned.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// The operation needs a token and none is held.
    #[error("no authenticated session")]
    NotAuthenticated,

    /// The backend rejected the held token; the session was cleared.
    #[error("session token was rejected by the backend")]
    Revoked,

    /// A newer wallet event or a logout replaced the session while the call
    /// was in flight; its result was discarded.
    #[error("session changed while the request was in flight")]
    Superseded,

    /// The backend call failed.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The token store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
