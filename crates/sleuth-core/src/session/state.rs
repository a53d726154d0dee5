//! Session data model and the read-only view handed to consumers.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::request::Credential;

/// Signal from the external wallet provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// A wallet account is connected.
    Connected {
        /// Account address as reported by the wallet.
        address: String,
    },
    /// The wallet disconnected.
    Disconnected,
}

impl WalletEvent {
    /// Shorthand for [`WalletEvent::Connected`].
    #[must_use]
    pub fn connected(address: impl Into<String>) -> Self {
        Self::Connected {
            address: address.into(),
        }
    }
}

/// Lifecycle position of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No identity.
    #[default]
    Anonymous,
    /// An identity is known but not yet confirmed by the backend.
    Authenticating,
    /// The backend issued (or re-confirmed) a token.
    Authenticated,
}

impl SessionStatus {
    /// Returns the status name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account record returned by `GET /me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Wallet address the token was issued for.
    pub wallet_address: String,
    /// Account creation time as sent by the backend (ISO 8601, may lack an
    /// offset).
    #[serde(default)]
    pub created_at: Option<String>,
    /// Whether the on-chain reputation object exists.
    #[serde(default)]
    pub reputation_created: bool,
}

impl AccountInfo {
    /// Parses [`Self::created_at`], accepting both RFC 3339 and naive
    /// timestamps (the latter read as UTC).
    #[must_use]
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }
}

/// Reputation counters returned by `GET /me/reputation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationStats {
    /// Accumulated reputation points.
    pub reputation_points: u64,
    /// Minted NFTs.
    pub nft_count: u64,
    /// Accepted submissions.
    pub submissions_accepted: u64,
    /// Wallet the counters belong to.
    #[serde(default)]
    pub wallet: String,
}

/// Backend-owned enrichment of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Account record.
    pub account: AccountInfo,
    /// Reputation counters; `None` when the reputation endpoint failed.
    pub reputation: Option<ReputationStats>,
}

/// Profile slot of a session.
///
/// `Absent` is a normal state (nothing fetched yet) and is deliberately
/// distinct from `Unavailable`, which records a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProfileState {
    /// Not fetched.
    #[default]
    Absent,
    /// Fetched successfully.
    Loaded(UserProfile),
    /// Fetch failed for a reason other than credential rejection.
    Unavailable {
        /// Error description.
        reason: String,
    },
}

impl ProfileState {
    /// Loaded profile, if any.
    #[must_use]
    pub const fn profile(&self) -> Option<&UserProfile> {
        match self {
            Self::Loaded(profile) => Some(profile),
            _ => None,
        }
    }
}

/// This client's record of authentication state.
///
/// Only [`SessionStore`](super::SessionStore) mutates the live session; every
/// other component sees clones through a [`SessionView`].
///
/// Invariant: `token` is `None` whenever `status` is
/// [`SessionStatus::Anonymous`].
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Connected wallet address.
    pub wallet_address: Option<String>,
    /// Backend-issued bearer token.
    pub token: Option<SecretString>,
    /// Token expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Profile slot.
    pub profile: ProfileState,
    /// Lifecycle status.
    pub status: SessionStatus,
}

impl Session {
    /// Whether the session is authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// Whether a token is held.
    #[must_use]
    pub const fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Credential for outbound requests: token first, then wallet address.
    #[must_use]
    pub fn credential(&self) -> Credential {
        if let Some(token) = &self.token {
            return Credential::Bearer(token.clone());
        }
        self.wallet_address
            .as_ref()
            .map_or(Credential::None, |address| {
                Credential::WalletAddress(address.clone())
            })
    }

    /// Checks the token/status invariant.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        !(self.status == SessionStatus::Anonymous && self.token.is_some())
    }
}

/// Read-only handle on the live session.
///
/// Cloned into the [`RequestClient`](crate::request::RequestClient) and every
/// workflow. It can observe but never change the session.
#[derive(Debug, Clone)]
pub struct SessionView {
    rx: watch::Receiver<Session>,
}

impl SessionView {
    pub(crate) const fn new(rx: watch::Receiver<Session>) -> Self {
        Self { rx }
    }

    /// A view that always reports `session`, detached from any store.
    #[must_use]
    pub fn fixed(session: Session) -> Self {
        let (_tx, rx) = watch::channel(session);
        Self { rx }
    }

    /// Clone of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.rx.borrow().clone()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.rx.borrow().status
    }

    /// Credential the next request should carry.
    #[must_use]
    pub fn credential(&self) -> Credential {
        self.rx.borrow().credential()
    }

    /// Waits until the session leaves [`SessionStatus::Authenticating`].
    ///
    /// Returns the settled session, or the last known one if the store was
    /// dropped.
    pub async fn settled(&mut self) -> Session {
        let settled = self
            .rx
            .wait_for(|session| session.status != SessionStatus::Authenticating)
            .await
            .map(|session| session.clone());
        settled.unwrap_or_else(|_| self.rx.borrow().clone())
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_default_session_is_anonymous() {
        let session = Session::default();
        assert_eq!(session.status, SessionStatus::Anonymous);
        assert!(!session.has_token());
        assert!(session.is_consistent());
        assert!(matches!(session.credential(), Credential::None));
    }

    #[test]
    fn test_credential_prefers_token() {
        let session = Session {
            wallet_address: Some("0xabc".to_string()),
            token: Some(SecretString::from("T1")),
            status: SessionStatus::Authenticated,
            ..Session::default()
        };
        match session.credential() {
            Credential::Bearer(token) => assert_eq!(token.expose_secret(), "T1"),
            other => panic!("unexpected credential {other:?}"),
        }
    }

    #[test]
    fn test_anonymous_with_token_is_inconsistent() {
        let session = Session {
            token: Some(SecretString::from("T1")),
            ..Session::default()
        };
        assert!(!session.is_consistent());
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let session = Session {
            token: Some(SecretString::from("super-secret-token")),
            status: SessionStatus::Authenticated,
            ..Session::default()
        };
        assert!(!format!("{session:?}").contains("super-secret-token"));
    }

    #[test]
    fn test_account_created_at_formats() {
        let naive = AccountInfo {
            wallet_address: "0xabc".to_string(),
            created_at: Some("2025-03-01T10:20:30.123456".to_string()),
            reputation_created: false,
        };
        assert!(naive.created_at_utc().is_some());

        let rfc = AccountInfo {
            created_at: Some("2025-03-01T10:20:30Z".to_string()),
            ..naive.clone()
        };
        assert!(rfc.created_at_utc().is_some());

        let missing = AccountInfo {
            created_at: None,
            ..naive
        };
        assert!(missing.created_at_utc().is_none());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SessionStatus::Anonymous.to_string(), "anonymous");
        assert_eq!(SessionStatus::Authenticating.to_string(), "authenticating");
        assert_eq!(SessionStatus::Authenticated.to_string(), "authenticated");
    }

    #[tokio::test]
    async fn test_fixed_view_settles_immediately() {
        let mut view = SessionView::fixed(Session::default());
        assert_eq!(view.settled().await.status, SessionStatus::Anonymous);
    }
}
