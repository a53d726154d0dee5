//! Wallet-gated session lifecycle.
//!
//! [`SessionStore`] reconciles the external wallet signal with the
//! backend-issued token and is the only writer of the [`Session`].
//!
//! ```text
//!              Connected(addr)             token issued
//! Anonymous ───────────────────► Authenticating ──────────► Authenticated
//!     ▲                               │                          │
//!     │        exchange failed        │                          │
//!     ├───────────────────────────────┘                          │
//!     │   logout / Disconnected / 401 on /me or /me/reputation   │
//!     └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A token found in storage at start-up puts the session straight into
//! `Authenticating`; [`SessionStore::restore`] confirms it with `GET /me`
//! before it is trusted.

mod error;
mod state;
mod storage;
mod store;

pub use error::SessionError;
pub use state::{
    AccountInfo, ProfileState, ReputationStats, Session, SessionStatus, SessionView,
    UserProfile, WalletEvent,
};
pub use storage::{
    FileTokenStorage, KeyringTokenStorage, MemoryTokenStorage, PersistedSession, StorageError,
    TokenStorage, storage_from_config,
};
pub use store::{AUTH_PATH, ME_PATH, REPUTATION_PATH, SessionStore, SubscriptionId};
