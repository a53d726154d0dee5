//! The session owner.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::error::SessionError;
use super::state::{
    AccountInfo, ProfileState, ReputationStats, Session, SessionStatus, SessionView,
    UserProfile, WalletEvent,
};
use super::storage::{PersistedSession, StorageError, TokenStorage};
use crate::config::ClientConfig;
use crate::request::RequestClient;
use crate::transport::Transport;

/// Token exchange endpoint.
pub const AUTH_PATH: &str = "/wallet/auth";

/// Account endpoint, also used to validate a rehydrated token.
pub const ME_PATH: &str = "/me";

/// Reputation counters endpoint.
pub const REPUTATION_PATH: &str = "/me/reputation";

/// Handle returned by [`SessionStore::on_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&Session) + Send + Sync>;

type Inflight<'a> = Pin<Box<dyn Future<Output = Result<(), SessionError>> + Send + 'a>>;

#[derive(Deserialize)]
struct AuthResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    wallet_address: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// Identity and epoch captured when an async call starts.
///
/// Its result is applied only if both still match the live session.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ticket {
    address: String,
    epoch: u64,
}

/// What to do with durable storage as part of a transition.
enum Persist {
    Keep,
    Save(PersistedSession),
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileMode {
    /// First `/me` call on a rehydrated token: a non-401 failure drops the
    /// in-memory session.
    Validate,
    /// Profile refresh on a confirmed token: failures are recorded in the
    /// profile slot.
    Refresh,
}

enum Transition {
    Unchanged,
    Cleared,
    Authenticate(Ticket),
}

struct StoreState {
    session: Session,
    epoch: u64,
}

/// Owns the process-wide [`Session`].
///
/// All mutation happens here. Consumers get a [`SessionView`] (via
/// [`Self::view`] or the [`RequestClient`] from [`Self::client`]) and may
/// register change callbacks with [`Self::on_change`].
///
/// Every transition bumps an internal epoch. Async results (token exchange,
/// profile fetch) carry the epoch and address captured when they started and
/// are dropped when either has moved on, so the last wallet event always
/// wins.
pub struct SessionStore {
    state: Mutex<StoreState>,
    sender: watch::Sender<Session>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_subscription: AtomicU64,
    storage: Arc<dyn TokenStorage>,
    client: RequestClient,
}

impl SessionStore {
    /// Creates a store and rehydrates any persisted token.
    ///
    /// A stored, unexpired token puts the session in
    /// [`SessionStatus::Authenticating`]; it is not trusted until
    /// [`Self::restore`] confirms it. No network call is made here.
    #[must_use]
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn TokenStorage>,
    ) -> Self {
        let initial = rehydrate(storage.as_ref(), Utc::now());
        let (sender, receiver) = watch::channel(initial.clone());
        let client = RequestClient::new(config.base_url(), transport, SessionView::new(receiver));

        info!(
            status = %initial.status,
            storage = storage.name(),
            "session store initialized"
        );

        Self {
            state: Mutex::new(StoreState {
                session: initial,
                epoch: 0,
            }),
            sender,
            listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            storage,
            client,
        }
    }

    /// [`Self::new`] followed by [`Self::restore`].
    ///
    /// A failed restore is logged and leaves the session anonymous.
    pub async fn open(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn TokenStorage>,
    ) -> Self {
        let store = Self::new(config, transport, storage);
        if let Err(error) = store.restore().await {
            warn!(error = %error, "stored session could not be restored");
        }
        store
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.lock_state().session.clone()
    }

    /// Read-only view for consumers.
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView::new(self.sender.subscribe())
    }

    /// Raw change feed.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.sender.subscribe()
    }

    /// Request client reading credentials from this store.
    #[must_use]
    pub fn client(&self) -> RequestClient {
        self.client.clone()
    }

    /// Registers `callback` to run after every transition.
    ///
    /// Callbacks run on the task that caused the transition, after the
    /// internal lock is released, so they may call back into the store.
    pub fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().push((id, Arc::new(callback)));
        id
    }

    /// Removes a callback. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Clears the session and the stored token.
    ///
    /// Synchronous and idempotent. Any in-flight authentication is
    /// invalidated.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the stored token could not be removed.
    /// The in-memory session is cleared regardless.
    pub fn logout(&self) -> Result<(), StorageError> {
        let mut state = self.lock_state();
        let result = self.storage.clear();
        if let Err(error) = &result {
            warn!(error = %error, "failed to clear stored session token");
        }

        let already_clear = state.session.status == SessionStatus::Anonymous
            && state.session.wallet_address.is_none()
            && state.session.profile == ProfileState::Absent;
        if already_clear {
            debug!("logout on anonymous session");
            return result;
        }

        state.session = Session::default();
        let snapshot = self.commit(&mut state);
        drop(state);
        info!("logged out");
        self.notify(&snapshot);
        result
    }

    /// Applies one wallet signal and, for a new identity, runs the token
    /// exchange to completion.
    ///
    /// `Connected` for the address already authenticated (or being
    /// authenticated) is a no-op.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Request`] if the token exchange failed
    /// - [`SessionError::Superseded`] if another transition replaced this one
    /// - [`SessionError::Revoked`] if the fresh token was rejected right away
    pub async fn handle_wallet_event(&self, event: WalletEvent) -> Result<(), SessionError> {
        match self.begin(event) {
            Transition::Authenticate(ticket) => self.authenticate(ticket).await,
            Transition::Unchanged | Transition::Cleared => Ok(()),
        }
    }

    /// Processes wallet events from `events` strictly in order until the
    /// channel closes.
    ///
    /// A new `Connected` or a `Disconnected` cancels any token exchange still
    /// in flight for the previous identity. Failures are logged.
    pub async fn drive(&self, mut events: mpsc::UnboundedReceiver<WalletEvent>) {
        let mut inflight: Option<Inflight<'_>> = None;

        loop {
            tokio::select! {
                biased;

                event = events.recv() => {
                    let Some(event) = event else { break };
                    match self.begin(event) {
                        Transition::Authenticate(ticket) => {
                            if inflight.is_some() {
                                debug!("dropping superseded authentication");
                            }
                            inflight = Some(Box::pin(self.authenticate(ticket)));
                        },
                        Transition::Cleared => inflight = None,
                        Transition::Unchanged => {},
                    }
                },
                result = async {
                    match inflight.as_mut() {
                        Some(future) => future.await,
                        None => std::future::pending().await,
                    }
                } => {
                    inflight = None;
                    log_outcome(result);
                },
            }
        }

        if let Some(future) = inflight {
            log_outcome(future.await);
        }
        debug!("wallet event channel closed");
    }

    /// Confirms a rehydrated token with `GET /me`.
    ///
    /// Does nothing unless the session is authenticating with a stored
    /// token. On success the session becomes authenticated with a profile;
    /// a 401 revokes it and purges storage; any other failure drops the
    /// in-memory session but keeps the stored token for the next start.
    ///
    /// # Errors
    ///
    /// See [`SessionError`].
    pub async fn restore(&self) -> Result<SessionStatus, SessionError> {
        let ticket = {
            let state = self.lock_state();
            let session = &state.session;
            match (&session.wallet_address, session.status) {
                (Some(address), SessionStatus::Authenticating) if session.has_token() => Ticket {
                    address: address.clone(),
                    epoch: state.epoch,
                },
                _ => return Ok(session.status),
            }
        };

        debug!(epoch = ticket.epoch, "validating stored session token");
        self.load_profile(ticket, ProfileMode::Validate).await?;
        Ok(self.session().status)
    }

    /// Re-fetches the profile of an authenticated session.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotAuthenticated`] without a confirmed token, otherwise
    /// see [`SessionError`]. A non-401 failure is also recorded as
    /// [`ProfileState::Unavailable`].
    pub async fn refresh_profile(&self) -> Result<(), SessionError> {
        let ticket = self.current_ticket().ok_or(SessionError::NotAuthenticated)?;
        self.load_profile(ticket, ProfileMode::Refresh).await
    }

    fn begin(&self, event: WalletEvent) -> Transition {
        match event {
            WalletEvent::Disconnected => {
                if let Err(error) = self.logout() {
                    warn!(error = %error, "stored token not cleared on disconnect");
                }
                Transition::Cleared
            },
            WalletEvent::Connected { address } => {
                let mut state = self.lock_state();
                let session = &state.session;
                let same_identity = session.wallet_address.as_deref() == Some(address.as_str())
                    && session.status != SessionStatus::Anonymous;
                if same_identity {
                    debug!(status = %session.status, "wallet already connected");
                    return Transition::Unchanged;
                }

                // Storage can hold another wallet's token even when memory
                // does not, e.g. after a restore that failed without a 401.
                let stored_for_other = match self.storage.load() {
                    Ok(Some(record)) => record.wallet_address != address,
                    Ok(None) => false,
                    Err(_) => true,
                };
                if session.has_token() || stored_for_other {
                    if let Err(error) = self.storage.clear() {
                        warn!(error = %error, "failed to clear token of previous wallet");
                    }
                }
                state.session = Session {
                    wallet_address: Some(address.clone()),
                    status: SessionStatus::Authenticating,
                    ..Session::default()
                };
                let snapshot = self.commit(&mut state);
                let ticket = Ticket {
                    address,
                    epoch: state.epoch,
                };
                drop(state);

                info!(epoch = ticket.epoch, "wallet connected, authenticating");
                self.notify(&snapshot);
                Transition::Authenticate(ticket)
            },
        }
    }

    async fn authenticate(&self, ticket: Ticket) -> Result<(), SessionError> {
        let body = serde_json::json!({ "wallet_address": ticket.address });
        let response: AuthResponse = match self.client.post_json(AUTH_PATH, &body).await {
            Ok(response) => response,
            Err(error) => {
                warn!(error = %error, "token exchange failed");
                self.apply_if_current(&ticket, |session| {
                    *session = Session::default();
                    Persist::Keep
                })
                .ok_or(SessionError::Superseded)?;
                return Err(error.into());
            },
        };

        if let Some(issued_for) = &response.wallet_address {
            if !issued_for.eq_ignore_ascii_case(&ticket.address) {
                warn!(issued_for = %issued_for, "token issued for a different address");
            }
        }
        if let Some(token_type) = &response.token_type {
            if !token_type.eq_ignore_ascii_case("bearer") {
                debug!(token_type = %token_type, "unexpected token type");
            }
        }

        let token = SecretString::from(response.access_token);
        let expires_at = response
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        let record = PersistedSession {
            access_token: token.clone(),
            wallet_address: ticket.address.clone(),
            expires_at,
        };

        let ticket = self
            .apply_if_current(&ticket, |session| {
                session.token = Some(token);
                session.expires_at = expires_at;
                session.status = SessionStatus::Authenticated;
                Persist::Save(record)
            })
            .ok_or_else(|| {
                debug!("discarding token for superseded wallet");
                SessionError::Superseded
            })?;

        info!(epoch = ticket.epoch, "authenticated");
        self.load_profile(ticket, ProfileMode::Refresh).await
    }

    async fn load_profile(&self, ticket: Ticket, mode: ProfileMode) -> Result<(), SessionError> {
        let account = match self.client.get_json::<AccountInfo>(ME_PATH).await {
            Ok(account) => account,
            Err(error) if error.is_unauthorized() => return Err(self.revoke(&ticket)),
            Err(error) => {
                warn!(error = %error, mode = ?mode, "profile fetch failed");
                let reason = error.to_string();
                self.apply_if_current(&ticket, |session| {
                    match mode {
                        ProfileMode::Validate => *session = Session::default(),
                        ProfileMode::Refresh => {
                            session.profile = ProfileState::Unavailable { reason };
                        },
                    }
                    Persist::Keep
                })
                .ok_or(SessionError::Superseded)?;
                return Err(error.into());
            },
        };

        let reputation = match self.client.get_json::<ReputationStats>(REPUTATION_PATH).await {
            Ok(stats) => Some(stats),
            Err(error) if error.is_unauthorized() => return Err(self.revoke(&ticket)),
            Err(error) => {
                warn!(error = %error, "reputation fetch failed");
                None
            },
        };

        self.apply_if_current(&ticket, |session| {
            session.status = SessionStatus::Authenticated;
            session.profile = ProfileState::Loaded(UserProfile {
                account,
                reputation,
            });
            Persist::Keep
        })
        .ok_or(SessionError::Superseded)?;
        debug!("profile loaded");
        Ok(())
    }

    fn revoke(&self, ticket: &Ticket) -> SessionError {
        let applied = self.apply_if_current(ticket, |session| {
            *session = Session::default();
            Persist::Clear
        });
        if applied.is_some() {
            warn!("session token rejected, session revoked");
            SessionError::Revoked
        } else {
            SessionError::Superseded
        }
    }

    /// Runs `update` on the session if `ticket` is still current, then
    /// publishes. Returns the ticket for the new epoch.
    fn apply_if_current<F>(&self, ticket: &Ticket, update: F) -> Option<Ticket>
    where
        F: FnOnce(&mut Session) -> Persist,
    {
        let mut state = self.lock_state();
        let current = state.epoch == ticket.epoch
            && state.session.wallet_address.as_deref() == Some(ticket.address.as_str());
        if !current {
            debug!(
                ticket_epoch = ticket.epoch,
                epoch = state.epoch,
                "discarding superseded result"
            );
            return None;
        }

        match update(&mut state.session) {
            Persist::Keep => {},
            Persist::Save(record) => {
                if let Err(error) = self.storage.save(&record) {
                    warn!(error = %error, "failed to persist session token");
                }
            },
            Persist::Clear => {
                if let Err(error) = self.storage.clear() {
                    warn!(error = %error, "failed to clear stored session token");
                }
            },
        }

        let snapshot = self.commit(&mut state);
        let next = Ticket {
            address: ticket.address.clone(),
            epoch: state.epoch,
        };
        drop(state);
        self.notify(&snapshot);
        Some(next)
    }

    fn current_ticket(&self) -> Option<Ticket> {
        let state = self.lock_state();
        let session = &state.session;
        if !session.is_authenticated() {
            return None;
        }
        session.wallet_address.clone().map(|address| Ticket {
            address,
            epoch: state.epoch,
        })
    }

    /// Bumps the epoch and publishes `state.session` to watchers. Must be
    /// called with the state lock held; listeners are notified separately.
    fn commit(&self, state: &mut StoreState) -> Session {
        debug_assert!(state.session.is_consistent());
        state.epoch += 1;
        let snapshot = state.session.clone();
        self.sender.send_replace(snapshot.clone());
        debug!(epoch = state.epoch, status = %snapshot.status, "session transition");
        snapshot
    }

    fn notify(&self, session: &Session) {
        let listeners: Vec<Listener> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(session);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn rehydrate(storage: &dyn TokenStorage, now: DateTime<Utc>) -> Session {
    let record = match storage.load() {
        Ok(Some(record)) => record,
        Ok(None) => return Session::default(),
        Err(error) => {
            warn!(error = %error, storage = storage.name(), "discarding unreadable session record");
            if let Err(error) = storage.clear() {
                warn!(error = %error, "failed to clear unreadable session record");
            }
            return Session::default();
        },
    };

    if record.is_expired_at(now) || record.access_token.expose_secret().is_empty() {
        debug!("stored session token expired");
        if let Err(error) = storage.clear() {
            warn!(error = %error, "failed to clear expired session token");
        }
        return Session::default();
    }

    Session {
        wallet_address: Some(record.wallet_address),
        token: Some(record.access_token),
        expires_at: record.expires_at,
        profile: ProfileState::Absent,
        status: SessionStatus::Authenticating,
    }
}

fn log_outcome(result: Result<(), SessionError>) {
    match result {
        Ok(()) => {},
        Err(SessionError::Superseded) => debug!("authentication superseded"),
        Err(error) => warn!(error = %error, "authentication did not complete"),
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("SessionStore")
            .field("status", &state.session.status)
            .field("epoch", &state.epoch)
            .field("storage", &self.storage.name())
            .finish_non_exhaustive()
    }
}
