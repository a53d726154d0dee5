//! Session lifecycle integration tests.
//!
//! Drives a [`SessionStore`] through wallet events against a scripted
//! backend and checks the published session, the credentials on outbound
//! requests, and what is left in token storage.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use sleuth_core::config::ClientConfig;
use sleuth_core::request::{AUTHORIZATION_HEADER, WALLET_ADDRESS_HEADER};
use sleuth_core::session::{
    AUTH_PATH, FileTokenStorage, ME_PATH, MemoryTokenStorage, PersistedSession, ProfileState,
    REPUTATION_PATH, SessionError, SessionStatus, SessionStore, TokenStorage, WalletEvent,
};
use sleuth_core::transport::{Method, MockReply, MockTransport, Transport};
use tokio::sync::mpsc;

fn token_reply(address: &str, token: &str) -> MockReply {
    json_reply(json!({
        "access_token": token,
        "token_type": "bearer",
        "wallet_address": address,
        "expires_at": 4_102_444_800_i64
    }))
}

fn json_reply(body: serde_json::Value) -> MockReply {
    MockReply::json(200, body)
}

fn profile_replies(mock: &MockTransport, address: &str) {
    mock.push(
        Method::Get,
        ME_PATH,
        json_reply(json!({
            "wallet_address": address,
            "created_at": "2025-03-01T10:20:30.123456",
            "reputation_created": true
        })),
    );
    mock.push(
        Method::Get,
        REPUTATION_PATH,
        json_reply(json!({
            "reputation_points": 15,
            "nft_count": 1,
            "submissions_accepted": 2,
            "wallet": address
        })),
    );
}

fn store(mock: &Arc<MockTransport>, storage: Arc<dyn TokenStorage>) -> SessionStore {
    SessionStore::new(
        &ClientConfig::default(),
        Arc::clone(mock) as Arc<dyn Transport>,
        storage,
    )
}

fn token_of(store: &SessionStore) -> Option<String> {
    store
        .session()
        .token
        .map(|token| token.expose_secret().to_string())
}

#[tokio::test]
async fn connect_exchanges_address_for_token() {
    let mock = Arc::new(MockTransport::new().on(Method::Post, AUTH_PATH, token_reply("0xABC", "T1")));
    profile_replies(&mock, "0xABC");
    let storage = Arc::new(MemoryTokenStorage::new());
    let store = store(&mock, Arc::clone(&storage) as Arc<dyn TokenStorage>);

    store
        .handle_wallet_event(WalletEvent::connected("0xABC"))
        .await
        .unwrap();

    let session = store.session();
    assert_eq!(session.status, SessionStatus::Authenticated);
    assert_eq!(session.wallet_address.as_deref(), Some("0xABC"));
    assert_eq!(token_of(&store).as_deref(), Some("T1"));
    assert!(session.expires_at.is_some());
    assert!(session.is_consistent());

    let persisted = storage.load().unwrap().unwrap();
    assert_eq!(persisted.access_token.expose_secret(), "T1");
    assert_eq!(persisted.wallet_address, "0xABC");

    let requests = mock.requests();
    // The exchange itself identifies by address; everything after by token.
    assert_eq!(requests[0].body, Some(json!({"wallet_address": "0xABC"})));
    assert_eq!(requests[0].header(WALLET_ADDRESS_HEADER), Some("0xABC"));
    for request in &requests[1..] {
        assert_eq!(request.header(AUTHORIZATION_HEADER), Some("Bearer T1"));
    }
}

#[tokio::test]
async fn connect_eventually_leaves_authenticating() {
    let mock = Arc::new(MockTransport::new().on(Method::Post, AUTH_PATH, MockReply::unreachable()));
    let store = store(&mock, Arc::new(MemoryTokenStorage::new()));
    let mut view = store.view();

    let (result, settled) = tokio::join!(
        store.handle_wallet_event(WalletEvent::connected("0xabc")),
        view.settled(),
    );

    assert!(matches!(result, Err(SessionError::Request(_))));
    assert_ne!(settled.status, SessionStatus::Authenticating);
    assert_eq!(store.session().status, SessionStatus::Anonymous);
    assert!(!store.session().has_token());
}

#[tokio::test]
async fn profile_401_revokes_and_purges_storage() {
    let mock = Arc::new(MockTransport::new().on(Method::Post, AUTH_PATH, token_reply("0xabc", "T1")));
    profile_replies(&mock, "0xabc");
    let storage = Arc::new(MemoryTokenStorage::new());
    let store = store(&mock, Arc::clone(&storage) as Arc<dyn TokenStorage>);
    store
        .handle_wallet_event(WalletEvent::connected("0xabc"))
        .await
        .unwrap();
    assert!(!storage.is_empty());

    mock.push(
        Method::Get,
        ME_PATH,
        MockReply::json(401, json!({"detail": "Could not validate credentials"})),
    );
    let err = store.refresh_profile().await.unwrap_err();

    assert!(matches!(err, SessionError::Revoked));
    let session = store.session();
    assert_eq!(session.status, SessionStatus::Anonymous);
    assert!(!session.has_token());
    assert_eq!(session.profile, ProfileState::Absent);
    assert!(storage.is_empty());
}

#[tokio::test]
async fn reputation_401_also_revokes() {
    let mock = Arc::new(
        MockTransport::new()
            .on(Method::Post, AUTH_PATH, token_reply("0xabc", "T1"))
            .on(Method::Get, ME_PATH, json_reply(json!({"wallet_address": "0xabc"})))
            .on(Method::Get, REPUTATION_PATH, MockReply::status(401, "")),
    );
    let storage = Arc::new(MemoryTokenStorage::new());
    let store = store(&mock, Arc::clone(&storage) as Arc<dyn TokenStorage>);

    let err = store
        .handle_wallet_event(WalletEvent::connected("0xabc"))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Revoked));
    assert_eq!(store.session().status, SessionStatus::Anonymous);
    assert!(storage.is_empty());
}

#[tokio::test]
async fn logout_is_idempotent() {
    let mock = Arc::new(MockTransport::new().on(Method::Post, AUTH_PATH, token_reply("0xabc", "T1")));
    profile_replies(&mock, "0xabc");
    let storage = Arc::new(MemoryTokenStorage::new());
    let store = store(&mock, Arc::clone(&storage) as Arc<dyn TokenStorage>);
    store
        .handle_wallet_event(WalletEvent::connected("0xabc"))
        .await
        .unwrap();

    store.logout().unwrap();
    let after_first = store.session();
    store.logout().unwrap();
    let after_second = store.session();

    assert_eq!(after_first.status, SessionStatus::Anonymous);
    assert_eq!(after_second.status, SessionStatus::Anonymous);
    assert_eq!(after_first.wallet_address, after_second.wallet_address);
    assert!(!after_second.has_token());
    assert!(storage.is_empty());
}

#[tokio::test(start_paused = true)]
async fn superseded_authentication_never_lands() {
    let mock = Arc::new(
        MockTransport::new()
            .on(
                Method::Post,
                AUTH_PATH,
                token_reply("0xaaa", "TA").after(Duration::from_secs(5)),
            )
            .on(Method::Post, AUTH_PATH, token_reply("0xbbb", "TB")),
    );
    profile_replies(&mock, "0xbbb");
    let storage = Arc::new(MemoryTokenStorage::new());
    let store = store(&mock, Arc::clone(&storage) as Arc<dyn TokenStorage>);

    let (first, second) = tokio::join!(
        store.handle_wallet_event(WalletEvent::connected("0xaaa")),
        async {
            tokio::task::yield_now().await;
            store
                .handle_wallet_event(WalletEvent::connected("0xbbb"))
                .await
        },
    );

    assert!(matches!(first, Err(SessionError::Superseded)));
    second.unwrap();

    let session = store.session();
    assert_eq!(session.wallet_address.as_deref(), Some("0xbbb"));
    assert_eq!(token_of(&store).as_deref(), Some("TB"));
    assert_eq!(
        storage.load().unwrap().unwrap().access_token.expose_secret(),
        "TB"
    );
}

#[tokio::test(start_paused = true)]
async fn drive_processes_events_in_order() {
    let mock = Arc::new(
        MockTransport::new()
            .on(
                Method::Post,
                AUTH_PATH,
                token_reply("0xaaa", "TA").after(Duration::from_secs(5)),
            )
            .on(Method::Post, AUTH_PATH, token_reply("0xbbb", "TB")),
    );
    profile_replies(&mock, "0xbbb");
    let store = store(&mock, Arc::new(MemoryTokenStorage::new()));
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::join!(store.drive(rx), async {
        tx.send(WalletEvent::connected("0xaaa")).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(WalletEvent::connected("0xbbb")).unwrap();
        drop(tx);
    });

    assert_eq!(store.session().status, SessionStatus::Authenticated);
    assert_eq!(token_of(&store).as_deref(), Some("TB"));
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_authentication() {
    let mock = Arc::new(MockTransport::new().on(
        Method::Post,
        AUTH_PATH,
        token_reply("0xaaa", "TA").after(Duration::from_secs(5)),
    ));
    let storage = Arc::new(MemoryTokenStorage::new());
    let store = store(&mock, Arc::clone(&storage) as Arc<dyn TokenStorage>);
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::join!(store.drive(rx), async {
        tx.send(WalletEvent::connected("0xaaa")).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(WalletEvent::Disconnected).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(tx);
    });

    assert_eq!(store.session().status, SessionStatus::Anonymous);
    assert!(!store.session().has_token());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn switching_wallets_discards_previous_token() {
    let mock = Arc::new(
        MockTransport::new()
            .on(Method::Post, AUTH_PATH, token_reply("0xaaa", "TA"))
            .on(Method::Post, AUTH_PATH, MockReply::status(500, "")),
    );
    profile_replies(&mock, "0xaaa");
    let storage = Arc::new(MemoryTokenStorage::new());
    let store = store(&mock, Arc::clone(&storage) as Arc<dyn TokenStorage>);

    store
        .handle_wallet_event(WalletEvent::connected("0xaaa"))
        .await
        .unwrap();
    let _ = store
        .handle_wallet_event(WalletEvent::connected("0xbbb"))
        .await;

    assert_eq!(store.session().status, SessionStatus::Anonymous);
    assert!(token_of(&store).is_none());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn rehydrated_token_round_trips_through_file_storage() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("session_token.json");

    {
        let mock = Arc::new(MockTransport::new().on(Method::Post, AUTH_PATH, token_reply("0xabc", "T1")));
        profile_replies(&mock, "0xabc");
        let store = store(&mock, Arc::new(FileTokenStorage::new(&path)));
        store
            .handle_wallet_event(WalletEvent::connected("0xabc"))
            .await
            .unwrap();
    }
    assert!(path.exists());

    let mock = Arc::new(MockTransport::new());
    profile_replies(&mock, "0xabc");
    let restarted = store(&mock, Arc::new(FileTokenStorage::new(&path)));

    // Loaded before any network call, but not yet trusted.
    assert_eq!(restarted.session().status, SessionStatus::Authenticating);
    assert!(mock.requests().is_empty());

    let status = restarted.restore().await.unwrap();
    assert_eq!(status, SessionStatus::Authenticated);
    assert_eq!(token_of(&restarted).as_deref(), Some("T1"));
    assert_eq!(
        mock.requests()[0].header(AUTHORIZATION_HEADER),
        Some("Bearer T1")
    );
    assert!(restarted.session().profile.profile().is_some());
}

#[tokio::test]
async fn rejected_stored_token_is_purged() {
    let storage = Arc::new(MemoryTokenStorage::with_session(&PersistedSession {
        access_token: SecretString::from("stale"),
        wallet_address: "0xabc".to_string(),
        expires_at: None,
    }));
    let mock = Arc::new(MockTransport::new().on(Method::Get, ME_PATH, MockReply::status(401, "")));

    let store = SessionStore::open(
        &ClientConfig::default(),
        Arc::clone(&mock) as Arc<dyn Transport>,
        Arc::clone(&storage) as Arc<dyn TokenStorage>,
    )
    .await;

    assert_eq!(store.session().status, SessionStatus::Anonymous);
    assert!(storage.is_empty());
}

#[tokio::test]
async fn unreachable_backend_keeps_stored_token_for_next_start() {
    let storage = Arc::new(MemoryTokenStorage::with_session(&PersistedSession {
        access_token: SecretString::from("T1"),
        wallet_address: "0xabc".to_string(),
        expires_at: None,
    }));
    let mock = Arc::new(MockTransport::new().on(Method::Get, ME_PATH, MockReply::unreachable()));
    let store = store(&mock, Arc::clone(&storage) as Arc<dyn TokenStorage>);

    assert!(matches!(
        store.restore().await,
        Err(SessionError::Request(_))
    ));
    assert_eq!(store.session().status, SessionStatus::Anonymous);
    assert!(!store.session().has_token());
    assert!(!storage.is_empty());
}

#[tokio::test]
async fn connecting_another_wallet_purges_token_kept_after_failed_restore() {
    let storage = Arc::new(MemoryTokenStorage::with_session(&PersistedSession {
        access_token: SecretString::from("T-A"),
        wallet_address: "0xaaa".to_string(),
        expires_at: None,
    }));
    let mock = Arc::new(
        MockTransport::new()
            .on(Method::Get, ME_PATH, MockReply::timeout())
            .on(Method::Post, AUTH_PATH, MockReply::status(500, "")),
    );
    let store = store(&mock, Arc::clone(&storage) as Arc<dyn TokenStorage>);

    assert!(store.restore().await.is_err());
    assert!(!storage.is_empty());

    let err = store
        .handle_wallet_event(WalletEvent::connected("0xbbb"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Request(_)));

    assert_eq!(store.session().status, SessionStatus::Anonymous);
    assert!(storage.is_empty());
    assert!(storage.load().unwrap().is_none());
}

#[tokio::test]
async fn reconnecting_same_wallet_after_failed_restore_keeps_its_token() {
    let storage = Arc::new(MemoryTokenStorage::with_session(&PersistedSession {
        access_token: SecretString::from("T-A"),
        wallet_address: "0xaaa".to_string(),
        expires_at: None,
    }));
    let mock = Arc::new(
        MockTransport::new()
            .on(Method::Get, ME_PATH, MockReply::timeout())
            .on(Method::Post, AUTH_PATH, MockReply::unreachable()),
    );
    let store = store(&mock, Arc::clone(&storage) as Arc<dyn TokenStorage>);

    let _ = store.restore().await;
    let _ = store
        .handle_wallet_event(WalletEvent::connected("0xaaa"))
        .await;

    assert_eq!(storage.load().unwrap().unwrap().wallet_address, "0xaaa");
}

#[tokio::test]
async fn subscribers_see_every_transition() {
    let mock = Arc::new(MockTransport::new().on(Method::Post, AUTH_PATH, token_reply("0xabc", "T1")));
    profile_replies(&mock, "0xabc");
    let store = store(&mock, Arc::new(MemoryTokenStorage::new()));

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store.on_change(move |session| sink.lock().unwrap().push(session.status));

    store
        .handle_wallet_event(WalletEvent::connected("0xabc"))
        .await
        .unwrap();
    store.handle_wallet_event(WalletEvent::Disconnected).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            SessionStatus::Authenticating,
            SessionStatus::Authenticated,
            SessionStatus::Authenticated,
            SessionStatus::Anonymous,
        ]
    );
}
