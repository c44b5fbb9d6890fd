mod common;

use common::*;
use serde_json::json;
use storegate_cache::KeyValueStore;
use storegate_client::{Method, TokenPhase};
use storegate_core::{Error, LogoutReason, SessionEvent, TOKEN_STORAGE_KEY};

#[tokio::test(start_paused = true)]
async fn test_login_persists_token_and_drops_cached_data() {
    let token = jwt(3600);
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "/categories", 200, category_tree());
    transport.respond(
        Method::Post,
        "/auth/login",
        200,
        json!({"token": token, "message": "Logged in"}),
    );
    let store = memory_store(None);
    let gateway = gateway(&transport, &store);
    let mut events = gateway.subscribe();

    gateway.categories().await.unwrap();
    let answer = gateway.login("alice", "secret").await.unwrap();

    assert_eq!(answer.message.as_deref(), Some("Logged in"));
    assert!(gateway.is_authenticated());
    assert_eq!(gateway.token_phase(), TokenPhase::Valid);
    assert_eq!(store.get(TOKEN_STORAGE_KEY).unwrap(), Some(token));
    assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedIn);

    let login = &transport.requests_to(Method::Post, "/auth/login")[0];
    assert_eq!(
        login.body,
        Some(json!({"username": "alice", "password": "secret"}))
    );

    gateway.categories().await.unwrap();
    assert_eq!(transport.calls_to(Method::Get, "/categories"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_wrong_password_is_a_plain_rejection() {
    let transport = ScriptedTransport::new();
    transport.respond(
        Method::Post,
        "/auth/login",
        401,
        json!({"message": "Invalid credentials"}),
    );
    let gateway = gateway(&transport, &memory_store(None));

    let err = gateway.login("alice", "wrong").await.unwrap_err();

    assert!(matches!(err, Error::Rejected { status: 401, .. }));
    assert!(err.to_string().contains("Invalid credentials"));
    assert_eq!(transport.calls_to(Method::Post, "/auth/login"), 1);
    assert_eq!(transport.calls_to(Method::Post, "/auth/refresh"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_login_without_token_fails_to_decode() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Post, "/auth/login", 200, json!({"message": "ok"}));
    let gateway = gateway(&transport, &memory_store(None));

    let err = gateway.login("alice", "secret").await.unwrap_err();
    assert!(matches!(err, Error::Decode { .. }));
    assert!(!gateway.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn test_near_expiry_refreshes_once_for_concurrent_calls() {
    let renewed = jwt(3600);
    let transport = ScriptedTransport::new();
    transport.respond(Method::Post, "/auth/refresh", 200, json!({"token": renewed}));
    transport.respond(Method::Get, "/auth/profile", 200, json!({"username": "alice"}));
    transport.respond(Method::Get, "/favorites", 200, json!({"products": []}));
    let store = memory_store(Some(&jwt(60)));
    let gateway = gateway(&transport, &store);
    assert_eq!(gateway.token_phase(), TokenPhase::NearExpiry);
    let mut events = gateway.subscribe();

    let (profile, favorites) = tokio::join!(gateway.profile(), gateway.favorites(1, 12));
    profile.unwrap();
    favorites.unwrap();

    assert_eq!(transport.calls_to(Method::Post, "/auth/refresh"), 1);
    for path in ["/auth/profile", "/favorites"] {
        let sent = &transport.requests_to(Method::Get, path)[0];
        assert_eq!(sent.bearer.as_deref(), Some(renewed.as_str()));
    }
    assert_eq!(store.get(TOKEN_STORAGE_KEY).unwrap(), Some(renewed));
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Refreshed);
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_triggers_one_refresh_and_resend() {
    let original = jwt(3600);
    let renewed = jwt(7200);
    let transport = ScriptedTransport::new();
    transport
        .respond(Method::Get, "/auth/profile", 401, json!({"message": "jwt expired"}))
        .respond(Method::Get, "/auth/profile", 200, json!({"username": "alice"}));
    transport.respond(Method::Post, "/auth/refresh", 200, json!({"token": renewed}));
    let gateway = gateway(&transport, &memory_store(Some(&original)));

    let profile = gateway.profile().await.unwrap();
    assert_eq!(profile.username.as_deref(), Some("alice"));

    let sent = transport.requests_to(Method::Get, "/auth/profile");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].bearer.as_deref(), Some(original.as_str()));
    assert_eq!(sent[1].bearer.as_deref(), Some(renewed.as_str()));
    assert_eq!(transport.calls_to(Method::Post, "/auth/refresh"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_forces_logout() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "/categories", 200, category_tree());
    transport.respond(Method::Post, "/auth/refresh", 401, json!({"message": "invalid token"}));
    let store = memory_store(Some(&jwt(60)));
    let gateway = gateway(&transport, &store);
    let mut events = gateway.subscribe();

    gateway.categories().await.unwrap();
    let err = gateway.profile().await.unwrap_err();

    assert!(err.is_auth_expired());
    assert!(!gateway.is_authenticated());
    assert_eq!(store.get(TOKEN_STORAGE_KEY).unwrap(), None);
    assert_eq!(transport.calls_to(Method::Get, "/auth/profile"), 0);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::LoggedOut {
            reason: LogoutReason::RefreshFailed
        }
    );

    // The cascade emptied the cache
    gateway.categories().await.unwrap();
    assert_eq!(transport.calls_to(Method::Get, "/categories"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_unauthorized_ends_session() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "/auth/profile", 401, json!({"message": "jwt expired"}));
    transport.respond(Method::Post, "/auth/refresh", 200, json!({"token": jwt(7200)}));
    let store = memory_store(Some(&jwt(3600)));
    let gateway = gateway(&transport, &store);
    let mut events = gateway.subscribe();

    let err = gateway.profile().await.unwrap_err();

    assert!(err.is_auth_expired());
    assert_eq!(transport.calls_to(Method::Get, "/auth/profile"), 2);
    assert!(!gateway.is_authenticated());
    assert_eq!(store.get(TOKEN_STORAGE_KEY).unwrap(), None);
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Refreshed);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::LoggedOut {
            reason: LogoutReason::TokenExpired
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_expired_token_discarded_at_startup() {
    let transport = ScriptedTransport::new();
    let store = memory_store(Some(&jwt(-30)));
    let gateway = gateway(&transport, &store);

    assert!(!gateway.is_authenticated());
    assert_eq!(gateway.token_phase(), TokenPhase::Unset);
    assert_eq!(store.get(TOKEN_STORAGE_KEY).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_logout_is_best_effort() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "/auth/profile", 200, json!({"username": "alice"}));
    transport.respond(Method::Post, "/auth/logout", 500, json!(null));
    let token = jwt(3600);
    let store = memory_store(Some(&token));
    let gateway = gateway(&transport, &store);
    let mut events = gateway.subscribe();

    gateway.profile().await.unwrap();
    gateway.logout().await;

    assert!(!gateway.is_authenticated());
    assert_eq!(store.get(TOKEN_STORAGE_KEY).unwrap(), None);
    assert_eq!(gateway.cache_stats().entries, 0);
    assert_eq!(gateway.rate_limit_status("auth").in_window, 0);
    assert_eq!(
        transport.requests_to(Method::Post, "/auth/logout")[0]
            .bearer
            .as_deref(),
        Some(token.as_str())
    );
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::LoggedOut {
            reason: LogoutReason::UserRequested
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_logout_without_session_stays_local() {
    let transport = ScriptedTransport::new();
    let gateway = gateway(&transport, &memory_store(None));

    gateway.logout().await;
    assert_eq!(transport.total_calls(), 0);
}
