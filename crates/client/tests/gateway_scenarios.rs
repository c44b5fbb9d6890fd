mod common;

use common::*;
use serde_json::json;
use std::time::Duration;
use storegate_client::Method;
use storegate_core::Error;

#[tokio::test(start_paused = true)]
async fn test_cache_then_network() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "/categories", 200, category_tree());
    let gateway = gateway(&transport, &memory_store(None));

    let first = gateway.categories().await.unwrap();
    let second = gateway.categories().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first[1].children[0].short_name, "ssd");
    assert_eq!(transport.calls_to(Method::Get, "/categories"), 1);
    assert_eq!(gateway.cache_stats().hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_ttl_refetches() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Get, "/categories", 200, category_tree());
    let gateway = gateway(&transport, &memory_store(None));

    gateway.categories().await.unwrap();
    tokio::time::advance(Duration::from_secs(31 * 60)).await;
    gateway.categories().await.unwrap();

    assert_eq!(transport.calls_to(Method::Get, "/categories"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_are_deduplicated() {
    let transport = ScriptedTransport::new().with_latency(Duration::from_millis(200));
    transport.respond(
        Method::Get,
        "/categories/cpu",
        200,
        json!({"products": [product_json(1, "ryzen-7")], "totalPages": 1, "currentPage": 1}),
    );
    let gateway = gateway(&transport, &memory_store(None));

    let calls = (0..5).map(|_| gateway.products("cpu", None, 1, 12));
    let results = futures::future::join_all(calls).await;

    let first = results[0].as_ref().unwrap().clone();
    for result in results {
        assert_eq!(result.unwrap(), first);
    }
    assert_eq!(transport.calls_to(Method::Get, "/categories/cpu"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_value_served_when_network_fails() {
    let transport = ScriptedTransport::new();
    transport
        .respond(Method::Get, "/categories", 200, category_tree())
        .respond(Method::Get, "/categories", 503, json!({"message": "maintenance"}));
    let mut config = test_config();
    config.request.max_retries = 0;
    let gateway = gateway_with(&transport, &memory_store(None), config);

    let fresh = gateway.categories().await.unwrap();

    // Just before the stale TTL ends the old tree still answers
    tokio::time::advance(Duration::from_secs(60 * 60) - Duration::from_millis(1)).await;
    let stale = gateway.categories().await.unwrap();
    assert_eq!(stale, fresh);
    assert_eq!(transport.calls_to(Method::Get, "/categories"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_expired_value_is_not_a_fallback() {
    let transport = ScriptedTransport::new();
    transport
        .respond(Method::Get, "/categories", 200, category_tree())
        .respond(Method::Get, "/categories", 503, json!({"message": "maintenance"}));
    let mut config = test_config();
    config.request.max_retries = 0;
    let gateway = gateway_with(&transport, &memory_store(None), config);

    gateway.categories().await.unwrap();
    tokio::time::advance(Duration::from_secs(60 * 60) + Duration::from_millis(1)).await;

    let err = gateway.categories().await.unwrap_err();
    assert!(matches!(err, Error::ServerError { status: 503, .. }));
    assert!(err.to_string().contains("maintenance"));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let transport = ScriptedTransport::new();
    transport
        .fail(
            Method::Get,
            "/products/cpu/ryzen-7",
            Error::network("/products/cpu/ryzen-7", "connection reset"),
        )
        .respond(Method::Get, "/products/cpu/ryzen-7", 502, json!(null))
        .respond(Method::Get, "/products/cpu/ryzen-7", 200, product_json(7, "ryzen-7"));
    transport.respond(Method::Get, "/categories", 200, category_tree());
    let gateway = gateway(&transport, &memory_store(None));

    let product = gateway.product("cpu", "ryzen-7").await.unwrap();

    assert_eq!(product.id, 7);
    assert_eq!(product.category.unwrap().short_name, "cpu");
    assert_eq!(transport.calls_to(Method::Get, "/products/cpu/ryzen-7"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_not_found_is_not_retried() {
    let transport = ScriptedTransport::new();
    transport.respond(
        Method::Get,
        "/products/cpu/missing",
        404,
        json!({"message": "Product not found"}),
    );
    let gateway = gateway(&transport, &memory_store(None));

    let err = gateway.product("cpu", "missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert!(err.to_string().contains("Product not found"));
    assert_eq!(transport.calls_to(Method::Get, "/products/cpu/missing"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_server_rate_limit_honors_retry_after() {
    let transport = ScriptedTransport::new();
    let mut limited =
        storegate_client::ApiResponse::new(429, json!({"message": "Too many requests"}));
    limited.retry_after = Some(Duration::from_secs(3));
    transport
        .push(Method::Get, "/categories", Ok(limited))
        .respond(Method::Get, "/categories", 200, category_tree());
    let gateway = gateway(&transport, &memory_store(None));

    let started = tokio::time::Instant::now();
    gateway.categories().await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(transport.calls_to(Method::Get, "/categories"), 2);
    // Success after the 429 returns the backoff to its floor
    assert_eq!(
        gateway.rate_limit_status("catalog").backoff,
        Duration::from_millis(100)
    );
}

#[tokio::test(start_paused = true)]
async fn test_bare_array_listing_is_normalized() {
    let transport = ScriptedTransport::new();
    transport.respond(
        Method::Get,
        "/categories/storage/ssd",
        200,
        json!([product_json(1, "evo"), product_json(2, "pro")]),
    );
    let gateway = gateway(&transport, &memory_store(None));

    let listing = gateway.products("storage", Some("ssd"), 2, 24).await.unwrap();
    assert_eq!(listing.products.len(), 2);
    assert_eq!((listing.total_pages, listing.current_page), (1, 1));

    let request = &transport.requests_to(Method::Get, "/categories/storage/ssd")[0];
    assert_eq!(
        request.query,
        vec![("page".to_string(), "2".to_string()), ("limit".to_string(), "24".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_batched_profile_update() {
    let transport = ScriptedTransport::new();
    transport
        .respond(Method::Get, "/auth/profile", 200, json!({"username": "alice"}))
        .respond(
            Method::Get,
            "/auth/profile",
            200,
            json!({"username": "alice", "firstName": "Alice", "phone": "+100"}),
        );
    transport.respond(
        Method::Put,
        "/auth/profile",
        200,
        json!({
            "message": "Profile updated",
            "userInfo": {"username": "alice", "firstName": "Alice"}
        }),
    );
    let gateway = gateway(&transport, &memory_store(Some(&jwt(3600))));

    assert_eq!(gateway.profile().await.unwrap().first_name, None);

    let first = gateway.update_profile_field("firstName", "Alice").unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let second = gateway.update_profile_field("phone", "+100").unwrap();
    let (a, b) = tokio::join!(first, second);

    assert_eq!(a.unwrap().message.as_deref(), Some("Profile updated"));
    assert_eq!(
        b.unwrap().user_info.unwrap().first_name.as_deref(),
        Some("Alice")
    );

    let puts = transport.requests_to(Method::Put, "/auth/profile");
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].body, Some(json!({"firstName": "Alice", "phone": "+100"})));

    // The cached profile was invalidated by the save
    let profile = gateway.profile().await.unwrap();
    assert_eq!(profile.phone.as_deref(), Some("+100"));
    assert_eq!(transport.calls_to(Method::Get, "/auth/profile"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_save_profile_now_flushes_immediately() {
    let transport = ScriptedTransport::new();
    transport.respond(Method::Put, "/auth/profile", 200, json!({"message": "ok"}));
    let gateway = gateway(&transport, &memory_store(Some(&jwt(3600))));

    assert!(gateway.save_profile_now().await.unwrap().is_none());

    let pending = gateway.update_profile_field("lastName", "Liddell").unwrap();
    let saved = gateway.save_profile_now().await.unwrap().unwrap();
    assert_eq!(saved.message.as_deref(), Some("ok"));
    assert!(pending.await.is_ok());
    assert_eq!(transport.calls_to(Method::Put, "/auth/profile"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_profile_edit_requires_session() {
    let transport = ScriptedTransport::new();
    let gateway = gateway(&transport, &memory_store(None));

    let err = gateway.update_profile_field("firstName", "Alice").unwrap_err();
    assert!(matches!(err, Error::NotAuthenticated { .. }));
    let err = gateway.profile().await.unwrap_err();
    assert!(matches!(err, Error::NotAuthenticated { .. }));
    assert_eq!(transport.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_favorite_changes_invalidate_favorites() {
    let transport = ScriptedTransport::new();
    transport
        .respond(
            Method::Get,
            "/favorites",
            200,
            json!({"products": [], "totalPages": 1, "currentPage": 1}),
        )
        .respond(
            Method::Get,
            "/favorites",
            200,
            json!({"products": [product_json(5, "evo")], "totalPages": 1, "currentPage": 1}),
        );
    transport
        .respond(Method::Post, "/favorites/check-status", 200, json!({"favoriteProductIds": []}))
        .respond(
            Method::Post,
            "/favorites/check-status",
            200,
            json!({"favoriteProductIds": [5]}),
        );
    transport.respond(
        Method::Post,
        "/favorites/add",
        200,
        json!({"message": "Added to favorites"}),
    );
    let gateway = gateway(&transport, &memory_store(Some(&jwt(3600))));

    assert!(gateway.favorites(1, 12).await.unwrap().products.is_empty());
    assert!(gateway.favorite_status(&[5, 6]).await.unwrap().favorite_product_ids.is_empty());
    // Both are cached
    gateway.favorites(1, 12).await.unwrap();
    gateway.favorite_status(&[5, 6]).await.unwrap();
    assert_eq!(transport.calls_to(Method::Get, "/favorites"), 1);

    let added = gateway.add_favorite(5).await.unwrap();
    assert_eq!(added.message.as_deref(), Some("Added to favorites"));
    assert_eq!(
        transport.requests_to(Method::Post, "/favorites/add")[0].body,
        Some(json!({"productId": 5}))
    );

    assert_eq!(gateway.favorites(1, 12).await.unwrap().products.len(), 1);
    assert_eq!(
        gateway.favorite_status(&[5, 6]).await.unwrap().favorite_product_ids,
        vec![5]
    );
    assert_eq!(transport.calls_to(Method::Get, "/favorites"), 2);
    assert_eq!(transport.calls_to(Method::Post, "/favorites/check-status"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_status_query_skips_network() {
    let transport = ScriptedTransport::new();
    let gateway = gateway(&transport, &memory_store(Some(&jwt(3600))));

    let status = gateway.favorite_status(&[]).await.unwrap();
    assert!(status.favorite_product_ids.is_empty());
    assert_eq!(transport.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_validation_errors_surface_fields() {
    let transport = ScriptedTransport::new();
    transport.respond(
        Method::Post,
        "/auth/register",
        400,
        json!({"errors": [{"path": "email", "msg": "Invalid email"}]}),
    );
    let gateway = gateway(&transport, &memory_store(None));

    let err = gateway
        .register("alice", "secret-password", "not-an-email")
        .await
        .unwrap_err();
    match err {
        Error::ValidationError { fields, .. } => {
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].field, "email");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!gateway.is_authenticated());
}
