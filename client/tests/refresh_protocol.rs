//! Integration tests for the 401 refresh-and-replay protocol.
//!
//! Every test runs the session client against a `wiremock` server:
//!
//! - Concurrent 401s share a single refresh call
//! - Replays carry the refreshed token
//! - The refresh endpoint and replayed requests are never intercepted
//! - A failed refresh tears the session down
//! - 429 answers pass through untouched

use admin_console_client::mocks::{MockCredentialStore, StoreOp, test_clock};
use admin_console_client::{ApiRequest, ClientConfig, ClientError, SessionClient};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PEOPLE: &str = "/api/v1/people";
const REFRESH: &str = "/api/v1/auth/refresh";

fn client(server: &MockServer, store: &MockCredentialStore) -> SessionClient<MockCredentialStore> {
    SessionClient::with_clock(
        ClientConfig::new(server.uri()),
        store.clone(),
        Arc::new(test_clock()),
    )
    .expect("Failed to build client")
}

async fn mount_people(server: &MockServer, token: &str, status: u16) {
    let response = if status == 200 {
        ResponseTemplate::new(200).set_body_json(json!({"data": [], "token": token}))
    } else {
        ResponseTemplate::new(status).set_body_json(json!({"message": "Unauthenticated."}))
    };
    Mock::given(method("GET"))
        .and(path(PEOPLE))
        .and(header("Authorization", format!("Bearer {token}").as_str()))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Authorization headers of the people requests received so far.
async fn people_tokens(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .expect("Request recording is enabled")
        .iter()
        .filter(|request| request.url.path() == PEOPLE)
        .filter_map(|request| {
            request
                .headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .collect()
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    // Arrange: stale token, slow refresh so every request fails while it is in flight
    let server = MockServer::start().await;
    let store = MockCredentialStore::with_token("old");
    let client = client(&server, &store);

    mount_people(&server, "old", 401).await;
    mount_people(&server, "new", 200).await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "new", "expires_in": 3600}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let results = join_all((0..5).map(|_| {
        let client = client.clone();
        async move { client.send(ApiRequest::get("/v1/people")).await }
    }))
    .await;

    // Assert: one refresh, every request replayed and succeeded
    for result in &results {
        let body = result.as_ref().expect("Request should succeed after refresh");
        assert_eq!(body["token"], "new");
    }
    assert!(!client.is_refreshing());
    assert_eq!(store.token(), Some("new".to_string()));
    assert_eq!(store.ops(), vec![StoreOp::Save("new".to_string())]);
    assert!(client.session().await.is_authenticated());

    server.verify().await;
}

#[tokio::test]
async fn test_queued_requests_replay_with_fresh_token() {
    // Arrange
    let server = MockServer::start().await;
    let store = MockCredentialStore::with_token("old");
    let client = client(&server, &store);

    mount_people(&server, "old", 401).await;
    mount_people(&server, "new", 200).await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "new"}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let results = join_all((0..3).map(|_| {
        let client = client.clone();
        async move { client.send(ApiRequest::get("/v1/people")).await }
    }))
    .await;

    // Assert: three stale attempts, three replays with the new token
    assert!(results.iter().all(Result::is_ok));
    let tokens = people_tokens(&server).await;
    assert_eq!(tokens.iter().filter(|t| *t == "Bearer old").count(), 3);
    assert_eq!(tokens.iter().filter(|t| *t == "Bearer new").count(), 3);
}

#[tokio::test]
async fn test_refresh_endpoint_401_is_not_intercepted() {
    // Arrange
    let server = MockServer::start().await;
    let store = MockCredentialStore::with_token("old");
    let client = client(&server, &store);

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let result = client.send(ApiRequest::post("/v1/auth/refresh")).await;

    // Assert: the 401 comes straight back, no second refresh
    assert!(matches!(result, Err(ClientError::Api { status: 401, .. })));
    assert!(!client.is_refreshing());
    server.verify().await;
}

#[tokio::test]
async fn test_replayed_request_is_not_retried_twice() {
    // Arrange: the people endpoint rejects every token
    let server = MockServer::start().await;
    let store = MockCredentialStore::with_token("old");
    let client = client(&server, &store);

    Mock::given(method("GET"))
        .and(path(PEOPLE))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "new"})))
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let result = client.send(ApiRequest::get("/v1/people")).await;

    // Assert: original attempt plus one replay, then the 401 surfaces
    let err = result.expect_err("Second 401 should be returned");
    assert!(err.is_unauthorized());
    assert_eq!(store.token(), Some("new".to_string()));
    server.verify().await;
}

#[tokio::test]
async fn test_failed_refresh_tears_down_session() {
    // Arrange
    let server = MockServer::start().await;
    let store = MockCredentialStore::with_token("old");
    let client = client(&server, &store);
    assert!(client.restore().await);

    mount_people(&server, "old", 401).await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("upstream down")
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let results = join_all((0..4).map(|_| {
        let client = client.clone();
        async move { client.send(ApiRequest::get("/v1/people")).await }
    }))
    .await;

    // Assert: the leader sees the refresh failure, waiters their own 401
    assert!(results.iter().all(Result::is_err));
    let statuses: Vec<_> = results
        .iter()
        .filter_map(|result| result.as_ref().err().and_then(ClientError::status))
        .collect();
    assert_eq!(statuses.iter().filter(|s| **s == 500).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == 401).count(), 3);

    assert_eq!(store.token(), None);
    assert_eq!(store.ops(), vec![StoreOp::Clear]);
    assert!(!client.session().await.is_authenticated());
    assert!(!client.is_refreshing());
    server.verify().await;
}

#[tokio::test]
async fn test_failed_refresh_keeps_session_when_store_cannot_be_cleared() {
    // Arrange
    let server = MockServer::start().await;
    let store = MockCredentialStore::with_token("old");
    let client = client(&server, &store);
    assert!(client.restore().await);
    store.fail_clears();

    mount_people(&server, "old", 401).await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let err = client
        .send(ApiRequest::get("/v1/people"))
        .await
        .expect_err("Request should fail");

    // Assert: the refresh error is kept and the session still matches the store
    assert_eq!(err.status(), Some(500));
    assert_eq!(store.token(), Some("old".to_string()));
    assert!(client.session().await.is_authenticated());
    server.verify().await;
}

#[tokio::test]
async fn test_refresh_without_access_token_rejects_with_original_401() {
    // Arrange
    let server = MockServer::start().await;
    let store = MockCredentialStore::with_token("old");
    let client = client(&server, &store);

    mount_people(&server, "old", 401).await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token_type": "bearer"})))
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let err = client
        .send(ApiRequest::get("/v1/people"))
        .await
        .expect_err("Refresh without token should fail the request");

    // Assert
    assert!(err.is_unauthorized());
    assert_eq!(
        err.payload().and_then(|payload| payload.message()),
        Some("Unauthenticated.")
    );
    assert_eq!(store.token(), None);
    server.verify().await;
}

#[tokio::test]
async fn test_rate_limited_passes_through() {
    // Arrange
    let server = MockServer::start().await;
    let store = MockCredentialStore::with_token("old");
    let client = client(&server, &store);

    Mock::given(method("GET"))
        .and(path(PEOPLE))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({"message": "Too many attempts."})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "new"})))
        .expect(0)
        .mount(&server)
        .await;

    // Act
    let err = client
        .send(ApiRequest::get("/v1/people"))
        .await
        .expect_err("429 should surface");

    // Assert
    assert!(matches!(err, ClientError::RateLimited { .. }));
    assert_eq!(err.user_message(), "Too many attempts.");
    assert_eq!(store.token(), Some("old".to_string()));
    assert!(store.ops().is_empty());
    server.verify().await;
}

#[tokio::test]
async fn test_401_without_token_is_not_intercepted() {
    // Arrange
    let server = MockServer::start().await;
    let store = MockCredentialStore::new();
    let client = client(&server, &store);

    Mock::given(method("GET"))
        .and(path(PEOPLE))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "new"})))
        .expect(0)
        .mount(&server)
        .await;

    // Act
    let result = client.send(ApiRequest::get("/v1/people")).await;

    // Assert
    assert!(matches!(result, Err(ClientError::Api { status: 401, .. })));
    server.verify().await;
}

#[tokio::test]
async fn test_expired_request_replays_with_new_token() {
    // Arrange: authenticated session whose token the server no longer accepts
    let server = MockServer::start().await;
    let store = MockCredentialStore::with_token("old");
    let client = client(&server, &store);
    assert!(client.restore().await);

    Mock::given(method("GET"))
        .and(path("/api/v1/people/5"))
        .and(header("Authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/people/5"))
        .and(header("Authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 5}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .and(header("Authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "new"})))
        .expect(1)
        .mount(&server)
        .await;

    // Act
    let body = client
        .send(ApiRequest::get("/v1/people/5"))
        .await
        .expect("Replay should succeed");

    // Assert: the caller sees the replayed result, not the 401
    assert_eq!(body, json!({"data": {"id": 5}}));
    assert_eq!(store.token(), Some("new".to_string()));
    assert!(client.session().await.is_authenticated());
    server.verify().await;
}

#[tokio::test]
async fn test_explicit_refresh_updates_expiry() {
    // Arrange
    let server = MockServer::start().await;
    let store = MockCredentialStore::with_token("old");
    let client = client(&server, &store);
    assert!(client.restore().await);
    assert_eq!(client.session().await.expires_at(), None);

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "new", "expires_in": "3600"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Act
    client.refresh_session().await.expect("Refresh should succeed");

    // Assert
    let expected = test_clock_now() + chrono::Duration::seconds(3600);
    assert_eq!(client.session().await.expires_at(), Some(expected));
    assert_eq!(store.token(), Some("new".to_string()));
    server.verify().await;
}

#[tokio::test]
async fn test_refresh_with_huge_lifetime_keeps_store_and_session_in_step() {
    // Arrange
    let server = MockServer::start().await;
    let store = MockCredentialStore::with_token("old");
    let client = client(&server, &store);
    assert!(client.restore().await);

    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "new", "expires_in": 1e300})),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Act
    client.refresh_session().await.expect("Refresh should succeed");

    // Assert
    let session = client.session().await;
    assert!(session.is_authenticated());
    assert_eq!(
        session.expires_at(),
        Some(test_clock_now() + chrono::Duration::seconds(315_360_000))
    );
    assert_eq!(store.token(), Some("new".to_string()));
    server.verify().await;
}

fn test_clock_now() -> chrono::DateTime<chrono::Utc> {
    use admin_console_client::environment::Clock;
    test_clock().now()
}
