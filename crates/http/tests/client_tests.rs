//! Integration tests for the Shopdesk HTTP client

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use serde_json::{Value, json};
use shopdesk_http::client::{
    ClientError, FileStorage, InMemoryLocation, Location, Session, ShopdeskClient,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REFRESH_PATH: &str = "/api/auth/refresh-token";

fn client_for(server: &MockServer) -> (ShopdeskClient, Arc<InMemoryLocation>) {
    let location = Arc::new(InMemoryLocation::new("/orders"));
    let client = ShopdeskClient::builder()
        .base_url(server.uri())
        .location(location.clone())
        .build()
        .unwrap();
    (client, location)
}

fn stale_session() -> Session {
    Session::new("T1")
        .with_refresh_token("R1")
        .with_expires_at(Utc::now() + ChronoDuration::minutes(5))
}

async fn mount_orders(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "jwt expired"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [{ "id": 1 }]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_client_builder() {
    let client = ShopdeskClient::builder()
        .base_url("http://localhost:8080/")
        .timeout(Duration::from_secs(5))
        .build();

    assert!(client.is_ok());
    let client = client.unwrap();
    assert_eq!(client.base_url(), "http://localhost:8080");
}

#[tokio::test]
async fn test_client_builder_requires_base_url() {
    let result = ShopdeskClient::builder().build();
    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn test_bearer_attached_from_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/brands"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    client.sign_in(&stale_session()).unwrap();

    let brands: Value = client
        .execute(client.request(reqwest::Method::GET, "/api/brands"))
        .await
        .unwrap();
    assert_eq!(brands, json!([]));
}

#[tokio::test]
async fn test_concurrent_401s_share_single_refresh() {
    let server = MockServer::start().await;
    mount_orders(&server).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({ "refreshToken": "R1" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": "T2" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, location) = client_for(&server);
    client.sign_in(&stale_session()).unwrap();

    let calls = (0..5).map(|_| {
        let client = client.clone();
        async move {
            client
                .execute::<Value>(client.request(reqwest::Method::GET, "/api/orders"))
                .await
        }
    });
    for result in join_all(calls).await {
        assert_eq!(result.unwrap()["orders"][0]["id"], 1);
    }

    let session = client.store().get().unwrap();
    assert_eq!(session.access_token, "T2");
    assert_eq!(session.refresh_token.as_deref(), Some("R1"));
    assert!(location.history().is_empty());

    let requests = server.received_requests().await.unwrap();
    let replays = requests
        .iter()
        .filter(|r| r.url.path() == "/api/orders")
        .filter(|r| {
            r.headers
                .get("authorization")
                .is_some_and(|v| v.as_bytes() == b"Bearer T2")
        })
        .count();
    assert_eq!(replays, 5);
}

#[tokio::test]
async fn test_two_requests_replayed_with_same_token() {
    let server = MockServer::start().await;
    mount_orders(&server).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "accessToken": "T2",
                    "refreshToken": "R2",
                    "expiresAt": "2099-01-01T00:00:00Z"
                }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    client.sign_in(&stale_session()).unwrap();

    let (a, b) = tokio::join!(
        client.send(client.request(reqwest::Method::GET, "/api/orders")),
        client.send(client.request(reqwest::Method::GET, "/api/orders")),
    );
    assert!(a.unwrap().status().is_success());
    assert!(b.unwrap().status().is_success());

    let session = client.store().get().unwrap();
    assert_eq!(session.refresh_token.as_deref(), Some("R2"));
    assert_eq!(
        session.expires_at.unwrap().to_rfc3339(),
        "2099-01-01T00:00:00+00:00"
    );
}

#[tokio::test]
async fn test_late_401_after_refresh_replays_without_second_refresh() {
    let server = MockServer::start().await;
    mount_orders(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/reports"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string("jwt expired")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/reports"))
        .and(header("authorization", "Bearer T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "total": 3 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({ "refreshToken": "R1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "T2",
            "refreshToken": "R2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, location) = client_for(&server);
    client.sign_in(&stale_session()).unwrap();

    let (orders, reports) = tokio::join!(
        client.execute::<Value>(client.request(reqwest::Method::GET, "/api/orders")),
        client.execute::<Value>(client.request(reqwest::Method::GET, "/api/reports")),
    );
    assert_eq!(orders.unwrap()["orders"][0]["id"], 1);
    assert_eq!(reports.unwrap()["total"], 3);
    assert_eq!(client.store().refresh_token().as_deref(), Some("R2"));
    assert!(location.history().is_empty());
}

#[tokio::test]
async fn test_refresh_failure_rejects_every_request() {
    let server = MockServer::start().await;
    mount_orders(&server).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string("refresh token revoked")
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, location) = client_for(&server);
    client.sign_in(&stale_session()).unwrap();

    let calls = (0..3).map(|_| client.send(client.request(reqwest::Method::GET, "/api/orders")));
    for result in join_all(calls).await {
        match result {
            Err(ClientError::RefreshFailed(e)) => {
                assert!(e.to_string().contains("refresh token revoked"));
            }
            other => panic!("expected refresh failure, got {other:?}"),
        }
    }

    assert!(client.store().get().is_none());
    assert!(client.store().refresh_token().is_none());
    assert_eq!(location.history(), vec!["/sign-in".to_string()]);
}

#[tokio::test]
async fn test_second_401_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/discounts"))
        .respond_with(ResponseTemplate::new(401).set_body_string("jwt invalid"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "T2" })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    client.sign_in(&stale_session()).unwrap();

    let result = client
        .send(client.request(reqwest::Method::GET, "/api/discounts"))
        .await;
    assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
    assert_eq!(client.store().access_token().as_deref(), Some("T2"));
}

#[tokio::test]
async fn test_expired_session_cleared_before_dispatch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let (client, location) = client_for(&server);
    client
        .sign_in(
            &Session::new("T1")
                .with_refresh_token("R1")
                .with_expires_at(Utc::now() - ChronoDuration::seconds(1)),
        )
        .unwrap();

    let response = client
        .send(client.request(reqwest::Method::GET, "/api/categories"))
        .await
        .unwrap();
    assert!(response.status().is_success());

    assert!(client.store().get().is_none());
    assert_eq!(location.current_path(), "/sign-in");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_missing_refresh_token_redirects_without_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/addresses"))
        .respond_with(ResponseTemplate::new(401).set_body_string("jwt expired"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "T2" })))
        .expect(0)
        .mount(&server)
        .await;

    let (client, location) = client_for(&server);
    client.sign_in(&Session::new("T1")).unwrap();

    let result = client
        .send(client.request(reqwest::Method::GET, "/api/addresses"))
        .await;
    match result {
        Err(ClientError::AuthenticationFailed(message)) => assert_eq!(message, "jwt expired"),
        other => panic!("expected original 401, got {other:?}"),
    }
    assert!(client.store().get().is_none());
    assert_eq!(location.history(), vec!["/sign-in".to_string()]);
}

#[tokio::test]
async fn test_token_required_bypasses_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Access token is required"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "T2" })))
        .expect(0)
        .mount(&server)
        .await;

    let (client, location) = client_for(&server);
    client.sign_in(&stale_session()).unwrap();

    let result = client
        .send(client.request(reqwest::Method::GET, "/api/orders"))
        .await;
    assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
    assert!(client.store().get().is_none());
    assert_eq!(location.current_path(), "/sign-in");
}

#[tokio::test]
async fn test_non_auth_failures_pass_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders/42"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "T2" })))
        .expect(0)
        .mount(&server)
        .await;

    let (client, location) = client_for(&server);
    client.sign_in(&stale_session()).unwrap();

    let result = client
        .send(client.request(reqwest::Method::GET, "/api/orders/42"))
        .await;
    match result {
        Err(ClientError::ServerError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "database unavailable");
        }
        other => panic!("expected server error, got {other:?}"),
    }
    assert!(client.store().get().is_some());
    assert!(location.history().is_empty());
}

#[tokio::test]
async fn test_post_body_replayed_after_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/brands"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("jwt expired"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/brands"))
        .and(header("authorization", "Bearer T2"))
        .and(body_json(json!({ "name": "Acme" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7, "name": "Acme" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "T2" })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _) = client_for(&server);
    client.sign_in(&stale_session()).unwrap();

    let created: Value = client
        .execute(
            client
                .request(reqwest::Method::POST, "/api/brands")
                .json(&json!({ "name": "Acme" })),
        )
        .await
        .unwrap();
    assert_eq!(created["id"], 7);
}

#[tokio::test]
async fn test_refreshed_session_persisted_to_file() {
    let server = MockServer::start().await;
    mount_orders(&server).await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "T2",
            "refreshToken": "R2",
            "expiresAt": 4070908800000u64
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let session_path = dir.path().join("session.json");
    let client = ShopdeskClient::builder()
        .base_url(server.uri())
        .storage(Arc::new(FileStorage::open(&session_path).unwrap()))
        .build()
        .unwrap();
    client.sign_in(&stale_session()).unwrap();

    client
        .send(client.request(reqwest::Method::GET, "/api/orders"))
        .await
        .unwrap();

    let persisted: Value =
        serde_json::from_str(&std::fs::read_to_string(&session_path).unwrap()).unwrap();
    assert_eq!(persisted["auth_token"], "T2");
    assert_eq!(persisted["refresh_token"], "R2");
    assert_eq!(persisted["expires_at"], "4070908800000");
}

#[tokio::test]
async fn test_sign_out_clears_and_redirects() {
    let server = MockServer::start().await;
    let (client, location) = client_for(&server);
    client.sign_in(&stale_session()).unwrap();

    client.sign_out().unwrap();
    assert!(client.store().get().is_none());
    assert_eq!(location.current_path(), "/sign-in");
}
