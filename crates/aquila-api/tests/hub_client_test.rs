#![allow(clippy::unwrap_used)]
// Integration tests for `HubClient` using wiremock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aquila_api::{
    DeviceQuery, Error, HubClient, Interceptor, JSON_CONTENT_TYPE, ServicePatch, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, HubClient) {
    let server = MockServer::start().await;
    let client = HubClient::from_reqwest(&format!("{}/api", server.uri()), reqwest::Client::new())
        .unwrap();
    (server, client)
}

/// Interceptor that stamps a fixed header and counts observed failures.
#[derive(Default)]
struct Recording {
    failures: AtomicUsize,
}

impl Interceptor for Recording {
    fn request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.header("X-Test", "1")
    }

    fn response_error(&self, _error: &Error) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Device directory ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices_preserves_hub_order() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .and(query_param("class", "mx.makerlab.ledservice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "d2", "class": "mx.makerlab.ledservice" },
            { "_id": "d1", "class": "mx.makerlab.ledservice", "name": "Sala" },
        ])))
        .mount(&server)
        .await;

    let devices = client
        .list_devices(&DeviceQuery::class("mx.makerlab.ledservice"))
        .await
        .unwrap();

    let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, ["d2", "d1"]);
    assert_eq!(devices[1].name(), Some("Sala"));
}

#[tokio::test]
async fn test_list_devices_empty_is_ok() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let devices = client.list_devices(&DeviceQuery::class("none")).await.unwrap();
    assert!(devices.is_empty());
}

// ── Services ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_read_service() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices/d1/services/led"))
        .and(header("content-type", "application/json; charset=utf-8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isOn": true })))
        .mount(&server)
        .await;

    let http = aquila_api::TransportConfig::default().build_client().unwrap();
    let client = HubClient::with_client(http, client.base_url().clone());

    let state = client.read_service("d1", "led").await.unwrap();
    assert!(state.is_on);
}

#[tokio::test]
async fn test_write_service_returns_hub_state() {
    let (server, client) = setup().await;

    // The hub refuses to switch on and reports the real state.
    Mock::given(method("PUT"))
        .and(path("/api/devices/d1/services/led"))
        .and(header("content-type", JSON_CONTENT_TYPE))
        .and(body_json(json!({ "isOn": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isOn": false })))
        .mount(&server)
        .await;

    let state = client
        .write_service("d1", "led", &ServicePatch::is_on(true))
        .await
        .unwrap();
    assert!(!state.is_on);
}

#[tokio::test]
async fn test_every_request_declares_utf8_json() {
    let server = MockServer::start().await;
    let base = format!("{}/api/", server.uri()).parse().unwrap();
    let client = HubClient::new(base, &TransportConfig::default()).unwrap();

    Mock::given(method("GET"))
        .and(path("/api/devices/d1/services/led"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isOn": false })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/devices/d1/services/led"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isOn": true })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "abc" })))
        .mount(&server)
        .await;

    client.read_service("d1", "led").await.unwrap();
    client
        .write_service("d1", "led", &ServicePatch::is_on(true))
        .await
        .unwrap();
    client
        .request_token("ana", &SecretString::from("secret".to_string()))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    for request in &requests {
        let content_type = request
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok());
        assert_eq!(content_type, Some(JSON_CONTENT_TYPE), "{} {}", request.method, request.url);
    }
}

// ── Interceptor ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_interceptor_decorates_requests() {
    let (server, client) = setup().await;
    let recording = Arc::new(Recording::default());
    let client = client.with_interceptor(recording.clone());

    Mock::given(method("GET"))
        .and(path("/api/devices/d1/services/led"))
        .and(header("X-Test", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isOn": false })))
        .expect(1)
        .mount(&server)
        .await;

    client.read_service("d1", "led").await.unwrap();
    assert_eq!(recording.failures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_401_is_observed_once_and_propagated() {
    let (server, client) = setup().await;
    let recording = Arc::new(Recording::default());
    let client = client.with_interceptor(recording.clone());

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.list_devices(&DeviceQuery::class("x")).await;

    assert!(
        matches!(result, Err(Error::Unauthorized)),
        "expected Unauthorized, got: {result:?}"
    );
    assert_eq!(recording.failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = client.read_service("d1", "led").await;
    match result {
        Err(Error::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected Status error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let result = client.read_service("d1", "led").await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}

// ── Session ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_request_token_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(header("content-type", JSON_CONTENT_TYPE))
        .and(body_json(json!({ "user": "ana", "password": "secret" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": true, "token": "abc" })),
        )
        .mount(&server)
        .await;

    let token = client
        .request_token("ana", &SecretString::from("secret".to_string()))
        .await
        .unwrap();
    assert_eq!(token.expose_secret(), "abc");
}

#[tokio::test]
async fn test_request_token_rejected() {
    let (server, client) = setup().await;
    let recording = Arc::new(Recording::default());
    let client = client.with_interceptor(recording.clone());

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client
        .request_token("ana", &SecretString::from("wrong".to_string()))
        .await;

    assert!(matches!(result, Err(Error::Authentication { .. })));
    // Login bypasses the interceptor entirely.
    assert_eq!(recording.failures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_request_token_success_false() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": false, "message": "Bad password" })),
        )
        .mount(&server)
        .await;

    let result = client
        .request_token("ana", &SecretString::from("x".to_string()))
        .await;
    match result {
        Err(Error::Authentication { message }) => assert_eq!(message, "Bad password"),
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_reload_and_discover() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/reload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/discover"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.reload().await.unwrap();
    client.discover().await.unwrap();
}
