#![allow(clippy::unwrap_used)]
// End-to-end session tests: Hub facade + auth gate + sync loop against wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aquila_core::{
    CoreError, CredentialStore, Credentials, Hub, HubConfig, Route, SessionStatus, SyncConfig,
    SyncPhase, SyncSnapshot,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(store: CredentialStore) -> (MockServer, Hub) {
    let server = MockServer::start().await;
    let url = format!("{}/api/", server.uri()).parse().unwrap();
    let hub = Hub::new(HubConfig::new(url), store).unwrap();
    (server, hub)
}

fn slow_polling() -> SyncConfig {
    SyncConfig {
        poll_interval: Duration::from_secs(60),
        ..SyncConfig::default()
    }
}

async fn mount_devices(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .and(query_param("class", "mx.makerlab.ledservice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "d1", "class": "mx.makerlab.ledservice" },
            { "_id": "d2", "class": "mx.makerlab.ledservice" },
        ])))
        .mount(server)
        .await;
}

async fn wait_for(
    rx: &mut tokio::sync::watch::Receiver<SyncSnapshot>,
    f: impl FnMut(&SyncSnapshot) -> bool,
) -> SyncSnapshot {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(f))
        .await
        .expect("timed out waiting for snapshot")
        .unwrap()
        .clone()
}

// ── Auth gate ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_rejected_read_logs_out_and_redirects() {
    let store = CredentialStore::in_memory();
    store.set(Credentials::new("abc", "ana")).unwrap();
    let (server, hub) = setup(store.clone()).await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "_id": "d1", "class": "mx.makerlab.ledservice" },
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices/d1/services/led"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert_eq!(hub.navigator().navigate("/").route, Route::Home);

    let sync = hub.sync_loop_with(slow_polling());
    let mut rx = sync.subscribe();
    sync.init().await.unwrap();

    let snap = wait_for(&mut rx, |s| s.phase == SyncPhase::Failed).await;
    assert!(snap.last_error.is_some());
    assert!(snap.last_state.is_none());

    assert!(!store.get().is_authenticated());
    let nav = hub.navigator().current();
    assert_eq!(nav.route, Route::Login);
    assert_eq!(nav.session, SessionStatus::LoggedOut);
}

#[tokio::test]
async fn test_anonymous_requests_carry_no_token() {
    let (server, hub) = setup(CredentialStore::in_memory()).await;
    mount_devices(&server).await;

    hub.devices("mx.makerlab.ledservice").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_unknown_device_is_not_found() {
    let store = CredentialStore::in_memory();
    store.set(Credentials::new("abc", "ana")).unwrap();
    let (server, hub) = setup(store).await;
    mount_devices(&server).await;

    let err = hub
        .device("mx.makerlab.ledservice", "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DeviceNotFound { .. }));
}

// ── Full session ────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_bind_and_toggle() {
    let store = CredentialStore::in_memory();
    let (server, hub) = setup(store.clone()).await;

    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_json(json!({ "user": "ana", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "t1" })))
        .mount(&server)
        .await;
    mount_devices(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/devices/d1/services/led"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isOn": false })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/devices/d1/services/led"))
        .and(body_json(json!({ "isOn": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isOn": true })))
        .expect(1)
        .mount(&server)
        .await;

    let nav = hub
        .session()
        .login("ana", &SecretString::from("pw"))
        .await
        .unwrap();
    assert_eq!(nav.route, Route::Home);
    assert_eq!(
        nav.session,
        SessionStatus::LoggedIn {
            display_name: "Ana".into()
        }
    );

    let sync = hub.sync_loop_with(slow_polling());
    let mut rx = sync.subscribe();
    let device = sync.init().await.unwrap();
    assert_eq!(device.id, "d1");

    let snap = wait_for(&mut rx, |s| s.last_state.is_some()).await;
    assert_eq!(snap.is_on(), Some(false));

    let state = sync.toggle().await.unwrap();
    assert!(state.is_on);
    assert_eq!(sync.snapshot().is_on(), Some(true));

    sync.shutdown();
    assert!(matches!(sync.toggle().await, Err(CoreError::TornDown)));

    let nav = hub.session().logout();
    assert_eq!(nav.route, Route::Login);
    assert!(!store.get().is_authenticated());
}

#[tokio::test]
async fn test_no_device_is_reported() {
    let store = CredentialStore::in_memory();
    store.set(Credentials::new("abc", "ana")).unwrap();
    let (server, hub) = setup(store).await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let sync = hub.sync_loop();
    assert!(matches!(sync.init().await, Err(CoreError::NoDevice { .. })));
    assert_eq!(sync.snapshot().phase, SyncPhase::Unbound);
}
