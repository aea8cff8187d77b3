//! Failure injection: downstream errors, missing credentials, gate failure.

use serde_json::{json, Value};
use tokio::net::TcpListener;

use logbook_webhook::gate::{ClientKey, GateStats, GateStore, ReplayKey, StoreError, WindowKey, WriteBatch};

mod common;

use common::{added, client, deliver, start_gateway, start_gateway_with_store, start_mock_dispatch, test_config};

#[tokio::test]
async fn test_downstream_error_status_reported() {
    let mock = start_mock_dispatch().await;
    mock.respond_with(500);
    let gateway = start_gateway(test_config(&mock.base_url())).await;
    let client = client();

    let res = deliver(&client, &gateway, &added(5)).await;
    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({"error": "Failed to trigger GitHub workflow", "details": "GitHub API returned 500"})
    );
    assert_eq!(mock.count(), 1);

    // The replay record was written before dispatch, so an identical retry
    // inside the TTL is suppressed.
    mock.respond_with(204);
    let res = deliver(&client, &gateway, &added(5)).await;
    assert_eq!(res.status(), 202);
    assert_eq!(mock.count(), 1);
}

#[tokio::test]
async fn test_downstream_unreachable() {
    // Reserve a port, then close it so nothing is listening.
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = closed.local_addr().unwrap();
    drop(closed);

    let gateway = start_gateway(test_config(&format!("http://{}", addr))).await;

    let res = deliver(&client(), &gateway, &added(6)).await;
    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["details"], "GitHub API unreachable");
}

#[tokio::test]
async fn test_missing_token_is_configuration_error() {
    let mock = start_mock_dispatch().await;
    let mut config = test_config(&mock.base_url());
    config.dispatch.token = None;
    let gateway = start_gateway(config).await;

    let res = deliver(&client(), &gateway, &added(8)).await;
    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"error": "Server configuration error: GITHUB_PAT not set"}));
    assert_eq!(mock.count(), 0);
}

#[tokio::test]
async fn test_missing_secret_is_configuration_error() {
    let mock = start_mock_dispatch().await;
    let mut config = test_config(&mock.base_url());
    config.webhook.secret = None;
    let gateway = start_gateway(config).await;

    let res = deliver(&client(), &gateway, &added(9)).await;
    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Server configuration error: webhook secret not set");
    assert_eq!(mock.count(), 0);
}

/// A store whose every operation fails.
struct UnavailableStore;

impl UnavailableStore {
    fn err<T>() -> Result<T, StoreError> {
        Err(StoreError::Unavailable("disk detached".into()))
    }
}

impl GateStore for UnavailableStore {
    fn counter(&self, _: &WindowKey) -> Result<Option<u32>, StoreError> {
        Self::err()
    }
    fn current_window(&self, _: &ClientKey) -> Result<Option<u64>, StoreError> {
        Self::err()
    }
    fn replay_expiry(&self, _: &ReplayKey) -> Result<Option<u64>, StoreError> {
        Self::err()
    }
    fn scan_replay(&self, _: Option<&ReplayKey>, _: usize) -> Result<Vec<(ReplayKey, u64)>, StoreError> {
        Self::err()
    }
    fn scan_windows(&self, _: Option<&ClientKey>, _: usize) -> Result<Vec<(ClientKey, u64)>, StoreError> {
        Self::err()
    }
    fn stats(&self) -> Result<GateStats, StoreError> {
        Self::err()
    }
    fn apply(&mut self, _: WriteBatch) -> Result<(), StoreError> {
        Self::err()
    }
}

#[tokio::test]
async fn test_gate_failure_fails_closed() {
    let mock = start_mock_dispatch().await;
    let gateway = start_gateway_with_store(test_config(&mock.base_url()), Box::new(UnavailableStore)).await;
    let client = client();

    let res = deliver(&client, &gateway, &added(10)).await;
    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Internal server error");
    assert!(!body.to_string().contains("disk detached"));
    assert_eq!(mock.count(), 0);

    let res = client
        .get(format!("http://{}/health", gateway.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
}
