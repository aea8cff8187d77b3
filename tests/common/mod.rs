//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use logbook_webhook::config::GateConfig;
use logbook_webhook::gate::{spawn_gate, GateStore, GateSettings, MemoryStore};
use logbook_webhook::http::HttpServer;
use logbook_webhook::lifecycle::Shutdown;

pub const SECRET: &str = "test-webhook-secret";
pub const TOKEN: &str = "test-github-token";

/// A dispatch call as seen by the mock trigger endpoint.
#[derive(Debug, Clone)]
pub struct RecordedDispatch {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Clone, Default)]
struct MockState {
    received: Arc<Mutex<Vec<RecordedDispatch>>>,
    status: Arc<AtomicU16>,
}

/// Programmable stand-in for `POST /repos/{owner}/{repo}/dispatches`.
pub struct MockDispatch {
    pub addr: SocketAddr,
    state: MockState,
}

impl MockDispatch {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Status returned by subsequent calls.
    pub fn respond_with(&self, status: u16) {
        self.state.status.store(status, Ordering::SeqCst);
    }

    pub fn received(&self) -> Vec<RecordedDispatch> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.state.received.lock().unwrap().len()
    }
}

async fn record_dispatch(
    State(state): State<MockState>,
    uri: axum::http::Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    state.received.lock().unwrap().push(RecordedDispatch {
        path: uri.path().to_string(),
        headers,
        body,
    });
    StatusCode::from_u16(state.status.load(Ordering::SeqCst)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Start the mock trigger endpoint on an ephemeral port. Answers 204 by default.
pub async fn start_mock_dispatch() -> MockDispatch {
    let state = MockState::default();
    state.status.store(204, Ordering::SeqCst);

    let app = Router::new()
        .route("/repos/{owner}/{repo}/dispatches", post(record_dispatch))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockDispatch { addr, state }
}

/// Configuration pointing at `dispatch_base_url` with test credentials.
pub fn test_config(dispatch_base_url: &str) -> GateConfig {
    let mut config = GateConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.webhook.secret = Some(SECRET.into());
    config.dispatch.api_base_url = dispatch_base_url.into();
    config.dispatch.owner = "rower".into();
    config.dispatch.repo = "logbook-sync".into();
    config.dispatch.token = Some(TOKEN.into());
    config.dispatch.timeout_secs = 2;
    config
}

/// A running gateway.
pub struct Gateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_tx: mpsc::UnboundedSender<GateConfig>,
}

impl Gateway {
    pub fn url(&self) -> String {
        format!("http://{}/webhook", self.addr)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the gateway with an in-memory gate.
pub async fn start_gateway(config: GateConfig) -> Gateway {
    start_gateway_with_store(config, Box::new(MemoryStore::new())).await
}

pub async fn start_gateway_with_store(config: GateConfig, store: Box<dyn GateStore>) -> Gateway {
    let gate = spawn_gate(store, GateSettings::from_config(&config));
    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config, gate);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    Gateway {
        addr,
        shutdown,
        config_tx,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// POST `body` with the test secret.
pub async fn deliver(client: &reqwest::Client, gateway: &Gateway, body: &str) -> reqwest::Response {
    client
        .post(gateway.url())
        .header("x-webhook-secret", SECRET)
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .expect("gateway unreachable")
}

pub fn added(result_id: u64) -> String {
    format!(r#"{{"type":"result-added","result":{{"id":{}}}}}"#, result_id)
}
