//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router (webhook route and `/health`)
//! - Wire up middleware (request id, tracing, timeout, body limit)
//! - Serve plain TCP or TLS with graceful shutdown
//! - Apply hot-reloaded configuration

use arc_swap::ArcSwap;
use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GateConfig;
use crate::dispatch::Dispatcher;
use crate::gate::GateHandle;
use crate::http::webhook::{health_handler, webhook_handler};
use crate::pipeline::RequestValidator;

/// Liveness route, served next to the webhook path.
pub const HEALTH_PATH: &str = "/health";

/// Grace period for in-flight TLS connections at shutdown.
const TLS_DRAIN_SECS: u64 = 10;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<GateConfig>>,
    pub validator: RequestValidator,
    pub dispatcher: Dispatcher,
}

/// HTTP front end of the webhook gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<ArcSwap<GateConfig>>,
}

impl HttpServer {
    /// Create a server that dispatches with a default HTTP client.
    pub fn new(config: GateConfig, gate: GateHandle) -> Self {
        Self::with_dispatcher(config, gate, Dispatcher::new())
    }

    pub fn with_dispatcher(config: GateConfig, gate: GateHandle, dispatcher: Dispatcher) -> Self {
        let router_config = config.clone();
        let config = Arc::new(ArcSwap::from_pointee(config));

        let state = AppState {
            config: config.clone(),
            validator: RequestValidator::new(gate),
            dispatcher,
        };

        let router = Self::build_router(&router_config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GateConfig, state: AppState) -> Router {
        Router::new()
            // Every method reaches the handler so non-POST gets the JSON 405.
            .route(&config.webhook.path, any(webhook_handler))
            .route(HEALTH_PATH, get(health_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(DefaultBodyLimit::disable())
                    .layer(RequestBodyLimitLayer::new(config.webhook.max_body_bytes))
                    // Innermost: its timeout response needs a `Default` body.
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// The router, for serving through something other than [`HttpServer::run`].
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared configuration snapshot.
    pub fn config(&self) -> Arc<ArcSwap<GateConfig>> {
        self.config.clone()
    }

    /// Run the server on a plain TCP listener until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GateConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(apply_config_updates(
            self.config.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS termination until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<GateConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        tokio::spawn(apply_config_updates(
            self.config.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTPS server draining");
            drain.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls).handle(handle).serve(app).await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

async fn apply_config_updates(
    current: Arc<ArcSwap<GateConfig>>,
    mut updates: mpsc::UnboundedReceiver<GateConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(new_config) => swap_config(&current, new_config),
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

/// Install `new_config` as the live configuration.
///
/// Settings fixed at startup keep their old effect; a change to one of them
/// is logged so the operator knows a restart is needed.
pub fn swap_config(current: &ArcSwap<GateConfig>, new_config: GateConfig) {
    let old = current.load();
    for setting in fixed_settings_changed(&old, &new_config) {
        tracing::warn!(setting, "Setting changed on disk but requires a restart to take effect");
    }
    current.store(Arc::new(new_config));
    tracing::info!("Configuration reloaded");
}

fn fixed_settings_changed(old: &GateConfig, new: &GateConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if old.listener.bind_address != new.listener.bind_address {
        changed.push("listener.bind_address");
    }
    if old.listener.tls.is_some() != new.listener.tls.is_some() {
        changed.push("listener.tls");
    }
    if old.webhook.path != new.webhook.path {
        changed.push("webhook.path");
    }
    if old.webhook.max_body_bytes != new.webhook.max_body_bytes {
        changed.push("webhook.max_body_bytes");
    }
    if old.timeouts.request_secs != new.timeouts.request_secs {
        changed.push("timeouts.request_secs");
    }
    if old.rate_limit.window_secs != new.rate_limit.window_secs {
        changed.push("rate_limit.window_secs");
    }
    if old.replay.cleanup_probability != new.replay.cleanup_probability
        || old.replay.cleanup_batch != new.replay.cleanup_batch
        || old.replay.sweep_interval_secs != new.replay.sweep_interval_secs
    {
        changed.push("replay cleanup");
    }
    if old.storage.path != new.storage.path {
        changed.push("storage.path");
    }
    changed
}
