//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the webhook
//! service. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the webhook service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address, TLS, client identity).
    pub listener: ListenerConfig,

    /// Inbound webhook endpoint settings.
    pub webhook: WebhookConfig,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Replay suppression.
    pub replay: ReplayConfig,

    /// Downstream trigger endpoint.
    pub dispatch: DispatchConfig,

    /// Durable gate storage.
    pub storage: StorageConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Header carrying the real client IP when running behind a trusted
    /// proxy (e.g., "cf-connecting-ip"). When unset the peer address is used.
    pub client_ip_header: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            client_ip_header: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Inbound webhook endpoint configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Route the webhook is served on.
    pub path: String,

    /// Shared secret callers must present. Overridden by `WEBHOOK_SECRET`.
    pub secret: Option<String>,

    /// Maximum accepted body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            path: "/webhook".to_string(),
            secret: None,
            max_body_bytes: 64 * 1024,
        }
    }
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("path", &self.path)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Fixed window size in seconds.
    pub window_secs: u64,

    /// Maximum admitted requests per client per window.
    pub max_per_window: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_per_window: 20,
        }
    }
}

impl RateLimitConfig {
    pub fn window_ms(&self) -> u64 {
        self.window_secs.saturating_mul(1000)
    }
}

/// Replay suppression configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// How long a replay key blocks reprocessing, in seconds.
    pub ttl_secs: u64,

    /// Fraction of replay checks that also reclaim expired records (0.0 - 1.0).
    pub cleanup_probability: f64,

    /// Maximum records inspected by one inline cleanup or sweep batch.
    pub cleanup_batch: usize,

    /// Interval of the periodic sweep in seconds. 0 disables it.
    pub sweep_interval_secs: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            cleanup_probability: 0.05,
            cleanup_batch: 64,
            sweep_interval_secs: 300,
        }
    }
}

impl ReplayConfig {
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_secs.saturating_mul(1000)
    }
}

/// Downstream trigger (GitHub repository dispatch) configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Base URL of the GitHub REST API.
    pub api_base_url: String,

    /// Repository owner.
    pub owner: String,

    /// Repository name.
    pub repo: String,

    /// `event_type` sent with every repository dispatch.
    pub event_type: String,

    /// Service credential (personal access token). Overridden by `GITHUB_PAT` (or `GITHUB_TOKEN`).
    pub token: Option<String>,

    /// Timeout for the outbound call in seconds.
    pub timeout_secs: u64,

    /// `User-Agent` sent with every dispatch.
    pub user_agent: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            owner: String::new(),
            repo: String::new(),
            event_type: "c2_new_activity".to_string(),
            token: None,
            timeout_secs: 10,
            user_agent: "Concept2-Webhook-Handler/1.0".to_string(),
        }
    }
}

impl std::fmt::Debug for DispatchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchConfig")
            .field("api_base_url", &self.api_base_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("event_type", &self.event_type)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Gate storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot file for gate state. In-memory only when unset.
    pub path: Option<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
