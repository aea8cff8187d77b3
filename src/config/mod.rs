//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + WEBHOOK_SECRET / GITHUB_PAT
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → shared via ArcSwap to request handlers
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<GateConfig>
//!     → next request observes new secrets, limits and dispatch target
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Secrets never appear in Debug output

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DispatchConfig, GateConfig, ListenerConfig, LogFormat, ObservabilityConfig, RateLimitConfig,
    ReplayConfig, StorageConfig, TimeoutConfig, TlsConfig, WebhookConfig,
};
pub use validation::{validate_config, ValidationError};
