//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request id, timeout, body limit)
//!     → webhook.rs (build InboundRequest, run pipeline, dispatch)
//!     → response.rs (JSON bodies, Retry-After, X-RateLimit-Remaining)
//!     → Send to client
//! ```

pub mod response;
pub mod server;
pub mod webhook;

pub use response::WebhookAccepted;
pub use server::{AppState, HttpServer};
