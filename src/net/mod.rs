//! Network layer.
//!
//! Plain TCP is served directly by `axum::serve`; when `[listener.tls]` is
//! configured, connections are terminated by `axum-server` with rustls.

pub mod tls;

pub use tls::load_tls_config;
