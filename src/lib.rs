//! Logbook webhook gateway library.
//!
//! Admits Concept2 Logbook `result-*` webhook deliveries and triggers one
//! GitHub `repository_dispatch` per distinct event.
//!
//! ```text
//!     POST /webhook
//!         │
//!         ▼
//!   ┌───────────┐   ┌──────────────────────────────┐   ┌───────────────┐
//!   │   http    │──▶│          pipeline            │──▶│   dispatch    │──▶ GitHub API
//!   │  server   │   │ method → rate → auth →       │   │ repository_   │
//!   └───────────┘   │ replay → parse               │   │ dispatch      │
//!                   └──────────────┬───────────────┘   └───────────────┘
//!                                  │ mpsc + oneshot
//!                                  ▼
//!                          ┌───────────────┐
//!                          │ gate (actor)  │── GateStore (memory | file)
//!                          └───────────────┘
//! ```

pub mod config;
pub mod dispatch;
pub mod gate;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pipeline;

pub use config::schema::GateConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
