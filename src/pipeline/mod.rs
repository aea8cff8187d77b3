//! Webhook admission pipeline.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → validator.rs (method, rate limit, replay via the security gate)
//!     → auth.rs (shared-secret check)
//!     → event.rs (payload parse)
//!     → Admission, or a WebhookError (error.rs)
//! ```

pub mod auth;
pub mod error;
pub mod event;
pub mod validator;

pub use error::WebhookError;
pub use event::{parse_event, EventKind, ParseError, ResultId, WebhookEvent};
pub use validator::{client_key, replay_key, Admission, InboundRequest, RequestValidator};
