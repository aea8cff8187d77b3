//! Upstream dispatch.
//!
//! One admitted event becomes exactly one `repository_dispatch` call. There
//! is no retry on this leg; a failure is reported to the webhook caller.

pub mod client;
pub mod types;

pub use client::{DispatchError, Dispatcher};
pub use types::DispatchRequest;
