//! Classified outcomes of webhook handling.

use axum::http::{Method, StatusCode};
use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::gate::GateError;
use crate::pipeline::event::ParseError;

/// Every way a delivery can stop short of a successful dispatch.
///
/// Each variant maps to exactly one HTTP response (see `http::response`).
/// Messages never include the webhook secret or the dispatch credential.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(Method),

    #[error("Rate limit exceeded")]
    RateLimited {
        /// Seconds until the client's window resets.
        retry_after_secs: u64,
    },

    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    MalformedPayload(#[from] ParseError),

    /// Already admitted within the replay TTL; reported as accepted.
    #[error("Webhook already processed")]
    DuplicateDelivery,

    #[error("Server configuration error: {0}")]
    ConfigurationError(&'static str),

    #[error("Failed to trigger GitHub workflow")]
    DownstreamError {
        /// Status returned by the trigger endpoint, if one was received.
        status: Option<u16>,
    },

    #[error("Internal server error")]
    InternalError(String),
}

impl WebhookError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            WebhookError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            WebhookError::Unauthorized => StatusCode::UNAUTHORIZED,
            WebhookError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            WebhookError::DuplicateDelivery => StatusCode::ACCEPTED,
            WebhookError::ConfigurationError(_)
            | WebhookError::DownstreamError { .. }
            | WebhookError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Metric label for this outcome.
    pub fn outcome(&self) -> &'static str {
        match self {
            WebhookError::MethodNotAllowed(_) => "method_not_allowed",
            WebhookError::RateLimited { .. } => "rate_limited",
            WebhookError::Unauthorized => "unauthorized",
            WebhookError::MalformedPayload(_) => "malformed_payload",
            WebhookError::DuplicateDelivery => "duplicate",
            WebhookError::ConfigurationError(_) => "configuration_error",
            WebhookError::DownstreamError { .. } => "downstream_error",
            WebhookError::InternalError(_) => "internal_error",
        }
    }

    /// Diagnostic detail safe to return to the caller.
    pub fn details(&self) -> Option<String> {
        match self {
            WebhookError::DownstreamError { status: Some(s) } => Some(format!("GitHub API returned {}", s)),
            WebhookError::DownstreamError { status: None } => Some("GitHub API unreachable".to_string()),
            WebhookError::InternalError(detail) => Some(detail.clone()),
            WebhookError::RateLimited { retry_after_secs } => Some(format!("Retry after {} seconds", retry_after_secs)),
            _ => None,
        }
    }
}

impl From<GateError> for WebhookError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::Unavailable => WebhookError::InternalError("security gate unavailable".to_string()),
            GateError::Store(_) => WebhookError::InternalError("security gate storage failure".to_string()),
        }
    }
}

impl From<DispatchError> for WebhookError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::MissingCredential => WebhookError::ConfigurationError("GITHUB_PAT not set"),
            DispatchError::Status { status, .. } => WebhookError::DownstreamError { status: Some(status) },
            DispatchError::Transport(_) => WebhookError::DownstreamError { status: None },
        }
    }
}
