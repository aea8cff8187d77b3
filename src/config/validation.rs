//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows and timeouts > 0, probabilities in [0, 1])
//! - Check the dispatch target is addressable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Missing secrets are NOT validation errors; requests fail with a
//!   configuration error instead so the operator sees it per delivery

use axum::http::HeaderValue;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::http::server::HEALTH_PATH;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("webhook.path must start with '/' (got '{0}')")]
    WebhookPath(String),

    #[error("webhook.path '{0}' collides with the health route or contains route captures")]
    ReservedPath(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("replay.cleanup_probability must be within [0, 1] (got {0})")]
    Probability(String),

    #[error("dispatch.api_base_url is invalid: {0}")]
    ApiBaseUrl(String),

    #[error("dispatch.{0} must not be empty")]
    MissingTarget(&'static str),

    #[error("dispatch.user_agent '{0}' is not a valid header value")]
    UserAgent(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let path = &config.webhook.path;
    if !path.starts_with('/') {
        errors.push(ValidationError::WebhookPath(path.clone()));
    } else if path == HEALTH_PATH || path.contains(['{', '}']) {
        errors.push(ValidationError::ReservedPath(path.clone()));
    }
    if config.webhook.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("webhook.max_body_bytes"));
    }

    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::Zero("rate_limit.window_secs"));
    }
    if config.rate_limit.max_per_window == 0 {
        errors.push(ValidationError::Zero("rate_limit.max_per_window"));
    }

    if config.replay.ttl_secs == 0 {
        errors.push(ValidationError::Zero("replay.ttl_secs"));
    }
    if config.replay.cleanup_batch == 0 {
        errors.push(ValidationError::Zero("replay.cleanup_batch"));
    }
    let p = config.replay.cleanup_probability;
    if !(0.0..=1.0).contains(&p) {
        errors.push(ValidationError::Probability(p.to_string()));
    }

    match url::Url::parse(&config.dispatch.api_base_url) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
        Ok(u) => errors.push(ValidationError::ApiBaseUrl(format!("unsupported scheme '{}'", u.scheme()))),
        Err(e) => errors.push(ValidationError::ApiBaseUrl(e.to_string())),
    }
    if config.dispatch.owner.trim().is_empty() {
        errors.push(ValidationError::MissingTarget("owner"));
    }
    if config.dispatch.repo.trim().is_empty() {
        errors.push(ValidationError::MissingTarget("repo"));
    }
    if config.dispatch.timeout_secs == 0 {
        errors.push(ValidationError::Zero("dispatch.timeout_secs"));
    }
    let user_agent = &config.dispatch.user_agent;
    if user_agent.is_empty() || HeaderValue::from_str(user_agent).is_err() {
        errors.push(ValidationError::UserAgent(user_agent.clone()));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
