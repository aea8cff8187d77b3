//! The admission pipeline.
//!
//! ```text
//! method → rate limit → authentication → replay → parse
//! ```
//!
//! Every stage either passes or ends the request with one [`WebhookError`].
//! Replay is recorded before the body is parsed, so a delivery that fails
//! to parse still consumes its replay key for the TTL.

use axum::http::{HeaderMap, Method};
use axum::body::Bytes;
use std::net::{IpAddr, SocketAddr};

use crate::config::GateConfig;
use crate::gate::{ClientKey, GateHandle, ReplayKey};
use crate::pipeline::auth;
use crate::pipeline::error::WebhookError;
use crate::pipeline::event::{parse_event, WebhookEvent};

/// Header carrying an optional caller-assigned delivery id.
pub const DELIVERY_ID_HEADER: &str = "x-webhook-id";

/// What the validator needs from an HTTP request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Option<String>,
    pub body: Bytes,
    pub client: ClientKey,
}

/// A delivery that passed every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub event: WebhookEvent,
    pub replay_key: ReplayKey,
    /// Tokens left in the caller's current window.
    pub remaining: u32,
}

/// Derive the rate-limit partition for a request.
///
/// With a trusted client-IP header configured, its first address wins when
/// it parses; otherwise the peer address is used.
pub fn client_key(headers: &HeaderMap, peer: SocketAddr, client_ip_header: Option<&str>) -> ClientKey {
    let forwarded = client_ip_header
        .and_then(|name| headers.get(name))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());

    ClientKey::new(forwarded.unwrap_or_else(|| peer.ip()).to_string())
}

/// Replay identity: the delivery id header when present, else the body hash.
pub fn replay_key(headers: &HeaderMap, body: &[u8]) -> ReplayKey {
    headers
        .get(DELIVERY_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ReplayKey::delivery)
        .unwrap_or_else(|| ReplayKey::content(body))
}

/// Runs the stages against the security gate.
#[derive(Clone, Debug)]
pub struct RequestValidator {
    gate: GateHandle,
}

impl RequestValidator {
    pub fn new(gate: GateHandle) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &GateHandle {
        &self.gate
    }

    /// Run all stages. `now` is milliseconds since the Unix epoch.
    pub async fn validate(&self, config: &GateConfig, request: &InboundRequest, now: u64) -> Result<Admission, WebhookError> {
        check_method(&request.method)?;
        let remaining = self.check_rate(config, &request.client, now).await?;
        check_auth(config, &request.headers, request.query.as_deref())?;
        let replay_key = replay_key(&request.headers, &request.body);
        self.check_replay(config, &replay_key, now).await?;
        let event = parse_event(&request.body)?;

        Ok(Admission {
            event,
            replay_key,
            remaining,
        })
    }

    async fn check_rate(&self, config: &GateConfig, client: &ClientKey, now: u64) -> Result<u32, WebhookError> {
        let decision = self
            .gate
            .acquire_rate_token(client.clone(), config.rate_limit.max_per_window, now)
            .await?;

        if !decision.allowed {
            let retry_after_ms = decision.reset_at.saturating_sub(now);
            return Err(WebhookError::RateLimited {
                retry_after_secs: retry_after_ms.div_ceil(1_000).max(1),
            });
        }
        Ok(decision.remaining)
    }

    async fn check_replay(&self, config: &GateConfig, key: &ReplayKey, now: u64) -> Result<(), WebhookError> {
        let decision = self
            .gate
            .check_and_record_replay(key.clone(), now, config.replay.ttl_ms())
            .await?;

        if decision.duplicate {
            return Err(WebhookError::DuplicateDelivery);
        }
        Ok(())
    }
}

fn check_method(method: &Method) -> Result<(), WebhookError> {
    if *method == Method::POST {
        Ok(())
    } else {
        Err(WebhookError::MethodNotAllowed(method.clone()))
    }
}

fn check_auth(config: &GateConfig, headers: &HeaderMap, query: Option<&str>) -> Result<(), WebhookError> {
    let expected = config
        .webhook
        .secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(WebhookError::ConfigurationError("webhook secret not set"))?;

    let provided = auth::provided_secret(headers, query).ok_or(WebhookError::Unauthorized)?;
    if auth::secrets_match(&provided, expected) {
        Ok(())
    } else {
        Err(WebhookError::Unauthorized)
    }
}
