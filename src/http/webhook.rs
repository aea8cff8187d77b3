//! Webhook endpoint handler.

use axum::body::Bytes;
use axum::extract::{ConnectInfo, RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::time::Instant;

use crate::config::GateConfig;
use crate::dispatch::{DispatchError, DispatchRequest};
use crate::gate::now_millis;
use crate::http::response::WebhookAccepted;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::pipeline::{client_key, InboundRequest, WebhookError};

const X_REQUEST_ID: &str = "x-request-id";

/// Admit a delivery and trigger the downstream workflow.
///
/// # Response
///
/// - 200 OK: admitted and dispatched
/// - 202 Accepted: duplicate within the replay TTL, nothing dispatched
/// - 400 / 401 / 405 / 429: rejected by the pipeline
/// - 500: configuration error, trigger failure or gate failure
pub async fn webhook_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let config = state.config.load_full();
    let request_id = headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let request = InboundRequest {
        client: client_key(&headers, peer, config.listener.client_ip_header.as_deref()),
        method,
        headers,
        query,
        body,
    };

    tracing::debug!(
        request_id = %request_id,
        client = %request.client,
        method = %request.method,
        body_bytes = request.body.len(),
        "Webhook received"
    );

    match process(&state, &config, &request).await {
        Ok(accepted) => {
            tracing::info!(
                request_id = %request_id,
                client = %request.client,
                event_type = %accepted.kind,
                result_id = %accepted.result_id,
                remaining = accepted.remaining,
                "Webhook dispatched"
            );
            metrics::record_webhook("dispatched", start);
            accepted.into_response()
        }
        Err(e) => {
            log_rejection(&request_id, &request, &e);
            metrics::record_webhook(e.outcome(), start);
            e.into_response()
        }
    }
}

async fn process(state: &AppState, config: &GateConfig, request: &InboundRequest) -> Result<WebhookAccepted, WebhookError> {
    let admission = state.validator.validate(config, request, now_millis()).await?;
    let dispatch = DispatchRequest::from(&admission.event);

    if let Err(e) = state.dispatcher.dispatch(&config.dispatch, &dispatch).await {
        match &e {
            DispatchError::Status { status, body } => tracing::error!(
                status = *status,
                body = %body,
                replay_key = %admission.replay_key,
                "Trigger endpoint rejected dispatch"
            ),
            other => tracing::error!(
                error = %other,
                replay_key = %admission.replay_key,
                "Dispatch failed"
            ),
        }
        return Err(e.into());
    }

    Ok(WebhookAccepted {
        kind: dispatch.kind,
        result_id: dispatch.result_id,
        remaining: admission.remaining,
    })
}

fn log_rejection(request_id: &str, request: &InboundRequest, error: &WebhookError) {
    match error {
        WebhookError::DuplicateDelivery => {
            tracing::debug!(request_id = %request_id, client = %request.client, "Duplicate webhook delivery skipped")
        }
        WebhookError::MethodNotAllowed(_)
        | WebhookError::RateLimited { .. }
        | WebhookError::Unauthorized
        | WebhookError::MalformedPayload(_) => {
            tracing::warn!(
                request_id = %request_id,
                client = %request.client,
                outcome = error.outcome(),
                error = %error,
                "Webhook rejected"
            )
        }
        WebhookError::ConfigurationError(_)
        | WebhookError::DownstreamError { .. }
        | WebhookError::InternalError(_) => {
            tracing::error!(
                request_id = %request_id,
                client = %request.client,
                outcome = error.outcome(),
                error = %error,
                details = ?error.details(),
                "Webhook failed"
            )
        }
    }
}

/// Liveness: OK while the security gate answers.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.validator.gate().stats().await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "Security gate unavailable")
        }
    }
}
