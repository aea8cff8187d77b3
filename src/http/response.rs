//! Response mapping.
//!
//! Every body is JSON. Errors carry `error` and, when safe, `details`;
//! neither ever contains the webhook secret or the dispatch credential.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::event::{EventKind, ResultId};
use crate::pipeline::WebhookError;

/// Header reporting tokens left in the caller's rate window.
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug, Serialize)]
struct DuplicateBody {
    success: bool,
    duplicate: bool,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct SuccessBody<'a> {
    success: bool,
    message: &'static str,
    result_id: &'a ResultId,
    event_type: &'static str,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let WebhookError::DuplicateDelivery = self {
            let body = DuplicateBody {
                success: true,
                duplicate: true,
                message: "Webhook already processed",
            };
            return (status, Json(body)).into_response();
        }

        let body = ErrorBody {
            error: self.to_string(),
            details: self.details(),
        };
        let mut response = (status, Json(body)).into_response();

        match self {
            WebhookError::RateLimited { retry_after_secs } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            }
            WebhookError::MethodNotAllowed(_) => {
                response
                    .headers_mut()
                    .insert(header::ALLOW, HeaderValue::from_static("POST"));
            }
            _ => {}
        }
        response
    }
}

/// A delivery that was admitted and dispatched.
#[derive(Debug, Clone)]
pub struct WebhookAccepted {
    pub kind: EventKind,
    pub result_id: ResultId,
    pub remaining: u32,
}

impl IntoResponse for WebhookAccepted {
    fn into_response(self) -> Response {
        let body = SuccessBody {
            success: true,
            message: "Webhook processed successfully",
            result_id: &self.result_id,
            event_type: self.kind.as_str(),
        };
        let mut response = (StatusCode::OK, Json(body)).into_response();
        response
            .headers_mut()
            .insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        response
    }
}
