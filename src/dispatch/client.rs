//! GitHub `repository_dispatch` client.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::DispatchConfig;
use crate::dispatch::types::DispatchRequest;
use crate::observability::metrics;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Longest error body kept for logging.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// No service credential configured. Checked before any I/O.
    #[error("dispatch credential not configured")]
    MissingCredential,

    #[error("trigger endpoint returned {status}")]
    Status { status: u16, body: String },

    #[error("trigger endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Issues trigger calls. Cheap to clone; the connection pool is shared.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    client: reqwest::Client,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Send one dispatch. Never retries.
    pub async fn dispatch(&self, config: &DispatchConfig, request: &DispatchRequest) -> Result<(), DispatchError> {
        let token = config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(DispatchError::MissingCredential)?;

        let url = dispatch_url(config);
        let start = Instant::now();

        let result = self
            .client
            .post(&url)
            .headers(default_headers(&config.user_agent))
            .bearer_auth(token)
            .timeout(Duration::from_secs(config.timeout_secs))
            .json(&request.body(&config.event_type))
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                metrics::record_dispatch(None, start);
                return Err(e.into());
            }
        };

        let status = response.status();
        metrics::record_dispatch(Some(status.as_u16()), start);

        if status.is_success() {
            tracing::debug!(
                url = %url,
                status = status.as_u16(),
                kind = %request.kind,
                result_id = %request.result_id,
                "Dispatch accepted"
            );
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(DispatchError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch_url(config: &DispatchConfig) -> String {
    format!(
        "{}/repos/{}/{}/dispatches",
        config.api_base_url.trim_end_matches('/'),
        config.owner,
        config.repo
    )
}

fn default_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
    headers.insert("x-github-api-version", HeaderValue::from_static(GITHUB_API_VERSION));
    // Validated at load; reqwest supplies none of its own.
    if let Ok(value) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, value);
    }
    headers
}
