//! Shared-secret authentication.
//!
//! Both the provided and the configured secret are reduced to SHA-256 hex
//! digests, which always have the same length, and the digests are compared
//! by OR-accumulating the XOR of every byte pair. The loop never exits early,
//! so the time taken does not depend on where the secrets differ, nor on
//! their lengths.

use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

/// Header carrying the caller's secret.
pub const SECRET_HEADER: &str = "x-webhook-secret";
/// Query parameter carrying the caller's secret when the header is absent.
pub const SECRET_QUERY_PARAM: &str = "token";

/// Secret presented by the caller: header first, then query parameter.
pub fn provided_secret(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    if from_header.is_some() {
        return from_header;
    }

    query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, v)| k == SECRET_QUERY_PARAM && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    })
}

fn digest(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// XOR-accumulate two byte strings. Returns the accumulator and how many
/// pairs were inspected.
fn xor_accumulate(a: &[u8], b: &[u8]) -> (u8, usize) {
    let mut acc = 0u8;
    let mut inspected = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
        inspected += 1;
    }
    (acc, inspected)
}

/// Constant-time comparison of two hex digests.
fn digests_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let (acc, _) = xor_accumulate(a.as_bytes(), b.as_bytes());
    acc == 0
}

/// True iff `provided` equals `expected`, compared through their digests.
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    digests_equal(&digest(provided), &digest(expected))
}
