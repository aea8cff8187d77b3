//! Keys and decisions exchanged with the security gate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Rate-limit partition derived from the caller's network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity used to recognise two deliveries as the same event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplayKey(String);

impl ReplayKey {
    /// Key from a caller-supplied delivery id.
    pub fn delivery(id: &str) -> Self {
        Self(format!("id:{}", id))
    }

    /// Key from the SHA-256 of a raw request body.
    pub fn content(body: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        Self(format!("sha256:{}", hex::encode(Sha256::digest(body))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Counter key for one client in one aligned window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey {
    pub client: ClientKey,
    pub window_start: u64,
}

/// Start of the aligned window containing `now_ms`.
pub fn window_start(now_ms: u64, window_ms: u64) -> u64 {
    if window_ms == 0 {
        return now_ms;
    }
    (now_ms / window_ms) * window_ms
}

/// Outcome of a rate-token acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// End of the current window (ms since epoch).
    pub reset_at: u64,
}

/// Outcome of a replay check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayDecision {
    pub duplicate: bool,
}

/// Result of one maintenance sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub replay_removed: usize,
    pub windows_removed: usize,
}

/// Live record counts held by the gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStats {
    pub rate_windows: usize,
    pub replay_records: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_alignment() {
        assert_eq!(window_start(0, 60_000), 0);
        assert_eq!(window_start(59_999, 60_000), 0);
        assert_eq!(window_start(60_000, 60_000), 60_000);
        assert_eq!(window_start(125_432, 60_000), 120_000);
    }

    #[test]
    fn test_replay_key_sources_do_not_collide() {
        let by_id = ReplayKey::delivery("abc");
        let by_body = ReplayKey::content(b"abc");
        assert_ne!(by_id, by_body);
        assert!(by_body.as_str().starts_with("sha256:"));
        assert_eq!(by_body.as_str().len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_content_key_is_stable() {
        assert_eq!(ReplayKey::content(b"{\"a\":1}"), ReplayKey::content(b"{\"a\":1}"));
        assert_ne!(ReplayKey::content(b"{\"a\":1}"), ReplayKey::content(b"{\"a\":2}"));
    }
}
