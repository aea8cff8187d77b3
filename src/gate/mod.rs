//! Security gate subsystem.
//!
//! # Data Flow
//! ```text
//! Request handler (many, concurrent)
//!     → GateHandle (mpsc command + oneshot reply)
//!     → SecurityGate actor (single task, one command at a time)
//!         → acquire_rate_token: window counter + current-window pointer
//!         → check_and_record_replay: replay expiry record
//!     → GateStore (MemoryStore | FileStore), owned by the actor only
//!
//! Maintenance:
//!     inline: a sampled fraction of replay checks reclaims one batch
//!     periodic: sweep task asks the actor to reclaim batches until a full pass
//! ```
//!
//! # Design Decisions
//! - Serialized actor instead of shared locked maps: no lost updates, exactly
//!   one winner per replay key
//! - Every decision is one atomic store batch
//! - Store failures fail the call; the caller decides the response

pub mod actor;
pub mod file_store;
pub mod store;
pub mod sweep;
pub mod types;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{GateConfig, StorageConfig};

pub use actor::{spawn_gate, GateError, GateHandle, GateResult, GateSettings, SweepStep};
pub use file_store::FileStore;
pub use store::{GateStore, MemoryStore, Mutation, StoreError, WriteBatch};
pub use sweep::GateSweeper;
pub use types::{ClientKey, GateStats, RateDecision, ReplayDecision, ReplayKey, SweepReport, WindowKey};

impl GateSettings {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            window_ms: config.rate_limit.window_ms(),
            cleanup_probability: config.replay.cleanup_probability,
            cleanup_batch: config.replay.cleanup_batch,
        }
    }
}

/// Open the configured store: a snapshot file when a path is set, else memory.
pub fn open_store(config: &StorageConfig) -> Result<Box<dyn GateStore>, StoreError> {
    match &config.path {
        Some(path) => Ok(Box::new(FileStore::open(path)?)),
        None => {
            tracing::warn!("No storage path configured, gate state will not survive a restart");
            Ok(Box::new(MemoryStore::new()))
        }
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
