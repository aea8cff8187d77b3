//! Durable per-key storage behind the security gate.
//!
//! The gate actor is the only owner of a store, so implementations need no
//! internal locking. Reads are point lookups or cursor scans; every mutation
//! goes through [`GateStore::apply`], which must make a whole batch visible
//! (and durable, where applicable) or none of it.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use thiserror::Error;

use crate::gate::types::{ClientKey, GateStats, ReplayKey, WindowKey};

/// Errors raised by a gate store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store snapshot is corrupt: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A single keyed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    PutCounter(WindowKey, u32),
    DeleteCounter(WindowKey),
    PutCurrentWindow(ClientKey, u64),
    DeleteCurrentWindow(ClientKey),
    PutReplay(ReplayKey, u64),
    DeleteReplay(ReplayKey),
}

/// Writes applied atomically by [`GateStore::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<Mutation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: Mutation) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn into_ops(self) -> Vec<Mutation> {
        self.ops
    }
}

/// Storage contract consumed by the gate actor.
pub trait GateStore: Send + 'static {
    /// Counter for one client window.
    fn counter(&self, key: &WindowKey) -> StoreResult<Option<u32>>;

    /// Window the client most recently counted against.
    fn current_window(&self, client: &ClientKey) -> StoreResult<Option<u64>>;

    /// Expiry (ms since epoch) recorded for a replay key.
    fn replay_expiry(&self, key: &ReplayKey) -> StoreResult<Option<u64>>;

    /// Up to `limit` replay records ordered by key, strictly after `after`.
    fn scan_replay(&self, after: Option<&ReplayKey>, limit: usize) -> StoreResult<Vec<(ReplayKey, u64)>>;

    /// Up to `limit` current-window pointers ordered by client, strictly after `after`.
    fn scan_windows(&self, after: Option<&ClientKey>, limit: usize) -> StoreResult<Vec<(ClientKey, u64)>>;

    fn stats(&self) -> StoreResult<GateStats>;

    /// Apply every mutation in `batch`, or none of them.
    fn apply(&mut self, batch: WriteBatch) -> StoreResult<()>;
}

/// The three keyed tables shared by the in-memory and file-backed stores.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    pub(crate) counters: HashMap<WindowKey, u32>,
    pub(crate) windows: BTreeMap<ClientKey, u64>,
    pub(crate) replay: BTreeMap<ReplayKey, u64>,
}

impl Tables {
    /// Apply `batch` in order and return the batch that undoes it.
    pub(crate) fn apply(&mut self, batch: WriteBatch) -> WriteBatch {
        let mut undo = Vec::with_capacity(batch.len());
        for op in batch.into_ops() {
            let inverse = match op {
                Mutation::PutCounter(k, v) => match self.counters.insert(k.clone(), v) {
                    Some(prev) => Mutation::PutCounter(k, prev),
                    None => Mutation::DeleteCounter(k),
                },
                Mutation::DeleteCounter(k) => match self.counters.remove(&k) {
                    Some(prev) => Mutation::PutCounter(k, prev),
                    None => Mutation::DeleteCounter(k),
                },
                Mutation::PutCurrentWindow(k, v) => match self.windows.insert(k.clone(), v) {
                    Some(prev) => Mutation::PutCurrentWindow(k, prev),
                    None => Mutation::DeleteCurrentWindow(k),
                },
                Mutation::DeleteCurrentWindow(k) => match self.windows.remove(&k) {
                    Some(prev) => Mutation::PutCurrentWindow(k, prev),
                    None => Mutation::DeleteCurrentWindow(k),
                },
                Mutation::PutReplay(k, v) => match self.replay.insert(k.clone(), v) {
                    Some(prev) => Mutation::PutReplay(k, prev),
                    None => Mutation::DeleteReplay(k),
                },
                Mutation::DeleteReplay(k) => match self.replay.remove(&k) {
                    Some(prev) => Mutation::PutReplay(k, prev),
                    None => Mutation::DeleteReplay(k),
                },
            };
            undo.push(inverse);
        }
        undo.reverse();
        WriteBatch { ops: undo }
    }

    pub(crate) fn stats(&self) -> GateStats {
        GateStats {
            rate_windows: self.counters.len(),
            replay_records: self.replay.len(),
        }
    }

    pub(crate) fn counter(&self, key: &WindowKey) -> Option<u32> {
        self.counters.get(key).copied()
    }

    pub(crate) fn current_window(&self, client: &ClientKey) -> Option<u64> {
        self.windows.get(client).copied()
    }

    pub(crate) fn replay_expiry(&self, key: &ReplayKey) -> Option<u64> {
        self.replay.get(key).copied()
    }

    pub(crate) fn scan_replay(&self, after: Option<&ReplayKey>, limit: usize) -> Vec<(ReplayKey, u64)> {
        scan_after(&self.replay, after, limit)
    }

    pub(crate) fn scan_windows(&self, after: Option<&ClientKey>, limit: usize) -> Vec<(ClientKey, u64)> {
        scan_after(&self.windows, after, limit)
    }
}

fn scan_after<K: Ord + Clone>(map: &BTreeMap<K, u64>, after: Option<&K>, limit: usize) -> Vec<(K, u64)> {
    let lower = match after {
        Some(k) => Bound::Excluded(k),
        None => Bound::Unbounded,
    };
    map.range((lower, Bound::Unbounded))
        .take(limit)
        .map(|(k, v)| (k.clone(), *v))
        .collect()
}

/// Process-local store. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GateStore for MemoryStore {
    fn counter(&self, key: &WindowKey) -> StoreResult<Option<u32>> {
        Ok(self.tables.counter(key))
    }

    fn current_window(&self, client: &ClientKey) -> StoreResult<Option<u64>> {
        Ok(self.tables.current_window(client))
    }

    fn replay_expiry(&self, key: &ReplayKey) -> StoreResult<Option<u64>> {
        Ok(self.tables.replay_expiry(key))
    }

    fn scan_replay(&self, after: Option<&ReplayKey>, limit: usize) -> StoreResult<Vec<(ReplayKey, u64)>> {
        Ok(self.tables.scan_replay(after, limit))
    }

    fn scan_windows(&self, after: Option<&ClientKey>, limit: usize) -> StoreResult<Vec<(ClientKey, u64)>> {
        Ok(self.tables.scan_windows(after, limit))
    }

    fn stats(&self) -> StoreResult<GateStats> {
        Ok(self.tables.stats())
    }

    fn apply(&mut self, batch: WriteBatch) -> StoreResult<()> {
        self.tables.apply(batch);
        Ok(())
    }
}
