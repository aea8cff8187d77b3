//! File-backed gate store.
//!
//! State lives in memory and is mirrored to a JSON snapshot. A batch is
//! applied in place, the tables are written to `<path>.tmp`, synced and
//! renamed over the snapshot. If the write fails the batch's undo is applied,
//! so both the file and the visible state stay at the previous batch.
//!
//! Every batch rewrites the whole snapshot. Its size is bounded by live replay
//! records (deliveries per TTL) plus one window per active client, which is
//! a few thousand entries at webhook volumes. A deployment that needs much
//! more should put the gate on an append log instead.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::gate::store::{GateStore, StoreError, StoreResult, Tables, WriteBatch};
use crate::gate::types::{ClientKey, GateStats, ReplayKey, WindowKey};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    counters: Vec<(WindowKey, u32)>,
    windows: BTreeMap<ClientKey, u64>,
    replay: BTreeMap<ReplayKey, u64>,
}

impl From<&Tables> for Snapshot {
    fn from(t: &Tables) -> Self {
        let mut counters: Vec<_> = t.counters.iter().map(|(k, v)| (k.clone(), *v)).collect();
        counters.sort();
        Self {
            version: SNAPSHOT_VERSION,
            counters,
            windows: t.windows.clone(),
            replay: t.replay.clone(),
        }
    }
}

impl From<Snapshot> for Tables {
    fn from(s: Snapshot) -> Self {
        Self {
            counters: s.counters.into_iter().collect(),
            windows: s.windows,
            replay: s.replay,
        }
    }
}

/// Gate store persisted as a JSON snapshot.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    tables: Tables,
}

impl FileStore {
    /// Open the snapshot at `path`, starting empty if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;
            if snapshot.version != SNAPSHOT_VERSION {
                return Err(StoreError::Unavailable(format!(
                    "unsupported snapshot version {} in {:?}",
                    snapshot.version, path
                )));
            }
            Tables::from(snapshot)
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            Tables::default()
        };

        let stats = tables.stats();
        tracing::info!(
            path = ?path,
            rate_windows = stats.rate_windows,
            replay_records = stats.replay_records,
            "Gate store opened"
        );

        Ok(Self { path, tables })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, tables: &Tables) -> StoreResult<()> {
        let tmp = self.path.with_extension("tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &Snapshot::from(tables))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl GateStore for FileStore {
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
        if batch.is_empty() {
            return Ok(());
        }
        let undo = self.tables.apply(batch);
        if let Err(e) = self.persist(&self.tables) {
            self.tables.apply(undo);
            return Err(e);
        }
        Ok(())
    }
}
