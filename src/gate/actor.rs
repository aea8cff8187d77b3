//! The security gate actor.
//!
//! One task owns the store and processes commands strictly one at a time.
//! Request handlers hold a cloneable [`GateHandle`] and never touch the
//! store directly, so a read-modify-write for any key cannot interleave
//! with another.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::gate::store::{GateStore, Mutation, StoreError, StoreResult, WriteBatch};
use crate::gate::types::{
    window_start, ClientKey, GateStats, RateDecision, ReplayDecision, ReplayKey, SweepReport, WindowKey,
};

const COMMAND_BUFFER: usize = 1024;

/// Errors returned to gate callers.
#[derive(Debug, Error)]
pub enum GateError {
    /// The actor is gone (shut down or panicked).
    #[error("security gate unavailable")]
    Unavailable,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type GateResult<T> = Result<T, GateError>;

/// Fixed settings the actor is started with.
#[derive(Debug, Clone, Copy)]
pub struct GateSettings {
    /// Rate-limit window size in milliseconds.
    pub window_ms: u64,
    /// Chance that a replay check also reclaims expired records.
    pub cleanup_probability: f64,
    /// Maximum records inspected per cleanup batch.
    pub cleanup_batch: usize,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            cleanup_probability: 0.05,
            cleanup_batch: 64,
        }
    }
}

/// Result of one sweep step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStep {
    pub report: SweepReport,
    /// True once both tables have been scanned end to end in this pass.
    pub pass_complete: bool,
}

enum GateCommand {
    AcquireRateToken {
        client: ClientKey,
        max_per_window: u32,
        now: u64,
        reply: oneshot::Sender<GateResult<RateDecision>>,
    },
    CheckAndRecordReplay {
        key: ReplayKey,
        now: u64,
        ttl_ms: u64,
        reply: oneshot::Sender<GateResult<ReplayDecision>>,
    },
    SweepExpired {
        now: u64,
        reply: oneshot::Sender<GateResult<SweepStep>>,
    },
    Stats {
        reply: oneshot::Sender<GateResult<GateStats>>,
    },
}

/// Cloneable client of the gate actor.
#[derive(Clone, Debug)]
pub struct GateHandle {
    tx: mpsc::Sender<GateCommand>,
}

impl GateHandle {
    /// Take one token from `client`'s current window.
    pub async fn acquire_rate_token(&self, client: ClientKey, max_per_window: u32, now: u64) -> GateResult<RateDecision> {
        self.call(|reply| GateCommand::AcquireRateToken {
            client,
            max_per_window,
            now,
            reply,
        })
        .await
    }

    /// Record `key` unless an unexpired record already exists.
    pub async fn check_and_record_replay(&self, key: ReplayKey, now: u64, ttl_ms: u64) -> GateResult<ReplayDecision> {
        self.call(|reply| GateCommand::CheckAndRecordReplay { key, now, ttl_ms, reply })
            .await
    }

    /// Reclaim one batch of expired replay records and stale rate windows.
    pub async fn sweep_expired(&self, now: u64) -> GateResult<SweepStep> {
        self.call(|reply| GateCommand::SweepExpired { now, reply }).await
    }

    pub async fn stats(&self) -> GateResult<GateStats> {
        self.call(|reply| GateCommand::Stats { reply }).await
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<GateResult<T>>) -> GateCommand) -> GateResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| GateError::Unavailable)?;
        rx.await.map_err(|_| GateError::Unavailable)?
    }
}

/// The actor state. Constructed through [`spawn_gate`].
pub struct SecurityGate {
    store: Box<dyn GateStore>,
    settings: GateSettings,
    rng: StdRng,
    replay_cursor: Option<ReplayKey>,
    window_cursor: Option<ClientKey>,
    // Tables that wrapped during the current sweep pass.
    replay_swept: bool,
    windows_swept: bool,
}

/// Start the gate actor on the current Tokio runtime.
///
/// The actor stops once every [`GateHandle`] has been dropped.
pub fn spawn_gate(store: Box<dyn GateStore>, settings: GateSettings) -> GateHandle {
    spawn_with_rng(store, settings, StdRng::from_entropy())
}

pub(crate) fn spawn_with_rng(store: Box<dyn GateStore>, settings: GateSettings, rng: StdRng) -> GateHandle {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let gate = SecurityGate {
        store,
        settings,
        rng,
        replay_cursor: None,
        window_cursor: None,
        replay_swept: false,
        windows_swept: false,
    };
    tokio::spawn(gate.run(rx));
    GateHandle { tx }
}

impl SecurityGate {
    async fn run(mut self, mut rx: mpsc::Receiver<GateCommand>) {
        tracing::debug!(window_ms = self.settings.window_ms, "Security gate started");
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        tracing::debug!("Security gate stopped");
    }

    fn handle(&mut self, command: GateCommand) {
        match command {
            GateCommand::AcquireRateToken {
                client,
                max_per_window,
                now,
                reply,
            } => {
                let _ = reply.send(self.acquire_rate_token(&client, max_per_window, now).map_err(Into::into));
            }
            GateCommand::CheckAndRecordReplay { key, now, ttl_ms, reply } => {
                let _ = reply.send(self.check_and_record_replay(&key, now, ttl_ms).map_err(Into::into));
                // Cleanup runs after the caller has its answer.
                self.maybe_cleanup(now);
            }
            GateCommand::SweepExpired { now, reply } => {
                let _ = reply.send(self.sweep(now).map_err(Into::into));
            }
            GateCommand::Stats { reply } => {
                let _ = reply.send(self.store.stats().map_err(Into::into));
            }
        }
    }

    fn acquire_rate_token(&mut self, client: &ClientKey, max_per_window: u32, now: u64) -> StoreResult<RateDecision> {
        let start = window_start(now, self.settings.window_ms);
        let reset_at = start.saturating_add(self.settings.window_ms);
        let key = WindowKey {
            client: client.clone(),
            window_start: start,
        };

        let count = self.store.counter(&key)?.unwrap_or(0);
        if count >= max_per_window {
            return Ok(RateDecision {
                allowed: false,
                remaining: 0,
                reset_at,
            });
        }

        let mut batch = WriteBatch::new();
        batch.push(Mutation::PutCounter(key, count + 1));
        match self.store.current_window(client)? {
            Some(previous) if previous == start => {}
            Some(previous) => {
                batch
                    .push(Mutation::DeleteCounter(WindowKey {
                        client: client.clone(),
                        window_start: previous,
                    }))
                    .push(Mutation::PutCurrentWindow(client.clone(), start));
            }
            None => {
                batch.push(Mutation::PutCurrentWindow(client.clone(), start));
            }
        }
        self.store.apply(batch)?;

        Ok(RateDecision {
            allowed: true,
            remaining: max_per_window - count - 1,
            reset_at,
        })
    }

    fn check_and_record_replay(&mut self, key: &ReplayKey, now: u64, ttl_ms: u64) -> StoreResult<ReplayDecision> {
        match self.store.replay_expiry(key)? {
            Some(expires_at) if expires_at > now => Ok(ReplayDecision { duplicate: true }),
            _ => {
                let mut batch = WriteBatch::new();
                batch.push(Mutation::PutReplay(key.clone(), now.saturating_add(ttl_ms)));
                self.store.apply(batch)?;
                Ok(ReplayDecision { duplicate: false })
            }
        }
    }

    fn maybe_cleanup(&mut self, now: u64) {
        let p = self.settings.cleanup_probability.clamp(0.0, 1.0);
        if p == 0.0 || !self.rng.gen_bool(p) {
            return;
        }
        match self.cleanup_replay(now) {
            Ok((removed, _)) if removed > 0 => {
                tracing::debug!(removed, "Reclaimed expired replay records");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Replay cleanup failed"),
        }
    }

    /// One bounded batch of expired replay records. Returns (removed, wrapped).
    fn cleanup_replay(&mut self, now: u64) -> StoreResult<(usize, bool)> {
        let limit = self.settings.cleanup_batch.max(1);
        let scanned = self.store.scan_replay(self.replay_cursor.as_ref(), limit)?;
        let wrapped = scanned.len() < limit;

        let mut batch = WriteBatch::new();
        for (key, expires_at) in &scanned {
            if *expires_at <= now {
                batch.push(Mutation::DeleteReplay(key.clone()));
            }
        }
        let removed = batch.len();
        self.store.apply(batch)?;

        self.replay_cursor = if wrapped {
            None
        } else {
            scanned.last().map(|(k, _)| k.clone())
        };
        Ok((removed, wrapped))
    }

    /// One bounded batch of client windows that have ended.
    fn cleanup_windows(&mut self, now: u64) -> StoreResult<(usize, bool)> {
        let limit = self.settings.cleanup_batch.max(1);
        let scanned = self.store.scan_windows(self.window_cursor.as_ref(), limit)?;
        let wrapped = scanned.len() < limit;

        let mut batch = WriteBatch::new();
        let mut removed = 0;
        for (client, start) in &scanned {
            if start.saturating_add(self.settings.window_ms) <= now {
                batch
                    .push(Mutation::DeleteCounter(WindowKey {
                        client: client.clone(),
                        window_start: *start,
                    }))
                    .push(Mutation::DeleteCurrentWindow(client.clone()));
                removed += 1;
            }
        }
        self.store.apply(batch)?;

        self.window_cursor = if wrapped {
            None
        } else {
            scanned.last().map(|(k, _)| k.clone())
        };
        Ok((removed, wrapped))
    }

    fn sweep(&mut self, now: u64) -> StoreResult<SweepStep> {
        let mut report = SweepReport::default();
        if !self.replay_swept {
            let (removed, wrapped) = self.cleanup_replay(now)?;
            report.replay_removed = removed;
            self.replay_swept = wrapped;
        }
        if !self.windows_swept {
            let (removed, wrapped) = self.cleanup_windows(now)?;
            report.windows_removed = removed;
            self.windows_swept = wrapped;
        }

        let pass_complete = self.replay_swept && self.windows_swept;
        if pass_complete {
            self.replay_swept = false;
            self.windows_swept = false;
        }
        Ok(SweepStep { report, pass_complete })
    }
}
