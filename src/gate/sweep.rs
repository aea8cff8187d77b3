//! Periodic reclamation of expired gate state.
//!
//! Complements the sampled inline cleanup: every interval the sweeper asks
//! the gate for bounded batches until one full pass over the replay records
//! and client windows has completed. Each batch is a separate gate command,
//! so admissions interleave with the sweep.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::gate::actor::GateHandle;
use crate::gate::now_millis;
use crate::gate::types::SweepReport;
use crate::observability::metrics;

/// Upper bound on batches per pass so a huge store cannot pin the sweeper.
const MAX_STEPS_PER_PASS: usize = 10_000;

pub struct GateSweeper {
    gate: GateHandle,
    interval: Duration,
}

impl GateSweeper {
    pub fn new(gate: GateHandle, interval_secs: u64) -> Self {
        Self {
            gate,
            interval: Duration::from_secs(interval_secs),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.interval.is_zero() {
            tracing::info!("Periodic gate sweep disabled");
            return;
        }

        tracing::info!(interval_secs = self.interval.as_secs(), "Gate sweeper starting");

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately; skip it so startup stays quiet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Gate sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one full pass. Returns what was reclaimed.
    pub async fn sweep_once(&self) -> SweepReport {
        let mut total = SweepReport::default();
        for _ in 0..MAX_STEPS_PER_PASS {
            match self.gate.sweep_expired(now_millis()).await {
                Ok(step) => {
                    total.replay_removed += step.report.replay_removed;
                    total.windows_removed += step.report.windows_removed;
                    if step.pass_complete {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Gate sweep aborted");
                    break;
                }
            }
        }

        if let Ok(stats) = self.gate.stats().await {
            metrics::record_gate_size(stats.rate_windows, stats.replay_records);
            tracing::debug!(
                replay_removed = total.replay_removed,
                windows_removed = total.windows_removed,
                rate_windows = stats.rate_windows,
                replay_records = stats.replay_records,
                "Gate sweep complete"
            );
        }
        total
    }
}
