//! Shutdown coordination.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Fans one shutdown event out to the server, the sweeper and the config
/// update loop.
///
/// Clones share the same channel, so any clone may trigger.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal. Safe to call more than once.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Wait until every subscribed task has dropped its receiver, or until
    /// `grace` elapses. Returns the number of tasks still running.
    pub async fn drain(&self, grace: Duration) -> usize {
        let deadline = Instant::now() + grace;
        loop {
            let remaining = self.tx.receiver_count();
            if remaining == 0 || Instant::now() >= deadline {
                return remaining;
            }
            time::sleep(DRAIN_POLL).await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
