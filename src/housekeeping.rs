//! Periodic cleanup of expired gateway state.
//!
//! Lookups always check expiry themselves; sweeping only reclaims memory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// State that accumulates expired entries.
#[async_trait]
pub trait Sweep: Send + Sync {
    fn name(&self) -> &'static str;

    /// Remove entries expired at `now`, returning how many were dropped.
    async fn sweep(&self, now: Instant) -> usize;
}

/// Handle to the background sweeper; stop it during shutdown.
pub struct Housekeeper {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Housekeeper {
    pub fn spawn(targets: Vec<Arc<dyn Sweep>>, interval: Duration) -> Self {
        let (stop, mut stopped) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately; nothing has expired yet
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_once(&targets, Instant::now()).await;
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Housekeeping task stopped");
        });

        Self { stop, task }
    }

    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("Housekeeping task ended abnormally: {}", e);
        }
    }
}

pub async fn run_once(targets: &[Arc<dyn Sweep>], now: Instant) -> usize {
    let mut total = 0;
    for target in targets {
        let removed = target.sweep(now).await;
        if removed > 0 {
            tracing::debug!("Swept {} expired entries from {}", removed, target.name());
        }
        total += removed;
    }
    total
}
