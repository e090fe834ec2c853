//! Periodic background sweeps: heartbeat-based liveness eviction and stats
//! emission. Each sweep is an independent loop; an error or an empty tick
//! never ends the loop, only a shutdown signal does.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use broker_registry::WorkerRegistry;

use crate::stats::Stats;

/// Close a reaped worker's connection and log the eviction. Runs the
/// heartbeat sweep until `shutdown` fires.
pub async fn heartbeat_sweep(
    registry: Arc<WorkerRegistry>,
    interval: Duration,
    liveness_window_s: f64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let reaped = registry.reap_dead(liveness_window_s);
        for (handle, address, conn) in reaped {
            warn!(worker_handle = handle, %address, "worker missed its heartbeat window, evicting");
            let mut guard = conn.lock().await;
            if let Err(e) = guard.shutdown().await {
                warn!(worker_handle = handle, error = %e, "error closing evicted worker's socket");
            }
        }
    }
}

/// Emit a structured stats snapshot on a timer until `shutdown` fires.
pub async fn stats_sweep(
    stats: Arc<Stats>,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let snapshot = stats.snapshot();
        info!(
            tasks_added = snapshot.tasks_added,
            tasks_assigned = snapshot.tasks_assigned,
            tasks_completed = snapshot.tasks_completed,
            "stats"
        );
    }
}
