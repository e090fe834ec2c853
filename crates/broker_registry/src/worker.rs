//! A connected worker.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;

/// Handle by which the registry identifies a worker internally. Distinct
/// from the wire-level `worker_id` string, which is never used as a lookup
/// key — two connections could claim the same string.
pub type WorkerHandle = u64;

/// A connected consumer that pulls tasks and reports completion. Exists in
/// the registry only while its connection is open and its heartbeat is
/// within the liveness window.
pub struct Worker {
    pub address: SocketAddr,
    pub(crate) inflight: u64,
    pub(crate) last_heartbeat: f64,
    pub(crate) conn: Arc<AsyncMutex<OwnedWriteHalf>>,
}

impl Worker {
    pub fn inflight(&self) -> u64 {
        self.inflight
    }

    pub fn last_heartbeat(&self) -> f64 {
        self.last_heartbeat
    }

    pub fn conn(&self) -> Arc<AsyncMutex<OwnedWriteHalf>> {
        Arc::clone(&self.conn)
    }
}
