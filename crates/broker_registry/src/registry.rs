//! Worker registry.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex as AsyncMutex;

use crate::worker::{Worker, WorkerHandle};

pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs_f64()
}

struct Inner {
    workers: HashMap<WorkerHandle, Worker>,
    /// Registration order, used by `select_least_loaded` to break ties
    /// deterministically between equally-loaded workers, oldest registration
    /// first.
    order: Vec<WorkerHandle>,
    next_handle: WorkerHandle,
}

/// Tracks connected workers, their load, and liveness. All operations are
/// serialized under a single lock guarding the worker set and every
/// worker's mutable fields.
pub struct WorkerRegistry {
    inner: Mutex<Inner>,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                workers: HashMap::new(),
                order: Vec::new(),
                next_handle: 0,
            }),
        }
    }

    /// Register a new worker with `inflight=0` and `last_heartbeat=now`. A
    /// connection that never issues `get_task` never registers — it's up to
    /// the caller to decide when registration happens.
    pub fn register(&self, address: SocketAddr, conn: Arc<AsyncMutex<OwnedWriteHalf>>) -> WorkerHandle {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let handle = inner.next_handle;
        inner.next_handle += 1;
        inner.workers.insert(
            handle,
            Worker {
                address,
                inflight: 0,
                last_heartbeat: now_secs(),
                conn,
            },
        );
        inner.order.push(handle);
        handle
    }

    /// Remove a worker. Idempotent — removing an absent worker is a no-op.
    pub fn deregister(&self, handle: WorkerHandle) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner.workers.remove(&handle);
        inner.order.retain(|h| *h != handle);
    }

    /// The live worker with minimum `inflight`, ties broken by insertion
    /// order. Not used by the current pull-model dispatcher, kept for a
    /// future push-based assignment path.
    pub fn select_least_loaded(&self) -> Option<WorkerHandle> {
        let inner = self.inner.lock().expect("registry lock poisoned");
        inner
            .order
            .iter()
            .filter_map(|h| inner.workers.get(h).map(|w| (*h, w.inflight)))
            .min_by_key(|(_, inflight)| *inflight)
            .map(|(h, _)| h)
    }

    pub fn bump_inflight(&self, handle: WorkerHandle) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if let Some(w) = inner.workers.get_mut(&handle) {
            w.inflight += 1;
        }
    }

    /// Saturating decrement, floored at 0.
    pub fn drop_inflight(&self, handle: WorkerHandle) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if let Some(w) = inner.workers.get_mut(&handle) {
            w.inflight = w.inflight.saturating_sub(1);
        }
    }

    pub fn touch(&self, handle: WorkerHandle) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if let Some(w) = inner.workers.get_mut(&handle) {
            w.last_heartbeat = now_secs();
        }
    }

    pub fn contains(&self, handle: WorkerHandle) -> bool {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .workers
            .contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry lock poisoned").workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every worker whose `last_heartbeat` is older than
    /// `liveness_window_s`, returning their connections so the caller can
    /// close the sockets outside this lock.
    pub fn reap_dead(&self, liveness_window_s: f64) -> Vec<(WorkerHandle, SocketAddr, Arc<AsyncMutex<OwnedWriteHalf>>)> {
        let now = now_secs();
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        let dead: Vec<WorkerHandle> = inner
            .workers
            .iter()
            .filter(|(_, w)| now - w.last_heartbeat > liveness_window_s)
            .map(|(h, _)| *h)
            .collect();

        let mut reaped = Vec::with_capacity(dead.len());
        for handle in dead {
            if let Some(worker) = inner.workers.remove(&handle) {
                reaped.push((handle, worker.address, worker.conn));
            }
            inner.order.retain(|h| *h != handle);
        }
        reaped
    }
}
