//! Monotonic stats counters.
//!
//! Each counter is its own atomic rather than a shared mutable struct
//! behind a lock. A snapshot is a plain unsynchronized read of all three —
//! read-by-copy, not a transactional snapshot across counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Stats {
    tasks_added: AtomicU64,
    tasks_assigned: AtomicU64,
    tasks_completed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StatsSnapshot {
    pub tasks_added: u64,
    pub tasks_assigned: u64,
    pub tasks_completed: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_task_added(&self) {
        self.tasks_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_assigned(&self) {
        self.tasks_assigned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tasks_added: self.tasks_added.load(Ordering::Relaxed),
            tasks_assigned: self.tasks_assigned.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
        }
    }
}
