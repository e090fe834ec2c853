//! Priority task queue.

use std::collections::BinaryHeap;
use std::sync::Mutex;

use tracing::info;

use crate::error::Result;
use crate::persistence::Persistence;
use crate::task::{now_secs, Task, TaskId, TaskRecord};

struct Inner {
    heap: BinaryHeap<Task>,
    next_sequence: u64,
}

/// Ordered store of pending tasks with synchronous persistence and
/// timeout-based expiry.
///
/// All mutation goes through a single lock guarding both the heap and the
/// persistence write, so a caller observing a successful `enqueue` can rely
/// on the task already being durable.
pub struct TaskQueue {
    inner: Mutex<Inner>,
    persistence: Persistence,
}

impl TaskQueue {
    /// Construct a queue backed by `persistence_path`, loading any
    /// previously persisted tasks. A read failure here is propagated to the
    /// caller, who should treat it as fatal at startup.
    pub fn load(persistence_path: impl Into<std::path::PathBuf>) -> Result<Self> {
        let persistence = Persistence::new(persistence_path);
        let records = persistence.load()?;

        let mut heap = BinaryHeap::with_capacity(records.len());
        let mut next_sequence = 0u64;
        for record in records {
            let task = record.into_task(next_sequence);
            next_sequence += 1;
            heap.push(task);
        }

        Ok(Self {
            inner: Mutex::new(Inner { heap, next_sequence }),
            persistence,
        })
    }

    /// Insert a new task and synchronously persist the whole heap before
    /// returning, so the caller's success implies durability. On a
    /// persistence failure the in-memory insertion is rolled back.
    pub fn enqueue(&self, priority: i64, payload: String, timeout_s: u64) -> Result<TaskId> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");

        let sequence = inner.next_sequence;
        let task = Task::new(priority, payload, timeout_s, sequence);
        let task_id = task.id;

        inner.next_sequence += 1;
        inner.heap.push(task);

        if let Err(e) = self.save_locked(&inner) {
            // Enqueue success must imply the task is on disk.
            inner.heap.retain(|t| t.id != task_id);
            return Err(e);
        }

        Ok(task_id)
    }

    /// Pop the highest-priority, earliest-enqueued non-expired task.
    /// Expired tasks are discarded (logged, not persisted back — the
    /// in-memory removal becomes durable on the next enqueue).
    pub fn dequeue(&self) -> Option<Task> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        let now = now_secs();
        while let Some(task) = inner.heap.pop() {
            if task.is_expired_at(now) {
                info!(task_id = %task.id, "task timed out and has been discarded");
                continue;
            }
            return Some(task);
        }
        None
    }

    pub fn size(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").heap.len()
    }

    fn save_locked(&self, inner: &Inner) -> Result<()> {
        let records: Vec<TaskRecord> = inner.heap.iter().map(TaskRecord::from).collect();
        self.persistence.save(&records)
    }
}
