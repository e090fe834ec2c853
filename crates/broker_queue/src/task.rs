//! Task type and ordering relation.

use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, globally unique task identifier, assigned at enqueue and stable
/// for the broker's lifetime (including across restarts via the
/// persistence file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Seconds since the Unix epoch, captured at enqueue time. Reconstructed
/// verbatim on `load` so timeouts keep counting from original submission,
/// not from restart time.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs_f64()
}

/// A unit of work submitted by a producer.
///
/// `task_id` is unique across the broker's lifetime, including across
/// restarts (it's reconstructed from the persistence file, never
/// reassigned). `timeout_s` is expected to be positive, but this is not
/// enforced at construction — a zero timeout simply makes the task expire
/// on its next dequeue, the same as the reference implementation this
/// broker's wire protocol is compatible with.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub priority: i64,
    pub payload: String,
    pub timeout_s: u64,
    pub enqueued_at: f64,
    /// Monotonic tie-break counter, assigned under the queue lock at
    /// enqueue time. Guarantees a total order between equal-priority tasks
    /// enqueued close enough together that their timestamps collide at the
    /// clock's resolution.
    pub(crate) sequence: u64,
}

impl Task {
    pub fn new(priority: i64, payload: String, timeout_s: u64, sequence: u64) -> Self {
        Self {
            id: TaskId::new(),
            priority,
            payload,
            timeout_s,
            enqueued_at: now_secs(),
            sequence,
        }
    }

    pub fn is_expired_at(&self, now: f64) -> bool {
        now - self.enqueued_at > self.timeout_s as f64
    }
}

impl Eq for Task {}

/// Higher priority first, then FIFO within equal priority. `BinaryHeap` is a
/// max-heap, so `Ord` here is defined so that `Ordering::Greater` means
/// "pop me first".
impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.enqueued_at.total_cmp(&self.enqueued_at))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// On-disk record: `{priority, task_id, task, timestamp, timeout}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub priority: i64,
    pub task_id: TaskId,
    pub task: String,
    pub timestamp: f64,
    pub timeout: u64,
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            priority: task.priority,
            task_id: task.id,
            task: task.payload.clone(),
            timestamp: task.enqueued_at,
            timeout: task.timeout_s,
        }
    }
}

impl TaskRecord {
    /// Reconstruct a `Task`, preserving the original `task_id` and
    /// `enqueued_at` exactly. `sequence` is reassigned by the caller since
    /// it is internal to one broker's lifetime, not part of the persisted
    /// record.
    pub fn into_task(self, sequence: u64) -> Task {
        Task {
            id: self.task_id,
            priority: self.priority,
            payload: self.task,
            timeout_s: self.timeout,
            enqueued_at: self.timestamp,
            sequence,
        }
    }
}
