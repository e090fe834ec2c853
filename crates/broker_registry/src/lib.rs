//! Worker registry and heartbeat-based liveness tracking.

pub mod registry;
pub mod worker;

pub use registry::{now_secs, WorkerRegistry};
pub use worker::{Worker, WorkerHandle};
