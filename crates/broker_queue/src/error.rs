use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The persistence file existed but failed to load. Fatal at startup —
    /// the broker refuses to serve with unknown durable state.
    #[error("failed to load persisted tasks from {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("persisted task record at {path} is malformed: {source}")]
    MalformedRecord {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A write error during `enqueue`. The in-memory heap is rolled back by
    /// the caller before this propagates to the client.
    #[error("failed to persist tasks to {path}: {source}")]
    Save {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, QueueError>;
