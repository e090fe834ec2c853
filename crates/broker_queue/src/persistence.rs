//! Whole-file persistence for the pending queue.
//!
//! Each enqueue rewrites the entire file with every pending task. Writes go
//! to a sibling temp file and are renamed over the target, so a crash
//! mid-write never leaves a torn file in place.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{QueueError, Result};
use crate::task::TaskRecord;

pub struct Persistence {
    path: PathBuf,
}

impl Persistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted records. Absence of the file is an empty queue. Any
    /// parse failure aborts with `QueueError` — the broker refuses to serve
    /// with unknown durable state.
    pub fn load(&self) -> Result<Vec<TaskRecord>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(QueueError::Load {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| QueueError::MalformedRecord {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Rewrite the file with exactly `records`, write-then-rename.
    pub fn save(&self, records: &[TaskRecord]) -> Result<()> {
        let tmp_path = self.tmp_path();
        let bytes = serde_json::to_vec(records).expect("TaskRecord serialization is infallible");
        fs::write(&tmp_path, &bytes).map_err(|source| QueueError::Save {
            path: self.path.display().to_string(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| QueueError::Save {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "tasks.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskId;

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let p = Persistence::new(dir.path().join("tasks.json"));
        assert!(p.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let p = Persistence::new(dir.path().join("tasks.json"));
        let records = vec![TaskRecord {
            priority: 1,
            task_id: TaskId::new(),
            task: "do thing".into(),
            timestamp: 123.0,
            timeout: 300,
        }];
        p.save(&records).unwrap();
        let loaded = p.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].task, "do thing");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, b"not json").unwrap();
        let p = Persistence::new(path);
        assert!(matches!(p.load(), Err(QueueError::MalformedRecord { .. })));
    }

    #[test]
    fn no_temp_file_left_behind_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let p = Persistence::new(dir.path().join("tasks.json"));
        p.save(&[]).unwrap();
        assert!(!p.tmp_path().exists());
    }
}
