//! Typed wire messages.
//!
//! `Request` is a closed, tagged enum instead of a free-form map: an
//! unrecognized `type` or a missing required field fails during
//! deserialization, not during dispatch.

use serde::{Deserialize, Serialize};

fn default_priority() -> i64 {
    0
}

fn default_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    AddTask {
        task: String,
        #[serde(default = "default_priority")]
        priority: i64,
        #[serde(default = "default_timeout")]
        timeout: u64,
    },
    GetTask {
        worker_id: String,
    },
    TaskCompleted {
        task_id: String,
        worker_id: String,
        result: serde_json::Value,
    },
    Heartbeat {
        worker_id: String,
    },
}

impl Request {
    pub fn verb(&self) -> &'static str {
        match self {
            Request::AddTask { .. } => "add_task",
            Request::GetTask { .. } => "get_task",
            Request::TaskCompleted { .. } => "task_completed",
            Request::Heartbeat { .. } => "heartbeat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OkStatus {
    #[serde(rename = "ok")]
    Ok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmptyStatus {
    #[serde(rename = "empty")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorStatus {
    #[serde(rename = "error")]
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub status: ErrorStatus,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmptyReply {
    pub status: EmptyStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetTaskOkReply {
    pub status: OkStatus,
    pub task_id: String,
    pub task: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddTaskOkReply {
    pub status: OkStatus,
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainOkReply {
    pub status: OkStatus,
}

/// A reply's shape varies by verb and outcome. Variants are tried in order
/// most-fields-first so a `get_task` success (which has every field an
/// `add_task` success has, plus `task`) isn't mistaken for the narrower
/// shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Error(ErrorReply),
    Empty(EmptyReply),
    GetTaskOk(GetTaskOkReply),
    AddTaskOk(AddTaskOkReply),
    PlainOk(PlainOkReply),
}

impl Reply {
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(ErrorReply {
            status: ErrorStatus::Error,
            message: message.into(),
        })
    }

    pub fn empty() -> Self {
        Reply::Empty(EmptyReply {
            status: EmptyStatus::Empty,
        })
    }

    pub fn ok_plain() -> Self {
        Reply::PlainOk(PlainOkReply {
            status: OkStatus::Ok,
        })
    }

    pub fn ok_add_task(task_id: impl Into<String>) -> Self {
        Reply::AddTaskOk(AddTaskOkReply {
            status: OkStatus::Ok,
            task_id: task_id.into(),
        })
    }

    pub fn ok_get_task(task_id: impl Into<String>, task: impl Into<String>) -> Self {
        Reply::GetTaskOk(GetTaskOkReply {
            status: OkStatus::Ok,
            task_id: task_id.into(),
            task: task.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_task_applies_defaults() {
        let v = json!({"type": "add_task", "task": "do thing"});
        let req: Request = serde_json::from_value(v).unwrap();
        assert_eq!(
            req,
            Request::AddTask {
                task: "do thing".into(),
                priority: 0,
                timeout: 300
            }
        );
    }

    #[test]
    fn get_task_requires_worker_id() {
        let v = json!({"type": "get_task"});
        let err = serde_json::from_value::<Request>(v).unwrap_err();
        assert!(err.to_string().contains("worker_id"));
    }

    #[test]
    fn unknown_type_fails() {
        let v = json!({"type": "get_task_result", "worker_id": "w"});
        assert!(serde_json::from_value::<Request>(v).is_err());
    }

    #[test]
    fn ok_add_task_reply_round_trips() {
        let reply = Reply::ok_add_task("abc-123");
        let v = serde_json::to_value(&reply).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["task_id"], "abc-123");
        let back: Reply = serde_json::from_value(v).unwrap();
        assert_eq!(reply, back);
    }

    #[test]
    fn ok_get_task_reply_is_distinguished_from_add_task() {
        let reply = Reply::ok_get_task("abc-123", "do the thing");
        let v = serde_json::to_value(&reply).unwrap();
        let back: Reply = serde_json::from_value(v).unwrap();
        assert_eq!(reply, back);
        assert!(matches!(back, Reply::GetTaskOk(_)));
    }

    #[test]
    fn error_reply_round_trips() {
        let reply = Reply::error("invalid hmac");
        let v = serde_json::to_value(&reply).unwrap();
        let back: Reply = serde_json::from_value(v).unwrap();
        assert_eq!(reply, back);
    }
}
