//! Structured operation errors.
//!
//! Every worker operation returns either a typed response or an
//! [`OpError`]. Callers branch on [`OpError::kind`]; the `Display` text is
//! the human-readable detail.

use serde::{Deserialize, Serialize};

use crate::load::WorkerRole;
use crate::task::{TaskId, TaskStatus};

/// Coarse error category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Task or worker identifier unknown.
    NotFound,
    /// Caller is not the task's current holder.
    Forbidden,
    /// Task status does not permit the operation.
    InvalidState,
    /// Worker has no room for another task.
    CapacityExceeded,
    /// Malformed input that could not be recovered with a default.
    Validation,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::InvalidState => "invalid_state",
            Self::CapacityExceeded => "capacity_exceeded",
            Self::Validation => "validation",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by worker operations. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpError {
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("worker {0} not found")]
    WorkerNotFound(String),

    #[error("no suitable engineers available")]
    NoSuitableEngineer,

    #[error("task {task_id} is not assigned to {worker}")]
    NotAssignee { task_id: TaskId, worker: String },

    /// The task's status does not allow `action`.
    #[error("task {task_id} cannot be {action} (status: {status})")]
    InvalidState {
        task_id: TaskId,
        status: TaskStatus,
        action: &'static str,
    },

    #[error("{worker} has no available capacity (current load: {current}/{max})")]
    CapacityExceeded {
        worker: String,
        current: u32,
        max: u32,
    },

    /// A worker of the wrong role was named for an operation.
    #[error("{worker} is a {actual}, expected a {expected}")]
    WrongRole {
        worker: String,
        expected: WorkerRole,
        actual: WorkerRole,
    },

    #[error("operation {operation:?} is not supported by the {role} role")]
    UnsupportedOperation { role: WorkerRole, operation: String },

    #[error("{0}")]
    Validation(String),
}

impl OpError {
    /// Returns the category callers branch on.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TaskNotFound(_) | Self::WorkerNotFound(_) | Self::NoSuitableEngineer => {
                ErrorKind::NotFound
            }
            Self::NotAssignee { .. } => ErrorKind::Forbidden,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::WrongRole { .. } | Self::UnsupportedOperation { .. } | Self::Validation(_) => {
                ErrorKind::Validation
            }
        }
    }

    /// Converts into the wire form carried by the JSON-lines protocol.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            detail: self.to_string(),
        }
    }
}

/// Serializable `{kind, detail}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub detail: String,
}
