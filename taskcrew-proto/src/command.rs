//! Command contract and JSON lines wire protocol.
//!
//! A [`Command`] is the `(operation, parameters)` pair produced by a
//! translator and consumed by the router. [`ClientMessage`] and
//! [`ServerMessage`] frame commands and their outcomes on a socket, one
//! JSON object per line.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorBody, ErrorKind};
use crate::load::WorkerRole;
use crate::ops::{
    AgentStatusResponse, AssignTaskResponse, CompleteTaskResponse, CreateTaskResponse,
    RebalanceReport, ReviewTaskResponse, SubmitTestResultsResponse, TaskListResponse, TaskUpdate,
    WorkerStatusResponse,
};
use crate::task::ParseError;

/// Errors raised while framing protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Every public worker operation, across all roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateTask,
    AssignTask,
    ListTasks,
    ReviewTask,
    GetAgentStatus,
    ListMyTasks,
    WorkOnTask,
    CompleteTask,
    GetStatus,
    ListCompletedTasks,
    TestTask,
    SubmitTestResults,
}

const MANAGER_OPERATIONS: &[Operation] = &[
    Operation::CreateTask,
    Operation::AssignTask,
    Operation::ListTasks,
    Operation::ReviewTask,
    Operation::GetAgentStatus,
];

const ENGINEER_OPERATIONS: &[Operation] = &[
    Operation::ListMyTasks,
    Operation::WorkOnTask,
    Operation::CompleteTask,
    Operation::GetStatus,
];

const TESTER_OPERATIONS: &[Operation] = &[
    Operation::ListCompletedTasks,
    Operation::ListMyTasks,
    Operation::TestTask,
    Operation::SubmitTestResults,
    Operation::GetStatus,
];

impl Operation {
    pub const ALL: [Self; 12] = [
        Self::CreateTask,
        Self::AssignTask,
        Self::ListTasks,
        Self::ReviewTask,
        Self::GetAgentStatus,
        Self::ListMyTasks,
        Self::WorkOnTask,
        Self::CompleteTask,
        Self::GetStatus,
        Self::ListCompletedTasks,
        Self::TestTask,
        Self::SubmitTestResults,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateTask => "create_task",
            Self::AssignTask => "assign_task",
            Self::ListTasks => "list_tasks",
            Self::ReviewTask => "review_task",
            Self::GetAgentStatus => "get_agent_status",
            Self::ListMyTasks => "list_my_tasks",
            Self::WorkOnTask => "work_on_task",
            Self::CompleteTask => "complete_task",
            Self::GetStatus => "get_status",
            Self::ListCompletedTasks => "list_completed_tasks",
            Self::TestTask => "test_task",
            Self::SubmitTestResults => "submit_test_results",
        }
    }

    /// The static operation table for a role.
    #[must_use]
    pub const fn for_role(role: WorkerRole) -> &'static [Self] {
        match role {
            WorkerRole::Manager => MANAGER_OPERATIONS,
            WorkerRole::Engineer => ENGINEER_OPERATIONS,
            WorkerRole::Tester => TESTER_OPERATIONS,
        }
    }

    #[must_use]
    pub fn supported_by(self, role: WorkerRole) -> bool {
        Self::for_role(role).contains(&self)
    }
}

impl FromStr for Operation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == needle)
            .ok_or_else(|| ParseError {
                kind: "operation",
                value: s.to_string(),
            })
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved `(operation, parameters)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub operation: String,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl Command {
    /// Creates a command with no parameters.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            parameters: serde_json::Map::new(),
        }
    }

    /// Builder: add one parameter.
    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

impl From<Operation> for Command {
    fn from(op: Operation) -> Self {
        Self::new(op.as_str())
    }
}

/// Typed result of a dispatched operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "result", rename_all = "snake_case")]
pub enum OperationOutput {
    CreateTask(CreateTaskResponse),
    AssignTask(AssignTaskResponse),
    ListTasks(TaskListResponse),
    ReviewTask(ReviewTaskResponse),
    GetAgentStatus(AgentStatusResponse),
    ListMyTasks(TaskListResponse),
    WorkOnTask(TaskUpdate),
    CompleteTask(CompleteTaskResponse),
    GetStatus(WorkerStatusResponse),
    ListCompletedTasks(TaskListResponse),
    TestTask(TaskUpdate),
    SubmitTestResults(SubmitTestResultsResponse),
}

impl OperationOutput {
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::CreateTask(_) => Operation::CreateTask,
            Self::AssignTask(_) => Operation::AssignTask,
            Self::ListTasks(_) => Operation::ListTasks,
            Self::ReviewTask(_) => Operation::ReviewTask,
            Self::GetAgentStatus(_) => Operation::GetAgentStatus,
            Self::ListMyTasks(_) => Operation::ListMyTasks,
            Self::WorkOnTask(_) => Operation::WorkOnTask,
            Self::CompleteTask(_) => Operation::CompleteTask,
            Self::GetStatus(_) => Operation::GetStatus,
            Self::ListCompletedTasks(_) => Operation::ListCompletedTasks,
            Self::TestTask(_) => Operation::TestTask,
            Self::SubmitTestResults(_) => Operation::SubmitTestResults,
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> Server messages
// ---------------------------------------------------------------------------

/// Messages sent by a caller to the coordinator socket.
///
/// All variants are JSON-serialized as `{"type": "<snake_case_variant>", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Run a structured command as `worker`.
    Invoke {
        #[serde(default)]
        request_id: Option<u64>,
        worker: String,
        command: Command,
    },
    /// Free text, resolved through the keyword translator. When `worker`
    /// is omitted the role is inferred and its first worker is used.
    Say {
        #[serde(default)]
        request_id: Option<u64>,
        #[serde(default)]
        worker: Option<String>,
        text: String,
    },
    /// Run a rebalance pass now.
    Rebalance {
        #[serde(default)]
        request_id: Option<u64>,
    },
    Ping,
}

// ---------------------------------------------------------------------------
// Server -> Client messages
// ---------------------------------------------------------------------------

/// Messages sent by the coordinator back to a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ok {
        request_id: Option<u64>,
        worker: String,
        output: OperationOutput,
    },
    Error {
        request_id: Option<u64>,
        kind: ErrorKind,
        detail: String,
    },
    Rebalanced {
        request_id: Option<u64>,
        report: RebalanceReport,
    },
    Pong,
}

impl ServerMessage {
    /// Builds an error reply from an error body.
    #[must_use]
    pub fn error(request_id: Option<u64>, body: ErrorBody) -> Self {
        Self::Error {
            request_id,
            kind: body.kind,
            detail: body.detail,
        }
    }
}

// ---------------------------------------------------------------------------
// Encode / Decode helpers (JSON lines)
// ---------------------------------------------------------------------------

/// Serializes a value to a JSON line (JSON + trailing newline).
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if serialization fails.
pub fn encode_line<T: Serialize>(value: &T) -> Result<String, ProtocolError> {
    let mut json = serde_json::to_string(value)?;
    json.push('\n');
    Ok(json)
}

/// Deserializes a JSON line into a value. Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if deserialization fails.
pub fn decode_line<T: for<'de> Deserialize<'de>>(line: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(line.trim())?)
}
