//! Typed request and response objects for every worker operation.
//!
//! Requests deserialize from the `parameters` object of a
//! [`Command`](crate::command::Command); responses serialize into the
//! `result` of a [`ServerMessage::Ok`](crate::command::ServerMessage::Ok).

use serde::{Deserialize, Serialize};

use crate::load::{WorkerLoad, WorkerRole};
use crate::task::{Task, TaskId, TaskPriority, TaskStatus, TaskType, TestResult};

// ---------------------------------------------------------------------------
// Shared summaries
// ---------------------------------------------------------------------------

/// Listing view of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub task_type: TaskType,
    pub assigned_to: Option<String>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            status: task.status,
            priority: task.priority,
            task_type: task.task_type,
            assigned_to: task.assigned_to.clone(),
        }
    }
}

/// Status view of a worker's load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerLoadSummary {
    pub worker_id: String,
    pub role: WorkerRole,
    pub current_tasks: u32,
    pub max_capacity: u32,
    pub load_percentage: f64,
    pub available_capacity: u32,
}

impl From<&WorkerLoad> for WorkerLoadSummary {
    fn from(load: &WorkerLoad) -> Self {
        Self {
            worker_id: load.worker_id.clone(),
            role: load.role,
            current_tasks: load.current_tasks,
            max_capacity: load.max_capacity,
            load_percentage: load.load_percentage(),
            available_capacity: load.available_capacity(),
        }
    }
}

/// A list of task summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskSummary>,
}

/// Request naming a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub task_id: TaskId,
}

impl TaskRef {
    #[must_use]
    pub const fn new(task_id: TaskId) -> Self {
        Self { task_id }
    }
}

/// Result of a transition that only changes status and/or holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub assigned_to: Option<String>,
}

impl From<&Task> for TaskUpdate {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            status: task.status,
            assigned_to: task.assigned_to.clone(),
        }
    }
}

/// Engineer or tester self-status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatusResponse {
    pub load: WorkerLoadSummary,
    /// Tasks the worker currently holds.
    pub tasks: Vec<TaskSummary>,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// `create_task` parameters.
///
/// `priority` and `task_type` are free strings: unrecognised values fall
/// back to medium / feature instead of failing the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
}

impl CreateTaskRequest {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            priority: None,
            task_type: None,
            dependencies: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<TaskId>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub task_type: TaskType,
}

/// `assign_task` parameters. Omitting `agent_id` auto-picks the
/// least-loaded engineer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignTaskRequest {
    pub task_id: TaskId,
    #[serde(default)]
    pub agent_id: Option<String>,
}

impl AssignTaskRequest {
    #[must_use]
    pub const fn auto(task_id: TaskId) -> Self {
        Self {
            task_id,
            agent_id: None,
        }
    }

    pub fn to(task_id: TaskId, agent_id: impl Into<String>) -> Self {
        Self {
            task_id,
            agent_id: Some(agent_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignTaskResponse {
    pub task_id: TaskId,
    pub assigned_to: String,
}

/// `list_tasks` parameters. An unparseable status is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTasksRequest {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewTaskRequest {
    pub task_id: TaskId,
    pub approve: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

/// The manager's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewTaskResponse {
    pub task_id: TaskId,
    pub decision: ReviewDecision,
    pub new_status: TaskStatus,
    /// Worker whose load was released by the review, if any.
    pub released: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatusResponse {
    pub agents: Vec<WorkerLoadSummary>,
}

// ---------------------------------------------------------------------------
// Engineer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteTaskRequest {
    pub task_id: TaskId,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteTaskResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// Testers with spare capacity at completion time.
    pub available_testers: Vec<String>,
}

// ---------------------------------------------------------------------------
// Tester
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitTestResultsRequest {
    pub task_id: TaskId,
    pub passed: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitTestResultsResponse {
    pub task_id: TaskId,
    /// Always `testing`: the manager's review is a separate step.
    pub status: TaskStatus,
    pub test_results: TestResult,
}

// ---------------------------------------------------------------------------
// Rebalancing
// ---------------------------------------------------------------------------

/// One task moved by a rebalance pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub task_id: TaskId,
    pub from: String,
    pub to: String,
}

/// A counter the resync step found out of step with the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadCorrection {
    pub worker_id: String,
    pub recorded: u32,
    pub actual: u32,
}

/// Outcome of one rebalance pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceReport {
    pub moves: Vec<Reassignment>,
    pub corrections: Vec<LoadCorrection>,
}

impl RebalanceReport {
    /// Whether the pass changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.moves.is_empty() && self.corrections.is_empty()
    }
}
