//! Worker roles.
//!
//! Each role is a thin handle: a worker id plus the shared state. All
//! lifecycle rules live in the role methods; the router only picks which
//! one to call.

pub mod engineer;
pub mod manager;
pub mod tester;

use std::sync::Arc;

use taskcrew_proto::error::OpError;
use taskcrew_proto::load::WorkerRole;
use taskcrew_proto::ops::{TaskSummary, WorkerLoadSummary, WorkerStatusResponse};
use taskcrew_proto::task::{Task, TaskId, TaskStatus};

pub use engineer::Engineer;
pub use manager::Manager;
pub use tester::Tester;

use crate::state::SharedState;
use crate::store::TaskHandle;

/// Any worker in the crew.
#[derive(Clone)]
pub enum Worker {
    Manager(Manager),
    Engineer(Engineer),
    Tester(Tester),
}

impl Worker {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Manager(m) => m.id(),
            Self::Engineer(e) => e.id(),
            Self::Tester(t) => t.id(),
        }
    }

    #[must_use]
    pub const fn role(&self) -> WorkerRole {
        match self {
            Self::Manager(_) => WorkerRole::Manager,
            Self::Engineer(_) => WorkerRole::Engineer,
            Self::Tester(_) => WorkerRole::Tester,
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id())
            .field("role", &self.role())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helpers shared by the roles
// ---------------------------------------------------------------------------

/// Identity and shared state common to every role.
#[derive(Clone)]
pub(crate) struct Seat {
    pub(crate) id: String,
    pub(crate) state: Arc<SharedState>,
}

impl Seat {
    pub(crate) fn new(id: impl Into<String>, state: Arc<SharedState>) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }

    pub(crate) fn task(&self, task_id: &TaskId) -> Result<TaskHandle, OpError> {
        self.state
            .store
            .get(task_id)
            .ok_or_else(|| OpError::TaskNotFound(task_id.clone()))
    }

    /// Own load record plus the tasks this worker holds.
    pub(crate) fn status(&self) -> Result<WorkerStatusResponse, OpError> {
        let _gate = self.state.operation();
        let load = self
            .state
            .registry
            .get(&self.id)
            .ok_or_else(|| OpError::WorkerNotFound(self.id.clone()))?;
        Ok(WorkerStatusResponse {
            load: WorkerLoadSummary::from(&load),
            tasks: self.state.store.summaries(|t| t.is_assigned_to(&self.id)),
        })
    }

    pub(crate) fn summaries(&self, pred: impl Fn(&Task) -> bool) -> Vec<TaskSummary> {
        let _gate = self.state.operation();
        self.state.store.summaries(pred)
    }
}

pub(crate) fn require_holder(task: &Task, worker: &str) -> Result<(), OpError> {
    if task.is_assigned_to(worker) {
        Ok(())
    } else {
        Err(OpError::NotAssignee {
            task_id: task.id.clone(),
            worker: worker.to_string(),
        })
    }
}

pub(crate) fn require_status(
    task: &Task,
    expected: TaskStatus,
    action: &'static str,
) -> Result<(), OpError> {
    if task.status == expected {
        Ok(())
    } else {
        Err(OpError::InvalidState {
            task_id: task.id.clone(),
            status: task.status,
            action,
        })
    }
}
