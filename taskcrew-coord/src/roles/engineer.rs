//! Engineer role: works assigned tasks to completion.

use std::sync::Arc;

use taskcrew_proto::error::OpError;
use taskcrew_proto::load::WorkerRole;
use taskcrew_proto::ops::{
    CompleteTaskRequest, CompleteTaskResponse, TaskListResponse, TaskRef, TaskUpdate,
    WorkerStatusResponse,
};
use taskcrew_proto::task::TaskStatus;

use super::{Seat, require_holder, require_status};
use crate::state::SharedState;

const WORKING_NOTE: &str = "Working on implementation.";
const COMPLETED_NOTE: &str = "Task implementation completed.";

#[derive(Clone)]
pub struct Engineer {
    seat: Seat,
}

impl Engineer {
    pub fn new(id: impl Into<String>, state: Arc<SharedState>) -> Self {
        Self {
            seat: Seat::new(id, state),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.seat.id
    }

    /// Every task currently assigned to this engineer.
    #[must_use]
    pub fn list_my_tasks(&self) -> TaskListResponse {
        TaskListResponse {
            tasks: self.seat.summaries(|t| t.is_assigned_to(&self.seat.id)),
        }
    }

    /// Logs progress on an in-progress task.
    ///
    /// # Errors
    ///
    /// [`OpError::TaskNotFound`], [`OpError::NotAssignee`], or
    /// [`OpError::InvalidState`] unless the task is in progress.
    pub fn work_on_task(&self, req: &TaskRef) -> Result<TaskUpdate, OpError> {
        let _gate = self.seat.state.operation();
        let handle = self.seat.task(&req.task_id)?;
        let mut task = handle.lock();
        require_holder(&task, &self.seat.id)?;
        require_status(&task, TaskStatus::InProgress, "worked on")?;
        task.push_comment(&self.seat.id, WORKING_NOTE);
        tracing::debug!(task_id = %task.id, engineer = %self.seat.id, "working on task");
        Ok(TaskUpdate::from(&*task))
    }

    /// Marks an in-progress task completed. The engineer keeps holding it
    /// until a tester claims it.
    ///
    /// # Errors
    ///
    /// Same guards as [`work_on_task`](Self::work_on_task).
    pub fn complete_task(&self, req: CompleteTaskRequest) -> Result<CompleteTaskResponse, OpError> {
        let _gate = self.seat.state.operation();
        let handle = self.seat.task(&req.task_id)?;
        let mut task = handle.lock();
        require_holder(&task, &self.seat.id)?;
        require_status(&task, TaskStatus::InProgress, "completed")?;

        task.status = TaskStatus::Completed;
        let note = req
            .comment
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| COMPLETED_NOTE.to_string());
        task.push_comment(&self.seat.id, note);
        drop(task);

        let available_testers = self.seat.state.registry.available(WorkerRole::Tester);
        tracing::info!(
            task_id = %req.task_id,
            engineer = %self.seat.id,
            testers = available_testers.len(),
            "task completed"
        );
        Ok(CompleteTaskResponse {
            task_id: req.task_id,
            status: TaskStatus::Completed,
            available_testers,
        })
    }

    /// # Errors
    ///
    /// [`OpError::WorkerNotFound`] if this engineer has no load record.
    pub fn get_status(&self) -> Result<WorkerStatusResponse, OpError> {
        self.seat.status()
    }
}
