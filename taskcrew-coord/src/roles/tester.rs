//! Tester role: claims completed tasks and records test outcomes.

use std::sync::Arc;

use chrono::Utc;
use taskcrew_proto::error::OpError;
use taskcrew_proto::ops::{
    SubmitTestResultsRequest, SubmitTestResultsResponse, TaskListResponse, TaskRef, TaskUpdate,
    WorkerStatusResponse,
};
use taskcrew_proto::task::{TaskStatus, TestOutcome, TestResult};

use super::{Seat, require_holder, require_status};
use crate::state::SharedState;

const STARTED_NOTE: &str = "Starting testing process.";

#[derive(Clone)]
pub struct Tester {
    seat: Seat,
}

impl Tester {
    pub fn new(id: impl Into<String>, state: Arc<SharedState>) -> Self {
        Self {
            seat: Seat::new(id, state),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.seat.id
    }

    /// Tasks waiting for a tester.
    #[must_use]
    pub fn list_completed_tasks(&self) -> TaskListResponse {
        TaskListResponse {
            tasks: self.seat.summaries(|t| t.status == TaskStatus::Completed),
        }
    }

    /// Tasks this tester is currently testing.
    #[must_use]
    pub fn list_my_tasks(&self) -> TaskListResponse {
        TaskListResponse {
            tasks: self
                .seat
                .summaries(|t| t.status == TaskStatus::Testing && t.is_assigned_to(&self.seat.id)),
        }
    }

    /// Claims a completed task. The engineer's load moves to this tester.
    ///
    /// # Errors
    ///
    /// [`OpError::TaskNotFound`], [`OpError::InvalidState`] unless the task
    /// is completed, [`OpError::CapacityExceeded`] if this tester is full.
    pub fn test_task(&self, req: &TaskRef) -> Result<TaskUpdate, OpError> {
        let _gate = self.seat.state.operation();
        let handle = self.seat.task(&req.task_id)?;
        let mut task = handle.lock();
        require_status(&task, TaskStatus::Completed, "tested")?;

        self.seat
            .state
            .registry
            .hand_over(task.assigned_to.as_deref(), &self.seat.id)?;
        let previous = task.assigned_to.replace(self.seat.id.clone());
        task.status = TaskStatus::Testing;
        task.push_comment(&self.seat.id, STARTED_NOTE);

        tracing::info!(
            task_id = %task.id,
            tester = %self.seat.id,
            previous = ?previous,
            "testing started"
        );
        Ok(TaskUpdate::from(&*task))
    }

    /// Attaches a test result. The task stays in testing until the
    /// manager reviews it.
    ///
    /// # Errors
    ///
    /// [`OpError::TaskNotFound`], [`OpError::NotAssignee`], or
    /// [`OpError::InvalidState`] unless the task is in testing.
    pub fn submit_test_results(
        &self,
        req: SubmitTestResultsRequest,
    ) -> Result<SubmitTestResultsResponse, OpError> {
        let _gate = self.seat.state.operation();
        let handle = self.seat.task(&req.task_id)?;
        let mut task = handle.lock();
        require_holder(&task, &self.seat.id)?;
        require_status(&task, TaskStatus::Testing, "given test results")?;

        let outcome = TestOutcome::from_passed(req.passed);
        let notes = req
            .notes
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Test {outcome} by {}", self.seat.id));
        let result = TestResult {
            tester: self.seat.id.clone(),
            at: Utc::now(),
            status: outcome,
            notes,
        };
        task.test_results = Some(result.clone());
        task.push_comment(
            &self.seat.id,
            format!("Testing completed - {}", outcome.as_str().to_ascii_uppercase()),
        );
        drop(task);

        tracing::info!(
            task_id = %req.task_id,
            tester = %self.seat.id,
            outcome = %outcome,
            "test results submitted"
        );
        Ok(SubmitTestResultsResponse {
            task_id: req.task_id,
            status: TaskStatus::Testing,
            test_results: result,
        })
    }

    /// # Errors
    ///
    /// [`OpError::WorkerNotFound`] if this tester has no load record.
    pub fn get_status(&self) -> Result<WorkerStatusResponse, OpError> {
        self.seat.status()
    }
}
