//! Manager role: creates, assigns and reviews tasks.

use std::str::FromStr;
use std::sync::Arc;

use taskcrew_proto::error::OpError;
use taskcrew_proto::load::WorkerRole;
use taskcrew_proto::ops::{
    AgentStatusResponse, AssignTaskRequest, AssignTaskResponse, CreateTaskRequest,
    CreateTaskResponse, ListTasksRequest, ReviewDecision, ReviewTaskRequest, ReviewTaskResponse,
    TaskListResponse, WorkerLoadSummary,
};
use taskcrew_proto::task::{Task, TaskPriority, TaskStatus, TaskType};

use super::{Seat, require_status};
use crate::state::SharedState;

/// The crew's manager.
#[derive(Clone)]
pub struct Manager {
    seat: Seat,
}

impl Manager {
    pub fn new(id: impl Into<String>, state: Arc<SharedState>) -> Self {
        Self {
            seat: Seat::new(id, state),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.seat.id
    }

    /// Creates a pending task.
    ///
    /// Unrecognised priority or type strings fall back to the defaults.
    ///
    /// # Errors
    ///
    /// [`OpError::Validation`] for a blank title, [`OpError::TaskNotFound`]
    /// for an unknown dependency.
    pub fn create_task(&self, req: CreateTaskRequest) -> Result<CreateTaskResponse, OpError> {
        let title = req.title.trim();
        if title.is_empty() {
            return Err(OpError::Validation("task title must not be empty".into()));
        }
        let priority = parse_or_default::<TaskPriority>(req.priority.as_deref());
        let task_type = parse_or_default::<TaskType>(req.task_type.as_deref());

        let _gate = self.seat.state.operation();
        let store = &self.seat.state.store;
        if let Some(missing) = req.dependencies.iter().find(|dep| !store.contains(dep)) {
            return Err(OpError::TaskNotFound(missing.clone()));
        }

        let task_id = store.create(|id| {
            Task::new(id, title, req.description, priority, task_type)
                .with_dependencies(req.dependencies)
        });
        tracing::info!(
            task_id = %task_id,
            manager = %self.seat.id,
            priority = %priority,
            task_type = %task_type,
            "task created"
        );
        Ok(CreateTaskResponse {
            task_id,
            status: TaskStatus::Pending,
            priority,
            task_type,
        })
    }

    /// Assigns a pending task to an engineer, named or auto-picked.
    /// A blank `agent_id` counts as omitted.
    ///
    /// # Errors
    ///
    /// [`OpError::TaskNotFound`], [`OpError::InvalidState`] unless the task
    /// is pending, and the registry's errors for the engineer choice.
    pub fn assign_task(&self, req: AssignTaskRequest) -> Result<AssignTaskResponse, OpError> {
        let _gate = self.seat.state.operation();
        let handle = self.seat.task(&req.task_id)?;
        let mut task = handle.lock();
        require_status(&task, TaskStatus::Pending, "assigned")?;

        let registry = &self.seat.state.registry;
        let engineer = match req.agent_id.filter(|a| !a.trim().is_empty()) {
            Some(agent) => {
                registry.reserve(&agent, WorkerRole::Engineer)?;
                agent
            }
            None => registry.reserve_least_loaded(WorkerRole::Engineer)?,
        };

        task.status = TaskStatus::InProgress;
        task.assigned_to = Some(engineer.clone());
        task.push_comment(&self.seat.id, format!("Assigned to {engineer}."));
        drop(task);

        tracing::info!(task_id = %req.task_id, engineer = %engineer, "task assigned");
        Ok(AssignTaskResponse {
            task_id: req.task_id,
            assigned_to: engineer,
        })
    }

    /// Lists tasks in creation order, optionally filtered by status.
    #[must_use]
    pub fn list_tasks(&self, req: &ListTasksRequest) -> TaskListResponse {
        let filter = req.status.as_deref().and_then(|raw| {
            TaskStatus::from_str(raw)
                .inspect_err(|e| tracing::warn!(error = %e, "ignoring status filter"))
                .ok()
        });
        TaskListResponse {
            tasks: self
                .seat
                .summaries(|t| filter.is_none_or(|status| t.status == status)),
        }
    }

    /// Approves or rejects a completed or testing task.
    ///
    /// Either way the worker holding the task at this moment is released
    /// once and the assignment cleared. Rejection sends the task back to
    /// pending.
    ///
    /// # Errors
    ///
    /// [`OpError::TaskNotFound`], or [`OpError::InvalidState`] when the
    /// task is not reviewable.
    pub fn review_task(&self, req: ReviewTaskRequest) -> Result<ReviewTaskResponse, OpError> {
        let _gate = self.seat.state.operation();
        let handle = self.seat.task(&req.task_id)?;
        let mut task = handle.lock();
        if !task.status.is_reviewable() {
            return Err(OpError::InvalidState {
                task_id: task.id.clone(),
                status: task.status,
                action: "reviewed",
            });
        }

        let (decision, new_status) = if req.approve {
            (ReviewDecision::Approved, TaskStatus::Approved)
        } else {
            (ReviewDecision::Rejected, TaskStatus::Pending)
        };
        let released = task.assigned_to.take();
        if let Some(holder) = &released {
            self.seat.state.registry.release(holder);
        }
        task.status = new_status;
        match req.comment.filter(|c| !c.trim().is_empty()) {
            Some(comment) => task.push_comment(&self.seat.id, comment),
            None => task.touch(),
        }
        drop(task);

        tracing::info!(
            task_id = %req.task_id,
            decision = ?decision,
            released = ?released,
            "task reviewed"
        );
        Ok(ReviewTaskResponse {
            task_id: req.task_id,
            decision,
            new_status,
            released,
        })
    }

    /// Load of every worker in registration order.
    #[must_use]
    pub fn get_agent_status(&self) -> AgentStatusResponse {
        let _gate = self.seat.state.operation();
        AgentStatusResponse {
            agents: self
                .seat
                .state
                .registry
                .all()
                .iter()
                .map(WorkerLoadSummary::from)
                .collect(),
        }
    }
}

fn parse_or_default<T>(raw: Option<&str>) -> T
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return T::default();
    };
    raw.parse().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to default");
        T::default()
    })
}
