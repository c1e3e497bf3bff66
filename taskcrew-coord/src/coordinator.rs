//! Crew wiring.
//!
//! The [`Coordinator`] builds the shared state, registers one load record
//! per worker and hands out worker handles. It also exposes the
//! whole-state operations: rebalancing, snapshots and restores.

use std::collections::HashMap;
use std::sync::Arc;

use taskcrew_proto::codec::Snapshot;
use taskcrew_proto::error::OpError;
use taskcrew_proto::load::{WorkerLoad, WorkerRole};
use taskcrew_proto::ops::{AssignTaskRequest, AssignTaskResponse, CreateTaskRequest, RebalanceReport};
use taskcrew_proto::task::{Task, TaskId, TaskStatus};

use crate::rebalancer;
use crate::registry::LoadRegistry;
use crate::roles::{Engineer, Manager, Tester, Worker};
use crate::state::SharedState;
use crate::store::StoreError;

/// Id of the crew's single manager.
pub const MANAGER_ID: &str = "ProjectManager";

/// Shape and capacities of the crew.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrewConfig {
    pub manager_capacity: u32,
    pub engineer_capacity: u32,
    pub tester_capacity: u32,
    pub engineers: usize,
    pub testers: usize,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            manager_capacity: 10,
            engineer_capacity: 5,
            tester_capacity: 3,
            engineers: 3,
            testers: 2,
        }
    }
}

impl CrewConfig {
    /// Worker ids with their roles and capacities, in registration order.
    #[must_use]
    pub fn roster(&self) -> Vec<WorkerLoad> {
        let mut loads = vec![WorkerLoad::new(
            MANAGER_ID,
            WorkerRole::Manager,
            self.manager_capacity,
        )];
        loads.extend((1..=self.engineers).map(|n| {
            WorkerLoad::new(format!("Engineer{n}"), WorkerRole::Engineer, self.engineer_capacity)
        }));
        loads.extend((1..=self.testers).map(|n| {
            WorkerLoad::new(format!("Tester{n}"), WorkerRole::Tester, self.tester_capacity)
        }));
        loads
    }
}

/// Errors raised when restoring a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A task names a worker this crew does not have.
    #[error("task {task_id} is held by unknown worker {worker}")]
    UnknownWorker { task_id: TaskId, worker: String },

    /// A task's holder does not match its status.
    #[error("task {task_id} is {status} but its assignment says otherwise")]
    InconsistentAssignment { task_id: TaskId, status: TaskStatus },

    /// A task is held by a worker whose role cannot hold it in that status.
    #[error("task {task_id} is {status} and cannot be held by {role} {worker}")]
    WrongHolderRole {
        task_id: TaskId,
        status: TaskStatus,
        worker: String,
        role: WorkerRole,
    },
}

/// Owner of the shared state and every worker handle.
pub struct Coordinator {
    state: Arc<SharedState>,
    manager: Manager,
    workers: Vec<Worker>,
    crew: CrewConfig,
}

impl Coordinator {
    /// Builds a crew with idle load records.
    #[must_use]
    pub fn new(crew: CrewConfig) -> Self {
        let roster = crew.roster();
        let state = Arc::new(SharedState::new(LoadRegistry::new(roster.clone())));
        let manager = Manager::new(MANAGER_ID, Arc::clone(&state));
        let workers = roster
            .iter()
            .map(|load| {
                let state = Arc::clone(&state);
                match load.role {
                    WorkerRole::Manager => Worker::Manager(manager.clone()),
                    WorkerRole::Engineer => Worker::Engineer(Engineer::new(&load.worker_id, state)),
                    WorkerRole::Tester => Worker::Tester(Tester::new(&load.worker_id, state)),
                }
            })
            .collect();
        tracing::info!(
            engineers = crew.engineers,
            testers = crew.testers,
            "crew registered"
        );
        Self {
            state,
            manager,
            workers,
            crew,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    #[must_use]
    pub const fn manager(&self) -> &Manager {
        &self.manager
    }

    /// Every worker in registration order.
    #[must_use]
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    #[must_use]
    pub fn worker(&self, worker_id: &str) -> Option<&Worker> {
        self.workers.iter().find(|w| w.id() == worker_id)
    }

    /// First registered worker of a role.
    #[must_use]
    pub fn first_of(&self, role: WorkerRole) -> Option<&Worker> {
        self.workers.iter().find(|w| w.role() == role)
    }

    /// Assigns a pending task to the least loaded engineer.
    ///
    /// # Errors
    ///
    /// Same as [`Manager::assign_task`] without an explicit engineer.
    pub fn assign(&self, task_id: TaskId) -> Result<AssignTaskResponse, OpError> {
        self.manager.assign_task(AssignTaskRequest::auto(task_id))
    }

    /// Runs one rebalance pass now.
    pub fn rebalance(&self) -> RebalanceReport {
        rebalancer::rebalance_pass(&self.state)
    }

    /// Logs every worker's load at info level.
    pub fn log_loads(&self) {
        for load in self.state.registry.all() {
            tracing::info!(
                worker = %load.worker_id,
                current = load.current_tasks,
                max = load.max_capacity,
                load_pct = load.load_percentage(),
                "worker load"
            );
        }
    }

    /// Consistent copy of every task and load record.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let _gate = self.state.exclusive();
        Snapshot::new(self.state.store.snapshot(), self.state.registry.all())
    }

    /// Replaces all tasks with the snapshot's.
    ///
    /// Capacities come from this crew, not the snapshot, and counters are
    /// recomputed from the restored tasks.
    ///
    /// # Errors
    ///
    /// [`RestoreError`] if task ids repeat, a task is held by a worker
    /// outside this crew, or a holder does not fit the task's status.
    /// Nothing changes on error.
    pub fn restore(&self, snapshot: Snapshot) -> Result<(), RestoreError> {
        let roles: HashMap<&str, WorkerRole> =
            self.workers.iter().map(|w| (w.id(), w.role())).collect();
        for task in &snapshot.tasks {
            check_restored(task, &roles)?;
        }

        let mut loads = self.crew.roster();
        for load in &mut loads {
            load.current_tasks = u32::try_from(
                snapshot
                    .tasks
                    .iter()
                    .filter(|t| t.is_assigned_to(&load.worker_id))
                    .count(),
            )
            .unwrap_or(u32::MAX);
        }

        let count = snapshot.tasks.len();
        let _gate = self.state.exclusive();
        self.state.store.replace_all(snapshot.tasks)?;
        self.state.registry.replace_all(loads);
        tracing::info!(tasks = count, "snapshot restored");
        Ok(())
    }

    /// Creates the demo tasks through the manager.
    ///
    /// # Errors
    ///
    /// Propagates any [`OpError`] from task creation.
    pub fn seed_demo(&self) -> Result<Vec<TaskId>, OpError> {
        let demo = [
            (
                "Implement user authentication feature",
                "Create a secure authentication system for user login with JWT",
                "high",
            ),
            (
                "Fix pagination bug in search results",
                "The pagination links on search results page are not working correctly",
                "medium",
            ),
            (
                "Add product sorting functionality",
                "Implement sorting of products by price, rating, and newest",
                "low",
            ),
        ];
        let ids = demo
            .into_iter()
            .map(|(title, description, priority)| {
                self.manager
                    .create_task(CreateTaskRequest::new(title, description).with_priority(priority))
                    .map(|resp| resp.task_id)
            })
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(count = ids.len(), "demo tasks seeded");
        Ok(ids)
    }
}

/// Holder checks for one restored task.
fn check_restored(task: &Task, roles: &HashMap<&str, WorkerRole>) -> Result<(), RestoreError> {
    if !task.assignment_consistent() {
        return Err(RestoreError::InconsistentAssignment {
            task_id: task.id.clone(),
            status: task.status,
        });
    }
    let Some(worker) = task.assigned_to.as_deref() else {
        return Ok(());
    };
    let Some(&role) = roles.get(worker) else {
        return Err(RestoreError::UnknownWorker {
            task_id: task.id.clone(),
            worker: worker.to_string(),
        });
    };
    let expected = if task.status == TaskStatus::Testing {
        WorkerRole::Tester
    } else {
        WorkerRole::Engineer
    };
    if role != expected {
        return Err(RestoreError::WrongHolderRole {
            task_id: task.id.clone(),
            status: task.status,
            worker: worker.to_string(),
            role,
        });
    }
    Ok(())
}
