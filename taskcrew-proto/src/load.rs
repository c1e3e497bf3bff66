//! Worker roles and capacity accounting.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::task::ParseError;

/// Role a worker plays in the crew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    Manager,
    Engineer,
    Tester,
}

impl WorkerRole {
    pub const ALL: [Self; 3] = [Self::Manager, Self::Engineer, Self::Tester];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Engineer => "engineer",
            Self::Tester => "tester",
        }
    }
}

impl FromStr for WorkerRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == needle)
            .ok_or_else(|| ParseError {
                kind: "role",
                value: s.to_string(),
            })
    }
}

impl std::fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacity accounting for one worker.
///
/// For engineers and testers `current_tasks` mirrors the number of tasks
/// whose `assigned_to` names this worker. Operations keep it in step
/// incrementally and every rebalance pass recomputes it from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerLoad {
    pub worker_id: String,
    pub role: WorkerRole,
    pub current_tasks: u32,
    pub max_capacity: u32,
}

impl WorkerLoad {
    /// Creates an idle load record.
    pub fn new(worker_id: impl Into<String>, role: WorkerRole, max_capacity: u32) -> Self {
        Self {
            worker_id: worker_id.into(),
            role,
            current_tasks: 0,
            max_capacity,
        }
    }

    /// Builder: set the current task count.
    #[must_use]
    pub const fn with_current(mut self, current_tasks: u32) -> Self {
        self.current_tasks = current_tasks;
        self
    }

    /// Percentage of capacity in use, in `[0, 100]`.
    ///
    /// Defined as `0.0` when `max_capacity` is zero.
    #[must_use]
    pub fn load_percentage(&self) -> f64 {
        if self.max_capacity == 0 {
            return 0.0;
        }
        (f64::from(self.current_tasks) / f64::from(self.max_capacity) * 100.0).clamp(0.0, 100.0)
    }

    /// Number of further tasks this worker can take.
    #[must_use]
    pub const fn available_capacity(&self) -> u32 {
        self.max_capacity.saturating_sub(self.current_tasks)
    }

    /// Whether the worker can take at least one more task.
    #[must_use]
    pub const fn has_capacity(&self) -> bool {
        self.available_capacity() > 0
    }
}
