//! Task model for `taskcrew`.
//!
//! A [`Task`] is one unit of work moving through the lifecycle
//! `pending → in_progress → completed → testing → approved`, with a
//! rejection looping back to `pending`. The coordinator owns every task;
//! this module only defines the record and its value types.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix shared by every task identifier.
pub const TASK_ID_PREFIX: &str = "TASK-";

/// Number of characters in the token following [`TASK_ID_PREFIX`].
pub const TASK_ID_TOKEN_LEN: usize = 8;

/// Error returned when a string cannot be parsed into one of the task enums
/// or into a [`TaskId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseError {
    /// What was being parsed (e.g. `"priority"`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl ParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Unique task identifier of the form `TASK-XXXXXXXX`.
///
/// The token is eight uppercase hex characters taken from a random
/// UUID. Uniqueness within a store is enforced by the store, which
/// re-mints on collision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Mints a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        let token: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(TASK_ID_TOKEN_LEN)
            .collect();
        Self(format!("{TASK_ID_PREFIX}{}", token.to_ascii_uppercase()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TaskId {
    type Err = ParseError;

    /// Parses `TASK-xxxxxxxx` case-insensitively, normalising to uppercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let Some(token) = upper.strip_prefix(TASK_ID_PREFIX) else {
            return Err(ParseError::new("task id", s));
        };
        if token.len() != TASK_ID_TOKEN_LEN || !token.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ParseError::new("task id", s));
        }
        Ok(Self(upper))
    }
}

impl TryFrom<String> for TaskId {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created or re-queued after rejection; nobody holds it.
    Pending,
    /// Assigned to an engineer who is working on it.
    InProgress,
    /// Implementation finished; the engineer still holds it.
    Completed,
    /// Claimed by a tester.
    Testing,
    /// Accepted by the manager. Terminal.
    Approved,
}

impl TaskStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Testing,
        Self::Approved,
    ];

    /// Returns the snake-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Testing => "testing",
            Self::Approved => "approved",
        }
    }

    /// Whether a task in this status must have an assignee.
    #[must_use]
    pub const fn is_held(self) -> bool {
        matches!(self, Self::InProgress | Self::Completed | Self::Testing)
    }

    /// Whether the manager may review a task in this status.
    #[must_use]
    pub const fn is_reviewable(self) -> bool {
        matches!(self, Self::Completed | Self::Testing)
    }
}

impl FromStr for TaskStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == needle)
            .ok_or_else(|| ParseError::new("status", s))
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    /// All priorities, lowest first.
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// Returns the snake-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == needle)
            .ok_or_else(|| ParseError::new("priority", s))
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Feature,
    Bug,
    Improvement,
    Documentation,
}

impl TaskType {
    pub const ALL: [Self; 4] = [
        Self::Feature,
        Self::Bug,
        Self::Improvement,
        Self::Documentation,
    ];

    /// Returns the snake-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Bug => "bug",
            Self::Improvement => "improvement",
            Self::Documentation => "documentation",
        }
    }
}

impl FromStr for TaskType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| ParseError::new("task type", s))
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a task's append-only comment log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub at: DateTime<Utc>,
    /// Worker id, or `coordinator` for rebalancer audit entries.
    pub author: String,
    pub text: String,
}

impl std::fmt::Display for Comment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.at.format("%Y-%m-%d %H:%M:%S"),
            self.author,
            self.text
        )
    }
}

/// Outcome of a test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
}

impl TestOutcome {
    #[must_use]
    pub const fn from_passed(passed: bool) -> Self {
        if passed { Self::Passed } else { Self::Failed }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test record attached by the tester holding the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub tester: String,
    pub at: DateTime<Utc>,
    pub status: TestOutcome,
    pub notes: String,
}

/// A unit of trackable work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub task_type: TaskType,
    /// Worker currently holding the task. `Some` exactly in held statuses.
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comments: Vec<Comment>,
    /// Tasks that must finish first. The rebalancer never moves a task
    /// with a non-empty set.
    pub dependencies: BTreeSet<TaskId>,
    pub test_results: Option<TestResult>,
}

impl Task {
    /// Creates a pending, unassigned task.
    pub fn new(
        id: TaskId,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: TaskPriority,
        task_type: TaskType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            priority,
            task_type,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            comments: Vec::new(),
            dependencies: BTreeSet::new(),
            test_results: None,
        }
    }

    /// Builder: set dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }

    /// Appends a comment and refreshes `updated_at`.
    pub fn push_comment(&mut self, author: &str, text: impl Into<String>) {
        let now = Utc::now();
        self.comments.push(Comment {
            at: now,
            author: author.to_string(),
            text: text.into(),
        });
        self.updated_at = now;
    }

    /// Refreshes `updated_at` without logging a comment.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether `worker` currently holds this task.
    #[must_use]
    pub fn is_assigned_to(&self, worker: &str) -> bool {
        self.assigned_to.as_deref() == Some(worker)
    }

    /// Checks the held-state invariant: an assignee is present exactly
    /// when the status is a held one.
    #[must_use]
    pub const fn assignment_consistent(&self) -> bool {
        self.assigned_to.is_some() == self.status.is_held()
    }
}
