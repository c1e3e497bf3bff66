//! Keyword fallback translator.
//!
//! Turns free text such as `assign task TASK-1A2B3C4D to Engineer2` into a
//! [`Command`]. Matching is plain substring search on the lowercased text;
//! double-quoted segments carry titles, descriptions, comments and notes.
//! Anything not recognised degrades to defaults.

use taskcrew_proto::command::{Command, Operation};
use taskcrew_proto::load::WorkerRole;
use taskcrew_proto::task::{TaskId, TaskPriority, TaskStatus, TaskType};

const MANAGER_PHRASES: &[&str] = &[
    "create task",
    "assign task",
    "list tasks",
    "review task",
    "agent status",
];
const ENGINEER_PHRASES: &[&str] = &["my tasks", "work on", "complete task", "engineer status"];
const TESTER_PHRASES: &[&str] = &["completed tasks", "test task", "submit test", "tester status"];

const REJECT_WORDS: &[&str] = &["reject", "rejected", "fail", "failed"];
const FAIL_WORDS: &[&str] = &["fail", "failed", "failing"];

const UNTITLED: &str = "Untitled task";
const NO_DESCRIPTION: &str = "No description provided";

/// Guesses which role free text is addressed to. Defaults to the manager.
#[must_use]
pub fn infer_role(text: &str) -> WorkerRole {
    let lower = text.to_lowercase();
    let mentions = |phrases: &[&str]| phrases.iter().any(|p| lower.contains(p));
    if mentions(MANAGER_PHRASES) {
        WorkerRole::Manager
    } else if mentions(ENGINEER_PHRASES) {
        WorkerRole::Engineer
    } else if mentions(TESTER_PHRASES) {
        WorkerRole::Tester
    } else {
        WorkerRole::Manager
    }
}

/// Translates free text for a worker of `role`.
///
/// `known_workers` are matched by name for explicit assignment. Returns
/// `None` when no keyword for the role matches.
#[must_use]
pub fn translate(role: WorkerRole, text: &str, known_workers: &[&str]) -> Option<Command> {
    let lower = text.to_lowercase();
    let has = |phrase: &str| lower.contains(phrase);
    let quoted = quoted_segments(text);

    let command = match role {
        WorkerRole::Manager => {
            if has("create task") {
                create_task(&lower, &quoted)
            } else if has("assign task") {
                let mut cmd = with_task_id(Operation::AssignTask, text);
                if let Some(agent) = known_workers
                    .iter()
                    .find(|w| lower.contains(&w.to_lowercase()))
                {
                    cmd = cmd.with_param("agent_id", *agent);
                }
                cmd
            } else if has("list tasks") {
                let mut cmd = Command::from(Operation::ListTasks);
                if let Some(status) = status_mentioned(&lower) {
                    cmd = cmd.with_param("status", status.as_str());
                }
                cmd
            } else if has("review task") {
                let approve = !any_word(&lower, REJECT_WORDS);
                with_quoted(
                    with_task_id(Operation::ReviewTask, text).with_param("approve", approve),
                    "comment",
                    &quoted,
                )
            } else if has("agent status") {
                Command::from(Operation::GetAgentStatus)
            } else {
                return None;
            }
        }
        WorkerRole::Engineer => {
            if has("my tasks") {
                Command::from(Operation::ListMyTasks)
            } else if has("work on") {
                with_task_id(Operation::WorkOnTask, text)
            } else if has("complete task") {
                with_quoted(with_task_id(Operation::CompleteTask, text), "comment", &quoted)
            } else if has("status") {
                Command::from(Operation::GetStatus)
            } else {
                return None;
            }
        }
        WorkerRole::Tester => {
            if has("completed tasks") {
                Command::from(Operation::ListCompletedTasks)
            } else if has("test task") {
                with_task_id(Operation::TestTask, text)
            } else if has("my tasks") {
                Command::from(Operation::ListMyTasks)
            } else if has("submit test results") {
                let passed = !any_word(&lower, FAIL_WORDS);
                with_quoted(
                    with_task_id(Operation::SubmitTestResults, text).with_param("passed", passed),
                    "notes",
                    &quoted,
                )
            } else if has("status") {
                Command::from(Operation::GetStatus)
            } else {
                return None;
            }
        }
    };
    tracing::debug!(role = %role, operation = %command.operation, "translated free text");
    Some(command)
}

fn create_task(lower: &str, quoted: &[&str]) -> Command {
    let title = quoted.first().copied().unwrap_or(UNTITLED);
    let description = quoted.get(1).copied().unwrap_or(NO_DESCRIPTION);
    let priority = TaskPriority::ALL
        .into_iter()
        .find(|p| lower.contains(p.as_str()))
        .unwrap_or_default();
    let task_type = TaskType::ALL
        .into_iter()
        .find(|t| lower.contains(t.as_str()))
        .unwrap_or_default();
    Command::from(Operation::CreateTask)
        .with_param("title", title)
        .with_param("description", description)
        .with_param("priority", priority.as_str())
        .with_param("task_type", task_type.as_str())
}

/// Segments between pairs of double quotes, in order.
fn quoted_segments(text: &str) -> Vec<&str> {
    text.split('"').skip(1).step_by(2).collect()
}

/// First `task-xxxxxxxx` token, normalised to uppercase.
fn find_task_id(text: &str) -> Option<TaskId> {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-'))
        .find_map(|word| word.parse().ok())
}

fn with_task_id(op: Operation, text: &str) -> Command {
    let cmd = Command::from(op);
    match find_task_id(text) {
        Some(id) => cmd.with_param("task_id", id.as_str()),
        None => cmd,
    }
}

fn with_quoted(cmd: Command, key: &str, quoted: &[&str]) -> Command {
    match quoted.first() {
        Some(text) => cmd.with_param(key, *text),
        None => cmd,
    }
}

fn status_mentioned(lower: &str) -> Option<TaskStatus> {
    TaskStatus::ALL.into_iter().find(|s| {
        let name = s.as_str();
        lower.contains(name) || lower.contains(&name.replace('_', " "))
    })
}

fn any_word(lower: &str, words: &[&str]) -> bool {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| words.contains(&w))
}
