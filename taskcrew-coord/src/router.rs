//! Command router.
//!
//! Resolves `(worker_id, Command)` to a role method: the worker is looked
//! up, the operation is checked against that role's table, and the
//! parameters are deserialized into the typed request.

use serde::de::DeserializeOwned;
use taskcrew_proto::command::{Command, Operation, OperationOutput};
use taskcrew_proto::error::OpError;

use crate::coordinator::Coordinator;
use crate::roles::Worker;

/// Dispatches one command as `worker_id`.
///
/// # Errors
///
/// [`OpError::WorkerNotFound`] for an unknown worker,
/// [`OpError::UnsupportedOperation`] when the role lacks the operation,
/// [`OpError::Validation`] for malformed parameters, and whatever the
/// role method returns.
pub fn route(
    coordinator: &Coordinator,
    worker_id: &str,
    command: &Command,
) -> Result<OperationOutput, OpError> {
    let worker = coordinator
        .worker(worker_id)
        .ok_or_else(|| OpError::WorkerNotFound(worker_id.to_string()))?;
    let unsupported = || OpError::UnsupportedOperation {
        role: worker.role(),
        operation: command.operation.clone(),
    };
    let op: Operation = command.operation.parse().map_err(|_| unsupported())?;
    if !op.supported_by(worker.role()) {
        return Err(unsupported());
    }
    tracing::debug!(worker = %worker_id, operation = %op, "routing command");

    let p = &command.parameters;
    match (worker, op) {
        (Worker::Manager(m), Operation::CreateTask) => {
            m.create_task(params(op, p)?).map(OperationOutput::CreateTask)
        }
        (Worker::Manager(m), Operation::AssignTask) => {
            m.assign_task(params(op, p)?).map(OperationOutput::AssignTask)
        }
        (Worker::Manager(m), Operation::ListTasks) => {
            Ok(OperationOutput::ListTasks(m.list_tasks(&params(op, p)?)))
        }
        (Worker::Manager(m), Operation::ReviewTask) => {
            m.review_task(params(op, p)?).map(OperationOutput::ReviewTask)
        }
        (Worker::Manager(m), Operation::GetAgentStatus) => {
            Ok(OperationOutput::GetAgentStatus(m.get_agent_status()))
        }
        (Worker::Engineer(e), Operation::ListMyTasks) => {
            Ok(OperationOutput::ListMyTasks(e.list_my_tasks()))
        }
        (Worker::Engineer(e), Operation::WorkOnTask) => {
            e.work_on_task(&params(op, p)?).map(OperationOutput::WorkOnTask)
        }
        (Worker::Engineer(e), Operation::CompleteTask) => {
            e.complete_task(params(op, p)?).map(OperationOutput::CompleteTask)
        }
        (Worker::Engineer(e), Operation::GetStatus) => {
            e.get_status().map(OperationOutput::GetStatus)
        }
        (Worker::Tester(t), Operation::ListCompletedTasks) => {
            Ok(OperationOutput::ListCompletedTasks(t.list_completed_tasks()))
        }
        (Worker::Tester(t), Operation::ListMyTasks) => {
            Ok(OperationOutput::ListMyTasks(t.list_my_tasks()))
        }
        (Worker::Tester(t), Operation::TestTask) => {
            t.test_task(&params(op, p)?).map(OperationOutput::TestTask)
        }
        (Worker::Tester(t), Operation::SubmitTestResults) => {
            t.submit_test_results(params(op, p)?)
                .map(OperationOutput::SubmitTestResults)
        }
        (Worker::Tester(t), Operation::GetStatus) => {
            t.get_status().map(OperationOutput::GetStatus)
        }
        _ => Err(unsupported()),
    }
}

fn params<T: DeserializeOwned>(
    op: Operation,
    parameters: &serde_json::Map<String, serde_json::Value>,
) -> Result<T, OpError> {
    serde_json::from_value(serde_json::Value::Object(parameters.clone()))
        .map_err(|e| OpError::Validation(format!("invalid parameters for {op}: {e}")))
}
