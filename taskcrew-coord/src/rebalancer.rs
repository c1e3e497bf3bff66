//! Load rebalancing.
//!
//! [`rebalance_pass`] recomputes every counter from the task store and
//! moves in-progress work off overloaded engineers.
//! [`spawn_rebalancer`] runs passes on a fixed interval until shut down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use taskcrew_proto::load::{WorkerLoad, WorkerRole};
use taskcrew_proto::ops::{LoadCorrection, Reassignment, RebalanceReport};
use taskcrew_proto::task::TaskStatus;
use tokio::sync::watch;

use crate::coordinator::Coordinator;
use crate::state::SharedState;
use crate::store::TaskHandle;

/// Author recorded on rebalancer audit comments.
pub const COORDINATOR_AUTHOR: &str = "coordinator";

/// Load percentage above which an engineer sheds work.
pub const OVERLOAD_THRESHOLD: f64 = 80.0;

/// Load percentage below which an engineer can receive work.
pub const UNDERLOAD_THRESHOLD: f64 = 50.0;

/// Longest accepted time between periodic passes (one week).
pub const MAX_REBALANCE_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Runs one rebalance pass with exclusive access to the shared state.
pub fn rebalance_pass(state: &SharedState) -> RebalanceReport {
    let _gate = state.exclusive();
    let tasks = state.store.handles();
    let mut loads = state.registry.all();

    let corrections = resync(&tasks, &mut loads);
    let moves = shed_overload(&tasks, &mut loads);

    state.registry.replace_all(loads);
    RebalanceReport { moves, corrections }
}

/// Sets every counter to the number of tasks naming that worker.
fn resync(tasks: &[TaskHandle], loads: &mut [WorkerLoad]) -> Vec<LoadCorrection> {
    let mut actual: HashMap<String, u32> = HashMap::new();
    for handle in tasks {
        let task = handle.lock();
        let Some(worker) = &task.assigned_to else {
            continue;
        };
        if loads.iter().any(|l| &l.worker_id == worker) {
            *actual.entry(worker.clone()).or_default() += 1;
        } else {
            tracing::warn!(task_id = %task.id, worker = %worker, "task held by unknown worker, skipped");
        }
    }

    let mut corrections = Vec::new();
    for load in loads.iter_mut() {
        let count = actual.get(&load.worker_id).copied().unwrap_or(0);
        if load.current_tasks != count {
            tracing::warn!(
                worker = %load.worker_id,
                recorded = load.current_tasks,
                actual = count,
                "load counter corrected"
            );
            corrections.push(LoadCorrection {
                worker_id: load.worker_id.clone(),
                recorded: load.current_tasks,
                actual: count,
            });
            load.current_tasks = count;
        }
    }
    corrections
}

fn is_overloaded(load: &WorkerLoad) -> bool {
    load.role == WorkerRole::Engineer && load.load_percentage() > OVERLOAD_THRESHOLD
}

fn is_underloaded(load: &WorkerLoad) -> bool {
    load.role == WorkerRole::Engineer
        && load.max_capacity > 0
        && load.load_percentage() < UNDERLOAD_THRESHOLD
}

fn shed_overload(tasks: &[TaskHandle], loads: &mut [WorkerLoad]) -> Vec<Reassignment> {
    let mut moves = Vec::new();
    for over in 0..loads.len() {
        while is_overloaded(&loads[over]) {
            let Some(under) = loads.iter().position(is_underloaded) else {
                break;
            };
            let from = loads[over].worker_id.clone();
            let to = loads[under].worker_id.clone();

            let Some(handle) = tasks.iter().find(|h| {
                let task = h.lock();
                task.is_assigned_to(&from)
                    && task.status == TaskStatus::InProgress
                    && task.dependencies.is_empty()
            }) else {
                break;
            };

            let mut task = handle.lock();
            task.assigned_to = Some(to.clone());
            task.push_comment(
                COORDINATOR_AUTHOR,
                format!("Task reassigned from {from} to {to} for load balancing."),
            );
            tracing::info!(task_id = %task.id, from = %from, to = %to, "task reassigned");
            moves.push(Reassignment {
                task_id: task.id.clone(),
                from,
                to,
            });
            drop(task);

            loads[over].current_tasks = loads[over].current_tasks.saturating_sub(1);
            loads[under].current_tasks += 1;
        }
    }
    moves
}

/// Spawns the periodic rebalance loop.
///
/// The first pass runs one full `interval` after spawning. Intervals above
/// [`MAX_REBALANCE_INTERVAL`] are clamped to it. The loop exits at its next
/// wake-up once `shutdown` turns `true` or its sender is dropped.
pub fn spawn_rebalancer(
    coordinator: Arc<Coordinator>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let interval = interval.min(MAX_REBALANCE_INTERVAL);
    tokio::spawn(async move {
        let now = tokio::time::Instant::now();
        let start = now.checked_add(interval).unwrap_or(now);
        let mut tick = tokio::time::interval_at(start, interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let report = coordinator.rebalance();
                    if !report.is_noop() {
                        tracing::info!(
                            moves = report.moves.len(),
                            corrections = report.corrections.len(),
                            "rebalance pass changed state"
                        );
                    }
                    coordinator.log_loads();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("rebalancer stopping");
                        return;
                    }
                }
            }
        }
    })
}
