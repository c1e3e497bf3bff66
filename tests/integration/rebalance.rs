//! Integration tests for load rebalancing.
//!
//! Covers the on-demand pass through the coordinator and the periodic
//! loop started by `spawn_rebalancer`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use taskcrew_coord::coordinator::{Coordinator, CrewConfig};
use taskcrew_coord::rebalancer::{COORDINATOR_AUTHOR, spawn_rebalancer};
use taskcrew_coord::roles::Worker;
use taskcrew_proto::ops::{AssignTaskRequest, CompleteTaskRequest, CreateTaskRequest};
use taskcrew_proto::task::{TaskId, TaskStatus, TaskType};
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn create(coord: &Coordinator, title: &str) -> TaskId {
    coord
        .manager()
        .create_task(CreateTaskRequest::new(title, ""))
        .unwrap()
        .task_id
}

/// Creates `count` tasks and assigns each to `engineer`.
fn give(coord: &Coordinator, engineer: &str, count: usize) -> Vec<TaskId> {
    (0..count)
        .map(|n| {
            let id = create(coord, &format!("{engineer} task {n}"));
            coord
                .manager()
                .assign_task(AssignTaskRequest::to(id.clone(), engineer))
                .unwrap();
            id
        })
        .collect()
}

fn load(coord: &Coordinator, worker: &str) -> u32 {
    coord.state().registry.get(worker).unwrap().current_tasks
}

fn holder(coord: &Coordinator, id: &TaskId) -> Option<String> {
    coord.state().store.get(id).unwrap().lock().assigned_to.clone()
}

// ===========================================================================
// On-demand passes
// ===========================================================================

#[test]
fn overloaded_engineer_sheds_to_first_underloaded() {
    let coord = Coordinator::new(CrewConfig::default());
    let e1_tasks = give(&coord, "Engineer1", 5);
    give(&coord, "Engineer2", 1);

    let report = coord.rebalance();
    assert!(report.corrections.is_empty());
    assert_eq!(report.moves.len(), 1);
    let moved = &report.moves[0];
    assert_eq!(moved.from, "Engineer1");
    assert_eq!(moved.to, "Engineer2");
    assert_eq!(moved.task_id, e1_tasks[0]);

    assert_eq!(load(&coord, "Engineer1"), 4);
    assert_eq!(load(&coord, "Engineer2"), 2);
    assert_eq!(load(&coord, "Engineer3"), 0);
    assert_eq!(holder(&coord, &e1_tasks[0]).as_deref(), Some("Engineer2"));

    let task = coord.state().store.get(&e1_tasks[0]).unwrap().lock().clone();
    let audit = task.comments.last().unwrap();
    assert_eq!(audit.author, COORDINATOR_AUTHOR);
    assert_eq!(
        audit.text,
        "Task reassigned from Engineer1 to Engineer2 for load balancing."
    );
    assert_eq!(task.status, TaskStatus::InProgress);
}

#[test]
fn sheds_until_at_or_below_threshold() {
    let coord = Coordinator::new(CrewConfig {
        engineer_capacity: 10,
        engineers: 2,
        ..CrewConfig::default()
    });
    give(&coord, "Engineer1", 10);

    let report = coord.rebalance();
    assert_eq!(report.moves.len(), 2);
    assert_eq!(load(&coord, "Engineer1"), 8);
    assert_eq!(load(&coord, "Engineer2"), 2);
}

#[test]
fn completed_tasks_are_not_moved() {
    let coord = Coordinator::new(CrewConfig::default());
    let ids = give(&coord, "Engineer1", 5);
    let Some(Worker::Engineer(e1)) = coord.worker("Engineer1") else {
        panic!("Engineer1 missing");
    };
    for id in &ids {
        e1.complete_task(CompleteTaskRequest {
            task_id: id.clone(),
            comment: None,
        })
        .unwrap();
    }

    let report = coord.rebalance();
    assert!(report.is_noop());
    assert_eq!(load(&coord, "Engineer1"), 5);
}

#[test]
fn tasks_with_dependencies_stay_put() {
    let coord = Coordinator::new(CrewConfig::default());
    let parent = create(&coord, "parent");
    let children: Vec<TaskId> = (0..5)
        .map(|n| {
            let id = coord
                .manager()
                .create_task(
                    CreateTaskRequest::new(format!("child {n}"), "")
                        .with_dependencies(vec![parent.clone()]),
                )
                .unwrap()
                .task_id;
            coord
                .manager()
                .assign_task(AssignTaskRequest::to(id.clone(), "Engineer1"))
                .unwrap();
            id
        })
        .collect();

    let report = coord.rebalance();
    assert!(report.moves.is_empty());
    for id in &children {
        assert_eq!(holder(&coord, id).as_deref(), Some("Engineer1"));
    }
}

#[test]
fn dependent_tasks_are_skipped_in_favour_of_independent_ones() {
    let coord = Coordinator::new(CrewConfig::default());
    let parent = create(&coord, "parent");
    let dependent: Vec<TaskId> = (0..2)
        .map(|n| {
            let id = coord
                .manager()
                .create_task(
                    CreateTaskRequest::new(format!("dependent {n}"), "")
                        .with_dependencies(vec![parent.clone()]),
                )
                .unwrap()
                .task_id;
            coord
                .manager()
                .assign_task(AssignTaskRequest::to(id.clone(), "Engineer1"))
                .unwrap();
            id
        })
        .collect();
    let independent = give(&coord, "Engineer1", 3);
    give(&coord, "Engineer2", 1);
    assert_eq!(load(&coord, "Engineer1"), 5);

    let report = coord.rebalance();
    assert_eq!(report.moves.len(), 1);
    assert_eq!(report.moves[0].task_id, independent[0]);
    assert_eq!(report.moves[0].to, "Engineer2");
    assert_eq!(load(&coord, "Engineer1"), 4);
    assert_eq!(load(&coord, "Engineer2"), 2);
    for id in &dependent {
        assert_eq!(holder(&coord, id).as_deref(), Some("Engineer1"));
    }
}

#[test]
fn auto_assignment_prefers_lower_load() {
    let coord = Coordinator::new(CrewConfig {
        engineers: 2,
        ..CrewConfig::default()
    });
    give(&coord, "Engineer2", 3);

    let t1 = coord
        .manager()
        .create_task(CreateTaskRequest::new("Fix bug", "").with_type("bug"))
        .unwrap();
    assert_eq!(t1.status, TaskStatus::Pending);
    assert_eq!(t1.task_type, TaskType::Bug);

    let resp = coord
        .manager()
        .assign_task(AssignTaskRequest::auto(t1.task_id.clone()))
        .unwrap();
    assert_eq!(resp.assigned_to, "Engineer1");
    assert_eq!(load(&coord, "Engineer1"), 1);
    assert_eq!(load(&coord, "Engineer2"), 3);
}

#[test]
fn no_move_when_every_engineer_is_busy() {
    let coord = Coordinator::new(CrewConfig {
        engineers: 2,
        ..CrewConfig::default()
    });
    give(&coord, "Engineer1", 5);
    give(&coord, "Engineer2", 3);

    let report = coord.rebalance();
    assert!(report.moves.is_empty());
    assert_eq!(load(&coord, "Engineer1"), 5);
}

#[test]
fn drifted_counters_are_corrected_first() {
    let coord = Coordinator::new(CrewConfig::default());
    give(&coord, "Engineer2", 2);

    let mut loads = coord.state().registry.all();
    for l in &mut loads {
        if l.worker_id == "Engineer2" {
            l.current_tasks = 5;
        }
        if l.worker_id == "Tester1" {
            l.current_tasks = 1;
        }
    }
    coord.state().registry.replace_all(loads);

    let report = coord.rebalance();
    assert!(report.moves.is_empty());
    assert_eq!(report.corrections.len(), 2);
    let e2 = report
        .corrections
        .iter()
        .find(|c| c.worker_id == "Engineer2")
        .unwrap();
    assert_eq!((e2.recorded, e2.actual), (5, 2));
    assert_eq!(load(&coord, "Engineer2"), 2);
    assert_eq!(load(&coord, "Tester1"), 0);
}

#[test]
fn repeated_pass_is_noop() {
    let coord = Coordinator::new(CrewConfig::default());
    give(&coord, "Engineer1", 5);
    assert!(!coord.rebalance().is_noop());
    assert!(coord.rebalance().is_noop());
}

// ===========================================================================
// Periodic loop
// ===========================================================================

#[tokio::test]
async fn periodic_loop_rebalances_and_stops_on_shutdown() {
    let coord = Arc::new(Coordinator::new(CrewConfig::default()));
    give(&coord, "Engineer1", 5);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = spawn_rebalancer(Arc::clone(&coord), Duration::from_millis(20), shutdown_rx);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while load(&coord, "Engineer1") == 5 {
        assert!(tokio::time::Instant::now() < deadline, "rebalancer never ran");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(load(&coord, "Engineer1"), 4);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("rebalancer did not stop")
        .unwrap();
}

#[tokio::test]
async fn dropping_sender_stops_loop() {
    let coord = Arc::new(Coordinator::new(CrewConfig::default()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = spawn_rebalancer(coord, Duration::from_secs(3600), shutdown_rx);
    drop(shutdown_tx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("rebalancer did not stop")
        .unwrap();
}

#[tokio::test]
async fn huge_interval_does_not_kill_loop() {
    let coord = Arc::new(Coordinator::new(CrewConfig::default()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = spawn_rebalancer(coord, Duration::from_secs(u64::MAX), shutdown_rx);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!handle.is_finished(), "rebalancer exited early");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("rebalancer did not stop")
        .unwrap();
}
