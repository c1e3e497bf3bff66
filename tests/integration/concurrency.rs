//! Concurrency tests: role operations racing from many threads.
//!
//! Every test ends by checking that each task's holder matches its
//! status and that every load counter equals the number of tasks naming
//! that worker.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use taskcrew_coord::coordinator::{Coordinator, CrewConfig};
use taskcrew_coord::roles::{Engineer, Tester, Worker};
use taskcrew_proto::error::ErrorKind;
use taskcrew_proto::ops::{
    CompleteTaskRequest, CreateTaskRequest, ReviewTaskRequest, SubmitTestResultsRequest, TaskRef,
};
use taskcrew_proto::task::{TaskId, TaskStatus};

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

fn engineers(coord: &Coordinator) -> Vec<Engineer> {
    coord
        .workers()
        .iter()
        .filter_map(|w| match w {
            Worker::Engineer(e) => Some(e.clone()),
            _ => None,
        })
        .collect()
}

fn testers(coord: &Coordinator) -> Vec<Tester> {
    coord
        .workers()
        .iter()
        .filter_map(|w| match w {
            Worker::Tester(t) => Some(t.clone()),
            _ => None,
        })
        .collect()
}

fn assert_consistent(coord: &Coordinator) {
    let tasks = coord.state().store.snapshot();
    for t in &tasks {
        assert!(t.assignment_consistent(), "inconsistent task {t:?}");
    }
    for l in coord.state().registry.all() {
        let held = tasks.iter().filter(|t| t.is_assigned_to(&l.worker_id)).count();
        assert_eq!(l.current_tasks as usize, held, "counter drift on {}", l.worker_id);
        assert!(l.current_tasks <= l.max_capacity, "{} over capacity", l.worker_id);
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn concurrent_creation_yields_unique_ids() {
    let coord = Coordinator::new(CrewConfig::default());
    let ids: Vec<TaskId> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let coord = &coord;
                s.spawn(move || {
                    (0..25)
                        .map(|i| create(coord, &format!("t{n}-{i}")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });
    let unique: HashSet<&TaskId> = ids.iter().collect();
    assert_eq!(unique.len(), 200);
    assert_eq!(coord.state().store.len(), 200);
}

#[test]
fn racing_assignments_of_one_task_succeed_once() {
    let coord = Coordinator::new(CrewConfig::default());
    let id = create(&coord, "contested");
    let wins = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| match coord.assign(id.clone()) {
                Ok(_) => {
                    wins.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => assert_eq!(e.kind(), ErrorKind::InvalidState),
            });
        }
    });

    assert_eq!(wins.load(Ordering::SeqCst), 1);
    assert_consistent(&coord);
}

#[test]
fn racing_testers_claim_once() {
    let coord = Coordinator::new(CrewConfig::default());
    let id = create(&coord, "claim me");
    coord.assign(id.clone()).unwrap();
    engineers(&coord)[0]
        .complete_task(CompleteTaskRequest {
            task_id: id.clone(),
            comment: None,
        })
        .unwrap();

    let testers = testers(&coord);
    let wins = AtomicUsize::new(0);
    thread::scope(|s| {
        for t in &testers {
            for _ in 0..4 {
                let (id, wins) = (&id, &wins);
                s.spawn(move || {
                    if t.test_task(&TaskRef::new(id.clone())).is_ok() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        }
    });

    assert_eq!(wins.load(Ordering::SeqCst), 1);
    let task = coord.state().store.get(&id).unwrap().lock().clone();
    assert_eq!(task.status, TaskStatus::Testing);
    assert_consistent(&coord);
}

#[test]
fn auto_assignment_never_exceeds_capacity() {
    let coord = Coordinator::new(CrewConfig::default());
    let ids: Vec<TaskId> = (0..30).map(|n| create(&coord, &format!("t{n}"))).collect();
    let assigned = AtomicUsize::new(0);

    thread::scope(|s| {
        for chunk in ids.chunks(5) {
            let coord = &coord;
            let assigned = &assigned;
            s.spawn(move || {
                for id in chunk {
                    match coord.assign(id.clone()) {
                        Ok(_) => {
                            assigned.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => assert_eq!(e.kind(), ErrorKind::CapacityExceeded),
                    }
                }
            });
        }
    });

    // Three engineers at five each.
    assert_eq!(assigned.load(Ordering::SeqCst), 15);
    assert_consistent(&coord);
}

#[test]
fn full_pipelines_alongside_rebalancing() {
    let coord = Coordinator::new(CrewConfig {
        tester_capacity: 10,
        ..CrewConfig::default()
    });
    let ids: Vec<TaskId> = (0..12).map(|n| create(&coord, &format!("t{n}"))).collect();
    let engineers = engineers(&coord);
    let testers = testers(&coord);

    thread::scope(|s| {
        for (n, chunk) in ids.chunks(3).enumerate() {
            let coord = &coord;
            let engineers = &engineers;
            let tester = &testers[n % testers.len()];
            s.spawn(move || {
                for id in chunk {
                    let Ok(resp) = coord.assign(id.clone()) else {
                        continue;
                    };
                    // The rebalancer may move the task before we touch it.
                    let Some(eng) = engineers.iter().find(|e| e.id() == resp.assigned_to) else {
                        continue;
                    };
                    if eng
                        .complete_task(CompleteTaskRequest {
                            task_id: id.clone(),
                            comment: None,
                        })
                        .is_err()
                    {
                        continue;
                    }
                    if tester.test_task(&TaskRef::new(id.clone())).is_err() {
                        continue;
                    }
                    tester
                        .submit_test_results(SubmitTestResultsRequest {
                            task_id: id.clone(),
                            passed: true,
                            notes: None,
                        })
                        .unwrap();
                    coord
                        .manager()
                        .review_task(ReviewTaskRequest {
                            task_id: id.clone(),
                            approve: true,
                            comment: None,
                        })
                        .unwrap();
                }
            });
        }
        s.spawn(|| {
            for _ in 0..50 {
                let report = coord.rebalance();
                assert!(report.corrections.is_empty(), "{report:?}");
                thread::yield_now();
            }
        });
    });

    assert_consistent(&coord);
    assert!(coord.rebalance().corrections.is_empty());
}
