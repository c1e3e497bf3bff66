//! Property-based serialization tests.
//!
//! Uses proptest to verify:
//! 1. Any valid `Snapshot` survives encode → decode round-trip.
//! 2. Random bytes never cause a panic in `decode` (returns `Err` gracefully).
//! 3. A snapshot with a foreign version tag is rejected.
//! 4. Task ids parse case-insensitively and survive JSON.
//! 5. Client messages survive the JSON-lines helpers, and arbitrary lines
//!    never panic `decode_line`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use taskcrew_proto::codec::{self, CodecError, SNAPSHOT_VERSION, Snapshot};
use taskcrew_proto::command::{ClientMessage, Command, Operation, decode_line, encode_line};
use taskcrew_proto::load::{WorkerLoad, WorkerRole};
use taskcrew_proto::task::{
    Comment, Task, TaskId, TaskPriority, TaskStatus, TaskType, TestOutcome, TestResult,
};

// --- Arbitrary implementations for protocol types ---

/// Strategy for generating arbitrary `TaskId` values.
fn arb_task_id() -> impl Strategy<Value = TaskId> {
    "[0-9A-Fa-f]{8}".prop_map(|token| format!("task-{token}").parse().unwrap())
}

/// Strategy for generating timestamps with whole-second precision.
fn arb_time() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_000_000_000).prop_map(|secs| DateTime::from_timestamp(secs, 0).unwrap())
}

fn arb_worker() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("ProjectManager".to_string()),
        (1u8..4).prop_map(|n| format!("Engineer{n}")),
        (1u8..3).prop_map(|n| format!("Tester{n}")),
    ]
}

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::ALL.to_vec())
}

fn arb_comment() -> impl Strategy<Value = Comment> {
    (arb_time(), arb_worker(), ".{0,64}").prop_map(|(at, author, text)| Comment {
        at,
        author,
        text,
    })
}

fn arb_test_result() -> impl Strategy<Value = TestResult> {
    (arb_worker(), arb_time(), any::<bool>(), ".{0,64}").prop_map(
        |(tester, at, passed, notes)| TestResult {
            tester,
            at,
            status: TestOutcome::from_passed(passed),
            notes,
        },
    )
}

/// Strategy for generating tasks whose holder matches their status.
fn arb_task() -> impl Strategy<Value = Task> {
    (
        arb_task_id(),
        ".{1,40}",
        ".{0,120}",
        arb_status(),
        prop::sample::select(TaskPriority::ALL.to_vec()),
        prop::sample::select(TaskType::ALL.to_vec()),
        arb_worker(),
        prop::collection::vec(arb_comment(), 0..5),
        prop::collection::btree_set(arb_task_id(), 0..3),
        proptest::option::of(arb_test_result()),
    )
        .prop_map(
            |(id, title, description, status, priority, task_type, worker, comments, deps, results)| {
                let mut task = Task::new(id, title, description, priority, task_type)
                    .with_dependencies(deps);
                task.status = status;
                task.assigned_to = status.is_held().then_some(worker);
                task.comments = comments;
                task.test_results = results;
                task
            },
        )
}

fn arb_load() -> impl Strategy<Value = WorkerLoad> {
    (
        arb_worker(),
        prop::sample::select(WorkerRole::ALL.to_vec()),
        0u32..20,
        0u32..20,
    )
        .prop_map(|(id, role, max, current)| {
            WorkerLoad::new(id, role, max).with_current(current.min(max))
        })
}

fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
    (
        prop::collection::vec(arb_task(), 0..8),
        prop::collection::vec(arb_load(), 0..6),
    )
        .prop_map(|(tasks, loads)| Snapshot::new(tasks, loads))
}

fn arb_client_message() -> impl Strategy<Value = ClientMessage> {
    prop_oneof![
        Just(ClientMessage::Ping),
        proptest::option::of(any::<u64>())
            .prop_map(|request_id| ClientMessage::Rebalance { request_id }),
        (
            proptest::option::of(any::<u64>()),
            proptest::option::of(arb_worker()),
            ".{0,80}"
        )
            .prop_map(|(request_id, worker, text)| ClientMessage::Say {
                request_id,
                worker,
                text
            }),
        (
            proptest::option::of(any::<u64>()),
            arb_worker(),
            prop::sample::select(Operation::ALL.to_vec()),
            arb_task_id(),
        )
            .prop_map(|(request_id, worker, op, id)| ClientMessage::Invoke {
                request_id,
                worker,
                command: Command::from(op).with_param("task_id", id.as_str()),
            }),
    ]
}

// --- Property tests ---

proptest! {
    /// Any valid snapshot survives an encode → decode round-trip.
    #[test]
    fn snapshot_roundtrip(snapshot in arb_snapshot()) {
        let bytes = codec::encode(&snapshot).unwrap();
        let decoded = codec::decode(&bytes).unwrap();
        prop_assert_eq!(snapshot, decoded);
    }

    /// Random bytes never cause a panic in decode.
    #[test]
    fn random_bytes_never_panic_decode(bytes in prop::collection::vec(any::<u8>(), 0..1024)) {
        let _ = codec::decode(&bytes);
    }

    /// Snapshots tagged with any other version are refused.
    #[test]
    fn foreign_version_rejected(version in any::<u16>().prop_filter("not current", |v| *v != SNAPSHOT_VERSION)) {
        let mut snapshot = Snapshot::new(Vec::new(), Vec::new());
        snapshot.version = version;
        let bytes = codec::encode(&snapshot).unwrap();
        let err = codec::decode(&bytes).unwrap_err();
        prop_assert!(matches!(err, CodecError::UnsupportedVersion { found } if found == version), "expected UnsupportedVersion {{ found: {} }}, got {:?}", version, err);
    }

    /// Task ids normalise to uppercase and survive JSON.
    #[test]
    fn task_id_parse_is_case_insensitive(token in "[0-9a-fA-F]{8}") {
        let lower: TaskId = format!("task-{}", token.to_ascii_lowercase()).parse().unwrap();
        let upper: TaskId = format!("TASK-{}", token.to_ascii_uppercase()).parse().unwrap();
        prop_assert_eq!(&lower, &upper);
        let json = serde_json::to_string(&lower).unwrap();
        let back: TaskId = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, upper);
    }

    /// Strings of the wrong shape never parse as task ids.
    #[test]
    fn malformed_task_ids_rejected(s in "[^-]{0,20}") {
        prop_assert!(s.parse::<TaskId>().is_err());
    }

    /// Client messages survive the JSON-lines helpers.
    #[test]
    fn client_message_line_roundtrip(msg in arb_client_message()) {
        let line = encode_line(&msg).unwrap();
        prop_assert!(line.ends_with('\n'));
        prop_assert_eq!(line.matches('\n').count(), 1);
        let decoded: ClientMessage = decode_line(&line).unwrap();
        prop_assert_eq!(msg, decoded);
    }

    /// Arbitrary text never panics the line decoder.
    #[test]
    fn arbitrary_lines_never_panic(line in ".{0,256}") {
        let _ = decode_line::<ClientMessage>(&line);
    }
}
