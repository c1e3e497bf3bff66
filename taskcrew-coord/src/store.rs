//! In-memory task store.
//!
//! The [`TaskStore`] maps task ids to individually locked task records and
//! remembers insertion order so listings are stable. The outer lock is held
//! only for lookup and insert; all mutation of a task happens under that
//! task's own mutex, so operations on different tasks do not contend here.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use taskcrew_proto::ops::TaskSummary;
use taskcrew_proto::task::{Task, TaskId};

/// Shared handle to one task record.
pub type TaskHandle = Arc<Mutex<Task>>;

/// Errors raised when bulk-loading tasks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Two tasks in the input share an id.
    #[error("duplicate task id {0}")]
    DuplicateId(TaskId),
}

#[derive(Default)]
struct StoreInner {
    order: Vec<TaskId>,
    tasks: HashMap<TaskId, TaskHandle>,
}

/// Task records keyed by id, in creation order.
#[derive(Default)]
pub struct TaskStore {
    inner: RwLock<StoreInner>,
}

impl TaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a fresh id, builds the task with it and inserts it.
    pub fn create(&self, build: impl FnOnce(TaskId) -> Task) -> TaskId {
        self.create_with(TaskId::generate, build)
    }

    /// Like [`create`](Self::create) with a caller-supplied id source.
    ///
    /// Ids already present in the store are discarded and `mint` is asked
    /// again.
    pub fn create_with(
        &self,
        mut mint: impl FnMut() -> TaskId,
        build: impl FnOnce(TaskId) -> Task,
    ) -> TaskId {
        let mut inner = self.inner.write();
        let id = loop {
            let candidate = mint();
            if !inner.tasks.contains_key(&candidate) {
                break candidate;
            }
            tracing::debug!(task_id = %candidate, "task id collision, minting again");
        };
        let task = build(id.clone());
        inner.order.push(id.clone());
        inner.tasks.insert(id.clone(), Arc::new(Mutex::new(task)));
        drop(inner);
        id
    }

    /// Returns the handle for a task, if present.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<TaskHandle> {
        self.inner.read().tasks.get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.inner.read().tasks.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All task handles in creation order.
    ///
    /// The store lock is released before returning; callers lock each
    /// task themselves.
    #[must_use]
    pub fn handles(&self) -> Vec<TaskHandle> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect()
    }

    /// Summaries of every task matching `pred`, in creation order.
    pub fn summaries(&self, pred: impl Fn(&Task) -> bool) -> Vec<TaskSummary> {
        self.handles()
            .iter()
            .filter_map(|handle| {
                let task = handle.lock();
                pred(&task).then(|| TaskSummary::from(&*task))
            })
            .collect()
    }

    /// Clones every task in creation order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Task> {
        self.handles().iter().map(|h| h.lock().clone()).collect()
    }

    /// Replaces the whole content of the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateId`] if two tasks share an id; the
    /// store is left untouched in that case.
    pub fn replace_all(&self, tasks: Vec<Task>) -> Result<(), StoreError> {
        let mut fresh = StoreInner::default();
        for task in tasks {
            let id = task.id.clone();
            if fresh.tasks.contains_key(&id) {
                return Err(StoreError::DuplicateId(id));
            }
            fresh.order.push(id.clone());
            fresh.tasks.insert(id, Arc::new(Mutex::new(task)));
        }
        *self.inner.write() = fresh;
        Ok(())
    }
}
