//! Shared coordinator state.
//!
//! Lock order is pass gate, then a task mutex, then the registry. Role
//! operations hold the gate shared for their whole duration; rebalance
//! passes, snapshots and restores hold it exclusively, so they observe and
//! produce a state with no operation half applied.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::registry::LoadRegistry;
use crate::store::TaskStore;

/// Task store and load registry shared by every worker.
pub struct SharedState {
    gate: RwLock<()>,
    pub store: TaskStore,
    pub registry: LoadRegistry,
}

impl SharedState {
    #[must_use]
    pub fn new(registry: LoadRegistry) -> Self {
        Self {
            gate: RwLock::new(()),
            store: TaskStore::new(),
            registry,
        }
    }

    /// Enter the gate as an ordinary operation. Must not be nested.
    pub fn operation(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read()
    }

    /// Enter the gate alone.
    pub fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write()
    }
}
