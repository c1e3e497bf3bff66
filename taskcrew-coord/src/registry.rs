//! Load registry: one capacity record per worker.
//!
//! Records keep registration order, which is also the tie-break order for
//! auto-assignment and the scan order of the rebalancer. Every
//! read-modify-write happens inside a single lock acquisition, so
//! "pick the least loaded engineer and count the task" is atomic.

use parking_lot::Mutex;
use taskcrew_proto::error::OpError;
use taskcrew_proto::load::{WorkerLoad, WorkerRole};

/// Ordered set of worker load records.
pub struct LoadRegistry {
    loads: Mutex<Vec<WorkerLoad>>,
}

impl LoadRegistry {
    /// Creates a registry from records in registration order.
    #[must_use]
    pub const fn new(loads: Vec<WorkerLoad>) -> Self {
        Self {
            loads: Mutex::new(loads),
        }
    }

    /// Copy of one worker's record.
    #[must_use]
    pub fn get(&self, worker_id: &str) -> Option<WorkerLoad> {
        self.loads
            .lock()
            .iter()
            .find(|l| l.worker_id == worker_id)
            .cloned()
    }

    #[must_use]
    pub fn role_of(&self, worker_id: &str) -> Option<WorkerRole> {
        self.get(worker_id).map(|l| l.role)
    }

    /// Copies of every record, in registration order.
    #[must_use]
    pub fn all(&self) -> Vec<WorkerLoad> {
        self.loads.lock().clone()
    }

    /// Ids of workers of `role` that can take another task.
    #[must_use]
    pub fn available(&self, role: WorkerRole) -> Vec<String> {
        self.loads
            .lock()
            .iter()
            .filter(|l| l.role == role && l.has_capacity())
            .map(|l| l.worker_id.clone())
            .collect()
    }

    /// Counts one more task against a named worker of the given role.
    ///
    /// # Errors
    ///
    /// [`OpError::WorkerNotFound`] for an unknown id, [`OpError::WrongRole`]
    /// if the worker plays another role, [`OpError::CapacityExceeded`] if
    /// the worker is full. The record is unchanged on error.
    pub fn reserve(&self, worker_id: &str, role: WorkerRole) -> Result<(), OpError> {
        let mut loads = self.loads.lock();
        let load = find_mut(&mut loads, worker_id)?;
        if load.role != role {
            return Err(OpError::WrongRole {
                worker: worker_id.to_string(),
                expected: role,
                actual: load.role,
            });
        }
        take_slot(load)
    }

    /// Picks the least loaded worker of `role` with spare capacity and
    /// counts one task against it. Ties go to the earliest registered.
    ///
    /// # Errors
    ///
    /// [`OpError::NoSuitableEngineer`] when no worker of `role` exists,
    /// [`OpError::CapacityExceeded`] (naming the first of them) when all
    /// are full.
    pub fn reserve_least_loaded(&self, role: WorkerRole) -> Result<String, OpError> {
        let mut loads = self.loads.lock();
        let mut best: Option<usize> = None;
        let mut first_full: Option<usize> = None;
        for (idx, load) in loads.iter().enumerate() {
            if load.role != role {
                continue;
            }
            if !load.has_capacity() {
                first_full.get_or_insert(idx);
                continue;
            }
            let better = best.is_none_or(|b| load.load_percentage() < loads[b].load_percentage());
            if better {
                best = Some(idx);
            }
        }
        match (best, first_full) {
            (Some(idx), _) => {
                let load = &mut loads[idx];
                load.current_tasks += 1;
                Ok(load.worker_id.clone())
            }
            (None, Some(idx)) => Err(capacity_error(&loads[idx])),
            (None, None) => Err(OpError::NoSuitableEngineer),
        }
    }

    /// Moves one unit of load from `from` (if any) to `to`, failing when
    /// `to` is full.
    ///
    /// # Errors
    ///
    /// [`OpError::WorkerNotFound`] if `to` is unknown,
    /// [`OpError::CapacityExceeded`] if `to` is full.
    pub fn hand_over(&self, from: Option<&str>, to: &str) -> Result<(), OpError> {
        let mut loads = self.loads.lock();
        take_slot(find_mut(&mut loads, to)?)?;
        if let Some(from) = from {
            release_in(&mut loads, from);
        }
        drop(loads);
        Ok(())
    }

    /// Releases one unit of load from a worker. Never goes below zero.
    pub fn release(&self, worker_id: &str) {
        release_in(&mut self.loads.lock(), worker_id);
    }

    /// Replaces every record.
    pub fn replace_all(&self, loads: Vec<WorkerLoad>) {
        *self.loads.lock() = loads;
    }
}

fn find_mut<'a>(loads: &'a mut [WorkerLoad], worker_id: &str) -> Result<&'a mut WorkerLoad, OpError> {
    loads
        .iter_mut()
        .find(|l| l.worker_id == worker_id)
        .ok_or_else(|| OpError::WorkerNotFound(worker_id.to_string()))
}

fn take_slot(load: &mut WorkerLoad) -> Result<(), OpError> {
    if !load.has_capacity() {
        return Err(capacity_error(load));
    }
    load.current_tasks += 1;
    Ok(())
}

fn capacity_error(load: &WorkerLoad) -> OpError {
    OpError::CapacityExceeded {
        worker: load.worker_id.clone(),
        current: load.current_tasks,
        max: load.max_capacity,
    }
}

fn release_in(loads: &mut [WorkerLoad], worker_id: &str) {
    match loads.iter_mut().find(|l| l.worker_id == worker_id) {
        Some(load) if load.current_tasks > 0 => load.current_tasks -= 1,
        Some(_) => {
            tracing::warn!(worker = %worker_id, "release on idle worker ignored");
        }
        None => {
            tracing::warn!(worker = %worker_id, "release on unknown worker ignored");
        }
    }
}
