//! Employee snapshots supplied by the surrounding HR system.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::EngineResult;
use crate::models::EmployeeSnapshot;

/// Read access to employee, employment and allocation data.
pub trait EmployeeDirectory: Send + Sync {
    /// Returns the current snapshot of an employee, `Ok(None)` if unknown.
    fn snapshot(&self, employee_id: &str) -> EngineResult<Option<EmployeeSnapshot>>;
}

/// An [`EmployeeDirectory`] held in memory, fed through [`upsert`](Self::upsert).
#[derive(Debug, Default)]
pub struct InMemoryEmployeeDirectory {
    snapshots: RwLock<HashMap<String, EmployeeSnapshot>>,
}

impl InMemoryEmployeeDirectory {
    /// Creates a directory holding the given snapshots.
    pub fn new(snapshots: impl IntoIterator<Item = EmployeeSnapshot>) -> Self {
        Self {
            snapshots: RwLock::new(
                snapshots
                    .into_iter()
                    .map(|s| (s.employee.id.clone(), s))
                    .collect(),
            ),
        }
    }

    /// Inserts or replaces a snapshot, returning the previous one.
    pub fn upsert(&self, snapshot: EmployeeSnapshot) -> Option<EmployeeSnapshot> {
        self.snapshots
            .write()
            .insert(snapshot.employee.id.clone(), snapshot)
    }

    /// Number of employees held.
    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    /// Returns true if no employee is held.
    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

impl EmployeeDirectory for InMemoryEmployeeDirectory {
    fn snapshot(&self, employee_id: &str) -> EngineResult<Option<EmployeeSnapshot>> {
        Ok(self.snapshots.read().get(employee_id).cloned())
    }
}
