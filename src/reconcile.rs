use chrono::NaiveDate;

use crate::assignment::{Assignment, AssignmentSet, CellKey};
use crate::locks::{DaySiteStatus, LockRegistry};

/// Everything one mutation writes, applied by a store as a single unit:
/// every replaced cell is emptied first, then the new records are inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileBatch {
    replaced_cells: Vec<CellKey>,
    inserts: Vec<Assignment>,
    locks: Vec<DaySiteStatus>,
    unlocks: Vec<CellKey>,
}

impl ReconcileBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full replace of one cell. Records for other cells are discarded.
    pub fn replace_cell(&mut self, key: CellKey, assignments: Vec<Assignment>) {
        self.inserts.extend(
            assignments
                .into_iter()
                .filter(|a| a.work_line_id == key.work_line_id && a.date == key.date),
        );
        if !self.replaced_cells.contains(&key) {
            self.replaced_cells.push(key);
        }
    }

    pub fn lock(&mut self, work_line_id: &str, date: NaiveDate) {
        self.locks.push(DaySiteStatus::locked(work_line_id, date));
    }

    pub fn unlock(&mut self, work_line_id: &str, date: NaiveDate) {
        self.unlocks.push(CellKey::new(work_line_id, date));
    }

    pub fn replaced_cells(&self) -> &[CellKey] {
        &self.replaced_cells
    }

    pub fn inserts(&self) -> &[Assignment] {
        &self.inserts
    }

    pub fn locks(&self) -> &[DaySiteStatus] {
        &self.locks
    }

    pub fn unlocks(&self) -> &[CellKey] {
        &self.unlocks
    }

    pub fn is_empty(&self) -> bool {
        self.replaced_cells.is_empty()
            && self.inserts.is_empty()
            && self.locks.is_empty()
            && self.unlocks.is_empty()
    }

    /// Apply to in-memory state. Deletes run before inserts.
    pub fn apply_to(&self, assignments: &mut AssignmentSet, registry: &mut LockRegistry) {
        for key in &self.replaced_cells {
            assignments.remove_cell(key);
        }
        for assignment in &self.inserts {
            assignments.upsert(assignment.clone());
        }
        for key in &self.unlocks {
            registry.unlock(&key.work_line_id, key.date);
        }
        for status in &self.locks {
            registry.lock(&status.work_line_id, status.date);
        }
    }
}
