use chrono::NaiveDate;
use std::collections::HashSet;
use std::io;
use thiserror::Error;

use crate::assignment::{Assignment, AssignmentFilter};
use crate::calendar::format_date;
use crate::crew::{Member, WorkLine};
use crate::locks::{DaySiteStatus, LockFilter};
use crate::reconcile::ReconcileBatch;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Storage seam for the roster. Implementations must apply
/// [`RosterStore::commit`] atomically: either the whole batch lands or none
/// of it does.
pub trait RosterStore: Send + Sync {
    fn load_assignments(&self, filter: &AssignmentFilter) -> PersistenceResult<Vec<Assignment>>;
    /// Upsert by assignment id.
    fn save_assignments(&self, assignments: &[Assignment]) -> PersistenceResult<()>;
    /// Remove every assignment of one cell, returning how many went away.
    fn delete_assignments(&self, work_line_id: &str, date: NaiveDate) -> PersistenceResult<usize>;

    fn load_locks(&self, filter: &LockFilter) -> PersistenceResult<Vec<DaySiteStatus>>;
    fn find_lock(&self, work_line_id: &str, date: NaiveDate) -> PersistenceResult<Option<DaySiteStatus>>;
    /// Only positive lock facts may be stored.
    fn save_lock(&self, status: &DaySiteStatus) -> PersistenceResult<()>;
    fn delete_lock(&self, work_line_id: &str, date: NaiveDate) -> PersistenceResult<bool>;

    fn commit(&self, batch: &ReconcileBatch) -> PersistenceResult<()>;

    fn load_members(&self) -> PersistenceResult<Vec<Member>>;
    fn find_member(&self, id: &str) -> PersistenceResult<Option<Member>>;
    fn save_member(&self, member: &Member) -> PersistenceResult<()>;
    /// Deletes the member and every assignment that references it.
    fn delete_member(&self, id: &str) -> PersistenceResult<bool>;

    fn load_work_lines(&self) -> PersistenceResult<Vec<WorkLine>>;
    fn find_work_line(&self, id: &str) -> PersistenceResult<Option<WorkLine>>;
    fn save_work_line(&self, work_line: &WorkLine) -> PersistenceResult<()>;
}

pub(crate) fn ensure_positive_lock(status: &DaySiteStatus) -> PersistenceResult<()> {
    if !status.is_locked {
        return Err(PersistenceError::InvalidData(format!(
            "lock record {} has is_locked=false; unlocked cells are stored as absent records",
            status.id()
        )));
    }
    Ok(())
}

pub fn validate_assignments(assignments: &[Assignment]) -> PersistenceResult<()> {
    let mut seen = HashSet::with_capacity(assignments.len());
    for assignment in assignments {
        if assignment.work_line_id.trim().is_empty() || assignment.member_id.trim().is_empty() {
            return Err(PersistenceError::InvalidData(format!(
                "assignment {} has an empty work_line_id or member_id",
                assignment.id()
            )));
        }
        let slot = (
            assignment.work_line_id.as_str(),
            assignment.member_id.as_str(),
            assignment.date,
        );
        if !seen.insert(slot) {
            return Err(PersistenceError::InvalidData(format!(
                "duplicate assignment for member {} on work-line {} at {}",
                assignment.member_id,
                assignment.work_line_id,
                format_date(assignment.date)
            )));
        }
    }
    Ok(())
}

pub fn validate_locks(locks: &[DaySiteStatus]) -> PersistenceResult<()> {
    let mut seen = HashSet::with_capacity(locks.len());
    for status in locks {
        ensure_positive_lock(status)?;
        if !seen.insert(status.id()) {
            return Err(PersistenceError::InvalidData(format!(
                "duplicate lock record {}",
                status.id()
            )));
        }
    }
    Ok(())
}

pub mod file;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    RosterSnapshot, load_assignments_from_csv, load_roster_from_json, save_assignments_to_csv,
    save_roster_to_json,
};
pub use memory::InMemoryRosterStore;
