use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

use super::{PersistenceResult, RosterStore, ensure_positive_lock};
use crate::assignment::{Assignment, AssignmentFilter, AssignmentSet, CellKey};
use crate::crew::{Member, MemberId, WorkLine, WorkLineId};
use crate::locks::{DaySiteStatus, LockFilter, LockRegistry};
use crate::reconcile::ReconcileBatch;

#[derive(Debug, Default)]
struct RosterState {
    assignments: AssignmentSet,
    locks: LockRegistry,
    members: BTreeMap<MemberId, Member>,
    work_lines: BTreeMap<WorkLineId, WorkLine>,
}

/// Store backed by in-process collections behind one `RwLock`.
///
/// A batch commit holds the write guard for its whole duration, so readers
/// never observe half of a reconciliation.
#[derive(Debug, Default)]
pub struct InMemoryRosterStore {
    state: RwLock<RosterState>,
}

impl InMemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(
        members: Vec<Member>,
        work_lines: Vec<WorkLine>,
        assignments: Vec<Assignment>,
        locks: Vec<DaySiteStatus>,
    ) -> Self {
        let state = RosterState {
            assignments: AssignmentSet::from_records(assignments),
            locks: LockRegistry::from_records(locks),
            members: members.into_iter().map(|m| (m.id.clone(), m)).collect(),
            work_lines: work_lines.into_iter().map(|l| (l.id.clone(), l)).collect(),
        };
        Self {
            state: RwLock::new(state),
        }
    }
}

impl RosterStore for InMemoryRosterStore {
    fn load_assignments(&self, filter: &AssignmentFilter) -> PersistenceResult<Vec<Assignment>> {
        Ok(self.state.read().assignments.query(filter))
    }

    fn save_assignments(&self, assignments: &[Assignment]) -> PersistenceResult<()> {
        let mut state = self.state.write();
        for assignment in assignments {
            state.assignments.upsert(assignment.clone());
        }
        Ok(())
    }

    fn delete_assignments(&self, work_line_id: &str, date: NaiveDate) -> PersistenceResult<usize> {
        let mut state = self.state.write();
        Ok(state
            .assignments
            .remove_cell(&CellKey::new(work_line_id, date))
            .len())
    }

    fn load_locks(&self, filter: &LockFilter) -> PersistenceResult<Vec<DaySiteStatus>> {
        Ok(self.state.read().locks.query(filter))
    }

    fn find_lock(&self, work_line_id: &str, date: NaiveDate) -> PersistenceResult<Option<DaySiteStatus>> {
        let state = self.state.read();
        Ok(state
            .locks
            .is_locked(work_line_id, date)
            .then(|| DaySiteStatus::locked(work_line_id, date)))
    }

    fn save_lock(&self, status: &DaySiteStatus) -> PersistenceResult<()> {
        ensure_positive_lock(status)?;
        self.state.write().locks.lock(&status.work_line_id, status.date);
        Ok(())
    }

    fn delete_lock(&self, work_line_id: &str, date: NaiveDate) -> PersistenceResult<bool> {
        Ok(self.state.write().locks.unlock(work_line_id, date))
    }

    fn commit(&self, batch: &ReconcileBatch) -> PersistenceResult<()> {
        for status in batch.locks() {
            ensure_positive_lock(status)?;
        }
        let mut state = self.state.write();
        let RosterState {
            assignments, locks, ..
        } = &mut *state;
        batch.apply_to(assignments, locks);
        debug!(
            cells = batch.replaced_cells().len(),
            inserts = batch.inserts().len(),
            "committed batch to memory store"
        );
        Ok(())
    }

    fn load_members(&self) -> PersistenceResult<Vec<Member>> {
        Ok(self.state.read().members.values().cloned().collect())
    }

    fn find_member(&self, id: &str) -> PersistenceResult<Option<Member>> {
        Ok(self.state.read().members.get(id).cloned())
    }

    fn save_member(&self, member: &Member) -> PersistenceResult<()> {
        self.state
            .write()
            .members
            .insert(member.id.clone(), member.clone());
        Ok(())
    }

    fn delete_member(&self, id: &str) -> PersistenceResult<bool> {
        let mut state = self.state.write();
        let removed = state.members.remove(id).is_some();
        let cascaded = state.assignments.remove_member(id);
        debug!(member = id, cascaded, "deleted member from memory store");
        Ok(removed)
    }

    fn load_work_lines(&self) -> PersistenceResult<Vec<WorkLine>> {
        Ok(self.state.read().work_lines.values().cloned().collect())
    }

    fn find_work_line(&self, id: &str) -> PersistenceResult<Option<WorkLine>> {
        Ok(self.state.read().work_lines.get(id).cloned())
    }

    fn save_work_line(&self, work_line: &WorkLine) -> PersistenceResult<()> {
        self.state
            .write()
            .work_lines
            .insert(work_line.id.clone(), work_line.clone());
        Ok(())
    }
}
