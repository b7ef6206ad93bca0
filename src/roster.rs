use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, warn};

use crate::assignment::{Assignment, AssignmentFilter, CellKey};
use crate::auth::Authorizer;
use crate::bulk::{BulkAssignment, build_cell};
use crate::calendar::{HolidayWeekdays, expand_range, format_date};
use crate::crew::{Member, MemberId, WorkLine};
use crate::error::{RosterError, RosterResult};
use crate::locks::{DaySiteStatus, LockFilter};
use crate::persistence::{RosterSnapshot, RosterStore};
use crate::reconcile::ReconcileBatch;

/// Entry point for every roster read and write.
///
/// Mutations run one at a time behind `write_gate`: the lock check and the
/// batch commit form a single critical section, so two full-replace writes
/// on the same cell can never interleave.
pub struct Roster {
    store: Box<dyn RosterStore>,
    write_gate: Mutex<()>,
}

/// Day-by-work-line view for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterGrid {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<NaiveDate>,
    pub rows: Vec<GridRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    pub work_line: WorkLine,
    pub cells: Vec<GridCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub date: NaiveDate,
    /// Working members, in assignment order.
    pub members: Vec<MemberId>,
    /// Members scheduled on a holiday placeholder.
    pub holiday_members: Vec<MemberId>,
    pub locked: bool,
}

impl Roster {
    pub fn new<S>(store: S) -> Self
    where
        S: RosterStore + 'static,
    {
        Self::from_boxed(Box::new(store))
    }

    pub fn from_boxed(store: Box<dyn RosterStore>) -> Self {
        Self {
            store,
            write_gate: Mutex::new(()),
        }
    }

    fn require_admin(auth: &dyn Authorizer, operation: &'static str) -> RosterResult<()> {
        if auth.is_caller_admin() {
            return Ok(());
        }
        warn!(operation, "rejected mutation from non-admin caller");
        Err(RosterError::Permission { operation })
    }

    fn require_work_line(&self, work_line_id: &str) -> RosterResult<WorkLine> {
        if work_line_id.trim().is_empty() {
            return Err(RosterError::invalid_input("work-line id must not be empty"));
        }
        self.store
            .find_work_line(work_line_id)?
            .ok_or_else(|| RosterError::NotFound {
                kind: "work-line",
                id: work_line_id.to_string(),
            })
    }

    fn require_members(&self, member_ids: &[MemberId]) -> RosterResult<()> {
        for member_id in member_ids {
            if member_id.trim().is_empty() {
                return Err(RosterError::invalid_input("member id must not be empty"));
            }
            if self.store.find_member(member_id)?.is_none() {
                return Err(RosterError::NotFound {
                    kind: "member",
                    id: member_id.clone(),
                });
            }
        }
        Ok(())
    }

    fn reject_locked(&self, work_line_id: &str, start: NaiveDate, end: NaiveDate) -> RosterResult<()> {
        let locked: Vec<NaiveDate> = self
            .store
            .load_locks(&LockFilter::line_range(work_line_id, start, end))?
            .into_iter()
            .map(|status| status.date)
            .collect();
        if locked.is_empty() {
            return Ok(());
        }
        warn!(
            work_line = work_line_id,
            locked = locked.len(),
            "rejected write to locked cells"
        );
        Err(RosterError::cell_locked(work_line_id, locked))
    }

    /// Overwrite every cell of the range with the request's member list.
    ///
    /// All-or-nothing: a single locked day rejects the whole request and the
    /// error lists every locked date in the range.
    pub fn bulk_assign(
        &self,
        auth: &dyn Authorizer,
        request: &BulkAssignment,
    ) -> RosterResult<Vec<Assignment>> {
        Self::require_admin(auth, "bulk_assign")?;
        if request.member_ids.is_empty() {
            return Err(RosterError::invalid_input(
                "bulk assignment needs at least one member",
            ));
        }
        let cells = request.touched_cells()?;
        self.require_work_line(&request.work_line_id)?;
        self.require_members(&request.member_ids)?;

        let _gate = self.write_gate.lock();
        self.reject_locked(&request.work_line_id, request.start, request.end)?;

        let built = request.build()?;
        let mut by_date: BTreeMap<NaiveDate, Vec<Assignment>> = BTreeMap::new();
        for assignment in &built {
            by_date
                .entry(assignment.date)
                .or_default()
                .push(assignment.clone());
        }

        let mut batch = ReconcileBatch::new();
        for key in cells {
            let records = by_date.remove(&key.date).unwrap_or_default();
            batch.replace_cell(key, records);
        }
        self.store.commit(&batch)?;

        info!(
            work_line = %request.work_line_id,
            start = %format_date(request.start),
            end = %format_date(request.end),
            members = request.member_ids.len(),
            records = built.len(),
            "bulk assignment committed"
        );
        Ok(built)
    }

    /// Replace the member set of one cell. An empty list clears the cell.
    pub fn apply_cell(
        &self,
        auth: &dyn Authorizer,
        work_line_id: &str,
        date: NaiveDate,
        member_ids: &[MemberId],
        is_holiday: bool,
    ) -> RosterResult<Vec<Assignment>> {
        Self::require_admin(auth, "apply_cell")?;
        self.require_work_line(work_line_id)?;
        self.require_members(member_ids)?;

        let _gate = self.write_gate.lock();
        self.reject_locked(work_line_id, date, date)?;

        let records = build_cell(work_line_id, date, member_ids, is_holiday);
        let mut batch = ReconcileBatch::new();
        batch.replace_cell(CellKey::new(work_line_id, date), records.clone());
        self.store.commit(&batch)?;

        info!(
            work_line = work_line_id,
            date = %format_date(date),
            members = records.len(),
            is_holiday,
            "cell assignment committed"
        );
        Ok(records)
    }

    /// [`Roster::apply_cell`] with the holiday flag taken from the cell's weekday.
    pub fn apply_cell_with_policy(
        &self,
        auth: &dyn Authorizer,
        work_line_id: &str,
        date: NaiveDate,
        member_ids: &[MemberId],
        holidays: &HolidayWeekdays,
    ) -> RosterResult<Vec<Assignment>> {
        self.apply_cell(auth, work_line_id, date, member_ids, holidays.is_holiday(date))
    }

    pub fn lock(
        &self,
        auth: &dyn Authorizer,
        work_line_id: &str,
        date: NaiveDate,
    ) -> RosterResult<DaySiteStatus> {
        Self::require_admin(auth, "lock")?;
        self.require_work_line(work_line_id)?;

        let _gate = self.write_gate.lock();
        let status = DaySiteStatus::locked(work_line_id, date);
        if self.store.find_lock(work_line_id, date)?.is_none() {
            let mut batch = ReconcileBatch::new();
            batch.lock(work_line_id, date);
            self.store.commit(&batch)?;
            info!(cell = %status.id(), "cell locked");
        }
        Ok(status)
    }

    /// Returns whether a lock was actually removed.
    pub fn unlock(&self, auth: &dyn Authorizer, work_line_id: &str, date: NaiveDate) -> RosterResult<bool> {
        Self::require_admin(auth, "unlock")?;

        let _gate = self.write_gate.lock();
        if self.store.find_lock(work_line_id, date)?.is_none() {
            return Ok(false);
        }
        let mut batch = ReconcileBatch::new();
        batch.unlock(work_line_id, date);
        self.store.commit(&batch)?;
        info!(work_line = work_line_id, date = %format_date(date), "cell unlocked");
        Ok(true)
    }

    pub fn is_locked(&self, work_line_id: &str, date: NaiveDate) -> RosterResult<bool> {
        Ok(self.store.find_lock(work_line_id, date)?.is_some())
    }

    pub fn locked_dates(
        &self,
        work_line_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RosterResult<Vec<NaiveDate>> {
        if end < start {
            return Err(RosterError::InvalidRange { start, end });
        }
        Ok(self
            .store
            .load_locks(&LockFilter::line_range(work_line_id, start, end))?
            .into_iter()
            .map(|status| status.date)
            .collect())
    }

    fn known_members(&self) -> RosterResult<HashSet<MemberId>> {
        Ok(self
            .store
            .load_members()?
            .into_iter()
            .map(|member| member.id)
            .collect())
    }

    /// Who is working the cell: holiday placeholders and assignments of
    /// deleted members are left out.
    pub fn cell_assignments(&self, work_line_id: &str, date: NaiveDate) -> RosterResult<Vec<Assignment>> {
        let known = self.known_members()?;
        Ok(self
            .store
            .load_assignments(&AssignmentFilter::cell(work_line_id, date))?
            .into_iter()
            .filter(|a| !a.is_holiday && known.contains(&a.member_id))
            .collect())
    }

    /// Every stored record of the cell, holiday placeholders included.
    pub fn cell_records(&self, work_line_id: &str, date: NaiveDate) -> RosterResult<Vec<Assignment>> {
        Ok(self
            .store
            .load_assignments(&AssignmentFilter::cell(work_line_id, date))?)
    }

    pub fn grid(&self, start: NaiveDate, end: NaiveDate) -> RosterResult<RosterGrid> {
        let days = expand_range(start, end)?;
        let known = self.known_members()?;

        let mut lines = self.store.load_work_lines()?;
        lines.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        let mut by_cell: HashMap<CellKey, Vec<Assignment>> = HashMap::new();
        for assignment in self.store.load_assignments(&AssignmentFilter::range(start, end))? {
            if known.contains(&assignment.member_id) {
                by_cell.entry(assignment.cell()).or_default().push(assignment);
            }
        }
        let locked: HashSet<CellKey> = self
            .store
            .load_locks(&LockFilter {
                work_line_id: None,
                range: Some((start, end)),
            })?
            .into_iter()
            .map(|status| status.cell())
            .collect();

        let rows = lines
            .into_iter()
            .map(|work_line| {
                let cells = days
                    .iter()
                    .map(|date| {
                        let key = CellKey::new(work_line.id.clone(), *date);
                        let records = by_cell.remove(&key).unwrap_or_default();
                        let (holiday, working): (Vec<_>, Vec<_>) =
                            records.into_iter().partition(|a| a.is_holiday);
                        GridCell {
                            date: *date,
                            members: working.into_iter().map(|a| a.member_id).collect(),
                            holiday_members: holiday.into_iter().map(|a| a.member_id).collect(),
                            locked: locked.contains(&key),
                        }
                    })
                    .collect();
                GridRow { work_line, cells }
            })
            .collect();

        Ok(RosterGrid {
            start,
            end,
            days,
            rows,
        })
    }

    pub fn members(&self) -> RosterResult<Vec<Member>> {
        Ok(self.store.load_members()?)
    }

    pub fn work_lines(&self) -> RosterResult<Vec<WorkLine>> {
        Ok(self.store.load_work_lines()?)
    }

    pub fn upsert_member(&self, auth: &dyn Authorizer, member: &Member) -> RosterResult<()> {
        Self::require_admin(auth, "upsert_member")?;
        if member.id.trim().is_empty() {
            return Err(RosterError::invalid_input("member id must not be empty"));
        }
        let _gate = self.write_gate.lock();
        self.store.save_member(member)?;
        Ok(())
    }

    /// Deletes the member together with all of their assignments.
    pub fn delete_member(&self, auth: &dyn Authorizer, member_id: &str) -> RosterResult<bool> {
        Self::require_admin(auth, "delete_member")?;
        let _gate = self.write_gate.lock();
        let removed = self.store.delete_member(member_id)?;
        if removed {
            info!(member = member_id, "member deleted");
        }
        Ok(removed)
    }

    pub fn upsert_work_line(&self, auth: &dyn Authorizer, work_line: &WorkLine) -> RosterResult<()> {
        Self::require_admin(auth, "upsert_work_line")?;
        if work_line.id.trim().is_empty() {
            return Err(RosterError::invalid_input("work-line id must not be empty"));
        }
        let _gate = self.write_gate.lock();
        self.store.save_work_line(work_line)?;
        Ok(())
    }

    pub fn snapshot(&self) -> RosterResult<RosterSnapshot> {
        Ok(RosterSnapshot::capture(self.store.as_ref())?)
    }

    /// Write a snapshot into this roster. Cells present in the snapshot are
    /// replaced, other cells are kept, locks in the snapshot are added.
    pub fn restore(&self, auth: &dyn Authorizer, snapshot: &RosterSnapshot) -> RosterResult<()> {
        Self::require_admin(auth, "restore")?;
        let _gate = self.write_gate.lock();
        snapshot.restore_into(self.store.as_ref())?;
        info!(
            members = snapshot.members.len(),
            work_lines = snapshot.work_lines.len(),
            assignments = snapshot.assignments.len(),
            locks = snapshot.locks.len(),
            "snapshot restored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticAuthorizer;
    use crate::persistence::InMemoryRosterStore;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn seeded() -> Roster {
        let roster = Roster::new(InMemoryRosterStore::new());
        let admin = StaticAuthorizer::ADMIN;
        roster.upsert_work_line(&admin, &WorkLine::new("L", "Line")).unwrap();
        for id in ["A", "B"] {
            roster.upsert_member(&admin, &Member::new(id, id)).unwrap();
        }
        roster
    }

    #[test]
    fn unknown_member_is_not_found_and_nothing_is_written() {
        let roster = seeded();
        let err = roster
            .apply_cell(&StaticAuthorizer::ADMIN, "L", d(1), &["A".to_string(), "Z".to_string()], false)
            .unwrap_err();
        assert!(matches!(err, RosterError::NotFound { kind: "member", .. }));
        assert!(roster.cell_records("L", d(1)).unwrap().is_empty());
    }

    #[test]
    fn bulk_rejects_empty_member_list() {
        let roster = seeded();
        let request = BulkAssignment::new("L", Vec::<String>::new(), d(1), d(2));
        let err = roster.bulk_assign(&StaticAuthorizer::ADMIN, &request).unwrap_err();
        assert!(matches!(err, RosterError::InvalidInput { .. }));
    }

    #[test]
    fn lock_on_unknown_work_line_is_not_found() {
        let roster = seeded();
        let err = roster.lock(&StaticAuthorizer::ADMIN, "nope", d(1)).unwrap_err();
        assert!(matches!(err, RosterError::NotFound { kind: "work-line", .. }));
    }
}
