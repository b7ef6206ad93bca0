use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

use super::{InMemoryRosterStore, PersistenceError, PersistenceResult, RosterStore};
use crate::assignment::{Assignment, AssignmentFilter, CellKey};
use crate::calendar::{format_date, parse_date};
use crate::crew::{Member, WorkLine};
use crate::locks::{DaySiteStatus, LockFilter};
use crate::reconcile::ReconcileBatch;

/// Everything the roster owns or reads, in one serializable value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub work_lines: Vec<WorkLine>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub locks: Vec<DaySiteStatus>,
}

impl RosterSnapshot {
    pub fn capture(store: &dyn RosterStore) -> PersistenceResult<Self> {
        Ok(Self {
            members: store.load_members()?,
            work_lines: store.load_work_lines()?,
            assignments: store.load_assignments(&AssignmentFilter::all())?,
            locks: store.load_locks(&LockFilter::all())?,
        })
    }

    pub fn validate(&self) -> PersistenceResult<()> {
        super::validate_assignments(&self.assignments)?;
        super::validate_locks(&self.locks)
    }

    pub fn into_store(self) -> PersistenceResult<InMemoryRosterStore> {
        self.validate()?;
        Ok(InMemoryRosterStore::with_records(
            self.members,
            self.work_lines,
            self.assignments,
            self.locks,
        ))
    }

    /// Write the snapshot into an existing store. Cells present in the
    /// snapshot replace the store's cells; other cells are left alone.
    pub fn restore_into(&self, store: &dyn RosterStore) -> PersistenceResult<()> {
        self.validate()?;
        for member in &self.members {
            store.save_member(member)?;
        }
        for line in &self.work_lines {
            store.save_work_line(line)?;
        }

        let mut batch = ReconcileBatch::new();
        let mut cells: Vec<CellKey> = self.assignments.iter().map(Assignment::cell).collect();
        cells.sort();
        cells.dedup();
        for key in cells {
            let records = self
                .assignments
                .iter()
                .filter(|a| a.work_line_id == key.work_line_id && a.date == key.date)
                .cloned()
                .collect();
            batch.replace_cell(key, records);
        }
        for status in &self.locks {
            batch.lock(&status.work_line_id, status.date);
        }
        store.commit(&batch)
    }
}

pub fn save_roster_to_json<P: AsRef<Path>>(snapshot: &RosterSnapshot, path: P) -> PersistenceResult<()> {
    snapshot.validate()?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}

pub fn load_roster_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<RosterSnapshot> {
    let file = File::open(path)?;
    let snapshot: RosterSnapshot = serde_json::from_reader(file)?;
    snapshot.validate()?;
    Ok(snapshot)
}

#[derive(Serialize, Deserialize)]
struct AssignmentCsvRecord {
    id: String,
    work_line_id: String,
    member_id: String,
    date: String,
    is_holiday: bool,
    is_confirmed: bool,
}

impl From<&Assignment> for AssignmentCsvRecord {
    fn from(assignment: &Assignment) -> Self {
        Self {
            id: assignment.id(),
            work_line_id: assignment.work_line_id.clone(),
            member_id: assignment.member_id.clone(),
            date: format_date(assignment.date),
            is_holiday: assignment.is_holiday,
            is_confirmed: assignment.is_confirmed,
        }
    }
}

impl AssignmentCsvRecord {
    fn into_assignment(self) -> PersistenceResult<Assignment> {
        let date = parse_date(&self.date)
            .map_err(|err| PersistenceError::InvalidData(err.to_string()))?;
        let assignment = Assignment {
            work_line_id: self.work_line_id,
            member_id: self.member_id,
            date,
            is_holiday: self.is_holiday,
            is_confirmed: self.is_confirmed,
        };
        let expected = assignment.id();
        if !self.id.trim().is_empty() && self.id != expected {
            return Err(PersistenceError::InvalidData(format!(
                "assignment id '{}' does not match its components ('{}')",
                self.id, expected
            )));
        }
        Ok(assignment)
    }
}

pub fn save_assignments_to_csv<P: AsRef<Path>>(
    assignments: &[Assignment],
    path: P,
) -> PersistenceResult<()> {
    super::validate_assignments(assignments)?;
    let mut writer = csv::Writer::from_path(path)?;
    for assignment in assignments {
        writer.serialize(AssignmentCsvRecord::from(assignment))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_assignments_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<Vec<Assignment>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut assignments = Vec::new();
    for record in reader.deserialize::<AssignmentCsvRecord>() {
        assignments.push(record?.into_assignment()?);
    }
    super::validate_assignments(&assignments)?;
    Ok(assignments)
}
