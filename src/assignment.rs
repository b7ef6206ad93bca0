use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::calendar::format_date;
use crate::crew::{MemberId, WorkLineId};

/// One (work-line, date) cell of the roster grid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub work_line_id: WorkLineId,
    pub date: NaiveDate,
}

impl CellKey {
    pub fn new(work_line_id: impl Into<WorkLineId>, date: NaiveDate) -> Self {
        Self {
            work_line_id: work_line_id.into(),
            date,
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.work_line_id, format_date(self.date))
    }
}

/// "Member M works on line L on date D."
///
/// The identifier is derived from the three components and is never stored
/// apart from them, which makes it the natural key for replace-on-write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "AssignmentRecord", try_from = "AssignmentRecord")]
pub struct Assignment {
    pub work_line_id: WorkLineId,
    pub member_id: MemberId,
    pub date: NaiveDate,
    pub is_holiday: bool,
    pub is_confirmed: bool,
}

impl Assignment {
    pub fn new(
        work_line_id: impl Into<WorkLineId>,
        member_id: impl Into<MemberId>,
        date: NaiveDate,
        is_holiday: bool,
    ) -> Self {
        Self {
            work_line_id: work_line_id.into(),
            member_id: member_id.into(),
            date,
            is_holiday,
            is_confirmed: false,
        }
    }

    /// `{workLineId}_{memberId}_{yyyy-MM-dd}`
    pub fn id(&self) -> String {
        assignment_id(&self.work_line_id, &self.member_id, self.date)
    }

    pub fn cell(&self) -> CellKey {
        CellKey::new(self.work_line_id.clone(), self.date)
    }

    fn same_slot(&self, other: &Assignment) -> bool {
        self.work_line_id == other.work_line_id
            && self.member_id == other.member_id
            && self.date == other.date
    }
}

pub fn assignment_id(work_line_id: &str, member_id: &str, date: NaiveDate) -> String {
    format!("{}_{}_{}", work_line_id, member_id, format_date(date))
}

/// Wire form of an assignment; carries the derived id for collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssignmentRecord {
    #[serde(default)]
    id: Option<String>,
    work_line_id: WorkLineId,
    member_id: MemberId,
    date: NaiveDate,
    #[serde(default)]
    is_holiday: bool,
    #[serde(default)]
    is_confirmed: bool,
}

impl From<Assignment> for AssignmentRecord {
    fn from(value: Assignment) -> Self {
        Self {
            id: Some(value.id()),
            work_line_id: value.work_line_id,
            member_id: value.member_id,
            date: value.date,
            is_holiday: value.is_holiday,
            is_confirmed: value.is_confirmed,
        }
    }
}

impl TryFrom<AssignmentRecord> for Assignment {
    type Error = String;

    fn try_from(record: AssignmentRecord) -> Result<Self, Self::Error> {
        let assignment = Assignment {
            work_line_id: record.work_line_id,
            member_id: record.member_id,
            date: record.date,
            is_holiday: record.is_holiday,
            is_confirmed: record.is_confirmed,
        };
        match record.id {
            Some(id) if id != assignment.id() => Err(format!(
                "assignment id '{id}' does not match its components ('{}')",
                assignment.id()
            )),
            _ => Ok(assignment),
        }
    }
}

/// Selection used when loading assignments from a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentFilter {
    pub work_line_id: Option<WorkLineId>,
    pub member_id: Option<MemberId>,
    pub date: Option<NaiveDate>,
    /// Inclusive date range.
    pub range: Option<(NaiveDate, NaiveDate)>,
}

impl AssignmentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn cell(work_line_id: impl Into<WorkLineId>, date: NaiveDate) -> Self {
        Self {
            work_line_id: Some(work_line_id.into()),
            date: Some(date),
            ..Self::default()
        }
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            range: Some((start, end)),
            ..Self::default()
        }
    }

    pub fn matches(&self, assignment: &Assignment) -> bool {
        if let Some(line) = &self.work_line_id {
            if &assignment.work_line_id != line {
                return false;
            }
        }
        if let Some(member) = &self.member_id {
            if &assignment.member_id != member {
                return false;
            }
        }
        if let Some(date) = self.date {
            if assignment.date != date {
                return false;
            }
        }
        if let Some((start, end)) = self.range {
            if assignment.date < start || assignment.date > end {
                return false;
            }
        }
        true
    }
}

/// Assignments grouped by cell, members kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentSet {
    cells: BTreeMap<CellKey, Vec<Assignment>>,
}

impl AssignmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Assignment>,
    {
        let mut set = Self::new();
        for record in records {
            set.upsert(record);
        }
        set
    }

    /// Insert, replacing any record for the same work-line, member and date.
    pub fn upsert(&mut self, assignment: Assignment) {
        let slot = self.cells.entry(assignment.cell()).or_default();
        match slot.iter_mut().find(|existing| existing.same_slot(&assignment)) {
            Some(existing) => *existing = assignment,
            None => slot.push(assignment),
        }
    }

    /// Replace the whole member set of one cell, returning what was there.
    ///
    /// Records whose cell differs from `key` are ignored.
    pub fn replace_cell(&mut self, key: &CellKey, assignments: Vec<Assignment>) -> Vec<Assignment> {
        let previous = self.cells.remove(key).unwrap_or_default();
        for assignment in assignments {
            if assignment.work_line_id == key.work_line_id && assignment.date == key.date {
                self.upsert(assignment);
            }
        }
        previous
    }

    pub fn remove_cell(&mut self, key: &CellKey) -> Vec<Assignment> {
        self.cells.remove(key).unwrap_or_default()
    }

    /// Drop every record for a member. Returns how many were removed.
    pub fn remove_member(&mut self, member_id: &str) -> usize {
        let mut removed = 0;
        self.cells.retain(|_, slot| {
            let before = slot.len();
            slot.retain(|a| a.member_id != member_id);
            removed += before - slot.len();
            !slot.is_empty()
        });
        removed
    }

    pub fn cell(&self, key: &CellKey) -> &[Assignment] {
        self.cells.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Records of a cell that are working days (holiday placeholders left out).
    pub fn working(&self, key: &CellKey) -> Vec<Assignment> {
        self.cell(key)
            .iter()
            .filter(|a| !a.is_holiday)
            .cloned()
            .collect()
    }

    pub fn query(&self, filter: &AssignmentFilter) -> Vec<Assignment> {
        if let (Some(line), Some(date)) = (&filter.work_line_id, filter.date) {
            return self
                .cell(&CellKey::new(line.clone(), date))
                .iter()
                .filter(|a| filter.matches(a))
                .cloned()
                .collect();
        }
        self.iter().filter(|a| filter.matches(a)).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Assignment> {
        self.cells.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
