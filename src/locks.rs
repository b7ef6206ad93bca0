use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::assignment::CellKey;
use crate::calendar::format_date;
use crate::crew::WorkLineId;

/// Positive lock fact for one cell. An unlocked cell has no record at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySiteStatus {
    pub work_line_id: WorkLineId,
    pub date: NaiveDate,
    pub is_locked: bool,
}

impl DaySiteStatus {
    pub fn locked(work_line_id: impl Into<WorkLineId>, date: NaiveDate) -> Self {
        Self {
            work_line_id: work_line_id.into(),
            date,
            is_locked: true,
        }
    }

    /// `{workLineId}_{yyyy-MM-dd}`
    pub fn id(&self) -> String {
        format!("{}_{}", self.work_line_id, format_date(self.date))
    }

    pub fn cell(&self) -> CellKey {
        CellKey::new(self.work_line_id.clone(), self.date)
    }
}

/// Selection used when loading lock records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockFilter {
    pub work_line_id: Option<WorkLineId>,
    pub range: Option<(NaiveDate, NaiveDate)>,
}

impl LockFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn line_range(work_line_id: impl Into<WorkLineId>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            work_line_id: Some(work_line_id.into()),
            range: Some((start, end)),
        }
    }

    pub fn matches(&self, status: &DaySiteStatus) -> bool {
        if let Some(line) = &self.work_line_id {
            if &status.work_line_id != line {
                return false;
            }
        }
        if let Some((start, end)) = self.range {
            if status.date < start || status.date > end {
                return false;
            }
        }
        true
    }
}

/// Locked cells keyed by (work-line, date).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockRegistry {
    locked: BTreeMap<CellKey, DaySiteStatus>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records with `is_locked = false` are dropped on the way in.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = DaySiteStatus>,
    {
        let locked = records
            .into_iter()
            .filter(|status| status.is_locked)
            .map(|status| (status.cell(), status))
            .collect();
        Self { locked }
    }

    /// Returns `true` when the cell was previously unlocked.
    pub fn lock(&mut self, work_line_id: &str, date: NaiveDate) -> bool {
        let status = DaySiteStatus::locked(work_line_id, date);
        self.locked.insert(status.cell(), status).is_none()
    }

    /// Returns `true` when a lock was removed.
    pub fn unlock(&mut self, work_line_id: &str, date: NaiveDate) -> bool {
        self.locked
            .remove(&CellKey::new(work_line_id, date))
            .is_some()
    }

    pub fn is_locked(&self, work_line_id: &str, date: NaiveDate) -> bool {
        self.locked.contains_key(&CellKey::new(work_line_id, date))
    }

    /// Locked dates of one work-line within an inclusive range, ascending.
    pub fn locked_dates(&self, work_line_id: &str, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        if end < start {
            return Vec::new();
        }
        let from = CellKey::new(work_line_id, start);
        let to = CellKey::new(work_line_id, end);
        self.locked.range(from..=to).map(|(key, _)| key.date).collect()
    }

    pub fn query(&self, filter: &LockFilter) -> Vec<DaySiteStatus> {
        self.locked
            .values()
            .filter(|status| filter.matches(status))
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DaySiteStatus> {
        self.locked.values()
    }

    pub fn len(&self) -> usize {
        self.locked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked.is_empty()
    }
}
