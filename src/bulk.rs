use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::assignment::{Assignment, CellKey};
use crate::calendar::{HolidayWeekdays, expand_range};
use crate::crew::{MemberId, WorkLineId};
use crate::error::RosterResult;

/// A bulk request: one work-line, a fixed member list, a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAssignment {
    pub work_line_id: WorkLineId,
    pub member_ids: Vec<MemberId>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub holiday_weekdays: HolidayWeekdays,
}

impl BulkAssignment {
    pub fn new<I, M>(work_line_id: impl Into<WorkLineId>, member_ids: I, start: NaiveDate, end: NaiveDate) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MemberId>,
    {
        Self {
            work_line_id: work_line_id.into(),
            member_ids: member_ids.into_iter().map(Into::into).collect(),
            start,
            end,
            holiday_weekdays: HolidayWeekdays::none(),
        }
    }

    pub fn with_holidays(mut self, holiday_weekdays: HolidayWeekdays) -> Self {
        self.holiday_weekdays = holiday_weekdays;
        self
    }

    pub fn build(&self) -> RosterResult<Vec<Assignment>> {
        build_assignments(
            &self.work_line_id,
            &self.member_ids,
            self.start,
            self.end,
            &self.holiday_weekdays,
        )
    }

    /// Every cell this request overwrites, in date order.
    pub fn touched_cells(&self) -> RosterResult<Vec<CellKey>> {
        Ok(expand_range(self.start, self.end)?
            .into_iter()
            .map(|date| CellKey::new(self.work_line_id.clone(), date))
            .collect())
    }
}

/// Build every assignment for a range, day-major then member-minor.
///
/// Duplicate member ids keep their first position. Inputs are assumed to be
/// validated by the caller apart from the range itself.
pub fn build_assignments(
    work_line_id: &str,
    member_ids: &[MemberId],
    start: NaiveDate,
    end: NaiveDate,
    holidays: &HolidayWeekdays,
) -> RosterResult<Vec<Assignment>> {
    let days = expand_range(start, end)?;
    let members = dedup_members(member_ids);

    let mut out = Vec::with_capacity(days.len() * members.len());
    for day in days {
        let holiday = holidays.is_holiday(day);
        for member_id in &members {
            out.push(Assignment::new(work_line_id, member_id.as_str(), day, holiday));
        }
    }
    Ok(out)
}

/// Candidate records for a single cell; an empty member list clears it.
pub fn build_cell(work_line_id: &str, date: NaiveDate, member_ids: &[MemberId], is_holiday: bool) -> Vec<Assignment> {
    dedup_members(member_ids)
        .into_iter()
        .map(|member_id| Assignment::new(work_line_id, member_id.as_str(), date, is_holiday))
        .collect()
}

fn dedup_members(member_ids: &[MemberId]) -> Vec<&MemberId> {
    let mut seen = HashSet::with_capacity(member_ids.len());
    member_ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .collect()
}
