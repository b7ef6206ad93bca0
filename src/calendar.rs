use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{RosterError, RosterResult};

/// Canonical on-disk / on-the-wire date format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `yyyy-MM-dd` string as a local calendar date.
///
/// The date is built straight from its year/month/day components, so no
/// timezone or instant conversion can shift it by a day.
pub fn parse_date(value: &str) -> RosterResult<NaiveDate> {
    let invalid = || RosterError::InvalidDate {
        value: value.to_string(),
    };

    let mut parts = value.trim().split('-');
    let (Some(y), Some(m), Some(d), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    if y.len() != 4 || m.len() != 2 || d.len() != 2 {
        return Err(invalid());
    }
    if !(y.bytes().chain(m.bytes()).chain(d.bytes())).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let year: i32 = y.parse().map_err(|_| invalid())?;
    let month: u32 = m.parse().map_err(|_| invalid())?;
    let day: u32 = d.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Number of days from `start` to `end` (negative when `end < start`).
pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Expand an inclusive date range into one entry per calendar day.
pub fn expand_range(start: NaiveDate, end: NaiveDate) -> RosterResult<Vec<NaiveDate>> {
    if end < start {
        return Err(RosterError::InvalidRange { start, end });
    }

    let mut days = Vec::with_capacity(days_between(start, end) as usize + 1);
    let mut current = start;
    while current <= end {
        days.push(current);
        current = current + Duration::days(1);
    }
    Ok(days)
}

/// 0=Sunday .. 6=Saturday, taken from the calendar date itself.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Weekdays treated as non-working for an assignment scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct HolidayWeekdays {
    days: BTreeSet<u8>,
}

impl HolidayWeekdays {
    const ALL_WEEKDAYS: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    pub fn none() -> Self {
        Self::default()
    }

    /// Saturday and Sunday.
    pub fn weekend() -> Self {
        Self {
            days: BTreeSet::from([0, 6]),
        }
    }

    pub fn from_indices<I>(indices: I) -> RosterResult<Self>
    where
        I: IntoIterator<Item = u8>,
    {
        let mut days = BTreeSet::new();
        for idx in indices {
            if idx > 6 {
                return Err(RosterError::invalid_input(format!(
                    "holiday weekday {idx} is out of range (0=Sunday..6=Saturday)"
                )));
            }
            days.insert(idx);
        }
        Ok(Self { days })
    }

    pub fn from_weekdays<I>(weekdays: I) -> Self
    where
        I: IntoIterator<Item = Weekday>,
    {
        Self {
            days: weekdays
                .into_iter()
                .map(|wd| wd.num_days_from_sunday() as u8)
                .collect(),
        }
    }

    /// Parse a comma separated list such as `0,6`. Blank input is the empty set.
    pub fn parse_csv(value: &str) -> RosterResult<Self> {
        let mut indices = Vec::new();
        for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let idx = part.parse::<u8>().map_err(|_| {
                RosterError::invalid_input(format!("invalid holiday weekday '{part}'"))
            })?;
            indices.push(idx);
        }
        Self::from_indices(indices)
    }

    pub fn insert(&mut self, weekday: Weekday) {
        self.days.insert(weekday.num_days_from_sunday() as u8);
    }

    pub fn contains(&self, weekday: Weekday) -> bool {
        self.days.contains(&(weekday.num_days_from_sunday() as u8))
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn indices(&self) -> Vec<u8> {
        self.days.iter().copied().collect()
    }

    pub fn weekdays(&self) -> Vec<Weekday> {
        self.days
            .iter()
            .map(|idx| Self::ALL_WEEKDAYS[*idx as usize])
            .collect()
    }

    /// Whether an assignment on `date` is a holiday placeholder.
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.days.contains(&weekday_index(date))
    }
}

/// Holiday policy as a free function, for callers holding only a set.
pub fn is_holiday(date: NaiveDate, holidays: &HolidayWeekdays) -> bool {
    holidays.is_holiday(date)
}

impl TryFrom<Vec<u8>> for HolidayWeekdays {
    type Error = RosterError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_indices(value)
    }
}

impl From<HolidayWeekdays> for Vec<u8> {
    fn from(value: HolidayWeekdays) -> Self {
        value.indices()
    }
}

impl fmt::Display for HolidayWeekdays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self
            .weekdays()
            .iter()
            .map(|wd| wd.to_string())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{names}")
    }
}
