use chrono::NaiveDate;
use thiserror::Error;

use crate::calendar::format_date;
use crate::persistence::PersistenceError;

/// Failures surfaced by the roster core. Every mutation failure names the
/// cell(s) or range at fault so callers can highlight them.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("invalid range: end {end} precedes start {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid date '{value}' (expected yyyy-MM-dd)")]
    InvalidDate { value: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("work-line {work_line_id} is locked on {}", join_dates(.dates))]
    CellLocked {
        work_line_id: String,
        dates: Vec<NaiveDate>,
    },

    #[error("permission denied: {operation} requires an admin caller")]
    Permission { operation: &'static str },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl RosterError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn cell_locked(work_line_id: impl Into<String>, dates: Vec<NaiveDate>) -> Self {
        Self::CellLocked {
            work_line_id: work_line_id.into(),
            dates,
        }
    }

    /// Short machine-readable kind, used by the HTTP error body.
    pub fn kind(&self) -> &'static str {
        match self {
            RosterError::InvalidRange { .. } => "invalid_range",
            RosterError::InvalidDate { .. } => "invalid_date",
            RosterError::InvalidInput { .. } => "invalid_request",
            RosterError::CellLocked { .. } => "cell_locked",
            RosterError::Permission { .. } => "permission_denied",
            RosterError::NotFound { .. } => "not_found",
            RosterError::Persistence(_) => "internal_error",
        }
    }
}

fn join_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|d| format_date(*d))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type RosterResult<T> = Result<T, RosterError>;
