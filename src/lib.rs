pub mod assignment;
pub mod auth;
pub mod bulk;
pub mod calendar;
pub mod config;
pub mod crew;
pub mod error;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod locks;
pub mod persistence;
pub mod reconcile;
pub mod roster;

pub use assignment::{Assignment, AssignmentFilter, AssignmentSet, CellKey};
pub use auth::{Authorizer, StaticAuthorizer};
pub use bulk::{BulkAssignment, build_assignments, build_cell};
pub use calendar::{HolidayWeekdays, expand_range, format_date, is_holiday, parse_date};
pub use config::{ConfigError, RosterConfig, init_tracing};
pub use crew::{Member, MemberId, WorkLine, WorkLineId};
pub use error::{RosterError, RosterResult};
pub use locks::{DaySiteStatus, LockFilter, LockRegistry};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteRosterStore;
pub use persistence::{
    InMemoryRosterStore, PersistenceError, RosterSnapshot, RosterStore,
    load_assignments_from_csv, load_roster_from_json, save_assignments_to_csv,
    save_roster_to_json,
};
pub use reconcile::ReconcileBatch;
pub use roster::{GridCell, GridRow, Roster, RosterGrid};
