#![cfg(feature = "sqlite")]

use chrono::NaiveDate;
use crew_roster::{
    Assignment, AssignmentFilter, BulkAssignment, DaySiteStatus, InMemoryRosterStore, LockFilter,
    Member, Roster, RosterError, RosterStore, SqliteRosterStore, StaticAuthorizer, WorkLine,
};
use tempfile::NamedTempFile;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

const ADMIN: StaticAuthorizer = StaticAuthorizer::ADMIN;

fn seed(roster: &Roster) {
    roster.upsert_work_line(&ADMIN, &WorkLine::new("L", "Line L")).unwrap();
    for id in ["A", "B", "C"] {
        roster.upsert_member(&ADMIN, &Member::new(id, id)).unwrap();
    }
}

fn working(roster: &Roster, date: NaiveDate) -> Vec<String> {
    roster
        .cell_assignments("L", date)
        .unwrap()
        .into_iter()
        .map(|a| a.member_id)
        .collect()
}

/// Runs the overwrite, lock, unlock and clear scenarios and returns the
/// final stored records so two stores can be compared.
fn exercise(roster: &Roster) -> Vec<Assignment> {
    seed(roster);

    roster
        .bulk_assign(&ADMIN, &BulkAssignment::new("L", ["A", "B"], d(2024, 1, 1), d(2024, 1, 3)))
        .unwrap();
    roster
        .bulk_assign(&ADMIN, &BulkAssignment::new("L", ["C"], d(2024, 1, 2), d(2024, 1, 2)))
        .unwrap();
    assert_eq!(working(roster, d(2024, 1, 1)), vec!["A", "B"]);
    assert_eq!(working(roster, d(2024, 1, 2)), vec!["C"]);
    assert_eq!(working(roster, d(2024, 1, 3)), vec!["A", "B"]);

    roster.lock(&ADMIN, "L", d(2024, 1, 2)).unwrap();
    let err = roster
        .apply_cell(&ADMIN, "L", d(2024, 1, 2), &["A".to_string()], false)
        .unwrap_err();
    assert!(matches!(err, RosterError::CellLocked { .. }));
    assert_eq!(working(roster, d(2024, 1, 2)), vec!["C"]);

    assert!(roster.unlock(&ADMIN, "L", d(2024, 1, 2)).unwrap());
    assert!(!roster.unlock(&ADMIN, "L", d(2024, 1, 2)).unwrap());
    assert!(!roster.is_locked("L", d(2024, 1, 2)).unwrap());

    roster.apply_cell(&ADMIN, "L", d(2024, 1, 3), &[], false).unwrap();
    assert!(working(roster, d(2024, 1, 3)).is_empty());
    assert_eq!(working(roster, d(2024, 1, 1)), vec!["A", "B"]);

    roster.lock(&ADMIN, "L", d(2024, 1, 1)).unwrap();
    roster.snapshot().unwrap().assignments
}

#[test]
fn sqlite_and_memory_stores_agree() {
    let memory = Roster::new(InMemoryRosterStore::new());
    let sqlite = Roster::new(SqliteRosterStore::in_memory().unwrap());

    let from_memory = exercise(&memory);
    let from_sqlite = exercise(&sqlite);
    assert_eq!(from_memory, from_sqlite);

    let locks = |roster: &Roster| roster.snapshot().unwrap().locks;
    assert_eq!(locks(&memory), locks(&sqlite));
}

#[test]
fn sqlite_store_survives_reopen() {
    let file = NamedTempFile::new().unwrap();
    {
        let roster = Roster::new(SqliteRosterStore::new(file.path()).unwrap());
        exercise(&roster);
    }

    let reopened = Roster::new(SqliteRosterStore::new(file.path()).unwrap());
    assert_eq!(working(&reopened, d(2024, 1, 2)), vec!["C"]);
    assert!(reopened.is_locked("L", d(2024, 1, 1)).unwrap());
    assert_eq!(reopened.members().unwrap().len(), 3);
    assert_eq!(reopened.work_lines().unwrap()[0].name, "Line L");
}

#[test]
fn sqlite_store_refuses_negative_lock_records() {
    let store = SqliteRosterStore::in_memory().unwrap();
    let negative = DaySiteStatus {
        work_line_id: "L".into(),
        date: d(2024, 1, 1),
        is_locked: false,
    };
    assert!(store.save_lock(&negative).is_err());
    assert!(store.find_lock("L", d(2024, 1, 1)).unwrap().is_none());

    store.save_lock(&DaySiteStatus::locked("L", d(2024, 1, 1))).unwrap();
    assert!(store.delete_lock("L", d(2024, 1, 1)).unwrap());
    assert!(!store.delete_lock("L", d(2024, 1, 1)).unwrap());
}

#[test]
fn sqlite_member_delete_cascades() {
    let store = SqliteRosterStore::in_memory().unwrap();
    store.save_member(&Member::new("A", "Alice")).unwrap();
    store
        .save_assignments(&[
            Assignment::new("L", "A", d(2024, 1, 1), false),
            Assignment::new("L", "A", d(2024, 1, 2), true),
        ])
        .unwrap();

    assert!(store.delete_member("A").unwrap());
    assert!(store
        .load_assignments(&AssignmentFilter::all())
        .unwrap()
        .is_empty());
    assert!(store.find_member("A").unwrap().is_none());
}

#[test]
fn sqlite_filters_by_cell_and_range() {
    let store = SqliteRosterStore::in_memory().unwrap();
    store
        .save_assignments(&[
            Assignment::new("L", "A", d(2024, 1, 1), false),
            Assignment::new("L", "B", d(2024, 1, 1), false),
            Assignment::new("L", "A", d(2024, 1, 5), false),
            Assignment::new("M", "A", d(2024, 1, 1), false),
        ])
        .unwrap();

    let cell = store
        .load_assignments(&AssignmentFilter::cell("L", d(2024, 1, 1)))
        .unwrap();
    assert_eq!(cell.len(), 2);
    let range = store
        .load_assignments(&AssignmentFilter::range(d(2024, 1, 2), d(2024, 1, 9)))
        .unwrap();
    assert_eq!(range, vec![Assignment::new("L", "A", d(2024, 1, 5), false)]);
    assert_eq!(store.delete_assignments("L", d(2024, 1, 1)).unwrap(), 2);
}

#[test]
fn underscore_ids_do_not_collide_in_either_store() {
    let stores: Vec<Roster> = vec![
        Roster::new(InMemoryRosterStore::new()),
        Roster::new(SqliteRosterStore::in_memory().unwrap()),
    ];
    for roster in &stores {
        for line in ["L", "L_x"] {
            roster.upsert_work_line(&ADMIN, &WorkLine::new(line, line)).unwrap();
        }
        for member in ["x_y", "y"] {
            roster.upsert_member(&ADMIN, &Member::new(member, member)).unwrap();
        }

        // Both assignments render the id "L_x_y_2024-01-02".
        roster
            .apply_cell(&ADMIN, "L", d(2024, 1, 2), &["x_y".to_string()], false)
            .unwrap();
        roster
            .apply_cell(&ADMIN, "L_x", d(2024, 1, 2), &["y".to_string()], true)
            .unwrap();

        let line_l = roster.cell_records("L", d(2024, 1, 2)).unwrap();
        let line_lx = roster.cell_records("L_x", d(2024, 1, 2)).unwrap();
        assert_eq!(line_l, vec![Assignment::new("L", "x_y", d(2024, 1, 2), false)]);
        assert_eq!(line_lx, vec![Assignment::new("L_x", "y", d(2024, 1, 2), true)]);
    }
}

#[test]
fn sqlite_lock_query_is_scoped_to_line_and_range() {
    let store = SqliteRosterStore::in_memory().unwrap();
    for (line, day) in [("L", 1), ("L", 3), ("L", 9), ("M", 3)] {
        store.save_lock(&DaySiteStatus::locked(line, d(2024, 1, day))).unwrap();
    }

    let scoped = store
        .load_locks(&LockFilter::line_range("L", d(2024, 1, 2), d(2024, 1, 9)))
        .unwrap();
    assert_eq!(
        scoped,
        vec![
            DaySiteStatus::locked("L", d(2024, 1, 3)),
            DaySiteStatus::locked("L", d(2024, 1, 9)),
        ]
    );
    assert_eq!(store.load_locks(&LockFilter::all()).unwrap().len(), 4);
    let by_range = store
        .load_locks(&LockFilter {
            work_line_id: None,
            range: Some((d(2024, 1, 3), d(2024, 1, 3))),
        })
        .unwrap();
    assert_eq!(by_range.len(), 2);
}
