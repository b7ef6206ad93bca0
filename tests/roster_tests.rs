use chrono::NaiveDate;
use std::sync::Arc;
use std::thread;

use crew_roster::{
    BulkAssignment, HolidayWeekdays, InMemoryRosterStore, Member, Roster, RosterError,
    StaticAuthorizer, WorkLine,
};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

const ADMIN: StaticAuthorizer = StaticAuthorizer::ADMIN;
const VIEWER: StaticAuthorizer = StaticAuthorizer::VIEWER;

fn seeded_roster() -> Roster {
    let roster = Roster::new(InMemoryRosterStore::new());
    roster.upsert_work_line(&ADMIN, &WorkLine::new("L", "Line L")).unwrap();
    roster.upsert_work_line(&ADMIN, &WorkLine::new("M", "Line M")).unwrap();
    for (id, name) in [("A", "Alice"), ("B", "Bruno"), ("C", "Chen")] {
        roster.upsert_member(&ADMIN, &Member::new(id, name)).unwrap();
    }
    roster
}

fn working(roster: &Roster, line: &str, date: NaiveDate) -> Vec<String> {
    roster
        .cell_assignments(line, date)
        .unwrap()
        .into_iter()
        .map(|a| a.member_id)
        .collect()
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn bulk_overwrites_only_the_touched_days() {
    let roster = seeded_roster();
    roster
        .bulk_assign(&ADMIN, &BulkAssignment::new("L", ["A", "B"], d(2024, 1, 1), d(2024, 1, 3)))
        .unwrap();
    roster
        .bulk_assign(&ADMIN, &BulkAssignment::new("L", ["C"], d(2024, 1, 2), d(2024, 1, 2)))
        .unwrap();

    assert_eq!(working(&roster, "L", d(2024, 1, 1)), ids(&["A", "B"]));
    assert_eq!(working(&roster, "L", d(2024, 1, 2)), ids(&["C"]));
    assert_eq!(working(&roster, "L", d(2024, 1, 3)), ids(&["A", "B"]));
}

#[test]
fn bulk_leaves_other_work_lines_alone() {
    let roster = seeded_roster();
    roster.apply_cell(&ADMIN, "M", d(2024, 1, 2), &ids(&["C"]), false).unwrap();
    roster
        .bulk_assign(&ADMIN, &BulkAssignment::new("L", ["A"], d(2024, 1, 1), d(2024, 1, 3)))
        .unwrap();
    assert_eq!(working(&roster, "M", d(2024, 1, 2)), ids(&["C"]));
}

#[test]
fn apply_cell_on_locked_day_is_rejected() {
    let roster = seeded_roster();
    roster.apply_cell(&ADMIN, "L", d(2024, 1, 2), &ids(&["A"]), false).unwrap();
    roster.lock(&ADMIN, "L", d(2024, 1, 2)).unwrap();

    let err = roster
        .apply_cell(&ADMIN, "L", d(2024, 1, 2), &ids(&["B"]), false)
        .unwrap_err();
    match err {
        RosterError::CellLocked { work_line_id, dates } => {
            assert_eq!(work_line_id, "L");
            assert_eq!(dates, vec![d(2024, 1, 2)]);
        }
        other => panic!("expected CellLocked, got {other:?}"),
    }
    assert_eq!(working(&roster, "L", d(2024, 1, 2)), ids(&["A"]));
}

#[test]
fn bulk_over_locked_days_fails_atomically() {
    let roster = seeded_roster();
    roster
        .bulk_assign(&ADMIN, &BulkAssignment::new("L", ["A"], d(2024, 1, 1), d(2024, 1, 5)))
        .unwrap();
    roster.lock(&ADMIN, "L", d(2024, 1, 2)).unwrap();
    roster.lock(&ADMIN, "L", d(2024, 1, 4)).unwrap();

    let err = roster
        .bulk_assign(&ADMIN, &BulkAssignment::new("L", ["B"], d(2024, 1, 1), d(2024, 1, 5)))
        .unwrap_err();
    match &err {
        RosterError::CellLocked { dates, .. } => {
            assert_eq!(dates, &vec![d(2024, 1, 2), d(2024, 1, 4)]);
        }
        other => panic!("expected CellLocked, got {other:?}"),
    }
    assert!(err.to_string().contains("2024-01-02, 2024-01-04"));

    for day in 1..=5 {
        assert_eq!(working(&roster, "L", d(2024, 1, day)), ids(&["A"]));
    }
}

#[test]
fn empty_member_list_clears_one_cell() {
    let roster = seeded_roster();
    roster
        .bulk_assign(&ADMIN, &BulkAssignment::new("L", ["A", "B"], d(2024, 1, 1), d(2024, 1, 3)))
        .unwrap();

    let written = roster.apply_cell(&ADMIN, "L", d(2024, 1, 2), &[], false).unwrap();
    assert!(written.is_empty());
    assert!(roster.cell_records("L", d(2024, 1, 2)).unwrap().is_empty());
    assert_eq!(working(&roster, "L", d(2024, 1, 1)), ids(&["A", "B"]));
    assert_eq!(working(&roster, "L", d(2024, 1, 3)), ids(&["A", "B"]));
}

#[test]
fn viewer_cannot_mutate_anything() {
    let roster = seeded_roster();
    roster.apply_cell(&ADMIN, "L", d(2024, 1, 1), &ids(&["A"]), false).unwrap();

    let attempts = [
        roster
            .bulk_assign(&VIEWER, &BulkAssignment::new("L", ["B"], d(2024, 1, 1), d(2024, 1, 2)))
            .map(|_| ()),
        roster.apply_cell(&VIEWER, "L", d(2024, 1, 1), &ids(&["B"]), false).map(|_| ()),
        roster.lock(&VIEWER, "L", d(2024, 1, 1)).map(|_| ()),
        roster.unlock(&VIEWER, "L", d(2024, 1, 1)).map(|_| ()),
        roster.upsert_member(&VIEWER, &Member::new("D", "Dee")),
        roster.delete_member(&VIEWER, "A").map(|_| ()),
    ];
    for result in attempts {
        assert!(matches!(result, Err(RosterError::Permission { .. })));
    }

    assert_eq!(working(&roster, "L", d(2024, 1, 1)), ids(&["A"]));
    assert!(!roster.is_locked("L", d(2024, 1, 1)).unwrap());
    assert_eq!(roster.members().unwrap().len(), 3);
}

#[test]
fn bool_works_as_an_authorizer() {
    let roster = seeded_roster();
    assert!(matches!(
        roster.lock(&false, "L", d(2024, 1, 1)),
        Err(RosterError::Permission { .. })
    ));
    roster.lock(&true, "L", d(2024, 1, 1)).unwrap();
}

#[test]
fn holiday_records_are_hidden_from_working_view() {
    let roster = seeded_roster();
    // Monday 2024-01-01 through Sunday 2024-01-07
    roster
        .bulk_assign(
            &ADMIN,
            &BulkAssignment::new("L", ["A"], d(2024, 1, 1), d(2024, 1, 7))
                .with_holidays(HolidayWeekdays::weekend()),
        )
        .unwrap();

    assert!(working(&roster, "L", d(2024, 1, 6)).is_empty());
    let stored = roster.cell_records("L", d(2024, 1, 6)).unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].is_holiday);
    assert_eq!(working(&roster, "L", d(2024, 1, 5)), ids(&["A"]));
}

#[test]
fn cell_policy_follows_the_cells_weekday() {
    let roster = seeded_roster();
    let weekend = HolidayWeekdays::weekend();
    let saturday = roster
        .apply_cell_with_policy(&ADMIN, "L", d(2024, 1, 6), &ids(&["A"]), &weekend)
        .unwrap();
    let monday = roster
        .apply_cell_with_policy(&ADMIN, "L", d(2024, 1, 8), &ids(&["A"]), &weekend)
        .unwrap();
    assert!(saturday[0].is_holiday);
    assert!(!monday[0].is_holiday);
}

#[test]
fn working_view_keeps_member_insertion_order() {
    let roster = seeded_roster();
    roster.apply_cell(&ADMIN, "L", d(2024, 1, 1), &ids(&["C", "A", "B"]), false).unwrap();
    assert_eq!(working(&roster, "L", d(2024, 1, 1)), ids(&["C", "A", "B"]));
}

#[test]
fn deleting_a_member_cascades_to_assignments() {
    let roster = seeded_roster();
    roster
        .bulk_assign(&ADMIN, &BulkAssignment::new("L", ["A", "B"], d(2024, 1, 1), d(2024, 1, 2)))
        .unwrap();

    assert!(roster.delete_member(&ADMIN, "A").unwrap());
    assert!(!roster.delete_member(&ADMIN, "A").unwrap());

    assert_eq!(working(&roster, "L", d(2024, 1, 1)), ids(&["B"]));
    let remaining = roster.cell_records("L", d(2024, 1, 2)).unwrap();
    assert!(remaining.iter().all(|a| a.member_id != "A"));
}

#[test]
fn unknown_references_are_rejected_before_writing() {
    let roster = seeded_roster();
    let err = roster
        .bulk_assign(&ADMIN, &BulkAssignment::new("X", ["A"], d(2024, 1, 1), d(2024, 1, 2)))
        .unwrap_err();
    assert!(matches!(err, RosterError::NotFound { kind: "work-line", .. }));

    let err = roster
        .bulk_assign(&ADMIN, &BulkAssignment::new("L", ["A", "Z"], d(2024, 1, 1), d(2024, 1, 2)))
        .unwrap_err();
    assert!(matches!(err, RosterError::NotFound { kind: "member", .. }));
    assert!(roster.cell_records("L", d(2024, 1, 1)).unwrap().is_empty());
}

#[test]
fn invalid_bulk_range_is_reported() {
    let roster = seeded_roster();
    let err = roster
        .bulk_assign(&ADMIN, &BulkAssignment::new("L", ["A"], d(2024, 1, 3), d(2024, 1, 1)))
        .unwrap_err();
    assert!(matches!(err, RosterError::InvalidRange { .. }));
}

#[test]
fn grid_shows_members_holidays_and_locks() {
    let roster = seeded_roster();
    roster
        .bulk_assign(
            &ADMIN,
            &BulkAssignment::new("L", ["A", "B"], d(2024, 1, 5), d(2024, 1, 6))
                .with_holidays(HolidayWeekdays::weekend()),
        )
        .unwrap();
    roster.lock(&ADMIN, "L", d(2024, 1, 5)).unwrap();

    let grid = roster.grid(d(2024, 1, 5), d(2024, 1, 6)).unwrap();
    assert_eq!(grid.days, vec![d(2024, 1, 5), d(2024, 1, 6)]);
    let names: Vec<&str> = grid.rows.iter().map(|r| r.work_line.name.as_str()).collect();
    assert_eq!(names, vec!["Line L", "Line M"]);

    let line_l = &grid.rows[0];
    assert_eq!(line_l.cells[0].members, ids(&["A", "B"]));
    assert!(line_l.cells[0].locked);
    assert!(line_l.cells[1].members.is_empty());
    assert_eq!(line_l.cells[1].holiday_members, ids(&["A", "B"]));
    assert!(!line_l.cells[1].locked);

    assert!(grid.rows[1].cells.iter().all(|c| c.members.is_empty() && !c.locked));
}

#[test]
fn concurrent_full_replace_writes_never_mix() {
    let roster = Arc::new(seeded_roster());
    roster.upsert_member(&ADMIN, &Member::new("D", "Dara")).unwrap();
    let writer_sets: Vec<Vec<String>> = vec![ids(&["A", "B"]), ids(&["C", "D"]), ids(&["B", "C", "D"])];

    let handles: Vec<_> = writer_sets
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, members)| {
            let roster = Arc::clone(&roster);
            thread::spawn(move || {
                for round in 0..50 {
                    if (round + i) % 2 == 0 {
                        let request = BulkAssignment::new("L", members.clone(), d(2024, 1, 1), d(2024, 1, 5));
                        roster.bulk_assign(&ADMIN, &request).unwrap();
                    } else {
                        roster.apply_cell(&ADMIN, "L", d(2024, 1, 3), &members, false).unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for day in 1..=5 {
        let cell = working(&roster, "L", d(2024, 1, day));
        assert!(writer_sets.contains(&cell), "mixed cell on day {day}: {cell:?}");
    }
}

#[test]
fn lock_racing_bulk_writes_freezes_the_cell() {
    let roster = Arc::new(seeded_roster());
    roster
        .bulk_assign(&ADMIN, &BulkAssignment::new("L", ["A"], d(2024, 1, 1), d(2024, 1, 5)))
        .unwrap();

    let writers: Vec<_> = [ids(&["B"]), ids(&["C"]), ids(&["A", "C"])]
        .into_iter()
        .map(|members| {
            let roster = Arc::clone(&roster);
            thread::spawn(move || {
                for _ in 0..50 {
                    let request = BulkAssignment::new("L", members.clone(), d(2024, 1, 1), d(2024, 1, 5));
                    match roster.bulk_assign(&ADMIN, &request) {
                        Ok(_) | Err(RosterError::CellLocked { .. }) => {}
                        Err(other) => panic!("unexpected error: {other:?}"),
                    }
                }
            })
        })
        .collect();

    let locker = {
        let roster = Arc::clone(&roster);
        thread::spawn(move || {
            thread::yield_now();
            roster.lock(&ADMIN, "L", d(2024, 1, 3)).unwrap();
            working(&roster, "L", d(2024, 1, 3))
        })
    };

    let frozen = locker.join().unwrap();
    for handle in writers {
        handle.join().unwrap();
    }

    assert!(roster.is_locked("L", d(2024, 1, 3)).unwrap());
    assert_eq!(working(&roster, "L", d(2024, 1, 3)), frozen);
}
