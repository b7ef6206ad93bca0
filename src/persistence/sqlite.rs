use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use tracing::debug;

use super::{PersistenceError, PersistenceResult, RosterStore, ensure_positive_lock};
use crate::assignment::{Assignment, AssignmentFilter};
use crate::calendar::{format_date, parse_date};
use crate::crew::{Member, WorkLine};
use crate::locks::{DaySiteStatus, LockFilter};
use crate::reconcile::ReconcileBatch;

pub struct SqliteRosterStore {
    connection: Mutex<Connection>,
}

impl SqliteRosterStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::from_connection(connection)
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> PersistenceResult<Self> {
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS members (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS work_lines (
                id TEXT PRIMARY KEY,
                project_id TEXT,
                name TEXT NOT NULL,
                color TEXT
            );
            CREATE TABLE IF NOT EXISTS assignments (
                id TEXT NOT NULL,
                work_line_id TEXT NOT NULL,
                member_id TEXT NOT NULL,
                date TEXT NOT NULL,
                is_holiday INTEGER NOT NULL DEFAULT 0,
                is_confirmed INTEGER NOT NULL DEFAULT 0,
                UNIQUE (work_line_id, member_id, date)
            );
            CREATE INDEX IF NOT EXISTS idx_assignments_cell ON assignments(work_line_id, date);
            CREATE INDEX IF NOT EXISTS idx_assignments_member ON assignments(member_id);
            CREATE TABLE IF NOT EXISTS day_site_status (
                id TEXT PRIMARY KEY,
                work_line_id TEXT NOT NULL,
                date TEXT NOT NULL,
                is_locked INTEGER NOT NULL CHECK (is_locked = 1)
            );
            CREATE INDEX IF NOT EXISTS idx_day_site_status_cell ON day_site_status(work_line_id, date);
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn upsert_assignment(tx: &Transaction, assignment: &Assignment) -> PersistenceResult<()> {
        tx.execute(
            "INSERT INTO assignments (id, work_line_id, member_id, date, is_holiday, is_confirmed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(work_line_id, member_id, date) DO UPDATE SET
                is_holiday = excluded.is_holiday,
                is_confirmed = excluded.is_confirmed",
            params![
                assignment.id(),
                assignment.work_line_id,
                assignment.member_id,
                format_date(assignment.date),
                assignment.is_holiday,
                assignment.is_confirmed,
            ],
        )?;
        Ok(())
    }

    fn insert_lock(tx: &Transaction, status: &DaySiteStatus) -> PersistenceResult<()> {
        tx.execute(
            "INSERT OR IGNORE INTO day_site_status (id, work_line_id, date, is_locked)
             VALUES (?1, ?2, ?3, 1)",
            params![status.id(), status.work_line_id, format_date(status.date)],
        )?;
        Ok(())
    }
}

fn lock_id(work_line_id: &str, date: NaiveDate) -> String {
    DaySiteStatus::locked(work_line_id, date).id()
}

fn stored_date(value: &str) -> PersistenceResult<NaiveDate> {
    parse_date(value).map_err(|err| PersistenceError::InvalidData(err.to_string()))
}

type AssignmentRow = (String, String, String, bool, bool);

fn assignment_from_row(row: AssignmentRow) -> PersistenceResult<Assignment> {
    let (work_line_id, member_id, date, is_holiday, is_confirmed) = row;
    Ok(Assignment {
        work_line_id,
        member_id,
        date: stored_date(&date)?,
        is_holiday,
        is_confirmed,
    })
}

impl RosterStore for SqliteRosterStore {
    fn load_assignments(&self, filter: &AssignmentFilter) -> PersistenceResult<Vec<Assignment>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(line) = &filter.work_line_id {
            values.push(line.clone());
            clauses.push(format!("work_line_id = ?{}", values.len()));
        }
        if let Some(member) = &filter.member_id {
            values.push(member.clone());
            clauses.push(format!("member_id = ?{}", values.len()));
        }
        if let Some(date) = filter.date {
            values.push(format_date(date));
            clauses.push(format!("date = ?{}", values.len()));
        }
        if let Some((start, end)) = filter.range {
            values.push(format_date(start));
            clauses.push(format!("date >= ?{}", values.len()));
            values.push(format_date(end));
            clauses.push(format!("date <= ?{}", values.len()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT work_line_id, member_id, date, is_holiday, is_confirmed FROM assignments
             {where_sql} ORDER BY work_line_id, date, rowid"
        );

        let conn = self.connection.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(values.iter()),
            |row| -> rusqlite::Result<AssignmentRow> {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            },
        )?;

        let mut assignments = Vec::new();
        for row in rows {
            assignments.push(assignment_from_row(row?)?);
        }
        Ok(assignments)
    }

    fn save_assignments(&self, assignments: &[Assignment]) -> PersistenceResult<()> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        for assignment in assignments {
            Self::upsert_assignment(&tx, assignment)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_assignments(&self, work_line_id: &str, date: NaiveDate) -> PersistenceResult<usize> {
        let conn = self.connection.lock();
        let removed = conn.execute(
            "DELETE FROM assignments WHERE work_line_id = ?1 AND date = ?2",
            params![work_line_id, format_date(date)],
        )?;
        Ok(removed)
    }

    fn load_locks(&self, filter: &LockFilter) -> PersistenceResult<Vec<DaySiteStatus>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(line) = &filter.work_line_id {
            values.push(line.clone());
            clauses.push(format!("work_line_id = ?{}", values.len()));
        }
        if let Some((start, end)) = filter.range {
            values.push(format_date(start));
            clauses.push(format!("date >= ?{}", values.len()));
            values.push(format_date(end));
            clauses.push(format!("date <= ?{}", values.len()));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT work_line_id, date FROM day_site_status {where_sql} ORDER BY work_line_id, date"
        );

        let conn = self.connection.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(values.iter()),
            |row| -> rusqlite::Result<(String, String)> { Ok((row.get(0)?, row.get(1)?)) },
        )?;

        let mut locks = Vec::new();
        for row in rows {
            let (work_line_id, date) = row?;
            locks.push(DaySiteStatus::locked(work_line_id, stored_date(&date)?));
        }
        Ok(locks)
    }

    fn find_lock(&self, work_line_id: &str, date: NaiveDate) -> PersistenceResult<Option<DaySiteStatus>> {
        let conn = self.connection.lock();
        let found: Option<String> = conn
            .query_row(
                "SELECT id FROM day_site_status WHERE id = ?1",
                params![lock_id(work_line_id, date)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.map(|_| DaySiteStatus::locked(work_line_id, date)))
    }

    fn save_lock(&self, status: &DaySiteStatus) -> PersistenceResult<()> {
        ensure_positive_lock(status)?;
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        Self::insert_lock(&tx, status)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_lock(&self, work_line_id: &str, date: NaiveDate) -> PersistenceResult<bool> {
        let conn = self.connection.lock();
        let removed = conn.execute(
            "DELETE FROM day_site_status WHERE id = ?1",
            params![lock_id(work_line_id, date)],
        )?;
        Ok(removed > 0)
    }

    fn commit(&self, batch: &ReconcileBatch) -> PersistenceResult<()> {
        for status in batch.locks() {
            ensure_positive_lock(status)?;
        }
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        for key in batch.replaced_cells() {
            tx.execute(
                "DELETE FROM assignments WHERE work_line_id = ?1 AND date = ?2",
                params![key.work_line_id, format_date(key.date)],
            )?;
        }
        for assignment in batch.inserts() {
            Self::upsert_assignment(&tx, assignment)?;
        }
        for key in batch.unlocks() {
            tx.execute(
                "DELETE FROM day_site_status WHERE id = ?1",
                params![lock_id(&key.work_line_id, key.date)],
            )?;
        }
        for status in batch.locks() {
            Self::insert_lock(&tx, status)?;
        }
        tx.commit()?;
        debug!(
            cells = batch.replaced_cells().len(),
            inserts = batch.inserts().len(),
            "committed batch to sqlite store"
        );
        Ok(())
    }

    fn load_members(&self) -> PersistenceResult<Vec<Member>> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare("SELECT id, name FROM members ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| Ok(Member::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut members = Vec::new();
        for member in rows {
            members.push(member?);
        }
        Ok(members)
    }

    fn find_member(&self, id: &str) -> PersistenceResult<Option<Member>> {
        let conn = self.connection.lock();
        let member = conn
            .query_row(
                "SELECT id, name FROM members WHERE id = ?1",
                params![id],
                |row| Ok(Member::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(member)
    }

    fn save_member(&self, member: &Member) -> PersistenceResult<()> {
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO members (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![member.id, member.name],
        )?;
        Ok(())
    }

    fn delete_member(&self, id: &str) -> PersistenceResult<bool> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        let cascaded = tx.execute("DELETE FROM assignments WHERE member_id = ?1", params![id])?;
        let removed = tx.execute("DELETE FROM members WHERE id = ?1", params![id])?;
        tx.commit()?;
        debug!(member = id, cascaded, "deleted member from sqlite store");
        Ok(removed > 0)
    }

    fn load_work_lines(&self) -> PersistenceResult<Vec<WorkLine>> {
        let conn = self.connection.lock();
        let mut stmt =
            conn.prepare("SELECT id, project_id, name, color FROM work_lines ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(WorkLine {
                id: row.get(0)?,
                project_id: row.get(1)?,
                name: row.get(2)?,
                color: row.get(3)?,
            })
        })?;
        let mut lines = Vec::new();
        for line in rows {
            lines.push(line?);
        }
        Ok(lines)
    }

    fn find_work_line(&self, id: &str) -> PersistenceResult<Option<WorkLine>> {
        let conn = self.connection.lock();
        let line = conn
            .query_row(
                "SELECT id, project_id, name, color FROM work_lines WHERE id = ?1",
                params![id],
                |row| {
                    Ok(WorkLine {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                        name: row.get(2)?,
                        color: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(line)
    }

    fn save_work_line(&self, work_line: &WorkLine) -> PersistenceResult<()> {
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO work_lines (id, project_id, name, color) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                name = excluded.name,
                color = excluded.color",
            params![work_line.id, work_line.project_id, work_line.name, work_line.color],
        )?;
        Ok(())
    }
}
