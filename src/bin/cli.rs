use chrono::NaiveDate;
use crew_roster::{
    Authorizer, BulkAssignment, HolidayWeekdays, InMemoryRosterStore, Member, MemberId, Roster, RosterConfig,
    RosterError, RosterGrid, RosterSnapshot, StaticAuthorizer, WorkLine, format_date,
    load_roster_from_json, parse_date, save_assignments_to_csv, save_roster_to_json,
};
use std::io::{self, Write};

fn parse_member_list(s: &str) -> Vec<MemberId> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != "-")
        .map(ToOwned::to_owned)
        .collect()
}

fn render_grid_as_text_table(grid: &RosterGrid) -> String {
    let mut header: Vec<String> = vec!["work_line".to_string()];
    header.extend(grid.days.iter().map(|d| format_date(*d)));

    let mut rows: Vec<Vec<String>> = Vec::with_capacity(grid.rows.len());
    for row in &grid.rows {
        let mut cells = vec![format!("{} ({})", row.work_line.name, row.work_line.id)];
        for cell in &row.cells {
            let mut s = cell.members.join(",");
            if !cell.holiday_members.is_empty() {
                if !s.is_empty() {
                    s.push(' ');
                }
                s.push_str(&format!("[{}]", cell.holiday_members.join(",")));
            }
            if cell.locked {
                s.push_str(" #");
            }
            cells.push(s);
        }
        rows.push(cells);
    }

    // Compute column widths
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (ci, s) in row.iter().enumerate() {
            if s.len() > widths[ci] {
                widths[ci] = s.len();
            }
        }
    }

    let mut sep = String::new();
    sep.push('+');
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let push_row = |out: &mut String, values: &[String]| {
        out.push('|');
        for (ci, s) in values.iter().enumerate() {
            out.push(' ');
            out.push_str(s);
            let pad = widths[ci].saturating_sub(s.len());
            if pad > 0 {
                out.push_str(&" ".repeat(pad));
            }
            out.push(' ');
            out.push('|');
        }
        out.push('\n');
    };

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    push_row(&mut out, &header);
    out.push_str(&sep);
    out.push('\n');
    for row in &rows {
        push_row(&mut out, row);
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn print_help() {
    println!(
        "Commands:\n  help                                       Show this help\n  member add <id> <name...>                  Add or rename a member\n  member rm <id>                             Delete a member and their assignments\n  members                                    List members\n  line add <id> <name...>                    Add or rename a work-line\n  lines                                      List work-lines\n  assign <line> <start> <end> <members_csv> [holiday_csv]\n                                             Bulk assign a date range (holidays like 0,6)\n  cell <line> <date> [members_csv|-] [holiday]\n                                             Replace one cell (no members clears it)\n  show <line> <date>                         Show who works a cell\n  lock <line> <date>                         Confirm (lock) a cell\n  unlock <line> <date>                       Unlock a cell\n  locked <line> <start> <end>                List locked dates\n  grid <start> <end>                         Show the roster grid ([..] holiday, # locked)\n  holidays <csv>                             Set default holiday weekdays for assign\n  role <admin|viewer>                        Switch caller role\n  save <json|csv> <path>                     Persist roster to disk\n  load json <path>                           Load roster from disk\n  quit|exit                                  Exit"
    );
}

fn report(result: Result<String, RosterError>) {
    match result {
        Ok(message) => println!("{message}"),
        Err(err) => println!("Error: {err}"),
    }
}

fn attempt<F>(command: F)
where
    F: FnOnce() -> Result<String, RosterError>,
{
    report(command());
}

fn date_arg(value: Option<&str>, usage: &str) -> Result<NaiveDate, RosterError> {
    let value = value.ok_or_else(|| RosterError::invalid_input(format!("usage: {usage}")))?;
    parse_date(value)
}

fn text_arg<'a>(value: Option<&'a str>, usage: &str) -> Result<&'a str, RosterError> {
    value.ok_or_else(|| RosterError::invalid_input(format!("usage: {usage}")))
}

fn main() {
    let config = match RosterConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            RosterConfig::default()
        }
    };
    crew_roster::init_tracing(&RosterConfig {
        log_filter: "warn".to_string(),
        ..config.clone()
    });

    let mut roster = Roster::new(InMemoryRosterStore::new());
    let mut auth = StaticAuthorizer::ADMIN;
    let mut default_holidays = config.default_holiday_weekdays.clone();

    println!("Crew Roster (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "member" => match parts.next() {
                Some("add") => attempt(|| {
                    let id = text_arg(parts.next(), "member add <id> <name...>")?;
                    let name = parts.clone().collect::<Vec<_>>().join(" ");
                    let name = if name.is_empty() { id.to_string() } else { name };
                    roster.upsert_member(&auth, &Member::new(id, name.clone()))?;
                    Ok(format!("Member {id} saved ({name})."))
                }),
                Some("rm") => attempt(|| {
                    let id = text_arg(parts.next(), "member rm <id>")?;
                    Ok(if roster.delete_member(&auth, id)? {
                        format!("Deleted member {id}.")
                    } else {
                        format!("Member {id} not found.")
                    })
                }),
                _ => println!("Usage: member <add|rm> ..."),
            },
            "members" => report(roster.members().map(|members| {
                members
                    .iter()
                    .map(|m| format!("  {:<12} {}", m.id, m.name))
                    .collect::<Vec<_>>()
                    .join("\n")
            })),
            "line" => match parts.next() {
                Some("add") => attempt(|| {
                    let id = text_arg(parts.next(), "line add <id> <name...>")?;
                    let name = parts.clone().collect::<Vec<_>>().join(" ");
                    let name = if name.is_empty() { id.to_string() } else { name };
                    roster.upsert_work_line(&auth, &WorkLine::new(id, name.clone()))?;
                    Ok(format!("Work-line {id} saved ({name})."))
                }),
                _ => println!("Usage: line add <id> <name...>"),
            },
            "lines" => report(roster.work_lines().map(|lines| {
                lines
                    .iter()
                    .map(|l| format!("  {:<12} {}", l.id, l.name))
                    .collect::<Vec<_>>()
                    .join("\n")
            })),
            "assign" => attempt(|| {
                let usage = "assign <line> <start> <end> <members_csv> [holiday_csv]";
                let work_line = text_arg(parts.next(), usage)?;
                let start = date_arg(parts.next(), usage)?;
                let end = date_arg(parts.next(), usage)?;
                let members = parse_member_list(text_arg(parts.next(), usage)?);
                let holidays = match parts.next() {
                    Some(csv) => HolidayWeekdays::parse_csv(csv)?,
                    None => default_holidays.clone(),
                };
                let request =
                    BulkAssignment::new(work_line, members, start, end).with_holidays(holidays);
                let records = roster.bulk_assign(&auth, &request)?;
                Ok(format!(
                    "Assigned {} record(s) to {} from {} to {}.",
                    records.len(),
                    work_line,
                    format_date(start),
                    format_date(end)
                ))
            }),
            "cell" => attempt(|| {
                let usage = "cell <line> <date> [members_csv|-] [holiday]";
                let work_line = text_arg(parts.next(), usage)?;
                let date = date_arg(parts.next(), usage)?;
                let members = parts.next().map(parse_member_list).unwrap_or_default();
                let is_holiday = parts.next() == Some("holiday");
                let records = roster.apply_cell(&auth, work_line, date, &members, is_holiday)?;
                Ok(if records.is_empty() {
                    format!("Cleared {} {}.", work_line, format_date(date))
                } else {
                    format!(
                        "Cell {} {} set to {}.",
                        work_line,
                        format_date(date),
                        records
                            .iter()
                            .map(|a| a.member_id.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                })
            }),
            "show" => attempt(|| {
                let usage = "show <line> <date>";
                let work_line = text_arg(parts.next(), usage)?;
                let date = date_arg(parts.next(), usage)?;
                let working = roster.cell_assignments(work_line, date)?;
                let names = working
                    .iter()
                    .map(|a| a.member_id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let lock = if roster.is_locked(work_line, date)? { " (locked)" } else { "" };
                Ok(format!("Cell {} {}{}: {}", work_line, format_date(date), lock, names))
            }),
            "lock" => attempt(|| {
                let usage = "lock <line> <date>";
                let work_line = text_arg(parts.next(), usage)?;
                let date = date_arg(parts.next(), usage)?;
                roster.lock(&auth, work_line, date)?;
                Ok(format!("Locked {} {}.", work_line, format_date(date)))
            }),
            "unlock" => attempt(|| {
                let usage = "unlock <line> <date>";
                let work_line = text_arg(parts.next(), usage)?;
                let date = date_arg(parts.next(), usage)?;
                Ok(if roster.unlock(&auth, work_line, date)? {
                    format!("Unlocked {} {}.", work_line, format_date(date))
                } else {
                    format!("{} {} was not locked.", work_line, format_date(date))
                })
            }),
            "locked" => attempt(|| {
                let usage = "locked <line> <start> <end>";
                let work_line = text_arg(parts.next(), usage)?;
                let start = date_arg(parts.next(), usage)?;
                let end = date_arg(parts.next(), usage)?;
                let dates = roster.locked_dates(work_line, start, end)?;
                Ok(format!(
                    "Locked dates for {}: {}",
                    work_line,
                    dates.iter().map(|d| format_date(*d)).collect::<Vec<_>>().join(", ")
                ))
            }),
            "grid" => attempt(|| {
                let usage = "grid <start> <end>";
                let start = date_arg(parts.next(), usage)?;
                let end = date_arg(parts.next(), usage)?;
                Ok(render_grid_as_text_table(&roster.grid(start, end)?))
            }),
            "holidays" => attempt(|| {
                default_holidays = HolidayWeekdays::parse_csv(parts.next().unwrap_or(""))?;
                Ok(format!("Default holiday weekdays: {:?}", default_holidays.indices()))
            }),
            "role" => match parts.next() {
                Some("admin") => {
                    auth = StaticAuthorizer::ADMIN;
                    println!("Role set to admin.");
                }
                Some("viewer") => {
                    auth = StaticAuthorizer::VIEWER;
                    println!("Role set to viewer.");
                }
                _ => println!("Usage: role <admin|viewer>"),
            },
            "save" => {
                let fmt = parts.next();
                let path = parts.next();
                match (fmt, path) {
                    (Some("json"), Some(path)) => match roster.snapshot() {
                        Ok(snapshot) => match save_roster_to_json(&snapshot, path) {
                            Ok(()) => println!("Roster saved to {path}"),
                            Err(err) => println!("Error: {err}"),
                        },
                        Err(err) => println!("Error: {err}"),
                    },
                    (Some("csv"), Some(path)) => match roster.snapshot() {
                        Ok(snapshot) => match save_assignments_to_csv(&snapshot.assignments, path) {
                            Ok(()) => println!("Assignments saved to {path}"),
                            Err(err) => println!("Error: {err}"),
                        },
                        Err(err) => println!("Error: {err}"),
                    },
                    _ => println!("Usage: save <json|csv> <path>"),
                }
            }
            "load" => {
                let fmt = parts.next();
                let path = parts.next();
                match (fmt, path) {
                    (Some("json"), Some(_)) if !auth.is_caller_admin() => {
                        println!("Error: {}", RosterError::Permission { operation: "load" });
                    }
                    (Some("json"), Some(path)) => {
                        match load_roster_from_json(path).and_then(RosterSnapshot::into_store) {
                            Ok(store) => {
                                roster = Roster::new(store);
                                println!("Roster loaded from {path}");
                            }
                            Err(err) => println!("Error: {err}"),
                        }
                    }
                    _ => println!("Usage: load json <path>"),
                }
            }
            _ => println!("Unknown command. Type 'help'."),
        }
    }
}
