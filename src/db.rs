use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

pub const DB_FILE_NAME: &str = "progress.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    // Another sidecar may hold the write lock during a regeneration.
    conn.busy_timeout(Duration::from_secs(5))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetables(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            semester INTEGER NOT NULL,
            start_date TEXT,
            end_date TEXT,
            created_at TEXT
        )",
        [],
    )?;
    // Early workspaces had no timetable names.
    ensure_timetables_name(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_slots(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timetable_id INTEGER NOT NULL,
            grade INTEGER,
            class_number INTEGER,
            weekday INTEGER,
            period INTEGER,
            subject TEXT,
            FOREIGN KEY(timetable_id) REFERENCES timetables(id) ON DELETE CASCADE
        )",
        [],
    )?;
    ensure_timetable_slots_classroom(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_slots_timetable ON timetable_slots(timetable_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_slots_schedule ON timetable_slots(grade, class_number, weekday, period)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS school_calendar(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_date TEXT NOT NULL,
            title TEXT,
            description TEXT,
            is_holiday INTEGER NOT NULL DEFAULT 0,
            created_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_school_calendar_date ON school_calendar(event_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lessons(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lesson_date TEXT,
            grade INTEGER NOT NULL,
            class_number INTEGER NOT NULL,
            period INTEGER NOT NULL,
            lesson_order INTEGER NOT NULL,
            lesson_title TEXT,
            subject TEXT,
            created_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lessons_date ON lessons(lesson_date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lessons_class ON lessons(grade, class_number)",
        [],
    )?;

    Ok(())
}

pub fn now_ts() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn ensure_timetables_name(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "timetables", "name")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE timetables ADD COLUMN name TEXT", [])?;
    Ok(())
}

fn ensure_timetable_slots_classroom(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "timetable_slots", "classroom")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE timetable_slots ADD COLUMN classroom TEXT", [])?;

    // Best-effort backfill so older slots still display as "<grade><class:02>".
    conn.execute(
        "UPDATE timetable_slots
         SET classroom = CAST(grade * 100 + class_number AS TEXT)
         WHERE classroom IS NULL AND grade IS NOT NULL AND class_number IS NOT NULL
           AND class_number BETWEEN 0 AND 99",
        [],
    )?;
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
