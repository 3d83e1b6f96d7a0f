use crate::ui::messages::success;
use rusqlite::{Connection, OptionalExtension, Result};

/// Ensure that the `log` table exists. Applied migrations are recorded there.
fn ensure_log_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS log (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            date      TEXT NOT NULL,
            operation TEXT NOT NULL,
            target    TEXT DEFAULT '',
            message   TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn is_applied(conn: &Connection, version: &str) -> Result<bool> {
    let mut chk = conn.prepare(
        "SELECT 1 FROM log
         WHERE operation = 'migration_applied' AND target = ?1
         LIMIT 1",
    )?;
    Ok(chk.query_row([version], |_| Ok(())).optional()?.is_some())
}

/// Run `sql` once inside a transaction and mark `version` as applied.
fn apply_once(conn: &Connection, version: &str, message: &str, sql: &str) -> Result<()> {
    if is_applied(conn, version)? {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(sql)?;
    tx.execute(
        "INSERT INTO log (date, operation, target, message)
         VALUES (datetime('now'), 'migration_applied', ?1, ?2)",
        [version, message],
    )?;
    tx.commit()?;

    success(format!("Migration applied: {} → {}", version, message));
    Ok(())
}

const CREATE_EVENTS: &str = r#"
    CREATE TABLE IF NOT EXISTS events (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        name           TEXT NOT NULL,
        latitude       REAL NOT NULL CHECK(latitude BETWEEN -90 AND 90),
        longitude      REAL NOT NULL CHECK(longitude BETWEEN -180 AND 180),
        radius_m       REAL NOT NULL CHECK(radius_m > 0),
        start_time     TEXT NOT NULL,
        end_time       TEXT NOT NULL,
        secret         TEXT NOT NULL,
        tracking_mode  TEXT NOT NULL DEFAULT 'count_only'
                       CHECK(tracking_mode IN ('count_only','full_tracking')),
        active         INTEGER NOT NULL DEFAULT 1,
        recurrence     TEXT,
        event_date     TEXT,
        created_at     TEXT NOT NULL,
        CHECK(start_time <= end_time)
    );
"#;

// The UNIQUE constraint is the duplicate guard. Never replace it with an
// application-side lookup.
const CREATE_ATTENDANCE: &str = r#"
    CREATE TABLE IF NOT EXISTS attendance (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        event_id         INTEGER NOT NULL REFERENCES events(id),
        participant_kind TEXT NOT NULL CHECK(participant_kind IN ('user','guest','device')),
        participant_key  TEXT NOT NULL,
        user_id          INTEGER,
        guest_name       TEXT,
        guest_email      TEXT,
        device_id        TEXT,
        latitude         REAL NOT NULL,
        longitude        REAL NOT NULL,
        distance_m       REAL NOT NULL,
        token_issued_at  INTEGER NOT NULL,
        session_date     TEXT NOT NULL,
        created_at       TEXT NOT NULL,
        UNIQUE(event_id, participant_key, session_date)
    );

    CREATE INDEX IF NOT EXISTS idx_attendance_event_date ON attendance(event_id, session_date);
"#;

/// Public entry point: run all pending migrations.
///
/// Invoked by db::init_db() and before every command touching the DB.
pub fn run_pending_migrations(conn: &Connection) -> Result<()> {
    ensure_log_table(conn)?;

    apply_once(
        conn,
        "20260301_0001_create_events",
        "created events table",
        CREATE_EVENTS,
    )?;

    apply_once(
        conn,
        "20260301_0002_create_attendance",
        "created attendance table with (event, participant, day) uniqueness",
        CREATE_ATTENDANCE,
    )?;

    Ok(())
}
