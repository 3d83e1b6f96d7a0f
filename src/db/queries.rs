use crate::core::guard::AttendanceStore;
use crate::core::validator::EventLookup;
use crate::db::pool::DbPool;
use crate::errors::{AppError, AppResult};
use crate::models::attendance::{AttendanceRecord, NewAttendance, ParticipantIdentity};
use crate::models::event::{Event, Schedule, TimeWindow, TrackingMode, new_secret};
use crate::models::geo::Coordinates;
use chrono::{Local, NaiveDate, NaiveTime};
use rusqlite::params;
use rusqlite::{Connection, OptionalExtension, Result, Row};

const TIME_FMT: &str = "%H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

fn conversion_error(col: usize, err: AppError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_time_col(col: usize, s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FMT)
        .map_err(|_| conversion_error(col, AppError::InvalidTime(s.to_string())))
}

pub fn map_event_row(row: &Row) -> Result<Event> {
    let start_str: String = row.get("start_time")?;
    let end_str: String = row.get("end_time")?;

    let start = parse_time_col(0, &start_str)?;
    let end = parse_time_col(0, &end_str)?;
    let window = TimeWindow::new(start, end).map_err(|e| conversion_error(0, e))?;

    let anchor = Coordinates::new(row.get("latitude")?, row.get("longitude")?)
        .map_err(|e| conversion_error(0, e))?;

    let mode_str: String = row.get("tracking_mode")?;
    let tracking_mode = TrackingMode::from_db_str(&mode_str)
        .ok_or_else(|| conversion_error(0, AppError::InvalidTrackingMode(mode_str.clone())))?;

    let schedule = Schedule::from_db(row.get("recurrence")?, row.get("event_date")?)
        .map_err(|e| conversion_error(0, e))?;

    Ok(Event {
        id: row.get("id")?,
        name: row.get("name")?,
        anchor,
        radius_m: row.get("radius_m")?,
        window,
        secret: row.get("secret")?,
        tracking_mode,
        active: row.get::<_, i32>("active")? == 1,
        schedule,
        created_at: row.get("created_at")?,
    })
}

/// Insert a new event and return its id.
pub fn insert_event(conn: &Connection, ev: &Event) -> AppResult<i64> {
    ev.validate()?;
    let (recurrence, event_date) = ev.schedule.to_db();

    conn.execute(
        "INSERT INTO events (name, latitude, longitude, radius_m, start_time, end_time,
                             secret, tracking_mode, active, recurrence, event_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            ev.name,
            ev.anchor.lat(),
            ev.anchor.lng(),
            ev.radius_m,
            ev.window.start().format(TIME_FMT).to_string(),
            ev.window.end().format(TIME_FMT).to_string(),
            ev.secret,
            ev.tracking_mode.to_db_str(),
            if ev.active { 1 } else { 0 },
            recurrence,
            event_date,
            ev.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn load_event(conn: &Connection, id: i64) -> AppResult<Option<Event>> {
    let mut stmt = conn.prepare_cached("SELECT * FROM events WHERE id = ?1")?;
    let ev = stmt.query_row([id], map_event_row).optional()?;
    Ok(ev)
}

pub fn load_events(conn: &Connection) -> AppResult<Vec<Event>> {
    let mut stmt = conn.prepare("SELECT * FROM events ORDER BY id ASC")?;
    let rows = stmt.query_map([], map_event_row)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Replace the secret of an event. Tokens issued with the old secret stop
/// validating immediately.
pub fn rotate_secret(conn: &Connection, id: i64) -> AppResult<String> {
    let secret = new_secret();
    let changed = conn.execute(
        "UPDATE events SET secret = ?1 WHERE id = ?2",
        params![secret, id],
    )?;
    if changed == 0 {
        return Err(AppError::EventNotFound(id));
    }
    Ok(secret)
}

pub fn set_active(conn: &Connection, id: i64, active: bool) -> AppResult<()> {
    let changed = conn.execute(
        "UPDATE events SET active = ?1 WHERE id = ?2",
        params![if active { 1 } else { 0 }, id],
    )?;
    if changed == 0 {
        return Err(AppError::EventNotFound(id));
    }
    Ok(())
}

pub fn map_attendance_row(row: &Row) -> Result<AttendanceRecord> {
    let kind: String = row.get("participant_kind")?;
    let identity = match kind.as_str() {
        "user" => ParticipantIdentity::User {
            user_id: row.get("user_id")?,
        },
        "guest" => ParticipantIdentity::Guest {
            name: row.get("guest_name")?,
            email: row.get("guest_email")?,
        },
        "device" => ParticipantIdentity::Device {
            device_id: row.get("device_id")?,
        },
        other => {
            return Err(conversion_error(
                0,
                AppError::Other(format!("Invalid participant kind: {}", other)),
            ));
        }
    };

    let date_str: String = row.get("session_date")?;
    let session_date = NaiveDate::parse_from_str(&date_str, DATE_FMT)
        .map_err(|_| conversion_error(0, AppError::InvalidDate(date_str.clone())))?;

    let position = Coordinates::new(row.get("latitude")?, row.get("longitude")?)
        .map_err(|e| conversion_error(0, e))?;

    Ok(AttendanceRecord {
        id: row.get("id")?,
        event_id: row.get("event_id")?,
        identity,
        position,
        distance_m: row.get("distance_m")?,
        token_issued_at_ms: row.get("token_issued_at")?,
        session_date,
        created_at: row.get("created_at")?,
    })
}

/// Atomic conditional insert backing the duplicate guard.
/// Returns `None` when a record for (event, participant, day) already exists.
pub fn insert_attendance_if_absent(
    conn: &Connection,
    new: &NewAttendance,
) -> AppResult<Option<AttendanceRecord>> {
    let created_at = Local::now().to_rfc3339();

    let (user_id, guest_name, guest_email, device_id) = match &new.identity {
        ParticipantIdentity::User { user_id } => (Some(*user_id), None, None, None),
        ParticipantIdentity::Guest { name, email } => {
            (None, Some(name.clone()), email.clone(), None)
        }
        ParticipantIdentity::Device { device_id } => (None, None, None, Some(device_id.clone())),
    };

    let mut stmt = conn.prepare_cached(
        "INSERT INTO attendance (event_id, participant_kind, participant_key, user_id,
                                 guest_name, guest_email, device_id, latitude, longitude,
                                 distance_m, token_issued_at, session_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(event_id, participant_key, session_date) DO NOTHING
         RETURNING id",
    )?;

    let id: Option<i64> = stmt
        .query_row(
            params![
                new.event_id,
                new.identity.kind(),
                new.identity.key(),
                user_id,
                guest_name,
                guest_email,
                device_id,
                new.position.lat(),
                new.position.lng(),
                new.distance_m,
                new.token_issued_at_ms,
                new.session_date.format(DATE_FMT).to_string(),
                created_at,
            ],
            |row| row.get(0),
        )
        .optional()?;

    Ok(id.map(|id| AttendanceRecord::from_new(id, new.clone(), created_at)))
}

pub fn load_attendance(
    conn: &Connection,
    event_id: i64,
    date: Option<NaiveDate>,
) -> AppResult<Vec<AttendanceRecord>> {
    let mut out = Vec::new();

    match date {
        Some(d) => {
            let mut stmt = conn.prepare(
                "SELECT * FROM attendance
                 WHERE event_id = ?1 AND session_date = ?2
                 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(
                params![event_id, d.format(DATE_FMT).to_string()],
                map_attendance_row,
            )?;
            for r in rows {
                out.push(r?);
            }
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT * FROM attendance
                 WHERE event_id = ?1
                 ORDER BY session_date ASC, id ASC",
            )?;
            let rows = stmt.query_map([event_id], map_attendance_row)?;
            for r in rows {
                out.push(r?);
            }
        }
    }

    Ok(out)
}

pub fn count_attendance(conn: &Connection, event_id: i64, date: NaiveDate) -> AppResult<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM attendance WHERE event_id = ?1 AND session_date = ?2",
        params![event_id, date.format(DATE_FMT).to_string()],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

impl EventLookup for DbPool {
    fn find_event(&self, id: i64) -> AppResult<Option<Event>> {
        load_event(&self.conn, id)
    }
}

impl AttendanceStore for DbPool {
    fn insert_if_absent(&self, new: &NewAttendance) -> AppResult<Option<AttendanceRecord>> {
        insert_attendance_if_absent(&self.conn, new)
    }

    fn count_for(&self, event_id: i64, day: NaiveDate) -> AppResult<u64> {
        count_attendance(&self.conn, event_id, day)
    }
}
