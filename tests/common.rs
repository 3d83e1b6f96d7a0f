#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use chrono::{NaiveTime, TimeZone, Utc};
use rcheckin::core::validator::EventLookup;
use rcheckin::db::initialize::init_db;
use rcheckin::db::pool::DbPool;
use rcheckin::db::queries::insert_event;
use rcheckin::errors::AppResult;
use rcheckin::models::event::{Event, Schedule, TimeWindow, TrackingMode};
use rcheckin::models::geo::Coordinates;
use std::cell::Cell;
use std::env;
use std::fs;
use std::path::PathBuf;

pub const ANCHOR_LAT: f64 = 13.7563;
pub const ANCHOR_LNG: f64 = 100.5018;
pub const TEST_SECRET: &str = "a1b2c3d4e5f6";

pub fn rck() -> Command {
    cargo_bin_cmd!("rcheckin")
}

/// Create a unique test DB path inside the system temp dir and remove any existing file
pub fn setup_test_db(name: &str) -> String {
    let mut path: PathBuf = env::temp_dir();
    path.push(format!("{}_rcheckin.sqlite", name));
    let db_path = path.to_string_lossy().to_string();
    fs::remove_file(&db_path).ok();
    db_path
}

/// Open a fresh file-backed database with the schema applied.
pub fn open_test_pool(name: &str) -> (String, DbPool) {
    let db_path = setup_test_db(name);
    let pool = DbPool::new(&db_path).expect("open db");
    init_db(&pool.conn).expect("init db");
    (db_path, pool)
}

pub fn anchor() -> Coordinates {
    Coordinates::new(ANCHOR_LAT, ANCHOR_LNG).expect("anchor")
}

pub fn coords(lat: f64, lng: f64) -> Coordinates {
    Coordinates::new(lat, lng).expect("coords")
}

/// 50 m radius, 09:00:00-10:30:00 daily window, fixed secret.
pub fn sample_event(id: i64, mode: TrackingMode) -> Event {
    let window = TimeWindow::new(
        NaiveTime::from_hms_opt(9, 0, 0).expect("start"),
        NaiveTime::from_hms_opt(10, 30, 0).expect("end"),
    )
    .expect("window");
    let mut ev = Event::new("Standup", anchor(), 50.0, window, mode, Schedule::Daily)
        .expect("event");
    ev.id = id;
    ev.secret = TEST_SECRET.to_string();
    ev
}

/// Insert `sample_event` and return it with its database id.
pub fn insert_sample_event(pool: &DbPool, mode: TrackingMode) -> Event {
    let mut ev = sample_event(0, mode);
    ev.id = insert_event(&pool.conn, &ev).expect("insert event");
    ev
}

/// 2026-03-02 (a Monday) at the given UTC time.
pub fn at(h: u32, m: u32, s: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, s).single().expect("datetime")
}

/// In-memory event lookup that counts how often it is hit.
pub struct CountingLookup {
    pub events: Vec<Event>,
    pub calls: Cell<usize>,
}

impl CountingLookup {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events,
            calls: Cell::new(0),
        }
    }
}

impl EventLookup for CountingLookup {
    fn find_event(&self, id: i64) -> AppResult<Option<Event>> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.events.iter().find(|e| e.id == id).cloned())
    }
}
