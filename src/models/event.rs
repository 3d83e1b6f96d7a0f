use super::geo::Coordinates;
use crate::errors::{AppError, AppResult};
use chrono::{Datelike, Local, NaiveDate, NaiveTime, Weekday};
use rand::RngCore;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackingMode {
    /// Anonymous tally, no registration step.
    CountOnly,
    /// Identified participants, registration required for guests.
    FullTracking,
}

impl TrackingMode {
    /// Convert enum → DB string
    pub fn to_db_str(&self) -> &'static str {
        match self {
            TrackingMode::CountOnly => "count_only",
            TrackingMode::FullTracking => "full_tracking",
        }
    }

    /// Convert DB string → enum
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "count_only" => Some(TrackingMode::CountOnly),
            "full_tracking" => Some(TrackingMode::FullTracking),
            _ => None,
        }
    }

    /// Helper: accept CLI spellings (`count`, `count-only`, `full`, ...)
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_lowercase().replace('-', "_").as_str() {
            "count" | "count_only" => Some(TrackingMode::CountOnly),
            "full" | "full_tracking" => Some(TrackingMode::FullTracking),
            _ => None,
        }
    }
}

/// On which calendar days an event accepts check-ins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Schedule {
    Daily,
    Weekly(Vec<Weekday>),
    Once(NaiveDate),
}

impl Schedule {
    pub fn includes(&self, date: NaiveDate) -> bool {
        match self {
            Schedule::Daily => true,
            Schedule::Weekly(days) => days.contains(&date.weekday()),
            Schedule::Once(d) => *d == date,
        }
    }

    /// Parse a comma separated weekday list such as `mon,wed,fri`.
    pub fn weekly_from_list(list: &str) -> AppResult<Self> {
        let mut days: Vec<Weekday> = Vec::new();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let wd: Weekday = part
                .parse()
                .map_err(|_| AppError::InvalidWeekday(part.to_string()))?;
            if !days.contains(&wd) {
                days.push(wd);
            }
        }
        if days.is_empty() {
            return Err(AppError::InvalidWeekday(list.to_string()));
        }
        Ok(Schedule::Weekly(days))
    }

    /// (recurrence, event_date) columns
    pub fn to_db(&self) -> (Option<String>, Option<String>) {
        match self {
            Schedule::Daily => (None, None),
            Schedule::Weekly(days) => (
                Some(
                    days.iter()
                        .map(|d| d.to_string().to_lowercase())
                        .collect::<Vec<_>>()
                        .join(","),
                ),
                None,
            ),
            Schedule::Once(d) => (None, Some(d.format("%Y-%m-%d").to_string())),
        }
    }

    pub fn from_db(recurrence: Option<String>, date: Option<String>) -> AppResult<Self> {
        if let Some(d) = date.filter(|d| !d.is_empty()) {
            let parsed = NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                .map_err(|_| AppError::InvalidDate(d.clone()))?;
            return Ok(Schedule::Once(parsed));
        }
        match recurrence.filter(|r| !r.is_empty()) {
            Some(r) => Self::weekly_from_list(&r),
            None => Ok(Schedule::Daily),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Schedule::Daily => "daily".to_string(),
            Schedule::Weekly(_) => self.to_db().0.unwrap_or_default(),
            Schedule::Once(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Daily check-in window, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> AppResult<Self> {
        if start > end {
            return Err(AppError::InvalidEvent(format!(
                "start time {} is after end time {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t <= self.end
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,                     // ⇔ events.id
    pub name: String,                // ⇔ events.name
    pub anchor: Coordinates,         // ⇔ events.latitude / events.longitude
    pub radius_m: f64,               // ⇔ events.radius_m (> 0)
    pub window: TimeWindow,          // ⇔ events.start_time / events.end_time ("HH:MM:SS")
    #[serde(skip_serializing)]
    pub secret: String,              // ⇔ events.secret (hex)
    pub tracking_mode: TrackingMode, // ⇔ events.tracking_mode
    pub active: bool,                // ⇔ events.active
    pub schedule: Schedule,          // ⇔ events.recurrence / events.event_date
    pub created_at: String,          // ⇔ events.created_at (ISO8601)
}

impl Event {
    /// Build a new, not yet persisted event (`id = 0`) with a fresh secret.
    pub fn new(
        name: &str,
        anchor: Coordinates,
        radius_m: f64,
        window: TimeWindow,
        tracking_mode: TrackingMode,
        schedule: Schedule,
    ) -> AppResult<Self> {
        let ev = Self {
            id: 0,
            name: name.trim().to_string(),
            anchor,
            radius_m,
            window,
            secret: new_secret(),
            tracking_mode,
            active: true,
            schedule,
            created_at: Local::now().to_rfc3339(),
        };
        ev.validate()?;
        Ok(ev)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.name.is_empty() {
            return Err(AppError::InvalidEvent("name must not be empty".into()));
        }
        if !self.radius_m.is_finite() || self.radius_m <= 0.0 {
            return Err(AppError::InvalidEvent(format!(
                "radius must be > 0 (got {})",
                self.radius_m
            )));
        }
        if self.secret.is_empty() {
            return Err(AppError::InvalidEvent("secret must not be empty".into()));
        }
        Ok(())
    }

    pub fn requires_registration(&self) -> bool {
        self.tracking_mode == TrackingMode::FullTracking
    }
}

/// 32 random bytes, hex encoded. Hex never contains the token delimiter.
pub fn new_secret() -> String {
    let mut buf = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}
