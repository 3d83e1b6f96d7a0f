//! Time utilities: parsing `HH:MM[:SS]` and epoch millis helpers.

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, NaiveTime, TimeZone};

/// Accepts `HH:MM` or `HH:MM:SS`.
pub fn parse_time(t: &str) -> Option<NaiveTime> {
    let t = t.trim();
    NaiveTime::parse_from_str(t, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
        .ok()
}

pub fn parse_required_time(t: &str) -> AppResult<NaiveTime> {
    parse_time(t).ok_or_else(|| AppError::InvalidTime(t.to_string()))
}

/// Format epoch millis in the timezone of `reference`.
pub fn format_millis<Tz: TimeZone>(ms: i64, reference: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match reference.timezone().timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ms.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_forms() {
        assert_eq!(parse_time("09:00"), NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(parse_time("10:30:15"), NaiveTime::from_hms_opt(10, 30, 15));
        assert!(parse_time("25:00").is_none());
        assert!(parse_required_time("nope").is_err());
    }
}
