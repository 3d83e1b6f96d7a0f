//! Unified application error type.
//! All modules (db, core, cli, utils) return AppError to keep the error
//! handling consistent and easy to manage.

use std::io;
use thiserror::Error;

/// Stable symbolic reasons a check-in attempt can fail with.
/// The UI layer matches on these, so the set must not change lightly.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckInFailure {
    #[error("invalid check-in token")]
    InvalidToken,

    #[error("check-in token expired")]
    TokenExpired,

    #[error("event not found")]
    EventNotFound,

    #[error("outside the event time window")]
    OutsideTimeWindow,

    #[error("outside the check-in radius")]
    OutsideRadius,

    #[error("already checked in today")]
    AlreadyCheckedIn,

    #[error("location unavailable")]
    LocationUnavailable,

    #[error("location permission denied")]
    LocationPermissionDenied,
}

impl CheckInFailure {
    pub fn as_code(&self) -> &'static str {
        match self {
            CheckInFailure::InvalidToken => "InvalidToken",
            CheckInFailure::TokenExpired => "TokenExpired",
            CheckInFailure::EventNotFound => "EventNotFound",
            CheckInFailure::OutsideTimeWindow => "OutsideTimeWindow",
            CheckInFailure::OutsideRadius => "OutsideRadius",
            CheckInFailure::AlreadyCheckedIn => "AlreadyCheckedIn",
            CheckInFailure::LocationUnavailable => "LocationUnavailable",
            CheckInFailure::LocationPermissionDenied => "LocationPermissionDenied",
        }
    }
}

/// Local validation problems while collecting identity.
/// These never move the check-in state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Please enter your name")]
    EmptyName,

    #[error("Please enter a valid email address: {0}")]
    InvalidEmail(String),

    #[error("This event requires your name and email")]
    IdentityRequired,
}

#[derive(Error, Debug)]
pub enum AppError {
    // ---------------------------
    // IO
    // ---------------------------
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // ---------------------------
    // Database-related
    // ---------------------------
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    // ---------------------------
    // Parsing errors
    // ---------------------------
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    #[error("Invalid time format: {0}")]
    InvalidTime(String),

    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Invalid tracking mode: {0}")]
    InvalidTrackingMode(String),

    #[error("Invalid weekday: {0}")]
    InvalidWeekday(String),

    #[error("Invalid deep link: {0}")]
    InvalidDeepLink(String),

    // ---------------------------
    // Logic errors
    // ---------------------------
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("No event with id {0}")]
    EventNotFound(i64),

    #[error("Check-in rejected: {} ({})", .0.as_code(), .0)]
    CheckIn(#[from] CheckInFailure),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Operation not allowed in state {0}")]
    InvalidState(String),

    // ---------------------------
    // Config errors
    // ---------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ---------------------------
    // Generic fallback
    // ---------------------------
    #[error("Internal error: {0}")]
    Other(String),
}

impl AppError {
    /// The check-in failure carried by this error, if any.
    pub fn failure(&self) -> Option<CheckInFailure> {
        match self {
            AppError::CheckIn(f) => Some(*f),
            _ => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
