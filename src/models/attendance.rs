use super::geo::Coordinates;
use chrono::NaiveDate;
use serde::Serialize;

/// Who is checking in. The variant decides the uniqueness key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ParticipantIdentity {
    User { user_id: i64 },
    Guest { name: String, email: Option<String> },
    Device { device_id: String },
}

impl ParticipantIdentity {
    /// Key used by the (event, participant, day) uniqueness constraint.
    /// Guest emails compare case-insensitively; without an email the
    /// trimmed, lower-cased name is used.
    pub fn key(&self) -> String {
        match self {
            ParticipantIdentity::User { user_id } => format!("user:{}", user_id),
            ParticipantIdentity::Guest { name, email } => match email {
                Some(e) if !e.trim().is_empty() => {
                    format!("guest:{}", e.trim().to_lowercase())
                }
                _ => format!("guest-name:{}", name.trim().to_lowercase()),
            },
            ParticipantIdentity::Device { device_id } => format!("device:{}", device_id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ParticipantIdentity::User { .. } => "user",
            ParticipantIdentity::Guest { .. } => "guest",
            ParticipantIdentity::Device { .. } => "device",
        }
    }

    pub fn label(&self) -> String {
        match self {
            ParticipantIdentity::User { user_id } => format!("user #{}", user_id),
            ParticipantIdentity::Guest { name, email } => match email {
                Some(e) => format!("{} <{}>", name, e),
                None => name.clone(),
            },
            ParticipantIdentity::Device { device_id } => format!("device {}", device_id),
        }
    }
}

/// A verified check-in about to be written. Becomes an `AttendanceRecord`
/// once the storage layer accepted it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAttendance {
    pub event_id: i64,
    pub identity: ParticipantIdentity,
    pub position: Coordinates,
    pub distance_m: f64,
    pub token_issued_at_ms: i64,
    pub session_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub event_id: i64,
    pub identity: ParticipantIdentity,
    pub position: Coordinates,
    pub distance_m: f64,
    pub token_issued_at_ms: i64,
    pub session_date: NaiveDate,
    pub created_at: String,
}

impl AttendanceRecord {
    pub fn from_new(id: i64, new: NewAttendance, created_at: String) -> Self {
        Self {
            id,
            event_id: new.event_id,
            identity: new.identity,
            position: new.position,
            distance_m: new.distance_m,
            token_issued_at_ms: new.token_issued_at_ms,
            session_date: new.session_date,
            created_at,
        }
    }
}
