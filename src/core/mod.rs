pub mod checkin;
pub mod feed;
pub mod geofence;
pub mod guard;
pub mod host;
pub mod log;
pub mod position;
pub mod registration;
pub mod tasks;
pub mod token;
pub mod validator;
pub mod verify;
