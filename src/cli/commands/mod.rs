pub mod attendance;
pub mod checkin;
pub mod config;
pub mod db;
pub mod event;
pub mod host;
pub mod init;
pub mod log;
