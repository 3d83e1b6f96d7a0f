//! At most one attendance per (event, participant, day).

use crate::errors::{AppResult, CheckInFailure};
use crate::models::attendance::{AttendanceRecord, NewAttendance};
use chrono::NaiveDate;

/// Storage boundary for attendance records.
///
/// `insert_if_absent` must be a single atomic conditional insert (unique
/// constraint or equivalent). A read-then-write pair races across clients.
pub trait AttendanceStore {
    /// Returns `None` when a record for the same key already exists.
    fn insert_if_absent(&self, new: &NewAttendance) -> AppResult<Option<AttendanceRecord>>;

    fn count_for(&self, event_id: i64, day: NaiveDate) -> AppResult<u64>;
}

pub struct DuplicateGuard<'a> {
    store: &'a dyn AttendanceStore,
}

impl<'a> DuplicateGuard<'a> {
    pub fn new(store: &'a dyn AttendanceStore) -> Self {
        Self { store }
    }

    /// Reserve the (event, participant, day) slot and commit the record in
    /// one step. A taken slot is `AlreadyCheckedIn`; storage errors pass
    /// through untouched so the caller can retry the commit.
    pub fn check_and_reserve(&self, new: NewAttendance) -> AppResult<AttendanceRecord> {
        match self.store.insert_if_absent(&new)? {
            Some(record) => Ok(record),
            None => Err(CheckInFailure::AlreadyCheckedIn.into()),
        }
    }
}
