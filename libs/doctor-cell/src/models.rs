use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

use auth_cell::DirectoryError;
use shared_database::DatabaseError;

/// Last valid minute of a day; window bounds live in `0..=LAST_MINUTE_OF_DAY`.
pub const LAST_MINUTE_OF_DAY: i32 = 1439;

/// A recurring weekly availability rule as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorAvailability {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: u8, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: u16,
    pub end_time: u16,
    pub is_available: bool,
}

impl DoctorAvailability {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Bookable window of one weekday, in minutes of the day, half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_time: u16,
    pub end_time: u16,
}

impl TimeWindow {
    pub fn new(start_time: u16, end_time: u16) -> Self {
        Self { start_time, end_time }
    }

    /// Whether `[start, end)` lies entirely inside this window.
    pub fn covers(&self, start: u32, end: u32) -> bool {
        start >= u32::from(self.start_time) && end <= u32::from(self.end_time)
    }
}

/// A window as submitted by a caller, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    #[serde(deserialize_with = "deserialize_minute")]
    pub start_time: i32,
    #[serde(deserialize_with = "deserialize_minute")]
    pub end_time: i32,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

impl WindowSpec {
    pub fn available(start_time: i32, end_time: i32) -> Self {
        Self {
            start_time,
            end_time,
            is_available: true,
        }
    }

    pub fn unavailable(start_time: i32, end_time: i32) -> Self {
        Self {
            start_time,
            end_time,
            is_available: false,
        }
    }
}

fn default_available() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MinuteValue {
    Minutes(i32),
    Clock(String),
}

/// Accepts either a minute-of-day integer or an `"HH:MM"` clock string.
fn deserialize_minute<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    match MinuteValue::deserialize(deserializer)? {
        MinuteValue::Minutes(minutes) => Ok(minutes),
        MinuteValue::Clock(clock) => parse_clock(&clock)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {}", clock))),
    }
}

pub fn parse_clock(clock: &str) -> Option<i32> {
    let (hours, minutes) = clock.trim().split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;

    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    Some(hours * 60 + minutes)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceWindowsRequest {
    pub windows: Vec<WindowSpec>,
}

pub fn day_of_week_for(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

pub fn minute_of_day(instant: DateTime<Utc>) -> u16 {
    (instant.hour() * 60 + instant.minute()) as u16
}

#[derive(Error, Debug)]
pub enum AvailabilityError {
    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Invalid availability: {0}")]
    Validation(String),

    #[error("Not permitted: {0}")]
    Forbidden(String),

    #[error("Availability backend error: {0}")]
    Backend(String),
}

impl From<DatabaseError> for AvailabilityError {
    fn from(err: DatabaseError) -> Self {
        AvailabilityError::Backend(err.to_string())
    }
}

impl AvailabilityError {
    pub fn from_directory(doctor_id: Uuid, err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound(_) => AvailabilityError::DoctorNotFound(doctor_id),
            DirectoryError::Backend(msg) => AvailabilityError::Backend(msg),
        }
    }
}
