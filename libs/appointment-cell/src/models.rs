// libs/appointment-cell/src/models.rs
use std::fmt;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::AvailabilityError;
use shared_config::AppConfig;
use shared_database::DatabaseError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_emergency: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.date_time
            .checked_add_signed(Duration::minutes(self.duration_minutes))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn interval(&self) -> BookingInterval {
        BookingInterval {
            start: self.date_time,
            end: self.ends_at(),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == AppointmentStatus::Scheduled
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
    Completed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentType {
    #[default]
    #[serde(rename = "in-person", alias = "in_person")]
    InPerson,

    #[serde(rename = "remote", alias = "teleconsultation")]
    Remote,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::InPerson => write!(f, "in-person"),
            AppointmentType::Remote => write!(f, "remote"),
        }
    }
}

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BookingInterval {
    /// `None` when the end falls past the last representable instant.
    pub fn new(start: DateTime<Utc>, duration_minutes: i64) -> Option<Self> {
        let end = start.checked_add_signed(Duration::minutes(duration_minutes))?;
        Some(Self { start, end })
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The whole UTC day of `date`.
    pub fn day(date: NaiveDate) -> Option<Self> {
        let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = start.checked_add_signed(Duration::days(1))?;
        Some(Self { start, end })
    }

    pub fn overlaps(&self, other: &BookingInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Body of `POST /appointments`. Patients may omit `patient_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub date_time: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub appointment_type: AppointmentType,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_emergency: bool,
}

/// Input of [`crate::services::booking::BookingCoordinator::book_appointment`].
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub requested_time: DateTime<Utc>,
    pub appointment_type: AppointmentType,
    pub is_emergency: bool,
    pub notes: Option<String>,
}

impl BookingRequest {
    pub fn from_request(patient_id: Uuid, request: BookAppointmentRequest) -> Self {
        Self {
            patient_id,
            doctor_id: request.doctor_id,
            requested_time: request.date_time,
            appointment_type: request.appointment_type,
            is_emergency: request.is_emergency,
            notes: request.notes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FreeSlotsQuery {
    pub date: NaiveDate,
}

// ==============================================================================
// BUSINESS RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct BookingRules {
    pub in_person_duration_minutes: i64,
    pub remote_duration_minutes: i64,
    pub cache_ttl: StdDuration,
    pub emergency_max_attempts: u32,
}

impl BookingRules {
    /// Never below one minute: an empty interval overlaps nothing.
    pub fn duration_for(&self, appointment_type: AppointmentType) -> i64 {
        let minutes = match appointment_type {
            AppointmentType::InPerson => self.in_person_duration_minutes,
            AppointmentType::Remote => self.remote_duration_minutes,
        };
        minutes.max(1)
    }
}

impl From<&AppConfig> for BookingRules {
    fn from(config: &AppConfig) -> Self {
        Self {
            in_person_duration_minutes: config.in_person_duration_minutes.max(1),
            remote_duration_minutes: config.remote_duration_minutes.max(1),
            cache_ttl: StdDuration::from_secs(config.availability_cache_ttl_seconds),
            emergency_max_attempts: config.emergency_max_attempts.max(1),
        }
    }
}

impl Default for BookingRules {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

/// Errors raised by an [`crate::services::store::AppointmentStore`].
#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Appointment conflicts with an existing booking")]
    Conflict,

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment store error: {0}")]
    Backend(String),
}

impl From<DatabaseError> for AppointmentError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(_) => AppointmentError::Conflict,
            other => AppointmentError::Backend(other.to_string()),
        }
    }
}

/// Errors surfaced by the booking coordinator.
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),

    #[error("Patient not found: {0}")]
    PatientNotFound(Uuid),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(Uuid),

    #[error("Doctor {doctor_id} is not available at {requested_time}")]
    OutsideAvailability {
        doctor_id: Uuid,
        requested_time: DateTime<Utc>,
    },

    #[error("The requested slot is already taken")]
    SlotTaken,

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("{0}")]
    Forbidden(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<AppointmentError> for BookingError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(id) => BookingError::AppointmentNotFound(id),
            AppointmentError::Conflict => BookingError::SlotTaken,
            AppointmentError::InvalidTransition { from, to } => {
                BookingError::InvalidTransition { from, to }
            }
            AppointmentError::Backend(msg) => BookingError::Backend(msg),
        }
    }
}

impl From<AvailabilityError> for BookingError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::DoctorNotFound(id) => BookingError::DoctorNotFound(id),
            AvailabilityError::Validation(msg) => BookingError::Validation(msg),
            AvailabilityError::Forbidden(msg) => BookingError::Forbidden(msg),
            AvailabilityError::Backend(msg) => BookingError::Backend(msg),
        }
    }
}
