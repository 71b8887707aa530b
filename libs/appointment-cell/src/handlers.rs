// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_models::user::UserRole;

use crate::models::{
    Appointment, BookAppointmentRequest, BookingError, BookingInterval, BookingRequest,
    FreeSlotsQuery,
};
use crate::router::AppointmentState;

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(msg) => AppError::ValidationError(msg),
            BookingError::PatientNotFound(_)
            | BookingError::DoctorNotFound(_)
            | BookingError::AppointmentNotFound(_) => AppError::NotFound(err.to_string()),
            BookingError::OutsideAvailability { .. } => AppError::Unprocessable(err.to_string()),
            BookingError::SlotTaken | BookingError::InvalidTransition { .. } => {
                AppError::Conflict(err.to_string())
            }
            BookingError::Forbidden(msg) => AppError::Forbidden(msg),
            BookingError::Backend(msg) => AppError::Database(msg),
        }
    }
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let patient_id = request.patient_id.unwrap_or(actor.user_id);

    // Patients book for themselves; front desk and admins book for anyone.
    let allowed = match actor.role {
        UserRole::Patient => patient_id == actor.user_id,
        UserRole::Receptionist | UserRole::Admin => true,
        UserRole::Doctor => false,
    };
    if !allowed {
        return Err(AppError::Forbidden(
            "Not authorized to book appointment for this patient".to_string(),
        ));
    }

    let appointment = state
        .coordinator
        .book_appointment(BookingRequest::from_request(patient_id, request))
        .await?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state.coordinator.get_appointment(appointment_id).await?;

    if !appointment.is_participant(actor.user_id) && !actor.is_staff() {
        return Err(AppError::Forbidden("Not authorized to view this appointment".to_string()));
    }

    Ok(Json(appointment))
}

pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state
        .coordinator
        .cancel_appointment(appointment_id, &actor)
        .await?;

    Ok(Json(appointment))
}

pub async fn complete_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state
        .coordinator
        .complete_appointment(appointment_id, &actor)
        .await?;

    Ok(Json(appointment))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

pub async fn get_doctor_appointments(
    State(state): State<AppointmentState>,
    Path(doctor_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    if actor.user_id != doctor_id && !actor.is_staff() {
        return Err(AppError::Forbidden(
            "Not authorized to view this doctor's appointments".to_string(),
        ));
    }

    Ok(Json(state.coordinator.list_for_doctor(doctor_id).await?))
}

pub async fn get_patient_appointments(
    State(state): State<AppointmentState>,
    Path(patient_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    if actor.user_id != patient_id && !actor.is_staff() {
        return Err(AppError::Forbidden(
            "Not authorized to view this patient's appointments".to_string(),
        ));
    }

    Ok(Json(state.coordinator.list_for_patient(patient_id).await?))
}

pub async fn get_free_slots(
    State(state): State<AppointmentState>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<FreeSlotsQuery>,
) -> Result<Json<Vec<BookingInterval>>, AppError> {
    debug!("Computing free slots of doctor {} on {}", doctor_id, query.date);

    let free = state.coordinator.get_availability(doctor_id, query.date).await?;
    Ok(Json(free))
}
