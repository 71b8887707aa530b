use axum::{
    extract::{Extension, Path, State},
    Json,
};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::Actor;
use shared_models::error::AppError;

use crate::models::{AvailabilityError, DoctorAvailability, ReplaceWindowsRequest, TimeWindow};
use crate::router::DoctorState;

fn availability_error(err: AvailabilityError) -> AppError {
    match err {
        AvailabilityError::DoctorNotFound(id) => AppError::NotFound(format!("Doctor {} not found", id)),
        AvailabilityError::Validation(msg) => AppError::ValidationError(msg),
        AvailabilityError::Forbidden(msg) => AppError::Forbidden(msg),
        AvailabilityError::Backend(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn get_schedule(
    State(state): State<DoctorState>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Vec<DoctorAvailability>>, AppError> {
    debug!("Fetching schedule for doctor {}", doctor_id);

    let schedule = state
        .schedule
        .get_schedule(doctor_id)
        .await
        .map_err(availability_error)?;

    Ok(Json(schedule))
}

pub async fn get_windows(
    State(state): State<DoctorState>,
    Path((doctor_id, day_of_week)): Path<(Uuid, u8)>,
) -> Result<Json<Vec<TimeWindow>>, AppError> {
    let windows = state
        .schedule
        .get_windows(doctor_id, day_of_week)
        .await
        .map_err(availability_error)?;

    Ok(Json(windows))
}

#[axum::debug_handler]
pub async fn replace_windows(
    State(state): State<DoctorState>,
    Path((doctor_id, day_of_week)): Path<(Uuid, u8)>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<ReplaceWindowsRequest>,
) -> Result<Json<Vec<DoctorAvailability>>, AppError> {
    let stored = state
        .schedule
        .replace_windows(&actor, doctor_id, day_of_week, request.windows)
        .await
        .map_err(availability_error)?;

    Ok(Json(stored))
}
