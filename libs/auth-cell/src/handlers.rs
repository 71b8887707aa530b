use axum::{
    extract::{State, Json},
    http::HeaderMap,
    Extension,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_models::user::User;
use shared_utils::jwt;

use crate::router::AuthState;
use crate::services::directory::DirectoryError;

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_value = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

fn directory_error(err: DirectoryError) -> AppError {
    match err {
        DirectoryError::NotFound(id) => AppError::NotFound(format!("User {} not found", id)),
        DirectoryError::Backend(msg) => AppError::Database(msg),
    }
}

pub async fn validate_token(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let actor = jwt::validate_token(&token, &state.config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    Ok(Json(json!({
        "valid": true,
        "user_id": actor.user_id,
        "email": actor.email,
        "role": actor.role,
    })))
}

pub async fn get_me(
    State(state): State<AuthState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<User>, AppError> {
    let user = state
        .directory
        .get_user(actor.user_id)
        .await
        .map_err(directory_error)?;

    Ok(Json(user))
}

pub async fn list_doctors(State(state): State<AuthState>) -> Result<Json<Vec<User>>, AppError> {
    let doctors = state.directory.list_doctors().await.map_err(directory_error)?;
    Ok(Json(doctors))
}
