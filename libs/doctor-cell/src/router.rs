use std::sync::Arc;

use axum::{
    Router,
    routing::{get, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::schedule::ScheduleService;

#[derive(Clone)]
pub struct DoctorState {
    pub config: Arc<AppConfig>,
    pub schedule: Arc<ScheduleService>,
}

pub fn doctor_routes(state: DoctorState) -> Router {
    let public_routes = Router::new()
        .route("/{doctor_id}/availability", get(handlers::get_schedule))
        .route("/{doctor_id}/availability/{day_of_week}", get(handlers::get_windows));

    let protected_routes = Router::new()
        .route("/{doctor_id}/availability/{day_of_week}", put(handlers::replace_windows))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
