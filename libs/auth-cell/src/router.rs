use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::directory::UserDirectory;

#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<dyn UserDirectory>,
}

pub fn auth_routes(state: AuthState) -> Router {
    let public_routes = Router::new()
        .route("/validate", post(handlers::validate_token))
        .route("/doctors", get(handlers::list_doctors));

    let protected_routes = Router::new()
        .route("/me", get(handlers::get_me))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
