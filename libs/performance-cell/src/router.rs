use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers::get_cache_stats;
use crate::services::cache::AvailabilityCache;

pub fn create_performance_router(cache: Arc<dyn AvailabilityCache>) -> Router {
    Router::new()
        .route("/cache/stats", get(get_cache_stats))
        .with_state(cache)
}
