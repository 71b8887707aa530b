use std::sync::Arc;

use axum::{extract::State, Json};

use crate::models::CacheStats;
use crate::services::cache::AvailabilityCache;

pub async fn get_cache_stats(
    State(cache): State<Arc<dyn AvailabilityCache>>,
) -> Json<CacheStats> {
    Json(cache.stats())
}
