// =====================================================================================
// PERFORMANCE CELL - AVAILABILITY CACHING
// =====================================================================================

pub mod models;
pub mod handlers;
pub mod router;
pub mod services;

pub use models::*;
pub use services::cache::{
    availability_key, AvailabilityCache, InMemoryAvailabilityCache, RedisAvailabilityCache,
};
pub use router::create_performance_router;
