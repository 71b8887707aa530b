use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use tower::ServiceExt;
use uuid::Uuid;

use performance_cell::{
    create_performance_router, AvailabilityCache, CacheStats, CachedSlot, InMemoryAvailabilityCache,
};

const DAY: Duration = Duration::from_secs(86_400);

fn slot(minute_of_day: u16) -> CachedSlot {
    CachedSlot::new(minute_of_day, 30)
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

#[tokio::test]
async fn test_get_after_set_hits_and_unknown_minute_misses() {
    let cache = InMemoryAvailabilityCache::new();
    let doctor_id = Uuid::new_v4();

    cache.set(doctor_id, monday(), slot(570), true, DAY).await.unwrap();

    assert_eq!(cache.get(doctor_id, monday(), slot(570)).await.unwrap(), Some(true));
    assert_eq!(cache.get(doctor_id, monday(), slot(480)).await.unwrap(), None);
    assert_eq!(cache.get(Uuid::new_v4(), monday(), slot(570)).await.unwrap(), None);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.sets, 1);
}

#[tokio::test]
async fn test_same_start_with_other_duration_is_a_separate_answer() {
    let cache = InMemoryAvailabilityCache::new();
    let doctor_id = Uuid::new_v4();

    cache.set(doctor_id, monday(), CachedSlot::new(690, 30), true, DAY).await.unwrap();

    assert_eq!(cache.get(doctor_id, monday(), CachedSlot::new(690, 60)).await.unwrap(), None);
    assert_eq!(CachedSlot::new(690, 60).field(), "690:60");
}

#[tokio::test]
async fn test_invalidate_drops_only_that_date() {
    let cache = InMemoryAvailabilityCache::new();
    let doctor_id = Uuid::new_v4();
    let tuesday = monday().succ_opt().unwrap();

    cache.set(doctor_id, monday(), slot(570), true, DAY).await.unwrap();
    cache.set(doctor_id, tuesday, slot(570), false, DAY).await.unwrap();

    cache.invalidate(doctor_id, monday()).await.unwrap();

    assert_eq!(cache.get(doctor_id, monday(), slot(570)).await.unwrap(), None);
    assert_eq!(cache.get(doctor_id, tuesday, slot(570)).await.unwrap(), Some(false));
}

#[tokio::test]
async fn test_invalidate_doctor_drops_every_date_of_that_doctor() {
    let cache = InMemoryAvailabilityCache::new();
    let doctor_id = Uuid::new_v4();
    let other_doctor = Uuid::new_v4();

    cache.set(doctor_id, monday(), slot(570), true, DAY).await.unwrap();
    cache.set(doctor_id, monday().succ_opt().unwrap(), slot(600), true, DAY).await.unwrap();
    cache.set(other_doctor, monday(), slot(570), true, DAY).await.unwrap();

    cache.invalidate_doctor(doctor_id).await.unwrap();

    assert_eq!(cache.get(doctor_id, monday(), slot(570)).await.unwrap(), None);
    assert_eq!(cache.get(other_doctor, monday(), slot(570)).await.unwrap(), Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_entries_expire_after_ttl_even_when_rewritten() {
    let cache = InMemoryAvailabilityCache::new();
    let doctor_id = Uuid::new_v4();

    cache.set(doctor_id, monday(), slot(570), true, DAY).await.unwrap();

    tokio::time::advance(Duration::from_secs(80_000)).await;
    // A later write must not push the expiry of the date entry forward.
    cache.set(doctor_id, monday(), slot(600), true, DAY).await.unwrap();
    assert_eq!(cache.get(doctor_id, monday(), slot(570)).await.unwrap(), Some(true));

    tokio::time::advance(Duration::from_secs(6_401)).await;
    assert_eq!(cache.get(doctor_id, monday(), slot(570)).await.unwrap(), None);
    assert_eq!(cache.get(doctor_id, monday(), slot(600)).await.unwrap(), None);
}

#[tokio::test]
async fn test_cache_stats_endpoint() {
    let cache: Arc<dyn AvailabilityCache> = Arc::new(InMemoryAvailabilityCache::new());
    cache.get(Uuid::new_v4(), monday(), slot(0)).await.unwrap();

    let app = create_performance_router(cache);
    let response = app
        .oneshot(Request::builder().uri("/cache/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let stats: CacheStats = serde_json::from_slice(&body).unwrap();
    assert_eq!(stats.backend, "memory");
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hit_rate, 0.0);
}
