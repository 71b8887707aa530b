use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{CacheCounters, CacheError, CacheStats, CachedSlot};

/// One cache entry per (doctor, date); individual answers are keyed by slot.
pub fn availability_key(doctor_id: Uuid, date: NaiveDate) -> String {
    format!("availability:{}:{}", doctor_id, date.format("%Y-%m-%d"))
}

fn doctor_pattern(doctor_id: Uuid) -> String {
    format!("availability:{}:*", doctor_id)
}

/// Advisory cache of "does slot S of date X fit doctor D's windows" answers.
///
/// Entries expire a fixed TTL after the (doctor, date) entry is created, no
/// matter how often it is written afterwards, so no answer outlives the TTL.
#[async_trait]
pub trait AvailabilityCache: Send + Sync {
    async fn get(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: CachedSlot,
    ) -> Result<Option<bool>, CacheError>;

    async fn set(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: CachedSlot,
        available: bool,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn invalidate(&self, doctor_id: Uuid, date: NaiveDate) -> Result<(), CacheError>;

    /// Drop every cached date of a doctor, used when the weekly windows change.
    async fn invalidate_doctor(&self, doctor_id: Uuid) -> Result<(), CacheError>;

    fn stats(&self) -> CacheStats;
}

struct CachedDay {
    answers: HashMap<CachedSlot, bool>,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryAvailabilityCache {
    entries: RwLock<HashMap<(Uuid, NaiveDate), CachedDay>>,
    counters: CacheCounters,
}

impl InMemoryAvailabilityCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilityCache for InMemoryAvailabilityCache {
    async fn get(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: CachedSlot,
    ) -> Result<Option<bool>, CacheError> {
        let now = Instant::now();
        let key = (doctor_id, date);
        let (answer, expired) = match self.entries.read().await.get(&key) {
            Some(day) if day.expires_at > now => (day.answers.get(&slot).copied(), false),
            Some(_) => (None, true),
            None => (None, false),
        };

        if expired {
            let mut entries = self.entries.write().await;
            if entries.get(&key).is_some_and(|day| day.expires_at <= now) {
                entries.remove(&key);
            }
        }

        self.counters.record_lookup(answer.is_some());
        Ok(answer)
    }

    async fn set(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: CachedSlot,
        available: bool,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, day| day.expires_at > now);

        entries
            .entry((doctor_id, date))
            .or_insert_with(|| CachedDay {
                answers: HashMap::new(),
                expires_at: now + ttl,
            })
            .answers
            .insert(slot, available);

        self.counters.record_set();
        Ok(())
    }

    async fn invalidate(&self, doctor_id: Uuid, date: NaiveDate) -> Result<(), CacheError> {
        self.entries.write().await.remove(&(doctor_id, date));
        self.counters.record_invalidation();
        Ok(())
    }

    async fn invalidate_doctor(&self, doctor_id: Uuid) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .retain(|(cached_doctor, _), _| *cached_doctor != doctor_id);
        self.counters.record_invalidation();
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot("memory")
    }
}

pub struct RedisAvailabilityCache {
    pool: Pool,
    counters: CacheCounters,
}

impl RedisAvailabilityCache {
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Pool(format!("Failed to create Redis pool: {}", e)))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| CacheError::Pool(format!("Failed to connect to Redis: {}", e)))?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis availability cache initialized successfully");

        Ok(Self {
            pool,
            counters: CacheCounters::default(),
        })
    }

    async fn get_connection(&self) -> Result<Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Pool(e.to_string()))
    }
}

#[async_trait]
impl AvailabilityCache for RedisAvailabilityCache {
    async fn get(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: CachedSlot,
    ) -> Result<Option<bool>, CacheError> {
        let mut conn = self.get_connection().await?;
        let key = availability_key(doctor_id, date);

        let cached: Option<String> = conn.hget(&key, slot.field()).await?;
        let answer = cached.map(|value| value == "True");

        self.counters.record_lookup(answer.is_some());
        Ok(answer)
    }

    async fn set(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: CachedSlot,
        available: bool,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;
        let key = availability_key(doctor_id, date);
        let value = if available { "True" } else { "False" };

        // NX keeps the expiry of an existing key, so later writes never extend it.
        let _: () = redis::pipe()
            .atomic()
            .hset(&key, slot.field(), value)
            .ignore()
            .cmd("EXPIRE")
            .arg(&key)
            .arg(ttl.as_secs().max(1))
            .arg("NX")
            .ignore()
            .query_async(&mut conn)
            .await?;

        self.counters.record_set();
        debug!("Cached availability {} for {} slot {}", value, key, slot.field());
        Ok(())
    }

    async fn invalidate(&self, doctor_id: Uuid, date: NaiveDate) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;
        let key = availability_key(doctor_id, date);

        let _: () = conn.del(&key).await?;

        self.counters.record_invalidation();
        debug!("Invalidated availability cache key {}", key);
        Ok(())
    }

    async fn invalidate_doctor(&self, doctor_id: Uuid) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;

        let keys: Vec<String> = {
            let mut iter = conn.scan_match::<_, String>(doctor_pattern(doctor_id)).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if !keys.is_empty() {
            let _: () = conn.del(&keys).await?;
        }

        self.counters.record_invalidation();
        debug!("Invalidated {} cached dates for doctor {}", keys.len(), doctor_id);
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot("redis")
    }
}
