use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::get,
};
use tracing::{info, warn};

use appointment_cell::{
    appointment_routes, AppointmentState, AppointmentStore, BookingCoordinator, BookingRules,
    InMemoryAppointmentStore, SupabaseAppointmentStore,
};
use auth_cell::{auth_routes, AuthState, InMemoryUserDirectory, SupabaseUserDirectory, UserDirectory};
use doctor_cell::{
    doctor_routes, AvailabilityStore, DoctorState, InMemoryAvailabilityStore, ScheduleService,
    SupabaseAvailabilityStore,
};
use performance_cell::{
    create_performance_router, AvailabilityCache, InMemoryAvailabilityCache, RedisAvailabilityCache,
};
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::user::User;

/// Store and cache handles shared by every cell router.
pub struct AppServices {
    pub directory: Arc<dyn UserDirectory>,
    pub availability: Arc<dyn AvailabilityStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub cache: Arc<dyn AvailabilityCache>,
}

impl AppServices {
    /// Supabase-backed stores when configured, in-memory ones otherwise.
    /// Redis backs the cache when reachable.
    pub async fn from_config(config: Arc<AppConfig>) -> Self {
        let cache = Self::build_cache(&config).await;

        if config.is_configured() {
            info!("Using Supabase stores at {}", config.supabase_url);
            let supabase = Arc::new(SupabaseClient::new(&config));
            let directory: Arc<dyn UserDirectory> =
                Arc::new(SupabaseUserDirectory::new(supabase.clone(), &config));

            Self {
                availability: Arc::new(SupabaseAvailabilityStore::new(
                    supabase.clone(),
                    directory.clone(),
                    &config,
                )),
                appointments: Arc::new(SupabaseAppointmentStore::new(supabase, &config)),
                directory,
                cache,
            }
        } else {
            warn!("Supabase is not configured, using in-memory stores");
            let directory = InMemoryUserDirectory::new();
            match &config.seed_users_file {
                Some(path) => match load_users(path).await {
                    Ok(users) => {
                        info!("Seeding in-memory directory with {} users from {}", users.len(), path);
                        for user in users {
                            directory.insert(user).await;
                        }
                    }
                    Err(e) => warn!("Failed to load users from {}: {:#}", path, e),
                },
                None => warn!(
                    "SEED_USERS_FILE not set: the in-memory directory has no users, \
                     so every doctor and patient id is answered with NotFound"
                ),
            }
            Self::with_directory(Arc::new(directory), cache)
        }
    }

    pub fn in_memory(cache: Arc<dyn AvailabilityCache>) -> Self {
        Self::with_directory(Arc::new(InMemoryUserDirectory::new()), cache)
    }

    fn with_directory(directory: Arc<dyn UserDirectory>, cache: Arc<dyn AvailabilityCache>) -> Self {
        Self {
            availability: Arc::new(InMemoryAvailabilityStore::new(directory.clone())),
            appointments: Arc::new(InMemoryAppointmentStore::new()),
            directory,
            cache,
        }
    }

    async fn build_cache(config: &AppConfig) -> Arc<dyn AvailabilityCache> {
        match &config.redis_url {
            Some(url) => match RedisAvailabilityCache::new(url).await {
                Ok(cache) => Arc::new(cache),
                Err(e) => {
                    warn!("Redis unavailable ({}), using in-memory availability cache", e);
                    Arc::new(InMemoryAvailabilityCache::new())
                }
            },
            None => {
                info!("REDIS_URL not set, using in-memory availability cache");
                Arc::new(InMemoryAvailabilityCache::new())
            }
        }
    }
}

async fn load_users(path: &str) -> anyhow::Result<Vec<User>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path))?;
    let users = serde_json::from_str(&raw).context("parsing users")?;
    Ok(users)
}

pub fn create_router(config: Arc<AppConfig>, services: AppServices) -> Router {
    let coordinator = Arc::new(BookingCoordinator::new(
        services.directory.clone(),
        services.availability.clone(),
        services.appointments.clone(),
        services.cache.clone(),
        BookingRules::from(config.as_ref()),
    ));
    let schedule = Arc::new(ScheduleService::new(
        services.availability.clone(),
        services.cache.clone(),
    ));

    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .nest("/auth", auth_routes(AuthState {
            config: config.clone(),
            directory: services.directory.clone(),
        }))
        .nest("/doctors", doctor_routes(DoctorState {
            config: config.clone(),
            schedule,
        }))
        .nest("/appointments", appointment_routes(AppointmentState {
            config,
            coordinator,
        }))
        .nest("/performance", create_performance_router(services.cache))
}
