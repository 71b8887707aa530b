use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub redis_url: Option<String>,
    /// JSON array of users loaded into the in-memory directory.
    pub seed_users_file: Option<String>,
    pub api_port: u16,
    pub in_person_duration_minutes: i64,
    pub remote_duration_minutes: i64,
    pub availability_cache_ttl_seconds: u64,
    pub emergency_max_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            supabase_service_role_key: String::new(),
            redis_url: None,
            seed_users_file: None,
            api_port: 3000,
            in_person_duration_minutes: 30,
            remote_duration_minutes: 30,
            availability_cache_ttl_seconds: 86_400,
            emergency_max_attempts: 5,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            seed_users_file: env::var("SEED_USERS_FILE").ok().filter(|path| !path.is_empty()),
            api_port: parse_or("API_PORT", defaults.api_port),
            in_person_duration_minutes: positive_or(
                "IN_PERSON_DURATION_MINUTES",
                defaults.in_person_duration_minutes,
            ),
            remote_duration_minutes: positive_or(
                "REMOTE_DURATION_MINUTES",
                defaults.remote_duration_minutes,
            ),
            availability_cache_ttl_seconds: parse_or(
                "AVAILABILITY_CACHE_TTL_SECONDS",
                defaults.availability_cache_ttl_seconds,
            ),
            emergency_max_attempts: parse_or(
                "EMERGENCY_MAX_ATTEMPTS",
                defaults.emergency_max_attempts,
            ),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_cache_configured(&self) -> bool {
        self.redis_url.is_some()
    }

    /// Key used for server-side store calls; falls back to the anon key.
    pub fn store_access_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn parse_or<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn positive_or(name: &str, default: i64) -> i64 {
    let value = parse_or(name, default);
    if value <= 0 {
        warn!("{} must be positive, got {}, using default {}", name, value, default);
        return default;
    }
    value
}
