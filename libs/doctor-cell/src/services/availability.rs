use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use auth_cell::UserDirectory;
use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    AvailabilityError, DoctorAvailability, TimeWindow, WindowSpec, LAST_MINUTE_OF_DAY,
};

const AVAILABILITY_COLUMNS: &str = "id,doctor_id,day_of_week,start_time,end_time,is_available";

/// Durable source of truth for doctors' recurring weekly windows.
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Available windows of one weekday, ascending by start.
    async fn get_windows(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Vec<TimeWindow>, AvailabilityError>;

    /// Replace every rule of (doctor, weekday) with `windows`, atomically.
    /// On error the prior set is left untouched.
    async fn set_windows(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
        windows: Vec<WindowSpec>,
    ) -> Result<Vec<DoctorAvailability>, AvailabilityError>;

    /// Every rule of the doctor ordered by (day, start).
    async fn get_schedule(&self, doctor_id: Uuid)
        -> Result<Vec<DoctorAvailability>, AvailabilityError>;
}

/// Checks day range, minute range, start < end, and that the available
/// windows do not overlap one another. Touching windows are allowed.
pub fn validate_windows(day_of_week: u8, windows: &[WindowSpec]) -> Result<(), AvailabilityError> {
    if day_of_week > 6 {
        return Err(AvailabilityError::Validation(
            "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }

    for window in windows {
        let in_range = |minute: i32| (0..=LAST_MINUTE_OF_DAY).contains(&minute);
        if !in_range(window.start_time) || !in_range(window.end_time) {
            return Err(AvailabilityError::Validation(format!(
                "Window {}-{} is outside 0..={}",
                window.start_time, window.end_time, LAST_MINUTE_OF_DAY
            )));
        }
        if window.start_time >= window.end_time {
            return Err(AvailabilityError::Validation(format!(
                "Window start {} must be before end {}",
                window.start_time, window.end_time
            )));
        }
    }

    let mut available: Vec<&WindowSpec> = windows.iter().filter(|w| w.is_available).collect();
    available.sort_by_key(|w| w.start_time);

    for pair in available.windows(2) {
        let (previous, next) = (pair[0], pair[1]);
        if next.start_time < previous.end_time {
            return Err(AvailabilityError::Validation(format!(
                "Window {}-{} overlaps window {}-{}",
                next.start_time, next.end_time, previous.start_time, previous.end_time
            )));
        }
    }

    Ok(())
}

async fn ensure_doctor(directory: &dyn UserDirectory, doctor_id: Uuid) -> Result<(), AvailabilityError> {
    let user = directory
        .get_user(doctor_id)
        .await
        .map_err(|e| AvailabilityError::from_directory(doctor_id, e))?;

    if !user.is_doctor() {
        debug!("User {} is not a doctor", doctor_id);
        return Err(AvailabilityError::DoctorNotFound(doctor_id));
    }
    Ok(())
}

fn sort_schedule(rules: &mut [DoctorAvailability]) {
    rules.sort_by_key(|rule| (rule.day_of_week, rule.start_time));
}

pub struct InMemoryAvailabilityStore {
    directory: Arc<dyn UserDirectory>,
    rules: RwLock<HashMap<Uuid, Vec<DoctorAvailability>>>,
}

impl InMemoryAvailabilityStore {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            directory,
            rules: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryAvailabilityStore {
    async fn get_windows(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Vec<TimeWindow>, AvailabilityError> {
        ensure_doctor(self.directory.as_ref(), doctor_id).await?;

        let rules = self.rules.read().await;
        let mut windows: Vec<TimeWindow> = rules
            .get(&doctor_id)
            .into_iter()
            .flatten()
            .filter(|rule| rule.day_of_week == day_of_week && rule.is_available)
            .map(DoctorAvailability::window)
            .collect();
        windows.sort();

        Ok(windows)
    }

    async fn set_windows(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
        windows: Vec<WindowSpec>,
    ) -> Result<Vec<DoctorAvailability>, AvailabilityError> {
        validate_windows(day_of_week, &windows)?;
        ensure_doctor(self.directory.as_ref(), doctor_id).await?;

        let mut replacement: Vec<DoctorAvailability> = windows
            .into_iter()
            .map(|window| DoctorAvailability {
                id: Uuid::new_v4(),
                doctor_id,
                day_of_week,
                start_time: window.start_time as u16,
                end_time: window.end_time as u16,
                is_available: window.is_available,
            })
            .collect();
        sort_schedule(&mut replacement);

        let mut rules = self.rules.write().await;
        let doctor_rules = rules.entry(doctor_id).or_default();
        doctor_rules.retain(|rule| rule.day_of_week != day_of_week);
        doctor_rules.extend(replacement.iter().cloned());
        sort_schedule(doctor_rules);

        info!(
            "Replaced availability of doctor {} on day {} with {} windows",
            doctor_id,
            day_of_week,
            replacement.len()
        );
        Ok(replacement)
    }

    async fn get_schedule(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<DoctorAvailability>, AvailabilityError> {
        ensure_doctor(self.directory.as_ref(), doctor_id).await?;

        Ok(self
            .rules
            .read()
            .await
            .get(&doctor_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Windows stored in the `doctor_availability` table. Replacement goes through
/// the `replace_doctor_windows` function so delete and insert share one transaction.
pub struct SupabaseAvailabilityStore {
    supabase: Arc<SupabaseClient>,
    directory: Arc<dyn UserDirectory>,
    access_key: String,
}

impl SupabaseAvailabilityStore {
    pub fn new(
        supabase: Arc<SupabaseClient>,
        directory: Arc<dyn UserDirectory>,
        config: &AppConfig,
    ) -> Self {
        Self {
            supabase,
            directory,
            access_key: config.store_access_key().to_string(),
        }
    }

    fn parse_rules(rows: Vec<Value>) -> Result<Vec<DoctorAvailability>, AvailabilityError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<DoctorAvailability>, _>>()
            .map_err(|e| AvailabilityError::Backend(format!("Failed to parse availability: {}", e)))
    }
}

#[async_trait]
impl AvailabilityStore for SupabaseAvailabilityStore {
    async fn get_windows(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Vec<TimeWindow>, AvailabilityError> {
        ensure_doctor(self.directory.as_ref(), doctor_id).await?;
        debug!("Fetching windows for doctor {} on day {}", doctor_id, day_of_week);

        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&day_of_week=eq.{}&is_available=eq.true&select={}&order=start_time.asc",
            doctor_id, day_of_week, AVAILABILITY_COLUMNS
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(&self.access_key), None)
            .await?;

        let mut windows: Vec<TimeWindow> = Self::parse_rules(rows)?
            .iter()
            .map(DoctorAvailability::window)
            .collect();
        windows.sort();

        Ok(windows)
    }

    async fn set_windows(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
        windows: Vec<WindowSpec>,
    ) -> Result<Vec<DoctorAvailability>, AvailabilityError> {
        validate_windows(day_of_week, &windows)?;
        ensure_doctor(self.directory.as_ref(), doctor_id).await?;

        let args = json!({
            "p_doctor_id": doctor_id,
            "p_day_of_week": day_of_week,
            "p_windows": windows,
        });

        let rows: Vec<Value> = self
            .supabase
            .rpc("replace_doctor_windows", Some(&self.access_key), args)
            .await
            .map_err(|e| {
                warn!("Failed to replace windows of doctor {}: {}", doctor_id, e);
                AvailabilityError::from(e)
            })?;

        let mut stored = Self::parse_rules(rows)?;
        sort_schedule(&mut stored);

        info!(
            "Replaced availability of doctor {} on day {} with {} windows",
            doctor_id,
            day_of_week,
            stored.len()
        );
        Ok(stored)
    }

    async fn get_schedule(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<DoctorAvailability>, AvailabilityError> {
        ensure_doctor(self.directory.as_ref(), doctor_id).await?;

        let path = format!(
            "/rest/v1/doctor_availability?doctor_id=eq.{}&select={}&order=day_of_week.asc,start_time.asc",
            doctor_id, AVAILABILITY_COLUMNS
        );
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(&self.access_key), None)
            .await?;

        Self::parse_rules(rows)
    }
}
