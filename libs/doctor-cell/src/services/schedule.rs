use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use performance_cell::AvailabilityCache;
use shared_models::auth::Actor;

use crate::models::{AvailabilityError, DoctorAvailability, TimeWindow, WindowSpec};
use crate::services::availability::AvailabilityStore;

/// Permission-checked access to the weekly schedule. Replacing windows drops
/// every cached availability answer of the doctor.
pub struct ScheduleService {
    store: Arc<dyn AvailabilityStore>,
    cache: Arc<dyn AvailabilityCache>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn AvailabilityStore>, cache: Arc<dyn AvailabilityCache>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> Arc<dyn AvailabilityStore> {
        Arc::clone(&self.store)
    }

    pub async fn replace_windows(
        &self,
        actor: &Actor,
        doctor_id: Uuid,
        day_of_week: u8,
        windows: Vec<WindowSpec>,
    ) -> Result<Vec<DoctorAvailability>, AvailabilityError> {
        if actor.user_id != doctor_id && !actor.is_admin() {
            return Err(AvailabilityError::Forbidden(
                "Only the doctor or an admin can change this schedule".to_string(),
            ));
        }

        let stored = self.store.set_windows(doctor_id, day_of_week, windows).await?;

        if let Err(e) = self.cache.invalidate_doctor(doctor_id).await {
            warn!("Failed to invalidate cached availability of doctor {}: {}", doctor_id, e);
        }

        info!("Doctor {} schedule for day {} updated by {}", doctor_id, day_of_week, actor.user_id);
        Ok(stored)
    }

    pub async fn get_windows(
        &self,
        doctor_id: Uuid,
        day_of_week: u8,
    ) -> Result<Vec<TimeWindow>, AvailabilityError> {
        if day_of_week > 6 {
            return Err(AvailabilityError::Validation(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }
        self.store.get_windows(doctor_id, day_of_week).await
    }

    pub async fn get_schedule(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<DoctorAvailability>, AvailabilityError> {
        self.store.get_schedule(doctor_id).await
    }
}
