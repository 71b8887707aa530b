#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use appointment_cell::{
    AppointmentType, BookingCoordinator, BookingRequest, BookingRules, InMemoryAppointmentStore,
};
use auth_cell::InMemoryUserDirectory;
use doctor_cell::{AvailabilityStore, InMemoryAvailabilityStore, WindowSpec};
use performance_cell::{AvailabilityCache, InMemoryAvailabilityCache};
use shared_utils::test_utils::TestUser;

pub const MONDAY: u8 = 1;

/// 2024-06-03 is a Monday.
pub fn monday_at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, hour, minute, 0).unwrap()
}

pub struct Clinic {
    pub doctor: TestUser,
    pub patient: TestUser,
    pub other_patient: TestUser,
    pub receptionist: TestUser,
    pub admin: TestUser,
    pub directory: Arc<InMemoryUserDirectory>,
    pub availability: Arc<InMemoryAvailabilityStore>,
    pub appointments: Arc<InMemoryAppointmentStore>,
    pub cache: Arc<InMemoryAvailabilityCache>,
    pub coordinator: Arc<BookingCoordinator>,
}

impl Clinic {
    /// One doctor available Monday 09:00-12:00.
    pub async fn new() -> Self {
        let cache = Arc::new(InMemoryAvailabilityCache::new());
        Self::with_cache(cache.clone(), cache).await
    }

    pub async fn with_cache(
        cache: Arc<InMemoryAvailabilityCache>,
        coordinator_cache: Arc<dyn AvailabilityCache>,
    ) -> Self {
        Self::build(cache, coordinator_cache, BookingRules::default()).await
    }

    pub async fn with_rules(rules: BookingRules) -> Self {
        let cache = Arc::new(InMemoryAvailabilityCache::new());
        Self::build(cache.clone(), cache, rules).await
    }

    async fn build(
        cache: Arc<InMemoryAvailabilityCache>,
        coordinator_cache: Arc<dyn AvailabilityCache>,
        rules: BookingRules,
    ) -> Self {
        let doctor = TestUser::doctor("doc@clinic.test");
        let patient = TestUser::patient("pat@clinic.test");
        let other_patient = TestUser::patient("other@clinic.test");
        let receptionist = TestUser::receptionist("desk@clinic.test");
        let admin = TestUser::admin("admin@clinic.test");

        let directory = Arc::new(InMemoryUserDirectory::new());
        for user in [&doctor, &patient, &other_patient, &receptionist, &admin] {
            directory.insert(user.to_user()).await;
        }

        let availability = Arc::new(InMemoryAvailabilityStore::new(directory.clone()));
        availability
            .set_windows(doctor.id, MONDAY, vec![WindowSpec::available(540, 720)])
            .await
            .unwrap();

        let appointments = Arc::new(InMemoryAppointmentStore::new());
        let coordinator = Arc::new(BookingCoordinator::new(
            directory.clone(),
            availability.clone(),
            appointments.clone(),
            coordinator_cache,
            rules,
        ));

        Self {
            doctor,
            patient,
            other_patient,
            receptionist,
            admin,
            directory,
            availability,
            appointments,
            cache,
            coordinator,
        }
    }

    pub fn request(&self, requested_time: DateTime<Utc>) -> BookingRequest {
        BookingRequest {
            patient_id: self.patient.id,
            doctor_id: self.doctor.id,
            requested_time,
            appointment_type: AppointmentType::InPerson,
            is_emergency: false,
            notes: None,
        }
    }

    pub fn emergency(&self, requested_time: DateTime<Utc>) -> BookingRequest {
        BookingRequest {
            is_emergency: true,
            ..self.request(requested_time)
        }
    }
}
