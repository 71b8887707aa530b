mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use appointment_cell::{
    AppointmentStatus, AppointmentStore, AppointmentType, BookingError, BookingInterval,
    BookingRules,
};
use performance_cell::{
    AvailabilityCache, CacheError, CacheStats, CachedSlot, InMemoryAvailabilityCache,
};

use common::{monday_at, Clinic};

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

#[tokio::test]
async fn test_monday_morning_scenario() {
    let clinic = Clinic::new().await;

    let first = clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(9, 30)))
        .await
        .unwrap();
    assert_eq!(first.date_time, monday_at(9, 30));
    assert_eq!(first.duration_minutes, 30);
    assert_eq!(first.status, AppointmentStatus::Scheduled);

    let overlapping = clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(9, 45)))
        .await;
    assert_matches!(overlapping, Err(BookingError::SlotTaken));

    let later = clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(10, 30)))
        .await;
    assert!(later.is_ok());
}

#[tokio::test]
async fn test_booking_outside_windows_is_rejected() {
    let clinic = Clinic::new().await;

    assert_matches!(
        clinic.coordinator.book_appointment(clinic.request(monday_at(8, 0))).await,
        Err(BookingError::OutsideAvailability { .. })
    );

    // 11:45 + 30 minutes runs past the end of the 09:00-12:00 window.
    assert_matches!(
        clinic.coordinator.book_appointment(clinic.request(monday_at(11, 45))).await,
        Err(BookingError::OutsideAvailability { .. })
    );

    // Tuesday has no windows at all.
    let tuesday = monday_at(10, 0) + chrono::Duration::days(1);
    assert_matches!(
        clinic.coordinator.book_appointment(clinic.request(tuesday)).await,
        Err(BookingError::OutsideAvailability { .. })
    );
}

#[tokio::test]
async fn test_last_slot_of_window_fits_exactly() {
    let clinic = Clinic::new().await;

    assert!(clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(11, 30)))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_emergency_bypasses_windows_but_not_overlap() {
    let clinic = Clinic::new().await;

    let early = clinic
        .coordinator
        .book_appointment(clinic.emergency(monday_at(8, 0)))
        .await
        .unwrap();
    assert_eq!(early.date_time, monday_at(8, 0));
    assert!(early.is_emergency);

    for start in [monday_at(9, 0), monday_at(9, 30), monday_at(10, 0)] {
        clinic.coordinator.book_appointment(clinic.request(start)).await.unwrap();
    }

    let moved = clinic
        .coordinator
        .book_appointment(clinic.emergency(monday_at(9, 0)))
        .await
        .unwrap();
    assert_eq!(moved.date_time, monday_at(10, 30));

    let conflicts = clinic
        .appointments
        .find_conflicts(clinic.doctor.id, &BookingInterval::day(monday()).unwrap())
        .await
        .unwrap();
    for pair in conflicts.windows(2) {
        assert!(pair[0].ends_at() <= pair[1].date_time);
    }
}

#[tokio::test]
async fn test_emergency_gives_up_after_bounded_attempts() {
    let clinic = Clinic::new().await;

    // Back-to-back bookings far beyond the retry budget.
    let mut start = monday_at(12, 0);
    for _ in 0..10 {
        clinic
            .coordinator
            .book_appointment(clinic.emergency(start))
            .await
            .unwrap();
        start += chrono::Duration::minutes(30);
    }

    let result = clinic
        .coordinator
        .book_appointment(clinic.emergency(monday_at(12, 0)))
        .await;
    assert_matches!(result, Err(BookingError::SlotTaken));
}

#[tokio::test]
async fn test_unknown_ids_and_role_mismatch() {
    let clinic = Clinic::new().await;

    let mut request = clinic.request(monday_at(9, 0));
    request.doctor_id = Uuid::new_v4();
    assert_matches!(
        clinic.coordinator.book_appointment(request).await,
        Err(BookingError::DoctorNotFound(_))
    );

    let mut request = clinic.request(monday_at(9, 0));
    request.patient_id = Uuid::new_v4();
    assert_matches!(
        clinic.coordinator.book_appointment(request).await,
        Err(BookingError::PatientNotFound(_))
    );

    let mut request = clinic.request(monday_at(9, 0));
    request.patient_id = clinic.receptionist.id;
    assert_matches!(
        clinic.coordinator.book_appointment(request).await,
        Err(BookingError::Validation(_))
    );
}

#[tokio::test]
async fn test_requested_time_must_be_whole_minute() {
    let clinic = Clinic::new().await;

    let request = clinic.request(monday_at(9, 0) + chrono::Duration::seconds(20));
    assert_matches!(
        clinic.coordinator.book_appointment(request).await,
        Err(BookingError::Validation(_))
    );
}

#[tokio::test]
async fn test_remote_appointments_use_their_own_duration() {
    let clinic = Clinic::new().await;

    let mut request = clinic.request(monday_at(9, 0));
    request.appointment_type = AppointmentType::Remote;
    let appointment = clinic.coordinator.book_appointment(request).await.unwrap();

    assert_eq!(appointment.appointment_type, AppointmentType::Remote);
    assert_eq!(
        appointment.duration_minutes,
        clinic.coordinator.rules().remote_duration_minutes
    );
}

#[tokio::test]
async fn test_cancel_twice_is_an_invalid_transition() {
    let clinic = Clinic::new().await;
    let appointment = clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(9, 0)))
        .await
        .unwrap();

    let cancelled = clinic
        .coordinator
        .cancel_appointment(appointment.id, &clinic.patient.to_actor())
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    let again = clinic
        .coordinator
        .cancel_appointment(appointment.id, &clinic.patient.to_actor())
        .await;
    assert_matches!(
        again,
        Err(BookingError::InvalidTransition {
            from: AppointmentStatus::Cancelled,
            to: AppointmentStatus::Cancelled
        })
    );

    let stored = clinic.appointments.get(appointment.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::Cancelled);
    assert_eq!(stored.updated_at, cancelled.updated_at);
}

#[tokio::test]
async fn test_cancelled_slot_can_be_booked_again() {
    let clinic = Clinic::new().await;
    let appointment = clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(9, 0)))
        .await
        .unwrap();

    clinic
        .coordinator
        .cancel_appointment(appointment.id, &clinic.receptionist.to_actor())
        .await
        .unwrap();

    let mut request = clinic.request(monday_at(9, 0));
    request.patient_id = clinic.other_patient.id;
    assert!(clinic.coordinator.book_appointment(request).await.is_ok());
}

#[tokio::test]
async fn test_cancel_and_complete_permissions() {
    let clinic = Clinic::new().await;
    let appointment = clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(9, 0)))
        .await
        .unwrap();

    assert_matches!(
        clinic
            .coordinator
            .cancel_appointment(appointment.id, &clinic.other_patient.to_actor())
            .await,
        Err(BookingError::Forbidden(_))
    );
    assert_matches!(
        clinic
            .coordinator
            .complete_appointment(appointment.id, &clinic.patient.to_actor())
            .await,
        Err(BookingError::Forbidden(_))
    );
    assert_matches!(
        clinic
            .coordinator
            .complete_appointment(appointment.id, &clinic.receptionist.to_actor())
            .await,
        Err(BookingError::Forbidden(_))
    );

    let completed = clinic
        .coordinator
        .complete_appointment(appointment.id, &clinic.doctor.to_actor())
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    assert_matches!(
        clinic
            .coordinator
            .cancel_appointment(appointment.id, &clinic.admin.to_actor())
            .await,
        Err(BookingError::InvalidTransition { .. })
    );
    assert_matches!(
        clinic
            .coordinator
            .cancel_appointment(Uuid::new_v4(), &clinic.admin.to_actor())
            .await,
        Err(BookingError::AppointmentNotFound(_))
    );
}

#[tokio::test]
async fn test_corrupted_cache_never_hides_a_conflict() {
    let clinic = Clinic::new().await;
    clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(9, 30)))
        .await
        .unwrap();

    // Claim every slot is available, including taken ones and ones outside windows.
    for minute in [570u16, 585, 480] {
        clinic
            .cache
            .set(clinic.doctor.id, monday(), CachedSlot::new(minute, 30), true, Duration::from_secs(3600))
            .await
            .unwrap();
    }

    assert_matches!(
        clinic.coordinator.book_appointment(clinic.request(monday_at(9, 30))).await,
        Err(BookingError::SlotTaken)
    );
    assert_matches!(
        clinic.coordinator.book_appointment(clinic.request(monday_at(9, 45))).await,
        Err(BookingError::SlotTaken)
    );
}

#[tokio::test]
async fn test_cache_is_filled_on_miss_and_dropped_after_booking() {
    let clinic = Clinic::new().await;

    clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(8, 0)))
        .await
        .unwrap_err();
    assert_eq!(
        clinic
            .cache
            .get(clinic.doctor.id, monday(), CachedSlot::new(480, 30))
            .await
            .unwrap(),
        Some(false)
    );

    clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(9, 0)))
        .await
        .unwrap();
    assert_eq!(
        clinic
            .cache
            .get(clinic.doctor.id, monday(), CachedSlot::new(480, 30))
            .await
            .unwrap(),
        None
    );

    let stats = clinic.cache.stats();
    assert!(stats.sets >= 2);
    assert!(stats.invalidations >= 1);
}

struct UnreachableCache;

#[async_trait]
impl AvailabilityCache for UnreachableCache {
    async fn get(&self, _doctor_id: Uuid, _date: NaiveDate, _slot: CachedSlot) -> Result<Option<bool>, CacheError> {
        Err(CacheError::Pool("connection refused".to_string()))
    }

    async fn set(
        &self,
        _doctor_id: Uuid,
        _date: NaiveDate,
        _slot: CachedSlot,
        _available: bool,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Err(CacheError::Pool("connection refused".to_string()))
    }

    async fn invalidate(&self, _doctor_id: Uuid, _date: NaiveDate) -> Result<(), CacheError> {
        Err(CacheError::Pool("connection refused".to_string()))
    }

    async fn invalidate_doctor(&self, _doctor_id: Uuid) -> Result<(), CacheError> {
        Err(CacheError::Pool("connection refused".to_string()))
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            backend: "unreachable".to_string(),
            hits: 0,
            misses: 0,
            sets: 0,
            invalidations: 0,
            hit_rate: 0.0,
        }
    }
}

#[tokio::test]
async fn test_cache_outage_falls_back_to_store() {
    let clinic = Clinic::with_cache(
        Arc::new(InMemoryAvailabilityCache::new()),
        Arc::new(UnreachableCache),
    )
    .await;

    assert!(clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(9, 0)))
        .await
        .is_ok());
    assert_matches!(
        clinic.coordinator.book_appointment(clinic.request(monday_at(8, 0))).await,
        Err(BookingError::OutsideAvailability { .. })
    );
}

#[tokio::test]
async fn test_free_slots_exclude_scheduled_appointments() {
    let clinic = Clinic::new().await;

    let morning = clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(9, 30)))
        .await
        .unwrap();
    let cancelled = clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(11, 0)))
        .await
        .unwrap();
    clinic
        .coordinator
        .cancel_appointment(cancelled.id, &clinic.patient.to_actor())
        .await
        .unwrap();

    let free = clinic
        .coordinator
        .get_availability(clinic.doctor.id, monday())
        .await
        .unwrap();

    assert_eq!(
        free,
        vec![
            BookingInterval::between(monday_at(9, 0), morning.date_time),
            BookingInterval::between(morning.ends_at(), monday_at(12, 0)),
        ]
    );

    assert_matches!(
        clinic.coordinator.get_availability(Uuid::new_v4(), monday()).await,
        Err(BookingError::DoctorNotFound(_))
    );
}

#[tokio::test]
async fn test_zero_duration_rules_still_prevent_double_booking() {
    let clinic = Clinic::with_rules(BookingRules {
        in_person_duration_minutes: 0,
        ..BookingRules::default()
    })
    .await;

    let first = clinic
        .coordinator
        .book_appointment(clinic.request(monday_at(10, 0)))
        .await
        .unwrap();
    assert_eq!(first.duration_minutes, 1);

    assert_matches!(
        clinic.coordinator.book_appointment(clinic.request(monday_at(10, 0))).await,
        Err(BookingError::SlotTaken)
    );
}

#[tokio::test]
async fn test_dates_at_the_end_of_time_are_rejected() {
    let clinic = Clinic::new().await;

    assert_matches!(
        clinic.coordinator.get_availability(clinic.doctor.id, NaiveDate::MAX).await,
        Err(BookingError::Validation(_))
    );

    let last_minute = NaiveDate::MAX.and_hms_opt(23, 59, 0).unwrap().and_utc();
    assert_matches!(
        clinic.coordinator.book_appointment(clinic.request(last_minute)).await,
        Err(BookingError::Validation(_))
    );

    assert_matches!(
        clinic.coordinator.book_appointment(clinic.emergency(last_minute)).await,
        Err(BookingError::Validation(_))
    );
}
