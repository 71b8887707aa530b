// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{NaiveDate, Timelike, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use auth_cell::{DirectoryError, UserDirectory};
use doctor_cell::{day_of_week_for, minute_of_day, AvailabilityStore};
use performance_cell::{AvailabilityCache, CachedSlot};
use shared_models::auth::Actor;
use shared_models::user::UserRole;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookingError, BookingInterval, BookingRequest,
    BookingRules,
};
use crate::services::conflict::{free_intervals, latest_end};
use crate::services::store::AppointmentStore;

/// Orchestrates bookings. Holds no mutable state: the store's conditional
/// insert is the only arbiter between concurrent requests.
pub struct BookingCoordinator {
    directory: Arc<dyn UserDirectory>,
    availability: Arc<dyn AvailabilityStore>,
    appointments: Arc<dyn AppointmentStore>,
    cache: Arc<dyn AvailabilityCache>,
    rules: BookingRules,
}

impl BookingCoordinator {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        availability: Arc<dyn AvailabilityStore>,
        appointments: Arc<dyn AppointmentStore>,
        cache: Arc<dyn AvailabilityCache>,
        rules: BookingRules,
    ) -> Self {
        Self {
            directory,
            availability,
            appointments,
            cache,
            rules,
        }
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    #[instrument(
        skip(self, request),
        fields(
            doctor_id = %request.doctor_id,
            patient_id = %request.patient_id,
            requested_time = %request.requested_time,
            emergency = request.is_emergency
        )
    )]
    pub async fn book_appointment(&self, request: BookingRequest) -> Result<Appointment, BookingError> {
        let requested_time = request.requested_time;
        if requested_time.second() != 0 || requested_time.nanosecond() != 0 {
            return Err(BookingError::Validation(
                "Appointment time must fall on a whole minute".to_string(),
            ));
        }

        self.ensure_role(request.patient_id, UserRole::Patient).await?;
        self.ensure_role(request.doctor_id, UserRole::Doctor).await?;

        let duration = self.rules.duration_for(request.appointment_type);
        let interval = BookingInterval::new(requested_time, duration).ok_or_else(|| {
            BookingError::Validation(format!("Appointment time {} is out of range", requested_time))
        })?;

        if !request.is_emergency && !self.fits_availability(request.doctor_id, &interval).await? {
            warn!("Requested time is outside the doctor's availability");
            return Err(BookingError::OutsideAvailability {
                doctor_id: request.doctor_id,
                requested_time,
            });
        }

        let booked = match self.appointments.insert_if_no_conflict(new_appointment(&request, interval)).await {
            Ok(appointment) => appointment,
            Err(AppointmentError::Conflict) if request.is_emergency => {
                self.book_emergency(&request, interval).await?
            }
            Err(AppointmentError::Conflict) => {
                warn!("Slot already taken");
                return Err(BookingError::SlotTaken);
            }
            Err(e) => return Err(e.into()),
        };

        self.invalidate(booked.doctor_id, booked.date_time.date_naive()).await;
        info!("Appointment {} booked at {}", booked.id, booked.date_time);
        Ok(booked)
    }

    /// Walks forward past the appointments blocking each failed candidate.
    async fn book_emergency(
        &self,
        request: &BookingRequest,
        failed: BookingInterval,
    ) -> Result<Appointment, BookingError> {
        let duration = failed.duration_minutes();
        let mut candidate = failed;

        for attempt in 1..=self.rules.emergency_max_attempts {
            let blocking = self.appointments.find_conflicts(request.doctor_id, &candidate).await?;
            if let Some(next_start) = latest_end(&blocking) {
                match BookingInterval::new(next_start, duration) {
                    Some(next) => candidate = next,
                    None => break,
                }
            }

            debug!("Emergency attempt {} at {}", attempt, candidate.start);
            match self.appointments.insert_if_no_conflict(new_appointment(request, candidate)).await {
                Ok(appointment) => {
                    info!("Emergency booked at next open slot {}", candidate.start);
                    return Ok(appointment);
                }
                Err(AppointmentError::Conflict) => {
                    warn!(
                        "Emergency attempt {}/{} conflicted",
                        attempt, self.rules.emergency_max_attempts
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(BookingError::SlotTaken)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.appointments.get(appointment_id).await?;

        if !appointment.is_participant(actor.user_id) && !actor.is_staff() {
            return Err(BookingError::Forbidden(
                "Only the patient, the doctor or clinic staff can cancel this appointment".to_string(),
            ));
        }

        self.transition(appointment, AppointmentStatus::Cancelled).await
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.appointments.get(appointment_id).await?;

        if appointment.doctor_id != actor.user_id && !actor.is_admin() {
            return Err(BookingError::Forbidden(
                "Only the appointment's doctor or an admin can complete it".to_string(),
            ));
        }

        self.transition(appointment, AppointmentStatus::Completed).await
    }

    /// Free time of the doctor on `date`: windows of that weekday minus
    /// scheduled appointments.
    pub async fn get_availability(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BookingInterval>, BookingError> {
        let day = BookingInterval::day(date)
            .ok_or_else(|| BookingError::Validation(format!("Date {} is out of range", date)))?;

        let windows: Vec<BookingInterval> = self
            .availability
            .get_windows(doctor_id, day_of_week_for(date))
            .await?
            .into_iter()
            .map(|window| {
                BookingInterval::between(
                    day.start + chrono::Duration::minutes(i64::from(window.start_time)),
                    day.start + chrono::Duration::minutes(i64::from(window.end_time)),
                )
            })
            .collect();

        let booked: Vec<BookingInterval> = self
            .appointments
            .find_conflicts(doctor_id, &day)
            .await?
            .iter()
            .map(Appointment::interval)
            .collect();

        Ok(free_intervals(&windows, &booked))
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        Ok(self.appointments.get(appointment_id).await?)
    }

    pub async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, BookingError> {
        Ok(self.appointments.list_for_doctor(doctor_id).await?)
    }

    pub async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, BookingError> {
        Ok(self.appointments.list_for_patient(patient_id).await?)
    }

    async fn transition(
        &self,
        appointment: Appointment,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, BookingError> {
        let updated = self.appointments.update_status(appointment.id, new_status).await?;

        self.invalidate(updated.doctor_id, updated.date_time.date_naive()).await;
        info!("Appointment {} is now {}", updated.id, updated.status);
        Ok(updated)
    }

    async fn ensure_role(&self, user_id: Uuid, expected: UserRole) -> Result<(), BookingError> {
        let user = self.directory.get_user(user_id).await.map_err(|e| match e {
            DirectoryError::NotFound(id) if expected == UserRole::Doctor => BookingError::DoctorNotFound(id),
            DirectoryError::NotFound(id) => BookingError::PatientNotFound(id),
            DirectoryError::Backend(msg) => BookingError::Backend(msg),
        })?;

        if user.role() != expected {
            return Err(BookingError::Validation(format!(
                "User {} is a {}, not a {}",
                user_id,
                user.role(),
                expected
            )));
        }
        Ok(())
    }

    /// Whether the whole interval lies inside one available window. The cache
    /// only answers this question; it never stands in for the conflict check.
    async fn fits_availability(&self, doctor_id: Uuid, interval: &BookingInterval) -> Result<bool, BookingError> {
        let date = interval.start.date_naive();
        let start_minute = minute_of_day(interval.start);
        let duration = interval.duration_minutes();
        let slot = CachedSlot::new(start_minute, u16::try_from(duration).unwrap_or(u16::MAX));

        match self.cache.get(doctor_id, date, slot).await {
            Ok(Some(available)) => {
                debug!("Availability cache hit for doctor {} on {}", doctor_id, date);
                return Ok(available);
            }
            Ok(None) => {}
            Err(e) => warn!("Availability cache lookup failed, falling back to store: {}", e),
        }

        let windows = self.availability.get_windows(doctor_id, day_of_week_for(date)).await?;
        let start = u32::from(start_minute);
        let end = start.saturating_add(u32::try_from(duration).unwrap_or(u32::MAX));
        let available = windows.iter().any(|window| window.covers(start, end));

        if let Err(e) = self
            .cache
            .set(doctor_id, date, slot, available, self.rules.cache_ttl)
            .await
        {
            warn!("Failed to cache availability of doctor {}: {}", doctor_id, e);
        }

        Ok(available)
    }

    async fn invalidate(&self, doctor_id: Uuid, date: NaiveDate) {
        if let Err(e) = self.cache.invalidate(doctor_id, date).await {
            warn!("Failed to invalidate availability cache for doctor {} on {}: {}", doctor_id, date, e);
        }
    }
}

fn new_appointment(request: &BookingRequest, interval: BookingInterval) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        doctor_id: request.doctor_id,
        date_time: interval.start,
        duration_minutes: interval.duration_minutes(),
        status: AppointmentStatus::Scheduled,
        appointment_type: request.appointment_type,
        notes: request.notes.clone(),
        is_emergency: request.is_emergency,
        created_at: now,
        updated_at: now,
    }
}
