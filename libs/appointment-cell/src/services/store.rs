use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, BookingInterval};
use crate::services::lifecycle::AppointmentLifecycleService;

const APPOINTMENT_COLUMNS: &str =
    "id,patient_id,doctor_id,date_time,duration_minutes,status,type,notes,is_emergency,created_at,updated_at";

/// Durable source of truth for appointments.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Scheduled appointments of the doctor overlapping `interval`, ascending by start.
    async fn find_conflicts(
        &self,
        doctor_id: Uuid,
        interval: &BookingInterval,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Insert `appointment` unless a scheduled appointment of the same doctor
    /// overlaps it. Check and insert are one atomic step.
    async fn insert_if_no_conflict(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    /// Conditional status change; only applies while the stored status is
    /// the one the transition was validated against.
    async fn update_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError>;

    async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError>;

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError>;
}

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    lifecycle: AppointmentLifecycleService,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn list_where<F>(&self, predicate: F) -> Vec<Appointment>
    where
        F: Fn(&Appointment) -> bool,
    {
        let mut matching: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|appointment| predicate(appointment))
            .cloned()
            .collect();
        matching.sort_by_key(|appointment| appointment.date_time);
        matching
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn find_conflicts(
        &self,
        doctor_id: Uuid,
        interval: &BookingInterval,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .list_where(|appointment| {
                appointment.doctor_id == doctor_id
                    && appointment.is_scheduled()
                    && appointment.interval().overlaps(interval)
            })
            .await)
    }

    async fn insert_if_no_conflict(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let interval = appointment.interval();
        let mut appointments = self.appointments.write().await;

        if appointment.is_scheduled() {
            let blocked = appointments.values().any(|existing| {
                existing.doctor_id == appointment.doctor_id
                    && existing.is_scheduled()
                    && existing.interval().overlaps(&interval)
            });
            if blocked {
                debug!("Slot {} of doctor {} is taken", appointment.date_time, appointment.doctor_id);
                return Err(AppointmentError::Conflict);
            }
        }

        appointments.insert(appointment.id, appointment.clone());
        info!("Appointment {} stored for doctor {}", appointment.id, appointment.doctor_id);
        Ok(appointment)
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments
            .get_mut(&appointment_id)
            .ok_or(AppointmentError::NotFound(appointment_id))?;

        self.lifecycle.validate_status_transition(appointment.status, new_status)?;

        appointment.status = new_status;
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .read()
            .await
            .get(&appointment_id)
            .cloned()
            .ok_or(AppointmentError::NotFound(appointment_id))
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.list_where(|appointment| appointment.doctor_id == doctor_id).await)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.list_where(|appointment| appointment.patient_id == patient_id).await)
    }
}

/// Appointments in the `appointments` table. The table's exclusion constraint
/// makes the insert conditional; PostgREST answers a violation with 409.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    access_key: String,
    lifecycle: AppointmentLifecycleService,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>, config: &AppConfig) -> Self {
        Self {
            supabase,
            access_key: config.store_access_key().to_string(),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    fn timestamp(instant: DateTime<Utc>) -> String {
        instant.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn parse_appointments(rows: Vec<Value>) -> Result<Vec<Appointment>, AppointmentError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::Backend(format!("Failed to parse appointments: {}", e)))
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?{}&select={}", query, APPOINTMENT_COLUMNS);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(&self.access_key), None)
            .await?;

        Self::parse_appointments(rows)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn find_conflicts(
        &self,
        doctor_id: Uuid,
        interval: &BookingInterval,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Looking for conflicts of doctor {} in {:?}", doctor_id, interval);

        self.fetch(&format!(
            "doctor_id=eq.{}&status=eq.scheduled&date_time=lt.{}&ends_at=gt.{}&order=date_time.asc",
            doctor_id,
            Self::timestamp(interval.end),
            Self::timestamp(interval.start)
        ))
        .await
    }

    async fn insert_if_no_conflict(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let row = json!({
            "id": appointment.id,
            "patient_id": appointment.patient_id,
            "doctor_id": appointment.doctor_id,
            "date_time": Self::timestamp(appointment.date_time),
            "ends_at": Self::timestamp(appointment.ends_at()),
            "duration_minutes": appointment.duration_minutes,
            "status": appointment.status,
            "type": appointment.appointment_type,
            "notes": appointment.notes,
            "is_emergency": appointment.is_emergency,
            "created_at": appointment.created_at.to_rfc3339(),
            "updated_at": appointment.updated_at.to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(&self.access_key),
                Some(row),
                Some(SupabaseClient::representation_headers()),
            )
            .await?;

        let stored = Self::parse_appointments(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Backend("Insert returned no rows".to_string()))?;

        info!("Appointment {} stored for doctor {}", stored.id, stored.doctor_id);
        Ok(stored)
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get(appointment_id).await?;
        self.lifecycle.validate_status_transition(current.status, new_status)?;

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            appointment_id, current.status
        );
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.access_key),
                Some(json!({
                    "status": new_status,
                    "updated_at": Utc::now().to_rfc3339(),
                })),
                Some(SupabaseClient::representation_headers()),
            )
            .await?;

        match Self::parse_appointments(rows)?.into_iter().next() {
            Some(updated) => Ok(updated),
            None => {
                // Another writer moved it first; report against what is stored now.
                let latest = self.get(appointment_id).await?;
                warn!(
                    "Appointment {} changed to {} before {} could be applied",
                    appointment_id, latest.status, new_status
                );
                Err(AppointmentError::InvalidTransition {
                    from: latest.status,
                    to: new_status,
                })
            }
        }
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.fetch(&format!("id=eq.{}", appointment_id))
            .await?
            .into_iter()
            .next()
            .ok_or(AppointmentError::NotFound(appointment_id))
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.fetch(&format!("doctor_id=eq.{}&order=date_time.asc", doctor_id)).await
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.fetch(&format!("patient_id=eq.{}&order=date_time.asc", patient_id)).await
    }
}
