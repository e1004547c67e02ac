use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Appointment, BookAppointmentRequest, Doctor, SchedulingError};
use crate::services::directory::DoctorDirectory;

/// The shared appointment calendar. One async mutex guards both the
/// appointment list and the occupancy index, so check-then-create is atomic
/// across concurrent turns: of two bookings for the same (doctor, start),
/// exactly one wins and the other sees `SlotTaken`.
pub struct ScheduleStore {
    inner: Mutex<ScheduleInner>,
}

#[derive(Default)]
struct ScheduleInner {
    appointments: Vec<Appointment>,
    occupied: HashSet<(Uuid, NaiveDateTime)>,
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ScheduleInner::default()),
        }
    }

    pub async fn insert_unique(&self, appointment: Appointment) -> Result<(), SchedulingError> {
        let mut inner = self.inner.lock().await;
        let key = (appointment.doctor_id, appointment.start);
        if !inner.occupied.insert(key) {
            return Err(SchedulingError::SlotTaken);
        }
        inner.appointments.push(appointment);
        Ok(())
    }

    pub async fn booked_starts_on(&self, doctor_id: Uuid, date: NaiveDate) -> HashSet<NaiveTime> {
        let inner = self.inner.lock().await;
        inner
            .appointments
            .iter()
            .filter(|a| a.doctor_id == doctor_id && a.start.date() == date)
            .map(|a| a.start.time())
            .collect()
    }

    pub async fn count_on(&self, doctor_id: Uuid, date: NaiveDate) -> i64 {
        let inner = self.inner.lock().await;
        inner
            .appointments
            .iter()
            .filter(|a| a.doctor_id == doctor_id && a.start.date() == date)
            .count() as i64
    }

    pub async fn appointments_for(&self, doctor_id: Uuid) -> Vec<Appointment> {
        let inner = self.inner.lock().await;
        inner
            .appointments
            .iter()
            .filter(|a| a.doctor_id == doctor_id)
            .cloned()
            .collect()
    }
}

pub struct BookingService {
    directory: Arc<DoctorDirectory>,
    schedule: Arc<ScheduleStore>,
}

impl BookingService {
    pub fn new(directory: Arc<DoctorDirectory>, schedule: Arc<ScheduleStore>) -> Self {
        Self {
            directory,
            schedule,
        }
    }

    /// Create an appointment. At-most-once per (doctor, slot): duplicates
    /// surface as `SlotTaken` and are never retried here.
    pub async fn book(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<(Doctor, Appointment), SchedulingError> {
        let doctor = self.directory.find(&request.doctor_name)?;

        if request.end <= request.start {
            return Err(SchedulingError::InvalidTime(
                "appointment end must be after its start".to_string(),
            ));
        }
        debug!(
            "Booking {} at {} for {}",
            doctor.name, request.start, request.patient_name
        );

        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: doctor.id,
            patient_name: request.patient_name,
            patient_email: request.patient_email,
            start: request.start,
            end: request.end,
            reason: request.reason.unwrap_or_default(),
            created_at: Utc::now(),
        };

        self.schedule.insert_unique(appointment.clone()).await?;

        info!(
            "Appointment {} booked with {} at {}",
            appointment.id, doctor.name, appointment.start
        );
        Ok((doctor, appointment))
    }
}
