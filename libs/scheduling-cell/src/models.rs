use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

/// Appointments are hourly; the original clinic system never booked shorter.
pub const SLOT_MINUTES: u32 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    /// Chat-notification webhook bound to this doctor, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_webhook: Option<String>,
}

impl Doctor {
    pub fn new(name: &str, specialization: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            specialization: specialization.to_string(),
            notify_webhook: None,
        }
    }
}

/// A free, bookable interval for one doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub start_iso: String,
    pub end_iso: String,
}

impl AvailableSlot {
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            date,
            start_time: start,
            end_time: end,
            start_iso: date.and_time(start).format("%Y-%m-%dT%H:%M:%S").to_string(),
            end_iso: date.and_time(end).format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "morning" => Some(Self::Morning),
            "afternoon" => Some(Self::Afternoon),
            "evening" => Some(Self::Evening),
            _ => None,
        }
    }

    /// Clinic window as (start_hour, end_hour); default hours are 9 to 17.
    pub fn window(filter: Option<Self>) -> (u32, u32) {
        match filter {
            Some(Self::Morning) => (9, 12),
            Some(Self::Afternoon) => (12, 16),
            Some(Self::Evening) => (16, 19),
            None => (9, 17),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_name: String,
    pub patient_email: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_name: String,
    pub patient_name: String,
    pub patient_email: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorStats {
    pub doctor: String,
    pub ref_date: NaiveDate,
    pub patients_yesterday: i64,
    pub patients_today: i64,
    pub patients_tomorrow: i64,
    pub fever_cases: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub doctor: String,
    pub ref_date: NaiveDate,
    pub patients_yesterday: i64,
    pub patients_today: i64,
    pub patients_tomorrow: i64,
    pub reasons_breakdown: Vec<ReasonCount>,
    pub summary_text: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub doctor_name: String,
    pub ref_date: Option<NaiveDate>,
    pub send_notification: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub summary_text: String,
    pub notification_sent: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("Doctor '{0}' not found")]
    UnknownDoctor(String),

    #[error("Slot already booked")]
    SlotTaken,

    #[error("Invalid time: {0}")]
    InvalidTime(String),
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::UnknownDoctor(name) => {
                AppError::UnknownEntity(format!("Doctor '{}' not found", name))
            }
            SchedulingError::SlotTaken => AppError::Conflict("Slot already booked".to_string()),
            SchedulingError::InvalidTime(msg) => AppError::ValidationError(msg),
        }
    }
}
