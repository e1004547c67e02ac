use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::debug;

use crate::models::{AvailableSlot, Doctor, SchedulingError, TimeOfDay, SLOT_MINUTES};
use crate::services::booking::ScheduleStore;
use crate::services::directory::DoctorDirectory;

pub struct AvailabilityService {
    directory: Arc<DoctorDirectory>,
    schedule: Arc<ScheduleStore>,
}

impl AvailabilityService {
    pub fn new(directory: Arc<DoctorDirectory>, schedule: Arc<ScheduleStore>) -> Self {
        Self {
            directory,
            schedule,
        }
    }

    /// Free hourly slots for a doctor between start_date and end_date
    /// (inclusive), optionally narrowed to a time-of-day window.
    pub async fn free_slots(
        &self,
        doctor_name: &str,
        start_date: NaiveDate,
        end_date: Option<NaiveDate>,
        time_of_day: Option<TimeOfDay>,
    ) -> Result<(Doctor, Vec<AvailableSlot>), SchedulingError> {
        let doctor = self.directory.find(doctor_name)?;
        let end_date = end_date.unwrap_or(start_date);
        if end_date < start_date {
            return Err(SchedulingError::InvalidTime(
                "end_date precedes start_date".to_string(),
            ));
        }

        let (start_hour, end_hour) = TimeOfDay::window(time_of_day);
        let mut available = Vec::new();

        let mut date = start_date;
        while date <= end_date {
            let taken = self.schedule.booked_starts_on(doctor.id, date).await;
            let mut hour = start_hour;
            while hour < end_hour {
                let slot_start = NaiveTime::from_hms_opt(hour, 0, 0)
                    .ok_or_else(|| SchedulingError::InvalidTime(format!("bad hour {}", hour)))?;
                if !taken.contains(&slot_start) {
                    let slot_end = slot_start + Duration::minutes(SLOT_MINUTES as i64);
                    available.push(AvailableSlot::new(date, slot_start, slot_end));
                }
                hour += SLOT_MINUTES / 60;
            }
            date += Duration::days(1);
        }

        debug!(
            "{} free slots for {} between {} and {}",
            available.len(),
            doctor.name,
            start_date,
            end_date
        );
        Ok((doctor, available))
    }
}
