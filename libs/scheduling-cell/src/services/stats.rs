use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use crate::models::{Doctor, DoctorStats, ReasonCount, SchedulingError, SummaryReport};
use crate::services::booking::ScheduleStore;
use crate::services::directory::DoctorDirectory;

pub struct StatsService {
    directory: Arc<DoctorDirectory>,
    schedule: Arc<ScheduleStore>,
}

impl StatsService {
    pub fn new(directory: Arc<DoctorDirectory>, schedule: Arc<ScheduleStore>) -> Self {
        Self {
            directory,
            schedule,
        }
    }

    /// Patient counts around ref_date plus the fever keyword count.
    /// ref_date defaults to today.
    pub async fn stats(
        &self,
        doctor_name: &str,
        ref_date: Option<NaiveDate>,
    ) -> Result<DoctorStats, SchedulingError> {
        let doctor = self.directory.find(doctor_name)?;
        let ref_date = ref_date.unwrap_or_else(|| Utc::now().date_naive());

        let patients_yesterday = self
            .schedule
            .count_on(doctor.id, ref_date - Duration::days(1))
            .await;
        let patients_today = self.schedule.count_on(doctor.id, ref_date).await;
        let patients_tomorrow = self
            .schedule
            .count_on(doctor.id, ref_date + Duration::days(1))
            .await;

        let fever_cases = self
            .schedule
            .appointments_for(doctor.id)
            .await
            .iter()
            .filter(|a| a.reason.to_lowercase().contains("fever"))
            .count() as i64;

        Ok(DoctorStats {
            doctor: doctor.name,
            ref_date,
            patients_yesterday,
            patients_today,
            patients_tomorrow,
            fever_cases,
        })
    }

    /// Full summary: day counts, a reason breakdown sorted by frequency,
    /// and the rendered text that also goes out over the notification channel.
    pub async fn summary_report(
        &self,
        doctor_name: &str,
        ref_date: Option<NaiveDate>,
    ) -> Result<(Doctor, SummaryReport), SchedulingError> {
        let doctor = self.directory.find(doctor_name)?;
        let stats = self.stats(doctor_name, ref_date).await?;

        let mut by_reason: HashMap<String, i64> = HashMap::new();
        for appointment in self.schedule.appointments_for(doctor.id).await {
            let reason = appointment.reason.trim().to_lowercase();
            if !reason.is_empty() {
                *by_reason.entry(reason).or_insert(0) += 1;
            }
        }

        let mut reasons_breakdown: Vec<ReasonCount> = by_reason
            .into_iter()
            .map(|(reason, count)| ReasonCount { reason, count })
            .collect();
        reasons_breakdown.sort_by(|a, b| b.count.cmp(&a.count).then(a.reason.cmp(&b.reason)));
        reasons_breakdown.truncate(10);

        let summary_text = render_summary(&stats, &reasons_breakdown);

        Ok((
            doctor,
            SummaryReport {
                doctor: stats.doctor,
                ref_date: stats.ref_date,
                patients_yesterday: stats.patients_yesterday,
                patients_today: stats.patients_today,
                patients_tomorrow: stats.patients_tomorrow,
                reasons_breakdown,
                summary_text,
            },
        ))
    }
}

fn render_summary(stats: &DoctorStats, reasons: &[ReasonCount]) -> String {
    let mut lines = vec![
        format!("Summary report for {} - {}", stats.doctor, stats.ref_date),
        String::new(),
        format!("- Patients yesterday: {}", stats.patients_yesterday),
        format!("- Patients today: {}", stats.patients_today),
        format!("- Patients tomorrow: {}", stats.patients_tomorrow),
        "- Reason breakdown:".to_string(),
    ];

    if reasons.is_empty() {
        lines.push("  * No categorized reasons available.".to_string());
    } else {
        for entry in reasons {
            lines.push(format!("  * {}: {}", title_case(&entry.reason), entry.count));
        }
    }

    lines.join("\n")
}

fn title_case(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookAppointmentRequest;
    use crate::services::booking::BookingService;
    use assert_matches::assert_matches;

    async fn seeded_schedule() -> (StatsService, NaiveDate) {
        let directory = Arc::new(DoctorDirectory::seeded());
        let schedule = Arc::new(ScheduleStore::new());
        let booking = BookingService::new(directory.clone(), schedule.clone());
        let today = NaiveDate::from_ymd_opt(2025, 12, 2).unwrap();

        let book = |date: NaiveDate, hour: u32, reason: &str| {
            let booking = &booking;
            let reason = reason.to_string();
            async move {
                booking
                    .book(BookAppointmentRequest {
                        doctor_name: "Dr. Mehta".to_string(),
                        patient_name: "Patient".to_string(),
                        patient_email: "patient@example.com".to_string(),
                        start: date.and_hms_opt(hour, 0, 0).unwrap(),
                        end: date.and_hms_opt(hour + 1, 0, 0).unwrap(),
                        reason: Some(reason),
                    })
                    .await
                    .unwrap();
            }
        };

        book(today - Duration::days(1), 9, "fever").await;
        book(today, 10, "Fever").await;
        book(today, 11, "checkup").await;
        book(today + Duration::days(1), 9, "cough").await;

        (StatsService::new(directory, schedule), today)
    }

    #[tokio::test]
    async fn counts_are_relative_to_ref_date() {
        let (stats, today) = seeded_schedule().await;
        let result = stats.stats("Dr. Mehta", Some(today)).await.unwrap();

        assert_eq!(result.patients_yesterday, 1);
        assert_eq!(result.patients_today, 2);
        assert_eq!(result.patients_tomorrow, 1);
        assert_eq!(result.fever_cases, 2);
    }

    #[tokio::test]
    async fn summary_breaks_down_reasons_by_frequency() {
        let (stats, today) = seeded_schedule().await;
        let (_, report) = stats.summary_report("Dr. Mehta", Some(today)).await.unwrap();

        assert_eq!(report.reasons_breakdown[0].reason, "fever");
        assert_eq!(report.reasons_breakdown[0].count, 2);
        assert_eq!(report.reasons_breakdown.len(), 3);
        assert!(report.summary_text.contains("Summary report for Dr. Mehta"));
        assert!(report.summary_text.contains("Patients today: 2"));
        assert!(report.summary_text.contains("Fever: 2"));
    }

    #[tokio::test]
    async fn empty_schedule_reports_zeroes() {
        let directory = Arc::new(DoctorDirectory::seeded());
        let schedule = Arc::new(ScheduleStore::new());
        let stats = StatsService::new(directory, schedule);

        let result = stats.stats("Dr. Joy", None).await.unwrap();
        assert_eq!(result.patients_today, 0);
        assert_eq!(result.fever_cases, 0);

        let (_, report) = stats.summary_report("Dr. Joy", None).await.unwrap();
        assert!(report.summary_text.contains("No categorized reasons"));
    }

    #[tokio::test]
    async fn unknown_doctor_is_rejected() {
        let (stats, _) = seeded_schedule().await;
        assert_matches!(
            stats.stats("Dr. Nobody", None).await,
            Err(SchedulingError::UnknownDoctor(_))
        );
    }
}
