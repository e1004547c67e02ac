use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Extension, State},
    Json,
};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use notification_cell::NotificationDispatcher;

use crate::models::{ReportRequest, ReportResponse};
use crate::services::{DoctorDirectory, StatsService};

pub struct ReportState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<DoctorDirectory>,
    pub stats: Arc<StatsService>,
    pub dispatcher: Arc<NotificationDispatcher>,
}

/// Doctor-only summary report. A doctor token is scoped to the doctor it was
/// issued for; asking for anyone else's report is rejected, not rescoped.
pub async fn generate_report(
    State(state): State<Arc<ReportState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<ReportResponse>, AppError> {
    debug!("Report requested for {}", request.doctor_name);

    let bound = user
        .doctor_name
        .as_deref()
        .ok_or_else(|| AppError::Forbidden("Doctor role required".to_string()))?;

    let doctor = state.directory.find(&request.doctor_name)?;
    if !doctor.name.eq_ignore_ascii_case(bound) {
        return Err(AppError::Forbidden(format!(
            "Token is bound to {}, not {}",
            bound, doctor.name
        )));
    }

    let budget = Duration::from_secs(state.config.report_timeout_secs);
    let (doctor, report) = tokio::time::timeout(
        budget,
        state.stats.summary_report(&doctor.name, request.ref_date),
    )
    .await
    .map_err(|_| AppError::UpstreamTimeout("Report generation exceeded its budget".to_string()))??;

    let notification_sent = if request.send_notification.unwrap_or(true) {
        let outcome = state
            .dispatcher
            .summary_delivery(
                doctor.notify_webhook.as_deref(),
                &doctor.name,
                &report.summary_text,
            )
            .await;
        outcome.sent
    } else {
        false
    };

    info!(
        "Report for {} generated (notification_sent: {})",
        doctor.name, notification_sent
    );
    Ok(Json(ReportResponse {
        summary_text: report.summary_text,
        notification_sent,
    }))
}
