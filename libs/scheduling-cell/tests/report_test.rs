use std::sync::Arc;

use assert_matches::assert_matches;
use axum::extract::{Extension, State};
use axum::Json;
use chrono::NaiveDate;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::NotificationDispatcher;
use scheduling_cell::handlers::{generate_report, ReportState};
use scheduling_cell::models::{BookAppointmentRequest, ReportRequest};
use scheduling_cell::services::{BookingService, DoctorDirectory, ScheduleStore, StatsService};
use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use shared_utils::test_utils::{TestConfig, TestUser};

async fn setup_state() -> (Arc<ReportState>, Arc<DoctorDirectory>) {
    let config = TestConfig::default().to_arc();
    let directory = Arc::new(DoctorDirectory::seeded());
    let schedule = Arc::new(ScheduleStore::new());

    let booking = BookingService::new(directory.clone(), schedule.clone());
    let date = NaiveDate::from_ymd_opt(2025, 12, 2).unwrap();
    booking
        .book(BookAppointmentRequest {
            doctor_name: "Dr. Mehta".to_string(),
            patient_name: "Ayush".to_string(),
            patient_email: "ayush@example.com".to_string(),
            start: date.and_hms_opt(10, 0, 0).unwrap(),
            end: date.and_hms_opt(11, 0, 0).unwrap(),
            reason: Some("fever".to_string()),
        })
        .await
        .unwrap();

    let state = Arc::new(ReportState {
        config: config.clone(),
        directory: directory.clone(),
        stats: Arc::new(StatsService::new(directory.clone(), schedule)),
        dispatcher: Arc::new(NotificationDispatcher::new(config)),
    });
    (state, directory)
}

fn doctor_user(name: &str) -> Extension<AuthUser> {
    Extension(TestUser::doctor("doc@example.com", name).to_auth_user())
}

fn report_request(doctor: &str) -> Json<ReportRequest> {
    Json(ReportRequest {
        doctor_name: doctor.to_string(),
        ref_date: NaiveDate::from_ymd_opt(2025, 12, 2),
        send_notification: Some(true),
    })
}

#[tokio::test]
async fn doctor_receives_own_summary_report() {
    let (state, _) = setup_state().await;

    let Json(response) = generate_report(
        State(state),
        doctor_user("Dr. Mehta"),
        report_request("Dr. Mehta"),
    )
    .await
    .unwrap();

    assert!(response.summary_text.contains("Summary report for Dr. Mehta"));
    assert!(response.summary_text.contains("Patients today: 1"));
    assert!(response.summary_text.contains("Fever: 1"));
    // No webhook bound: delivery is simulated as sent.
    assert!(response.notification_sent);
}

#[tokio::test]
async fn cross_doctor_report_is_forbidden() {
    let (state, _) = setup_state().await;

    let err = generate_report(
        State(state),
        doctor_user("Dr. Mehta"),
        report_request("Dr. Roy"),
    )
    .await
    .unwrap_err();

    assert_matches!(err, AppError::Forbidden(_));
}

#[tokio::test]
async fn patient_token_is_forbidden() {
    let (state, _) = setup_state().await;
    let patient = Extension(TestUser::patient("pat@example.com").to_auth_user());

    let err = generate_report(State(state), patient, report_request("Dr. Mehta"))
        .await
        .unwrap_err();

    assert_matches!(err, AppError::Forbidden(_));
}

#[tokio::test]
async fn unknown_doctor_is_unknown_entity() {
    let (state, _) = setup_state().await;

    let err = generate_report(
        State(state),
        doctor_user("Dr. Nobody"),
        report_request("Dr. Nobody"),
    )
    .await
    .unwrap_err();

    assert_matches!(err, AppError::UnknownEntity(_));
}

#[tokio::test]
async fn summary_is_delivered_to_bound_webhook() {
    let (state, directory) = setup_state().await;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    directory
        .bind_webhook("Dr. Mehta", &format!("{}/hook", server.uri()))
        .unwrap();

    let Json(response) = generate_report(
        State(state),
        doctor_user("Dr. Mehta"),
        report_request("Dr. Mehta"),
    )
    .await
    .unwrap();

    assert!(response.notification_sent);
}

#[tokio::test]
async fn webhook_failure_degrades_to_not_sent() {
    let (state, directory) = setup_state().await;
    directory
        .bind_webhook("Dr. Mehta", "http://127.0.0.1:1/hook")
        .unwrap();

    let Json(response) = generate_report(
        State(state),
        doctor_user("Dr. Mehta"),
        report_request("Dr. Mehta"),
    )
    .await
    .unwrap();

    assert!(!response.notification_sent);
    assert!(response.summary_text.contains("Summary report for Dr. Mehta"));
}

#[tokio::test]
async fn notification_can_be_suppressed() {
    let (state, _) = setup_state().await;

    let Json(response) = generate_report(
        State(state),
        doctor_user("Dr. Mehta"),
        Json(ReportRequest {
            doctor_name: "Dr. Mehta".to_string(),
            ref_date: NaiveDate::from_ymd_opt(2025, 12, 2),
            send_notification: Some(false),
        }),
    )
    .await
    .unwrap();

    assert!(!response.notification_sent);
}
