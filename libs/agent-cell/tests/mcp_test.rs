use std::sync::Arc;

use assert_matches::assert_matches;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use agent_cell::handlers::{invoke_tool, mcp_schema, AgentState};
use agent_cell::models::ToolInvocation;
use agent_cell::services::{build_registry, AgentService, RulePlanner, SessionStore};
use notification_cell::NotificationDispatcher;
use scheduling_cell::services::{
    AvailabilityService, BookingService, DoctorDirectory, ScheduleStore, StatsService,
};
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn state() -> AgentState {
    let config = TestConfig::default().to_arc();
    let directory = Arc::new(DoctorDirectory::seeded());
    let schedule = Arc::new(ScheduleStore::new());
    let availability = Arc::new(AvailabilityService::new(directory.clone(), schedule.clone()));
    let booking = Arc::new(BookingService::new(directory.clone(), schedule.clone()));
    let stats = Arc::new(StatsService::new(directory.clone(), schedule));
    let dispatcher = Arc::new(NotificationDispatcher::new(config.clone()));

    let registry = Arc::new(build_registry(availability, booking, stats, dispatcher));
    let store = Arc::new(SessionStore::new());
    let agent = Arc::new(AgentService::new(
        store.clone(),
        registry,
        Arc::new(RulePlanner::new()),
        directory,
    ));

    AgentState {
        config,
        agent,
        store,
    }
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Authorization", format!("Bearer {}", token).parse().unwrap());
    headers
}

fn invocation(tool: &str, args: serde_json::Value) -> Json<ToolInvocation> {
    Json(ToolInvocation {
        tool: tool.to_string(),
        args: Some(args),
    })
}

#[tokio::test]
async fn schema_lists_every_registered_tool() {
    let Json(schema) = mcp_schema(State(state())).await;

    let mut names: Vec<&str> = schema["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["function"]["name"].as_str())
        .collect();
    names.sort_unstable();
    assert_eq!(
        names,
        vec![
            "create_appointment",
            "get_doctor_availability",
            "get_doctor_stats",
            "get_doctor_summary_report",
        ]
    );
}

#[tokio::test]
async fn availability_is_invocable_anonymously() {
    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();

    let Json(result) = invoke_tool(
        State(state()),
        HeaderMap::new(),
        invocation(
            "get_doctor_availability",
            json!({"doctor_name": "mehta", "start_date": today}),
        ),
    )
    .await
    .unwrap();

    assert_eq!(result["ok"], true);
    assert_eq!(result["doctor"], "Dr. Mehta");
    assert_eq!(result["available_slots"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn direct_booking_skips_quoting_but_still_conflicts() {
    let state = state();
    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let args = json!({
        "doctor_name": "Dr. Joy",
        "patient_name": "Ayush",
        "patient_email": "ayush@example.com",
        "start_iso": format!("{}T09:00:00", today),
        "end_iso": format!("{}T10:00:00", today),
    });

    let Json(result) = invoke_tool(
        State(state.clone()),
        HeaderMap::new(),
        invocation("create_appointment", args.clone()),
    )
    .await
    .unwrap();
    assert_eq!(result["ok"], true);

    let err = invoke_tool(
        State(state),
        HeaderMap::new(),
        invocation("create_appointment", args),
    )
    .await
    .unwrap_err();
    assert_matches!(err, AppError::Conflict(_));
}

#[tokio::test]
async fn doctor_tools_stay_gated() {
    let state = state();

    let err = invoke_tool(
        State(state.clone()),
        HeaderMap::new(),
        invocation("get_doctor_stats", json!({"doctor_name": "mehta"})),
    )
    .await
    .unwrap_err();
    assert_matches!(err, AppError::Forbidden(_));

    let doctor = TestUser::doctor("doc@example.com", "Dr. Mehta");
    let token = JwtTestUtils::create_test_token(&doctor, &state.config.jwt_secret, None);

    let Json(result) = invoke_tool(
        State(state.clone()),
        bearer(&token),
        invocation("get_doctor_stats", json!({"doctor_name": "mehta"})),
    )
    .await
    .unwrap();
    assert_eq!(result["ok"], true);
    assert_eq!(result["doctor"], "Dr. Mehta");

    let err = invoke_tool(
        State(state),
        bearer(&token),
        invocation("get_doctor_stats", json!({"doctor_name": "ahuja"})),
    )
    .await
    .unwrap_err();
    assert_matches!(err, AppError::Forbidden(_));
}

#[tokio::test]
async fn unknown_tool_is_a_bad_request() {
    let err = invoke_tool(
        State(state()),
        HeaderMap::new(),
        invocation("drop_all_tables", json!({})),
    )
    .await
    .unwrap_err();
    assert_matches!(err, AppError::BadRequest(_));
}

#[tokio::test]
async fn invalid_token_is_rejected_before_dispatch() {
    let err = invoke_tool(
        State(state()),
        bearer(&JwtTestUtils::create_malformed_token()),
        invocation("get_doctor_availability", json!({})),
    )
    .await
    .unwrap_err();
    assert_matches!(err, AppError::Auth(_));
}
