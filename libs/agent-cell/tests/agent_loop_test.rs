use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Utc;

use agent_cell::models::{ChatRequest, MessageRole};
use agent_cell::services::{build_registry, AgentService, RulePlanner, SessionStore};
use notification_cell::NotificationDispatcher;
use scheduling_cell::services::{
    AvailabilityService, BookingService, DoctorDirectory, ScheduleStore, StatsService,
};
use shared_models::error::AppError;
use shared_utils::test_utils::{TestConfig, TestUser};

struct Harness {
    agent: Arc<AgentService>,
    store: Arc<SessionStore>,
}

fn harness() -> Harness {
    let config = TestConfig::default().to_arc();
    let directory = Arc::new(DoctorDirectory::seeded());
    let schedule = Arc::new(ScheduleStore::new());
    let availability = Arc::new(AvailabilityService::new(directory.clone(), schedule.clone()));
    let booking = Arc::new(BookingService::new(directory.clone(), schedule.clone()));
    let stats = Arc::new(StatsService::new(directory.clone(), schedule));
    let dispatcher = Arc::new(NotificationDispatcher::new(config));

    let registry = Arc::new(build_registry(availability, booking, stats, dispatcher));
    let store = Arc::new(SessionStore::new());
    let agent = Arc::new(AgentService::new(
        store.clone(),
        registry,
        Arc::new(RulePlanner::new()),
        directory,
    ));

    Harness { agent, store }
}

fn request(session_id: Option<&str>, message: &str) -> ChatRequest {
    ChatRequest {
        session_id: session_id.map(str::to_string),
        message: message.to_string(),
    }
}

fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

#[tokio::test]
async fn availability_turn_quotes_slots_and_records_history() {
    let h = harness();

    let response = h
        .agent
        .run_turn(None, request(None, "check Dr. Mehta availability"))
        .await
        .unwrap();

    assert!(response.ok);
    assert_eq!(response.mode, "mock");
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].tool, "get_doctor_availability");
    assert_eq!(response.tool_calls[0].result["ok"], true);
    assert!(response.reply.contains("Available slots for Dr. Mehta"));

    // user message, one tool record, assistant reply
    let history = h.store.history(&response.session_id).await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].role, MessageRole::User);
    assert_eq!(history[1].role, MessageRole::Tool);
    assert_eq!(history[2].role, MessageRole::Assistant);
}

#[tokio::test]
async fn provided_session_id_is_reused() {
    let h = harness();
    let response = h
        .agent
        .run_turn(None, request(Some("my-session"), "hello"))
        .await
        .unwrap();
    assert_eq!(response.session_id, "my-session");
}

#[tokio::test]
async fn booking_an_unquoted_slot_is_refused() {
    let h = harness();
    let message = format!("book Dr. Roy {}T09:00 for John", today());

    let response = h.agent.run_turn(None, request(None, &message)).await.unwrap();

    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].tool, "create_appointment");
    assert_eq!(response.tool_calls[0].result["ok"], false);
    assert!(response.tool_calls[0].result["error"]
        .as_str()
        .unwrap()
        .contains("not offered in this conversation"));
    assert!(response.reply.contains("Booking failed"));
}

#[tokio::test]
async fn quoted_slot_books_once_then_conflicts() {
    let h = harness();

    // First turn quotes today's slots for Dr. Roy.
    let first = h
        .agent
        .run_turn(None, request(Some("s1"), "check Dr. Roy availability"))
        .await
        .unwrap();
    assert_eq!(first.tool_calls[0].result["ok"], true);

    // Second turn books a quoted slot; mail gateway is unconfigured, so the
    // confirmation is simulated and still counts as sent.
    let book = format!("book Dr. Roy {}T09:00 for John Smith", today());
    let second = h
        .agent
        .run_turn(None, request(Some("s1"), &book))
        .await
        .unwrap();
    let result = &second.tool_calls[0].result;
    assert_eq!(result["ok"], true);
    assert_eq!(result["notification_sent"], true);
    assert!(second.reply.contains("Booked Dr. Roy"));

    // A different session quoting the same day cannot take the same slot.
    let other_quote = h
        .agent
        .run_turn(None, request(Some("s2"), "check Dr. Roy availability"))
        .await
        .unwrap();
    let slots = other_quote.tool_calls[0].result["available_slots"]
        .as_array()
        .unwrap()
        .clone();
    assert!(slots
        .iter()
        .all(|s| s["start_iso"] != format!("{}T09:00:00", today())));

    let third = h
        .agent
        .run_turn(None, request(Some("s2"), &book))
        .await
        .unwrap();
    assert_eq!(third.tool_calls[0].result["ok"], false);
    assert!(third.reply.contains("Booking failed"));
}

#[tokio::test]
async fn racing_quoted_bookings_surface_one_conflict() {
    let h = harness();

    // Both sessions quote the slot while it is still free, so both pass the
    // quoted-slot check and the schedule lock picks the single winner.
    for session in ["a", "b"] {
        let quote = h
            .agent
            .run_turn(None, request(Some(session), "check Dr. Joy availability"))
            .await
            .unwrap();
        assert_eq!(quote.tool_calls[0].result["ok"], true);
    }

    let book = format!("book Dr. Joy {}T11:00 for Race", today());
    let (a, b) = tokio::join!(
        h.agent.run_turn(None, request(Some("a"), &book)),
        h.agent.run_turn(None, request(Some("b"), &book)),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    let winners = [&a, &b]
        .iter()
        .filter(|r| r.tool_calls[0].result["ok"] == true)
        .count();
    assert_eq!(winners, 1);

    let loser = if a.tool_calls[0].result["ok"] == true { &b } else { &a };
    assert!(loser.tool_calls[0].result["error"]
        .as_str()
        .unwrap()
        .contains("Slot already booked"));
    assert!(loser.reply.contains("Booking failed"));
}

#[tokio::test]
async fn patient_cannot_fetch_stats() {
    let h = harness();
    let user = TestUser::patient("pat@example.com").to_auth_user();

    let response = h
        .agent
        .run_turn(Some(&user), request(None, "how many patients today"))
        .await
        .unwrap();

    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].result["ok"], false);
    assert!(response.tool_calls[0].result["error"]
        .as_str()
        .unwrap()
        .contains("doctors only"));
}

#[tokio::test]
async fn doctor_gets_own_summary_report() {
    let h = harness();
    let user = TestUser::doctor("doc@example.com", "Dr. Mehta").to_auth_user();

    let response = h
        .agent
        .run_turn(Some(&user), request(None, "how many patients today"))
        .await
        .unwrap();

    let result = &response.tool_calls[0].result;
    assert_eq!(response.tool_calls[0].tool, "get_doctor_summary_report");
    assert_eq!(result["ok"], true);
    assert!(result["summary_text"]
        .as_str()
        .unwrap()
        .contains("Summary report for Dr. Mehta"));
    // No webhook bound, so delivery is simulated and reported as sent.
    assert_eq!(result["notification_sent"], true);
    assert!(response.reply.contains("Notification sent: Yes"));
}

#[tokio::test]
async fn doctor_cannot_read_another_doctors_stats() {
    let h = harness();
    let user = TestUser::doctor("doc@example.com", "Dr. Mehta").to_auth_user();

    let response = h
        .agent
        .run_turn(
            Some(&user),
            request(None, "how many patients visited Dr. Ahuja today"),
        )
        .await
        .unwrap();

    assert_eq!(response.tool_calls[0].result["ok"], false);
    assert!(response.tool_calls[0].result["error"]
        .as_str()
        .unwrap()
        .contains("Forbidden"));
}

#[tokio::test]
async fn doctor_cannot_book_through_the_agent() {
    let h = harness();
    let user = TestUser::doctor("doc@example.com", "Dr. Mehta").to_auth_user();
    let message = format!("book Dr. Mehta {}T10:00 for Self", today());

    let response = h
        .agent
        .run_turn(Some(&user), request(None, &message))
        .await
        .unwrap();

    assert_eq!(response.tool_calls[0].result["ok"], false);
    assert!(response.tool_calls[0].result["error"]
        .as_str()
        .unwrap()
        .contains("cannot book"));
}

#[tokio::test]
async fn unknown_doctor_degrades_to_error_reply() {
    let h = harness();

    let response = h
        .agent
        .run_turn(None, request(None, "check Dr. Nobody availability"))
        .await
        .unwrap();

    assert!(response.ok);
    assert_eq!(response.tool_calls[0].result["ok"], false);
    assert!(response.reply.starts_with("Error:"));
}

#[tokio::test]
async fn missing_doctor_asks_for_clarification_without_tools() {
    let h = harness();

    let response = h
        .agent
        .run_turn(None, request(None, "book an appointment"))
        .await
        .unwrap();

    assert!(response.tool_calls.is_empty());
    assert!(response.reply.contains("Which doctor"));
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let h = harness();
    let err = h
        .agent
        .run_turn(None, request(None, "   "))
        .await
        .unwrap_err();
    assert_matches!(err, AppError::BadRequest(_));
}
