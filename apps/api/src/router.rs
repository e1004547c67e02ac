use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;

use agent_cell::handlers::AgentState;
use agent_cell::router::{agent_routes, mcp_routes};
use auth_cell::handlers::AuthState;
use auth_cell::router::auth_routes;
use scheduling_cell::handlers::ReportState;
use scheduling_cell::router::report_routes;
use shared_config::AppConfig;

pub fn create_router(
    config: Arc<AppConfig>,
    auth_state: AuthState,
    agent_state: AgentState,
    report_state: Arc<ReportState>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic agent API is running!" }))
        .route("/health", get(|| async { Json(json!({"ok": true})) }))
        .nest("/auth", auth_routes(auth_state))
        .nest("/api", agent_routes(agent_state.clone()))
        .nest("/mcp", mcp_routes(agent_state))
        .nest("/doctor", report_routes(config, report_state))
}
