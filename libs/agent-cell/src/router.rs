use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{self, AgentState};

pub fn agent_routes(state: AgentState) -> Router {
    Router::new()
        .route("/ai", post(handlers::chat))
        .route("/session/{session_id}", get(handlers::get_session))
        .with_state(state)
}

pub fn mcp_routes(state: AgentState) -> Router {
    Router::new()
        .route("/schema", get(handlers::mcp_schema))
        .route("/tool", post(handlers::invoke_tool))
        .with_state(state)
}
