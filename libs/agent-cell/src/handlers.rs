use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use tracing::info;

use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::extractor::maybe_user;

use serde_json::{json, Value};

use crate::models::{ChatRequest, ChatResponse, SessionDump, ToolInvocation};
use crate::services::{AgentService, SessionStore};

#[derive(Clone)]
pub struct AgentState {
    pub config: Arc<AppConfig>,
    pub agent: Arc<AgentService>,
    pub store: Arc<SessionStore>,
}

/// POST /api/ai. Auth is optional: anonymous callers chat as patients, a
/// valid token scopes what the agent may do on their behalf.
pub async fn chat(
    State(state): State<AgentState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let user = maybe_user(&headers, &state.config)?;

    info!(
        "Chat turn (session: {}, role: {})",
        request.session_id.as_deref().unwrap_or("new"),
        user.as_ref().map(|u| u.role.as_str()).unwrap_or("anonymous"),
    );

    let response = state.agent.run_turn(user.as_ref(), request).await?;
    Ok(Json(response))
}

/// GET /mcp/schema. Tool discovery for external callers and LLM frontends.
pub async fn mcp_schema(State(state): State<AgentState>) -> Json<Value> {
    Json(json!({ "tools": state.agent.tool_schemas() }))
}

/// POST /mcp/tool. Direct invocation of one registered tool, with the same
/// role gating as the chat loop but no session bookkeeping.
pub async fn invoke_tool(
    State(state): State<AgentState>,
    headers: HeaderMap,
    Json(request): Json<ToolInvocation>,
) -> Result<Json<Value>, AppError> {
    let user = maybe_user(&headers, &state.config)?;

    info!(
        "Direct tool invocation: {} (role: {})",
        request.tool,
        user.as_ref().map(|u| u.role.as_str()).unwrap_or("anonymous"),
    );

    let args = request.args.unwrap_or_else(|| json!({}));
    let result = state
        .agent
        .invoke_tool(user.as_ref(), &request.tool, args)
        .await?;
    Ok(Json(result))
}

/// GET /api/session/{session_id}. Unknown ids return an empty history.
pub async fn get_session(
    State(state): State<AgentState>,
    Path(session_id): Path<String>,
) -> Json<SessionDump> {
    let history = state.store.history(&session_id).await;
    Json(SessionDump {
        session_id,
        history,
    })
}
