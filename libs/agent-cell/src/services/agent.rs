use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use scheduling_cell::services::DoctorDirectory;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{ChatRequest, ChatResponse, MessageRole, ToolCall};

use super::gate::RoleGate;
use super::planner::{Planner, PlannerDecision, TurnContext};
use super::store::{SessionState, SessionStore};
use super::tools::{self, names, ToolRegistry};

/// How many planning rounds a single turn may take. One round plans, the next
/// usually summarizes tool output; three leaves headroom for a follow-up call.
const MAX_PLANNING_ROUNDS: usize = 3;

/// How much history the planner sees. The store keeps everything.
const PLANNER_CONTEXT_MESSAGES: usize = 20;

/// Orchestrates one chat turn: session bookkeeping, planning, gated tool
/// execution, and the final reply.
pub struct AgentService {
    store: Arc<SessionStore>,
    registry: Arc<ToolRegistry>,
    gate: RoleGate,
    planner: Arc<dyn Planner>,
    directory: Arc<DoctorDirectory>,
}

impl AgentService {
    pub fn new(
        store: Arc<SessionStore>,
        registry: Arc<ToolRegistry>,
        planner: Arc<dyn Planner>,
        directory: Arc<DoctorDirectory>,
    ) -> Self {
        Self {
            store,
            registry,
            gate: RoleGate::new(directory.clone()),
            planner,
            directory,
        }
    }

    /// Discovery payload for direct tool callers.
    pub fn tool_schemas(&self) -> Vec<Value> {
        self.registry.schemas()
    }

    /// Direct, sessionless tool invocation. The role gate still applies;
    /// the quoted-slot precondition does not, since that is chat-turn policy.
    /// Failures surface as typed errors rather than degraded replies.
    pub async fn invoke_tool(
        &self,
        user: Option<&AuthUser>,
        tool: &str,
        args: Value,
    ) -> Result<Value, AppError> {
        let args = self.gate.authorize(user, tool, args).await?;
        self.registry.execute(tool, args).await
    }

    pub async fn run_turn(
        &self,
        user: Option<&AuthUser>,
        request: ChatRequest,
    ) -> Result<ChatResponse, AppError> {
        let message = request.message.trim().to_string();
        if message.is_empty() {
            return Err(AppError::BadRequest("message must not be empty".to_string()));
        }

        let session_id = request
            .session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(SessionStore::new_session_id);

        // The session lock is held for the whole turn, so concurrent turns on
        // the same session serialize and history stays interleaved correctly.
        let cell = self.store.session(&session_id).await;
        let mut state = cell.lock().await;
        state.append(MessageRole::User, &message);

        let mut tool_outputs: Vec<ToolCall> = Vec::new();
        let mut reply: Option<String> = None;

        for _ in 0..MAX_PLANNING_ROUNDS {
            let history = state.recent_messages(PLANNER_CONTEXT_MESSAGES);
            let ctx = TurnContext {
                user,
                message: &message,
                history: &history,
                tool_outputs: &tool_outputs,
                today: Utc::now().date_naive(),
            };

            match self.planner.plan(&ctx).await? {
                PlannerDecision::Respond(text) | PlannerDecision::Clarify(text) => {
                    reply = Some(text);
                    break;
                }
                PlannerDecision::Invoke(calls) => {
                    for planned in calls {
                        let call = self
                            .dispatch(user, &mut state, &planned.tool, planned.args)
                            .await;
                        state.append(
                            MessageRole::Tool,
                            &serde_json::to_string(&json!({
                                "tool": call.tool,
                                "result": call.result,
                            }))
                            .unwrap_or_default(),
                        );
                        tool_outputs.push(call);
                    }
                }
            }
        }

        let reply =
            reply.unwrap_or_else(|| super::planner::summarize_tool_outputs(&tool_outputs));
        state.append(MessageRole::Assistant, &reply);

        Ok(ChatResponse {
            ok: true,
            session_id,
            reply,
            tool_calls: tool_outputs,
            mode: self.planner.mode(),
        })
    }

    /// Run one tool call through the gate, the quoted-slot precondition, and
    /// the registry. Failures become `ok: false` results rather than HTTP
    /// errors, so one refused tool never aborts the turn.
    async fn dispatch(
        &self,
        user: Option<&AuthUser>,
        state: &mut SessionState,
        tool: &str,
        args: Value,
    ) -> ToolCall {
        let args = match self.gate.authorize(user, tool, args).await {
            Ok(args) => args,
            Err(err) => {
                tracing::warn!("Tool '{}' refused: {}", tool, err);
                return ToolCall {
                    tool: tool.to_string(),
                    args: Value::Null,
                    result: json!({"ok": false, "error": err.to_string()}),
                };
            }
        };

        if tool == names::CREATE_APPOINTMENT {
            if let Some(err) = self.booking_precondition(state, &args) {
                return ToolCall {
                    tool: tool.to_string(),
                    args,
                    result: json!({"ok": false, "error": err}),
                };
            }
        }

        let result = match self.registry.execute(tool, args.clone()).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!("Tool '{}' failed: {}", tool, err);
                json!({"ok": false, "error": err.to_string()})
            }
        };

        if tool == names::GET_DOCTOR_AVAILABILITY {
            self.record_quoted_slots(state, &result);
        }

        ToolCall {
            tool: tool.to_string(),
            args,
            result,
        }
    }

    /// Bookings may only target slots the agent has quoted earlier in this
    /// session. Unknown doctors fall through so the tool reports them.
    fn booking_precondition(&self, state: &SessionState, args: &Value) -> Option<String> {
        let doctor_name = args["doctor_name"].as_str()?;
        let doctor = self.directory.find(doctor_name).ok()?;
        let start_iso = args["start_iso"].as_str()?;
        let start = tools::parse_datetime(start_iso, "start_iso").ok()?;

        if state.slot_was_quoted(doctor.id, start) {
            None
        } else {
            Some(format!(
                "Slot {} for {} was not offered in this conversation. Check availability first.",
                start_iso, doctor.name
            ))
        }
    }

    fn record_quoted_slots(&self, state: &mut SessionState, result: &Value) {
        if !result["ok"].as_bool().unwrap_or(false) {
            return;
        }
        let Some(doctor_id) = result["doctor_id"]
            .as_str()
            .and_then(|raw| uuid::Uuid::parse_str(raw).ok())
        else {
            return;
        };
        let Some(slots) = result["available_slots"].as_array() else {
            return;
        };
        for slot in slots {
            if let Some(start) = slot["start_iso"]
                .as_str()
                .and_then(|raw| tools::parse_datetime(raw, "start_iso").ok())
            {
                state.note_quoted_slot(doctor_id, start);
            }
        }
    }
}
