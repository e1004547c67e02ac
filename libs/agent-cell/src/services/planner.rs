use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use regex::Regex;
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{Message, MessageRole, ToolCall};

const HELP_REPLY: &str = "I didn't understand. Try: 'check Dr. Ahuja availability', \
'book 2025-12-02T09:00 for John', or 'how many patients yesterday'.";

/// Everything a planner may look at when deciding the next step of a turn.
pub struct TurnContext<'a> {
    pub user: Option<&'a AuthUser>,
    pub message: &'a str,
    /// Recent session history, already including this turn's user message.
    pub history: &'a [Message],
    /// Tool results produced earlier in this turn, in invocation order.
    pub tool_outputs: &'a [ToolCall],
    pub today: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct PlannedCall {
    pub tool: String,
    pub args: Value,
}

/// What the planner wants the loop to do next.
#[derive(Debug)]
pub enum PlannerDecision {
    /// Final user-facing text; the turn ends.
    Respond(String),
    /// A question back to the user instead of guessing at missing details.
    Clarify(String),
    /// Execute these tools, then plan again with their results.
    Invoke(Vec<PlannedCall>),
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, ctx: &TurnContext<'_>) -> Result<PlannerDecision, AppError>;

    /// Label reported in `ChatResponse.mode`.
    fn mode(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Rule-based planner
// ---------------------------------------------------------------------------

/// Deterministic keyword planner used when no LLM is configured, and as the
/// fallback when the LLM misbehaves. Never guesses a doctor: a message that
/// names no doctor gets a clarifying question back.
pub struct RulePlanner {
    doctor_re: Regex,
    datetime_re: Regex,
    patient_re: Regex,
}

impl Default for RulePlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl RulePlanner {
    pub fn new() -> Self {
        Self {
            doctor_re: Regex::new(r"(?i)dr\.?\s+([a-zA-Z]+)").expect("doctor regex"),
            datetime_re: Regex::new(r"(\d{4}-\d{2}-\d{2}T\d{2}:\d{2})").expect("datetime regex"),
            patient_re: Regex::new(r"(?i)for\s+([A-Za-z ]+)").expect("patient regex"),
        }
    }

    fn doctor_from(&self, message: &str) -> Option<String> {
        self.doctor_re
            .captures(message)
            .map(|c| format!("Dr. {}", title_word(&c[1])))
    }

    fn date_from(&self, msg: &str, today: NaiveDate) -> NaiveDate {
        if msg.contains("tomorrow") {
            today + ChronoDuration::days(1)
        } else if msg.contains("yesterday") {
            today - ChronoDuration::days(1)
        } else {
            today
        }
    }

    fn first_decision(&self, ctx: &TurnContext<'_>) -> PlannerDecision {
        let msg = ctx.message.to_lowercase();
        let doctor = self.doctor_from(ctx.message);

        if msg.contains("availability") || msg.contains("available") || msg.contains("slots") {
            let Some(doctor_name) = doctor else {
                return PlannerDecision::Clarify(
                    "Which doctor would you like to check? For example: 'check Dr. Ahuja availability'."
                        .to_string(),
                );
            };
            let start_date = self.date_from(&msg, ctx.today);
            return PlannerDecision::Invoke(vec![PlannedCall {
                tool: super::tools::names::GET_DOCTOR_AVAILABILITY.to_string(),
                args: json!({
                    "doctor_name": doctor_name,
                    "start_date": start_date.format("%Y-%m-%d").to_string(),
                }),
            }]);
        }

        if msg.contains("how many") || msg.contains("patients") || msg.contains("visited") {
            // Doctor tokens are scoped by the gate, so the name may be omitted
            // here; unauthenticated callers are refused downstream anyway.
            let ref_date = self.date_from(&msg, ctx.today);
            let mut args = json!({
                "ref_date": ref_date.format("%Y-%m-%d").to_string(),
                "send_notification": true,
            });
            if let Some(doctor_name) = doctor {
                args["doctor_name"] = Value::String(doctor_name);
            }
            return PlannerDecision::Invoke(vec![PlannedCall {
                tool: super::tools::names::GET_DOCTOR_SUMMARY_REPORT.to_string(),
                args,
            }]);
        }

        if msg.contains("book") || msg.contains("schedule") {
            let Some(doctor_name) = doctor else {
                return PlannerDecision::Clarify(
                    "Which doctor should I book with? For example: 'book Dr. Ahuja 2025-12-02T09:00 for John'."
                        .to_string(),
                );
            };

            if let Some(dt) = self.datetime_re.captures(ctx.message) {
                let start_iso = format!("{}:00", &dt[1]);
                let start = match chrono::NaiveDateTime::parse_from_str(
                    &start_iso,
                    "%Y-%m-%dT%H:%M:%S",
                ) {
                    Ok(start) => start,
                    Err(_) => {
                        return PlannerDecision::Clarify(format!(
                            "I couldn't read '{}' as a datetime. Use e.g. 2025-12-02T09:00.",
                            &dt[1]
                        ))
                    }
                };
                let end_iso = (start + ChronoDuration::hours(1))
                    .format("%Y-%m-%dT%H:%M:%S")
                    .to_string();

                let patient_name = self
                    .patient_re
                    .captures(ctx.message)
                    .map(|c| title_words(c[1].trim()))
                    .unwrap_or_else(|| "Patient".to_string());
                let patient_email = ctx
                    .user
                    .and_then(|u| u.email.clone())
                    .unwrap_or_else(|| "patient@example.com".to_string());

                return PlannerDecision::Invoke(vec![PlannedCall {
                    tool: super::tools::names::CREATE_APPOINTMENT.to_string(),
                    args: json!({
                        "doctor_name": doctor_name,
                        "patient_name": patient_name,
                        "patient_email": patient_email,
                        "start_iso": start_iso,
                        "end_iso": end_iso,
                        "reason": "Booked via assistant",
                    }),
                }]);
            }

            // No datetime given: quote slots for today and ask the user to pick.
            return PlannerDecision::Invoke(vec![PlannedCall {
                tool: super::tools::names::GET_DOCTOR_AVAILABILITY.to_string(),
                args: json!({
                    "doctor_name": doctor_name,
                    "start_date": ctx.today.format("%Y-%m-%d").to_string(),
                }),
            }]);
        }

        PlannerDecision::Respond(HELP_REPLY.to_string())
    }

    fn render_outputs(&self, ctx: &TurnContext<'_>) -> String {
        let msg = ctx.message.to_lowercase();
        let booking_intent = msg.contains("book") || msg.contains("schedule");

        let mut lines: Vec<String> = Vec::new();
        for call in ctx.tool_outputs {
            let res = &call.result;
            let ok = res["ok"].as_bool().unwrap_or(false);
            match call.tool.as_str() {
                super::tools::names::GET_DOCTOR_AVAILABILITY => {
                    if !ok {
                        lines.push(format!("Error: {}", error_text(res)));
                        continue;
                    }
                    let doctor = res["doctor"].as_str().unwrap_or("the doctor");
                    let slots = res["available_slots"].as_array().cloned().unwrap_or_default();
                    if slots.is_empty() {
                        lines.push(format!("No slots available for {}.", doctor));
                    } else if booking_intent {
                        let options: Vec<&str> = slots
                            .iter()
                            .take(5)
                            .filter_map(|s| s["start_iso"].as_str())
                            .collect();
                        lines.push(format!(
                            "I don't see a datetime in your request. Here are the next available slots for {}:\n{}\nPlease say 'Book <ISO-datetime>' to confirm.",
                            doctor,
                            options.join("\n")
                        ));
                    } else {
                        let mut out = vec![format!("Available slots for {}:", doctor)];
                        for slot in slots.iter().take(5) {
                            out.push(format!(
                                "- {} to {}",
                                slot["start_iso"].as_str().unwrap_or(""),
                                slot["end_iso"].as_str().unwrap_or("")
                            ));
                        }
                        lines.push(out.join("\n"));
                    }
                }
                super::tools::names::CREATE_APPOINTMENT => {
                    if ok {
                        lines.push(format!(
                            "Booked {} at {}. Appointment id: {}",
                            res["doctor"].as_str().unwrap_or("the doctor"),
                            res["start_iso"].as_str().unwrap_or(""),
                            res["appointment_id"].as_str().unwrap_or("")
                        ));
                    } else {
                        lines.push(format!("Booking failed: {}", error_text(res)));
                    }
                }
                super::tools::names::GET_DOCTOR_SUMMARY_REPORT
                | super::tools::names::GET_DOCTOR_STATS => {
                    if ok {
                        if let Some(summary) = res["summary_text"].as_str().filter(|s| !s.trim().is_empty()) {
                            let notified = res["notification_sent"].as_bool().unwrap_or(false);
                            lines.push(format!(
                                "{}\n\nNotification sent: {}",
                                summary,
                                if notified { "Yes" } else { "No" }
                            ));
                        } else {
                            lines.push(serde_json::to_string(res).unwrap_or_default());
                        }
                    } else {
                        lines.push(format!("Stats error: {}", error_text(res)));
                    }
                }
                _ => lines.push(serde_json::to_string(res).unwrap_or_default()),
            }
        }

        if lines.is_empty() {
            "No results.".to_string()
        } else {
            lines.join("\n")
        }
    }
}

#[async_trait]
impl Planner for RulePlanner {
    async fn plan(&self, ctx: &TurnContext<'_>) -> Result<PlannerDecision, AppError> {
        if ctx.tool_outputs.is_empty() {
            Ok(self.first_decision(ctx))
        } else {
            Ok(PlannerDecision::Respond(self.render_outputs(ctx)))
        }
    }

    fn mode(&self) -> &'static str {
        "mock"
    }
}

/// Readable text from raw tool outputs; last-resort reply when an LLM
/// produces nothing usable.
pub fn summarize_tool_outputs(outputs: &[ToolCall]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for call in outputs {
        let res = &call.result;
        match call.tool.as_str() {
            super::tools::names::GET_DOCTOR_AVAILABILITY => {
                let slots = res["available_slots"].as_array().cloned().unwrap_or_default();
                if slots.is_empty() {
                    lines.push("No available slots found.".to_string());
                } else {
                    lines.push("Available slots:".to_string());
                    for slot in slots.iter().take(6) {
                        lines.push(format!(
                            " - {} to {}",
                            slot["start_iso"].as_str().unwrap_or(""),
                            slot["end_iso"].as_str().unwrap_or("")
                        ));
                    }
                }
            }
            super::tools::names::CREATE_APPOINTMENT => {
                if res["ok"].as_bool().unwrap_or(false) {
                    lines.push(format!(
                        "Appointment created (id: {}).",
                        res["appointment_id"].as_str().unwrap_or("")
                    ));
                } else {
                    lines.push(format!("Failed to create appointment: {}", error_text(res)));
                }
            }
            super::tools::names::GET_DOCTOR_SUMMARY_REPORT
            | super::tools::names::GET_DOCTOR_STATS => {
                if res["ok"].as_bool().unwrap_or(false) {
                    if let Some(summary) = res["summary_text"].as_str().filter(|s| !s.trim().is_empty()) {
                        lines.push(summary.to_string());
                        let notified = res["notification_sent"].as_bool().unwrap_or(false);
                        lines.push(String::new());
                        lines.push(format!(
                            "Notification sent: {}",
                            if notified { "Yes" } else { "No" }
                        ));
                    } else {
                        lines.push(serde_json::to_string(res).unwrap_or_default());
                    }
                } else {
                    lines.push(format!("Stats error: {}", error_text(res)));
                }
            }
            _ => lines.push(serde_json::to_string(res).unwrap_or_default()),
        }
    }

    if lines.is_empty() {
        "No results.".to_string()
    } else {
        lines.join("\n")
    }
}

fn error_text(res: &Value) -> String {
    res["error"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| "unknown error".to_string())
}

fn title_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn title_words(words: &str) -> String {
    words
        .split_whitespace()
        .map(title_word)
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// LLM-backed planner
// ---------------------------------------------------------------------------

const SYSTEM_PROMPT: &str = "You are an assistant for a medical appointment system. \
You may call tools to check availability, create appointments, or fetch stats. \
When you call a tool, use the tools API (tool_calls). After tool output is provided, \
produce a short, human-friendly summary for the user. Use ISO datetimes for start_iso/end_iso.";

/// Plans through an OpenAI-compatible chat-completions endpoint. Any upstream
/// failure degrades to the rule planner rather than failing the turn.
pub struct LlmPlanner {
    client: reqwest::Client,
    config: Arc<AppConfig>,
    tool_schemas: Vec<Value>,
    fallback: RulePlanner,
}

impl LlmPlanner {
    pub fn new(config: Arc<AppConfig>, tool_schemas: Vec<Value>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.chat_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            config,
            tool_schemas,
            fallback: RulePlanner::new(),
        }
    }

    fn build_messages(&self, ctx: &TurnContext<'_>) -> Vec<Value> {
        let mut messages = vec![json!({"role": "system", "content": SYSTEM_PROMPT})];
        for item in ctx.history {
            match item.role {
                MessageRole::User => {
                    messages.push(json!({"role": "user", "content": item.content}))
                }
                MessageRole::Assistant => {
                    messages.push(json!({"role": "assistant", "content": item.content}))
                }
                MessageRole::Tool => {}
            }
        }
        for call in ctx.tool_outputs {
            messages.push(json!({
                "role": "user",
                "content": format!(
                    "Tool {} returned: {}. Summarize the result for the user.",
                    call.tool,
                    serde_json::to_string(&call.result).unwrap_or_default()
                ),
            }));
        }
        messages
    }

    async fn complete(&self, ctx: &TurnContext<'_>) -> Result<PlannerDecision, AppError> {
        let with_tools = ctx.tool_outputs.is_empty();
        let mut body = json!({
            "model": self.config.llm_model,
            "messages": self.build_messages(ctx),
            "temperature": if with_tools { 0.2 } else { 0.25 },
        });
        if with_tools {
            body["tools"] = Value::Array(self.tool_schemas.clone());
            body["tool_choice"] = Value::String("auto".to_string());
        }

        let url = format!(
            "{}/chat/completions",
            self.config.llm_base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.llm_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::UpstreamTimeout(format!("LLM request timed out: {}", e))
                } else {
                    AppError::ExternalService(format!("LLM request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "LLM returned status {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid LLM response: {}", e)))?;
        let message = &payload["choices"][0]["message"];

        if let Some(calls) = message["tool_calls"].as_array().filter(|c| !c.is_empty()) {
            let planned = calls
                .iter()
                .filter_map(|call| {
                    let name = call["function"]["name"].as_str()?;
                    let args = call["function"]["arguments"]
                        .as_str()
                        .and_then(|raw| serde_json::from_str(raw).ok())
                        .unwrap_or_else(|| json!({}));
                    Some(PlannedCall {
                        tool: name.to_string(),
                        args,
                    })
                })
                .collect::<Vec<_>>();
            if !planned.is_empty() {
                return Ok(PlannerDecision::Invoke(planned));
            }
        }

        match message["content"].as_str().filter(|c| !c.trim().is_empty()) {
            Some(content) => Ok(PlannerDecision::Respond(content.to_string())),
            None if !ctx.tool_outputs.is_empty() => Ok(PlannerDecision::Respond(
                summarize_tool_outputs(ctx.tool_outputs),
            )),
            None => Err(AppError::ExternalService(
                "LLM produced an empty completion".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, ctx: &TurnContext<'_>) -> Result<PlannerDecision, AppError> {
        match self.complete(ctx).await {
            Ok(decision) => Ok(decision),
            Err(err) => {
                tracing::warn!("LLM planning failed, using rule planner: {}", err);
                self.fallback.plan(ctx).await
            }
        }
    }

    fn mode(&self) -> &'static str {
        "openai"
    }
}
