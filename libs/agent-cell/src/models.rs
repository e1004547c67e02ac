use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

/// One entry in a session's conversation history. Immutable once appended;
/// `time` is epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub time: i64,
}

/// A tool invocation made by the agent during a turn, with its arguments and
/// structured result. The result object always carries an `ok` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub args: Value,
    pub result: Value,
}

/// Direct tool invocation, bypassing the chat loop.
#[derive(Debug, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub args: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub ok: bool,
    pub session_id: String,
    pub reply: String,
    pub tool_calls: Vec<ToolCall>,
    pub mode: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SessionDump {
    pub session_id: String,
    pub history: Vec<Message>,
}
