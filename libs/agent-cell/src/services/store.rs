use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::{Message, MessageRole};

/// Everything the orchestrator keeps per conversation: the ordered history
/// plus the slots the agent has quoted to the user, which gate later booking.
#[derive(Default)]
pub struct SessionState {
    messages: Vec<Message>,
    quoted_slots: HashSet<(Uuid, NaiveDateTime)>,
}

impl SessionState {
    pub fn append(&mut self, role: MessageRole, content: &str) {
        self.messages.push(Message {
            role,
            content: content.to_string(),
            time: Utc::now().timestamp(),
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent messages, bounded for planner context. The stored
    /// history itself is never truncated.
    pub fn recent_messages(&self, limit: usize) -> Vec<Message> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages[skip..].to_vec()
    }

    pub fn note_quoted_slot(&mut self, doctor_id: Uuid, start: NaiveDateTime) {
        self.quoted_slots.insert((doctor_id, start));
    }

    pub fn slot_was_quoted(&self, doctor_id: Uuid, start: NaiveDateTime) -> bool {
        self.quoted_slots.contains(&(doctor_id, start))
    }
}

/// Sessions live for the process lifetime and are created implicitly. Each
/// session carries its own mutex; a turn holds it end to end, so turns on one
/// session serialize while different sessions proceed concurrently.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionState>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub async fn session(&self, session_id: &str) -> Arc<Mutex<SessionState>> {
        if let Some(existing) = self.sessions.read().await.get(session_id) {
            return existing.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    pub async fn append(&self, session_id: &str, role: MessageRole, content: &str) {
        let cell = self.session(session_id).await;
        let mut state = cell.lock().await;
        state.append(role, content);
    }

    /// Full ordered history; an unknown session id yields an empty history,
    /// never an error.
    pub async fn history(&self, session_id: &str) -> Vec<Message> {
        match self.sessions.read().await.get(session_id) {
            Some(cell) => cell.lock().await.messages().to_vec(),
            None => Vec::new(),
        }
    }
}
