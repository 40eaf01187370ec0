use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl TryFrom<String> for ChatRole {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            _ => Err(UnknownVariant { kind: "chat role", value }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub patient_id: Uuid,
    #[sqlx(try_from = "String")]
    pub role: ChatRole,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// In-memory message that is never written to the database.
    pub fn transient(patient_id: Uuid, role: ChatRole, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            patient_id,
            role,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        !self.id.is_nil()
    }
}

/// A patient's conversation as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistory {
    pub messages: Vec<ChatMessage>,
    /// True when `messages` holds only the unsaved welcome message.
    pub synthetic_welcome: bool,
}
