//! Chat orchestrator: linear per-patient conversation with the completion API.
//!
//! A turn is: persist the user message, ask the model, persist the reply.
//! There is no idempotency key; a retried request duplicates the turn.

use pulso_core::completion::CompletionBackend;
use pulso_core::error::{PulsoError, Result};
use pulso_core::models::chat::ChatHistory;
use pulso_core::models::{ChatMessage, ChatRole};
use pulso_core::prompts;
use sqlx::PgPool;
use uuid::Uuid;

use super::intake;

const MESSAGE_COLUMNS: &str = "id, patient_id, role, message, created_at";

/// Messages in ascending time order; ties fall back to id for a stable order.
pub async fn list_messages(pool: &PgPool, patient_id: Uuid) -> Result<Vec<ChatMessage>> {
    let rows = sqlx::query_as(&format!(
        "SELECT {} FROM chat_messages WHERE patient_id = $1 ORDER BY created_at ASC, id ASC",
        MESSAGE_COLUMNS
    ))
    .bind(patient_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Stored conversation, or a single unsaved welcome message when empty.
pub async fn load_history(pool: &PgPool, patient_id: Uuid) -> Result<ChatHistory> {
    intake::get_patient(pool, patient_id).await?;

    let messages = list_messages(pool, patient_id).await?;
    if messages.is_empty() {
        return Ok(ChatHistory {
            messages: vec![ChatMessage::transient(
                patient_id,
                ChatRole::Assistant,
                prompts::WELCOME_MESSAGE,
            )],
            synthetic_welcome: true,
        });
    }

    Ok(ChatHistory {
        messages,
        synthetic_welcome: false,
    })
}

pub async fn append_message(
    pool: &PgPool,
    patient_id: Uuid,
    role: ChatRole,
    message: &str,
) -> Result<ChatMessage> {
    let row = sqlx::query_as(&format!(
        "INSERT INTO chat_messages (patient_id, role, message) VALUES ($1, $2, $3) RETURNING {}",
        MESSAGE_COLUMNS
    ))
    .bind(patient_id)
    .bind(role.as_str())
    .bind(message)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Runs one chat turn and returns the assistant reply text.
///
/// The greeting sentinel is never stored; it is replaced upstream by the
/// introduction instruction. Storage failures are logged and do not fail the
/// turn. Completion failures do.
pub async fn send_message(
    pool: &PgPool,
    backend: &dyn CompletionBackend,
    patient_id: Uuid,
    user_message: &str,
    system_prompt: Option<&str>,
) -> Result<String> {
    let user_message = user_message.trim();
    if user_message.is_empty() {
        return Err(PulsoError::Validation("userMessage must not be empty".to_string()));
    }

    let greeting = prompts::is_greeting_sentinel(user_message);

    if !greeting {
        if let Err(e) = append_message(pool, patient_id, ChatRole::User, user_message).await {
            tracing::error!(patient_id = %patient_id, error = %e, "Failed to store user message");
        }
    }

    let request = prompts::chat_request(user_message, system_prompt);
    let reply = backend.complete(&request).await.map_err(|e| {
        tracing::error!(
            patient_id = %patient_id,
            backend = backend.name(),
            model = backend.model(),
            error = %e,
            "Chat completion failed"
        );
        PulsoError::Completion(e)
    })?;

    if let Err(e) = append_message(pool, patient_id, ChatRole::Assistant, &reply).await {
        tracing::error!(patient_id = %patient_id, error = %e, "Failed to store assistant reply");
    }

    tracing::info!(
        patient_id = %patient_id,
        model = backend.model(),
        greeting,
        reply_chars = reply.chars().count(),
        "Chat turn complete"
    );

    Ok(reply)
}
