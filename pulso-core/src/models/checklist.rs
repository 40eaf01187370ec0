use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Clinician-managed checklist entry. Unlike `AvatarChallenge`,
/// `is_completed` may be toggled back and forth.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChecklistChallenge {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub title: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}
