//! Typed request bodies shared by the HTTP layer and its tests.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ChallengeType;

/// Body of `POST /api/avatar`, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AvatarAction {
    CreateChallenge {
        #[serde(rename = "patientId")]
        patient_id: Uuid,
        #[serde(rename = "type", default)]
        challenge_type: ChallengeType,
    },
    CompleteChallenge {
        #[serde(rename = "challengeId")]
        challenge_id: Uuid,
        #[serde(rename = "patientId", default)]
        patient_id: Option<Uuid>,
    },
}

/// Body of `POST /api/chat`. Fields are optional so missing ones can be
/// answered with a 400 rather than a deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_message: Option<String>,
    pub patient_id: Option<Uuid>,
    pub system_prompt: Option<String>,
}

/// Body of `POST /api/analyze-food`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeFoodRequest {
    pub food_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodLogRequest {
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthLogRequest {
    pub weight: f64,
    pub stress_level: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistRequest {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistToggle {
    pub is_completed: bool,
}
