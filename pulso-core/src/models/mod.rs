pub mod avatar;
pub mod chat;
pub mod checklist;
pub mod food;
pub mod health;
pub mod patient;

pub use avatar::{Avatar, AvatarChallenge, ChallengeStatus, ChallengeType};
pub use chat::{ChatMessage, ChatRole};
pub use checklist::ChecklistChallenge;
pub use food::{FoodLog, Nutrients, NutritionAnalysis};
pub use health::HealthLog;
pub use patient::{NewPatient, Patient, PatientUpdate};

use thiserror::Error;

/// A text column held a value no enum variant maps to.
#[derive(Error, Debug)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
