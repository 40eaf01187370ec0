use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Macro breakdown as free-form strings, e.g. `"12g"`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Nutrients {
    pub protein: String,
    pub carbs: String,
    pub fat: String,
}

/// Parsed completion output for one food description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionAnalysis {
    pub calories: f64,
    pub nutrients: Nutrients,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FoodLog {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub description: String,
    pub calories: f64,
    pub nutrients: Json<Nutrients>,
    pub created_at: DateTime<Utc>,
}
