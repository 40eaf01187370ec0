use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HealthLog {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Kilograms.
    pub weight: f64,
    /// 1 (calm) to 10 (very stressed).
    pub stress_level: i32,
    pub created_at: DateTime<Utc>,
}
