//! Weight and stress time series.

use pulso_core::error::{PulsoError, Result};
use pulso_core::models::HealthLog;
use sqlx::PgPool;
use uuid::Uuid;

use super::intake;

const HEALTH_COLUMNS: &str = "id, patient_id, weight, stress_level, created_at";

pub const STRESS_MIN: i32 = 1;
pub const STRESS_MAX: i32 = 10;

pub fn validate_reading(weight: f64, stress_level: i32) -> Result<()> {
    if !weight.is_finite() || weight <= 0.0 {
        return Err(PulsoError::Validation(format!(
            "weight must be a positive number, got {}",
            weight
        )));
    }
    if !(STRESS_MIN..=STRESS_MAX).contains(&stress_level) {
        return Err(PulsoError::Validation(format!(
            "stress_level must be between {} and {}, got {}",
            STRESS_MIN, STRESS_MAX, stress_level
        )));
    }
    Ok(())
}

pub async fn record_health_log(
    pool: &PgPool,
    patient_id: Uuid,
    weight: f64,
    stress_level: i32,
) -> Result<HealthLog> {
    validate_reading(weight, stress_level)?;
    intake::get_patient(pool, patient_id).await?;

    let log: HealthLog = sqlx::query_as(&format!(
        "INSERT INTO health_logs (patient_id, weight, stress_level) VALUES ($1, $2, $3) RETURNING {}",
        HEALTH_COLUMNS
    ))
    .bind(patient_id)
    .bind(weight)
    .bind(stress_level)
    .fetch_one(pool)
    .await?;

    tracing::info!(patient_id = %patient_id, weight, stress_level, "Health log recorded");
    Ok(log)
}

/// The most recent `limit` readings, returned oldest first.
pub async fn list_health_logs(pool: &PgPool, patient_id: Uuid, limit: i64) -> Result<Vec<HealthLog>> {
    let rows = sqlx::query_as(&format!(
        "SELECT {cols} FROM (
            SELECT {cols} FROM health_logs WHERE patient_id = $1
            ORDER BY created_at DESC LIMIT $2
         ) recent ORDER BY created_at ASC",
        cols = HEALTH_COLUMNS
    ))
    .bind(patient_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn latest_health_log(pool: &PgPool, patient_id: Uuid) -> Result<Option<HealthLog>> {
    let row = sqlx::query_as(&format!(
        "SELECT {} FROM health_logs WHERE patient_id = $1 ORDER BY created_at DESC LIMIT 1",
        HEALTH_COLUMNS
    ))
    .bind(patient_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
