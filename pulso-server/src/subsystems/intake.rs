//! Patient intake and clinician edits.
//!
//! Intake writes the patient and its paired avatar in one transaction, so a
//! patient never exists without an avatar from this path.

use pulso_core::error::{PulsoError, Result};
use pulso_core::models::{Avatar, NewPatient, Patient, PatientUpdate};
use pulso_core::rules;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

pub(crate) const PATIENT_COLUMNS: &str = "id, name, age, height, gender, activity, diet_type, \
     allergies, health_goal, created_at, updated_at";

pub(crate) const AVATAR_COLUMNS: &str =
    "id, patient_id, name, health, happiness, level, created_at, updated_at";

#[derive(Debug, Serialize)]
pub struct IntakeResult {
    pub patient: Patient,
    pub avatar: Avatar,
}

pub fn default_avatar_name(patient_name: &str) -> String {
    format!("{}'s companion", patient_name.trim())
}

pub async fn create_patient(pool: &PgPool, input: NewPatient) -> Result<IntakeResult> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(PulsoError::Validation("name must not be empty".to_string()));
    }

    let mut tx = pool.begin().await?;

    let patient: Patient = sqlx::query_as(&format!(
        "INSERT INTO patients (name, age, height, gender, activity, diet_type, allergies, health_goal)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {}",
        PATIENT_COLUMNS
    ))
    .bind(&name)
    .bind(input.age)
    .bind(input.height)
    .bind(&input.gender)
    .bind(&input.activity)
    .bind(&input.diet_type)
    .bind(&input.allergies)
    .bind(&input.health_goal)
    .fetch_one(&mut *tx)
    .await?;

    let avatar = insert_avatar(&mut tx, patient.id, &default_avatar_name(&name)).await?;

    tx.commit().await?;

    tracing::info!(patient_id = %patient.id, avatar_id = %avatar.id, "Patient created");

    Ok(IntakeResult { patient, avatar })
}

pub(crate) async fn insert_avatar(
    tx: &mut Transaction<'_, Postgres>,
    patient_id: Uuid,
    name: &str,
) -> Result<Avatar> {
    let avatar = sqlx::query_as(&format!(
        "INSERT INTO avatars (patient_id, name, health, happiness, level)
         VALUES ($1, $2, $3, $3, $4)
         RETURNING {}",
        AVATAR_COLUMNS
    ))
    .bind(patient_id)
    .bind(name)
    .bind(rules::INITIAL_STAT)
    .bind(rules::INITIAL_LEVEL)
    .fetch_one(&mut **tx)
    .await?;
    Ok(avatar)
}

pub async fn get_patient(pool: &PgPool, id: Uuid) -> Result<Patient> {
    sqlx::query_as(&format!("SELECT {} FROM patients WHERE id = $1", PATIENT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| PulsoError::NotFound(format!("Patient {}", id)))
}

/// Partial update; absent fields keep their value. Last write wins.
pub async fn update_patient(pool: &PgPool, id: Uuid, update: PatientUpdate) -> Result<Patient> {
    if update.is_empty() {
        return get_patient(pool, id).await;
    }
    if let Some(name) = &update.name {
        if name.trim().is_empty() {
            return Err(PulsoError::Validation("name must not be empty".to_string()));
        }
    }

    sqlx::query_as(&format!(
        "UPDATE patients SET
            name = COALESCE($2, name),
            age = COALESCE($3, age),
            height = COALESCE($4, height),
            gender = COALESCE($5, gender),
            activity = COALESCE($6, activity),
            diet_type = COALESCE($7, diet_type),
            allergies = COALESCE($8, allergies),
            health_goal = COALESCE($9, health_goal),
            updated_at = NOW()
         WHERE id = $1
         RETURNING {}",
        PATIENT_COLUMNS
    ))
    .bind(id)
    .bind(update.name.as_deref().map(str::trim))
    .bind(update.age)
    .bind(update.height)
    .bind(&update.gender)
    .bind(&update.activity)
    .bind(&update.diet_type)
    .bind(&update.allergies)
    .bind(&update.health_goal)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| PulsoError::NotFound(format!("Patient {}", id)))
}

/// Deletes the patient; dependent rows go with it via `ON DELETE CASCADE`.
pub async fn delete_patient(pool: &PgPool, id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM patients WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(PulsoError::NotFound(format!("Patient {}", id)));
    }

    tracing::info!(patient_id = %id, "Patient deleted");
    Ok(())
}
