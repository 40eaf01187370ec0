//! Clinician dashboard: patient list with avatar stats, checklist
//! challenges, and report assembly.

use chrono::{DateTime, Utc};
use pulso_core::dashboard::PatientOverview;
use pulso_core::error::{PulsoError, Result};
use pulso_core::models::{Avatar, ChecklistChallenge, Patient};
use pulso_core::{nutrition, report};
use sqlx::PgPool;
use uuid::Uuid;

use super::{biometrics, chat, intake};

/// Health logs included in the summary report.
const REPORT_HEALTH_LOGS: i64 = 30;

const CHECKLIST_COLUMNS: &str = "id, patient_id, title, is_completed, created_at";

#[derive(sqlx::FromRow)]
struct OverviewRow {
    #[sqlx(flatten)]
    patient: Patient,
    avatar_id: Option<Uuid>,
    avatar_name: Option<String>,
    avatar_health: Option<i32>,
    avatar_happiness: Option<i32>,
    avatar_level: Option<i32>,
    avatar_created_at: Option<DateTime<Utc>>,
    avatar_updated_at: Option<DateTime<Utc>>,
}

impl From<OverviewRow> for PatientOverview {
    fn from(row: OverviewRow) -> Self {
        let patient_id = row.patient.id;
        let avatar = row.avatar_id.map(|id| Avatar {
            id,
            patient_id,
            name: row.avatar_name.unwrap_or_default(),
            health: row.avatar_health.unwrap_or_default(),
            happiness: row.avatar_happiness.unwrap_or_default(),
            level: row.avatar_level.unwrap_or(1),
            created_at: row.avatar_created_at.unwrap_or(row.patient.created_at),
            updated_at: row.avatar_updated_at.unwrap_or(row.patient.updated_at),
        });
        PatientOverview {
            patient: row.patient,
            avatar,
        }
    }
}

/// All patients, newest first, each joined with its oldest avatar.
pub async fn list_patients_with_avatar(pool: &PgPool) -> Result<Vec<PatientOverview>> {
    let rows: Vec<OverviewRow> = sqlx::query_as(
        "SELECT p.id, p.name, p.age, p.height, p.gender, p.activity, p.diet_type,
                p.allergies, p.health_goal, p.created_at, p.updated_at,
                a.id AS avatar_id, a.name AS avatar_name, a.health AS avatar_health,
                a.happiness AS avatar_happiness, a.level AS avatar_level,
                a.created_at AS avatar_created_at, a.updated_at AS avatar_updated_at
         FROM patients p
         LEFT JOIN LATERAL (
            SELECT * FROM avatars WHERE patient_id = p.id ORDER BY created_at ASC LIMIT 1
         ) a ON TRUE
         ORDER BY p.created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(PatientOverview::from).collect())
}

// ============================================================================
// Checklist challenges
// ============================================================================

pub async fn list_checklist(pool: &PgPool, patient_id: Uuid) -> Result<Vec<ChecklistChallenge>> {
    let rows = sqlx::query_as(&format!(
        "SELECT {} FROM challenges WHERE patient_id = $1 ORDER BY created_at ASC",
        CHECKLIST_COLUMNS
    ))
    .bind(patient_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn add_checklist_item(
    pool: &PgPool,
    patient_id: Uuid,
    title: &str,
) -> Result<ChecklistChallenge> {
    let title = title.trim();
    if title.is_empty() {
        return Err(PulsoError::Validation("title must not be empty".to_string()));
    }
    intake::get_patient(pool, patient_id).await?;

    let row = sqlx::query_as(&format!(
        "INSERT INTO challenges (patient_id, title) VALUES ($1, $2) RETURNING {}",
        CHECKLIST_COLUMNS
    ))
    .bind(patient_id)
    .bind(title)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Sets `is_completed` either way.
pub async fn set_checklist_completed(
    pool: &PgPool,
    id: Uuid,
    is_completed: bool,
) -> Result<ChecklistChallenge> {
    sqlx::query_as(&format!(
        "UPDATE challenges SET is_completed = $2 WHERE id = $1 RETURNING {}",
        CHECKLIST_COLUMNS
    ))
    .bind(id)
    .bind(is_completed)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| PulsoError::NotFound(format!("Challenge {}", id)))
}

// ============================================================================
// Reports
// ============================================================================

/// A rendered PDF and the filename clients should save it under.
#[derive(Debug)]
pub struct RenderedReport {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub async fn chat_report(pool: &PgPool, patient_id: Uuid) -> Result<RenderedReport> {
    let patient = intake::get_patient(pool, patient_id).await?;
    let messages = chat::list_messages(pool, patient_id).await?;

    let bytes = report::render_chat_report(&patient, &messages)?;
    tracing::info!(patient_id = %patient_id, messages = messages.len(), "Chat report rendered");

    Ok(RenderedReport {
        filename: report::chat_report_filename(&patient.name),
        bytes,
    })
}

pub async fn patient_report(pool: &PgPool, patient_id: Uuid) -> Result<RenderedReport> {
    let patient = intake::get_patient(pool, patient_id).await?;
    let health_logs = biometrics::list_health_logs(pool, patient_id, REPORT_HEALTH_LOGS).await?;
    let messages = chat::list_messages(pool, patient_id).await?;
    let plan = nutrition::pick_nutrition_plan(&messages);

    let bytes = report::render_patient_report(&patient, &health_logs, plan)?;
    tracing::info!(
        patient_id = %patient_id,
        has_plan = plan.is_some(),
        "Patient report rendered"
    );

    Ok(RenderedReport {
        filename: report::patient_report_filename(&patient.name),
        bytes,
    })
}
