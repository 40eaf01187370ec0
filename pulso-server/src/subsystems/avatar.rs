//! Avatar and challenge engine.
//!
//! `complete_challenge` is the only path that completes a challenge and the
//! only path that grants the health reward; both happen in one transaction.

use chrono::Utc;
use pulso_core::error::{PulsoError, Result};
use pulso_core::models::{Avatar, AvatarChallenge, ChallengeStatus, ChallengeType};
use pulso_core::rules;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::intake::{self, AVATAR_COLUMNS};

const CHALLENGE_COLUMNS: &str = "id, avatar_id, challenge_type, target_value, current_value, \
     reward_points, status, due_date, created_at, completed_at";

#[derive(Debug, Serialize)]
pub struct AvatarState {
    pub avatar: Avatar,
    pub challenges: Vec<AvatarChallenge>,
}

#[derive(Debug, Serialize)]
pub struct CompletionOutcome {
    pub success: bool,
    pub avatar: Avatar,
    pub challenge: AvatarChallenge,
}

pub async fn find_avatar(pool: &PgPool, patient_id: Uuid) -> Result<Option<Avatar>> {
    let avatar = sqlx::query_as(&format!(
        "SELECT {} FROM avatars WHERE patient_id = $1 ORDER BY created_at ASC LIMIT 1",
        AVATAR_COLUMNS
    ))
    .bind(patient_id)
    .fetch_optional(pool)
    .await?;
    Ok(avatar)
}

/// Returns the patient's avatar, creating a default one on first read.
pub async fn get_or_create_avatar(pool: &PgPool, patient_id: Uuid) -> Result<Avatar> {
    if let Some(avatar) = find_avatar(pool, patient_id).await? {
        return Ok(avatar);
    }

    let patient = intake::get_patient(pool, patient_id).await?;

    // Two concurrent first reads may race; the unique index keeps one row.
    sqlx::query(
        "INSERT INTO avatars (patient_id, name, health, happiness, level)
         VALUES ($1, $2, $3, $3, $4)
         ON CONFLICT (patient_id) DO NOTHING",
    )
    .bind(patient_id)
    .bind(intake::default_avatar_name(&patient.name))
    .bind(rules::INITIAL_STAT)
    .bind(rules::INITIAL_LEVEL)
    .execute(pool)
    .await?;

    tracing::info!(patient_id = %patient_id, "Avatar created lazily");

    find_avatar(pool, patient_id)
        .await?
        .ok_or_else(|| PulsoError::NotFound(format!("Avatar for patient {}", patient_id)))
}

pub async fn list_challenges(pool: &PgPool, avatar_id: Uuid) -> Result<Vec<AvatarChallenge>> {
    let rows = sqlx::query_as(&format!(
        "SELECT {} FROM avatar_challenges WHERE avatar_id = $1
         ORDER BY (status = 'active') DESC, created_at DESC",
        CHALLENGE_COLUMNS
    ))
    .bind(avatar_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn avatar_state(pool: &PgPool, patient_id: Uuid) -> Result<AvatarState> {
    let avatar = get_or_create_avatar(pool, patient_id).await?;
    let challenges = list_challenges(pool, avatar.id).await?;
    Ok(AvatarState { avatar, challenges })
}

/// Creates an active challenge due in 24 hours. The avatar must already exist.
pub async fn create_challenge(
    pool: &PgPool,
    patient_id: Uuid,
    challenge_type: ChallengeType,
) -> Result<AvatarChallenge> {
    let avatar = find_avatar(pool, patient_id)
        .await?
        .ok_or_else(|| PulsoError::NotFound("Avatar".to_string()))?;

    let challenge: AvatarChallenge = sqlx::query_as(&format!(
        "INSERT INTO avatar_challenges
            (avatar_id, challenge_type, target_value, current_value, reward_points, status, due_date)
         VALUES ($1, $2, $3, 0, $4, $5, $6)
         RETURNING {}",
        CHALLENGE_COLUMNS
    ))
    .bind(avatar.id)
    .bind(challenge_type.as_str())
    .bind(rules::CHALLENGE_TARGET_VALUE)
    .bind(rules::CHALLENGE_REWARD_POINTS)
    .bind(ChallengeStatus::Active.as_str())
    .bind(rules::challenge_due_date(Utc::now()))
    .fetch_one(pool)
    .await?;

    tracing::info!(
        patient_id = %patient_id,
        challenge_id = %challenge.id,
        challenge_type = %challenge_type,
        "Challenge created"
    );

    Ok(challenge)
}

/// Patient that owns a challenge, via its avatar.
pub async fn challenge_owner(pool: &PgPool, challenge_id: Uuid) -> Result<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        "SELECT a.patient_id FROM avatar_challenges c
         JOIN avatars a ON a.id = c.avatar_id
         WHERE c.id = $1",
    )
    .bind(challenge_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.0))
}

/// Marks an active challenge completed and adds `health_reward` to the
/// owning avatar, clamped to [0, 100].
pub async fn complete_challenge(
    pool: &PgPool,
    challenge_id: Uuid,
    health_reward: i32,
) -> Result<CompletionOutcome> {
    let mut tx = pool.begin().await?;

    let completed: Option<AvatarChallenge> = sqlx::query_as(&format!(
        "UPDATE avatar_challenges
         SET status = $2, current_value = target_value, completed_at = NOW()
         WHERE id = $1 AND status = $3
         RETURNING {}",
        CHALLENGE_COLUMNS
    ))
    .bind(challenge_id)
    .bind(ChallengeStatus::Completed.as_str())
    .bind(ChallengeStatus::Active.as_str())
    .fetch_optional(&mut *tx)
    .await?;

    let challenge = match completed {
        Some(c) => c,
        None => {
            let exists: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM avatar_challenges WHERE id = $1")
                    .bind(challenge_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match exists {
                Some(_) => PulsoError::Conflict(format!(
                    "Challenge {} is already completed",
                    challenge_id
                )),
                None => PulsoError::NotFound(format!("Challenge {}", challenge_id)),
            });
        }
    };

    let (health,): (i32,) = sqlx::query_as("SELECT health FROM avatars WHERE id = $1 FOR UPDATE")
        .bind(challenge.avatar_id)
        .fetch_one(&mut *tx)
        .await?;

    let new_health = rules::apply_reward(health, health_reward);

    let avatar: Avatar = sqlx::query_as(&format!(
        "UPDATE avatars SET health = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
        AVATAR_COLUMNS
    ))
    .bind(challenge.avatar_id)
    .bind(new_health)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        challenge_id = %challenge_id,
        avatar_id = %avatar.id,
        health_before = health,
        health_after = new_health,
        "Challenge completed"
    );

    Ok(CompletionOutcome {
        success: true,
        avatar,
        challenge,
    })
}
