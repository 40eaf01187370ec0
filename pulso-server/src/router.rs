use crate::subsystems::avatar;
use pulso_core::api::AvatarAction;
use pulso_core::error::{PulsoError, Result};
use pulso_core::PulsoConfig;
use sqlx::PgPool;

/// Dispatch a `POST /api/avatar` action.
///
/// `create_challenge` answers with the new challenge object;
/// `complete_challenge` answers with `{success, avatar, challenge}`.
pub async fn handle_avatar_action(
    action: AvatarAction,
    pool: &PgPool,
    config: &PulsoConfig,
) -> Result<serde_json::Value> {
    match action {
        AvatarAction::CreateChallenge {
            patient_id,
            challenge_type,
        } => {
            let challenge = avatar::create_challenge(pool, patient_id, challenge_type).await?;
            Ok(serde_json::to_value(challenge)?)
        }
        AvatarAction::CompleteChallenge {
            challenge_id,
            patient_id,
        } => {
            // A patient id, when given, must own the challenge.
            if let Some(expected) = patient_id {
                match avatar::challenge_owner(pool, challenge_id).await? {
                    Some(owner) if owner == expected => {}
                    _ => return Err(PulsoError::NotFound(format!("Challenge {}", challenge_id))),
                }
            }
            let outcome =
                avatar::complete_challenge(pool, challenge_id, config.avatar.health_reward).await?;
            Ok(serde_json::to_value(outcome)?)
        }
    }
}
