use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;
use crate::rules;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Avatar {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub health: i32,
    pub happiness: i32,
    pub level: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Avatar {
    /// Health as shown to the user, always within [0, 100].
    pub fn display_health(&self) -> i32 {
        rules::clamp_stat(self.health)
    }

    pub fn display_happiness(&self) -> i32 {
        rules::clamp_stat(self.happiness)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    #[default]
    Steps,
    Water,
    Exercise,
    Sleep,
    Meditation,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::Steps => "steps",
            ChallengeType::Water => "water",
            ChallengeType::Exercise => "exercise",
            ChallengeType::Sleep => "sleep",
            ChallengeType::Meditation => "meditation",
        }
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "steps" => Ok(ChallengeType::Steps),
            "water" => Ok(ChallengeType::Water),
            "exercise" => Ok(ChallengeType::Exercise),
            "sleep" => Ok(ChallengeType::Sleep),
            "meditation" => Ok(ChallengeType::Meditation),
            other => Err(UnknownVariant {
                kind: "challenge_type",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ChallengeType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Two-state, one-way: `Active` → `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Active,
    Completed,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Active => "active",
            ChallengeStatus::Completed => "completed",
        }
    }
}

impl TryFrom<String> for ChallengeStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(ChallengeStatus::Active),
            "completed" => Ok(ChallengeStatus::Completed),
            _ => Err(UnknownVariant {
                kind: "challenge status",
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AvatarChallenge {
    pub id: Uuid,
    pub avatar_id: Uuid,
    #[sqlx(try_from = "String")]
    pub challenge_type: ChallengeType,
    pub target_value: i32,
    pub current_value: i32,
    pub reward_points: i32,
    #[sqlx(try_from = "String")]
    pub status: ChallengeStatus,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avatar(health: i32, happiness: i32) -> Avatar {
        Avatar {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            name: "Ana's companion".to_string(),
            health,
            happiness,
            level: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_values_are_clamped() {
        let a = avatar(140, -5);
        assert_eq!(a.display_health(), 100);
        assert_eq!(a.display_happiness(), 0);
        assert_eq!(avatar(42, 77).display_health(), 42);
    }

    #[test]
    fn test_challenge_type_parse_and_default() {
        assert_eq!("water".parse::<ChallengeType>().unwrap(), ChallengeType::Water);
        assert!("yoga".parse::<ChallengeType>().is_err());
        assert_eq!(ChallengeType::default(), ChallengeType::Steps);
        let t: ChallengeType = serde_json::from_str("\"meditation\"").unwrap();
        assert_eq!(t.to_string(), "meditation");
    }

    #[test]
    fn test_status_round_trips_text() {
        let s = ChallengeStatus::try_from("completed".to_string()).unwrap();
        assert_eq!(s, ChallengeStatus::Completed);
        assert_eq!(s.as_str(), "completed");
        assert!(ChallengeStatus::try_from("paused".to_string()).is_err());
    }
}
