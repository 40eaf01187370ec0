//! Avatar scoring rules.
//!
//! Stats live in [0, 100]. The only write path that changes them is the
//! challenge reward, which clamps on write.

use chrono::{DateTime, Duration, Utc};

pub const STAT_MIN: i32 = 0;
pub const STAT_MAX: i32 = 100;

/// Starting health and happiness for a new avatar.
pub const INITIAL_STAT: i32 = 100;
pub const INITIAL_LEVEL: i32 = 1;

/// Health added when a challenge is completed.
pub const HEALTH_REWARD: i32 = 10;

/// Avatars below this health count as critical on the dashboard.
pub const CRITICAL_HEALTH_THRESHOLD: i32 = 50;

pub const CHALLENGE_TARGET_VALUE: i32 = 10;
pub const CHALLENGE_REWARD_POINTS: i32 = 50;
pub const CHALLENGE_DURATION_HOURS: i64 = 24;

pub fn clamp_stat(value: i32) -> i32 {
    value.clamp(STAT_MIN, STAT_MAX)
}

/// New health after granting `reward`, clamped to [0, 100].
pub fn apply_reward(health: i32, reward: i32) -> i32 {
    clamp_stat(health.saturating_add(reward))
}

pub fn challenge_due_date(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(CHALLENGE_DURATION_HOURS)
}

pub fn is_critical(health: i32, threshold: i32) -> bool {
    health < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_clamps_at_max() {
        assert_eq!(apply_reward(100, HEALTH_REWARD), 100);
        assert_eq!(apply_reward(95, HEALTH_REWARD), 100);
        assert_eq!(apply_reward(40, HEALTH_REWARD), 50);
    }

    #[test]
    fn test_reward_repairs_out_of_range_values() {
        assert_eq!(apply_reward(250, HEALTH_REWARD), 100);
        assert_eq!(apply_reward(-30, HEALTH_REWARD), 0);
        assert_eq!(apply_reward(i32::MAX, HEALTH_REWARD), 100);
    }

    #[test]
    fn test_n_completions_from_full_health() {
        for n in 0..20 {
            let mut health = INITIAL_STAT;
            for _ in 0..n {
                health = apply_reward(health, HEALTH_REWARD);
            }
            assert_eq!(health, (INITIAL_STAT + HEALTH_REWARD * n).min(100));
        }
    }

    #[test]
    fn test_ana_three_completions_stay_at_100() {
        let health = (0..3).fold(INITIAL_STAT, |h, _| apply_reward(h, HEALTH_REWARD));
        assert_eq!(health, 100);
    }

    #[test]
    fn test_due_date_is_one_day_out() {
        let now = Utc::now();
        assert_eq!(challenge_due_date(now) - now, Duration::hours(24));
    }

    #[test]
    fn test_critical_threshold_is_strict() {
        assert!(is_critical(49, CRITICAL_HEALTH_THRESHOLD));
        assert!(!is_critical(50, CRITICAL_HEALTH_THRESHOLD));
    }
}
