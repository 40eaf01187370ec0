//! Parsing of nutrition JSON returned by the completion API, and the
//! heuristic that picks a "nutrition plan" out of a chat transcript.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::models::{ChatMessage, ChatRole, NutritionAnalysis};

/// Assistant messages longer than this count as a plan regardless of wording.
pub const PLAN_MIN_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum NutritionError {
    #[error("response is not valid nutrition JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
        raw: String,
    },

    #[error("calories must be a non-negative number, got {0}")]
    InvalidCalories(f64),
}

impl NutritionError {
    /// The raw completion text, when available, for error details.
    pub fn raw(&self) -> Option<&str> {
        match self {
            NutritionError::InvalidJson { raw, .. } => Some(raw),
            NutritionError::InvalidCalories(_) => None,
        }
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```\s*$").expect("valid regex")
    })
}

fn plan_keyword_regex() -> &'static Regex {
    static KEYWORDS: OnceLock<Regex> = OnceLock::new();
    KEYWORDS.get_or_init(|| {
        Regex::new(
            r"(?i)\b(plan|dieta|diet|desayuno|breakfast|almuerzo|lunch|cena|dinner|calor[ií]as|calories|nutrici[oó]n|nutrition)\b",
        )
        .expect("valid regex")
    })
}

/// Removes a surrounding markdown code fence (```json ... ``` or ``` ... ```).
pub fn strip_code_fences(text: &str) -> &str {
    match fence_regex().captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text.trim(),
    }
}

/// Parses the completion output into a typed analysis. No retry on failure.
pub fn parse_analysis(raw: &str) -> Result<NutritionAnalysis, NutritionError> {
    let body = strip_code_fences(raw);
    let analysis: NutritionAnalysis =
        serde_json::from_str(body).map_err(|source| NutritionError::InvalidJson {
            source,
            raw: raw.to_string(),
        })?;

    if !analysis.calories.is_finite() || analysis.calories < 0.0 {
        return Err(NutritionError::InvalidCalories(analysis.calories));
    }

    Ok(analysis)
}

/// Whether an assistant message looks like a nutrition plan: long, or
/// mentioning a meal/diet keyword. A heuristic; it will misfire.
pub fn looks_like_plan(text: &str) -> bool {
    text.chars().count() > PLAN_MIN_CHARS || plan_keyword_regex().is_match(text)
}

/// Most recent assistant message that `looks_like_plan`. Expects messages in
/// ascending time order.
pub fn pick_nutrition_plan(messages: &[ChatMessage]) -> Option<&ChatMessage> {
    messages
        .iter()
        .rev()
        .filter(|m| m.role == ChatRole::Assistant)
        .find(|m| looks_like_plan(&m.message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Nutrients;
    use uuid::Uuid;

    #[test]
    fn test_parse_plain_json() {
        let a = parse_analysis(
            r#"{"calories": 250, "nutrients": {"protein": "12g", "carbs": "30g", "fat": "9g"}}"#,
        )
        .unwrap();
        assert_eq!(a.calories, 250.0);
        assert_eq!(
            a.nutrients,
            Nutrients {
                protein: "12g".into(),
                carbs: "30g".into(),
                fat: "9g".into()
            }
        );
    }

    #[test]
    fn test_parse_strips_json_fence() {
        let raw = "```json\n{\"calories\": 95.5, \"nutrients\": {\"protein\": \"0.5g\", \"carbs\": \"25g\", \"fat\": \"0.3g\"}}\n```";
        assert_eq!(parse_analysis(raw).unwrap().calories, 95.5);
    }

    #[test]
    fn test_parse_strips_bare_fence() {
        let raw = "```\n{\"calories\": 1, \"nutrients\": {\"protein\": \"0g\", \"carbs\": \"0g\", \"fat\": \"0g\"}}```";
        assert!(parse_analysis(raw).is_ok());
    }

    #[test]
    fn test_parse_rejects_prose_and_keeps_raw() {
        let err = parse_analysis("An apple has about 95 calories.").unwrap_err();
        assert_eq!(err.raw(), Some("An apple has about 95 calories."));
    }

    #[test]
    fn test_parse_rejects_missing_nutrients() {
        assert!(parse_analysis(r#"{"calories": 100}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_negative_calories() {
        let raw = r#"{"calories": -5, "nutrients": {"protein": "0g", "carbs": "0g", "fat": "0g"}}"#;
        assert!(matches!(
            parse_analysis(raw),
            Err(NutritionError::InvalidCalories(_))
        ));
    }

    fn msg(role: ChatRole, text: &str) -> ChatMessage {
        ChatMessage::transient(Uuid::nil(), role, text)
    }

    #[test]
    fn test_pick_plan_prefers_most_recent_match() {
        let messages = vec![
            msg(ChatRole::Assistant, "Plan: desayuno avena, almuerzo pollo."),
            msg(ChatRole::User, "gracias"),
            msg(ChatRole::Assistant, "Nuevo plan de cena ligera."),
            msg(ChatRole::Assistant, "¿Algo más?"),
        ];
        let picked = pick_nutrition_plan(&messages).unwrap();
        assert_eq!(picked.message, "Nuevo plan de cena ligera.");
    }

    #[test]
    fn test_pick_plan_ignores_user_messages() {
        let messages = vec![msg(ChatRole::User, "dame un plan de dieta")];
        assert!(pick_nutrition_plan(&messages).is_none());
    }

    #[test]
    fn test_long_message_counts_as_plan() {
        let long = "x".repeat(PLAN_MIN_CHARS + 1);
        assert!(looks_like_plan(&long));
        assert!(!looks_like_plan("¿Cómo dormiste?"));
        assert!(looks_like_plan("Reduce las CALORÍAS de la noche"));
    }
}
