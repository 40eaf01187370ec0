//! Food logger: free text in, structured nutrition out.

use pulso_core::completion::CompletionBackend;
use pulso_core::error::{PulsoError, Result};
use pulso_core::models::{FoodLog, NutritionAnalysis};
use pulso_core::{nutrition, prompts};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::intake;

const FOOD_COLUMNS: &str = "id, patient_id, description, calories, nutrients, created_at";

/// Asks the model for nutrition JSON and parses it. Not retried.
pub async fn analyze_food(
    backend: &dyn CompletionBackend,
    food_text: &str,
) -> Result<NutritionAnalysis> {
    if food_text.trim().is_empty() {
        return Err(PulsoError::Validation("foodText must not be empty".to_string()));
    }

    let raw = backend.complete(&prompts::food_request(food_text)).await?;

    nutrition::parse_analysis(&raw).map_err(|e| {
        tracing::warn!(error = %e, raw = %raw, "Completion did not return nutrition JSON");
        PulsoError::Nutrition(e)
    })
}

/// Analyzes `description` and stores the result. Nothing is stored when the
/// analysis fails.
pub async fn log_food(
    pool: &PgPool,
    backend: &dyn CompletionBackend,
    patient_id: Uuid,
    description: &str,
) -> Result<FoodLog> {
    intake::get_patient(pool, patient_id).await?;

    let analysis = analyze_food(backend, description).await?;

    let log: FoodLog = sqlx::query_as(&format!(
        "INSERT INTO food_logs (patient_id, description, calories, nutrients)
         VALUES ($1, $2, $3, $4)
         RETURNING {}",
        FOOD_COLUMNS
    ))
    .bind(patient_id)
    .bind(description.trim())
    .bind(analysis.calories)
    .bind(Json(&analysis.nutrients))
    .fetch_one(pool)
    .await?;

    tracing::info!(
        patient_id = %patient_id,
        food_log_id = %log.id,
        calories = log.calories,
        "Food logged"
    );

    Ok(log)
}

/// Newest first.
pub async fn list_food_logs(pool: &PgPool, patient_id: Uuid, limit: i64) -> Result<Vec<FoodLog>> {
    let rows = sqlx::query_as(&format!(
        "SELECT {} FROM food_logs WHERE patient_id = $1 ORDER BY created_at DESC LIMIT $2",
        FOOD_COLUMNS
    ))
    .bind(patient_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pulso_core::completion::{CompletionError, CompletionRequest};

    struct Canned(&'static str);

    #[async_trait]
    impl CompletionBackend for Canned {
        async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, CompletionError> {
            assert!(request.json_mode);
            Ok(self.0.to_string())
        }

        fn model(&self) -> &str {
            "canned"
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[tokio::test]
    async fn test_analyze_food_parses_fenced_json() {
        let backend = Canned(
            "```json\n{\"calories\": 180, \"nutrients\": {\"protein\": \"13g\", \"carbs\": \"1g\", \"fat\": \"12g\"}}\n```",
        );
        let a = analyze_food(&backend, "two boiled eggs").await.unwrap();
        assert_eq!(a.calories, 180.0);
        assert_eq!(a.nutrients.protein, "13g");
    }

    #[tokio::test]
    async fn test_analyze_food_parse_failure_is_nutrition_error() {
        let backend = Canned("Sorry, I can't help with that.");
        let result = analyze_food(&backend, "mystery stew").await;
        assert!(matches!(result, Err(PulsoError::Nutrition(_))));
    }

    #[tokio::test]
    async fn test_analyze_food_rejects_blank_text() {
        let backend = Canned("{}");
        let result = analyze_food(&backend, "  ").await;
        assert!(matches!(result, Err(PulsoError::Validation(_))));
    }
}
