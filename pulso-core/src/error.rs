use thiserror::Error;

use crate::completion::CompletionError;
use crate::nutrition::NutritionError;

#[derive(Error, Debug)]
pub enum PulsoError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Nutrition analysis error: {0}")]
    Nutrition(#[from] NutritionError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Completion API key is not configured")]
    MissingApiKey,

    #[error("Report error: {0}")]
    Report(String),
}

pub type Result<T> = std::result::Result<T, PulsoError>;
