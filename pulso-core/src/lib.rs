pub mod api;
pub mod completion;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod models;
pub mod nutrition;
pub mod prompts;
pub mod report;
pub mod rules;
pub mod visual;

pub use completion::{
    CompletionBackend, CompletionConfig, CompletionError, CompletionRequest, OpenAiCompatClient,
    PromptMessage, PromptRole,
};
pub use config::PulsoConfig;
pub use dashboard::{summarize, DashboardSummary, PatientOverview};
pub use error::PulsoError;
pub use nutrition::NutritionError;
