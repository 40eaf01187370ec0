use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct PulsoConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub completion: CompletionSettings,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub avatar: AvatarConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// `[completion]` section: where the hosted chat-completion API lives.
///
/// The key itself never goes in the file; `api_key_env` names the
/// environment variable it is read from.
#[derive(Debug, Deserialize, Clone)]
pub struct CompletionSettings {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout_seconds: 30,
            max_retries: 0,
            retry_delay_ms: 500,
        }
    }
}

impl CompletionSettings {
    /// Reads the API key from the configured environment variable.
    /// Returns an empty string when unset so callers can answer 500 early.
    pub fn api_key(&self) -> String {
        std::env::var(&self.api_key_env).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8780,
        }
    }
}

/// Avatar reward and dashboard thresholds.
#[derive(Debug, Deserialize, Clone)]
pub struct AvatarConfig {
    pub health_reward: i32,
    pub critical_threshold: i32,
    pub model_url: String,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            health_reward: crate::rules::HEALTH_REWARD,
            critical_threshold: crate::rules::CRITICAL_HEALTH_THRESHOLD,
            model_url: crate::visual::DEFAULT_MODEL_URL.to_string(),
        }
    }
}

impl PulsoConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("PULSO").separator("__"))
            .build()?;
        let mut config: Self = s.try_deserialize()?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        Ok(config)
    }
}
