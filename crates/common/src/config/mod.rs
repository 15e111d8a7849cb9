//! Configuration management for Ragline services
//!
//! Settings are read once at process start from:
//! - Environment variables (`POSTGRES_HOST`, `OPENAI_API_KEY`, `DEBUG`, ...)
//! - An optional `config/default` file
//! - Default values
//!
//! Keys match environment variables case-insensitively, so `POSTGRES_PORT`
//! populates `postgres_port`.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Process-wide application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Database host
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    /// Database port
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    /// Database name
    #[serde(default = "default_postgres_db")]
    pub postgres_db: String,

    #[serde(default = "default_postgres_user")]
    pub postgres_user: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// OpenAI API key. Empty values count as unset.
    #[serde(default, deserialize_with = "deserialize_optional_secret")]
    pub openai_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[serde(default = "default_openai_api_base")]
    pub openai_api_base: String,

    /// Chat model used for answer generation
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// Embedding model used when an API key is configured
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Vector collection the service reads from and writes to
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// LLM request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub llm_timeout_secs: u64,

    /// Timeout for the per-request health probe connection
    #[serde(default = "default_health_probe_timeout")]
    pub health_probe_timeout_secs: u64,

    /// Maximum pooled connections for the vectorstore
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Debug mode, enabled only by a case-insensitive `true`
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub debug: bool,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Emit JSON log lines
    #[serde(default = "default_log_json")]
    pub log_json: bool,
}

// Default value functions
fn default_postgres_host() -> String { "postgres".to_string() }
fn default_postgres_port() -> u16 { 5432 }
fn default_postgres_db() -> String { "langchain_db".to_string() }
fn default_postgres_user() -> String { "langchain_user".to_string() }
fn default_postgres_password() -> String { "langchain_password".to_string() }
fn default_openai_api_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_openai_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_dimension() -> usize { 1536 }
fn default_collection_name() -> String { "documents".to_string() }
fn default_llm_timeout() -> u64 { 60 }
fn default_health_probe_timeout() -> u64 { 5 }
fn default_max_connections() -> u32 { 10 }
fn default_app_name() -> String { "RAG API".to_string() }
fn default_app_version() -> String { crate::VERSION.to_string() }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_log_json() -> bool { true }

/// Environment values arrive as text; file sources may carry real booleans.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Text(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawFlag::deserialize(deserializer)? {
        RawFlag::Bool(value) => value,
        RawFlag::Text(value) => value.trim().eq_ignore_ascii_case("true"),
    })
}

fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

impl Settings {
    /// Load settings from the environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Environment::default())
    }

    /// Load settings from the given environment source.
    ///
    /// Values are kept as strings so credentials such as `007` survive
    /// verbatim; numeric fields are converted during deserialization.
    pub fn load_from(environment: Environment) -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Optional base file, e.g. config/default.toml
            .add_source(File::with_name("config/default").required(false))
            // Plain environment variables, e.g. POSTGRES_HOST=db
            .add_source(environment)
            .build()?;

        Self::from_config(config)
    }

    /// Deserialize settings from an already-built config
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.try_deserialize()
    }

    /// Connection URI derived from the postgres fields
    pub fn database_url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.postgres_user,
            self.postgres_password,
            self.postgres_host,
            self.postgres_port,
            self.postgres_db
        )
    }

    /// Whether an LLM credential is configured
    pub fn openai_configured(&self) -> bool {
        self.openai_api_key.is_some()
    }

    pub fn health_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.health_probe_timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            postgres_host: default_postgres_host(),
            postgres_port: default_postgres_port(),
            postgres_db: default_postgres_db(),
            postgres_user: default_postgres_user(),
            postgres_password: default_postgres_password(),
            openai_api_key: None,
            openai_api_base: default_openai_api_base(),
            openai_model: default_openai_model(),
            embedding_model: default_embedding_model(),
            embedding_dimension: default_embedding_dimension(),
            collection_name: default_collection_name(),
            llm_timeout_secs: default_llm_timeout(),
            health_probe_timeout_secs: default_health_probe_timeout(),
            max_connections: default_max_connections(),
            app_name: default_app_name(),
            app_version: default_app_version(),
            debug: false,
            host: default_host(),
            port: default_port(),
            log_json: default_log_json(),
        }
    }
}
