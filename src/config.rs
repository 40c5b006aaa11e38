use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub checkpoint: CheckpointConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Connection settings for the two crawler databases
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub chan_url: String,
    pub reddit_url: String,
    pub max_pool_size: usize,
    pub query_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Reject anything that is not a single read-only query before execution
    pub read_only: bool,
    pub row_limit: u64,
    pub sql_dialect: String,
    pub catalog_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointConfig {
    pub backend: CheckpointBackend,
    pub sqlite_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub style: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env before reading overrides so its values take part
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from defaults plus overrides resolved through `lookup`.
    ///
    /// Values that do not parse are rejected rather than replaced by defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, config::ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("database.chan_url", "postgresql://localhost:5432/4chan_crawler")?
            .set_default("database.reddit_url", "postgresql://localhost:5432/reddit_crawler")?
            .set_default("database.max_pool_size", 8)?
            .set_default("database.query_timeout_secs", 30)?
            .set_default("llm.base_url", "https://api.openai.com/v1")?
            .set_default("llm.model", "gpt-4.1-mini")?
            .set_default("llm.temperature", 0.0)?
            .set_default("llm.timeout_secs", 60)?
            .set_default("agent.read_only", true)?
            .set_default("agent.row_limit", 1000)?
            .set_default("agent.sql_dialect", "PostgreSQL")?
            .set_default("checkpoint.backend", "memory")?
            .set_default("checkpoint.sqlite_path", "./checkpoints.db")?
            .set_default("logging.level", "info")?
            .set_default("logging.style", "auto")?;

        let text_overrides = [
            ("HOST", "server.host"),
            ("CHAN_DATABASE_URL", "database.chan_url"),
            ("REDDIT_DATABASE_URL", "database.reddit_url"),
            ("OPENAI_BASE_URL", "llm.base_url"),
            ("OPENAI_API_KEY", "llm.api_key"),
            ("LLM_MODEL", "llm.model"),
            ("SCHEMA_CATALOG_PATH", "agent.catalog_path"),
            ("CHECKPOINT_PATH", "checkpoint.sqlite_path"),
            ("RUST_LOG", "logging.level"),
            ("RUST_LOG_STYLE", "logging.style"),
        ];
        for (var, key) in text_overrides {
            if let Some(value) = lookup(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        let number_overrides = [
            ("PORT", "server.port"),
            ("DB_MAX_POOL_SIZE", "database.max_pool_size"),
            ("QUERY_TIMEOUT_SECS", "database.query_timeout_secs"),
            ("LLM_TIMEOUT_SECS", "llm.timeout_secs"),
            ("AGENT_ROW_LIMIT", "agent.row_limit"),
        ];
        for (var, key) in number_overrides {
            if let Some(value) = lookup(var) {
                builder = builder.set_override(key, parse_var::<u64>(var, &value)?)?;
            }
        }

        if let Some(read_only) = lookup("AGENT_READ_ONLY") {
            builder = builder.set_override("agent.read_only", parse_var::<bool>("AGENT_READ_ONLY", &read_only)?)?;
        }

        if let Some(backend) = lookup("CHECKPOINT_BACKEND") {
            builder = builder.set_override("checkpoint.backend", backend.to_lowercase())?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, config::ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| config::ConfigError::Message(format!("Invalid value for {}: {:?}", var, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config, config::ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert!(config.agent.read_only);
        assert_eq!(config.agent.row_limit, 1000);
        assert_eq!(config.checkpoint.backend, CheckpointBackend::Memory);
        assert!(config.llm.api_key.is_none());
        assert!(config.agent.catalog_path.is_none());
        assert!(config.database.query_timeout_secs > 0);
    }

    #[test]
    fn test_env_overrides() {
        let config = config_with(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("AGENT_READ_ONLY", "false"),
            ("CHECKPOINT_BACKEND", "SQLite"),
            ("OPENAI_API_KEY", "sk-test"),
            ("SCHEMA_CATALOG_PATH", "/etc/catalog.json"),
        ])
        .unwrap();
        assert_eq!(config.server_address(), "127.0.0.1:9000");
        assert!(!config.agent.read_only);
        assert_eq!(config.checkpoint.backend, CheckpointBackend::Sqlite);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.agent.catalog_path.as_deref(), Some("/etc/catalog.json"));
    }

    #[test]
    fn test_malformed_values_rejected() {
        let err = config_with(&[("PORT", "abc")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let err = config_with(&[("AGENT_READ_ONLY", "maybe")]).unwrap_err();
        assert!(err.to_string().contains("AGENT_READ_ONLY"));

        assert!(config_with(&[("AGENT_ROW_LIMIT", "-5")]).is_err());
        assert!(config_with(&[("CHECKPOINT_BACKEND", "redis")]).is_err());
    }
}
