//! Configuration for the sqlgate server
//!
//! Loads configuration from:
//! 1. config.yaml (or `SQLGATE_CONFIG`) - operational settings, prompts, metrics
//! 2. .env file - secrets (API keys, warehouse token, AWS keys)
//!
//! Environment variables always override config.yaml values. Secrets are never
//! read from the YAML file.

use serde::{Deserialize, Serialize};
use sqlgate_connect::{DuckDbConfig, S3Credentials, SnowflakeConfig};
use sqlgate_metrics::MetricDefinition;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::prompt::{FixedSchema, Prompts};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid transport '{0}' (expected http or mcp)")]
    InvalidTransport(String),
}

/// Which surface the server exposes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Plain JSON over `POST /mcp/tools/{tool}`
    #[default]
    Http,
    /// Model Context Protocol over SSE
    Mcp,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Transport::Http),
            "mcp" => Ok(Transport::Mcp),
            other => Err(ConfigError::InvalidTransport(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub transport: Transport,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            transport: Transport::Http,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

/// Snowflake connection settings. The token comes from `SNOWFLAKE_TOKEN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub enabled: bool,
    pub name: String,
    pub account: String,
    pub database: String,
    pub schema: String,
    pub warehouse: String,
    pub role: Option<String>,
    pub token_type: String,
    /// Point at a proxy or mock instead of `<account>.snowflakecomputing.com`
    pub base_url: Option<String>,
    pub statement_timeout_secs: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: "snowflake".to_string(),
            account: String::new(),
            database: String::new(),
            schema: "PUBLIC".to_string(),
            warehouse: String::new(),
            role: None,
            token_type: "OAUTH".to_string(),
            base_url: None,
            statement_timeout_secs: 300,
        }
    }
}

impl WarehouseConfig {
    pub fn connector_config(&self, token: String) -> SnowflakeConfig {
        SnowflakeConfig {
            name: self.name.clone(),
            account: self.account.clone(),
            database: self.database.clone(),
            schema: self.schema.clone(),
            warehouse: self.warehouse.clone(),
            role: self.role.clone(),
            token,
            token_type: self.token_type.clone(),
            base_url: self.base_url.clone(),
            statement_timeout_secs: self.statement_timeout_secs,
            ..SnowflakeConfig::default()
        }
    }
}

/// DuckDB settings. S3 credentials come from the standard AWS variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedConfig {
    pub name: String,
    pub load_httpfs: bool,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            name: "s3".to_string(),
            load_httpfs: true,
        }
    }
}

impl EmbeddedConfig {
    pub fn connector_config(&self) -> DuckDbConfig {
        DuckDbConfig {
            name: self.name.clone(),
            load_httpfs: self.load_httpfs,
            credentials: S3Credentials::from_env(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
    pub warehouse: WarehouseConfig,
    pub embedded: EmbeddedConfig,
    /// Target table and DDL for the `ask` tool
    pub ask: FixedSchema,
    pub prompts: Prompts,
    /// Metrics added after the built-ins
    pub metrics: Vec<MetricDefinition>,
}

impl Config {
    /// Parse YAML without looking at the environment
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file means defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Path named by `SQLGATE_CONFIG`, else `config.yaml`
    pub fn path_from_env() -> String {
        std::env::var("SQLGATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = std::env::var("SQLGATE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SQLGATE_SERVER_PORT") {
            if let Ok(port_num) = port.parse() {
                self.server.port = port_num;
            }
        }
        if let Ok(transport) = std::env::var("SQLGATE_TRANSPORT") {
            self.server.transport = transport.parse()?;
        }

        if let Ok(model) = std::env::var("SQLGATE_LLM_MODEL") {
            self.llm.model = model;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }

        if let Ok(account) = std::env::var("SNOWFLAKE_ACCOUNT") {
            self.warehouse.account = account;
        }
        if let Ok(database) = std::env::var("SNOWFLAKE_DATABASE") {
            self.warehouse.database = database;
        }
        if let Ok(schema) = std::env::var("SNOWFLAKE_SCHEMA") {
            self.warehouse.schema = schema;
        }
        if let Ok(warehouse) = std::env::var("SNOWFLAKE_WAREHOUSE") {
            self.warehouse.warehouse = warehouse;
        }
        if let Ok(role) = std::env::var("SNOWFLAKE_ROLE") {
            self.warehouse.role = Some(role);
        }

        Ok(())
    }

    /// Get OpenAI API key from environment (must be in .env)
    pub fn openai_api_key() -> Result<String, ConfigError> {
        std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))
    }

    /// Warehouse bearer token, if one is configured
    pub fn snowflake_token() -> Option<String> {
        std::env::var("SNOWFLAKE_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.transport, Transport::Http);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.output, "stdout");
        assert_eq!(config.embedded.name, "s3");
        assert_eq!(config.warehouse.name, "snowflake");
        assert_eq!(config.ask.table, "DAILY_SALES");
        assert!(config.metrics.is_empty());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            r#"
server:
  port: 9000
  transport: mcp
warehouse:
  enabled: false
metrics:
  - name: units_online
    expr: SUM(units)
    source: sales_s3
    filters: "channel = 'Online'"
    connector: s3
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.transport, Transport::Mcp);
        assert!(!config.warehouse.enabled);
        assert_eq!(config.warehouse.token_type, "OAUTH");
        assert_eq!(config.metrics.len(), 1);
        assert_eq!(config.metrics[0].connector.as_deref(), Some("s3"));
        assert_eq!(config.metrics[0].grain, "");
    }

    #[test]
    fn test_transport_from_str() {
        assert_eq!("HTTP".parse::<Transport>().unwrap(), Transport::Http);
        assert_eq!(" mcp ".parse::<Transport>().unwrap(), Transport::Mcp);
        assert!(matches!(
            "grpc".parse::<Transport>(),
            Err(ConfigError::InvalidTransport(_))
        ));
    }

    #[test]
    fn test_warehouse_connector_config() {
        let warehouse = WarehouseConfig {
            account: "xy12345".to_string(),
            database: "SALES".to_string(),
            ..WarehouseConfig::default()
        };
        let sf = warehouse.connector_config("token".to_string());
        assert_eq!(sf.name, "snowflake");
        assert_eq!(sf.account, "xy12345");
        assert_eq!(sf.schema, "PUBLIC");
        assert_eq!(sf.token, "token");
        assert_eq!(sf.statement_timeout_secs, 300);
    }

    #[test]
    fn test_env_var_override() {
        std::env::set_var("SQLGATE_SERVER_PORT", "9090");
        std::env::set_var("SQLGATE_LLM_MODEL", "gpt-4o");

        let config_yaml = r#"
server:
  host: "0.0.0.0"
  port: 8000
llm:
  model: "gpt-4o-mini"
"#;
        let temp_file = std::env::temp_dir().join("sqlgate_test_config.yaml");
        std::fs::write(&temp_file, config_yaml).unwrap();

        let config = Config::load(&temp_file).unwrap();
        assert_eq!(config.server.port, 9090); // Overridden
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.llm.model, "gpt-4o"); // Overridden

        std::env::remove_var("SQLGATE_SERVER_PORT");
        std::env::remove_var("SQLGATE_LLM_MODEL");
        std::fs::remove_file(temp_file).ok();
    }

    #[test]
    fn test_missing_file_means_defaults() {
        let path = std::env::temp_dir().join("sqlgate_no_such_config.yaml");
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.embedded.name, "s3");
        assert!(Config::load(&path).is_err());
    }
}
