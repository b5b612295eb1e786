//! Errors recovered at the agent boundary
//!
//! Every variant becomes a `{error, sql?}` response; none reaches the
//! transport as a fault.

use sqlgate_guard::Violation;
use sqlgate_metrics::MetricError;
use thiserror::Error;

use crate::llm::ModelError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Connector '{name}' not registered. Available: {available:?}")]
    UnknownConnector { name: String, available: Vec<String> },

    #[error("No connectors registered")]
    NoConnectors,

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Unknown table '{table}'. Did you call register_s3_table? {reason}")]
    UnknownTable { table: String, reason: String },

    #[error("No registered connector supports table registration")]
    RegistrationUnsupported,

    #[error("{violation}")]
    Guardrail { violation: Violation, sql: String },

    #[error("{message}")]
    Backend { message: String, sql: Option<String> },

    #[error("Missing required field '{field}' for tool '{tool}'")]
    MissingRequiredField {
        tool: &'static str,
        field: &'static str,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Tool {0} not found")]
    UnknownTool(String),

    #[error("Model invocation failed: {0}")]
    Model(#[from] ModelError),

    #[error("Table registration failed: {0}")]
    Registration(String),
}

impl AgentError {
    /// Candidate SQL to echo back, when the failure happened after generation
    pub fn sql(&self) -> Option<&str> {
        match self {
            AgentError::Guardrail { sql, .. } => Some(sql),
            AgentError::Backend { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::UnknownConnector { .. } | AgentError::NoConnectors => "unknown_connector",
            AgentError::UnknownMetric(_) => "unknown_metric",
            AgentError::UnknownTable { .. } => "unknown_table",
            AgentError::RegistrationUnsupported => "unsupported",
            AgentError::Guardrail { .. } => "guardrail",
            AgentError::Backend { .. } => "backend",
            AgentError::MissingRequiredField { .. } | AgentError::InvalidField { .. } => {
                "bad_request"
            }
            AgentError::UnknownTool(_) => "unknown_tool",
            AgentError::Model(_) => "model",
            AgentError::Registration(_) => "registration",
        }
    }
}

impl From<MetricError> for AgentError {
    fn from(err: MetricError) -> Self {
        match err {
            MetricError::UnknownMetric(name) => AgentError::UnknownMetric(name),
        }
    }
}
