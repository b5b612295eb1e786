//! sqlgate server: natural-language questions answered with SQL
//!
//! The [`agent::Agent`] turns a question into guarded SQL and runs it on a
//! connector; [`tools::ToolDispatcher`] exposes it as named tools over plain
//! HTTP ([`http`]) or MCP ([`mcp`]).

pub mod agent;
pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod logging;
pub mod mcp;
pub mod prompt;
pub mod sources;
pub mod telemetry;
pub mod tools;

pub use agent::{Agent, Answer};
pub use config::{Config, ConfigError, Transport};
pub use error::AgentError;
pub use llm::{LanguageModel, ModelError, OpenAiModel, Prompt};
pub use sources::ConnectorRegistry;
pub use telemetry::Telemetry;
pub use tools::{ToolDispatcher, ToolRequest, ToolResponse, TOOL_NAMES};
