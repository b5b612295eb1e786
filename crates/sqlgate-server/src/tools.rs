//! Tool surface: typed requests, JSON responses, one dispatcher
//!
//! Both transports (plain HTTP and MCP) hand a tool name and a JSON payload to
//! [`ToolDispatcher::call`] and get back a [`ToolResponse`]. Validation
//! happens here, at the boundary; the agent only sees typed arguments.

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use sqlgate_connect::{Capabilities, Row, TableFormat, TableInfo};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

use crate::agent::Agent;
use crate::error::AgentError;
use crate::telemetry::Telemetry;

/// Every tool name, in listing order
pub const TOOL_NAMES: &[&str] = &[
    "discover_sources",
    "list_metrics",
    "discover_tables",
    "calc_kpi",
    "query",
    "register_s3_table",
    "ask",
    "ask_s3",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    DiscoverSources,
    ListMetrics,
    DiscoverTables {
        source: String,
    },
    CalcKpi {
        metric: String,
    },
    Query {
        source: String,
        sql: String,
        dialect: Option<String>,
    },
    RegisterTable {
        name: String,
        uri: String,
        format: TableFormat,
    },
    Ask {
        question: String,
    },
    AskTable {
        table: String,
        question: String,
    },
}

impl ToolRequest {
    /// Validate `payload` against the field requirements of `tool`.
    ///
    /// A payload that is not a JSON object is treated as `{}`.
    pub fn parse(tool: &str, payload: &Value) -> Result<Self, AgentError> {
        let fields = Fields { payload };

        let request = match tool {
            "discover_sources" => ToolRequest::DiscoverSources,
            "list_metrics" => ToolRequest::ListMetrics,
            "discover_tables" => ToolRequest::DiscoverTables {
                source: fields.required("discover_tables", "source")?,
            },
            "calc_kpi" => ToolRequest::CalcKpi {
                metric: fields.required("calc_kpi", "metric")?,
            },
            "query" => ToolRequest::Query {
                source: fields.required("query", "source")?,
                sql: fields.required_text("query", "sql")?,
                dialect: fields.optional("dialect"),
            },
            "register_s3_table" => {
                let format = match fields.optional("format") {
                    Some(f) => f.parse::<TableFormat>().map_err(|e| AgentError::InvalidField {
                        field: "format",
                        reason: e.to_string(),
                    })?,
                    None => TableFormat::Auto,
                };
                ToolRequest::RegisterTable {
                    name: fields.required("register_s3_table", "name")?,
                    uri: fields.required("register_s3_table", "uri")?,
                    format,
                }
            }
            "ask" => ToolRequest::Ask {
                question: fields.required_text("ask", "question")?,
            },
            "ask_s3" => ToolRequest::AskTable {
                table: fields.required("ask_s3", "table")?,
                question: fields.required_text("ask_s3", "question")?,
            },
            other => return Err(AgentError::UnknownTool(other.to_string())),
        };
        Ok(request)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::DiscoverSources => "discover_sources",
            ToolRequest::ListMetrics => "list_metrics",
            ToolRequest::DiscoverTables { .. } => "discover_tables",
            ToolRequest::CalcKpi { .. } => "calc_kpi",
            ToolRequest::Query { .. } => "query",
            ToolRequest::RegisterTable { .. } => "register_s3_table",
            ToolRequest::Ask { .. } => "ask",
            ToolRequest::AskTable { .. } => "ask_s3",
        }
    }
}

struct Fields<'a> {
    payload: &'a Value,
}

impl Fields<'_> {
    /// Non-blank string value, untouched
    fn verbatim(&self, field: &str) -> Option<&str> {
        self.payload
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Names and options are trimmed; free text is not
    fn optional(&self, field: &str) -> Option<String> {
        self.verbatim(field).map(|s| s.trim().to_string())
    }

    fn required(&self, tool: &'static str, field: &'static str) -> Result<String, AgentError> {
        self.optional(field)
            .ok_or(AgentError::MissingRequiredField { tool, field })
    }

    fn required_text(&self, tool: &'static str, field: &'static str) -> Result<String, AgentError> {
        self.verbatim(field)
            .map(str::to_string)
            .ok_or(AgentError::MissingRequiredField { tool, field })
    }
}

/// JSON body returned for every tool call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolResponse {
    Sources {
        sources: Vec<String>,
    },
    Metrics {
        metrics: Vec<String>,
    },
    Tables {
        source: String,
        capabilities: Capabilities,
        tables: Vec<String>,
    },
    Rows(Vec<Row>),
    Registered {
        status: &'static str,
        #[serde(flatten)]
        info: TableInfo,
    },
    Answer {
        sql: String,
        rows: Vec<Row>,
    },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        sql: Option<String>,
    },
}

impl ToolResponse {
    pub fn error(message: impl Into<String>) -> Self {
        ToolResponse::Error {
            error: message.into(),
            sql: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolResponse::Error { .. })
    }
}

impl From<AgentError> for ToolResponse {
    fn from(err: AgentError) -> Self {
        ToolResponse::Error {
            sql: err.sql().map(str::to_string),
            error: err.to_string(),
        }
    }
}

pub struct ToolDispatcher {
    agent: Arc<Agent>,
    telemetry: Arc<Telemetry>,
}

impl ToolDispatcher {
    pub fn new(agent: Arc<Agent>, telemetry: Arc<Telemetry>) -> Self {
        Self { agent, telemetry }
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Run one tool call to completion. Never fails: every error, including a
    /// panic inside the pipeline, comes back as an error response.
    pub async fn call(&self, tool: &str, payload: Value) -> ToolResponse {
        let started = Instant::now();
        let span = info_span!("tool", tool = %tool);

        let outcome = AssertUnwindSafe(self.run(tool, &payload).instrument(span))
            .catch_unwind()
            .await;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                warn!(tool, kind = err.kind(), error = %err, "tool call failed");
                if let AgentError::Guardrail { violation, .. } = &err {
                    self.telemetry.guardrail_blocked(violation.reason());
                }
                ToolResponse::from(err)
            }
            Err(_) => {
                error!(tool, "tool call panicked");
                ToolResponse::error("internal error")
            }
        };

        let outcome = if response.is_error() { "error" } else { "ok" };
        self.telemetry
            .observe(tool, outcome, started.elapsed().as_secs_f64());
        response
    }

    async fn run(&self, tool: &str, payload: &Value) -> Result<ToolResponse, AgentError> {
        let request = ToolRequest::parse(tool, payload)?;
        info!(tool = request.name(), "tool called");

        let response = match request {
            ToolRequest::DiscoverSources => ToolResponse::Sources {
                sources: self.agent.discover_sources(),
            },
            ToolRequest::ListMetrics => ToolResponse::Metrics {
                metrics: self.agent.list_metrics(),
            },
            ToolRequest::DiscoverTables { source } => {
                let connector = self.agent.sources().get(&source).ok_or_else(|| {
                    AgentError::UnknownConnector {
                        name: source.clone(),
                        available: self.agent.discover_sources(),
                    }
                })?;
                let discovery = connector.discover().await.map_err(|e| AgentError::Backend {
                    message: e.to_string(),
                    sql: None,
                })?;
                ToolResponse::Tables {
                    capabilities: connector.capabilities(),
                    tables: discovery.tables,
                    source,
                }
            }
            ToolRequest::CalcKpi { metric } => ToolResponse::Rows(self.agent.calc_kpi(&metric).await?),
            ToolRequest::Query {
                source,
                sql,
                dialect,
            } => ToolResponse::Rows(
                self.agent
                    .query(&source, &sql, dialect.as_deref())
                    .await?,
            ),
            ToolRequest::RegisterTable { name, uri, format } => ToolResponse::Registered {
                status: "registered",
                info: self.agent.register_table(&name, &uri, format).await?,
            },
            ToolRequest::Ask { question } => {
                let answer = self.agent.ask(&question).await?;
                ToolResponse::Answer {
                    sql: answer.sql,
                    rows: answer.rows,
                }
            }
            ToolRequest::AskTable { table, question } => {
                let answer = self.agent.ask_table(&table, &question).await?;
                ToolResponse::Answer {
                    sql: answer.sql,
                    rows: answer.rows,
                }
            }
        };
        Ok(response)
    }
}
