//! MCP (Model Context Protocol) transport

use async_trait::async_trait;
use rust_mcp_schema::{
    schema_utils::CallToolError, CallToolRequest, CallToolResult, ContentBlock, Implementation,
    InitializeResult, ListToolsRequest, ListToolsResult, RpcError, ServerCapabilities,
    ServerCapabilitiesTools, TextContent, Tool, ToolInputSchema, LATEST_PROTOCOL_VERSION,
};
use rust_mcp_sdk::{mcp_server::ServerHandler, McpServer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::tools::{ToolDispatcher, TOOL_NAMES};

pub struct SqlGateServerHandler {
    dispatcher: Arc<ToolDispatcher>,
}

impl SqlGateServerHandler {
    pub fn new(dispatcher: Arc<ToolDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Create server initialization details
    pub fn server_info() -> InitializeResult {
        InitializeResult {
            protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ServerCapabilitiesTools { list_changed: None }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "sqlgate-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("sqlgate natural language to SQL gateway".to_string()),
            },
            instructions: Some(
                "sqlgate answers business questions with SQL. Use 'ask' for the sales \
                 warehouse, 'register_s3_table' then 'ask_s3' for files in object storage, \
                 and 'calc_kpi' for named metrics."
                    .to_string(),
            ),
            meta: None,
        }
    }

    /// Run one tool through the dispatcher.
    ///
    /// Unknown tool names and invalid arguments come back as the same JSON
    /// error bodies the HTTP transport returns, flagged with `is_error`.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult, CallToolError> {
        let payload = Value::Object(arguments.unwrap_or_default());
        let response = self.dispatcher.call(name, payload).await;

        let text = serde_json::to_string_pretty(&response)
            .map_err(|e| CallToolError::from_message(format!("Failed to encode response: {e}")))?;

        Ok(CallToolResult {
            content: vec![ContentBlock::TextContent(TextContent::new(text, None, None))],
            is_error: response.is_error().then_some(true),
            meta: None,
            structured_content: None,
        })
    }

    pub fn tools() -> Vec<Tool> {
        TOOL_NAMES
            .iter()
            .map(|name| {
                let (description, fields) = tool_spec(name);
                let required = fields
                    .iter()
                    .filter(|f| f.required)
                    .map(|f| f.name.to_string())
                    .collect();
                let properties: HashMap<String, Map<String, Value>> = fields
                    .iter()
                    .map(|f| (f.name.to_string(), string_property(f.description)))
                    .collect();

                Tool {
                    name: name.to_string(),
                    description: Some(description.to_string()),
                    input_schema: ToolInputSchema::new(required, Some(properties)),
                    title: None,
                    annotations: None,
                    meta: None,
                    output_schema: None,
                }
            })
            .collect()
    }
}

struct Field {
    name: &'static str,
    description: &'static str,
    required: bool,
}

const fn field(name: &'static str, description: &'static str, required: bool) -> Field {
    Field {
        name,
        description,
        required,
    }
}

fn tool_spec(name: &str) -> (&'static str, Vec<Field>) {
    match name {
        "discover_sources" => ("List the names of all registered data sources.", vec![]),
        "list_metrics" => ("List the names of all defined KPI metrics.", vec![]),
        "discover_tables" => (
            "List the tables visible through one data source, with its capabilities.",
            vec![field("source", "Data source name from discover_sources", true)],
        ),
        "calc_kpi" => (
            "Evaluate a named KPI metric and return its value rows.",
            vec![field("metric", "Metric name from list_metrics", true)],
        ),
        "query" => (
            "Run caller-supplied SQL against a named data source. No guardrails are applied.",
            vec![
                field("source", "Data source name", true),
                field("sql", "SQL statement to run", true),
                field("dialect", "SQL dialect; defaults to the source's own", false),
            ],
        ),
        "register_s3_table" => (
            "Expose a file in object storage (s3://, https:// or a local path) as a named table.",
            vec![
                field("name", "Table name to register", true),
                field("uri", "Location of the data file", true),
                field("format", "parquet, csv, json or auto (default)", false),
            ],
        ),
        "ask" => (
            "Answer a natural-language question against the daily sales warehouse table. \
             Returns the generated SQL and the result rows.",
            vec![field(
                "question",
                "Natural-language question (e.g., 'total units sold online in May 2025')",
                true,
            )],
        ),
        "ask_s3" => (
            "Answer a natural-language question against a table registered with register_s3_table.",
            vec![
                field("table", "Registered table name", true),
                field("question", "Natural-language question", true),
            ],
        ),
        _ => ("", vec![]),
    }
}

fn string_property(description: &str) -> Map<String, Value> {
    let mut prop = Map::new();
    prop.insert("type".to_string(), Value::String("string".to_string()));
    prop.insert(
        "description".to_string(),
        Value::String(description.to_string()),
    );
    prop
}

#[async_trait]
impl ServerHandler for SqlGateServerHandler {
    async fn handle_list_tools_request(
        &self,
        _request: ListToolsRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> std::result::Result<ListToolsResult, RpcError> {
        info!("Listing available tools");

        Ok(ListToolsResult {
            tools: Self::tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn handle_call_tool_request(
        &self,
        request: CallToolRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> std::result::Result<CallToolResult, CallToolError> {
        self.call_tool(&request.params.name, request.params.arguments)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tool_is_listed() {
        let tools = SqlGateServerHandler::tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, TOOL_NAMES);
        assert!(tools
            .iter()
            .all(|t| t.description.as_deref().is_some_and(|d| !d.is_empty())));
    }

    #[test]
    fn test_required_fields() {
        let tools = SqlGateServerHandler::tools();
        let schema = |name: &str| {
            let tool = tools.iter().find(|t| t.name == name).unwrap();
            serde_json::to_value(&tool.input_schema).unwrap()
        };

        assert_eq!(
            schema("ask_s3")["required"],
            serde_json::json!(["table", "question"])
        );
        let query = schema("query");
        assert_eq!(query["required"], serde_json::json!(["source", "sql"]));
        assert_eq!(query["properties"]["dialect"]["type"], "string");
    }
}
