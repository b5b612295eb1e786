//! sqlgate server binary
//!
//! Answers natural-language questions with SQL over plain HTTP or MCP.

use anyhow::Context;
use rust_mcp_sdk::mcp_server::{hyper_server, HyperServerOptions};
use sqlgate_connect::{DuckDbConnector, SnowflakeConnector};
use sqlgate_metrics::MetricRegistry;
use sqlgate_server::{
    config::{Config, Transport},
    http, logging,
    mcp::SqlGateServerHandler,
    Agent, ConnectorRegistry, OpenAiModel, Telemetry, ToolDispatcher,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Secrets live in .env; operational settings in config.yaml
    dotenvy::dotenv().ok();

    let config_path = Config::path_from_env();
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;

    logging::init(&config.logging);
    info!(path = %config_path, "configuration loaded");

    let sources = build_sources(&config)?;
    info!(sources = ?sources.names(), "connectors registered");

    let metrics = MetricRegistry::with_definitions(config.metrics.clone());
    info!(metrics = ?metrics.list_all(), "metrics loaded");

    let api_key = Config::openai_api_key().context("OPENAI_API_KEY must be set (e.g. in .env)")?;
    let model = OpenAiModel::new(api_key, config.llm.model.clone(), config.llm.temperature);
    info!(model = model.model(), temperature = config.llm.temperature, "language model ready");

    let agent = Agent::new(sources, Arc::new(metrics), Arc::new(model))
        .with_prompts(config.prompts.clone())
        .with_fixed_schema(config.ask.clone());

    let telemetry = Telemetry::new().context("registering prometheus metrics")?;
    let dispatcher = Arc::new(ToolDispatcher::new(Arc::new(agent), Arc::new(telemetry)));

    let host = config.server.host.clone();
    let port = config.server.port;

    match config.server.transport {
        Transport::Http => {
            http::Server::new(format!("{host}:{port}"), dispatcher)
                .run()
                .await
        }
        Transport::Mcp => {
            info!(%host, port, "starting MCP transport with SSE support");
            let server = hyper_server::create_server(
                SqlGateServerHandler::server_info(),
                SqlGateServerHandler::new(dispatcher),
                HyperServerOptions {
                    host,
                    port,
                    sse_support: true,
                    ..Default::default()
                },
            );
            server
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("MCP server failed: {e}"))
        }
    }
}

/// Warehouse first when available, then the embedded engine
fn build_sources(config: &Config) -> anyhow::Result<ConnectorRegistry> {
    let mut sources = ConnectorRegistry::new();

    if config.warehouse.enabled {
        match Config::snowflake_token() {
            Some(token) => {
                match SnowflakeConnector::new(config.warehouse.connector_config(token)) {
                    Ok(connector) => sources.register(Arc::new(connector)),
                    Err(e) => warn!(error = %e, "warehouse connector disabled"),
                }
            }
            None => warn!("SNOWFLAKE_TOKEN not set; warehouse connector disabled"),
        }
    }

    let embedded = config.embedded.connector_config();
    let duck = match DuckDbConnector::open(embedded.clone()) {
        Ok(duck) => duck,
        Err(e) if embedded.load_httpfs => {
            // Offline hosts cannot install httpfs; local files still work
            warn!(error = %e, "httpfs unavailable; embedded engine limited to local files");
            DuckDbConnector::open(sqlgate_connect::DuckDbConfig {
                load_httpfs: false,
                ..embedded
            })
            .context("opening embedded DuckDB engine")?
        }
        Err(e) => return Err(e).context("opening embedded DuckDB engine"),
    };
    sources.register(Arc::new(duck));

    Ok(sources)
}
