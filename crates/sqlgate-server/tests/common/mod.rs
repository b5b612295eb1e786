//! In-process stand-ins for the warehouse and the language model

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use sqlgate_connect::{
    Capabilities, Connector, ConnectorError, ConnectorKind, DuckDbConfig, DuckDbConnector,
    Discovery, Row, RowStream,
};
use sqlgate_metrics::MetricRegistry;
use sqlgate_server::{
    Agent, ConnectorRegistry, LanguageModel, ModelError, Prompt, Telemetry, ToolDispatcher,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Warehouse that records every statement and answers with canned rows
pub struct StubWarehouse {
    rows: Vec<Row>,
    pub executed: Mutex<Vec<String>>,
    panic_on_execute: bool,
}

impl StubWarehouse {
    pub fn new(rows: Vec<Row>) -> Arc<Self> {
        Arc::new(Self {
            rows,
            executed: Mutex::new(Vec::new()),
            panic_on_execute: false,
        })
    }

    pub fn panicking() -> Arc<Self> {
        Arc::new(Self {
            rows: Vec::new(),
            executed: Mutex::new(Vec::new()),
            panic_on_execute: true,
        })
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for StubWarehouse {
    fn name(&self) -> &str {
        "snowflake"
    }

    fn version(&self) -> &str {
        "stub"
    }

    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Warehouse
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            dialect: "snowflake".to_string(),
            streaming: true,
            formats: BTreeSet::new(),
        }
    }

    async fn discover(&self) -> Result<Discovery, ConnectorError> {
        Ok(Discovery {
            tables: vec!["DAILY_SALES".to_string()],
        })
    }

    async fn execute(
        &self,
        query: &str,
        _dialect: &str,
        _stream: bool,
    ) -> Result<RowStream, ConnectorError> {
        if self.panic_on_execute {
            panic!("warehouse exploded");
        }
        self.executed.lock().unwrap().push(query.to_string());
        Ok(stream::iter(self.rows.clone().into_iter().map(Ok)).boxed())
    }
}

/// Language model that always answers with the same text
pub struct CannedModel {
    response: String,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl CannedModel {
    pub fn new(response: &str) -> Arc<Self> {
        Arc::new(Self {
            response: response.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
        self.prompts.lock().unwrap().last().cloned()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for CannedModel {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        Ok(self.response.clone())
    }
}

pub fn duck() -> Arc<DuckDbConnector> {
    Arc::new(
        DuckDbConnector::open(DuckDbConfig {
            load_httpfs: false,
            ..DuckDbConfig::default()
        })
        .expect("in-memory DuckDB opens"),
    )
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => Row::new(map),
        other => panic!("row must be an object, got {other}"),
    }
}

pub fn total_units_row() -> Row {
    row(json!({"TOTAL_UNITS": 1234}))
}

pub fn dispatcher(sources: ConnectorRegistry, model: Arc<CannedModel>) -> Arc<ToolDispatcher> {
    let agent = Agent::new(sources, Arc::new(MetricRegistry::new()), model);
    let telemetry = Telemetry::new().expect("telemetry registers");
    Arc::new(ToolDispatcher::new(Arc::new(agent), Arc::new(telemetry)))
}

pub fn temp_file(ext: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("sqlgate-{}.{}", uuid::Uuid::new_v4(), ext));
    std::fs::write(&path, contents).unwrap();
    path
}
