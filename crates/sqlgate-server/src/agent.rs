//! The agent: natural language in, rows out
//!
//! Each request runs its stages strictly in sequence:
//! resolve connector → build prompt → one model call → sanitize →
//! guardrails → execute → materialize rows. Any stage can end the request
//! with an [`AgentError`]; nothing is retried.

use sqlgate_connect::{collect_rows, Connector, Row, TableFormat, TableInfo};
use sqlgate_guard::{sanitize, GuardrailPolicy};
use sqlgate_metrics::MetricRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::llm::{LanguageModel, Prompt};
use crate::prompt::{table_ddl, FixedSchema, Prompts};
use crate::sources::ConnectorRegistry;

/// Generated SQL and the rows it produced
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub sql: String,
    pub rows: Vec<Row>,
}

pub struct Agent {
    sources: ConnectorRegistry,
    metrics: Arc<MetricRegistry>,
    model: Arc<dyn LanguageModel>,
    prompts: Prompts,
    fixed: FixedSchema,
}

impl Agent {
    pub fn new(
        sources: ConnectorRegistry,
        metrics: Arc<MetricRegistry>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            sources,
            metrics,
            model,
            prompts: Prompts::default(),
            fixed: FixedSchema::default(),
        }
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_fixed_schema(mut self, fixed: FixedSchema) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn sources(&self) -> &ConnectorRegistry {
        &self.sources
    }

    pub fn discover_sources(&self) -> Vec<String> {
        self.sources.names()
    }

    pub fn list_metrics(&self) -> Vec<String> {
        self.metrics.list_all()
    }

    fn connector(&self, name: &str) -> Result<Arc<dyn Connector>, AgentError> {
        self.sources
            .get(name)
            .ok_or_else(|| AgentError::UnknownConnector {
                name: name.to_string(),
                available: self.sources.names(),
            })
    }

    async fn run(
        &self,
        connector: &dyn Connector,
        sql: &str,
        dialect: &str,
    ) -> Result<Vec<Row>, AgentError> {
        let backend = |e: sqlgate_connect::ConnectorError| AgentError::Backend {
            message: e.to_string(),
            sql: Some(sql.to_string()),
        };

        let stream = connector.execute(sql, dialect, true).await.map_err(backend)?;
        let rows = collect_rows(stream).await.map_err(backend)?;

        debug!(connector = connector.name(), rows = rows.len(), "execution complete");
        Ok(rows)
    }

    /// Evaluate a named KPI without involving the model.
    ///
    /// Runs on the metric's declared connector, else the warehouse, else the
    /// first connector registered.
    pub async fn calc_kpi(&self, metric: &str) -> Result<Vec<Row>, AgentError> {
        let definition = self.metrics.require(metric)?;
        let sql = definition.to_sql();

        let connector = match &definition.connector {
            Some(name) => self.connector(name)?,
            None => self
                .sources
                .default_connector()
                .ok_or(AgentError::NoConnectors)?,
        };

        info!(metric, connector = connector.name(), sql = %sql, "calculating KPI");
        let dialect = connector.capabilities().dialect;
        self.run(connector.as_ref(), &sql, &dialect).await
    }

    /// Caller-supplied SQL, executed as-is. No generation and no guardrails.
    pub async fn query(
        &self,
        source: &str,
        sql: &str,
        dialect: Option<&str>,
    ) -> Result<Vec<Row>, AgentError> {
        let connector = self.connector(source)?;
        let dialect = match dialect {
            Some(d) => d.to_string(),
            None => connector.capabilities().dialect,
        };

        info!(source, dialect = %dialect, "pass-through query");
        self.run(connector.as_ref(), sql, &dialect).await
    }

    /// Mount `uri` as view `name` on the first registration-capable connector
    pub async fn register_table(
        &self,
        name: &str,
        uri: &str,
        format: TableFormat,
    ) -> Result<TableInfo, AgentError> {
        let connector = self
            .sources
            .catalog_connector()
            .ok_or(AgentError::RegistrationUnsupported)?;
        let catalog = connector
            .catalog()
            .ok_or(AgentError::RegistrationUnsupported)?;

        catalog
            .register(name, uri, format)
            .await
            .map_err(|e| AgentError::Registration(e.to_string()))
    }

    /// Answer a question against the fixed warehouse schema
    pub async fn ask(&self, question: &str) -> Result<Answer, AgentError> {
        let connector = self
            .sources
            .default_connector()
            .ok_or(AgentError::NoConnectors)?;

        let table = self.fixed.table.as_str();
        let prompt = self
            .prompts
            .warehouse
            .render(table, &self.fixed.ddl, question);

        self.generate_and_run(
            prompt,
            GuardrailPolicy::fixed_schema(table),
            connector.as_ref(),
        )
        .await
    }

    /// Answer a question against a previously registered table
    pub async fn ask_table(&self, table: &str, question: &str) -> Result<Answer, AgentError> {
        let connector = self
            .sources
            .catalog_connector()
            .ok_or(AgentError::RegistrationUnsupported)?;
        let catalog = connector
            .catalog()
            .ok_or(AgentError::RegistrationUnsupported)?;

        let columns = catalog
            .get_schema(table)
            .await
            .map_err(|e| AgentError::UnknownTable {
                table: table.to_string(),
                reason: e.to_string(),
            })?;

        let ddl = table_ddl(table, &columns);
        let prompt = self.prompts.embedded.render(table, &ddl, question);

        self.generate_and_run(
            prompt,
            GuardrailPolicy::registered_table(table),
            connector.as_ref(),
        )
        .await
    }

    async fn generate_and_run(
        &self,
        prompt: Prompt,
        policy: GuardrailPolicy,
        connector: &dyn Connector,
    ) -> Result<Answer, AgentError> {
        let raw = self.model.complete(&prompt).await?;
        let sql = sanitize(&raw);
        debug!(sql = %sql, "sanitized candidate");

        if let Err(violation) = policy.evaluate(&sql) {
            warn!(reason = violation.reason(), sql = %sql, "guardrail rejected candidate");
            return Err(AgentError::Guardrail { violation, sql });
        }

        let dialect = connector.capabilities().dialect;
        let rows = self.run(connector, &sql, &dialect).await?;

        info!(connector = connector.name(), rows = rows.len(), sql = %sql, "answered");
        Ok(Answer { sql, rows })
    }
}
