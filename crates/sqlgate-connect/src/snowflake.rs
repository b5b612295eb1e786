//! Snowflake warehouse connector
//!
//! Statements go through the Snowflake SQL API (`/api/v2/statements`).
//! Long-running statements answer `202 Accepted` and are polled by handle.
//! Results arrive in partitions; the first comes with the submit response and
//! the rest are fetched as the row stream is consumed.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::{
    collect_rows, Capabilities, Connector, ConnectorError, ConnectorKind, Discovery, Row,
    RowStream,
};

#[derive(Debug, Clone)]
pub struct SnowflakeConfig {
    pub name: String,
    /// Account identifier, e.g. `xy12345.us-east-1`
    pub account: String,
    pub database: String,
    pub schema: String,
    pub warehouse: String,
    pub role: Option<String>,
    /// Bearer token (OAuth, key-pair JWT or programmatic access token)
    pub token: String,
    /// Value of `X-Snowflake-Authorization-Token-Type`
    pub token_type: String,
    /// Overrides `https://<account>.snowflakecomputing.com`
    pub base_url: Option<String>,
    /// Server-side statement timeout in seconds
    pub statement_timeout_secs: u64,
    pub poll_interval: Duration,
}

impl Default for SnowflakeConfig {
    fn default() -> Self {
        Self {
            name: "snowflake".to_string(),
            account: String::new(),
            database: String::new(),
            schema: String::new(),
            warehouse: String::new(),
            role: None,
            token: String::new(),
            token_type: "OAUTH".to_string(),
            base_url: None,
            statement_timeout_secs: 300,
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl SnowflakeConfig {
    fn endpoint(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.snowflakecomputing.com", self.account),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSet {
    statement_handle: String,
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

/// Body of a `?partition=N` fetch; only the rows are sent
#[derive(Debug, Clone, Deserialize)]
struct Partition {
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<ColumnType>,
    #[serde(default)]
    partition_info: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct ColumnType {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    scale: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementStatus {
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

enum Submitted {
    Done(ResultSet),
    Pending(String),
}

/// Shared HTTP state; cloned into lazily-fetched partition futures
struct SnowflakeClient {
    http: reqwest::Client,
    config: SnowflakeConfig,
}

impl SnowflakeClient {
    fn statements_url(&self) -> String {
        format!("{}/api/v2/statements", self.config.endpoint())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.config.token)
            .header("X-Snowflake-Authorization-Token-Type", &self.config.token_type)
            .header("Accept", "application/json")
    }

    async fn submit(&self, sql: &str) -> Result<ResultSet, ConnectorError> {
        let mut body = json!({
            "statement": sql,
            "timeout": self.config.statement_timeout_secs,
            "database": self.config.database,
            "schema": self.config.schema,
            "warehouse": self.config.warehouse,
        });
        if let Some(role) = &self.config.role {
            body["role"] = Value::String(role.clone());
        }

        let response = self
            .authorize(self.http.post(self.statements_url()))
            .json(&body)
            .send()
            .await?;

        let mut handle = match read_submission(response).await? {
            Submitted::Done(result) => return Ok(result),
            Submitted::Pending(handle) => handle,
        };

        loop {
            debug!(statement_handle = %handle, "statement still running");
            tokio::time::sleep(self.config.poll_interval).await;

            let response = self
                .authorize(self.http.get(format!("{}/{}", self.statements_url(), handle)))
                .send()
                .await?;
            match read_submission(response).await? {
                Submitted::Done(result) => return Ok(result),
                Submitted::Pending(next) => handle = next,
            }
        }
    }

    async fn fetch_partition(
        &self,
        handle: &str,
        partition: usize,
    ) -> Result<Vec<Vec<Option<String>>>, ConnectorError> {
        let response = self
            .authorize(self.http.get(format!("{}/{}", self.statements_url(), handle)))
            .query(&[("partition", partition)])
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::OK => response
                .json::<Partition>()
                .await
                .map(|p| p.data)
                .map_err(|e| ConnectorError::Protocol(e.to_string())),
            StatusCode::ACCEPTED => Err(ConnectorError::Protocol(format!(
                "partition {} of statement {} is not ready",
                partition, handle
            ))),
            _ => Err(api_error(status, response).await),
        }
    }
}

async fn read_submission(response: reqwest::Response) -> Result<Submitted, ConnectorError> {
    let status = response.status();
    match status {
        StatusCode::OK => {
            let result = response
                .json::<ResultSet>()
                .await
                .map_err(|e| ConnectorError::Protocol(e.to_string()))?;
            Ok(Submitted::Done(result))
        }
        StatusCode::ACCEPTED => {
            let pending = response
                .json::<StatementStatus>()
                .await
                .map_err(|e| ConnectorError::Protocol(e.to_string()))?;
            pending
                .statement_handle
                .map(Submitted::Pending)
                .ok_or_else(|| {
                    ConnectorError::Protocol("202 response without statementHandle".to_string())
                })
        }
        _ => Err(api_error(status, response).await),
    }
}

async fn api_error(status: StatusCode, response: reqwest::Response) -> ConnectorError {
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<StatementStatus>(&body)
        .ok()
        .and_then(|s| s.message)
        .unwrap_or(body);
    ConnectorError::Api {
        status: status.as_u16(),
        message,
    }
}

pub struct SnowflakeConnector {
    client: Arc<SnowflakeClient>,
}

impl SnowflakeConnector {
    pub fn new(config: SnowflakeConfig) -> Result<Self, ConnectorError> {
        if config.token.is_empty() {
            return Err(ConnectorError::Config(
                "Snowflake token is empty (set SNOWFLAKE_TOKEN)".to_string(),
            ));
        }
        if config.base_url.is_none() && config.account.is_empty() {
            return Err(ConnectorError::Config(
                "Snowflake account is empty (set SNOWFLAKE_ACCOUNT)".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("sqlgate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        info!(
            connector = %config.name,
            endpoint = %config.endpoint(),
            database = %config.database,
            schema = %config.schema,
            "Snowflake connector ready"
        );

        Ok(Self {
            client: Arc::new(SnowflakeClient { http, config }),
        })
    }
}

#[async_trait]
impl Connector for SnowflakeConnector {
    fn name(&self) -> &str {
        &self.client.config.name
    }

    fn version(&self) -> &str {
        "1.0"
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
        let sql = "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
                   WHERE TABLE_SCHEMA = CURRENT_SCHEMA() ORDER BY TABLE_NAME";
        let rows = collect_rows(self.execute(sql, "snowflake", false).await?).await?;
        let tables = rows
            .iter()
            .filter_map(|row| row.get("TABLE_NAME").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        Ok(Discovery { tables })
    }

    async fn execute(
        &self,
        query: &str,
        dialect: &str,
        stream: bool,
    ) -> Result<RowStream, ConnectorError> {
        debug!(connector = %self.name(), dialect, sql = query, "executing");

        let result = self.client.submit(query).await?;
        let meta = result.result_set_meta_data.ok_or_else(|| {
            ConnectorError::Protocol("result without resultSetMetaData".to_string())
        })?;
        let columns = Arc::new(meta.row_type);
        let partitions = meta.partition_info.len().max(1);

        debug!(
            statement_handle = %result.statement_handle,
            partitions,
            "statement complete"
        );

        let first = rows_from(&columns, result.data);
        let head = stream::iter(first.into_iter().map(Ok::<Row, ConnectorError>));

        let client = Arc::clone(&self.client);
        let handle = result.statement_handle;
        let tail = stream::iter(1..partitions)
            .then(move |partition| {
                let client = Arc::clone(&client);
                let handle = handle.clone();
                let columns = Arc::clone(&columns);
                async move {
                    let data = client.fetch_partition(&handle, partition).await?;
                    Ok::<_, ConnectorError>(stream::iter(
                        rows_from(&columns, data).into_iter().map(Ok::<Row, ConnectorError>),
                    ))
                }
            })
            .try_flatten();

        let rows: RowStream = head.chain(tail).boxed();
        if stream {
            Ok(rows)
        } else {
            let all = collect_rows(rows).await?;
            Ok(stream::iter(all.into_iter().map(Ok)).boxed())
        }
    }
}

fn rows_from(columns: &[ColumnType], data: Vec<Vec<Option<String>>>) -> Vec<Row> {
    data.into_iter()
        .map(|cells| {
            let record: Map<String, Value> = columns
                .iter()
                .zip(cells)
                .map(|(col, cell)| (col.name.clone(), convert_cell(col, cell)))
                .collect();
            Row::new(record)
        })
        .collect()
}

/// Decode one string-encoded cell using its declared column type
fn convert_cell(column: &ColumnType, cell: Option<String>) -> Value {
    let Some(text) = cell else {
        return Value::Null;
    };

    match column.kind.to_lowercase().as_str() {
        "fixed" if column.scale.unwrap_or(0) == 0 => text
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::String(text)),
        "fixed" | "real" => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::String(text)),
        "boolean" => match text.as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::String(text),
        },
        // Days since the epoch
        "date" => text
            .parse::<i64>()
            .ok()
            .and_then(|days| days.checked_mul(86_400))
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|dt| Value::String(dt.date_naive().to_string()))
            .unwrap_or(Value::String(text)),
        // Seconds since the epoch with a fractional part
        "timestamp_ntz" | "timestamp_ltz" => parse_epoch_seconds(&text)
            .map(|dt| Value::String(dt.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::String(text)),
        _ => Value::String(text),
    }
}

fn parse_epoch_seconds(text: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let (secs, frac) = text.split_once('.').unwrap_or((text, "0"));
    let negative = secs.starts_with('-');
    let secs = secs.parse::<i64>().ok()?;
    let nanos = format!("{:0<9}", frac).get(..9)?.parse::<u32>().ok()?;
    // The fraction carries the sign of the whole value
    if negative && nanos > 0 {
        chrono::DateTime::from_timestamp(secs.checked_sub(1)?, 1_000_000_000 - nanos)
    } else {
        chrono::DateTime::from_timestamp(secs, nanos)
    }
}
