//! Embedded DuckDB connector over object storage
//!
//! Objects in S3 (or any path DuckDB can read) are mounted as views with
//! [`TableCatalog::register`] and then queried like ordinary tables.

use async_trait::async_trait;
use duckdb::types::{TimeUnit, ValueRef};
use duckdb::Connection;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::catalog::{quote_ident, ColumnInfo, TableCatalog, TableFormat, TableInfo};
use crate::{Capabilities, Connector, ConnectorError, ConnectorKind, Discovery, Row, RowStream};

/// S3 credentials; all optional so public objects work without them
#[derive(Debug, Clone, Default)]
pub struct S3Credentials {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub region: Option<String>,
}

impl S3Credentials {
    /// Read the standard AWS environment variables
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            access_key_id: var("AWS_ACCESS_KEY_ID"),
            secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            session_token: var("AWS_SESSION_TOKEN"),
            region: var("AWS_DEFAULT_REGION").or_else(|| var("AWS_REGION")),
        }
    }

    fn settings(&self) -> Vec<(&'static str, &str)> {
        let mut settings = Vec::new();
        if let (Some(key), Some(secret)) = (&self.access_key_id, &self.secret_access_key) {
            settings.push(("s3_access_key_id", key.as_str()));
            settings.push(("s3_secret_access_key", secret.as_str()));
        }
        if let Some(token) = &self.session_token {
            settings.push(("s3_session_token", token.as_str()));
        }
        if let Some(region) = &self.region {
            settings.push(("s3_region", region.as_str()));
        }
        settings
    }
}

#[derive(Debug, Clone)]
pub struct DuckDbConfig {
    pub name: String,
    /// Install and load the httpfs extension (needed for s3:// and https:// URIs)
    pub load_httpfs: bool,
    pub credentials: S3Credentials,
}

impl Default for DuckDbConfig {
    fn default() -> Self {
        Self {
            name: "s3".to_string(),
            load_httpfs: true,
            credentials: S3Credentials::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct Registration {
    name: String,
    uri: String,
    format: TableFormat,
}

/// Connection plus the views registered on it.
///
/// Both live under one lock so a registration is observed all at once.
struct DuckState {
    conn: Connection,
    tables: Vec<Registration>,
}

pub struct DuckDbConnector {
    name: String,
    state: Arc<Mutex<DuckState>>,
}

impl DuckDbConnector {
    /// Open an in-memory database configured for object-storage reads
    pub fn open(config: DuckDbConfig) -> Result<Self, ConnectorError> {
        let conn = Connection::open_in_memory()?;

        if config.load_httpfs {
            conn.execute_batch("INSTALL httpfs; LOAD httpfs;")?;
            debug!("httpfs extension loaded");
        }

        for (key, value) in config.credentials.settings() {
            conn.execute_batch(&format!("SET {}='{}';", key, value.replace('\'', "''")))?;
        }

        info!(connector = %config.name, httpfs = config.load_httpfs, "DuckDB connector ready");

        Ok(Self {
            name: config.name,
            state: Arc::new(Mutex::new(DuckState {
                conn,
                tables: Vec::new(),
            })),
        })
    }

    /// Run `f` against the locked state on the blocking pool
    async fn with_state<T, F>(&self, f: F) -> Result<T, ConnectorError>
    where
        T: Send + 'static,
        F: FnOnce(&mut DuckState) -> Result<T, ConnectorError> + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || {
            let mut guard = state
                .lock()
                .map_err(|_| ConnectorError::Internal("DuckDB state lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| ConnectorError::Internal(format!("DuckDB task failed: {}", e)))?
    }
}

#[async_trait]
impl Connector for DuckDbConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn kind(&self) -> ConnectorKind {
        ConnectorKind::Embedded
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            dialect: "duckdb".to_string(),
            streaming: false,
            formats: TableFormat::all()
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
        }
    }

    async fn discover(&self) -> Result<Discovery, ConnectorError> {
        self.with_state(|state| {
            Ok(Discovery {
                tables: state.tables.iter().map(|t| t.name.clone()).collect(),
            })
        })
        .await
    }

    async fn execute(
        &self,
        query: &str,
        dialect: &str,
        _stream: bool,
    ) -> Result<RowStream, ConnectorError> {
        debug!(connector = %self.name, dialect, sql = query, "executing");
        let sql = query.to_string();

        // The connection cannot leave the lock, so rows are read eagerly
        let rows = self.with_state(move |state| query_rows(&state.conn, &sql)).await?;
        Ok(stream::iter(rows.into_iter().map(Ok)).boxed())
    }

    fn catalog(&self) -> Option<&dyn TableCatalog> {
        Some(self)
    }
}

#[async_trait]
impl TableCatalog for DuckDbConnector {
    async fn register(
        &self,
        name: &str,
        uri: &str,
        format: TableFormat,
    ) -> Result<TableInfo, ConnectorError> {
        let registration = Registration {
            name: name.to_string(),
            uri: uri.to_string(),
            format,
        };

        let info = self
            .with_state(move |state| {
                let ddl = format!(
                    "CREATE OR REPLACE VIEW {} AS SELECT * FROM {}",
                    quote_ident(&registration.name),
                    registration.format.scan_expr(&registration.uri)
                );
                state.conn.execute_batch(&ddl)?;

                let columns = table_columns(&state.conn, &registration.name)?;
                let info = TableInfo {
                    name: registration.name.clone(),
                    uri: registration.uri.clone(),
                    format: registration.format,
                    columns,
                };

                match state.tables.iter_mut().find(|t| t.name == registration.name) {
                    Some(existing) => *existing = registration,
                    None => state.tables.push(registration),
                }
                Ok(info)
            })
            .await?;

        info!(
            connector = %self.name,
            table = %info.name,
            uri = %info.uri,
            format = %info.format,
            columns = info.columns.len(),
            "registered view"
        );
        Ok(info)
    }

    async fn get_schema(&self, name: &str) -> Result<Vec<ColumnInfo>, ConnectorError> {
        let name = name.to_string();
        self.with_state(move |state| table_columns(&state.conn, &name))
            .await
    }
}

/// Column metadata via `PRAGMA table_info` (cid, name, type, notnull, dflt_value, pk)
fn table_columns(conn: &Connection, name: &str) -> Result<Vec<ColumnInfo>, ConnectorError> {
    let unknown = |reason: String| ConnectorError::UnknownTable {
        name: name.to_string(),
        reason,
    };

    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote_ident(name)))
        .map_err(|e| unknown(e.to_string()))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                data_type: row.get(2)?,
            })
        })
        .map_err(|e| unknown(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| unknown(e.to_string()))?;

    if columns.is_empty() {
        return Err(unknown("no columns".to_string()));
    }
    Ok(columns)
}

fn query_rows(conn: &Connection, sql: &str) -> Result<Vec<Row>, ConnectorError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;

    let mut columns: Vec<String> = Vec::new();
    let mut out = Vec::new();

    while let Some(row) = rows.next()? {
        // Column names are only known once the statement has run
        if columns.is_empty() {
            let stmt = row.as_ref();
            for i in 0..stmt.column_count() {
                columns.push(stmt.column_name(i)?.to_string());
            }
        }

        let mut record = Map::new();
        for (i, col_name) in columns.iter().enumerate() {
            record.insert(col_name.clone(), value_to_json(row.get_ref(i)?));
        }
        out.push(Row::new(record));
    }

    debug!(rows = out.len(), "DuckDB query complete");
    Ok(out)
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::from(i),
        ValueRef::SmallInt(i) => Value::from(i),
        ValueRef::Int(i) => Value::from(i),
        ValueRef::BigInt(i) => Value::from(i),
        // SUM over integers yields HUGEINT
        ValueRef::HugeInt(i) => i64::try_from(i)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(i.to_string())),
        ValueRef::UTinyInt(i) => Value::from(i),
        ValueRef::USmallInt(i) => Value::from(i),
        ValueRef::UInt(i) => Value::from(i),
        ValueRef::UBigInt(i) => Value::from(i),
        ValueRef::Float(f) => Value::from(f64::from(f)),
        ValueRef::Double(f) => Value::from(f),
        ValueRef::Decimal(d) => Value::String(d.to_string()),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::String(format!("<blob {} bytes>", b.len())),
        ValueRef::Date32(days) => chrono::DateTime::from_timestamp(i64::from(days) * 86_400, 0)
            .map(|dt| Value::String(dt.date_naive().to_string()))
            .unwrap_or(Value::Null),
        ValueRef::Timestamp(unit, v) => {
            let micros = match unit {
                TimeUnit::Second => v.saturating_mul(1_000_000),
                TimeUnit::Millisecond => v.saturating_mul(1_000),
                TimeUnit::Microsecond => v,
                TimeUnit::Nanosecond => v / 1_000,
            };
            chrono::DateTime::from_timestamp_micros(micros)
                .map(|dt| Value::String(dt.to_rfc3339()))
                .unwrap_or(Value::Null)
        }
        _ => {
            warn!("unsupported DuckDB value type in result");
            Value::String("<unsupported>".to_string())
        }
    }
}
