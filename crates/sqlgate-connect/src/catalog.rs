//! Runtime table registration

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ConnectorError;

/// One column of a registered table, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Result of a successful registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub uri: String,
    pub format: TableFormat,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    Parquet,
    Csv,
    Json,
    #[default]
    Auto,
}

impl TableFormat {
    /// Concrete read strategy; `Auto` is decided by the URI's extension.
    ///
    /// Unrecognized extensions fall back to CSV.
    pub fn resolve(self, uri: &str) -> TableFormat {
        if self != TableFormat::Auto {
            return self;
        }

        let lower = uri.to_lowercase();
        if lower.ends_with(".parquet") || lower.ends_with(".parq") {
            TableFormat::Parquet
        } else if lower.ends_with(".json") {
            TableFormat::Json
        } else {
            TableFormat::Csv
        }
    }

    /// DuckDB table function reading `uri` with this format.
    ///
    /// The URI is interpolated as a string literal. URIs come from operators,
    /// not end users.
    pub fn scan_expr(self, uri: &str) -> String {
        let literal = uri.replace('\'', "''");
        match self.resolve(uri) {
            TableFormat::Parquet => format!("parquet_scan('{}')", literal),
            TableFormat::Json => format!("read_json_auto('{}')", literal),
            TableFormat::Csv | TableFormat::Auto => format!("read_csv_auto('{}')", literal),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TableFormat::Parquet => "parquet",
            TableFormat::Csv => "csv",
            TableFormat::Json => "json",
            TableFormat::Auto => "auto",
        }
    }

    pub fn all() -> [TableFormat; 4] {
        [
            TableFormat::Parquet,
            TableFormat::Csv,
            TableFormat::Json,
            TableFormat::Auto,
        ]
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableFormat {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "parquet" => Ok(TableFormat::Parquet),
            "csv" => Ok(TableFormat::Csv),
            "json" => Ok(TableFormat::Json),
            "auto" | "" => Ok(TableFormat::Auto),
            other => Err(ConnectorError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Quote an identifier for DuckDB, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Backends that can mount external objects as named views
#[async_trait]
pub trait TableCatalog: Send + Sync {
    /// Create or replace the view `name` over `uri`.
    ///
    /// Re-registering a name replaces the previous view; the returned schema
    /// always describes the new source.
    async fn register(
        &self,
        name: &str,
        uri: &str,
        format: TableFormat,
    ) -> Result<TableInfo, ConnectorError>;

    /// Column names and types of a registered view, introspected live
    async fn get_schema(&self, name: &str) -> Result<Vec<ColumnInfo>, ConnectorError>;
}
