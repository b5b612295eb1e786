//! Connectors: one async interface over every queryable backend
//!
//! A [`Connector`] reports its capabilities, lists the tables it knows about,
//! and runs SQL in its own dialect, yielding a lazy [`RowStream`]. Backends
//! that can mount external objects as views also expose a [`TableCatalog`].
//!
//! Two backends ship here:
//! - [`DuckDbConnector`]: embedded engine reading Parquet/CSV/JSON from object storage
//! - [`SnowflakeConnector`]: cloud warehouse driven through its SQL REST API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

mod catalog;
mod duck;
mod error;
mod row;
mod snowflake;

pub use catalog::{quote_ident, ColumnInfo, TableCatalog, TableFormat, TableInfo};
pub use duck::{DuckDbConfig, DuckDbConnector, S3Credentials};
pub use error::ConnectorError;
pub use row::{collect_rows, Row, RowStream};
pub use snowflake::{SnowflakeConfig, SnowflakeConnector};

/// Broad family of a backend; drives default connector selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    Warehouse,
    Embedded,
}

/// Static capability descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub dialect: String,
    pub streaming: bool,
    pub formats: BTreeSet<String>,
}

/// Tables currently visible through a connector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
    pub tables: Vec<String>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Registry key, e.g. `snowflake` or `s3`
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn kind(&self) -> ConnectorKind;

    fn capabilities(&self) -> Capabilities;

    /// List known tables. Backends with a live catalog report that catalog.
    async fn discover(&self) -> Result<Discovery, ConnectorError>;

    /// Run `query` and return its rows as a lazy, finite, single-pass stream.
    ///
    /// Failures before the first row are returned directly. A failure while
    /// the stream is consumed arrives as an `Err` item; use [`collect_rows`]
    /// to materialize all rows or none.
    async fn execute(
        &self,
        query: &str,
        dialect: &str,
        stream: bool,
    ) -> Result<RowStream, ConnectorError>;

    /// Table registration support, if the backend has it
    fn catalog(&self) -> Option<&dyn TableCatalog> {
        None
    }
}
