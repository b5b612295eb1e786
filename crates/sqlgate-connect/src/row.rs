//! Result rows and row streams

use futures::stream::{BoxStream, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ConnectorError;

/// Lazy, finite, non-restartable sequence of rows
pub type RowStream = BoxStream<'static, Result<Row, ConnectorError>>;

/// One record, keyed by column name in result order.
///
/// Serializes as `{"row": {"COL": value, ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub row: Map<String, Value>,
}

impl Row {
    pub fn new(row: Map<String, Value>) -> Self {
        Self { row }
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            row: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.row.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.row.keys().map(String::as_str)
    }
}

/// Drain a stream into memory, failing on the first error
pub async fn collect_rows(stream: RowStream) -> Result<Vec<Row>, ConnectorError> {
    stream.try_collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, StreamExt};
    use serde_json::json;

    #[test]
    fn test_row_shape() {
        let row = Row::from_pairs([("X", json!(1)), ("A", json!("b"))]);
        assert_eq!(serde_json::to_value(&row).unwrap(), json!({"row": {"X": 1, "A": "b"}}));
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["X", "A"]);
    }

    #[tokio::test]
    async fn test_collect_is_all_or_nothing() {
        let ok: RowStream = stream::iter(vec![
            Ok(Row::from_pairs([("X", json!(1))])),
            Ok(Row::from_pairs([("X", json!(2))])),
        ])
        .boxed();
        assert_eq!(collect_rows(ok).await.unwrap().len(), 2);

        let failing: RowStream = stream::iter(vec![
            Ok(Row::from_pairs([("X", json!(1))])),
            Err(ConnectorError::Protocol("partition lost".to_string())),
        ])
        .boxed();
        let err = collect_rows(failing).await.unwrap_err();
        assert!(err.to_string().contains("partition lost"));
    }
}
