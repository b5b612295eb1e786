//! KPI metric registry
//!
//! Static mapping from metric name to a pre-defined SQL fragment. Nothing is
//! validated at registration time; a malformed expression surfaces only when
//! the generated SQL reaches a connector.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),
}

/// A named KPI definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    /// Aggregate expression, e.g. `SUM(price * qty)`
    pub expr: String,
    /// Reporting grain; informational only
    #[serde(default)]
    pub grain: String,
    /// Boolean SQL predicate; empty means unfiltered
    #[serde(default)]
    pub filters: String,
    /// Relation the expression is evaluated against
    pub source: String,
    /// Connector that should run the metric, when it is not the default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
}

impl MetricDefinition {
    /// Deterministic KPI query for this metric
    pub fn to_sql(&self) -> String {
        let filters = self.filters.trim();
        if filters.is_empty() {
            format!("SELECT {} AS VALUE FROM {}", self.expr, self.source)
        } else {
            format!(
                "SELECT {} AS VALUE FROM {} WHERE {}",
                self.expr, self.source, filters
            )
        }
    }
}

pub struct MetricRegistry {
    // Insertion order is the listing order
    metrics: Vec<MetricDefinition>,
}

impl MetricRegistry {
    /// Empty registry with no built-ins
    pub fn empty() -> Self {
        Self {
            metrics: Vec::new(),
        }
    }

    /// Registry seeded with the built-in metrics
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    /// Built-ins followed by `extra`, in order
    pub fn with_definitions(extra: impl IntoIterator<Item = MetricDefinition>) -> Self {
        let mut registry = Self::new();
        for metric in extra {
            registry.register(metric);
        }
        registry
    }

    fn register_builtins(&mut self) {
        self.register(MetricDefinition {
            name: "net_revenue".to_string(),
            expr: "SUM(price * qty) - SUM(discount)".to_string(),
            grain: "order_day".to_string(),
            filters: "status = 'ClosedWon'".to_string(),
            source: "snowflake.sales_orders".to_string(),
            connector: None,
        });
    }

    /// Add a metric; a definition with an existing name replaces it in place
    pub fn register(&mut self, metric: MetricDefinition) {
        match self.metrics.iter_mut().find(|m| m.name == metric.name) {
            Some(existing) => *existing = metric,
            None => self.metrics.push(metric),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&MetricDefinition> {
        self.metrics.iter().find(|m| m.name == name)
    }

    /// Like [`resolve`](Self::resolve), but absent names are an error
    pub fn require(&self, name: &str) -> Result<&MetricDefinition, MetricError> {
        self.resolve(name)
            .ok_or_else(|| MetricError::UnknownMetric(name.to_string()))
    }

    /// Metric names in insertion order
    pub fn list_all(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.name.clone()).collect()
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}
