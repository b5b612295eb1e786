//! Connector registry owned by the agent
//!
//! Built once at startup and shared by handle; lookups never mutate it.

use sqlgate_connect::{Connector, ConnectorKind};
use std::sync::Arc;

#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    // Registration order decides the "first available" fallback
    connectors: Vec<Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connector; one with the same name is replaced in place
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        match self
            .connectors
            .iter_mut()
            .find(|c| c.name() == connector.name())
        {
            Some(existing) => *existing = connector,
            None => self.connectors.push(connector),
        }
    }

    pub fn with(mut self, connector: Arc<dyn Connector>) -> Self {
        self.register(connector);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.iter().find(|c| c.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.connectors.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn first(&self) -> Option<Arc<dyn Connector>> {
        self.connectors.first().cloned()
    }

    pub fn first_of_kind(&self, kind: ConnectorKind) -> Option<Arc<dyn Connector>> {
        self.connectors.iter().find(|c| c.kind() == kind).cloned()
    }

    /// Warehouse if one is registered, otherwise the first connector
    pub fn default_connector(&self) -> Option<Arc<dyn Connector>> {
        self.first_of_kind(ConnectorKind::Warehouse)
            .or_else(|| self.first())
    }

    /// First connector that supports table registration
    pub fn catalog_connector(&self) -> Option<Arc<dyn Connector>> {
        self.connectors
            .iter()
            .find(|c| c.catalog().is_some())
            .cloned()
    }
}
