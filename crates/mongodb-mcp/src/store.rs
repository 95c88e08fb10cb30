// crates/mongodb-mcp/src/store.rs
// ============================================================================
// Module: Document Store Boundary
// Description: Driver-facing traits consumed by the tool layer.
// Purpose: Keep tools and the access mediator independent of the driver.
// Dependencies: async-trait, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The tool layer never talks to the MongoDB driver directly. It sees a
//! [`DocumentStore`] (server-level operations plus database handles), a
//! [`DatabaseHandle`] scoped to one database, and a [`StoreConnector`] that
//! opens stores. Documents cross this boundary as relaxed Extended JSON
//! values. [`crate::mongo`] provides the driver-backed implementation.
//!
//! ## Invariants
//! - Handles perform no existence checks beyond what the driver does.
//! - Connection lifecycle belongs to the connector's caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Summary entry returned by `listDatabases`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    /// Database name.
    pub name: String,
    /// Size on disk in bytes.
    pub size_on_disk: u64,
    /// Whether the database holds no data.
    pub empty: bool,
}

/// Parameters for a `find` against one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    /// Query filter (empty matches every document).
    pub filter: Map<String, Value>,
    /// Optional field projection.
    pub projection: Option<Map<String, Value>>,
    /// Optional sort specification.
    pub sort: Option<Map<String, Value>>,
    /// Optional maximum number of documents.
    pub limit: Option<i64>,
}

impl FindQuery {
    /// Unfiltered query returning at most `limit` documents.
    #[must_use]
    pub fn sample(limit: i64) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

// ============================================================================
// SECTION: Traits
// ============================================================================

/// Server-level view of the document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Lists databases visible to the connection.
    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, StoreError>;

    /// Returns a handle scoped to `name`.
    fn database(&self, name: &str) -> Arc<dyn DatabaseHandle>;

    /// Releases the underlying connection. The default does nothing.
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Database-scoped operations.
#[async_trait]
pub trait DatabaseHandle: Send + Sync {
    /// Name of the database this handle addresses.
    fn name(&self) -> &str;

    /// Lists collection names.
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    /// Runs a `find` and collects every returned document.
    async fn find(&self, collection: &str, query: FindQuery) -> Result<Vec<Value>, StoreError>;

    /// Runs an aggregation pipeline and collects every returned document.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Map<String, Value>>,
    ) -> Result<Vec<Value>, StoreError>;
}

/// Opens document stores.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Opens a connected store.
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>, StoreError>;
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Driver boundary errors. Display is the bare driver message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Connecting to the server failed.
    #[error("{0}")]
    Connection(String),
    /// The driver rejected or failed an operation.
    #[error("{0}")]
    Driver(String),
    /// Caller-supplied input could not be converted for the driver.
    #[error("{0}")]
    InvalidInput(String),
}
