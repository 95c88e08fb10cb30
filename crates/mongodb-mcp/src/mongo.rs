// crates/mongodb-mcp/src/mongo.rs
// ============================================================================
// Module: MongoDB Driver Adapter
// Description: DocumentStore implementation over the official MongoDB driver.
// Purpose: Translate boundary calls into driver operations and BSON <-> JSON.
// Dependencies: mongodb, futures-util, async-trait
// ============================================================================

//! ## Overview
//! [`MongoConnector`] opens a [`MongoStore`] per call. The driver client is
//! lazy, so `connect` issues a `ping` to surface bad URIs and unreachable
//! servers at connection time. Inputs arrive as Extended JSON objects (so
//! `{"$oid": ...}` and `{"$date": ...}` work in filters); outputs are relaxed
//! Extended JSON.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::Client;
use mongodb::Database;
use mongodb::bson::Bson;
use mongodb::bson::Document;
use mongodb::bson::doc;
use serde_json::Map;
use serde_json::Value;

use crate::store::DatabaseHandle;
use crate::store::DatabaseInfo;
use crate::store::DocumentStore;
use crate::store::FindQuery;
use crate::store::StoreConnector;
use crate::store::StoreError;

// ============================================================================
// SECTION: Connector
// ============================================================================

/// Opens MongoDB connections from a connection string.
#[derive(Clone)]
pub struct MongoConnector {
    /// MongoDB connection string.
    uri: String,
}

impl MongoConnector {
    /// Creates a connector for `uri`.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
        }
    }
}

#[async_trait]
impl StoreConnector for MongoConnector {
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        let store = MongoStore::connect(&self.uri).await?;
        Ok(Arc::new(store))
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Connected MongoDB client.
pub struct MongoStore {
    /// Driver client (internally pooled).
    client: Client,
}

impl MongoStore {
    /// Connects to `uri` and verifies the server answers a `ping`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] when the URI is invalid or the
    /// server cannot be reached.
    pub async fn connect(uri: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))?;
        Ok(Self {
            client,
        })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, StoreError> {
        let specs = self.client.list_databases().await.map_err(driver_error)?;
        Ok(specs
            .into_iter()
            .map(|spec| DatabaseInfo {
                name: spec.name,
                size_on_disk: spec.size_on_disk,
                empty: spec.empty,
            })
            .collect())
    }

    fn database(&self, name: &str) -> Arc<dyn DatabaseHandle> {
        Arc::new(MongoDatabase {
            name: name.to_string(),
            db: self.client.database(name),
        })
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

// ============================================================================
// SECTION: Database Handle
// ============================================================================

/// Handle scoped to one MongoDB database.
struct MongoDatabase {
    /// Database name.
    name: String,
    /// Driver database handle.
    db: Database,
}

#[async_trait]
impl DatabaseHandle for MongoDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        self.db.list_collection_names().await.map_err(driver_error)
    }

    async fn find(&self, collection: &str, query: FindQuery) -> Result<Vec<Value>, StoreError> {
        let collection = self.db.collection::<Document>(collection);
        let mut find = collection.find(to_document(query.filter)?);
        if let Some(projection) = query.projection {
            find = find.projection(to_document(projection)?);
        }
        if let Some(sort) = query.sort {
            find = find.sort(to_document(sort)?);
        }
        if let Some(limit) = query.limit {
            find = find.limit(limit);
        }
        let cursor = find.await.map_err(driver_error)?;
        let documents: Vec<Document> = cursor.try_collect().await.map_err(driver_error)?;
        Ok(documents.into_iter().map(document_to_json).collect())
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Map<String, Value>>,
    ) -> Result<Vec<Value>, StoreError> {
        let stages = pipeline.into_iter().map(to_document).collect::<Result<Vec<_>, _>>()?;
        let collection = self.db.collection::<Document>(collection);
        let cursor = collection.aggregate(stages).await.map_err(driver_error)?;
        let documents: Vec<Document> = cursor.try_collect().await.map_err(driver_error)?;
        Ok(documents.into_iter().map(document_to_json).collect())
    }
}

// ============================================================================
// SECTION: Conversions
// ============================================================================

/// Parses an Extended JSON object into a BSON document.
fn to_document(map: Map<String, Value>) -> Result<Document, StoreError> {
    Document::try_from(map).map_err(|err| StoreError::InvalidInput(err.to_string()))
}

/// Renders a BSON document as relaxed Extended JSON.
fn document_to_json(document: Document) -> Value {
    Bson::Document(document).into_relaxed_extjson()
}

#[allow(clippy::needless_pass_by_value, reason = "Used as a map_err adapter.")]
fn driver_error(err: mongodb::error::Error) -> StoreError {
    StoreError::Driver(err.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
