// crates/mongodb-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: In-memory document store with call counters.
// Purpose: Exercise the mediator, tools, guides, and transports without a server.
// Dependencies: mongodb-mcp, mongodb-mcp-config
// ============================================================================

//! ## Overview
//! [`FakeStore`] serves canned documents per database and collection and
//! counts every driver-facing call, so tests can assert that denied requests
//! never reach the store. [`FakeConnector`] hands out a shared store and
//! counts connections.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use mongodb_mcp::AccessMediator;
use mongodb_mcp::DatabaseHandle;
use mongodb_mcp::DatabaseInfo;
use mongodb_mcp::DocumentStore;
use mongodb_mcp::FindQuery;
use mongodb_mcp::StoreConnector;
use mongodb_mcp::StoreError;
use mongodb_mcp::ToolOutcome;
use mongodb_mcp::ToolRouter;
use mongodb_mcp_config::AccessPolicy;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Counters
// ============================================================================

/// Call counters shared by a store and its handles.
#[derive(Debug, Default)]
pub struct Counters {
    pub list_databases: AtomicUsize,
    pub handles_opened: AtomicUsize,
    pub list_collections: AtomicUsize,
    pub finds: AtomicUsize,
    pub aggregates: AtomicUsize,
    pub closes: AtomicUsize,
}

impl Counters {
    /// Total calls that touched a database handle or opened one.
    pub fn database_touches(&self) -> usize {
        self.handles_opened.load(Ordering::SeqCst)
            + self.list_collections.load(Ordering::SeqCst)
            + self.finds.load(Ordering::SeqCst)
            + self.aggregates.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Fake Store
// ============================================================================

type Collections = BTreeMap<String, Vec<Value>>;

/// In-memory [`DocumentStore`].
#[derive(Default)]
pub struct FakeStore {
    databases: BTreeMap<String, Collections>,
    failing: BTreeMap<String, String>,
    list_error: Option<String>,
    pub counters: Arc<Counters>,
    pub finds: Arc<Mutex<Vec<(String, String, FindQuery)>>>,
    pub pipelines: Arc<Mutex<Vec<Vec<Map<String, Value>>>>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty database.
    pub fn with_database(mut self, database: &str) -> Self {
        self.databases.entry(database.to_string()).or_default();
        self
    }

    /// Adds a collection with documents.
    pub fn with_collection(mut self, database: &str, collection: &str, documents: Vec<Value>) -> Self {
        self.databases
            .entry(database.to_string())
            .or_default()
            .insert(collection.to_string(), documents);
        self
    }

    /// Makes every operation on `database` fail with `message`.
    pub fn with_failing_database(mut self, database: &str, message: &str) -> Self {
        self.databases.entry(database.to_string()).or_default();
        self.failing.insert(database.to_string(), message.to_string());
        self
    }

    /// Makes `list_databases` fail with `message`.
    pub fn with_list_error(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    pub fn recorded_finds(&self) -> Vec<(String, String, FindQuery)> {
        self.finds.lock().map(|finds| finds.clone()).unwrap_or_default()
    }

    pub fn recorded_pipelines(&self) -> Vec<Vec<Map<String, Value>>> {
        self.pipelines.lock().map(|pipelines| pipelines.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, StoreError> {
        self.counters.list_databases.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.list_error {
            return Err(StoreError::Driver(message.clone()));
        }
        Ok(self
            .databases
            .iter()
            .map(|(name, collections)| DatabaseInfo {
                name: name.clone(),
                size_on_disk: 4096 * collections.len() as u64,
                empty: collections.is_empty(),
            })
            .collect())
    }

    fn database(&self, name: &str) -> Arc<dyn DatabaseHandle> {
        self.counters.handles_opened.fetch_add(1, Ordering::SeqCst);
        Arc::new(FakeDatabase {
            name: name.to_string(),
            collections: self.databases.get(name).cloned().unwrap_or_default(),
            failure: self.failing.get(name).cloned(),
            counters: Arc::clone(&self.counters),
            finds: Arc::clone(&self.finds),
            pipelines: Arc::clone(&self.pipelines),
        })
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Handle over one fake database.
struct FakeDatabase {
    name: String,
    collections: Collections,
    failure: Option<String>,
    counters: Arc<Counters>,
    finds: Arc<Mutex<Vec<(String, String, FindQuery)>>>,
    pipelines: Arc<Mutex<Vec<Vec<Map<String, Value>>>>>,
}

impl FakeDatabase {
    fn check(&self) -> Result<(), StoreError> {
        match &self.failure {
            Some(message) => Err(StoreError::Driver(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DatabaseHandle for FakeDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        self.counters.list_collections.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.collections.keys().cloned().collect())
    }

    async fn find(&self, collection: &str, query: FindQuery) -> Result<Vec<Value>, StoreError> {
        self.counters.finds.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let limit = query.limit.and_then(|limit| usize::try_from(limit).ok()).filter(|limit| *limit > 0);
        if let Ok(mut finds) = self.finds.lock() {
            finds.push((self.name.clone(), collection.to_string(), query));
        }
        let documents = self.collections.get(collection).cloned().unwrap_or_default();
        Ok(match limit {
            Some(limit) => documents.into_iter().take(limit).collect(),
            None => documents,
        })
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Map<String, Value>>,
    ) -> Result<Vec<Value>, StoreError> {
        self.counters.aggregates.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        if let Ok(mut pipelines) = self.pipelines.lock() {
            pipelines.push(pipeline);
        }
        Ok(self.collections.get(collection).cloned().unwrap_or_default())
    }
}

// ============================================================================
// SECTION: Fake Connector
// ============================================================================

/// Connector returning a shared [`FakeStore`].
pub struct FakeConnector {
    pub store: Arc<FakeStore>,
    pub connects: AtomicUsize,
    fail_with: Option<String>,
}

impl FakeConnector {
    pub fn new(store: FakeStore) -> Self {
        Self {
            store: Arc::new(store),
            connects: AtomicUsize::new(0),
            fail_with: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            store: Arc::new(FakeStore::new()),
            connects: AtomicUsize::new(0),
            fail_with: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl StoreConnector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(message) => Err(StoreError::Connection(message.clone())),
            None => Ok(Arc::clone(&self.store) as Arc<dyn DocumentStore>),
        }
    }
}

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Store with the two databases the guides describe plus an extra one.
pub fn sample_store() -> FakeStore {
    FakeStore::new()
        .with_collection(
            "ADMirror",
            "data",
            vec![
                serde_json::json!({"cn": "Smith, John", "uid": "jsmith", "department": "Information Services"}),
                serde_json::json!({"cn": "Doe, Jane", "uid": "jdoe", "manager": null}),
            ],
        )
        .with_collection(
            "lsf_research",
            "jobConfig",
            vec![
                serde_json::json!({"jobId": 1, "user": "jsmith", "gpus": 2, "tags": ["a100"]}),
                serde_json::json!({"jobId": 2, "user": "jdoe", "gpus": 0, "queue": "short"}),
            ],
        )
        .with_database("secret_hr")
}

/// Policy from raw `ALLOWED_DB_NAME` / `DISALLOWED_DB_NAME` strings.
pub fn policy(allowed: &str, disallowed: &str) -> Arc<AccessPolicy> {
    Arc::new(AccessPolicy::from_raw(Some(allowed), Some(disallowed)))
}

/// Router over `store` with `policy`.
pub fn router(store: Arc<FakeStore>, policy: Arc<AccessPolicy>) -> ToolRouter {
    ToolRouter::new(AccessMediator::new(policy, store))
}

/// Parses the JSON text of the first content block.
pub fn outcome_json(outcome: &ToolOutcome) -> Value {
    outcome
        .first_text()
        .and_then(|text| serde_json::from_str(text).ok())
        .unwrap_or(Value::Null)
}
