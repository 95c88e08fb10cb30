// crates/mongodb-mcp/src/tools.rs
// ============================================================================
// Module: MCP Tool Router
// Description: Tool catalog and dispatch for the MongoDB MCP server.
// Purpose: Decode tool arguments and route every database call through the mediator.
// Dependencies: serde, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`ToolRouter`] owns an [`AccessMediator`] and exposes the fixed tool set
//! named by [`ToolName`]. Database-scoped tools are single calls into
//! [`AccessMediator::with_access`]; `list_databases` filters the driver's list
//! with the same policy, and `search_resource` scans the embedded guides.
//!
//! ## Invariants
//! - Argument decoding failures surface as [`ToolError::InvalidParams`];
//!   everything after decoding surfaces as a [`ToolOutcome`].
//! - No tool touches a [`crate::store::DatabaseHandle`] except through the
//!   mediator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::access::AccessMediator;
use crate::access::ToolOutcome;
use crate::guides::SearchRequest;
use crate::guides::search_resources;
use crate::store::DatabaseInfo;
use crate::store::FindQuery;
use crate::store::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default `sampleSize` for `get_collection_schema`.
pub const DEFAULT_SCHEMA_SAMPLE_SIZE: i64 = 20;
/// Default `limit` for `sample_documents`.
pub const DEFAULT_SAMPLE_LIMIT: i64 = 5;
/// Default `limit` for `query`.
pub const DEFAULT_QUERY_LIMIT: i64 = 10;

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Canonical tool names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// List databases permitted by the access policy.
    ListDatabases,
    /// List collection names in one database.
    ListCollections,
    /// Infer top-level field types from sampled documents.
    GetCollectionSchema,
    /// Return a few raw documents.
    SampleDocuments,
    /// Run a find with filter, projection, sort, and limit.
    Query,
    /// Run an aggregation pipeline.
    Aggregation,
    /// Search the static guide resources.
    SearchResource,
}

impl ToolName {
    /// Returns the canonical tool name string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListDatabases => "list_databases",
            Self::ListCollections => "list_collections",
            Self::GetCollectionSchema => "get_collection_schema",
            Self::SampleDocuments => "sample_documents",
            Self::Query => "query",
            Self::Aggregation => "aggregation",
            Self::SearchResource => "search_resource",
        }
    }

    /// Returns every tool in listing order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ListDatabases,
            Self::ListCollections,
            Self::GetCollectionSchema,
            Self::SampleDocuments,
            Self::Query,
            Self::Aggregation,
            Self::SearchResource,
        ]
    }

    /// Parses a tool name string.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "list_databases" => Some(Self::ListDatabases),
            "list_collections" => Some(Self::ListCollections),
            "get_collection_schema" => Some(Self::GetCollectionSchema),
            "sample_documents" => Some(Self::SampleDocuments),
            "query" => Some(Self::Query),
            "aggregation" => Some(Self::Aggregation),
            "search_resource" => Some(Self::SearchResource),
            _ => None,
        }
    }

    /// Display title for tool listings.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::ListDatabases => "List Databases",
            Self::ListCollections => "List Collections",
            Self::GetCollectionSchema => "Get Collection Schema",
            Self::SampleDocuments => "Sample Documents",
            Self::Query => "Query Documents",
            Self::Aggregation => "Aggregation Pipeline",
            Self::SearchResource => "Search Resources",
        }
    }

    /// Description shown to clients.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ListDatabases => {
                "List all MongoDB databases. IMPORTANT: Before using any tools, read the \
                 'query_guide' resource for critical information about database structure and \
                 query patterns."
            }
            Self::ListCollections => {
                "List all MongoDB collections in the specified database. After seeing available \
                 databases, use this to discover what collections (tables) exist in a database. \
                 Then use get_collection_schema or sample_documents to understand the data \
                 structure."
            }
            Self::GetCollectionSchema => {
                "Infer the schema of a MongoDB collection by sampling documents. This examines \
                 multiple documents to determine field names and their types (string, number, \
                 array, object, etc.). Use this to understand what fields are available before \
                 writing queries. Increase sampleSize for more accurate schema inference on \
                 varied data."
            }
            Self::SampleDocuments => {
                "Get sample documents from a MongoDB collection to see actual data examples. \
                 This returns real documents with their complete structure, which is helpful for \
                 understanding the data format, seeing nested objects, array contents, and \
                 actual values. Use this before writing complex queries to understand the data."
            }
            Self::Query => {
                "Query documents from a MongoDB collection. For GPU/cluster queries, use \
                 lsf_research database with jobConfig collection (see query_guide resource for \
                 field details and examples)."
            }
            Self::Aggregation => {
                "Run MongoDB aggregation for analytics and grouping. For 'most active GPU user' \
                 queries: use lsf_research.jobConfig with $match (filter GPU jobs), $group (by \
                 user), $sort, $limit. See query_guide resource for complete examples with \
                 current epoch timestamps."
            }
            Self::SearchResource => {
                "Search the 'reference' and 'guide' resources for lines containing a string. \
                 Returns matching lines with 1-based line numbers for each resource searched."
            }
        }
    }

    /// JSON schema for the tool's arguments.
    #[must_use]
    pub fn input_schema(self) -> Value {
        let database = json!({"type": "string", "description": "The name of the database"});
        let collection = json!({"type": "string", "description": "The name of the collection"});
        match self {
            Self::ListDatabases => json!({"type": "object", "properties": {}}),
            Self::ListCollections => json!({
                "type": "object",
                "properties": {"database": database},
                "required": ["database"]
            }),
            Self::GetCollectionSchema => json!({
                "type": "object",
                "properties": {
                    "database": database,
                    "collection": collection,
                    "sampleSize": {
                        "type": "integer",
                        "default": DEFAULT_SCHEMA_SAMPLE_SIZE,
                        "description": "Number of documents to sample (default: 20, increase for more accuracy)"
                    }
                },
                "required": ["database", "collection"]
            }),
            Self::SampleDocuments => json!({
                "type": "object",
                "properties": {
                    "database": database,
                    "collection": collection,
                    "limit": {
                        "type": "integer",
                        "default": DEFAULT_SAMPLE_LIMIT,
                        "description": "Maximum number of documents to return (default: 5)"
                    }
                },
                "required": ["database", "collection"]
            }),
            Self::Query => json!({
                "type": "object",
                "properties": {
                    "database": database,
                    "collection": collection,
                    "filter": {
                        "type": "object",
                        "default": {},
                        "description": "MongoDB query filter object. Examples: {status: 'active'}, {age: {$gt: 18, $lt: 65}}, {tags: {$in: ['featured']}}, {email: {$exists: true}}, {'profile.verified': true}"
                    },
                    "projection": {
                        "type": "object",
                        "description": "Fields to include/exclude. Use 1 to include, 0 to exclude. Example: {name: 1, email: 1, _id: 0} returns only name and email fields"
                    },
                    "sort": {
                        "type": "object",
                        "additionalProperties": {"type": "number"},
                        "description": "Sort order. Use 1 for ascending, -1 for descending. Example: {createdAt: -1, name: 1} sorts by date descending, then name ascending"
                    },
                    "limit": {
                        "type": "integer",
                        "default": DEFAULT_QUERY_LIMIT,
                        "description": "Maximum number of documents to return (default: 10)"
                    }
                },
                "required": ["database", "collection"]
            }),
            Self::Aggregation => json!({
                "type": "object",
                "properties": {
                    "database": database,
                    "collection": collection,
                    "pipeline": {
                        "type": "array",
                        "items": {"type": "object"},
                        "description": "MongoDB aggregation pipeline array. Common stages: $match (filter), $group (aggregate), $sort, $limit, $project (reshape), $unwind (flatten arrays), $lookup (join). Example: [{$match: {status: 'active'}}, {$group: {_id: '$category', count: {$sum: 1}, avgPrice: {$avg: '$price'}}}, {$sort: {count: -1}}]"
                    }
                },
                "required": ["database", "collection", "pipeline"]
            }),
            Self::SearchResource => json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Text to search for"},
                    "caseSensitive": {"type": "boolean", "default": false},
                    "maxResults": {
                        "type": "integer",
                        "default": crate::guides::DEFAULT_SEARCH_RESULTS,
                        "description": "Maximum matches per resource (clamped to 1..200)"
                    },
                    "resources": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Resource names to search (reference, guide). Defaults to all."
                    }
                },
                "required": ["query"]
            }),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Tool definition used by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: ToolName,
    /// Display title.
    pub title: &'static str,
    /// Tool description for clients.
    pub description: &'static str,
    /// JSON schema for tool input.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Returns every tool definition in listing order.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::all()
        .iter()
        .map(|tool| ToolDefinition {
            name: *tool,
            title: tool.title(),
            description: tool.description(),
            input_schema: tool.input_schema(),
        })
        .collect()
}

// ============================================================================
// SECTION: Arguments
// ============================================================================

/// Arguments naming only a database.
#[derive(Debug, Deserialize)]
struct DatabaseArgs {
    database: String,
}

/// Arguments for `get_collection_schema`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionSchemaArgs {
    database: String,
    collection: String,
    #[serde(default = "default_schema_sample_size")]
    sample_size: i64,
}

/// Arguments for `sample_documents`.
#[derive(Debug, Deserialize)]
struct SampleArgs {
    database: String,
    collection: String,
    #[serde(default = "default_sample_limit")]
    limit: i64,
}

/// Arguments for `query`.
#[derive(Debug, Deserialize)]
struct QueryArgs {
    database: String,
    collection: String,
    #[serde(default)]
    filter: Map<String, Value>,
    #[serde(default)]
    projection: Option<Map<String, Value>>,
    #[serde(default)]
    sort: Option<Map<String, Value>>,
    #[serde(default = "default_query_limit")]
    limit: i64,
}

/// Arguments for `aggregation`.
#[derive(Debug, Deserialize)]
struct AggregationArgs {
    database: String,
    collection: String,
    pipeline: Vec<Map<String, Value>>,
}

const fn default_schema_sample_size() -> i64 {
    DEFAULT_SCHEMA_SAMPLE_SIZE
}

const fn default_sample_limit() -> i64 {
    DEFAULT_SAMPLE_LIMIT
}

const fn default_query_limit() -> i64 {
    DEFAULT_QUERY_LIMIT
}

// ============================================================================
// SECTION: Payloads
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseList {
    databases: Vec<DatabaseInfo>,
    total_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionSchema {
    database: String,
    collection: String,
    inferred_schema: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    database: String,
    collection: String,
    filter: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    projection: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<Map<String, Value>>,
    limit: i64,
    result_count: usize,
    results: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregationResult {
    database: String,
    collection: String,
    pipeline: Vec<Map<String, Value>>,
    result_count: usize,
    results: Vec<Value>,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Routes tool calls to their handlers.
#[derive(Clone)]
pub struct ToolRouter {
    /// Policy-enforcing store wrapper.
    mediator: AccessMediator,
}

impl ToolRouter {
    /// Creates a router over `mediator`.
    #[must_use]
    pub const fn new(mediator: AccessMediator) -> Self {
        Self {
            mediator,
        }
    }

    /// Returns the mediator.
    #[must_use]
    pub const fn mediator(&self) -> &AccessMediator {
        &self.mediator
    }

    /// Lists the available tools.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Handles a tool call by name with JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for unknown tools or undecodable arguments.
    /// Access denials and driver failures are error outcomes, not errors.
    pub async fn handle_tool_call(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<ToolOutcome, ToolError> {
        let tool = ToolName::parse(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let arguments = if arguments.is_null() { Value::Object(Map::new()) } else { arguments };
        let outcome = match tool {
            ToolName::ListDatabases => self.list_databases().await,
            ToolName::ListCollections => self.list_collections(decode(arguments)?).await,
            ToolName::GetCollectionSchema => self.collection_schema(decode(arguments)?).await,
            ToolName::SampleDocuments => self.sample_documents(decode(arguments)?).await,
            ToolName::Query => self.query(decode(arguments)?).await,
            ToolName::Aggregation => self.aggregation(decode(arguments)?).await,
            ToolName::SearchResource => search_resource(&decode(arguments)?),
        };
        if outcome.is_error() {
            tracing::warn!(tool = %tool, "tool call returned an error outcome");
        } else {
            tracing::debug!(tool = %tool, "tool call completed");
        }
        Ok(outcome)
    }

    async fn list_databases(&self) -> ToolOutcome {
        match self.mediator.store().list_databases().await {
            Ok(databases) => {
                let databases: Vec<DatabaseInfo> = databases
                    .into_iter()
                    .filter(|info| self.mediator.is_allowed(&info.name))
                    .collect();
                ToolOutcome::success(&DatabaseList {
                    total_count: databases.len(),
                    databases,
                })
            }
            Err(err) => ToolOutcome::error(err.to_string()),
        }
    }

    async fn list_collections(&self, args: DatabaseArgs) -> ToolOutcome {
        self.mediator
            .with_access(&args.database, |db| async move { db.list_collections().await })
            .await
    }

    async fn collection_schema(&self, args: CollectionSchemaArgs) -> ToolOutcome {
        let CollectionSchemaArgs {
            database,
            collection,
            sample_size,
        } = args;
        self.mediator
            .with_access(&database, |db| async move {
                let documents = db.find(&collection, FindQuery::sample(sample_size)).await?;
                Ok::<_, StoreError>(CollectionSchema {
                    database: db.name().to_string(),
                    collection,
                    inferred_schema: infer_schema(&documents),
                })
            })
            .await
    }

    async fn sample_documents(&self, args: SampleArgs) -> ToolOutcome {
        let SampleArgs {
            database,
            collection,
            limit,
        } = args;
        self.mediator
            .with_access(&database, |db| async move {
                db.find(&collection, FindQuery::sample(limit)).await
            })
            .await
    }

    async fn query(&self, args: QueryArgs) -> ToolOutcome {
        let QueryArgs {
            database,
            collection,
            filter,
            projection,
            sort,
            limit,
        } = args;
        self.mediator
            .with_access(&database, |db| async move {
                if let Some(sort) = &sort
                    && let Some((field, _)) =
                        sort.iter().find(|(_, direction)| !direction.is_number())
                {
                    return Err(StoreError::InvalidInput(format!(
                        "sort direction for `{field}` must be a number"
                    )));
                }
                let find = FindQuery {
                    filter: filter.clone(),
                    projection: projection.clone(),
                    sort: sort.clone(),
                    limit: Some(limit),
                };
                let results = db.find(&collection, find).await?;
                Ok::<_, StoreError>(QueryResult {
                    database: db.name().to_string(),
                    collection,
                    filter,
                    projection,
                    sort,
                    limit,
                    result_count: results.len(),
                    results,
                })
            })
            .await
    }

    async fn aggregation(&self, args: AggregationArgs) -> ToolOutcome {
        let AggregationArgs {
            database,
            collection,
            pipeline,
        } = args;
        self.mediator
            .with_access(&database, |db| async move {
                let results = db.aggregate(&collection, pipeline.clone()).await?;
                Ok::<_, StoreError>(AggregationResult {
                    database: db.name().to_string(),
                    collection,
                    pipeline,
                    result_count: results.len(),
                    results,
                })
            })
            .await
    }
}

fn search_resource(request: &SearchRequest) -> ToolOutcome {
    match search_resources(request) {
        Ok(results) => ToolOutcome::success(&results),
        Err(err) => ToolOutcome::error(err.to_string()),
    }
}

// ============================================================================
// SECTION: Schema Inference
// ============================================================================

/// Infers a field → type map from sampled documents. The first type seen for
/// a field wins; insertion order follows first appearance.
#[must_use]
pub fn infer_schema(documents: &[Value]) -> Map<String, Value> {
    let mut schema = Map::new();
    for document in documents {
        let Value::Object(fields) = document else {
            continue;
        };
        for (key, value) in fields {
            schema
                .entry(key.clone())
                .or_insert_with(|| Value::String(json_type_name(value).to_string()));
        }
    }
    schema
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Array(_) => "array",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn decode<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|err| ToolError::InvalidParams(err.to_string()))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool routing errors reported at the protocol level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// Tool name not recognized.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// Arguments did not match the tool's input schema.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
