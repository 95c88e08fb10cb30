// crates/mongodb-mcp/src/lib.rs
// ============================================================================
// Module: MongoDB MCP
// Description: MCP server exposing read and analysis access to MongoDB.
// Purpose: Provide policy-mediated MongoDB tools, guides, and transports.
// Dependencies: mongodb-mcp-config, mongodb, axum, tokio
// ============================================================================

//! ## Overview
//! MongoDB MCP exposes database listing, schema inference, sampling, querying,
//! and aggregation as MCP tools. Every database-scoped call passes through
//! [`AccessMediator::with_access`], which applies the allow/deny policy from
//! [`mongodb_mcp_config::AccessPolicy`] and normalizes results into
//! [`ToolOutcome`] payloads.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod access;
pub mod guides;
pub mod jsonrpc;
pub mod mongo;
pub mod server;
pub mod store;
pub mod tools;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use access::AccessMediator;
pub use access::ToolContent;
pub use access::ToolOutcome;
pub use jsonrpc::JsonRpcRequest;
pub use jsonrpc::JsonRpcResponse;
pub use jsonrpc::McpDispatcher;
pub use mongo::MongoConnector;
pub use mongo::MongoStore;
pub use server::McpServer;
pub use server::McpServerError;
pub use store::DatabaseHandle;
pub use store::DatabaseInfo;
pub use store::DocumentStore;
pub use store::FindQuery;
pub use store::StoreConnector;
pub use store::StoreError;
pub use tools::ToolError;
pub use tools::ToolName;
pub use tools::ToolRouter;
