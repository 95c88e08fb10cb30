// crates/mongodb-mcp-config/src/lib.rs
// ============================================================================
// Module: MongoDB MCP Config Library
// Description: Access policy and environment configuration for the server.
// Purpose: Single source of truth for ALLOWED_DB_NAME / DISALLOWED_DB_NAME semantics.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `mongodb-mcp-config` turns environment strings into the immutable values the
//! server runs with: a [`NameList`] parser tolerant of hand-typed formats, the
//! [`AccessPolicy`] decision rule, and the resolved [`ServerConfig`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod names;
pub mod policy;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use names::NameList;
pub use policy::*;
