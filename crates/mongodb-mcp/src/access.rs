// crates/mongodb-mcp/src/access.rs
// ============================================================================
// Module: Access Mediator
// Description: Policy check plus uniform result shaping around database operations.
// Purpose: Single place where access control and error normalization happen.
// Dependencies: mongodb-mcp-config, futures-util, serde, tracing
// ============================================================================

//! ## Overview
//! Every database-scoped tool funnels through [`AccessMediator::with_access`].
//! The mediator consults the [`AccessPolicy`], acquires a database handle only
//! when the name is permitted, runs the caller's operation, and converts the
//! outcome into a [`ToolOutcome`].
//!
//! ## Invariants
//! - A denied database never reaches the driver and never runs the operation.
//! - `with_access` always returns a [`ToolOutcome`]. Operation errors and
//!   panics inside the operation future become error outcomes.
//! - Success outcomes carry no `isError` field on the wire.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use mongodb_mcp_config::AccessPolicy;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;

use crate::store::DatabaseHandle;
use crate::store::DocumentStore;

// ============================================================================
// SECTION: Tool Outcome
// ============================================================================

/// Content block of a tool outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// Plain text content.
    Text {
        /// Text payload (pretty-printed JSON for tool results).
        text: String,
    },
}

/// Normalized result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutcome {
    /// Content blocks returned to the client.
    pub content: Vec<ToolContent>,
    /// Set only for failures.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl ToolOutcome {
    /// Wraps `value` as a success outcome with pretty-printed JSON text.
    ///
    /// A value that cannot be serialized produces an error outcome instead.
    pub fn success<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(text) => Self::text(text, false),
            Err(err) => Self::error(format!("failed to serialize result: {err}")),
        }
    }

    /// Builds an error outcome whose text is `{"error": message}`.
    pub fn error(message: impl Into<String>) -> Self {
        let payload = json!({ "error": message.into() });
        let text = serde_json::to_string_pretty(&payload)
            .unwrap_or_else(|_| String::from("{\"error\": \"unknown error\"}"));
        Self::text(text, true)
    }

    /// Builds the outcome returned for a database rejected by policy.
    #[must_use]
    pub fn access_denied(database: &str) -> Self {
        Self::error(access_denied_message(database))
    }

    /// Returns true when this outcome reports a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.is_error
    }

    /// Returns the text of the first content block.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|ToolContent::Text { text }| text.as_str())
    }

    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text,
            }],
            is_error,
        }
    }
}

/// Message used when a database is rejected by the access policy.
#[must_use]
pub fn access_denied_message(database: &str) -> String {
    format!(
        "Database \"{database}\" is not allowed. Check ALLOWED_DB_NAME and DISALLOWED_DB_NAME \
         settings."
    )
}

#[allow(clippy::trivially_copy_pass_by_ref, reason = "serde skip_serializing_if signature.")]
const fn is_false(value: &bool) -> bool {
    !*value
}

// ============================================================================
// SECTION: Mediator
// ============================================================================

/// Policy-enforcing wrapper around a [`DocumentStore`].
#[derive(Clone)]
pub struct AccessMediator {
    /// Immutable process-wide access policy.
    policy: Arc<AccessPolicy>,
    /// Driver-backed store for the current connection.
    store: Arc<dyn DocumentStore>,
}

impl AccessMediator {
    /// Creates a mediator over `store` enforcing `policy`.
    #[must_use]
    pub fn new(policy: Arc<AccessPolicy>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            policy,
            store,
        }
    }

    /// Returns the access policy.
    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Returns true when `database` is permitted by the policy.
    #[must_use]
    pub fn is_allowed(&self, database: &str) -> bool {
        self.policy.is_allowed(database)
    }

    /// Runs `operation` against `database` when the policy permits it.
    ///
    /// Denied names short-circuit with an error outcome. Otherwise the
    /// operation's value becomes a success outcome, and its error (by
    /// `Display`) or panic message becomes an error outcome.
    pub async fn with_access<T, E, F, Fut>(&self, database: &str, operation: F) -> ToolOutcome
    where
        T: Serialize,
        E: Display,
        F: FnOnce(Arc<dyn DatabaseHandle>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.is_allowed(database) {
            tracing::warn!(database, "access denied by database policy");
            return ToolOutcome::access_denied(database);
        }
        let handle = self.store.database(database);
        let result = AssertUnwindSafe(async move { operation(handle).await }).catch_unwind().await;
        match result {
            Ok(Ok(value)) => ToolOutcome::success(&value),
            Ok(Err(err)) => {
                let message = err.to_string();
                tracing::warn!(database, error = %message, "database operation failed");
                ToolOutcome::error(message)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(database, error = %message, "database operation panicked");
                ToolOutcome::error(message)
            }
        }
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    String::from("operation panicked")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only outcome assertions."
    )]

    use serde_json::Value;
    use serde_json::json;

    use super::ToolOutcome;
    use super::panic_message;

    #[test]
    fn success_outcome_omits_is_error() {
        let outcome = ToolOutcome::success(&json!({"ok": true}));
        let wire = serde_json::to_value(&outcome).unwrap();
        assert_eq!(wire, json!({"content": [{"type": "text", "text": "{\n  \"ok\": true\n}"}]}));
    }

    #[test]
    fn error_outcome_wraps_message() {
        let outcome = ToolOutcome::error("boom");
        assert!(outcome.is_error());
        let text: Value = serde_json::from_str(outcome.first_text().unwrap()).unwrap();
        assert_eq!(text, json!({"error": "boom"}));
        let wire = serde_json::to_value(&outcome).unwrap();
        assert_eq!(wire["isError"], json!(true));
    }

    #[test]
    fn access_denied_names_database_and_settings() {
        let outcome = ToolOutcome::access_denied("other");
        let text = outcome.first_text().unwrap();
        assert!(text.contains("other"));
        assert!(text.contains("not allowed"));
        assert!(text.contains("ALLOWED_DB_NAME"));
        assert!(text.contains("DISALLOWED_DB_NAME"));
    }

    #[test]
    fn panic_payloads_are_readable() {
        let from_str: Box<dyn std::any::Any + Send> = Box::new("static message");
        assert_eq!(panic_message(from_str.as_ref()), "static message");
        let from_string: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(from_string.as_ref()), "owned");
        let other: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(other.as_ref()), "operation panicked");
    }
}
