// crates/mongodb-mcp-config/src/policy.rs
// ============================================================================
// Module: Database Access Policy
// Description: Allow/deny lists for database names and the decision rule.
// Purpose: Single source of truth for which databases tools may touch.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! An [`AccessPolicy`] is built once at startup from `ALLOWED_DB_NAME` and
//! `DISALLOWED_DB_NAME` and is immutable afterwards. The decision rule is:
//!
//! - deny-list membership always rejects, even when the name is also allowed
//! - an empty allow-list admits every name not denied
//! - otherwise the name must be on the allow-list
//!
//! Matching is exact and case-sensitive; there are no wildcards or prefixes.

use serde::Serialize;

use crate::names::NameList;

/// Environment variable holding the allow-list.
pub const ALLOWED_DB_ENV: &str = "ALLOWED_DB_NAME";
/// Environment variable holding the deny-list.
pub const DISALLOWED_DB_ENV: &str = "DISALLOWED_DB_NAME";

/// Allow/deny configuration for database access.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    /// Databases tools may use; empty means unrestricted.
    allowed_dbs: NameList,
    /// Databases tools may never use.
    disallowed_dbs: NameList,
}

impl AccessPolicy {
    /// Builds a policy from already parsed lists.
    #[must_use]
    pub const fn new(allowed_dbs: NameList, disallowed_dbs: NameList) -> Self {
        Self {
            allowed_dbs,
            disallowed_dbs,
        }
    }

    /// Builds a policy from raw allow/deny configuration strings.
    #[must_use]
    pub fn from_raw(allowed: Option<&str>, disallowed: Option<&str>) -> Self {
        Self::new(NameList::parse(allowed), NameList::parse(disallowed))
    }

    /// Reads both lists through `lookup` (usually the process environment).
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let allowed = lookup(ALLOWED_DB_ENV);
        let disallowed = lookup(DISALLOWED_DB_ENV);
        Self::from_raw(allowed.as_deref(), disallowed.as_deref())
    }

    /// Reads both lists from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Returns true when `name` may be accessed.
    #[must_use]
    pub fn is_allowed(&self, name: &str) -> bool {
        if !self.disallowed_dbs.is_empty() && self.disallowed_dbs.contains(name) {
            return false;
        }
        if self.allowed_dbs.is_empty() {
            return true;
        }
        self.allowed_dbs.contains(name)
    }

    /// Parsed allow-list.
    #[must_use]
    pub const fn allowed_dbs(&self) -> &NameList {
        &self.allowed_dbs
    }

    /// Parsed deny-list.
    #[must_use]
    pub const fn disallowed_dbs(&self) -> &NameList {
        &self.disallowed_dbs
    }
}
