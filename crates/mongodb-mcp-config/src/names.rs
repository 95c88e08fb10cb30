// crates/mongodb-mcp-config/src/names.rs
// ============================================================================
// Module: Database Name Lists
// Description: Tolerant parser for database name lists supplied via env vars.
// Purpose: Turn one free-form configuration string into literal names.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Operators set `ALLOWED_DB_NAME` / `DISALLOWED_DB_NAME` by hand, so the
//! parser accepts several shapes. Each shape is an explicit attempt returning
//! `Option<NameList>`; the first attempt that succeeds wins:
//!
//! 1. absent, blank, or `[]` → empty list
//! 2. JSON array (`["a","b"]`)
//! 3. single-quoted JSON array (`['a', 'b']`)
//! 4. bracketed or comma separated values (`[a, b]`, `a,b`)
//! 5. anything else → empty list
//!
//! Parsing is total: malformed input never fails, it falls through.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Ordered list of literal database names.
///
/// # Invariants
/// - Entries are trimmed and never empty.
/// - Order follows the parsed input; only membership is meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NameList(Vec<String>);

impl NameList {
    /// Builds a list from raw names, trimming each and dropping empty ones.
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .map(|name| name.as_ref().trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        )
    }

    /// Parses a raw configuration value. See the module docs for the rules.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "[]" {
            return Self::default();
        }
        parse_json_array(trimmed)
            .or_else(|| parse_json_array(&trimmed.replace('\'', "\"")))
            .or_else(|| parse_delimited(trimmed))
            .unwrap_or_default()
    }

    /// Returns true when `name` is present (exact, case-sensitive).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|entry| entry == name)
    }

    /// Returns true when the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates entries in parse order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the entries as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for NameList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

// ============================================================================
// SECTION: Parse Attempts
// ============================================================================

/// Attempts to read `value` as a JSON array; elements are stringified.
fn parse_json_array(value: &str) -> Option<NameList> {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(value) else {
        return None;
    };
    Some(NameList::from_names(items.iter().map(element_to_string)))
}

/// String form of a JSON array element, following script-style coercion:
/// nested arrays join their elements with `,` (null becoming empty), objects
/// become `[object Object]`, and whole-number floats drop the fraction.
fn element_to_string(item: &Value) -> String {
    match item {
        Value::String(text) => text.clone(),
        Value::Null => String::from("null"),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number_to_string(number),
        Value::Array(items) => items.iter().map(nested_to_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => String::from("[object Object]"),
    }
}

/// Element of a nested array; null turns into an empty string when joined.
fn nested_to_string(item: &Value) -> String {
    match item {
        Value::Null => String::new(),
        other => element_to_string(other),
    }
}

/// Integers as written; floats without a fraction print as integers below 1e21.
#[allow(clippy::float_cmp, reason = "Exact zero fraction is the intended test.")]
fn number_to_string(number: &serde_json::Number) -> String {
    if number.is_i64() || number.is_u64() {
        return number.to_string();
    }
    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() < 1e21 => format!("{value:.0}"),
        Some(value) => value.to_string(),
        None => number.to_string(),
    }
}

/// Splits bracketed or comma separated input.
///
/// A single bare word (no brackets, no comma) is not list-like and yields
/// `None`, so the caller ends with an empty list rather than `[word]`.
fn parse_delimited(trimmed: &str) -> Option<NameList> {
    if !looks_list_like(trimmed) {
        return None;
    }
    let inner = trimmed.strip_prefix('[').unwrap_or(trimmed);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    Some(NameList::from_names(inner.split(',').map(|piece| strip_quotes(piece.trim()))))
}

/// Bracket-wrapped on a single line, or containing a comma.
fn looks_list_like(trimmed: &str) -> bool {
    let bracketed = trimmed.len() >= 2
        && trimmed.starts_with('[')
        && trimmed.ends_with(']')
        && !trimmed.contains(is_line_terminator);
    bracketed || trimmed.contains(',')
}

const fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Removes at most one leading and one trailing quote character.
fn strip_quotes(piece: &str) -> &str {
    let piece = piece.strip_prefix(['\'', '"']).unwrap_or(piece);
    piece.strip_suffix(['\'', '"']).unwrap_or(piece)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
