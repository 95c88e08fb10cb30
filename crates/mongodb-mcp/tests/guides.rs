// crates/mongodb-mcp/tests/guides.rs
// ============================================================================
// Module: Guide Catalog Tests
// Description: Prompts, resources, and line search over the embedded guides.
// Purpose: Ensure templated guides list only permitted databases.
// Dependencies: mongodb-mcp, mongodb-mcp-config
// ============================================================================

//! ## Overview
//! Covers resource and prompt listing, rendering with the live database list,
//! unknown names, and the `search_resource` matching rules.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use mongodb_mcp::guides;
use mongodb_mcp::guides::GuideError;
use mongodb_mcp::guides::SearchRequest;
use mongodb_mcp::guides::search_resources;

use crate::common::policy;
use crate::common::sample_store;

fn search(query: &str) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        case_sensitive: false,
        max_results: guides::DEFAULT_SEARCH_RESULTS,
        resources: Vec::new(),
    }
}

// ============================================================================
// SECTION: Resources
// ============================================================================

#[test]
fn resources_are_listed_with_markdown_mime_type() {
    let resources = guides::list_resources();
    let uris: Vec<&str> = resources.iter().map(|resource| resource.uri).collect();
    assert_eq!(uris, ["mongodb://guide/query", "mongodb://guide/reference", "mongodb://guide/usage"]);
    assert!(resources.iter().all(|resource| resource.mime_type == "text/markdown"));
    let wire = serde_json::to_value(&resources[0]).unwrap();
    assert_eq!(wire["mimeType"], serde_json::json!("text/markdown"));
}

#[tokio::test]
async fn query_guide_lists_only_permitted_databases() {
    let store = sample_store();
    let policy = policy("", r#"["secret_hr"]"#);

    let content = guides::read_resource("mongodb://guide/query", &store, &policy).await.unwrap();

    assert!(content.text.contains("- **ADMirror** - User identity"));
    assert!(content.text.contains("- **lsf_research** - HPC cluster data"));
    assert!(!content.text.contains("secret_hr"));
    assert!(!content.text.contains("{{"));
}

#[tokio::test]
async fn static_resources_skip_the_store() {
    let store = sample_store().with_list_error("must not be called");
    let policy = policy("", "");

    let reference = guides::read_resource("mongodb://guide/reference", &store, &policy).await.unwrap();
    let usage = guides::read_resource("mongodb://guide/usage", &store, &policy).await.unwrap();

    assert!(reference.text.contains("ADMirror"));
    assert!(!usage.text.is_empty());
    assert_eq!(store.counters.list_databases.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_resource_and_driver_failures_are_errors() {
    let policy = policy("", "");
    let unknown = guides::read_resource("mongodb://guide/missing", &sample_store(), &policy).await;
    assert!(matches!(unknown, Err(GuideError::UnknownResource(uri)) if uri == "mongodb://guide/missing"));

    let failing = sample_store().with_list_error("not authorized");
    let store_error = guides::read_resource("mongodb://guide/query", &failing, &policy).await;
    assert!(matches!(store_error, Err(GuideError::Store(_))));
}

// ============================================================================
// SECTION: Prompts
// ============================================================================

#[test]
fn prompts_are_listed_in_order() {
    let names: Vec<&str> = guides::list_prompts().iter().map(|prompt| prompt.name).collect();
    assert_eq!(names, ["help", "help_ADMirror", "help_lsf_research"]);
}

#[tokio::test]
async fn help_prompt_points_at_permitted_databases() {
    let store = sample_store();
    let policy = policy(r#"["ADMirror"]"#, "");

    let prompt = guides::get_prompt("help", &store, &policy).await.unwrap();

    let wire = serde_json::to_value(&prompt).unwrap();
    assert_eq!(wire["messages"][0]["role"], serde_json::json!("user"));
    assert_eq!(wire["messages"][0]["content"]["type"], serde_json::json!("text"));
    let text = wire["messages"][0]["content"]["text"].as_str().unwrap();
    assert!(text.contains("- **ADMirror** ← Use this for finding people/users"));
    assert!(!text.contains("**lsf_research** ←"));
}

#[tokio::test]
async fn database_specific_prompts_render_timestamps() {
    let store = sample_store().with_list_error("must not be called");
    let policy = policy("", "");

    let prompt = guides::get_prompt("help_lsf_research", &store, &policy).await.unwrap();

    let text = serde_json::to_value(&prompt).unwrap()["messages"][0]["content"]["text"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(!text.contains("{{"));
    assert!(text.contains("lsf_research"));

    let unknown = guides::get_prompt("help_other", &store, &policy).await;
    assert!(matches!(unknown, Err(GuideError::UnknownPrompt(name)) if name == "help_other"));
}

// ============================================================================
// SECTION: Search
// ============================================================================

#[test]
fn search_finds_terms_in_reference() {
    let results = search_resources(&search("ADMirror")).unwrap();
    let reference = results.results.iter().find(|result| result.resource == "reference").unwrap();
    assert!(reference.match_count > 0);
    assert_eq!(reference.match_count, reference.matches.len());
    assert!(reference.matches.iter().all(|found| found.line >= 1));
    assert!(reference.matches.iter().all(|found| found.text.to_lowercase().contains("admirror")));
}

#[test]
fn search_defaults_to_both_static_resources() {
    let results = search_resources(&search("database")).unwrap();
    let names: Vec<&str> = results.results.iter().map(|result| result.resource).collect();
    assert_eq!(names, ["reference", "guide"]);
    assert_eq!(results.query, "database");
}

#[test]
fn search_respects_case_sensitivity() {
    let insensitive = search_resources(&search("mongodb")).unwrap();
    let mut exact = search("mongodb");
    exact.case_sensitive = true;
    let sensitive = search_resources(&exact).unwrap();

    let total = |results: &guides::SearchResults| -> usize {
        results.results.iter().map(|result| result.match_count).sum()
    };
    assert!(total(&insensitive) > 0);
    assert!(total(&sensitive) < total(&insensitive));
    for result in &sensitive.results {
        assert!(result.matches.iter().all(|found| found.text.contains("mongodb")));
    }

    let mut upper = search("MongoDB");
    upper.case_sensitive = true;
    let upper_results = search_resources(&upper).unwrap();
    assert!(total(&upper_results) > 0);
}

#[test]
fn search_caps_results_per_resource() {
    let mut request = search("e");
    request.max_results = 2;
    let results = search_resources(&request).unwrap();
    assert!(results.results.iter().all(|result| result.match_count <= 2));

    request.max_results = 0;
    let clamped = search_resources(&request).unwrap();
    assert!(clamped.results.iter().all(|result| result.match_count == 1));
}

#[test]
fn search_filters_resources_by_name() {
    let mut request = search("query");
    request.resources = vec!["guide".to_string(), "query_guide".to_string()];
    let results = search_resources(&request).unwrap();
    let names: Vec<&str> = results.results.iter().map(|result| result.resource).collect();
    assert_eq!(names, ["guide"]);

    request.resources = vec!["query_guide".to_string()];
    let none = search_resources(&request);
    assert!(matches!(none, Err(GuideError::NoSearchableResources)));
    assert_eq!(
        none.err().map(|err| err.to_string()).as_deref(),
        Some("No matching resources to search.")
    );
}

#[test]
fn search_without_matches_returns_empty_lists() {
    let results = search_resources(&search("zzz-no-such-term-zzz")).unwrap();
    assert_eq!(results.results.len(), 2);
    assert!(results.results.iter().all(|result| result.match_count == 0 && result.matches.is_empty()));
}

#[tokio::test]
async fn search_reports_one_based_line_numbers() {
    let mut request = search("Routing");
    request.case_sensitive = true;
    request.resources = vec!["reference".to_string()];
    let results = search_resources(&request).unwrap();

    let reference =
        guides::read_resource("mongodb://guide/reference", &sample_store(), &policy("", "")).await.unwrap();
    let lines: Vec<&str> = reference.text.lines().collect();
    for found in &results.results[0].matches {
        assert!(found.text.contains("Routing"));
        assert_eq!(lines[found.line - 1].trim_end(), found.text);
    }
    assert!(results.results[0].match_count >= 2);
}
