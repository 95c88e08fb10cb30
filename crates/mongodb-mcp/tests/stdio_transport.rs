// crates/mongodb-mcp/tests/stdio_transport.rs
// ============================================================================
// Module: Stdio Transport Tests
// Description: Framing, notifications, and size limits on the stdio loop.
// Purpose: Ensure responses echo request framing and oversize bodies are skipped.
// Dependencies: mongodb-mcp, tokio
// ============================================================================

//! ## Overview
//! Feeds a byte script to [`serve_stdio_with`] and parses the written stream.
//! Requests run concurrently, so responses are matched by id.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::sync::Arc;

use mongodb_mcp::AccessMediator;
use mongodb_mcp::McpDispatcher;
use mongodb_mcp::ToolRouter;
use mongodb_mcp::server::serve_stdio_with;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncReadExt;

use crate::common::policy;
use crate::common::sample_store;

/// One decoded response and whether it was `Content-Length` framed.
#[derive(Debug)]
struct Written {
    framed: bool,
    body: Value,
}

fn content_length_message(body: &str) -> String {
    format!("Content-Length: {}\r\n\r\n{body}", body.len())
}

async fn run(input: &[u8], max_body_bytes: usize) -> Vec<Written> {
    let dispatcher = McpDispatcher::new(ToolRouter::new(AccessMediator::new(
        policy(r#"["ADMirror"]"#, ""),
        Arc::new(sample_store()),
    )));
    let (writer, mut output) = tokio::io::duplex(1024 * 1024);
    serve_stdio_with(dispatcher, input, writer, max_body_bytes).await.unwrap();
    let mut raw = Vec::new();
    output.read_to_end(&mut raw).await.unwrap();
    parse_output(&String::from_utf8(raw).unwrap())
}

fn parse_output(mut raw: &str) -> Vec<Written> {
    let mut written = Vec::new();
    while !raw.is_empty() {
        if let Some(rest) = raw.strip_prefix("Content-Length: ") {
            let (len, rest) = rest.split_once("\r\n\r\n").unwrap();
            let len: usize = len.parse().unwrap();
            written.push(Written {
                framed: true,
                body: serde_json::from_str(&rest[.. len]).unwrap(),
            });
            raw = &rest[len ..];
        } else {
            let (line, rest) = raw.split_once('\n').unwrap();
            written.push(Written {
                framed: false,
                body: serde_json::from_str(line).unwrap(),
            });
            raw = rest;
        }
    }
    written
}

fn by_id<'a>(written: &'a [Written], id: &Value) -> &'a Written {
    written.iter().find(|message| &message.body["id"] == id).unwrap()
}

#[tokio::test]
async fn line_and_content_length_requests_are_answered_in_kind() {
    let framed = content_length_message(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#);
    let input = format!(
        "{}\n{framed}\n{}\n",
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
        r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
    );

    let written = run(input.as_bytes(), 1024 * 1024).await;

    assert_eq!(written.len(), 3);
    let initialize = by_id(&written, &json!(1));
    assert!(!initialize.framed);
    assert_eq!(initialize.body["result"]["protocolVersion"], json!("2024-11-05"));
    let tools = by_id(&written, &json!(2));
    assert!(tools.framed);
    assert_eq!(tools.body["result"]["tools"].as_array().map(Vec::len), Some(7));
    let ping = by_id(&written, &json!(3));
    assert!(!ping.framed);
    assert_eq!(ping.body["result"], json!({}));
}

#[tokio::test]
async fn header_names_are_case_insensitive() {
    let body = r#"{"jsonrpc":"2.0","id":"x","method":"prompts/list"}"#;
    let input = format!("content-length: {}\r\n\r\n{body}", body.len());

    let written = run(input.as_bytes(), 1024 * 1024).await;

    assert_eq!(written.len(), 1);
    assert!(written[0].framed);
    assert_eq!(written[0].body["result"]["prompts"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn notifications_and_blank_lines_produce_no_output() {
    let input = concat!(
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n\n",
        r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#,
        "\n",
    );

    let written = run(input.as_bytes(), 1024 * 1024).await;

    assert!(written.is_empty());
}

#[tokio::test]
async fn invalid_json_gets_a_parse_error_and_the_loop_continues() {
    let input = format!("{{broken\n{}\n", r#"{"jsonrpc":"2.0","id":5,"method":"ping"}"#);

    let written = run(input.as_bytes(), 1024 * 1024).await;

    assert_eq!(written.len(), 2);
    let parse_error = by_id(&written, &Value::Null);
    assert_eq!(parse_error.body["error"]["code"], json!(-32700));
    assert_eq!(by_id(&written, &json!(5)).body["result"], json!({}));
}

#[tokio::test]
async fn oversized_bodies_are_discarded_and_reported() {
    let padding = "y".repeat(512);
    let big = format!(r#"{{"jsonrpc":"2.0","id":7,"method":"ping","params":{{"pad":"{padding}"}}}}"#);
    let input = format!(
        "{}{big}\n{}\n",
        content_length_message(&big),
        r#"{"jsonrpc":"2.0","id":8,"method":"ping"}"#,
    );

    let written = run(input.as_bytes(), 128).await;

    assert_eq!(written.len(), 3);
    let too_large: Vec<&Written> =
        written.iter().filter(|message| message.body["error"]["code"] == json!(-32070)).collect();
    assert_eq!(too_large.len(), 2);
    assert!(too_large.iter().all(|message| message.body["id"].is_null()));
    assert!(too_large.iter().any(|message| message.framed));
    assert!(too_large.iter().any(|message| !message.framed));
    assert_eq!(by_id(&written, &json!(8)).body["result"], json!({}));
}

#[tokio::test]
async fn denied_tool_calls_are_error_results_not_rpc_errors() {
    let input = format!(
        "{}\n",
        r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"sample_documents","arguments":{"database":"lsf_research","collection":"jobConfig"}}}"#
    );

    let written = run(input.as_bytes(), 1024 * 1024).await;

    let result = &by_id(&written, &json!(4)).body["result"];
    assert_eq!(result["isError"], json!(true));
    assert!(result["content"][0]["text"].as_str().unwrap().contains("lsf_research"));
}

#[tokio::test]
async fn invalid_utf8_is_a_parse_error_and_the_loop_continues() {
    let mut input = b"\xff\xfe garbage\n".to_vec();
    input.extend_from_slice(br#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#);
    input.push(b'\n');

    let written = run(&input, 1024 * 1024).await;

    assert_eq!(written.len(), 2);
    assert_eq!(by_id(&written, &Value::Null).body["error"]["code"], json!(-32700));
    assert_eq!(by_id(&written, &json!(7)).body["result"], json!({}));
}

#[tokio::test]
async fn invalid_content_length_is_reported_and_reading_resumes() {
    let input = format!(
        "Content-Length: lots\r\n\r\n{}\n",
        r#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#
    );

    let written = run(input.as_bytes(), 1024 * 1024).await;

    assert_eq!(written.len(), 2);
    let bad_header = by_id(&written, &Value::Null);
    assert!(bad_header.framed);
    assert_eq!(bad_header.body["error"]["code"], json!(-32600));
    let ping = by_id(&written, &json!(9));
    assert!(!ping.framed);
    assert_eq!(ping.body["result"], json!({}));
}

#[tokio::test]
async fn oversized_lines_over_the_buffer_cap_are_skipped() {
    let long_line = "z".repeat(64 * 1024);
    let input = format!("{long_line}\n{}\n", r#"{"jsonrpc":"2.0","id":10,"method":"ping"}"#);

    let written = run(input.as_bytes(), 256).await;

    assert_eq!(written.len(), 2);
    assert_eq!(by_id(&written, &Value::Null).body["error"]["code"], json!(-32070));
    assert_eq!(by_id(&written, &json!(10)).body["result"], json!({}));
}
