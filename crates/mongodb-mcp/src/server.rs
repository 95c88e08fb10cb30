// crates/mongodb-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: MCP server implementations for stdio and HTTP transports.
// Purpose: Expose the MongoDB tools via JSON-RPC 2.0.
// Dependencies: mongodb-mcp-config, axum, http-body-util, tokio, tracing
// ============================================================================

//! ## Overview
//! The MCP server exposes the tool router over two transports.
//!
//! - **stdio**: one driver connection for the process lifetime. Messages are
//!   newline-delimited JSON; `Content-Length` framed messages are also read
//!   and answered with the same framing. Requests run concurrently and a
//!   single writer task serializes responses.
//! - **HTTP**: `POST /mcp` opens a driver connection per request, dispatches,
//!   and closes it. `GET /health` answers without touching the driver.
//!
//! There is no authentication layer; binding a non-loopback address logs a
//! warning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::Method;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use http_body_util::LengthLimitError;
use mongodb_mcp_config::AccessPolicy;
use mongodb_mcp_config::ServerConfig;
use mongodb_mcp_config::ServerTransport;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;

use crate::access::AccessMediator;
use crate::jsonrpc::BODY_TOO_LARGE;
use crate::jsonrpc::INTERNAL_ERROR;
use crate::jsonrpc::INVALID_REQUEST;
use crate::jsonrpc::JsonRpcError;
use crate::jsonrpc::JsonRpcResponse;
use crate::jsonrpc::METHOD_NOT_ALLOWED;
use crate::jsonrpc::McpDispatcher;
use crate::jsonrpc::SERVER_NAME;
use crate::jsonrpc::parse_request;
use crate::mongo::MongoConnector;
use crate::store::DocumentStore;
use crate::store::StoreConnector;
use crate::tools::ToolRouter;

/// Capacity of the stdio response queue.
const STDIO_QUEUE_DEPTH: usize = 64;
/// Lower bound on the stdio line buffer.
const MIN_LINE_BYTES: usize = 1024;
/// Read size used while draining an oversized line.
const DISCARD_CHUNK_BYTES: u64 = 8 * 1024;

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Server configuration.
    config: ServerConfig,
    /// Immutable access policy shared by every connection.
    policy: Arc<AccessPolicy>,
    /// Opens driver connections.
    connector: Arc<dyn StoreConnector>,
}

impl McpServer {
    /// Builds a server backed by the MongoDB driver.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Config`] when the configuration is invalid.
    pub fn from_config(config: ServerConfig) -> Result<Self, McpServerError> {
        let connector = Arc::new(MongoConnector::new(config.mongodb_uri.clone()));
        Self::new(config, connector)
    }

    /// Builds a server using `connector` for driver connections.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Config`] when the configuration is invalid.
    pub fn new(
        config: ServerConfig,
        connector: Arc<dyn StoreConnector>,
    ) -> Result<Self, McpServerError> {
        config.validate().map_err(|err| McpServerError::Config(err.to_string()))?;
        let policy = Arc::new(config.access.clone());
        Ok(Self {
            config,
            policy,
            connector,
        })
    }

    /// Returns the HTTP application (routes and state) without binding.
    #[must_use]
    pub fn http_router(&self) -> Router {
        http_router(self.http_state())
    }

    fn http_state(&self) -> HttpState {
        HttpState {
            policy: Arc::clone(&self.policy),
            connector: Arc::clone(&self.connector),
            max_body_bytes: self.config.max_body_bytes,
            log_requests: self.config.debug,
        }
    }

    /// Serves requests using the configured transport.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the server fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        tracing::info!(
            transport = self.config.transport.as_str(),
            allowed = self.policy.allowed_dbs().len(),
            disallowed = self.policy.disallowed_dbs().len(),
            "starting MongoDB MCP server"
        );
        match self.config.transport {
            ServerTransport::Stdio => self.serve_stdio().await,
            ServerTransport::Http => self.serve_http().await,
        }
    }

    async fn serve_stdio(self) -> Result<(), McpServerError> {
        let store = self
            .connector
            .connect()
            .await
            .map_err(|err| McpServerError::Init(format!("failed to connect to MongoDB: {err}")))?;
        let dispatcher = McpDispatcher::new(ToolRouter::new(AccessMediator::new(
            Arc::clone(&self.policy),
            Arc::clone(&store),
        )));
        tracing::info!("MongoDB MCP server running on stdio");
        let result = serve_stdio_with(
            dispatcher,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            self.config.max_body_bytes,
        )
        .await;
        close_store(store.as_ref()).await;
        result
    }

    async fn serve_http(self) -> Result<(), McpServerError> {
        let addr =
            self.config.bind_addr().map_err(|err| McpServerError::Config(err.to_string()))?;
        emit_non_loopback_warning(addr);
        let app = self.http_router();
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::AddrInUse {
                McpServerError::Transport(format!(
                    "port {} is already in use; stop the other server or set a different PORT",
                    addr.port()
                ))
            } else {
                McpServerError::Transport(format!("http bind failed: {err}"))
            }
        })?;
        tracing::info!(%addr, "MongoDB MCP HTTP server listening");
        tracing::info!("health check: http://{addr}/health");
        tracing::info!("MCP endpoint: http://{addr}/mcp");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|err| McpServerError::Transport(format!("http server failed: {err}")))?;
        tracing::info!("server closed");
        Ok(())
    }
}

/// Resolves on Ctrl-C / SIGINT.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down server");
}

fn emit_non_loopback_warning(addr: SocketAddr) {
    if !addr.ip().is_loopback() {
        tracing::warn!(
            %addr,
            "HTTP transport bound to a non-loopback address; no authentication is enforced"
        );
    }
}

async fn close_store(store: &dyn DocumentStore) {
    if let Err(err) = store.close().await {
        tracing::error!(error = %err, "failed to close MongoDB connection");
    }
}

// ============================================================================
// SECTION: Stdio Transport
// ============================================================================

/// Message framing, echoed on the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// One JSON message per line.
    Line,
    /// `Content-Length` header block followed by the body.
    ContentLength,
}

/// One message read from the stream.
#[derive(Debug, PartialEq, Eq)]
enum Incoming {
    /// Body within the size limit.
    Message(Framing, Vec<u8>),
    /// Body over the size limit (already discarded).
    TooLarge(Framing),
    /// `Content-Length` header with an unusable value; the header block was consumed.
    BadHeader,
}

/// One line read under a byte cap.
enum Line {
    /// Line including its terminator, if any.
    Complete(Vec<u8>),
    /// Line longer than the cap; the remainder was discarded.
    Overflow,
}

/// Parsed `Content-Length` header value.
#[derive(Debug, PartialEq, Eq)]
enum ContentLength {
    /// Declared body length.
    Bytes(usize),
    /// Value that is not a non-negative integer.
    Invalid,
}

/// Serves JSON-RPC over an arbitrary reader/writer pair until EOF.
///
/// Malformed input (invalid JSON or UTF-8, bad framing headers, oversized
/// bodies) is answered with an error response and the loop keeps reading.
///
/// # Errors
///
/// Returns [`McpServerError::Transport`] when the reader or writer fails.
pub async fn serve_stdio_with<R, W>(
    dispatcher: McpDispatcher,
    mut reader: R,
    writer: W,
    max_body_bytes: usize,
) -> Result<(), McpServerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<(Framing, Vec<u8>)>(STDIO_QUEUE_DEPTH);
    let writer_task = tokio::spawn(write_responses(writer, rx));
    let read_result = loop {
        let incoming = match read_message(&mut reader, max_body_bytes).await {
            Ok(Some(incoming)) => incoming,
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        };
        match incoming {
            Incoming::TooLarge(framing) => {
                let response = JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(BODY_TOO_LARGE, "request body too large"),
                );
                queue_response(&tx, framing, &response).await;
            }
            Incoming::BadHeader => {
                tracing::warn!("stdio message with invalid Content-Length header");
                let response = JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(INVALID_REQUEST, "invalid Content-Length header"),
                );
                queue_response(&tx, Framing::ContentLength, &response).await;
            }
            Incoming::Message(framing, body) => match parse_request(&body) {
                Err(response) => queue_response(&tx, framing, &response).await,
                Ok(request) => {
                    let dispatcher = dispatcher.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Some(response) = dispatcher.handle(request).await {
                            queue_response(&tx, framing, &response).await;
                        }
                    });
                }
            },
        }
    };
    drop(tx);
    let write_result = writer_task
        .await
        .map_err(|err| McpServerError::Transport(format!("stdio writer task failed: {err}")))?;
    read_result.and(write_result)
}

async fn queue_response(
    tx: &mpsc::Sender<(Framing, Vec<u8>)>,
    framing: Framing,
    response: &JsonRpcResponse,
) {
    match serde_json::to_vec(response) {
        Ok(payload) => {
            if tx.send((framing, payload)).await.is_err() {
                tracing::error!("stdio writer closed before response was sent");
            }
        }
        Err(err) => tracing::error!(error = %err, "json-rpc serialization failed"),
    }
}

async fn write_responses<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut rx: mpsc::Receiver<(Framing, Vec<u8>)>,
) -> Result<(), McpServerError> {
    while let Some((framing, payload)) = rx.recv().await {
        write_message(&mut writer, framing, &payload).await?;
    }
    Ok(())
}

fn read_error(_: std::io::Error) -> McpServerError {
    McpServerError::Transport("stdio read failed".to_string())
}

/// Longest line buffered before a message is treated as oversized. Header
/// lines stay readable even with a tiny body limit.
fn line_cap(max_body_bytes: usize) -> usize {
    max_body_bytes.max(MIN_LINE_BYTES).saturating_add(2)
}

/// Reads one message, or `None` at EOF.
async fn read_message<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_body_bytes: usize,
) -> Result<Option<Incoming>, McpServerError> {
    let cap = line_cap(max_body_bytes);
    loop {
        let line = match read_bounded_line(reader, cap).await? {
            None => return Ok(None),
            Some(Line::Overflow) => return Ok(Some(Incoming::TooLarge(Framing::Line))),
            Some(Line::Complete(line)) => line,
        };
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(header) = content_length(trimmed) {
            if !skip_headers(reader, cap).await? {
                return Ok(None);
            }
            return match header {
                ContentLength::Bytes(len) => read_framed_body(reader, len, max_body_bytes).await,
                ContentLength::Invalid => Ok(Some(Incoming::BadHeader)),
            };
        }
        if trimmed.len() > max_body_bytes {
            return Ok(Some(Incoming::TooLarge(Framing::Line)));
        }
        return Ok(Some(Incoming::Message(Framing::Line, trimmed.to_vec())));
    }
}

/// Reads up to `cap` bytes of one line. Longer lines are drained to their
/// terminator without buffering and reported as [`Line::Overflow`].
async fn read_bounded_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    cap: usize,
) -> Result<Option<Line>, McpServerError> {
    let mut line = Vec::new();
    let limit = u64::try_from(cap).unwrap_or(u64::MAX);
    let bytes = (&mut *reader).take(limit).read_until(b'\n', &mut line).await.map_err(read_error)?;
    if bytes == 0 {
        return Ok(None);
    }
    if line.last() == Some(&b'\n') || bytes < cap {
        return Ok(Some(Line::Complete(line)));
    }
    discard_line(reader).await?;
    Ok(Some(Line::Overflow))
}

/// Consumes input through the next newline (or EOF) in fixed-size chunks.
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<(), McpServerError> {
    let mut chunk = Vec::new();
    loop {
        chunk.clear();
        let bytes = (&mut *reader)
            .take(DISCARD_CHUNK_BYTES)
            .read_until(b'\n', &mut chunk)
            .await
            .map_err(read_error)?;
        if bytes == 0 || chunk.last() == Some(&b'\n') {
            return Ok(());
        }
    }
}

/// Parses a `Content-Length` header line; other lines yield `None`.
fn content_length(line: &[u8]) -> Option<ContentLength> {
    let line = std::str::from_utf8(line).ok()?;
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    Some(value.trim().parse::<usize>().map_or(ContentLength::Invalid, ContentLength::Bytes))
}

/// Consumes header lines up to and including the blank separator. Returns
/// false when the stream ends first.
async fn skip_headers<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    cap: usize,
) -> Result<bool, McpServerError> {
    loop {
        match read_bounded_line(reader, cap).await? {
            None => return Ok(false),
            Some(Line::Overflow) => {}
            Some(Line::Complete(line)) => {
                if line.trim_ascii().is_empty() {
                    return Ok(true);
                }
            }
        }
    }
}

/// Reads a framed body, or `None` when the stream ends mid-body.
async fn read_framed_body<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    len: usize,
    max_body_bytes: usize,
) -> Result<Option<Incoming>, McpServerError> {
    if len > max_body_bytes {
        let discard = u64::try_from(len).unwrap_or(u64::MAX);
        tokio::io::copy(&mut (&mut *reader).take(discard), &mut tokio::io::sink())
            .await
            .map_err(read_error)?;
        return Ok(Some(Incoming::TooLarge(Framing::ContentLength)));
    }
    let mut body = vec![0_u8; len];
    match reader.read_exact(&mut body).await {
        Ok(_) => Ok(Some(Incoming::Message(Framing::ContentLength, body))),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
            tracing::warn!(expected = len, "stdio closed in the middle of a framed message");
            Ok(None)
        }
        Err(err) => Err(read_error(err)),
    }
}

/// Writes one message with the given framing.
async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    framing: Framing,
    payload: &[u8],
) -> Result<(), McpServerError> {
    let write_error = |_| McpServerError::Transport("stdio write failed".to_string());
    match framing {
        Framing::Line => {
            writer.write_all(payload).await.map_err(write_error)?;
            writer.write_all(b"\n").await.map_err(write_error)?;
        }
        Framing::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", payload.len());
            writer.write_all(header.as_bytes()).await.map_err(write_error)?;
            writer.write_all(payload).await.map_err(write_error)?;
        }
    }
    writer.flush().await.map_err(write_error)
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Shared state for HTTP handlers.
#[derive(Clone)]
struct HttpState {
    /// Access policy for every per-request mediator.
    policy: Arc<AccessPolicy>,
    /// Opens one driver connection per request.
    connector: Arc<dyn StoreConnector>,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
    /// Logs request lifecycle events at info level (`DEBUG` set).
    log_requests: bool,
}

fn http_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/mcp",
            post(handle_mcp).get(handle_method_not_allowed).delete(handle_method_not_allowed),
        )
        .with_state(Arc::new(state))
}

async fn handle_health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": SERVER_NAME }))
}

async fn handle_method_not_allowed(
    State(state): State<Arc<HttpState>>,
    method: Method,
) -> Response {
    if state.log_requests {
        tracing::info!(%method, "rejected non-POST request to /mcp");
    }
    rpc_error_response(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED, "Method not allowed.")
}

/// Handles `POST /mcp`: one driver connection per request.
async fn handle_mcp(State(state): State<Arc<HttpState>>, body: Body) -> Response {
    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) if is_length_limit(&err) => {
            return rpc_error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                BODY_TOO_LARGE,
                "request body too large",
            );
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to read request body");
            return rpc_error_response(
                StatusCode::BAD_REQUEST,
                INVALID_REQUEST,
                "failed to read request body",
            );
        }
    };
    let request = match parse_request(&bytes) {
        Ok(request) => request,
        Err(response) => return (StatusCode::BAD_REQUEST, Json(response)).into_response(),
    };
    if request.is_notification() {
        tracing::debug!(method = %request.method, "notification accepted");
        return StatusCode::ACCEPTED.into_response();
    }
    let store = match state.connector.connect().await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, "error handling MCP request");
            return rpc_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR,
                "Internal server error",
            );
        }
    };
    let dispatcher = McpDispatcher::new(ToolRouter::new(AccessMediator::new(
        Arc::clone(&state.policy),
        Arc::clone(&store),
    )));
    let response = dispatcher.handle(request).await;
    close_store(store.as_ref()).await;
    if state.log_requests {
        tracing::info!("MCP request completed");
    }
    match response {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// True when `err` comes from the body size limit rather than the stream.
fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        if current.is::<LengthLimitError>() {
            return true;
        }
        source = current.source();
    }
    false
}

fn rpc_error_response(status: StatusCode, code: i64, message: &str) -> Response {
    let body = JsonRpcResponse::failure(Value::Null, JsonRpcError::new(code, message));
    (status, Json(body)).into_response()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
