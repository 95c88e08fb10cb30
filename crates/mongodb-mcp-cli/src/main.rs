// crates/mongodb-mcp-cli/src/main.rs
// ============================================================================
// Module: MongoDB MCP CLI Entry Point
// Description: Command dispatcher for the MongoDB MCP server.
// Purpose: Load the environment, configure logging, and run the selected transport.
// Dependencies: clap, dotenvy, mongodb-mcp, mongodb-mcp-config, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! `mongodb-mcp` reads `.env` (when present) and the process environment,
//! initializes stderr logging, and starts the server on stdio or HTTP.
//! Running without a subcommand is the same as `serve`. Stdout belongs to the
//! stdio transport, so diagnostics always go to stderr.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use mongodb_mcp::McpServer;
use mongodb_mcp_config::AccessPolicy;
use mongodb_mcp_config::MONGODB_URI_ENV;
use mongodb_mcp_config::ServerConfig;
use mongodb_mcp_config::ServerTransport;
use mongodb_mcp_config::debug_from_lookup;
use serde_json::json;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "mongodb-mcp", version, about = "MCP server for policy-scoped MongoDB access")]
struct Cli {
    /// Selected subcommand (defaults to `serve`).
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the MCP server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `serve`. Flags override the matching environment variables.
#[derive(Args, Debug, Default)]
struct ServeCommand {
    /// Transport to serve on (overrides `MCP_TRANSPORT`).
    #[arg(long, value_enum)]
    transport: Option<TransportArg>,
    /// HTTP bind host (overrides `HOST`).
    #[arg(long)]
    host: Option<String>,
    /// HTTP port (overrides `PORT`).
    #[arg(long)]
    port: Option<u16>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the resolved access policy as JSON.
    Show,
}

/// Transport selection flag.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum TransportArg {
    /// stdin/stdout.
    Stdio,
    /// Streamable HTTP on `POST /mcp`.
    Http,
}

impl From<TransportArg> for ServerTransport {
    fn from(value: TransportArg) -> Self {
        match value {
            TransportArg::Stdio => Self::Stdio,
            TransportArg::Http => Self::Http,
        }
    }
}

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let env_file = load_env_file()?;
    init_tracing(debug_from_lookup(|key| std::env::var(key).ok()));
    if let Some(path) = env_file {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    match cli.command.unwrap_or_else(|| Commands::Serve(ServeCommand::default())) {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command: ConfigCommand::Show,
        } => command_config_show(),
    }
}

/// Loads `.env` from the working directory; a missing file is not an error.
fn load_env_file() -> CliResult<Option<std::path::PathBuf>> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(CliError::new(format!("failed to load .env: {err}"))),
    }
}

/// Installs the stderr subscriber. `RUST_LOG` wins over the `DEBUG` default.
fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_directive(debug)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Default filter when `RUST_LOG` is unset.
const fn default_log_directive(debug: bool) -> &'static str {
    if debug { "debug" } else { "info" }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let mut config = ServerConfig::from_env().map_err(|err| CliError::new(err.to_string()))?;
    apply_overrides(&mut config, &command);
    let server =
        McpServer::from_config(config).map_err(|err| CliError::new(format!("startup failed: {err}")))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Applies command-line flags on top of the environment configuration.
fn apply_overrides(config: &mut ServerConfig, command: &ServeCommand) {
    if let Some(transport) = command.transport {
        config.transport = transport.into();
    }
    if let Some(host) = &command.host {
        config.host.clone_from(host);
    }
    if let Some(port) = command.port {
        config.port = port;
    }
}

// ============================================================================
// SECTION: Config Command
// ============================================================================

/// Executes `config show`. Does not require `MONGODB_URI`.
fn command_config_show() -> CliResult<ExitCode> {
    let report = config_report(&AccessPolicy::from_env(), std::env::var(MONGODB_URI_ENV).is_ok());
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|err| CliError::new(format!("failed to render config: {err}")))?;
    write_stdout_line(&rendered)
        .map_err(|err| CliError::new(format!("failed to write stdout: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// JSON summary of the access policy. The connection string is never echoed.
fn config_report(policy: &AccessPolicy, uri_configured: bool) -> serde_json::Value {
    json!({
        "access": policy,
        "mongodbUriConfigured": uri_configured,
    })
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
