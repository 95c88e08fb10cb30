// crates/mongodb-mcp-config/src/config.rs
// ============================================================================
// Module: Server Configuration
// Description: Environment-driven server configuration and validation.
// Purpose: Resolve connection, transport, and access settings at startup.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! [`ServerConfig`] is resolved once per process from environment variables.
//! Resolution goes through a lookup function so callers (and tests) can supply
//! values without touching the real environment. A missing `MONGODB_URI` is a
//! fatal configuration error; every other setting has a default.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::policy::AccessPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the MongoDB connection string.
pub const MONGODB_URI_ENV: &str = "MONGODB_URI";
/// Environment variable selecting the transport.
pub const TRANSPORT_ENV: &str = "MCP_TRANSPORT";
/// Environment variable for the HTTP bind host.
pub const HOST_ENV: &str = "HOST";
/// Environment variable for the HTTP port.
pub const PORT_ENV: &str = "PORT";
/// Environment variable for the request body limit.
pub const MAX_BODY_BYTES_ENV: &str = "MAX_BODY_BYTES";
/// Environment variable enabling debug diagnostics.
pub const DEBUG_ENV: &str = "DEBUG";

/// Default HTTP bind host.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;
/// Default maximum request body size (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Supported MCP transport types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    /// Use stdin/stdout transport.
    #[default]
    Stdio,
    /// Use HTTP JSON-RPC transport.
    Http,
}

impl ServerTransport {
    /// Stable label used in logs and config output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }
}

impl FromStr for ServerTransport {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            other => Err(ConfigError::Invalid(format!(
                "{TRANSPORT_ENV} must be `stdio` or `http`, got `{other}`"
            ))),
        }
    }
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// MongoDB connection string.
    pub mongodb_uri: String,
    /// Database allow/deny policy.
    pub access: AccessPolicy,
    /// Transport used to serve MCP requests.
    pub transport: ServerTransport,
    /// Bind host for the HTTP transport.
    pub host: String,
    /// Bind port for the HTTP transport.
    pub port: u16,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
    /// Verbose request lifecycle diagnostics.
    pub debug: bool,
}

impl ServerConfig {
    /// Builds a configuration with defaults for everything but the URI.
    #[must_use]
    pub fn new(mongodb_uri: impl Into<String>, access: AccessPolicy) -> Self {
        Self {
            mongodb_uri: mongodb_uri.into(),
            access,
            transport: ServerTransport::Stdio,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            debug: false,
        }
    }

    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required value is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required value is missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mongodb_uri = lookup(MONGODB_URI_ENV)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingUri)?;
        let mut config = Self::new(mongodb_uri, AccessPolicy::from_lookup(&lookup));
        if let Some(value) = non_blank(lookup(TRANSPORT_ENV)) {
            config.transport = value.parse()?;
        }
        if let Some(value) = non_blank(lookup(HOST_ENV)) {
            config.host = value;
        }
        if let Some(value) = non_blank(lookup(PORT_ENV)) {
            config.port = parse_number(PORT_ENV, &value)?;
        }
        if let Some(value) = non_blank(lookup(MAX_BODY_BYTES_ENV)) {
            config.max_body_bytes = parse_number(MAX_BODY_BYTES_ENV, &value)?;
        }
        config.debug = debug_from_lookup(&lookup);
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mongodb_uri.trim().is_empty() {
            return Err(ConfigError::MissingUri);
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be greater than zero".to_string()));
        }
        if self.transport == ServerTransport::Http {
            self.bind_addr()?;
        }
        Ok(())
    }

    /// Socket address the HTTP transport binds to.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when host and port do not form an address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let host = self.host.trim();
        let host = if host.eq_ignore_ascii_case("localhost") { "127.0.0.1" } else { host };
        let candidate = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{}", self.port)
        } else {
            format!("{host}:{}", self.port)
        };
        candidate
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid bind address `{candidate}`")))
    }
}

/// Resolves `DEBUG` on its own, so logging can be set up before the rest of
/// the configuration is validated.
#[must_use]
pub fn debug_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> bool {
    lookup(DEBUG_ENV).is_some_and(|value| flag_enabled(&value))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The connection string is not configured.
    #[error(
        "MONGODB_URI is not set. Add it to your environment or .env file before starting the \
         server."
    )]
    MissingUri,
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key} must be a positive integer, got `{value}`")))
}

/// Treats any non-empty value other than `0`/`false`/`no`/`off` as enabled.
fn flag_enabled(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && !matches!(value.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
}
