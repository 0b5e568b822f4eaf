//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use cpmirror_config::ConfigError;
use cpmirror_core::{CoreError, StoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const STORE: i32 = 5;
    pub const PROTOCOL: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to management server at {url}")]
    #[diagnostic(
        code(cpmirror::connection_failed),
        help(
            "Check that the management API is enabled and reachable.\n\
             Self-signed certificate? Try again with --insecure (-k)."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Request timed out")]
    #[diagnostic(
        code(cpmirror::timeout),
        help("Increase the timeout with --timeout or check server load.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(cpmirror::auth_failed),
        help("Verify the user and password for profile '{profile}'.")
    )]
    AuthFailed { profile: String, message: String },

    #[error("Session expired")]
    #[diagnostic(code(cpmirror::session_expired), help("Run the command again to log in."))]
    SessionExpired,

    #[error("No password available for profile '{profile}'")]
    #[diagnostic(
        code(cpmirror::no_credentials),
        help(
            "Set password_env in the profile, export CPMIRROR_PASSWORD,\n\
             or run from an interactive terminal to be prompted."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(cpmirror::not_found),
        help("Run: cpmirror {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────

    #[error("{command} rejected (HTTP {status}): {message}")]
    #[diagnostic(code(cpmirror::rejected))]
    Rejected {
        command: String,
        status: u16,
        message: String,
    },

    #[error("Server failure on {command} (HTTP {status})")]
    #[diagnostic(
        code(cpmirror::server_failure),
        help("The management server could not complete the request. Check its logs.")
    )]
    ServerFailure { command: String, status: u16 },

    #[error("Unexpected reply to {command}: {message}")]
    #[diagnostic(code(cpmirror::protocol))]
    Protocol { command: String, message: String },

    #[error("Unknown command '{0}'")]
    #[diagnostic(
        code(cpmirror::unknown_command),
        help("Run: cpmirror commands to list what the server supports")
    )]
    UnknownCommand(String),

    // ── Local store ──────────────────────────────────────────────────

    #[error("Mirror database is locked by another process")]
    #[diagnostic(
        code(cpmirror::store_busy),
        help("Wait for the other writer to finish, then run the command again.")
    )]
    StoreBusy,

    #[error("Mirror database error: {0}")]
    #[diagnostic(code(cpmirror::store))]
    Store(String),

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(cpmirror::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(cpmirror::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: cpmirror config init --server <host> --user <name>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(cpmirror::no_config),
        help(
            "Create a profile with: cpmirror config init --server <host> --user <name>\n\
             or pass --server and --user. Config file: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(cpmirror::config))]
    Config(ConfigError),

    #[error("Internal error: {0}")]
    #[diagnostic(code(cpmirror::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(cpmirror::json), help("Check the JSON payload and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::SessionExpired | Self::NoCredentials { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::StoreBusy | Self::Store(_) => exit_code::STORE,
            Self::Protocol { .. } => exit_code::PROTOCOL,
            Self::Validation { .. } | Self::UnknownCommand(_) | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },
            CoreError::SessionExpired => CliError::SessionExpired,
            CoreError::Timeout => CliError::Timeout,
            CoreError::Rejected {
                command,
                status,
                message,
            } => CliError::Rejected {
                command,
                status,
                message,
            },
            CoreError::ServerFailure { command, status } => {
                CliError::ServerFailure { command, status }
            }
            CoreError::ProtocolViolation { command, message } => {
                CliError::Protocol { command, message }
            }
            CoreError::UnknownCommand(name) => CliError::UnknownCommand(name),
            CoreError::Store(e) => e.into(),
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Busy => CliError::StoreBusy,
            other => CliError::Store(other.to_string()),
        }
    }
}

impl From<cpmirror_api::Error> for CliError {
    fn from(err: cpmirror_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
