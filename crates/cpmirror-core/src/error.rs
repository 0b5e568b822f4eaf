// ── Core error types ──
//
// Errors surfaced by the mirror engine. Callers never see reqwest or
// rusqlite types directly: the `From` impls translate transport- and
// storage-layer failures into domain variants.

use thiserror::Error;

use crate::store::StoreError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to management server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session expired -- login required")]
    SessionExpired,

    #[error("Management server timed out")]
    Timeout,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    /// The server rejected a command (HTTP 4xx). Not retried.
    #[error("Command {command} rejected (HTTP {status}): {message}")]
    Rejected {
        command: String,
        status: u16,
        message: String,
    },

    /// The server failed (HTTP 5xx). Fatal for the calling operation.
    #[error("Server failure on {command} (HTTP {status})")]
    ServerFailure { command: String, status: u16 },

    /// A reply was missing a field we rely on, or had the wrong shape.
    #[error("Protocol violation in {command}: {message}")]
    ProtocolViolation { command: String, message: String },

    #[error("Unsupported command: {0}")]
    UnknownCommand(String),

    // ── Local store ──────────────────────────────────────────────────
    #[error("Local store error: {0}")]
    Store(#[from] StoreError),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn protocol(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            command: command.into(),
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<cpmirror_api::Error> for CoreError {
    fn from(err: cpmirror_api::Error) -> Self {
        match err {
            cpmirror_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            cpmirror_api::Error::SessionExpired => CoreError::SessionExpired,
            cpmirror_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                }
            }
            cpmirror_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            cpmirror_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            cpmirror_api::Error::ClientError {
                command,
                status,
                body,
            } => CoreError::Rejected {
                command,
                status,
                message: body,
            },
            cpmirror_api::Error::ServerError {
                command, status, ..
            } => CoreError::ServerFailure { command, status },
            cpmirror_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            cpmirror_api::Error::UnknownCommand(name) => CoreError::UnknownCommand(name),
        }
    }
}
