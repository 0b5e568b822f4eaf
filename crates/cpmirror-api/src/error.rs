use thiserror::Error;

/// Top-level error type for the `cpmirror-api` crate.
///
/// Covers every failure mode of a single Management API call:
/// authentication, transport, HTTP status classes, and body decoding.
/// `cpmirror-core` maps these into domain diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, locked administrator, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The server no longer accepts our session id.
    #[error("Session expired -- login required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── HTTP status classes ─────────────────────────────────────────
    /// 4xx response. The body is kept verbatim; the server explains
    /// what it didn't like in plain text or a `{code, message}` object.
    #[error("Command {command} rejected (HTTP {status}): {body}")]
    ClientError {
        command: String,
        status: u16,
        body: String,
    },

    /// 5xx response. Fatal for the calling operation.
    #[error("Server failure on {command} (HTTP {status})")]
    ServerError {
        command: String,
        status: u16,
        body: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Command vocabulary ──────────────────────────────────────────
    /// The endpoint name is not part of the supported command set.
    #[error("Unsupported command: {0}")]
    UnknownCommand(String),
}

impl Error {
    /// Returns `true` if logging in again might resolve this error.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// HTTP status of the failed call, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ClientError { status, .. } | Self::ServerError { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
