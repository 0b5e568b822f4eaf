// ── Runtime mirror configuration ──
//
// These types describe *how* to reach a management server and where to
// keep the mirror. They carry credential data and tuning, but never touch
// disk. The CLI builds a `MirrorConfig` (via cpmirror-config) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use cpmirror_api::{TlsMode, TransportConfig};

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Management servers ship self-signed certificates.
    DangerAcceptInvalid,
}

/// Page sizes for list calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Used for targets, layers, rulebases.
    pub interactive: u32,
    /// Used for whole-category object pulls during sync.
    pub bulk: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            interactive: 50,
            bulk: 500,
        }
    }
}

/// How hard to push against a locked local store before giving up on a
/// single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per record operation, the first included.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Everything needed to open a session and a local store.
///
/// Built by the CLI -- core never reads config files.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Server root, e.g. `https://10.0.0.10:443`.
    pub url: Url,
    pub user: String,
    pub password: SecretString,
    /// Domain on a multi-domain server.
    pub domain: Option<String>,
    pub tls: TlsVerification,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// SQLite file holding the mirror.
    pub database: PathBuf,
    pub limits: PageLimits,
    pub retry: RetryPolicy,
}

impl MirrorConfig {
    /// Translate into the api crate's transport settings.
    pub fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
            ..TransportConfig::default()
        }
    }
}
