//! Shared configuration for the cpmirror CLI.
//!
//! TOML profiles merged with `CPMIRROR_*` environment overrides, password
//! resolution (env var or plaintext), and translation to
//! `cpmirror_core::MirrorConfig`. The CLI layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cpmirror_core::{MirrorConfig, PageLimits, RetryPolicy, TlsVerification};

/// Environment variable consulted for a password when the profile names none.
pub const PASSWORD_ENV: &str = "CPMIRROR_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{0}' not found")]
    UnknownProfile(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named management-server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, falling back to `default_profile` when `name` is
    /// `None`. Returns the resolved name alongside the profile.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile(name.into()))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    /// Whole-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    300
}

/// A named management-server profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Host name or address. A full `https://host:port` URL is accepted too.
    pub server: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub user: String,

    /// Domain on a multi-domain server.
    pub domain: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Password (plaintext -- prefer `password_env`).
    pub password: Option<String>,

    /// SQLite file for this profile's mirror.
    pub database: Option<PathBuf>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Store-busy attempts per record, the first included.
    pub retry_attempts: Option<u32>,

    /// Pause between store-busy attempts (milliseconds).
    pub retry_backoff_ms: Option<u64>,
}

fn default_port() -> u16 {
    443
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "cpmirror", "cpmirror")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory holding mirror databases when a profile names none.
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("cpmirror");
    p
}

/// `{data_dir}/{server}.db`, or `{data_dir}/{server}_{domain}.db` on a
/// multi-domain server.
pub fn default_database_path(server: &str, domain: Option<&str>) -> PathBuf {
    data_dir().join(database_file_name(server, domain))
}

fn database_file_name(server: &str, domain: Option<&str>) -> String {
    let server = server
        .split_once("://")
        .map_or(server, |(_, rest)| rest)
        .trim_end_matches('/');
    let stem = match domain {
        Some(domain) => format!("{server}_{domain}"),
        None => server.to_owned(),
    };
    let safe: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}.db")
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from an explicit file + environment.
///
/// `CPMIRROR_DEFAULT_PROFILE` overrides the top-level key; nested keys use a
/// double underscore, e.g. `CPMIRROR_DEFAULTS__TIMEOUT`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed("CPMIRROR_")
                .ignore(&["PASSWORD"])
                .split("__"),
        );

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Resolve the password from the credential chain: the profile's
/// `password_env`, then `CPMIRROR_PASSWORD`, then the plaintext field.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Global env var
    if let Ok(val) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(val));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// The server root URL for a profile.
pub fn server_url(profile: &Profile) -> Result<url::Url, ConfigError> {
    let raw = if profile.server.contains("://") {
        profile.server.clone()
    } else {
        format!("https://{}:{}", profile.server, profile.port)
    };
    raw.parse().map_err(|_| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// Build a `MirrorConfig` from a profile and an already-resolved password.
pub fn build_mirror_config(
    profile: &Profile,
    defaults: &Defaults,
    password: SecretString,
) -> Result<MirrorConfig, ConfigError> {
    if profile.user.is_empty() {
        return Err(ConfigError::Validation {
            field: "user".into(),
            reason: "must not be empty".into(),
        });
    }
    let url = server_url(profile)?;

    let tls = if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };

    let database = profile.database.clone().unwrap_or_else(|| {
        default_database_path(&profile.server, profile.domain.as_deref())
    });

    let fallback = RetryPolicy::default();
    let retry = RetryPolicy {
        max_attempts: profile.retry_attempts.unwrap_or(fallback.max_attempts),
        backoff: profile
            .retry_backoff_ms
            .map_or(fallback.backoff, Duration::from_millis),
    };

    Ok(MirrorConfig {
        url,
        user: profile.user.clone(),
        password,
        domain: profile.domain.clone(),
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        database,
        limits: PageLimits::default(),
        retry,
    })
}
