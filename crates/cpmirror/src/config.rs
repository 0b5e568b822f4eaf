//! CLI configuration -- thin wrapper around `cpmirror_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides (--server,
//! --user, --database, ...) and the interactive password prompt.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use cpmirror_config::ConfigError;
use cpmirror_core::{MirrorConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use cpmirror_config::{Config, Profile};

// ── CLI-specific helpers ────────────────────────────────────────────

/// The config file in effect: `--config` or the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(cpmirror_config::config_path)
}

/// Load the config file in effect; a missing file yields defaults.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(cpmirror_config::load_config_from(&config_path(global))?)
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the `MirrorConfig` for this invocation.
///
/// Flags override the profile. Without a profile, `--server` and `--user`
/// must both be given.
pub fn resolve_mirror_config(global: &GlobalOpts) -> Result<MirrorConfig, CliError> {
    let cfg = load(global)?;
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
            names.sort();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if names.is_empty() {
                    "(none)".into()
                } else {
                    names.join(", ")
                },
            });
        }
        None => {
            let (Some(_), Some(_)) = (&global.server, &global.user) else {
                return Err(CliError::NoConfig {
                    path: config_path(global).display().to_string(),
                });
            };
            Profile {
                port: 443,
                ..Profile::default()
            }
        }
    };

    if let Some(ref server) = global.server {
        profile.server.clone_from(server);
    }
    if let Some(ref user) = global.user {
        profile.user.clone_from(user);
    }
    if global.domain.is_some() {
        profile.domain.clone_from(&global.domain);
    }
    if global.database.is_some() {
        profile.database.clone_from(&global.database);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }

    let password = resolve_password(&profile, &profile_name)?;
    let mut mirror = cpmirror_config::build_mirror_config(&profile, &cfg.defaults, password)?;

    // -k wins over a profile CA bundle
    if global.insecure {
        mirror.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        mirror.timeout = Duration::from_secs(secs);
    }
    Ok(mirror)
}

/// Password from the credential chain, else an interactive prompt.
fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, CliError> {
    match cpmirror_config::resolve_password(profile, profile_name) {
        Ok(password) => Ok(password),
        Err(ConfigError::NoCredentials { profile: name }) if std::io::stdin().is_terminal() => {
            let prompt = format!("Password for {}@{}: ", profile.user, profile.server);
            let password = rpassword::prompt_password(prompt).map_err(|e| {
                CliError::Validation {
                    field: "password".into(),
                    reason: format!("prompt failed: {e}"),
                }
            })?;
            if password.is_empty() {
                return Err(CliError::NoCredentials { profile: name });
            }
            Ok(SecretString::from(password))
        }
        Err(e) => Err(e.into()),
    }
}

/// Mirror database for commands that never contact the server.
///
/// `--database`, else the profile's `database`, else the default path
/// derived from the server (and domain).
pub fn resolve_database(global: &GlobalOpts) -> Result<PathBuf, CliError> {
    if let Some(ref path) = global.database {
        return Ok(path.clone());
    }

    let cfg = load(global)?;
    let profile_name = active_profile_name(global, &cfg);
    let profile = cfg.profiles.get(&profile_name);

    if let Some(path) = profile.and_then(|p| p.database.clone()) {
        return Ok(path);
    }

    let server = global
        .server
        .as_deref()
        .or_else(|| profile.map(|p| p.server.as_str()))
        .ok_or_else(|| CliError::NoConfig {
            path: config_path(global).display().to_string(),
        })?;
    let domain = global
        .domain
        .as_deref()
        .or_else(|| profile.and_then(|p| p.domain.as_deref()));
    Ok(cpmirror_config::default_database_path(server, domain))
}
