// ── Session setup ──
//
// Build a client from a `MirrorConfig` and log in. The returned client is
// the explicit session handle every other operation takes.

use tracing::{info, warn};

use cpmirror_api::ManagementClient;

use crate::config::MirrorConfig;
use crate::error::CoreError;

/// Open a logged-in session against the configured server.
pub async fn connect(config: &MirrorConfig) -> Result<ManagementClient, CoreError> {
    let client = ManagementClient::from_url(config.url.as_str(), &config.transport())?;
    let info = client
        .login(&config.user, &config.password, config.domain.as_deref())
        .await?;

    if info.read_only {
        warn!(user = %config.user, "session is read-only");
    }
    info!(
        server = %config.url,
        version = info.api_server_version.as_deref().unwrap_or("unknown"),
        "logged in"
    );
    Ok(client)
}

/// Log out, logging rather than failing on error: the session is
/// abandoned either way.
pub async fn disconnect(client: &ManagementClient) {
    if let Err(e) = client.logout().await {
        warn!(error = %e, "logout failed (non-fatal)");
    }
}
