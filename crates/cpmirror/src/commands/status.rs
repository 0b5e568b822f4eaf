//! Status command handler.

use std::fmt::Write;

use serde::Serialize;

use cpmirror_api::ManagementClient;
use cpmirror_core::{MirrorConfig, ObjectStatus, Reconciler, SqliteStore};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct StatusView {
    server: String,
    api_version: Option<String>,
    database: String,
    #[serde(flatten)]
    counts: ObjectStatus,
    in_sync: bool,
}

fn detail(view: &StatusView, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Server:   {}", view.server);
    if let Some(ref version) = view.api_version {
        let _ = writeln!(out, "API:      {version}");
    }
    let _ = writeln!(out, "Database: {}", view.database);
    let _ = writeln!(out, "Local:    {}", view.counts.local);
    let _ = writeln!(out, "Remote:   {}", view.counts.remote);
    let state = if view.in_sync { "in sync" } else { "out of sync" };
    let _ = write!(out, "State:    {}", output::status_word(state, view.in_sync, color));
    out
}

pub async fn handle(
    session: &ManagementClient,
    mirror: &MirrorConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let store = SqliteStore::open(&mirror.database)?;
    let counts = Reconciler::new(session, &store)
        .with_retry(mirror.retry)
        .object_status()
        .await?;

    let view = StatusView {
        server: mirror.url.to_string(),
        api_version: session.api_version(),
        database: mirror.database.display().to_string(),
        counts,
        in_sync: counts.in_sync(),
    };

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &view,
        |v| detail(v, color),
        |v| format!("{} {}", v.counts.local, v.counts.remote),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
