//! Sync command handler.

use std::fmt::Write;

use cpmirror_api::ManagementClient;
use cpmirror_core::{LocalStore, MirrorConfig, Reconciler, SqliteStore, SyncReport};

use crate::cli::{GlobalOpts, SyncArgs};
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(report: &SyncReport, full: bool, color: bool) -> String {
    let mut out = String::new();
    let mode = if full { "full" } else { "delta" };
    let _ = writeln!(out, "Sync:       {mode}");
    let _ = writeln!(out, "Categories: {}", report.categories);
    let _ = writeln!(out, "Written:    {}", report.inserted);
    let _ = writeln!(out, "Deleted:    {}", report.deleted);
    let skipped = output::status_word(&report.skipped.to_string(), report.skipped == 0, color);
    let _ = write!(out, "Skipped:    {skipped}");
    out
}

pub async fn handle(
    session: &ManagementClient,
    mirror: &MirrorConfig,
    args: SyncArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let store = SqliteStore::open(&mirror.database)?;
    // An empty mirror always gets a full sync.
    let full = args.full || store.count()? == 0;

    let reconciler = Reconciler::new(session, &store)
        .with_limits(mirror.limits)
        .with_retry(mirror.retry);

    let spinner = util::spinner(
        global,
        &format!(
            "{} sync into {}",
            if full { "Full" } else { "Delta" },
            mirror.database.display()
        ),
    );
    let result = if full {
        reconciler.full_sync().await
    } else {
        reconciler.delta_sync().await
    };
    spinner.finish_and_clear();
    let report = result?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &report,
        |r| detail(r, full, color),
        |r| format!("{} {} {}", r.inserted, r.deleted, r.skipped),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
