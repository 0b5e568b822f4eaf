//! Local mirror browsing and remote object lookup.

use std::fmt::Write;

use serde::Serialize;
use serde_json::json;
use tabled::Tabled;

use cpmirror_api::{ApiCommand, ManagementClient};
use cpmirror_core::{LocalStore, SqliteStore, StoredObject, show_local};

use crate::cli::{GlobalOpts, ObjectsArgs, ObjectsCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ObjectRow {
    #[tabled(rename = "Type")]
    object_type: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "UID")]
    uid: String,
    #[tabled(rename = "Synced")]
    synced_at: String,
}

impl From<&StoredObject> for ObjectRow {
    fn from(o: &StoredObject) -> Self {
        Self {
            object_type: o.object_type.clone(),
            name: o.name.clone().unwrap_or_else(|| "-".into()),
            uid: o.uid.clone(),
            synced_at: o.synced_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

fn detail(o: &StoredObject) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "UID:    {}", o.uid);
    let _ = writeln!(out, "Type:   {}", o.object_type);
    let _ = writeln!(out, "Name:   {}", o.name.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "Synced: {}", o.synced_at.to_rfc3339());
    let _ = write!(out, "{}", output::render_json_pretty(&o.document));
    out
}

#[derive(Serialize)]
struct Count {
    count: u64,
}

// ── Handlers ────────────────────────────────────────────────────────

/// Subcommands served from the mirror database alone.
pub fn handle_local(args: ObjectsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::resolve_database(global)?;
    if !path.exists() {
        return Err(CliError::Store(format!(
            "no mirror at {}; run `cpmirror sync` first",
            path.display()
        )));
    }
    let store = SqliteStore::open(&path)?;

    match args.command {
        ObjectsCommand::List { r#type } => {
            let objects = store.list(r#type.as_deref())?;
            let out = output::render_list(&global.output, &objects, |o| ObjectRow::from(o), |o| {
                o.uid.clone()
            });
            output::print_output(&out, global.quiet);
        }
        ObjectsCommand::Show { uid, .. } => {
            let object = show_local(&store, &uid)?.ok_or_else(|| CliError::NotFound {
                resource_type: "object".into(),
                identifier: uid,
                list_command: "objects list".into(),
            })?;
            let out = output::render_single(&global.output, &object, detail, |o| o.uid.clone());
            output::print_output(&out, global.quiet);
        }
        ObjectsCommand::Count => {
            let count = Count {
                count: store.count()?,
            };
            let out = output::render_single(
                &global.output,
                &count,
                |c| c.count.to_string(),
                |c| c.count.to_string(),
            );
            output::print_output(&out, global.quiet);
        }
    }
    Ok(())
}

/// `objects show --remote`: ask the server directly.
pub async fn handle_remote(
    session: &ManagementClient,
    args: ObjectsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let ObjectsCommand::Show { uid, .. } = args.command else {
        return Err(CliError::Internal("only `objects show` has a remote form".into()));
    };

    let payload = json!({ "uid": uid, "details-level": "full" });
    let reply = session
        .post(&ApiCommand::ShowObject, &payload)
        .await
        .map_err(|e| match e.status() {
            Some(404) => CliError::NotFound {
                resource_type: "object".into(),
                identifier: uid.clone(),
                list_command: "objects list".into(),
            },
            _ => e.into(),
        })?;
    let object = reply.get("object").cloned().unwrap_or(reply);

    output::print_output(&output::render_value(&global.output, &object), global.quiet);
    Ok(())
}
