//! Targets, layers, and command catalog handlers.

use serde::Serialize;
use tabled::Tabled;

use cpmirror_api::ManagementClient;
use cpmirror_core::{Layer, MirrorConfig, all_commands, all_layers, all_targets};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Named<'a> {
    name: &'a str,
}

#[derive(Tabled)]
struct NameRow {
    #[tabled(rename = "Name")]
    name: String,
}

#[derive(Tabled)]
struct LayerRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "UID")]
    uid: String,
}

fn render_names(global: &GlobalOpts, names: &[String]) {
    let items: Vec<Named<'_>> = names.iter().map(|n| Named { name: n }).collect();
    let out = output::render_list(
        &global.output,
        &items,
        |n| NameRow {
            name: n.name.to_owned(),
        },
        |n| n.name.to_owned(),
    );
    output::print_output(&out, global.quiet);
}

pub async fn targets(
    session: &ManagementClient,
    mirror: &MirrorConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let targets = all_targets(session, mirror.limits.interactive).await?;
    render_names(global, &targets);
    Ok(())
}

pub async fn layers(
    session: &ManagementClient,
    mirror: &MirrorConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let layers = all_layers(session, mirror.limits.interactive).await?;
    let out = output::render_list(
        &global.output,
        &layers,
        |l: &Layer| LayerRow {
            name: l.name.clone(),
            uid: l.uid.clone(),
        },
        |l| l.name.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn commands(session: &ManagementClient, global: &GlobalOpts) -> Result<(), CliError> {
    let mut commands = all_commands(session).await?;
    commands.sort_unstable();
    render_names(global, &commands);
    Ok(())
}
