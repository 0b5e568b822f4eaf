//! Rulebase command handler.

use serde::Serialize;
use tabled::Tabled;

use cpmirror_api::ManagementClient;
use cpmirror_core::{Reference, ResolvedEntry, fetch_rulebase};

use crate::cli::{GlobalOpts, RulesArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "No.")]
    number: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Destination")]
    destination: String,
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Track")]
    track: String,
    #[tabled(rename = "Install On")]
    target: String,
}

fn cell(refs: &[Reference], negate: bool) -> String {
    let names = util::join_names(refs.iter().map(|r| r.name.as_str()));
    if negate { format!("NOT {names}") } else { names }
}

impl From<&ResolvedEntry> for RuleRow {
    fn from(entry: &ResolvedEntry) -> Self {
        match entry {
            ResolvedEntry::Section { name } => Self {
                number: String::new(),
                name: format!("[{name}]"),
                source: String::new(),
                destination: String::new(),
                service: String::new(),
                action: String::new(),
                track: String::new(),
                target: String::new(),
            },
            ResolvedEntry::Rule(rule) => Self {
                number: rule.number.map(|n| n.to_string()).unwrap_or_default(),
                name: if rule.enabled {
                    rule.name.clone()
                } else {
                    format!("{} (disabled)", rule.name)
                },
                source: cell(&rule.source, rule.source_negate),
                destination: cell(&rule.destination, rule.destination_negate),
                service: cell(&rule.service, rule.service_negate),
                action: rule.action.clone(),
                track: rule.track.clone(),
                target: cell(&rule.target, false),
            },
        }
    }
}

fn entry_name(entry: &ResolvedEntry) -> String {
    match entry {
        ResolvedEntry::Section { name } => name.clone(),
        ResolvedEntry::Rule(rule) => rule.name.clone(),
    }
}

#[derive(Serialize)]
struct Rulebase<'a> {
    layer: &'a str,
    rulebase: &'a [ResolvedEntry],
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    session: &ManagementClient,
    args: RulesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let spinner = util::spinner(global, &format!("Fetching rulebase '{}'", args.layer));
    let result = fetch_rulebase(session, &args.layer, args.limit).await;
    spinner.finish_and_clear();
    let entries = result?;

    let out = match global.output {
        crate::cli::OutputFormat::Table | crate::cli::OutputFormat::Plain => {
            output::render_list(&global.output, &entries, |e| RuleRow::from(e), entry_name)
        }
        _ => output::render_single(
            &global.output,
            &Rulebase {
                layer: &args.layer,
                rulebase: &entries,
            },
            |_| String::new(),
            |_| String::new(),
        ),
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
