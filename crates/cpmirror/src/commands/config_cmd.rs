//! Config command handlers. None of these touch the server.

use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, InitArgs};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

#[derive(Clone, Tabled, serde::Serialize)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Default")]
    default: String,
}

fn save(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    cpmirror_config::save_config_to(cfg, &config::config_path(global))?;
    Ok(())
}

fn init(args: InitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if args.server.trim().is_empty() {
        return Err(CliError::Validation {
            field: "server".into(),
            reason: "must not be empty".into(),
        });
    }

    let mut cfg = config::load(global)?;
    let profile = Profile {
        server: args.server,
        port: args.port,
        user: args.user,
        domain: args.domain,
        password_env: args.password_env,
        database: args.database,
        insecure: args.insecure.then_some(true),
        ..Profile::default()
    };
    if args.default || cfg.profiles.is_empty() {
        cfg.default_profile = Some(args.name.clone());
    }
    cfg.profiles.insert(args.name.clone(), profile);
    save(&cfg, global)?;

    if !global.quiet {
        eprintln!(
            "Profile '{}' written to {}",
            args.name,
            config::config_path(global).display()
        );
    }
    Ok(())
}

fn show(global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some("********".into());
        }
    }
    let out = match global.output {
        crate::cli::OutputFormat::Json => output::render_json_pretty(&cfg),
        crate::cli::OutputFormat::JsonCompact => output::render_json_compact(&cfg),
        crate::cli::OutputFormat::Yaml => output::render_yaml(&cfg),
        _ => toml::to_string_pretty(&cfg).map_err(|e| CliError::Internal(e.to_string()))?,
    };
    output::print_output(out.trim_end(), global.quiet);
    Ok(())
}

fn profiles(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let active = config::active_profile_name(global, &cfg);
    let mut rows: Vec<ProfileRow> = cfg
        .profiles
        .iter()
        .map(|(name, p)| ProfileRow {
            name: name.clone(),
            server: p.server.clone(),
            user: p.user.clone(),
            default: if *name == active { "*".into() } else { String::new() },
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));

    let out = output::render_list(
        &global.output,
        &rows,
        ProfileRow::clone,
        |r| r.name.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

fn use_profile(name: String, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load(global)?;
    if !cfg.profiles.contains_key(&name) {
        let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
        names.sort();
        return Err(CliError::ProfileNotFound {
            name,
            available: if names.is_empty() {
                "(none)".into()
            } else {
                names.join(", ")
            },
        });
    }
    cfg.default_profile = Some(name);
    save(&cfg, global)
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init(init_args) => init(init_args, global),
        ConfigCommand::Show => show(global),
        ConfigCommand::Path => {
            println!("{}", config::config_path(global).display());
            Ok(())
        }
        ConfigCommand::Profiles => profiles(global),
        ConfigCommand::Use { name } => use_profile(name, global),
    }
}
