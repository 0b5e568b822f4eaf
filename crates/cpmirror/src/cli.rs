//! Clap derive structures for the `cpmirror` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// cpmirror -- keep a local SQLite mirror of a Check Point management server
#[derive(Debug, Parser)]
#[command(
    name = "cpmirror",
    version,
    about = "Mirror Check Point management objects and render access rulebases",
    long_about = "Mirrors the object inventory of a Check Point management server into a\n\
        local SQLite database, keeps it in step with delta syncs, and resolves\n\
        access rulebases into readable form.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "CPMIRROR_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Management server host or URL (overrides profile)
    #[arg(long, short = 's', env = "CPMIRROR_SERVER", global = true)]
    pub server: Option<String>,

    /// Administrator user name (overrides profile)
    #[arg(long, short = 'u', env = "CPMIRROR_USER", global = true)]
    pub user: Option<String>,

    /// Domain on a multi-domain server (overrides profile)
    #[arg(long, short = 'd', env = "CPMIRROR_DOMAIN", global = true)]
    pub domain: Option<String>,

    /// Mirror database file (overrides profile)
    #[arg(long, env = "CPMIRROR_DATABASE", global = true)]
    pub database: Option<PathBuf>,

    /// Configuration file (defaults to the platform config dir)
    #[arg(long, env = "CPMIRROR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CPMIRROR_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "CPMIRROR_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "CPMIRROR_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Bring the local mirror in line with the server
    Sync(SyncArgs),

    /// Compare local and remote object counts
    #[command(alias = "st")]
    Status,

    /// Show an access layer's rulebase with names resolved
    Rules(RulesArgs),

    /// Browse the local mirror
    #[command(alias = "obj")]
    Objects(ObjectsArgs),

    /// List policy targets (gateways and servers)
    Targets,

    /// List access layers
    Layers,

    /// List every API command the server exposes
    Commands,

    /// Send a single API command with a JSON payload
    Call(CallArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Sync ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Rewrite every object instead of applying the uid difference
    #[arg(long, short = 'f')]
    pub full: bool,
}

// ── Rules ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RulesArgs {
    /// Access layer name (see `cpmirror layers`)
    pub layer: String,

    /// Rules per page
    #[arg(long, short = 'l', default_value = "50")]
    pub limit: u32,
}

// ── Objects ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ObjectsArgs {
    #[command(subcommand)]
    pub command: ObjectsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ObjectsCommand {
    /// List mirrored objects
    #[command(alias = "ls")]
    List {
        /// Only objects of this type (e.g. host, service-tcp)
        #[arg(long, short = 't')]
        r#type: Option<String>,
    },

    /// Show one object by uid
    Show {
        uid: String,

        /// Ask the server instead of the mirror
        #[arg(long)]
        remote: bool,
    },

    /// Count mirrored objects
    Count,
}

impl ObjectsArgs {
    /// Only `show --remote` talks to the server.
    pub fn needs_session(&self) -> bool {
        matches!(self.command, ObjectsCommand::Show { remote: true, .. })
    }
}

// ── Call ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Command name, e.g. `show-hosts` or `add-host`
    pub command: String,

    /// JSON payload
    #[arg(default_value = "{}", conflicts_with = "from_file")]
    pub payload: String,

    /// Read the JSON payload from a file
    #[arg(long, short = 'F')]
    pub from_file: Option<PathBuf>,

    /// Publish the session after a command that changes state
    #[arg(long)]
    pub publish: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile
    Init(InitArgs),

    /// Display current configuration (passwords masked)
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Profile name
    #[arg(long, default_value = "default")]
    pub name: String,

    /// Management server host
    #[arg(long)]
    pub server: String,

    #[arg(long, default_value = "443")]
    pub port: u16,

    /// Administrator user name
    #[arg(long)]
    pub user: String,

    /// Domain on a multi-domain server
    #[arg(long)]
    pub domain: Option<String>,

    /// Environment variable holding the password
    #[arg(long)]
    pub password_env: Option<String>,

    /// Mirror database file
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Skip TLS verification for this profile
    #[arg(long)]
    pub insecure: bool,

    /// Make this the default profile
    #[arg(long)]
    pub default: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
