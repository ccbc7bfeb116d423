//! Clap derive structures for the `lightpath` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lightpath -- where does the beam go right now?
#[derive(Debug, Parser)]
#[command(
    name = "lightpath",
    version,
    about = "Inspect beam paths through a branching photon facility",
    long_about = "Builds the facility graph from a device catalog and reports which\n\
        devices block or intercept the beam on the way to each destination.\n\n\
        Device state can be adjusted with --insert/--remove before a query runs.",
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
    /// Facility description file (overrides the config file)
    #[arg(long, short = 'f', global = true)]
    pub facility: Option<PathBuf>,

    /// Configuration file (default: platform config path)
    #[arg(long, short = 'c', env = "LIGHTPATH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Insert a device before querying (repeatable)
    #[arg(long, value_name = "DEVICE", value_delimiter = ',', global = true)]
    pub insert: Vec<String>,

    /// Remove a device before querying (repeatable)
    #[arg(long, value_name = "DEVICE", value_delimiter = ',', global = true)]
    pub remove: Vec<String>,

    /// Output format (default: from config, else table)
    #[arg(long, short = 'o', global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// List every device loaded into a destination path
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// List candidate paths per destination
    #[command(alias = "p")]
    Paths(PathsArgs),

    /// Show the active path to a destination and what blocks it
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Show the path that currently brings beam closest to a device
    PathTo(PathToArgs),

    /// List the devices where beam currently stops
    #[command(alias = "dest")]
    Destinations,

    /// Follow the live beam from every source
    Walk,

    /// Inspect CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command Arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Show catalog records that could not be loaded instead
    #[arg(long)]
    pub unavailable: bool,
}

#[derive(Debug, Args)]
pub struct PathsArgs {
    /// Only show candidates for this destination
    pub destination: Option<String>,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Destination name (e.g. XPP)
    pub destination: String,
}

#[derive(Debug, Args)]
pub struct PathToArgs {
    /// Device name
    pub device: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
