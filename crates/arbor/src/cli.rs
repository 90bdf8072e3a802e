//! Clap derive structures for the `arbor` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Also
//! compiled by `build.rs` for man page generation, so it may only depend
//! on clap and clap_complete.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// arbor -- browse record hierarchies from the command line
#[derive(Debug, Parser)]
#[command(
    name = "arbor",
    version,
    about = "Browse record hierarchies from the command line",
    long_about = "Loads a hierarchy template from the platform, fetches the record\n\
        hierarchy around one record, enriches and sorts it, and prints it\n\
        as an outline or as structured data.",
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
    /// Platform profile to use
    #[arg(long, short = 'p', env = "ARBOR_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Platform base URL (overrides profile)
    #[arg(long, short = 'u', env = "ARBOR_URL", global = true)]
    pub url: Option<String>,

    /// Bearer token (overrides profile, env var, and keyring)
    #[arg(long, env = "ARBOR_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format (defaults to the configured output, then "tree")
    #[arg(long, short = 'o', env = "ARBOR_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "ARBOR_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "ARBOR_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented outline (default, interactive)
    Tree,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one identifier per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
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
    /// Fetch and print the hierarchy around a record
    #[command(alias = "t")]
    Tree(TreeArgs),

    /// Inspect hierarchy templates
    #[command(alias = "tpl")]
    Template(TemplateArgs),

    /// Validate and try out enrichment rules
    Rule(RuleArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Tree ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Record the hierarchy is built around (overrides profile)
    #[arg(long, short = 'r', env = "ARBOR_RECORD")]
    pub record: Option<String>,

    /// Template name (overrides profile)
    #[arg(long, short = 't', env = "ARBOR_TEMPLATE")]
    pub template: Option<String>,

    /// Identifier field of each record (overrides profile, default "Id")
    #[arg(long)]
    pub primary_key: Option<String>,

    /// Stop printing below this depth (0 = roots only)
    #[arg(long, short = 'd')]
    pub depth: Option<usize>,

    /// Hide the summary footer
    #[arg(long)]
    pub no_summary: bool,
}

// ── Template ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TemplateArgs {
    #[command(subcommand)]
    pub command: TemplateCommand,
}

#[derive(Debug, Subcommand)]
pub enum TemplateCommand {
    /// Load a template and show its parsed layout
    Show {
        /// Template name
        name: String,
    },
}

// ── Rule ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RuleArgs {
    #[command(subcommand)]
    pub command: RuleCommand,
}

#[derive(Debug, Subcommand)]
pub enum RuleCommand {
    /// Compile a rule and optionally run it against one record
    Check {
        /// Rule text, or @path to read it from a file
        rule: String,

        /// JSON file holding one record to enrich
        #[arg(long, short = 'r')]
        record: Option<PathBuf>,

        /// Base URL visible to the rule as `baseUrl`
        #[arg(long, default_value = "")]
        base_url: String,

        /// Identifier field of the record
        #[arg(long, default_value = "Id")]
        primary_key: String,
    },

    /// List the registered enrichment strategies
    Strategies,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (tokens masked)
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key (url, template, record_id, primary_key, tick_interval, ...)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a bearer token in the system keyring
    SetToken {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
