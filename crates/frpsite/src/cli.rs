//! Clap derive structures for the `frpsite` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// frpsite -- manage frpc tunnel sites from the command line
#[derive(Debug, Parser)]
#[command(
    name = "frpsite",
    version,
    about = "Manage frpc tunnel sites from the command line",
    long_about = "Register edge sites, allocate local bind ports, and sync the\n\
        result into a running frpc client through its admin API.",
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
    /// Profile to use
    #[arg(long, short = 'p', env = "FRPSITE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Admin endpoint URL (overrides profile)
    #[arg(long, short = 'e', env = "FRPSITE_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Admin username (overrides profile)
    #[arg(long, env = "FRPSITE_ADMIN_USER", global = true)]
    pub username: Option<String>,

    /// Proxy-name prefix for newly created configs (overrides profile)
    #[arg(long, env = "FRPSITE_PREFIX", global = true)]
    pub prefix: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FRPSITE_OUTPUT",
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "FRPSITE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "FRPSITE_TIMEOUT", global = true)]
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
    /// Manage registered sites
    #[command(alias = "s")]
    Sites(SitesArgs),

    /// Manage a site's proxy configs
    Proxy(ProxyArgs),

    /// Batch-import sites from a JSON file
    Import(ImportArgs),

    /// Load the live configuration and show a summary
    Pull,

    /// Serialize the registry and push it live (resolves pending ports)
    Push,

    /// Print the generated INI without pushing it
    ShowConfig,

    /// Probe for the frpc admin port
    Detect(DetectArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SITES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SitesArgs {
    #[command(subcommand)]
    pub command: SitesCommand,
}

#[derive(Debug, Subcommand)]
pub enum SitesCommand {
    /// List registered sites
    #[command(alias = "ls")]
    List(SitesListArgs),

    /// Show one site in detail
    Show {
        /// Site MAC address
        mac: String,
    },

    /// Register a new site
    Add {
        /// Site MAC address
        #[arg(value_name = "MAC")]
        mac: String,

        /// Site code (unique when non-empty)
        #[arg(long)]
        code: Option<String>,

        /// Human-readable site name
        #[arg(long)]
        name: Option<String>,

        /// Site password
        #[arg(long)]
        password: Option<String>,

        /// Tags (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Skip provisioning the default SSH/MySQL/panel proxies
        #[arg(long)]
        no_defaults: bool,
    },

    /// Remove a site and all its proxies
    #[command(alias = "rm")]
    Remove {
        /// Site MAC address
        mac: String,
    },

    /// Update fields of an existing site
    Set {
        /// Site MAC address
        mac: String,

        /// New MAC address (rewrites every proxy's sk)
        #[arg(long)]
        new_mac: Option<String>,

        /// New site code
        #[arg(long)]
        code: Option<String>,

        /// New site name
        #[arg(long)]
        name: Option<String>,

        /// New password
        #[arg(long)]
        password: Option<String>,
    },

    /// Manage a site's tags
    Tag(TagArgs),
}

#[derive(Debug, Args)]
pub struct SitesListArgs {
    /// Only sites carrying this tag (use 无标签 for untagged)
    #[arg(long, short = 't')]
    pub tag: Option<String>,

    /// Substring match on code, name, or tags
    #[arg(long, short = 's')]
    pub search: Option<String>,
}

#[derive(Debug, Args)]
pub struct TagArgs {
    #[command(subcommand)]
    pub command: TagCommand,
}

#[derive(Debug, Subcommand)]
pub enum TagCommand {
    /// Add a tag to a site (no-op if already present)
    Add {
        /// Site MAC address
        mac: String,
        /// Tag to add
        tag: String,
    },

    /// Remove a tag from a site
    #[command(alias = "rm")]
    Remove {
        /// Site MAC address
        mac: String,
        /// Tag to remove
        tag: String,
    },

    /// List all tags in use
    #[command(alias = "ls")]
    List,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PROXY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ProxyArgs {
    #[command(subcommand)]
    pub command: ProxyCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProxyCommand {
    /// List a site's proxy configs
    #[command(alias = "ls")]
    List {
        /// Site MAC address
        mac: String,
    },

    /// Add a proxy config for one service port
    Add {
        /// Site MAC address
        mac: String,

        /// Remote service port (e.g. 22, 3306, 5000)
        #[arg(value_name = "SERVICE_PORT")]
        service_port: u16,

        /// Local bind address
        #[arg(long, default_value = "0.0.0.0")]
        bind_addr: String,

        /// Local bind port; 0 defers allocation to the next push
        #[arg(long, default_value = "0")]
        bind_port: u16,
    },

    /// Remove a proxy config by section name
    #[command(alias = "rm")]
    Remove {
        /// Site MAC address
        mac: String,

        /// Proxy section name (e.g. R-AABBCCDDEEFF-22)
        name: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  IMPORT
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// JSON file containing an array of sites
    pub file: PathBuf,

    /// What to do with entries whose MAC already exists
    #[arg(long, default_value = "report", value_enum)]
    pub on_duplicate: DuplicatePolicy,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum DuplicatePolicy {
    /// Import the rest, list the duplicates without touching them
    Report,
    /// Skip duplicates silently
    Skip,
    /// Overwrite the existing sites' fields in place
    Overwrite,
    /// Count each duplicate as a per-entry error
    Fail,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DETECT
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Host to probe (defaults to the profile's host)
    #[arg(long)]
    pub host: Option<String>,

    /// Candidate ports (comma-separated; defaults to the common set)
    #[arg(long, value_delimiter = ',')]
    pub ports: Option<Vec<u16>>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store an admin password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
