//! Clap derive structures for the `meshprov` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use meshprov_core::{Address, FilterType, KeyIndex, KeyValue, ModelId, SettingsId};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// meshprov -- provisioner-side keys, nodes and heartbeat filtering
#[derive(Debug, Parser)]
#[command(
    name = "meshprov",
    version,
    about = "Manage a mesh provisioner's keys, nodes and settings from the command line",
    long_about = "Drives the provisioner core against file-backed settings storage.\n\n\
        Every invocation opens and restores one settings session, runs the\n\
        command, writes the session back and closes it again.",
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
    /// Settings session: a slot index, or a user id of up to 19 bytes
    #[arg(long, short = 'S', env = "MESHPROV_SESSION", global = true)]
    pub session: Option<SettingsId>,

    /// Directory holding settings regions (overrides config)
    #[arg(long, env = "MESHPROV_STORAGE_DIR", global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Config file to load instead of the platform default
    #[arg(long, env = "MESHPROV_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (defaults to the config file's choice, then table)
    #[arg(long, short = 'o', env = "MESHPROV_OUTPUT", global = true)]
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

impl GlobalOpts {
    pub fn output(&self) -> OutputFormat {
        self.output.unwrap_or_default()
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    #[default]
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
    /// Summarize the selected settings session
    Status,

    /// Inspect and administer settings slots
    #[command(alias = "s")]
    Settings(SettingsArgs),

    /// Manage network keys
    #[command(alias = "nk")]
    NetKey(NetKeyArgs),

    /// Manage application keys and local model bindings
    #[command(alias = "ak")]
    AppKey(AppKeyArgs),

    /// Manage provisioned nodes
    #[command(alias = "n")]
    Node(NodeArgs),

    /// Configure heartbeat reception and filtering
    #[command(alias = "hb")]
    Heartbeat(HeartbeatArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// List every slot with its user id
    #[command(alias = "ls")]
    List,

    /// Delete one slot's stored state
    #[command(alias = "rm")]
    Delete {
        /// Slot index or user id
        id: SettingsId,
    },

    /// Delete every slot and every user id mapping
    EraseAll,
}

// ── Net keys ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NetKeyArgs {
    #[command(subcommand)]
    pub command: NetKeyCommand,
}

#[derive(Debug, Subcommand)]
pub enum NetKeyCommand {
    /// Add a NetKey, generating the key and/or index when omitted
    Add {
        /// NetKey index (0x000-0xFFF); lowest free when omitted
        #[arg(long, short = 'i')]
        index: Option<KeyIndex>,

        /// Key as 32 hex digits; random when omitted
        #[arg(long, short = 'k')]
        key: Option<KeyValue>,
    },

    /// Replace the key material of an existing NetKey
    Update {
        index: KeyIndex,

        #[arg(long, short = 'k')]
        key: KeyValue,
    },

    /// Print a NetKey
    Get { index: KeyIndex },

    /// List NetKey indexes
    #[command(alias = "ls")]
    List,
}

// ── App keys ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AppKeyArgs {
    #[command(subcommand)]
    pub command: AppKeyCommand,
}

#[derive(Debug, Subcommand)]
pub enum AppKeyCommand {
    /// Add an AppKey bound to a NetKey
    Add {
        /// Owning NetKey index
        #[arg(long, short = 'n')]
        net: KeyIndex,

        /// AppKey index; lowest free when omitted
        #[arg(long, short = 'i')]
        index: Option<KeyIndex>,

        /// Key as 32 hex digits; random when omitted
        #[arg(long, short = 'k')]
        key: Option<KeyValue>,
    },

    /// Replace the key material of an existing AppKey
    Update {
        net: KeyIndex,
        app: KeyIndex,

        #[arg(long, short = 'k')]
        key: KeyValue,
    },

    /// Print an AppKey
    Get { net: KeyIndex, app: KeyIndex },

    /// List AppKeys with their NetKey
    #[command(alias = "ls")]
    List,

    /// Bind an AppKey to a model on one of the provisioner's own elements
    Bind {
        /// Local element address
        #[arg(long, short = 'e')]
        element: Address,

        /// AppKey index
        #[arg(long, short = 'a')]
        app: KeyIndex,

        /// Model: `0x1001` for a standard model, `company:model` for vendor
        #[arg(long, short = 'm')]
        model: ModelId,
    },

    /// List local model bindings
    Bindings,
}

// ── Nodes ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub command: NodeCommand,
}

#[derive(Debug, Subcommand)]
pub enum NodeCommand {
    /// Record a node as provisioned (as the provisioning procedure would)
    Add {
        /// Primary unicast address
        #[arg(long, short = 'u')]
        unicast: Address,

        /// Number of elements
        #[arg(long, short = 'e', default_value = "1")]
        elements: u8,

        /// NetKey index the node was provisioned with
        #[arg(long, short = 'n')]
        net: KeyIndex,

        /// Device UUID; random when omitted
        #[arg(long)]
        uuid: Option<uuid::Uuid>,

        /// Device key as 32 hex digits; random when omitted
        #[arg(long)]
        device_key: Option<KeyValue>,

        /// Name to assign right away
        #[arg(long)]
        name: Option<String>,
    },

    /// List provisioned nodes
    #[command(alias = "ls")]
    List,

    /// Show one node by UUID, element address or name
    Show { node: String },

    /// Set a node's name
    Rename { index: u16, name: String },

    /// Delete a node by UUID or element address
    #[command(alias = "rm")]
    Delete { node: String },

    /// Store composition data for the node owning an address
    CompData {
        address: Address,

        /// Raw composition data as hex
        data: String,
    },
}

// ── Heartbeat ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct HeartbeatArgs {
    #[command(subcommand)]
    pub command: HeartbeatCommand,
}

#[derive(Debug, Subcommand)]
pub enum HeartbeatCommand {
    /// Start receiving heartbeats (resets the filter to an empty blacklist)
    Start,

    /// Stop receiving heartbeats
    Stop,

    /// Switch between blacklist and whitelist (clears entries on change)
    FilterType { filter_type: FilterType },

    /// Add or refresh a filter entry
    Add {
        #[arg(long)]
        src: Option<Address>,

        #[arg(long)]
        dst: Option<Address>,

        /// Whitelist expiry in seconds; 0 never expires
        #[arg(long, default_value = "0")]
        expiry: u32,
    },

    /// Remove filter entries matching a source and/or destination
    #[command(alias = "rm")]
    Remove {
        #[arg(long)]
        src: Option<Address>,

        #[arg(long)]
        dst: Option<Address>,
    },

    /// Remove every filter entry
    Clean,

    /// Show receive state, filter type and entries
    #[command(alias = "ls")]
    List,

    /// Report whether a heartbeat from src to dst would be surfaced
    Check {
        #[arg(long)]
        src: Address,

        #[arg(long)]
        dst: Address,
    },

    /// Feed a heartbeat through the filter as if it had been received
    Inject {
        #[arg(long)]
        src: Address,

        #[arg(long)]
        dst: Address,

        #[arg(long, default_value = "5")]
        init_ttl: u8,

        #[arg(long, default_value = "5")]
        rx_ttl: u8,

        #[arg(long, default_value = "0")]
        features: u16,

        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        rssi: i8,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
