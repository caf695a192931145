//! Clap derive structures for the `meshly` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// meshly -- control an Avion mesh lighting hub from the command line
#[derive(Debug, Parser)]
#[command(
    name = "meshly",
    version,
    about = "Manage Avion mesh lighting from the command line",
    long_about = "A CLI for Avion/CSRMesh lighting hubs.\n\n\
        Talks to the hub's HTTP command API and mirrors live state from\n\
        its server-sent-events push channel.",
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
    /// Hub base URL (e.g. http://avion-hub.local)
    #[arg(long, short = 'H', env = "MESHLY_HUB", global = true)]
    pub hub: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "MESHLY_OUTPUT",
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

    /// Request timeout in seconds
    #[arg(long, env = "MESHLY_TIMEOUT", default_value = "10", global = true)]
    pub timeout: u64,

    /// Seconds to wait for the hub's initial state replay
    #[arg(long, env = "MESHLY_SYNC_TIMEOUT", default_value = "15", global = true)]
    pub sync_timeout: u64,
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
    /// Show mesh and radio status
    #[command(alias = "st")]
    Status,

    /// Manage claimed devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Manage groups
    #[command(alias = "grp", alias = "g")]
    Groups(GroupsArgs),

    /// Scan the mesh or the airwaves for devices
    Scan(ScanArgs),

    /// Claim an unassociated device by uuid hash
    Claim(ClaimArgs),

    /// Toggle MQTT exposure for a device, group, or the mesh (id 0)
    Mqtt(MqttArgs),

    /// Mesh setup and persistence
    #[command(alias = "sys")]
    System(SystemArgs),

    /// Stream live updates and the hub's diagnostics feed
    #[command(alias = "w")]
    Watch,

    /// Inspect CLI configuration
    Config(ConfigArgs),
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List claimed devices
    #[command(alias = "ls")]
    List,

    /// Show one device in detail
    Show { avion_id: u16 },

    /// Turn a device fully on
    On { avion_id: u16 },

    /// Turn a device off
    Off { avion_id: u16 },

    /// Set brightness (0-255)
    #[command(alias = "bri")]
    Brightness { avion_id: u16, value: u8 },

    /// Set color temperature in Kelvin
    Temp { avion_id: u16, kelvin: u16 },

    /// Query firmware and identity details over the mesh
    Examine { avion_id: u16 },

    /// Unclaim (remove) a device from the mesh
    #[command(alias = "rm")]
    Remove { avion_id: u16 },

    /// Register a device found by `scan mesh`
    Add {
        device_id: u16,
        /// Display name (defaults to "Device <id>")
        #[arg(long)]
        name: Option<String>,
        /// Product type code (defaults to 134, Smart Bulb)
        #[arg(long)]
        product: Option<u8>,
    },
}

// ── Groups ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GroupsArgs {
    #[command(subcommand)]
    pub command: GroupsCommand,
}

#[derive(Debug, Subcommand)]
pub enum GroupsCommand {
    /// List groups (including the broadcast pseudo-group)
    #[command(alias = "ls")]
    List,

    /// Create a group
    Create { name: String },

    /// Delete a group
    #[command(alias = "rm")]
    Delete { group_id: u16 },

    /// Add a device to a group
    Add { group_id: u16, avion_id: u16 },

    /// Remove a device from a group
    Remove { group_id: u16, avion_id: u16 },

    /// Turn a whole group on (group 0 = everything)
    On { group_id: u16 },

    /// Turn a whole group off
    Off { group_id: u16 },

    /// Set group brightness (0-255)
    #[command(alias = "bri")]
    Brightness { group_id: u16, value: u8 },

    /// Set group color temperature in Kelvin
    Temp { group_id: u16, kelvin: u16 },
}

// ── Scanning / provisioning ──────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[command(subcommand)]
    pub command: ScanCommand,
}

#[derive(Debug, Subcommand)]
pub enum ScanCommand {
    /// Ping every address on the mesh and list responders
    Mesh,

    /// Listen for unassociated (unclaimed) devices
    New,
}

#[derive(Debug, Args)]
pub struct ClaimArgs {
    /// uuid hash as printed by `scan new` (e.g. 0x00c0ffee)
    pub uuid_hash: String,

    /// Display name (defaults to "Unknown Device")
    #[arg(long)]
    pub name: Option<String>,

    /// Product type code (defaults to 134, Smart Bulb)
    #[arg(long)]
    pub product: Option<u8>,
}

#[derive(Debug, Args)]
pub struct MqttArgs {
    /// Device or group id; 0 targets the mesh bridge itself
    pub id: u16,

    /// on / off
    pub state: OnOff,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

impl OnOff {
    pub fn as_bool(self) -> bool {
        matches!(self, Self::On)
    }
}

// ── System ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SystemArgs {
    #[command(subcommand)]
    pub command: SystemCommand,
}

#[derive(Debug, Subcommand)]
pub enum SystemCommand {
    /// Set the mesh passphrase
    Passphrase {
        /// The passphrase; if a multiple of 4 chars it must be base64
        /// decoding to at least 16 bytes
        passphrase: String,
    },

    /// Generate and set a random passphrase, printing it once
    GeneratePassphrase,

    /// Persist devices and groups to hub flash
    Save,

    /// Import a JSON backup of devices and groups
    Import {
        /// Path to the backup file
        file: PathBuf,
    },

    /// Erase all mesh configuration on the hub
    FactoryReset,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the effective configuration
    Show,
}
