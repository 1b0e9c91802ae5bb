//! Clap derive structures for the `aquila` CLI.
//!
//! Defines the command tree, global flags, and shared argument types.
//! Also compiled by `build.rs`, so it may only depend on clap and
//! clap_complete.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// aquila -- command-line client for Aquila device hubs
#[derive(Debug, Parser)]
#[command(
    name = "aquila",
    version,
    about = "Control Aquila hub devices from the command line",
    long_about = "Log in to an Aquila hub, list its devices, and read, set, toggle or\n\
        watch the state of a device service (the MakerLab light switch by default).",
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
    /// Hub profile to use
    #[arg(long, short = 'p', env = "AQUILA_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Hub API root, e.g. http://aquila.local:8080/api/ (overrides profile)
    #[arg(long, short = 'H', env = "AQUILA_HUB", global = true)]
    pub hub: Option<String>,

    /// Session file (overrides the per-profile default)
    #[arg(long, env = "AQUILA_SESSION_FILE", global = true, hide_env = true)]
    pub session_file: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "AQUILA_OUTPUT",
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
    #[arg(long, short = 'k', env = "AQUILA_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "AQUILA_TIMEOUT", global = true)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MergeArg {
    /// Last response to complete wins
    CompletionOrder,
    /// Responses older than one already applied are dropped
    IssuanceOrder,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session token
    Login(LoginArgs),

    /// Forget the stored session
    Logout,

    /// Show the current session
    Whoami,

    /// List hub devices of a class
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Read a device service
    State(TargetArgs),

    /// Switch a device service on or off
    Set(SetArgs),

    /// Flip a device service
    Toggle(TargetArgs),

    /// Bind a device and stream its state until interrupted
    Watch(WatchArgs),

    /// Ask the hub to reload its configuration
    Reload,

    /// Ask the hub to rescan for devices
    Discover,

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Session ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// User name (prompted when omitted)
    #[arg(long, short = 'u', env = "AQUILA_USER")]
    pub user: Option<String>,

    /// Password (prompted when omitted)
    #[arg(long, env = "AQUILA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Read the password from the first line of stdin
    #[arg(long, conflicts_with = "password")]
    pub password_stdin: bool,
}

// ── Devices & services ───────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Device class (defaults to the profile's class)
    #[arg(long)]
    pub class: Option<String>,
}

/// Which device and service a command acts on.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Device id (defaults to the first device of the class)
    #[arg(long, short = 'd')]
    pub device: Option<String>,

    /// Device class (defaults to the profile's class)
    #[arg(long)]
    pub class: Option<String>,

    /// Service name (defaults to the profile's service)
    #[arg(long, short = 's')]
    pub service: Option<String>,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Desired state
    pub state: Switch,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Device class (defaults to the profile's class)
    #[arg(long)]
    pub class: Option<String>,

    /// Service name (defaults to the profile's service)
    #[arg(long, short = 's')]
    pub service: Option<String>,

    /// Refresh period in milliseconds
    #[arg(long, short = 'i')]
    pub interval_ms: Option<u64>,

    /// How overlapping responses are merged
    #[arg(long)]
    pub merge: Option<MergeArg>,

    /// Refresh on device push notifications
    #[arg(long)]
    pub push: bool,

    /// Exit after this many printed updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or extend the config file (prompts for missing values)
    Init {
        /// Profile name
        #[arg(long)]
        name: Option<String>,

        /// Hub API root
        #[arg(long = "hub-url")]
        hub_url: Option<String>,

        /// Leave the current default profile unchanged
        #[arg(long)]
        keep_default: bool,
    },

    /// Display the loaded configuration
    Show,

    /// Print the config file location
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
