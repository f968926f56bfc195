//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::switch::{DEFAULT_REBOOT_WAIT_SECS, DEFAULT_TIMEOUT_SECS};
use crate::vlan::VlanMode;

/// gs316ep - Declarative VLAN, PoE and firmware management for the Netgear GS316EP.
#[derive(Parser, Debug)]
#[command(name = "gs316ep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Switch host name or IP address.
    #[arg(long, global = true, env = "SWITCH_HOST")]
    pub host: Option<String>,

    /// Switch HTTP port.
    #[arg(long, global = true, env = "SWITCH_PORT", default_value_t = 80)]
    pub port: u16,

    /// Switch admin password.
    #[arg(long, global = true, env = "SWITCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// HTTP or SOCKS proxy for reaching the switch.
    #[arg(long, global = true, env = "SWITCH_PROXY_URL")]
    pub proxy_url: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, global = true, env = "SWITCH_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Session token cache file (defaults to the user cache directory).
    #[arg(long, global = true, env = "SWITCH_TOKEN_CACHE")]
    pub token_cache: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read or reconcile the VLAN configuration.
    Vlan(VlanArgs),

    /// Power-cycle PoE ports.
    Poe {
        /// Ports to power-cycle (1-15).
        #[arg(long = "power-cycle-ports", alias = "reset", num_args = 1.., required = true)]
        power_cycle_ports: Vec<u8>,
    },

    /// Configure port mirroring.
    #[command(group(ArgGroup::new("mirror").required(true).args(["disable", "src_ports"])))]
    MirrorPort {
        /// Disable port mirroring.
        #[arg(long)]
        disable: bool,

        /// Ports whose traffic is mirrored (1-16).
        #[arg(long, num_args = 1.., requires = "dest_port")]
        src_ports: Vec<u8>,

        /// Port receiving the mirrored traffic (1-16).
        #[arg(long, conflicts_with = "disable")]
        dest_port: Option<u8>,
    },

    /// Check for and install new firmware.
    Update {
        /// Seconds to wait for the switch to come back after the upload.
        #[arg(long, default_value_t = DEFAULT_REBOOT_WAIT_SECS)]
        reboot_wait: u64,

        /// Only check whether a newer firmware exists.
        #[arg(long)]
        check_only: bool,
    },
}

/// Arguments of the `vlan` command.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("vlan_action").required(true).args(["mode", "set", "file", "get"])))]
pub struct VlanArgs {
    /// Set the VLAN mode.
    #[arg(long)]
    pub mode: Option<ModeArg>,

    /// Desired VLAN, as `VLANID[:NAME]@PORT:ACCESS[,PORT:ACCESS]...`.
    #[arg(long, value_name = "SPEC", num_args = 1..)]
    pub set: Vec<String>,

    /// Desired VLANs from a YAML file.
    #[arg(long, value_name = "YAML")]
    pub file: Option<PathBuf>,

    /// Print the current VLAN state.
    #[arg(long)]
    pub get: Option<GetArg>,

    /// Print the planned mutations without applying them.
    #[arg(long)]
    pub dry_run: bool,
}

/// VLAN modes that can be set from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// VLANs disabled.
    #[value(name = "no_vlans")]
    NoVlans,
    /// Advanced 802.1Q VLAN.
    #[value(name = "advanced_8021q")]
    Advanced8021Q,
}

impl From<ModeArg> for VlanMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::NoVlans => Self::NoVlans,
            ModeArg::Advanced8021Q => Self::Advanced8021Q,
        }
    }
}

/// What `vlan --get` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GetArg {
    /// The VLAN table without excluded ports.
    Info,
    /// A `vlan --set` command reproducing the current state.
    Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the switch base URL.
    #[must_use]
    pub fn base_url(&self) -> Option<String> {
        self.host
            .as_deref()
            .map(|host| format!("http://{host}:{}", self.port))
    }
}
