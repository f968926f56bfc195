//! CLI module for the gs316ep switch manager.
//!
//! This module provides the command-line interface for managing
//! a Netgear GS316EP switch.

mod commands;
mod output;

pub use commands::{Cli, Commands, GetArg, ModeArg, OutputFormat, VlanArgs};
pub use output::OutputFormatter;
