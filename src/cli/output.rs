//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::planner::{PlannedAction, ReconcilePlan};
use crate::reconciler::ReconciliationResult;
use crate::switch::{MirrorConfig, UpdateCode, UpdateReport};
use crate::vlan::{AccessState, ModeChange, Port, Vlan, VlanSet};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// VLAN row for table display.
#[derive(Tabled)]
struct VlanRow {
    #[tabled(rename = "ID")]
    id: u16,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Untagged")]
    untagged: String,
    #[tabled(rename = "Tagged")]
    tagged: String,
}

/// Plan action row for table display.
#[derive(Tabled)]
struct PlanActionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Details")]
    details: String,
}

/// JSON shape of a mirror change.
#[derive(Serialize)]
struct MirrorJson {
    enabled: bool,
    sources: Vec<u8>,
    destination: Option<u8>,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the VLAN table, excluded ports omitted.
    #[must_use]
    pub fn format_vlans(&self, vlans: &VlanSet) -> String {
        let vlans = vlans.without_excluded();
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&vlans).unwrap_or_default(),
            OutputFormat::Text => {
                let rows: Vec<VlanRow> = vlans
                    .iter()
                    .map(|(id, vlan)| VlanRow {
                        id: id.get(),
                        name: vlan.name.clone(),
                        untagged: port_list(vlan, AccessState::Untagged),
                        tagged: port_list(vlan, AccessState::Tagged),
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats a `vlan --set` command reproducing the VLAN set.
    #[must_use]
    pub fn format_command(&self, command: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&serde_json::json!({ "command": command }))
                    .unwrap_or_default()
            }
            OutputFormat::Text => format!("{command}\n"),
        }
    }

    /// Formats a dry-run plan.
    #[must_use]
    pub fn format_plan(&self, plan: &ReconcilePlan) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &ReconcilePlan) -> String {
        if plan.is_empty() {
            return format!(
                "{} No changes required - the switch is up to date.\n",
                "✓".green()
            );
        }

        let mut output = String::from("\nVLAN reconciliation plan (dry run)\n\n");

        let rows: Vec<PlanActionRow> = plan
            .actions
            .iter()
            .enumerate()
            .map(|(i, action)| {
                let (name, details) = Self::describe_action(action);
                PlanActionRow {
                    index: i + 1,
                    action: name,
                    details,
                }
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} mutations, nothing applied.\n",
            plan.len().to_string().yellow()
        );
        output
    }

    fn describe_action(action: &PlannedAction) -> (String, String) {
        match action {
            PlannedAction::SetMode { from, to } => {
                (String::from("set mode"), format!("{from} -> {to}"))
            }
            PlannedAction::AddVlan {
                vlan_id,
                name,
                access,
            } => (
                "add".green().to_string(),
                format!("VLAN {vlan_id} '{name}' {access}"),
            ),
            PlannedAction::EditVlan {
                vlan_id,
                name,
                access,
            } => (
                "edit".yellow().to_string(),
                format!("VLAN {vlan_id} '{name}' {access}"),
            ),
            PlannedAction::SetPvid { port, vlan_id } => {
                (String::from("set PVID"), format!("port {port} -> VLAN {vlan_id}"))
            }
            PlannedAction::DeleteVlan { vlan_id } => {
                ("delete".red().to_string(), format!("VLAN {vlan_id}"))
            }
        }
    }

    /// Formats a reconciliation result.
    #[must_use]
    pub fn format_reconciliation(&self, result: &ReconciliationResult) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text => {
                let status = if result.changed {
                    format!("{} VLAN configuration applied", "✓".green())
                } else {
                    format!("{} VLAN configuration already up to date", "✓".green())
                };

                let mut output = format!("{status}\n\n");
                let _ = writeln!(output, "   Mutations: {}", result.mutations);
                let _ = writeln!(output, "   Corrections: {}", result.corrections);
                if result.changed {
                    output.push('\n');
                    output.push_str(&self.format_vlans(&result.new));
                }
                output
            }
        }
    }

    /// Formats a VLAN mode change.
    #[must_use]
    pub fn format_mode_change(&self, change: &ModeChange) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(change).unwrap_or_default(),
            OutputFormat::Text => {
                if change.changed {
                    format!(
                        "{} VLAN mode changed from {} to {}\n",
                        "✓".green(),
                        change.old,
                        change.new
                    )
                } else {
                    format!("{} VLAN mode is already {}\n", "✓".green(), change.new)
                }
            }
        }
    }

    /// Formats the result of a PoE power cycle.
    #[must_use]
    pub fn format_poe(&self, ports: &BTreeSet<u8>) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&serde_json::json!({ "power_cycled": ports }))
                    .unwrap_or_default()
            }
            OutputFormat::Text => format!(
                "{} Power-cycled PoE ports: {}\n",
                "✓".green(),
                join_numbers(ports.iter().copied())
            ),
        }
    }

    /// Formats an applied port mirroring configuration.
    #[must_use]
    pub fn format_mirror(&self, config: &MirrorConfig) -> String {
        let json = match config {
            MirrorConfig::Disabled => MirrorJson {
                enabled: false,
                sources: Vec::new(),
                destination: None,
            },
            MirrorConfig::Enabled {
                sources,
                destination,
            } => MirrorJson {
                enabled: true,
                sources: sources.iter().map(|port| port.number()).collect(),
                destination: Some(destination.number()),
            },
        };

        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&json).unwrap_or_default(),
            OutputFormat::Text => match json.destination {
                Some(destination) => format!(
                    "{} Mirroring ports {} to port {destination}\n",
                    "✓".green(),
                    join_numbers(json.sources.iter().copied())
                ),
                None => format!("{} Port mirroring disabled\n", "✓".green()),
            },
        }
    }

    /// Formats a firmware update report.
    #[must_use]
    pub fn format_update(&self, report: &UpdateReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                let marker = match report.code {
                    UpdateCode::NoUpdate => "✓".green(),
                    UpdateCode::UpdateAvailable => "⚠".yellow(),
                    UpdateCode::Updated => "✓".green(),
                };
                let mut output = format!("{marker} {} ({})\n\n", report.message, report.code);
                let _ = writeln!(output, "   Running:  {}", report.new_version);
                let _ = writeln!(output, "   Previous: {}", report.old_version);
                let _ = writeln!(output, "   Latest:   {}", report.latest_version);
                let _ = writeln!(output, "   Elapsed:  {:.1}s", report.elapsed_secs);
                output
            }
        }
    }
}

fn port_list(vlan: &Vlan, access: AccessState) -> String {
    join_numbers(
        Port::all()
            .filter(|port| vlan.access(*port) == access)
            .map(Port::number),
    )
}

fn join_numbers(numbers: impl Iterator<Item = u8>) -> String {
    numbers
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
