//! Reconciliation plan types and dry-run construction.
//!
//! A plan is the list of mutations the reconciler would perform against
//! the state it just read, in the same order. It is built by replaying the
//! reconciliation steps on an in-memory copy of that state. Corrections
//! for "cannot remove port" refusals are not predicted.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::switch::DeviceState;
use crate::vlan::{Port, Vlan, VlanId, VlanMode, VlanSet};

use super::diff::{PvidStep, TargetTopology, VlanDiff, needs_edit};

/// A single planned mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlannedAction {
    /// Switch the VLAN mode.
    SetMode {
        /// Active mode.
        from: VlanMode,
        /// Mode to switch to.
        to: VlanMode,
    },
    /// Create a VLAN.
    AddVlan {
        /// VLAN ID.
        vlan_id: VlanId,
        /// VLAN name.
        name: String,
        /// 16-character access string.
        access: String,
    },
    /// Replace an existing VLAN's name and membership.
    EditVlan {
        /// VLAN ID.
        vlan_id: VlanId,
        /// VLAN name.
        name: String,
        /// 16-character access string.
        access: String,
    },
    /// Select a port's PVID.
    SetPvid {
        /// Port number.
        port: u8,
        /// VLAN to select.
        vlan_id: VlanId,
    },
    /// Delete a VLAN.
    DeleteVlan {
        /// VLAN ID.
        vlan_id: VlanId,
    },
}

impl PlannedAction {
    fn add(id: VlanId, vlan: &Vlan) -> Self {
        Self::AddVlan {
            vlan_id: id,
            name: vlan.name.clone(),
            access: vlan.access_string(),
        }
    }

    fn edit(id: VlanId, vlan: &Vlan) -> Self {
        Self::EditVlan {
            vlan_id: id,
            name: vlan.name.clone(),
            access: vlan.access_string(),
        }
    }
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetMode { from, to } => write!(f, "set mode {from} -> {to}"),
            Self::AddVlan {
                vlan_id,
                name,
                access,
            } => write!(f, "add VLAN {vlan_id} '{name}' ({access})"),
            Self::EditVlan {
                vlan_id,
                name,
                access,
            } => write!(f, "edit VLAN {vlan_id} '{name}' ({access})"),
            Self::SetPvid { port, vlan_id } => write!(f, "set PVID of port {port} to {vlan_id}"),
            Self::DeleteVlan { vlan_id } => write!(f, "delete VLAN {vlan_id}"),
        }
    }
}

/// Ordered mutations a reconciliation would perform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcilePlan {
    /// Planned actions in execution order.
    pub actions: Vec<PlannedAction>,
}

/// In-memory copy of the device used while replaying the steps.
struct Simulation {
    vlans: VlanSet,
    pvids: BTreeMap<Port, Option<VlanId>>,
    actions: Vec<PlannedAction>,
}

impl Simulation {
    fn submit(&mut self, id: VlanId, vlan: &Vlan) {
        let action = if self.vlans.contains(id) {
            PlannedAction::edit(id, vlan)
        } else {
            PlannedAction::add(id, vlan)
        };
        self.actions.push(action);
        self.vlans.insert(id, vlan.clone());
    }

    fn selectable(&self, port: Port, id: VlanId) -> bool {
        self.vlans
            .get(id)
            .is_some_and(|vlan| vlan.member_ports().any(|member| member == port))
    }
}

impl ReconcilePlan {
    /// Builds the plan for reaching `target` from the observed device state.
    #[must_use]
    pub fn simulate(mode: VlanMode, state: &DeviceState, target: &TargetTopology) -> Self {
        let mut sim = Simulation {
            vlans: state.vlans.clone(),
            pvids: Port::all()
                .map(|port| (port, state.pvids.selected(port)))
                .collect(),
            actions: Vec::new(),
        };

        if mode != VlanMode::Advanced8021Q {
            sim.actions.push(PlannedAction::SetMode {
                from: mode,
                to: VlanMode::Advanced8021Q,
            });
        }

        let diff = VlanDiff::compute(&state.vlans, target);

        for id in &diff.additions {
            if let Some(vlan) = target.vlan(*id) {
                sim.submit(*id, vlan);
            }
        }

        for port in Port::all() {
            let home = target.home(port);
            let selected = sim.pvids.get(&port).copied().flatten();
            match PvidStep::decide(selected, sim.selectable(port, home), home) {
                PvidStep::Keep => continue,
                PvidStep::Select => {}
                PvidStep::JoinThenSelect => {
                    if let Some(current) = sim.vlans.get(home).cloned() {
                        let joined = target.join_home_ports(home, &current);
                        sim.submit(home, &joined);
                    }
                }
            }
            sim.actions.push(PlannedAction::SetPvid {
                port: port.number(),
                vlan_id: home,
            });
            sim.pvids.insert(port, Some(home));
        }

        for id in &diff.common {
            if needs_edit(sim.vlans.get(*id), target.vlan(*id)) {
                if let Some(vlan) = target.vlan(*id) {
                    sim.submit(*id, vlan);
                }
            }
        }

        for id in diff.removals {
            sim.actions.push(PlannedAction::DeleteVlan { vlan_id: id });
        }

        Self {
            actions: sim.actions,
        }
    }

    /// Returns true if the device already matches the target.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

impl std::fmt::Display for ReconcilePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.actions.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Reconciliation plan ({} actions):", self.actions.len())?;
        for (i, action) in self.actions.iter().enumerate() {
            writeln!(f, "  {}. {action}", i + 1)?;
        }
        Ok(())
    }
}
