//! Diff between desired and current VLAN state.
//!
//! This module synthesizes the complete target topology (including the
//! default VLAN) from the operator's desired VLANs, and splits VLAN IDs
//! into additions, common VLANs and removals.

use std::collections::BTreeMap;
use tracing::debug;

use crate::vlan::{AccessState, DEFAULT_VLAN_NAME, Port, Vlan, VlanId, VlanSet};

/// Complete target state: every VLAN to keep plus each port's home VLAN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTopology {
    /// Target VLANs, VLAN 1 included.
    vlans: VlanSet,
    /// Home (PVID) VLAN of every port.
    homes: BTreeMap<Port, VlanId>,
}

impl TargetTopology {
    /// Builds the target from desired VLANs.
    ///
    /// Every port is homed on VLAN 1 unless a desired VLAN marks it
    /// untagged. VLAN 1 is added when absent, named `Default`; when the
    /// operator supplies it, its name and tagged ports are kept. Either
    /// way, every port still homed on VLAN 1 is untagged in it and every
    /// other port that is not tagged in it is excluded.
    #[must_use]
    pub fn synthesize(desired: &VlanSet) -> Self {
        let mut homes: BTreeMap<Port, VlanId> =
            Port::all().map(|port| (port, VlanId::DEFAULT)).collect();

        for (id, vlan) in desired.iter() {
            for port in vlan.untagged_ports() {
                homes.insert(port, id);
            }
        }

        let supplied = desired.get(VlanId::DEFAULT);
        let mut default = Vlan::new(supplied.map_or(DEFAULT_VLAN_NAME, |v| v.name.as_str()));
        for port in Port::all() {
            let access = if homes.get(&port) == Some(&VlanId::DEFAULT) {
                AccessState::Untagged
            } else if supplied.is_some_and(|v| v.access(port) == AccessState::Tagged) {
                AccessState::Tagged
            } else {
                AccessState::Excluded
            };
            default.set_access(port, access);
        }

        let mut vlans = desired.clone();
        vlans.insert(VlanId::DEFAULT, default);

        debug!("Target topology has {} VLANs", vlans.len());
        Self { vlans, homes }
    }

    /// Returns the target VLANs.
    #[must_use]
    pub const fn vlans(&self) -> &VlanSet {
        &self.vlans
    }

    /// Returns a target VLAN.
    #[must_use]
    pub fn vlan(&self, id: VlanId) -> Option<&Vlan> {
        self.vlans.get(id)
    }

    /// Returns the home VLAN of a port.
    #[must_use]
    pub fn home(&self, port: Port) -> VlanId {
        self.homes.get(&port).copied().unwrap_or(VlanId::DEFAULT)
    }

    /// Returns `current` with every port homed on `id` made untagged.
    ///
    /// Nothing is removed, so the edit can never strip a port's PVID VLAN.
    #[must_use]
    pub fn join_home_ports(&self, id: VlanId, current: &Vlan) -> Vlan {
        let mut joined = current.clone();
        for port in Port::all().filter(|port| self.home(*port) == id) {
            joined.set_access(port, AccessState::Untagged);
        }
        joined
    }
}

/// VLAN IDs grouped by what has to happen to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VlanDiff {
    /// In the target but not on the device.
    pub additions: Vec<VlanId>,
    /// On both; may need an edit.
    pub common: Vec<VlanId>,
    /// On the device but not in the target. Never contains VLAN 1.
    pub removals: Vec<VlanId>,
}

impl VlanDiff {
    /// Compares current VLANs with the target.
    #[must_use]
    pub fn compute(current: &VlanSet, target: &TargetTopology) -> Self {
        let mut diff = Self::default();

        for id in target.vlans().ids() {
            if current.contains(id) {
                diff.common.push(id);
            } else {
                diff.additions.push(id);
            }
        }

        diff.removals = current
            .ids()
            .filter(|id| !id.is_default() && !target.vlans().contains(*id))
            .collect();

        debug!(
            "Diff: {} additions, {} common, {} removals",
            diff.additions.len(),
            diff.common.len(),
            diff.removals.len()
        );
        diff
    }
}

/// Returns true if a VLAN has to be submitted to reach its target config.
#[must_use]
pub fn needs_edit(current: Option<&Vlan>, target: Option<&Vlan>) -> bool {
    match (current, target) {
        (Some(current), Some(target)) => !current.same_config(target),
        (None, Some(_)) => true,
        (_, None) => false,
    }
}

/// What the PVID pass has to do for one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvidStep {
    /// The port already has its home VLAN as PVID.
    Keep,
    /// The home VLAN is selectable; only the PVID changes.
    Select,
    /// The port is not a member of its home VLAN yet; join, then select.
    JoinThenSelect,
}

impl PvidStep {
    /// Decides the step from the port's PVID table entry.
    #[must_use]
    pub fn decide(selected: Option<VlanId>, selectable: bool, home: VlanId) -> Self {
        if selected == Some(home) {
            Self::Keep
        } else if selectable {
            Self::Select
        } else {
            Self::JoinThenSelect
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(n: u8) -> Port {
        Port::new(n).expect("valid port")
    }

    fn id(n: u16) -> VlanId {
        VlanId::new(n).expect("valid id")
    }

    fn desired(entries: Vec<(u16, Vlan)>) -> VlanSet {
        entries.into_iter().map(|(n, vlan)| (id(n), vlan)).collect()
    }

    #[test]
    fn test_synthesize_default_vlan() {
        let target = TargetTopology::synthesize(&desired(vec![(
            10,
            Vlan::new("cams")
                .with_port(port(1), AccessState::Untagged)
                .with_port(port(2), AccessState::Tagged),
        )]));

        let default = target.vlan(VlanId::DEFAULT).expect("vlan 1");
        assert_eq!(default.name, "Default");
        assert_eq!(default.access(port(1)), AccessState::Excluded);
        assert_eq!(default.access(port(2)), AccessState::Untagged);
        assert_eq!(default.access(port(16)), AccessState::Untagged);

        assert_eq!(target.home(port(1)), id(10));
        assert_eq!(target.home(port(2)), VlanId::DEFAULT);
    }

    #[test]
    fn test_supplied_default_vlan_keeps_name_and_tags() {
        let target = TargetTopology::synthesize(&desired(vec![
            (
                1,
                Vlan::new("mgmt")
                    .with_port(port(3), AccessState::Tagged)
                    .with_port(port(4), AccessState::Excluded),
            ),
            (20, Vlan::new("iot").with_port(port(3), AccessState::Untagged)),
        ]));

        let default = target.vlan(VlanId::DEFAULT).expect("vlan 1");
        assert_eq!(default.name, "mgmt");
        assert_eq!(default.access(port(3)), AccessState::Tagged);
        // Port 4 is still homed on VLAN 1, so it cannot be excluded from it.
        assert_eq!(default.access(port(4)), AccessState::Untagged);
    }

    #[test]
    fn test_every_port_has_one_home() {
        let target = TargetTopology::synthesize(&desired(vec![
            (10, Vlan::new("a").with_port(port(5), AccessState::Untagged)),
            (20, Vlan::new("b").with_port(port(6), AccessState::Untagged)),
        ]));

        for p in Port::all() {
            let owners: Vec<VlanId> = target
                .vlans()
                .iter()
                .filter(|(_, vlan)| vlan.access(p) == AccessState::Untagged)
                .map(|(vlan_id, _)| vlan_id)
                .collect();
            assert_eq!(owners, vec![target.home(p)], "port {p}");
        }
    }

    #[test]
    fn test_diff_groups() {
        let current = desired(vec![
            (1, Vlan::new("Default")),
            (20, Vlan::new("old")),
            (30, Vlan::new("keep")),
        ]);
        let target = TargetTopology::synthesize(&desired(vec![
            (10, Vlan::new("new")),
            (30, Vlan::new("keep")),
        ]));

        let diff = VlanDiff::compute(&current, &target);
        assert_eq!(diff.additions, vec![id(10)]);
        assert_eq!(diff.common, vec![VlanId::DEFAULT, id(30)]);
        assert_eq!(diff.removals, vec![id(20)]);
        assert!(needs_edit(current.get(VlanId::DEFAULT), target.vlan(VlanId::DEFAULT)));
        assert!(!needs_edit(current.get(id(30)), target.vlan(id(30))));
    }

    #[test]
    fn test_join_home_ports_never_removes() {
        let target = TargetTopology::synthesize(&desired(vec![(
            30,
            Vlan::new("cams").with_port(port(4), AccessState::Untagged),
        )]));
        let current = Vlan::new("cams").with_port(port(5), AccessState::Untagged);

        let joined = target.join_home_ports(id(30), &current);
        assert_eq!(joined.access(port(4)), AccessState::Untagged);
        assert_eq!(joined.access(port(5)), AccessState::Untagged);
    }

    #[test]
    fn test_pvid_step() {
        assert_eq!(PvidStep::decide(Some(id(10)), true, id(10)), PvidStep::Keep);
        assert_eq!(PvidStep::decide(Some(id(1)), true, id(10)), PvidStep::Select);
        assert_eq!(PvidStep::decide(Some(id(1)), false, id(10)), PvidStep::JoinThenSelect);
        assert_eq!(PvidStep::decide(None, false, id(10)), PvidStep::JoinThenSelect);
    }
}
