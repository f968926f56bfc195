//! Reconciler for converging the switch onto the desired VLANs.
//!
//! This module implements the reconciliation sequence: force the advanced
//! 802.1Q mode, add missing VLANs, move every port's PVID to its home VLAN,
//! edit the VLANs that differ, delete the ones no longer wanted, and read
//! the device back to check that it converged.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ReconcileError, Result};
use crate::planner::{PlanExecutor, PvidStep, ReconcilePlan, TargetTopology, VlanDiff};
use crate::switch::SwitchTransport;
use crate::vlan::{Port, VlanId, VlanMode, VlanSet};

/// Reconciler for one switch session.
#[derive(Debug)]
pub struct Reconciler<'a, T: SwitchTransport + ?Sized> {
    /// Device the mutations go to.
    transport: &'a T,
    /// Corrections allowed per VLAN submission.
    max_corrections: usize,
}

/// Result of a reconciliation run.
#[derive(Debug, Serialize)]
pub struct ReconciliationResult {
    /// Whether the device was modified.
    pub changed: bool,
    /// VLANs before the run, excluded ports omitted.
    pub old: VlanSet,
    /// VLANs after the run, excluded ports omitted.
    pub new: VlanSet,
    /// Number of mutations the device applied.
    pub mutations: usize,
    /// Number of "cannot remove port" corrections performed.
    pub corrections: usize,
}

impl<'a, T: SwitchTransport + ?Sized> Reconciler<'a, T> {
    /// Creates a new reconciler.
    #[must_use]
    pub const fn new(transport: &'a T) -> Self {
        Self {
            transport,
            max_corrections: crate::planner::MAX_CORRECTIONS,
        }
    }

    /// Sets the corrections allowed per VLAN submission.
    #[must_use]
    pub const fn with_max_corrections(mut self, max_corrections: usize) -> Self {
        self.max_corrections = max_corrections;
        self
    }

    /// Converges the device onto the desired VLANs.
    ///
    /// VLAN 1 is always kept. Every port not untagged in a desired VLAN
    /// ends up untagged in VLAN 1 with PVID 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the mode cannot be set, a mutation is rejected,
    /// or the device does not show the target state afterwards.
    pub async fn reconcile(&self, desired: &VlanSet) -> Result<ReconciliationResult> {
        info!("Starting VLAN reconciliation ({} desired VLANs)", desired.len());

        let mut executor =
            PlanExecutor::new(self.transport).with_max_corrections(self.max_corrections);

        executor.ensure_mode(VlanMode::Advanced8021Q).await?;

        let current = executor.device().read_state().await?;
        let old = current.vlans.without_excluded();

        let target = TargetTopology::synthesize(desired);
        let diff = VlanDiff::compute(&current.vlans, &target);

        for id in &diff.additions {
            if let Some(vlan) = target.vlan(*id) {
                executor.submit(*id, vlan).await?;
            }
        }

        Self::move_pvids(&mut executor, &target).await?;

        for id in &diff.common {
            let vlans = executor.device().read_vlans().await?;
            let Some(vlan) = target.vlan(*id) else {
                continue;
            };
            if vlans.get(*id).is_some_and(|current| current.same_config(vlan)) {
                debug!("VLAN {id} already matches");
                continue;
            }
            executor.submit(*id, vlan).await?;
        }

        for id in &diff.removals {
            executor.delete(*id).await?;
        }

        let new = Self::verify(&executor, &target, &diff).await?;

        let result = ReconciliationResult {
            changed: executor.mutations() > 0,
            old,
            new,
            mutations: executor.mutations(),
            corrections: executor.corrections(),
        };

        info!(
            "Reconciliation finished: {} mutations, {} corrections",
            result.mutations, result.corrections
        );
        Ok(result)
    }

    /// Computes the mutations a reconciliation would perform, without applying them.
    ///
    /// # Errors
    ///
    /// Returns an error if the device state cannot be read.
    pub async fn plan(&self, desired: &VlanSet) -> Result<ReconcilePlan> {
        let executor = PlanExecutor::new(self.transport);
        let mode = executor.device().read_mode().await?;
        let current = executor.device().read_state().await?;
        let target = TargetTopology::synthesize(desired);

        let plan = ReconcilePlan::simulate(mode, &current, &target);
        debug!("Dry run planned {} actions", plan.len());
        Ok(plan)
    }

    /// Selects every port's home VLAN as its PVID, joining it first when needed.
    async fn move_pvids(executor: &mut PlanExecutor<'a, T>, target: &TargetTopology) -> Result<()> {
        let mut mapping = executor.device().read_pvid_mapping().await?;

        for port in Port::all() {
            let home = target.home(port);
            let step = PvidStep::decide(mapping.selected(port), mapping.can_select(port, home), home);

            match step {
                PvidStep::Keep => continue,
                PvidStep::Select => {}
                PvidStep::JoinThenSelect => {
                    let vlans = executor.device().read_vlans().await?;
                    let current = vlans.get(home).ok_or_else(|| ReconcileError::NotConverged {
                        vlan_id: home.get(),
                        detail: format!("home VLAN of port {port} is missing"),
                    })?;
                    let joined = target.join_home_ports(home, current);
                    executor.submit(home, &joined).await?;
                }
            }

            mapping = executor.set_pvid(port, home).await?;
        }

        Ok(())
    }

    /// Reads the device back and checks it against the target.
    async fn verify(
        executor: &PlanExecutor<'a, T>,
        target: &TargetTopology,
        diff: &VlanDiff,
    ) -> Result<VlanSet> {
        let state = executor.device().read_state().await?;

        for (id, vlan) in target.vlans().iter() {
            if !state.vlans.get(id).is_some_and(|actual| actual.same_config(vlan)) {
                return Err(not_converged(id, "VLAN does not match its target"));
            }
        }

        if let Some(id) = diff.removals.iter().find(|id| state.vlans.contains(**id)) {
            return Err(not_converged(*id, "VLAN is still present"));
        }

        for port in Port::all() {
            let home = target.home(port);
            if state.pvids.selected(port) != Some(home) {
                return Err(not_converged(home, format!("port {port} does not have it as PVID")));
            }
        }

        Ok(state.vlans.without_excluded())
    }
}

fn not_converged(id: VlanId, detail: impl Into<String>) -> crate::error::SwitchError {
    ReconcileError::NotConverged {
        vlan_id: id.get(),
        detail: detail.into(),
    }
    .into()
}

impl std::fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.changed { "applied" } else { "already converged" };
        writeln!(f, "Reconciliation {status}:")?;
        writeln!(f, "  Mutations: {}", self.mutations)?;
        writeln!(f, "  Corrections: {}", self.corrections)?;
        writeln!(f, "  VLANs before: {}", self.old.len())?;
        write!(f, "  VLANs after: {}", self.new.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{VlanValidator, parse_set_specs};
    use crate::error::{DeviceError, ModeError, SwitchError};
    use crate::planner::PlannedAction;
    use crate::switch::fake::FakeSwitch;
    use crate::vlan::{AccessState, Vlan};

    fn port(n: u8) -> Port {
        Port::new(n).expect("valid port")
    }

    fn id(n: u16) -> VlanId {
        VlanId::new(n).expect("valid id")
    }

    fn desired(entries: Vec<(u16, Vlan)>) -> VlanSet {
        entries.into_iter().map(|(n, vlan)| (id(n), vlan)).collect()
    }

    fn assert_every_port_homed(switch: &FakeSwitch) {
        let vlans = switch.vlans();
        for p in Port::all() {
            let owners = vlans
                .iter()
                .filter(|(_, vlan)| vlan.access(p) == AccessState::Untagged)
                .count();
            assert_eq!(owners, 1, "port {p} must be untagged in exactly one VLAN");
        }
    }

    #[tokio::test]
    async fn test_mutation_order() {
        let switch = FakeSwitch::factory_default();
        let wanted = desired(vec![(10, Vlan::new("cams").with_port(port(1), AccessState::Untagged))]);

        let result = Reconciler::new(&switch).reconcile(&wanted).await.expect("reconcile");

        assert!(result.changed);
        assert_eq!(result.mutations, 3);
        assert_eq!(switch.actions(), vec!["add 10", "pvid 1=10", "edit 1"]);
        assert_eq!(switch.pvid(1), Some(id(10)));
        assert_every_port_homed(&switch);
    }

    #[tokio::test]
    async fn test_plan_matches_reconcile() {
        let switch = FakeSwitch::factory_default();
        let wanted = desired(vec![(10, Vlan::new("cams").with_port(port(1), AccessState::Untagged))]);

        let plan = Reconciler::new(&switch).plan(&wanted).await.expect("plan");
        assert!(switch.actions().is_empty());

        let kinds: Vec<String> = plan
            .actions
            .iter()
            .map(|action| match action {
                PlannedAction::AddVlan { vlan_id, .. } => format!("add {vlan_id}"),
                PlannedAction::EditVlan { vlan_id, .. } => format!("edit {vlan_id}"),
                PlannedAction::SetPvid { port, vlan_id } => format!("pvid {port}={vlan_id}"),
                PlannedAction::DeleteVlan { vlan_id } => format!("delete {vlan_id}"),
                PlannedAction::SetMode { to, .. } => format!("mode {}", to.wire_code()),
            })
            .collect();

        Reconciler::new(&switch).reconcile(&wanted).await.expect("reconcile");
        assert_eq!(kinds, switch.actions());
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let switch = FakeSwitch::factory_default()
            .with_vlan(20, Vlan::new("old").with_port(port(9), AccessState::Tagged));
        let wanted = desired(vec![
            (
                10,
                Vlan::new("cams")
                    .with_port(port(1), AccessState::Untagged)
                    .with_port(port(2), AccessState::Tagged),
            ),
            (30, Vlan::new("iot").with_port(port(2), AccessState::Untagged)),
        ]);

        let reconciler = Reconciler::new(&switch);
        let first = reconciler.reconcile(&wanted).await.expect("first run");
        assert!(first.changed);

        switch.clear_actions();
        let second = reconciler.reconcile(&wanted).await.expect("second run");
        assert!(!second.changed);
        assert_eq!(second.mutations, 0);
        assert!(switch.actions().is_empty());
        assert_eq!(second.old, second.new);
        assert_eq!(first.new, second.new);
    }

    #[tokio::test]
    async fn test_injected_refusal_is_corrected() {
        let switch = FakeSwitch::factory_default().with_cannot_remove_once(10, 5);
        let wanted = desired(vec![(
            10,
            Vlan::new("cams")
                .with_port(port(5), AccessState::Untagged)
                .with_port(port(6), AccessState::Tagged),
        )]);

        let result = Reconciler::new(&switch).reconcile(&wanted).await.expect("reconcile");

        assert_eq!(result.corrections, 1);
        assert_eq!(
            switch.actions(),
            vec![
                "reject 10 port 5",
                "edit 1",
                "pvid 5=1",
                "add 10",
                "pvid 5=10",
                "edit 1"
            ]
        );
        assert_every_port_homed(&switch);
    }

    #[tokio::test]
    async fn test_repeated_refusal_fails() {
        let switch = FakeSwitch::factory_default().with_cannot_remove_always(10, 5);
        let wanted = desired(vec![(
            10,
            Vlan::new("cams")
                .with_port(port(5), AccessState::Untagged)
                .with_port(port(6), AccessState::Tagged),
        )]);

        let err = Reconciler::new(&switch)
            .reconcile(&wanted)
            .await
            .expect_err("repeated refusal");
        assert!(matches!(
            err,
            SwitchError::Device(DeviceError::RepeatedCorrection { vlan_id: 10, port: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_port_moves_between_vlans() {
        let default = Port::all()
            .filter(|p| p.number() != 5)
            .fold(Vlan::new("Default"), |vlan, p| vlan.with_port(p, AccessState::Untagged));
        let switch = FakeSwitch::factory_default()
            .with_vlan(1, default)
            .with_vlan(30, Vlan::new("Cams").with_port(port(5), AccessState::Untagged))
            .with_pvid(5, 30);
        let wanted = desired(vec![(30, Vlan::new("Cams").with_port(port(4), AccessState::Untagged))]);

        let result = Reconciler::new(&switch).reconcile(&wanted).await.expect("reconcile");

        assert_eq!(result.corrections, 0);
        assert_eq!(
            switch.actions(),
            vec!["edit 30", "pvid 4=30", "edit 1", "pvid 5=1", "edit 1", "edit 30"]
        );
        assert_eq!(switch.pvid(4), Some(id(30)));
        assert_eq!(switch.pvid(5), Some(VlanId::DEFAULT));
        assert_every_port_homed(&switch);
    }

    #[tokio::test]
    async fn test_unwanted_vlan_is_removed() {
        let switch = FakeSwitch::factory_default()
            .with_vlan(20, Vlan::new("old").with_port(port(3), AccessState::Untagged))
            .with_pvid(3, 20);

        let result = Reconciler::new(&switch)
            .reconcile(&VlanSet::new())
            .await
            .expect("reconcile");

        assert_eq!(switch.actions(), vec!["pvid 3=1", "delete 20"]);
        assert!(result.old.contains(id(20)));
        assert!(!result.new.contains(id(20)));
        assert_eq!(result.new.len(), 1);
    }

    #[tokio::test]
    async fn test_mode_is_forced_first() {
        let switch = FakeSwitch::factory_default().with_mode(VlanMode::NoVlans);
        let wanted = desired(vec![(10, Vlan::new("cams").with_port(port(1), AccessState::Tagged))]);

        Reconciler::new(&switch).reconcile(&wanted).await.expect("reconcile");

        assert_eq!(switch.actions(), vec!["mode adv8021Q", "add 10"]);
    }

    #[tokio::test]
    async fn test_stuck_mode_fails() {
        let switch = FakeSwitch::factory_default()
            .with_mode(VlanMode::NoVlans)
            .with_stuck_mode();

        let err = Reconciler::new(&switch)
            .reconcile(&VlanSet::new())
            .await
            .expect_err("mode");
        assert!(matches!(err, SwitchError::Mode(ModeError::Mismatch { .. })));
        assert!(switch.actions().is_empty());
    }

    #[tokio::test]
    async fn test_supplied_default_vlan_name() {
        let switch = FakeSwitch::factory_default();
        let wanted = desired(vec![(1, Vlan::new("mgmt").with_port(port(16), AccessState::Untagged))]);

        let result = Reconciler::new(&switch).reconcile(&wanted).await.expect("reconcile");

        assert_eq!(switch.actions(), vec!["edit 1"]);
        assert_eq!(result.new.get(VlanId::DEFAULT).map(|v| v.name.as_str()), Some("mgmt"));
    }

    #[tokio::test]
    async fn test_padded_set_name_converges() {
        let switch = FakeSwitch::factory_default();
        let entries = parse_set_specs(&["10: cams @1:untagged"]).expect("specs");
        let wanted = VlanValidator::new().validate(&entries).expect("valid");

        let reconciler = Reconciler::new(&switch);
        let result = reconciler.reconcile(&wanted).await.expect("reconcile");
        assert_eq!(switch.actions(), vec!["add 10", "pvid 1=10", "edit 1"]);
        assert_eq!(result.new.get(id(10)).map(|v| v.name.as_str()), Some("cams"));

        switch.clear_actions();
        let again = reconciler.reconcile(&wanted).await.expect("second run");
        assert!(!again.changed);
        assert!(switch.actions().is_empty());
    }
}
