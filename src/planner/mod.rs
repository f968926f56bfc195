//! Planning module for VLAN reconciliation.
//!
//! This module compares the desired VLANs with the device state, builds
//! dry-run plans, and executes mutations with the corrective path for
//! ports the device refuses to remove.

mod diff;
mod executor;
mod plan;

pub use diff::{needs_edit, PvidStep, TargetTopology, VlanDiff};
pub use executor::{PlanExecutor, MAX_CORRECTIONS};
pub use plan::{PlannedAction, ReconcilePlan};
