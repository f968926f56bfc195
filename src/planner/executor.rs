//! Mutation executor with the "cannot remove port" corrective path.
//!
//! The device refuses to drop a port from the VLAN that is its PVID. When
//! a submission hits that, the executor homes the port on VLAN 1 and
//! retries. The loop is a small state machine bounded by one correction
//! per port; the same port failing twice is fatal.

use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::error::{DeviceError, Result, ScrapeError, SwitchError};
use crate::switch::{SubmitOutcome, SwitchTransport, VlanDevice};
use crate::vlan::{
    AccessState, ModeChange, PORT_COUNT, Port, PortPvidMapping, Vlan, VlanId, VlanMode, VlanSet,
};

/// Maximum corrections for a single submission.
pub const MAX_CORRECTIONS: usize = PORT_COUNT as usize;

/// States of one corrective submission.
#[derive(Debug)]
enum SubmitState {
    /// Submit the VLAN.
    Attempt,
    /// Home the refused port on VLAN 1 before retrying.
    Correcting {
        /// Port named by the device.
        port: Port,
        /// Response that named it.
        body: String,
    },
    /// The device shows the VLAN as submitted.
    Succeeded(VlanSet),
    /// Unrecoverable.
    Failed(SwitchError),
}

/// Executes VLAN mutations and counts the ones the device applied.
#[derive(Debug)]
pub struct PlanExecutor<'a, T: SwitchTransport + ?Sized> {
    /// Device primitives.
    device: VlanDevice<'a, T>,
    /// Corrections allowed per submission.
    max_corrections: usize,
    /// Applied mutations.
    mutations: usize,
    /// Corrections performed.
    corrections: usize,
}

impl<'a, T: SwitchTransport + ?Sized> PlanExecutor<'a, T> {
    /// Creates an executor for a transport.
    #[must_use]
    pub const fn new(transport: &'a T) -> Self {
        Self {
            device: VlanDevice::new(transport),
            max_corrections: MAX_CORRECTIONS,
            mutations: 0,
            corrections: 0,
        }
    }

    /// Sets the corrections allowed per submission.
    #[must_use]
    pub const fn with_max_corrections(mut self, max_corrections: usize) -> Self {
        self.max_corrections = max_corrections;
        self
    }

    /// Returns the device primitives for reads.
    #[must_use]
    pub const fn device(&self) -> &VlanDevice<'a, T> {
        &self.device
    }

    /// Number of mutations the device applied so far.
    #[must_use]
    pub const fn mutations(&self) -> usize {
        self.mutations
    }

    /// Number of corrections performed so far.
    #[must_use]
    pub const fn corrections(&self) -> usize {
        self.corrections
    }

    /// Switches the VLAN mode if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the mode cannot be set.
    pub async fn ensure_mode(&mut self, mode: VlanMode) -> Result<ModeChange> {
        let change = self.device.set_mode(mode).await?;
        if change.changed {
            self.mutations += 1;
        }
        Ok(change)
    }

    /// Sets a port's PVID.
    ///
    /// # Errors
    ///
    /// Returns an error if the device does not show the new PVID.
    pub async fn set_pvid(&mut self, port: Port, id: VlanId) -> Result<PortPvidMapping> {
        let mapping = self.device.set_pvid(port, id).await?;
        self.mutations += 1;
        Ok(mapping)
    }

    /// Deletes a VLAN.
    ///
    /// # Errors
    ///
    /// Returns an error if the device keeps the VLAN.
    pub async fn delete(&mut self, id: VlanId) -> Result<VlanSet> {
        let vlans = self.device.delete_vlan(id).await?;
        self.mutations += 1;
        Ok(vlans)
    }

    /// Adds or edits a VLAN, correcting "cannot remove port" refusals.
    ///
    /// # Errors
    ///
    /// Returns an error if the device rejects the VLAN, reports the same
    /// port twice, or needs more corrections than allowed.
    pub async fn submit(&mut self, id: VlanId, vlan: &Vlan) -> Result<VlanSet> {
        let mut corrected: BTreeSet<Port> = BTreeSet::new();
        let mut state = SubmitState::Attempt;

        loop {
            state = match state {
                SubmitState::Attempt => match self.device.submit_vlan(id, vlan).await {
                    Ok(SubmitOutcome::Applied(vlans)) => SubmitState::Succeeded(vlans),
                    Ok(SubmitOutcome::CannotRemovePort { port, body }) => {
                        SubmitState::Correcting { port, body }
                    }
                    Err(e) => SubmitState::Failed(e),
                },
                SubmitState::Correcting { port, body } => {
                    if corrected.contains(&port) {
                        SubmitState::Failed(
                            DeviceError::RepeatedCorrection {
                                vlan_id: id.get(),
                                port: port.number(),
                                body,
                            }
                            .into(),
                        )
                    } else if corrected.len() >= self.max_corrections {
                        SubmitState::Failed(
                            DeviceError::rejected(
                                format!("Submitting VLAN {id} after {} corrections", corrected.len()),
                                200,
                                body,
                            )
                            .into(),
                        )
                    } else {
                        corrected.insert(port);
                        match self.home_on_default(port).await {
                            Ok(()) => SubmitState::Attempt,
                            Err(e) => SubmitState::Failed(e),
                        }
                    }
                }
                SubmitState::Succeeded(vlans) => {
                    self.mutations += 1;
                    return Ok(vlans);
                }
                SubmitState::Failed(e) => return Err(e),
            };
        }
    }

    /// Makes a port untagged in VLAN 1 and selects VLAN 1 as its PVID.
    async fn home_on_default(&mut self, port: Port) -> Result<()> {
        warn!("Device refuses to remove port {port}, moving its PVID to VLAN 1 first");

        let vlans = self.device.read_vlans().await?;
        let mut default = vlans
            .get(VlanId::DEFAULT)
            .cloned()
            .ok_or_else(|| ScrapeError::missing("VLAN 1 in the VLAN table"))?;
        default.set_access(port, AccessState::Untagged);

        match self.device.submit_vlan(VlanId::DEFAULT, &default).await? {
            SubmitOutcome::Applied(_) => self.mutations += 1,
            SubmitOutcome::CannotRemovePort { body, .. } => {
                return Err(DeviceError::rejected(
                    format!("Adding port {port} to VLAN 1"),
                    200,
                    body,
                )
                .into());
            }
        }

        self.set_pvid(port, VlanId::DEFAULT).await?;
        self.corrections += 1;
        info!("Port {port} homed on VLAN 1");
        debug!("{} corrections so far", self.corrections);
        Ok(())
    }
}
