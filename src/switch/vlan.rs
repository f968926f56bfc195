//! VLAN page reads and mutation primitives.
//!
//! Every primitive posts one form to the VLAN page, scrapes the page the
//! device returns, and checks that the change is visible there. None of
//! them retries; the reconciler owns the corrective loop.

use tracing::{debug, info};

use crate::error::{DeviceError, ModeError, Result, TransportError};
use crate::vlan::{ModeChange, Port, PortPvidMapping, Vlan, VlanId, VlanMode, VlanSet};

use super::scrape;
use super::transport::{RawResponse, SwitchTransport};

/// Path of the VLAN configuration page.
pub const VLAN_PAGE: &str = "/iss/specific/vlan.html";

/// Form page name for advanced 802.1Q actions.
const ADV_8021Q_PAGE: &str = "adv8021QPage";

/// VLAN table and PVID table read from one page load.
#[derive(Debug, Clone)]
pub struct DeviceState {
    /// VLANs configured on the device.
    pub vlans: VlanSet,
    /// PVID state of every port.
    pub pvids: PortPvidMapping,
}

/// Result of submitting an add/edit form.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// The device shows the VLAN exactly as submitted.
    Applied(VlanSet),
    /// The device refused to drop a port whose PVID is this VLAN.
    CannotRemovePort {
        /// Port named in the device message.
        port: Port,
        /// Raw response body.
        body: String,
    },
}

/// VLAN operations against one switch session.
#[derive(Debug)]
pub struct VlanDevice<'a, T: SwitchTransport + ?Sized> {
    transport: &'a T,
}

impl<'a, T: SwitchTransport + ?Sized> VlanDevice<'a, T> {
    /// Creates the VLAN operations for a transport.
    #[must_use]
    pub const fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    async fn load_page(&self) -> Result<RawResponse> {
        let page = self.transport.get(VLAN_PAGE).await?;
        if !page.is_ok() {
            return Err(TransportError::Status {
                method: String::from("GET"),
                path: String::from(VLAN_PAGE),
                status: page.status,
            }
            .into());
        }
        Ok(page)
    }

    async fn post(&self, form: &[(&str, String)]) -> Result<RawResponse> {
        self.transport.post_form(VLAN_PAGE, form).await
    }

    /// Reads the VLAN table and the PVID table.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be loaded or either table is missing.
    pub async fn read_state(&self) -> Result<DeviceState> {
        let page = self.load_page().await?;
        let state = DeviceState {
            vlans: scrape::extract_vlan_table(&page.body)?,
            pvids: scrape::extract_pvid_table(&page.body)?,
        };
        debug!("Device reports {} VLANs", state.vlans.len());
        Ok(state)
    }

    /// Reads the VLAN table.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be loaded or the table is missing.
    pub async fn read_vlans(&self) -> Result<VlanSet> {
        let page = self.load_page().await?;
        Ok(scrape::extract_vlan_table(&page.body)?)
    }

    /// Reads the PVID table.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be loaded or the table is missing.
    pub async fn read_pvid_mapping(&self) -> Result<PortPvidMapping> {
        let page = self.load_page().await?;
        Ok(scrape::extract_pvid_table(&page.body)?)
    }

    /// Reads the active VLAN mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be loaded or the mode marker is missing.
    pub async fn read_mode(&self) -> Result<VlanMode> {
        let page = self.load_page().await?;
        Ok(scrape::extract_vlan_mode(&page.body)?)
    }

    /// Switches the VLAN mode, doing nothing if it is already active.
    ///
    /// # Errors
    ///
    /// Returns an error if the mode cannot be set or the device reports another mode.
    pub async fn set_mode(&self, mode: VlanMode) -> Result<ModeChange> {
        if !mode.is_settable() {
            return Err(ModeError::Unsupported {
                mode: mode.wire_code().to_string(),
            }
            .into());
        }

        let old = self.read_mode().await?;
        if old == mode {
            debug!("VLAN mode is already {mode}");
            return Ok(ModeChange {
                old,
                new: old,
                changed: false,
            });
        }

        info!("Changing VLAN mode from {old} to {mode}");
        let response = self
            .post(&[
                ("page", String::new()),
                ("VLAN_MOD_SET", mode.wire_code().to_string()),
            ])
            .await?;

        let reported = scrape::extract_vlan_mode(&response.body)?;
        if reported != mode {
            return Err(ModeError::Mismatch {
                requested: mode.wire_code().to_string(),
                reported: reported.wire_code().to_string(),
            }
            .into());
        }

        Ok(ModeChange {
            old,
            new: reported,
            changed: true,
        })
    }

    /// Adds a VLAN or replaces an existing one with the given name and membership.
    ///
    /// # Errors
    ///
    /// Returns an error if the device neither applies the VLAN nor reports
    /// a "cannot remove port" condition.
    pub async fn submit_vlan(&self, id: VlanId, vlan: &Vlan) -> Result<SubmitOutcome> {
        let access = vlan.access_string();
        info!("Submitting VLAN {id} '{}' ({access})", vlan.name);

        let response = self
            .post(&[
                ("page", String::from(ADV_8021Q_PAGE)),
                ("ACTION", String::from("add")),
                ("VLAN_ID", id.to_string()),
                ("VLAN_NAME", vlan.name.clone()),
                ("hiddenMem", access),
                ("voiceVLANID", String::from("0")),
                ("autoCameraVLANID", String::from("0")),
                ("autoWifiVLANID", String::from("0")),
                ("fsVoiceVlanCos", String::from("6")),
                ("fsAutoCameraVlanCos", String::from("6")),
                ("fsAutoWifiVlanCos", String::from("6")),
            ])
            .await?;

        if let Some(port) = scrape::cannot_remove_port(&response.body) {
            debug!("Device refuses to remove port {port} from VLAN {id}");
            return Ok(SubmitOutcome::CannotRemovePort {
                port,
                body: response.body,
            });
        }

        let vlans = match scrape::extract_vlan_table(&response.body) {
            Ok(vlans) => vlans,
            Err(_) => return Err(rejected(format!("Submitting VLAN {id}"), response)),
        };

        if vlans.get(id).is_some_and(|applied| applied.same_config(vlan)) {
            Ok(SubmitOutcome::Applied(vlans))
        } else {
            Err(rejected(format!("Submitting VLAN {id}"), response))
        }
    }

    /// Selects a VLAN as a port's PVID.
    ///
    /// # Errors
    ///
    /// Returns an error if the device does not show the new selection.
    pub async fn set_pvid(&self, port: Port, id: VlanId) -> Result<PortPvidMapping> {
        info!("Setting PVID of port {port} to VLAN {id}");

        let response = self
            .post(&[
                ("page", String::from(ADV_8021Q_PAGE)),
                ("ACTION", String::from("setPvid")),
                ("PORT", port.to_string()),
                ("PVID", id.to_string()),
            ])
            .await?;

        match scrape::extract_pvid_table(&response.body) {
            Ok(mapping) if mapping.selected(port) == Some(id) => Ok(mapping),
            _ => Err(rejected(format!("Setting PVID of port {port} to {id}"), response)),
        }
    }

    /// Deletes a VLAN.
    ///
    /// # Errors
    ///
    /// Returns an error if the device reports the VLAN in use or still lists it.
    pub async fn delete_vlan(&self, id: VlanId) -> Result<VlanSet> {
        info!("Deleting VLAN {id}");

        let response = self
            .post(&[
                ("page", String::from(ADV_8021Q_PAGE)),
                ("ACTION", String::from("delete")),
                ("VLAN_ID", id.to_string()),
            ])
            .await?;

        if response.body.contains(scrape::VLAN_IN_USE_TEXT) {
            return Err(rejected(format!("Deleting VLAN {id}"), response));
        }

        match scrape::extract_vlan_table(&response.body) {
            Ok(vlans) if !vlans.contains(id) => Ok(vlans),
            _ => Err(rejected(format!("Deleting VLAN {id}"), response)),
        }
    }
}

fn rejected(action: String, response: RawResponse) -> crate::error::SwitchError {
    DeviceError::rejected(action, response.status, response.body).into()
}
