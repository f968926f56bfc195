//! Port mirroring configuration.

use std::collections::BTreeSet;
use tracing::info;

use crate::error::{DeviceError, Result, ValidationError};
use crate::vlan::Port;

use super::transport::SwitchTransport;

/// Port mirroring endpoint.
pub const MIRROR_PAGE: &str = "/iss/specific/port_monitorconfig.html";

/// Desired port mirroring session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorConfig {
    /// No mirroring.
    Disabled,
    /// Copy traffic of `sources` to `destination`.
    Enabled {
        /// Mirrored ports.
        sources: BTreeSet<Port>,
        /// Port receiving the copies.
        destination: Port,
    },
}

impl MirrorConfig {
    /// Builds an enabled session from raw port numbers.
    ///
    /// # Errors
    ///
    /// Returns an error if a port is outside 1..=16 or the destination is also a source.
    pub fn enabled(sources: &[u8], destination: u8) -> std::result::Result<Self, ValidationError> {
        let destination = Port::try_from(destination)?;
        let sources = sources
            .iter()
            .map(|&port| Port::try_from(port))
            .collect::<std::result::Result<BTreeSet<_>, _>>()?;

        if sources.contains(&destination) {
            return Err(ValidationError::MirrorPortConflict {
                port: destination.number(),
            });
        }

        Ok(Self::Enabled {
            sources,
            destination,
        })
    }

    fn form(&self) -> [(&'static str, String); 3] {
        match self {
            Self::Disabled => [
                ("SessionMode", String::from("1")),
                ("SourcePort", String::new()),
                ("DestPort", String::from("-1")),
            ],
            Self::Enabled {
                sources,
                destination,
            } => [
                ("SessionMode", String::from("0")),
                ("SourcePort", port_mask(sources)),
                ("DestPort", destination.to_string()),
            ],
        }
    }
}

/// Renders a 16-character 0/1 port mask, index 0 being port 1.
#[must_use]
pub fn port_mask(ports: &BTreeSet<Port>) -> String {
    Port::all()
        .map(|port| if ports.contains(&port) { '1' } else { '0' })
        .collect()
}

/// Applies a port mirroring session.
///
/// # Errors
///
/// Returns an error if the device does not answer `SUCCESS`.
pub async fn apply_mirror<T: SwitchTransport + ?Sized>(
    transport: &T,
    config: &MirrorConfig,
) -> Result<()> {
    let action = match config {
        MirrorConfig::Disabled => String::from("Disabling port mirroring"),
        MirrorConfig::Enabled {
            sources,
            destination,
        } => {
            let sources: Vec<String> = sources.iter().map(ToString::to_string).collect();
            format!("Mirroring ports {} to port {destination}", sources.join(","))
        }
    };
    info!("{action}");

    let response = transport.post_form(MIRROR_PAGE, &config.form()).await?;
    if response.body.trim() != "SUCCESS" {
        return Err(DeviceError::rejected(action, response.status, response.body).into());
    }
    Ok(())
}
