//! PoE port power cycling.

use std::collections::BTreeSet;
use tracing::info;

use crate::error::{DeviceError, Result, ValidationError};
use crate::vlan::PORT_COUNT;

use super::transport::SwitchTransport;

/// PoE configuration endpoint.
pub const POE_PAGE: &str = "/iss/specific/poePortConf.html";

/// Highest PoE-capable port; port 16 is the uplink and carries no PoE.
pub const MAX_POE_PORT: u8 = PORT_COUNT - 1;

/// Validates PoE port numbers, returning them sorted and deduplicated.
///
/// # Errors
///
/// Returns an error if a port is outside 1..=15.
pub fn validate_poe_ports(ports: &[u8]) -> std::result::Result<BTreeSet<u8>, ValidationError> {
    ports
        .iter()
        .map(|&port| {
            if (1..=MAX_POE_PORT).contains(&port) {
                Ok(port)
            } else {
                Err(ValidationError::PortOutOfRange {
                    port,
                    min: 1,
                    max: MAX_POE_PORT,
                })
            }
        })
        .collect()
}

/// Renders the 15-character `PoePort` mask, index 0 being port 1.
#[must_use]
pub fn poe_mask(ports: &BTreeSet<u8>) -> String {
    (1..=MAX_POE_PORT)
        .map(|port| if ports.contains(&port) { '1' } else { '0' })
        .collect()
}

/// Power cycles the given PoE ports.
///
/// # Errors
///
/// Returns an error if a port is invalid or the device does not answer `SUCCESS`.
pub async fn power_cycle_ports<T: SwitchTransport + ?Sized>(
    transport: &T,
    ports: &[u8],
) -> Result<BTreeSet<u8>> {
    let ports = validate_poe_ports(ports)?;
    let mask = poe_mask(&ports);
    info!("Power cycling PoE ports {ports:?}");

    let response = transport
        .post_form(
            POE_PAGE,
            &[("TYPE", String::from("resetPoe")), ("PoePort", mask)],
        )
        .await?;

    if response.body.trim() != "SUCCESS" {
        return Err(DeviceError::rejected(
            format!("Power cycling ports {ports:?}"),
            response.status,
            response.body,
        )
        .into());
    }

    Ok(ports)
}
