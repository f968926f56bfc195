//! GS316EP web interface integration module.
//!
//! This module provides everything that talks to the switch: the HTTP
//! session and login, HTML extraction, the VLAN mutation primitives, and
//! the PoE, port mirroring and firmware operations.

mod client;
mod firmware;
mod mirror;
mod poe;
pub mod scrape;
mod token;
mod transport;
mod vlan;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{ClientOptions, DEFAULT_TIMEOUT_SECS, SwitchClient, login_hash};
pub use firmware::{
    DEFAULT_REBOOT_WAIT_SECS, FirmwareRelease, FirmwareUpdater, FirmwareVersion, UpdateCode,
    UpdateReport, extract_image, parse_catalog,
};
pub use mirror::{MirrorConfig, apply_mirror, port_mask};
pub use poe::{MAX_POE_PORT, poe_mask, power_cycle_ports, validate_poe_ports};
pub use token::{CachedToken, TOKEN_FRESHNESS_SECS, TokenCache};
pub use transport::{RawResponse, SwitchTransport};
pub use vlan::{DeviceState, SubmitOutcome, VLAN_PAGE, VlanDevice};
