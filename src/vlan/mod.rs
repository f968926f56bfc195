//! Port and VLAN data model.
//!
//! Plain data with invariants: port and VLAN ID ranges, access codes,
//! and the PVID table. Nothing here talks to the device.

mod mode;
mod types;

pub use mode::{ModeChange, VlanMode};
pub use types::{
    AccessState, Port, PortPvid, PortPvidMapping, Vlan, VlanId, VlanSet, DEFAULT_VLAN_NAME,
    MAX_NAME_LEN, MAX_VLAN_ID, PORT_COUNT,
};
