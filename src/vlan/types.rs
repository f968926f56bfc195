//! Port and VLAN membership types.
//!
//! These types describe the 16-port topology of the switch: which VLANs
//! exist, how each port relates to each VLAN, and which VLAN each port
//! currently uses as its PVID.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::ValidationError;

/// Number of front-panel ports.
pub const PORT_COUNT: u8 = 16;

/// Highest valid VLAN ID.
pub const MAX_VLAN_ID: u16 = 4095;

/// Maximum VLAN name length accepted by the device.
pub const MAX_NAME_LEN: usize = 20;

/// Name given to VLAN 1 when the desired state does not define it.
pub const DEFAULT_VLAN_NAME: &str = "Default";

/// A front-panel port, 1..=16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub struct Port(u8);

impl Port {
    /// Creates a port if the number is within 1..=16.
    #[must_use]
    pub const fn new(number: u8) -> Option<Self> {
        if number >= 1 && number <= PORT_COUNT {
            Some(Self(number))
        } else {
            None
        }
    }

    /// Returns the port number.
    #[must_use]
    pub const fn number(self) -> u8 {
        self.0
    }

    /// Returns the zero-based position of this port in access and mask strings.
    #[must_use]
    pub const fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// Iterates over all ports in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=PORT_COUNT).map(Self)
    }
}

impl TryFrom<u8> for Port {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(ValidationError::PortOutOfRange {
            port: value,
            min: 1,
            max: PORT_COUNT,
        })
    }
}

impl From<Port> for u8 {
    fn from(port: Port) -> Self {
        port.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relationship of one port to one VLAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessState {
    /// Member, frames carry the VLAN tag.
    Tagged,
    /// Member without tag; the port's home VLAN.
    Untagged,
    /// Not a member.
    Excluded,
}

impl AccessState {
    /// Returns the numeric wire code used in `hiddenMem` strings.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Tagged => '1',
            Self::Untagged => '2',
            Self::Excluded => '3',
        }
    }

    /// Parses a single wire code character.
    #[must_use]
    pub const fn from_code(code: char) -> Option<Self> {
        match code {
            '1' => Some(Self::Tagged),
            '2' => Some(Self::Untagged),
            '3' => Some(Self::Excluded),
            _ => None,
        }
    }

    /// Parses a user-facing value: a name or a numeric code.
    #[must_use]
    pub fn from_user(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tagged" | "1" => Some(Self::Tagged),
            "untagged" | "2" => Some(Self::Untagged),
            "excluded" | "3" => Some(Self::Excluded),
            _ => None,
        }
    }

    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tagged => "tagged",
            Self::Untagged => "untagged",
            Self::Excluded => "excluded",
        }
    }
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// VLAN identifier, 1..=4095.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    /// The device's permanent default VLAN.
    pub const DEFAULT: Self = Self(1);

    /// Creates a VLAN ID if it is within 1..=4095.
    #[must_use]
    pub const fn new(id: u16) -> Option<Self> {
        if id >= 1 && id <= MAX_VLAN_ID {
            Some(Self(id))
        } else {
            None
        }
    }

    /// Returns the numeric ID.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Returns true for VLAN 1.
    #[must_use]
    pub const fn is_default(self) -> bool {
        self.0 == 1
    }
}

impl From<VlanId> for u16 {
    fn from(id: VlanId) -> Self {
        id.0
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single VLAN: its name and per-port membership.
///
/// Ports missing from `ports` are excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vlan {
    /// VLAN name (at most 20 characters).
    pub name: String,
    /// Per-port access state.
    pub ports: BTreeMap<Port, AccessState>,
}

impl Vlan {
    /// Creates a VLAN with no member ports.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ports: BTreeMap::new(),
        }
    }

    /// Sets a port's access state, builder style.
    #[must_use]
    pub fn with_port(mut self, port: Port, access: AccessState) -> Self {
        self.ports.insert(port, access);
        self
    }

    /// Returns the access state of a port.
    #[must_use]
    pub fn access(&self, port: Port) -> AccessState {
        self.ports
            .get(&port)
            .copied()
            .unwrap_or(AccessState::Excluded)
    }

    /// Sets a port's access state.
    pub fn set_access(&mut self, port: Port, access: AccessState) {
        self.ports.insert(port, access);
    }

    /// Renders the 16-character access string, index 0 being port 1.
    #[must_use]
    pub fn access_string(&self) -> String {
        Port::all().map(|port| self.access(port).code()).collect()
    }

    /// Builds a VLAN from a 16-character access string.
    #[must_use]
    pub fn from_access_string(name: impl Into<String>, codes: &str) -> Option<Self> {
        if codes.chars().count() != usize::from(PORT_COUNT) {
            return None;
        }

        let mut vlan = Self::new(name);
        for (port, code) in Port::all().zip(codes.chars()) {
            vlan.set_access(port, AccessState::from_code(code)?);
        }
        Some(vlan)
    }

    /// Iterates over the ports that are untagged in this VLAN.
    pub fn untagged_ports(&self) -> impl Iterator<Item = Port> + '_ {
        self.ports
            .iter()
            .filter(|(_, access)| **access == AccessState::Untagged)
            .map(|(port, _)| *port)
    }

    /// Iterates over member ports (tagged or untagged).
    pub fn member_ports(&self) -> impl Iterator<Item = Port> + '_ {
        self.ports
            .iter()
            .filter(|(_, access)| **access != AccessState::Excluded)
            .map(|(port, _)| *port)
    }

    /// Returns a copy without excluded entries.
    #[must_use]
    pub fn without_excluded(&self) -> Self {
        Self {
            name: self.name.clone(),
            ports: self
                .ports
                .iter()
                .filter(|(_, access)| **access != AccessState::Excluded)
                .map(|(port, access)| (*port, *access))
                .collect(),
        }
    }

    /// Returns true if name and effective membership are equal.
    #[must_use]
    pub fn same_config(&self, other: &Self) -> bool {
        self.name == other.name && self.access_string() == other.access_string()
    }
}

/// A set of VLANs keyed by ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VlanSet(BTreeMap<VlanId, Vlan>);

impl VlanSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts or replaces a VLAN.
    pub fn insert(&mut self, id: VlanId, vlan: Vlan) -> Option<Vlan> {
        self.0.insert(id, vlan)
    }

    /// Returns a VLAN by ID.
    #[must_use]
    pub fn get(&self, id: VlanId) -> Option<&Vlan> {
        self.0.get(&id)
    }

    /// Returns a mutable VLAN by ID.
    pub fn get_mut(&mut self, id: VlanId) -> Option<&mut Vlan> {
        self.0.get_mut(&id)
    }

    /// Returns true if the ID is present.
    #[must_use]
    pub fn contains(&self, id: VlanId) -> bool {
        self.0.contains_key(&id)
    }

    /// Iterates over IDs in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = VlanId> + '_ {
        self.0.keys().copied()
    }

    /// Iterates over `(id, vlan)` pairs in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = (VlanId, &Vlan)> + '_ {
        self.0.iter().map(|(id, vlan)| (*id, vlan))
    }

    /// Number of VLANs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no VLANs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the VLAN where the port is untagged, if any.
    #[must_use]
    pub fn untagged_owner(&self, port: Port) -> Option<VlanId> {
        self.iter()
            .find(|(_, vlan)| vlan.access(port) == AccessState::Untagged)
            .map(|(id, _)| id)
    }

    /// Returns a copy with excluded entries stripped from every VLAN.
    #[must_use]
    pub fn without_excluded(&self) -> Self {
        self.iter()
            .map(|(id, vlan)| (id, vlan.without_excluded()))
            .collect()
    }
}

impl FromIterator<(VlanId, Vlan)> for VlanSet {
    fn from_iter<I: IntoIterator<Item = (VlanId, Vlan)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// PVID state of one port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortPvid {
    /// VLAN currently selected as the port's PVID.
    pub selected: Option<VlanId>,
    /// VLANs the port belongs to and could select.
    pub options: BTreeSet<VlanId>,
}

/// PVID state of every port, as shown on the device's PVID table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PortPvidMapping(BTreeMap<Port, PortPvid>);

impl PortPvidMapping {
    /// Creates an empty mapping.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a port entry.
    pub fn insert(&mut self, port: Port, entry: PortPvid) {
        self.0.insert(port, entry);
    }

    /// Returns the entry for a port.
    #[must_use]
    pub fn get(&self, port: Port) -> Option<&PortPvid> {
        self.0.get(&port)
    }

    /// Returns the selected PVID of a port.
    #[must_use]
    pub fn selected(&self, port: Port) -> Option<VlanId> {
        self.0.get(&port).and_then(|entry| entry.selected)
    }

    /// Returns true if the port lists the VLAN as a PVID option.
    #[must_use]
    pub fn can_select(&self, port: Port, vlan: VlanId) -> bool {
        self.0
            .get(&port)
            .is_some_and(|entry| entry.options.contains(&vlan))
    }

    /// Iterates over entries in port order.
    pub fn iter(&self) -> impl Iterator<Item = (Port, &PortPvid)> + '_ {
        self.0.iter().map(|(port, entry)| (*port, entry))
    }
}
