//! VLAN operating modes of the switch.

use serde::Serialize;
use std::fmt;

/// The five VLAN modes the device knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VlanMode {
    /// VLANs disabled.
    NoVlans,
    /// Basic port-based VLAN.
    BasicPortBased,
    /// Advanced port-based VLAN.
    AdvancedPortBased,
    /// Basic 802.1Q VLAN.
    Basic8021Q,
    /// Advanced 802.1Q VLAN, required for reconciliation.
    Advanced8021Q,
}

impl VlanMode {
    /// Every mode, in the order the device lists them.
    pub const ALL: [Self; 5] = [
        Self::NoVlans,
        Self::BasicPortBased,
        Self::AdvancedPortBased,
        Self::Basic8021Q,
        Self::Advanced8021Q,
    ];

    /// Returns the code used in `vlanmode` attributes and `VLAN_MOD_SET`.
    #[must_use]
    pub const fn wire_code(self) -> &'static str {
        match self {
            Self::NoVlans => "noVlan",
            Self::BasicPortBased => "bscPotBsd",
            Self::AdvancedPortBased => "advPotBsd",
            Self::Basic8021Q => "bsc8021Q",
            Self::Advanced8021Q => "adv8021Q",
        }
    }

    /// Parses a wire code.
    #[must_use]
    pub fn from_wire_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.wire_code() == code)
    }

    /// Returns true if this tool can switch the device into the mode.
    #[must_use]
    pub const fn is_settable(self) -> bool {
        matches!(self, Self::NoVlans | Self::Advanced8021Q)
    }
}

impl fmt::Display for VlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoVlans => "no VLANs",
            Self::BasicPortBased => "basic port-based",
            Self::AdvancedPortBased => "advanced port-based",
            Self::Basic8021Q => "basic 802.1Q",
            Self::Advanced8021Q => "advanced 802.1Q",
        };
        write!(f, "{label} ({})", self.wire_code())
    }
}

/// Outcome of a mode change request.
#[derive(Debug, Clone, Serialize)]
pub struct ModeChange {
    /// Mode before the request.
    pub old: VlanMode,
    /// Mode reported afterwards.
    pub new: VlanMode,
    /// Whether a mutation was issued.
    pub changed: bool,
}
