//! Loosely-typed desired VLAN state.
//!
//! These types mirror what an operator can write in a YAML file or on the
//! command line: IDs and ports may be numbers or strings, access values may
//! be codes or names. Nothing is checked here; the validator turns them
//! into a [`VlanSet`](crate::vlan::VlanSet).

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::vlan::AccessState;

/// A scalar as written by the operator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// A number.
    Int(i64),
    /// A string.
    Text(String),
}

impl RawValue {
    /// Parses a command-line token, preferring a number.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        token
            .trim()
            .parse::<i64>()
            .map_or_else(|_| Self::Text(token.to_string()), Self::Int)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A port access value as written by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawValue")]
pub enum RawAccess {
    /// Numeric code (1 tagged, 2 untagged, 3 excluded).
    Code(i64),
    /// Name or code as text.
    Name(String),
    /// Already typed.
    State(AccessState),
}

impl From<RawValue> for RawAccess {
    fn from(value: RawValue) -> Self {
        match value {
            RawValue::Int(code) => Self::Code(code),
            RawValue::Text(name) => Self::Name(name),
        }
    }
}

impl From<i32> for RawAccess {
    fn from(code: i32) -> Self {
        Self::Code(i64::from(code))
    }
}

impl From<&str> for RawAccess {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<AccessState> for RawAccess {
    fn from(state: AccessState) -> Self {
        Self::State(state)
    }
}

impl fmt::Display for RawAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Name(name) => write!(f, "{name}"),
            Self::State(state) => write!(f, "{state}"),
        }
    }
}

/// One VLAN entry before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawVlan {
    /// VLAN name; defaults to `vlan<ID>` when absent.
    pub name: Option<RawValue>,
    /// Port to access mapping, in the order given.
    pub ports_access: Vec<(RawValue, RawAccess)>,
}

impl RawVlan {
    /// Creates an entry with the given name and no ports.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(RawValue::Text(name.into())),
            ports_access: Vec::new(),
        }
    }

    /// Adds a port entry, builder style.
    #[must_use]
    pub fn with_port(mut self, port: impl Into<RawValue>, access: impl Into<RawAccess>) -> Self {
        self.ports_access.push((port.into(), access.into()));
        self
    }
}

/// An ordered list of `(VLAN ID, entry)` pairs as supplied.
pub type RawVlanEntries = Vec<(RawValue, RawVlan)>;

#[derive(Debug, Default, Deserialize)]
struct YamlVlan {
    #[serde(default)]
    name: Option<RawValue>,
    #[serde(default)]
    ports_access: BTreeMap<RawValue, RawAccess>,
}

/// Root of a desired-state YAML file.
#[derive(Debug, Default, Deserialize)]
pub struct DesiredConfig {
    #[serde(default)]
    vlans: BTreeMap<RawValue, YamlVlan>,
}

impl DesiredConfig {
    /// Returns the number of VLAN entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vlans.len()
    }

    /// Returns true if the file declares no VLANs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vlans.is_empty()
    }

    /// Converts the file into validator input.
    #[must_use]
    pub fn into_entries(self) -> RawVlanEntries {
        self.vlans
            .into_iter()
            .map(|(id, vlan)| {
                (
                    id,
                    RawVlan {
                        name: vlan.name,
                        ports_access: vlan.ports_access.into_iter().collect(),
                    },
                )
            })
            .collect()
    }
}
