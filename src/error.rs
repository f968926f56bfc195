//! Error types for the GS316EP management system.
//!
//! This module provides the error hierarchy for every stage of a run:
//! validating desired state, talking to the switch, reading its pages,
//! and driving the reconciliation.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the GS316EP management system.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// Invalid desired state supplied by the user.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A device page did not have the expected structure.
    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    /// The device refused or did not reflect a mutation.
    #[error("Device rejection: {0}")]
    Device(#[from] DeviceError),

    /// The VLAN mode could not be changed.
    #[error("Mode error: {0}")]
    Mode(#[from] ModeError),

    /// Login failed.
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// HTTP transport failures.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Desired-state validation errors.
///
/// Every variant names the VLAN the offending value belongs to, so the
/// operator can find it in their input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// VLAN ID is not an integer in 1..=4095.
    #[error("VLAN ID '{id}' is not an integer in 1..=4095")]
    InvalidVlanId {
        /// The raw ID as supplied.
        id: String,
    },

    /// The same VLAN ID was supplied twice (e.g. as `10` and `"10"`).
    #[error("VLAN {vlan_id} is defined more than once")]
    DuplicateVlanId {
        /// The duplicated ID.
        vlan_id: u16,
    },

    /// VLAN name is not a string.
    #[error("VLAN {vlan_id}: name must be a string, got '{value}'")]
    NameNotString {
        /// VLAN the name belongs to.
        vlan_id: u16,
        /// The raw value.
        value: String,
    },

    /// VLAN name exceeds the device limit.
    #[error("VLAN {vlan_id}: name '{name}' is {length} characters long (max {max})")]
    NameTooLong {
        /// VLAN the name belongs to.
        vlan_id: u16,
        /// The offending name.
        name: String,
        /// Length in characters.
        length: usize,
        /// Maximum length.
        max: usize,
    },

    /// Two VLANs share a name.
    #[error("VLAN {vlan_id}: name '{name}' is already used by VLAN {other_vlan_id}")]
    DuplicateName {
        /// VLAN carrying the duplicate.
        vlan_id: u16,
        /// The shared name.
        name: String,
        /// VLAN that first used the name.
        other_vlan_id: u16,
    },

    /// Port key is not an integer in 1..=16.
    #[error("VLAN {vlan_id}: port '{port}' is not an integer in 1..=16")]
    InvalidPort {
        /// VLAN the port entry belongs to.
        vlan_id: u16,
        /// The raw port key.
        port: String,
    },

    /// Access value is not one of tagged/untagged/excluded.
    #[error("VLAN {vlan_id}: port {port} has malformed access '{value}' (expected tagged, untagged, excluded or 1, 2, 3)")]
    MalformedAccess {
        /// VLAN the entry belongs to.
        vlan_id: u16,
        /// Port the entry belongs to.
        port: u8,
        /// The raw access value.
        value: String,
    },

    /// A port is untagged in more than one VLAN.
    #[error("VLAN {vlan_id}: port {port} is already untagged in VLAN {other_vlan_id}")]
    DuplicateUntagged {
        /// VLAN carrying the second untagged entry.
        vlan_id: u16,
        /// The port.
        port: u8,
        /// VLAN that already owns the port.
        other_vlan_id: u16,
    },

    /// A `--set` argument could not be parsed.
    #[error("Malformed VLAN spec '{spec}': {reason}")]
    MalformedSpec {
        /// The raw argument.
        spec: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Port number outside the range a command accepts.
    #[error("Port {port} is out of range {min}..={max}")]
    PortOutOfRange {
        /// The rejected port.
        port: u8,
        /// Lowest accepted port.
        min: u8,
        /// Highest accepted port.
        max: u8,
    },

    /// Mirror destination is also a mirror source.
    #[error("Mirror destination port {port} cannot also be a source port")]
    MirrorPortConflict {
        /// The conflicting port.
        port: u8,
    },
}

/// Device page structure errors.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// An expected marker is missing from the page.
    #[error("Marker '{marker}' not found in device response")]
    MissingMarker {
        /// Description of the marker.
        marker: String,
    },

    /// A marker was found but its content did not parse.
    #[error("Unexpected value for '{field}': '{value}'")]
    InvalidValue {
        /// Field being parsed.
        field: String,
        /// The raw value.
        value: String,
    },
}

/// Mutations the device refused or did not reflect.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device answered but its state does not show the change.
    #[error("{action} was rejected by the device (status {status})\n{body}")]
    Rejected {
        /// Description of the attempted mutation.
        action: String,
        /// HTTP status of the response.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The corrective path reported the same port twice.
    #[error("Editing VLAN {vlan_id} keeps failing on port {port} after correcting its PVID\n{body}")]
    RepeatedCorrection {
        /// VLAN being submitted.
        vlan_id: u16,
        /// Port the device keeps refusing.
        port: u8,
        /// Raw response body.
        body: String,
    },

    /// The device did not reach a state in time.
    #[error("Timed out after {secs}s waiting for {what}")]
    Timeout {
        /// What was being waited on.
        what: String,
        /// Seconds waited.
        secs: u64,
    },
}

/// VLAN mode errors.
#[derive(Debug, Error)]
pub enum ModeError {
    /// The device reports a different mode after the change.
    #[error("Requested VLAN mode {requested} but the device reports {reported}")]
    Mismatch {
        /// Mode that was requested.
        requested: String,
        /// Mode the device reported.
        reported: String,
    },

    /// The mode exists on the device but cannot be selected by this tool.
    #[error("VLAN mode {mode} cannot be set")]
    Unsupported {
        /// The mode.
        mode: String,
    },
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The login page could not be fetched.
    #[error("Login page returned status {status}")]
    LoginPage {
        /// HTTP status code.
        status: u16,
    },

    /// The login page did not contain the expected markers.
    #[error("Malformed login page: {message}")]
    MalformedLoginPage {
        /// What was missing.
        message: String,
    },

    /// The device reported a login error.
    #[error("Login rejected: {message}")]
    Rejected {
        /// Message shown by the device.
        message: String,
    },

    /// A password is needed but none was configured.
    #[error("No password configured (use --password or SWITCH_PASSWORD)")]
    MissingPassword,

    /// A request needing a token was issued before login.
    #[error("Not logged in")]
    NotLoggedIn,
}

/// HTTP transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the body not read.
    #[error("Network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// Unexpected HTTP status.
    #[error("{method} {path} returned status {status}")]
    Status {
        /// HTTP method.
        method: String,
        /// Request path.
        path: String,
        /// HTTP status code.
        status: u16,
    },

    /// A response body could not be decoded.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the issue.
        message: String,
    },
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The desired-state file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The desired-state file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A required setting is missing.
    #[error("Missing setting: {name}")]
    MissingSetting {
        /// Name of the missing setting.
        name: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The final re-read does not match the target state.
    #[error("VLAN {vlan_id} did not converge: {detail}")]
    NotConverged {
        /// VLAN that differs.
        vlan_id: u16,
        /// What differs.
        detail: String,
    },
}

/// Result type alias for GS316EP operations.
pub type Result<T> = std::result::Result<T, SwitchError>;

impl SwitchError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl DeviceError {
    /// Creates a rejection carrying the raw response.
    #[must_use]
    pub fn rejected(action: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            action: action.into(),
            status,
            body: body.into(),
        }
    }
}

impl ScrapeError {
    /// Creates a missing-marker error.
    #[must_use]
    pub fn missing(marker: impl Into<String>) -> Self {
        Self::MissingMarker {
            marker: marker.into(),
        }
    }

    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl TransportError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }
}

impl ValidationError {
    /// Creates a malformed-spec error.
    #[must_use]
    pub fn malformed_spec(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }
}
