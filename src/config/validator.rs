//! Desired-state validation.
//!
//! Checks loosely-typed VLAN entries against the device's constraints and
//! normalizes them into a [`VlanSet`]. Every entry is checked before the
//! first error is returned, so the log shows all of them.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{Result, ValidationError};
use crate::vlan::{AccessState, MAX_NAME_LEN, Port, Vlan, VlanId, VlanSet};

use super::spec::{RawAccess, RawValue, RawVlan};

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Normalized VLANs; only meaningful when `errors` is empty.
    pub vlans: VlanSet,
    /// Rule violations, in input order.
    pub errors: Vec<ValidationError>,
    /// Non-fatal notes about the input.
    pub warnings: Vec<String>,
}

/// Validator for desired VLAN state.
#[derive(Debug, Default, Clone, Copy)]
pub struct VlanValidator;

impl VlanValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates and normalizes VLAN entries.
    ///
    /// # Errors
    ///
    /// Returns the first rule violation found.
    pub fn validate(&self, entries: &[(RawValue, RawVlan)]) -> Result<VlanSet> {
        let mut report = self.check(entries);

        for warning in &report.warnings {
            warn!("{warning}");
        }

        if report.errors.is_empty() {
            debug!("Desired state validation passed ({} VLANs)", report.vlans.len());
            Ok(report.vlans)
        } else {
            for error in report.errors.iter().skip(1) {
                debug!("Additional validation error: {error}");
            }
            Err(report.errors.swap_remove(0).into())
        }
    }

    /// Checks every entry and collects all violations.
    #[must_use]
    pub fn check(&self, entries: &[(RawValue, RawVlan)]) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut names: BTreeMap<String, u16> = BTreeMap::new();
        let mut untagged_owner: BTreeMap<Port, u16> = BTreeMap::new();

        for (raw_id, raw) in entries {
            let Some(id) = parse_vlan_id(raw_id) else {
                report.errors.push(ValidationError::InvalidVlanId {
                    id: raw_id.to_string(),
                });
                continue;
            };
            let vlan_id = id.get();

            if report.vlans.contains(id) {
                report.errors.push(ValidationError::DuplicateVlanId { vlan_id });
                continue;
            }

            let Some(name) = Self::check_name(vlan_id, raw.name.as_ref(), &mut report) else {
                continue;
            };

            if let Some(&other_vlan_id) = names.get(&name) {
                report.errors.push(ValidationError::DuplicateName {
                    vlan_id,
                    name: name.clone(),
                    other_vlan_id,
                });
            } else {
                names.insert(name.clone(), vlan_id);
            }

            let mut vlan = Vlan::new(name);
            for (raw_port, raw_access) in &raw.ports_access {
                let Some(port) = parse_port(raw_port) else {
                    report.errors.push(ValidationError::InvalidPort {
                        vlan_id,
                        port: raw_port.to_string(),
                    });
                    continue;
                };

                let Some(access) = parse_access(raw_access) else {
                    report.errors.push(ValidationError::MalformedAccess {
                        vlan_id,
                        port: port.number(),
                        value: raw_access.to_string(),
                    });
                    continue;
                };

                if vlan.ports.contains_key(&port) {
                    report
                        .warnings
                        .push(format!("VLAN {vlan_id}: port {port} is listed twice, the last entry wins"));
                }
                vlan.set_access(port, access);
            }

            for port in vlan.untagged_ports() {
                match untagged_owner.get(&port) {
                    Some(&other_vlan_id) => {
                        report.errors.push(ValidationError::DuplicateUntagged {
                            vlan_id,
                            port: port.number(),
                            other_vlan_id,
                        });
                    }
                    None => {
                        untagged_owner.insert(port, vlan_id);
                    }
                }
            }

            report.vlans.insert(id, vlan);
        }

        report
    }

    fn check_name(
        vlan_id: u16,
        raw: Option<&RawValue>,
        report: &mut ValidationReport,
    ) -> Option<String> {
        match raw {
            None => {
                let name = format!("vlan{vlan_id}");
                report
                    .warnings
                    .push(format!("VLAN {vlan_id} has no name, using '{name}'"));
                Some(name)
            }
            Some(RawValue::Int(value)) => {
                report.errors.push(ValidationError::NameNotString {
                    vlan_id,
                    value: value.to_string(),
                });
                None
            }
            Some(RawValue::Text(raw_name)) => {
                // The device echoes names back without surrounding whitespace.
                let name = raw_name.trim();
                if name != raw_name {
                    report.warnings.push(format!(
                        "VLAN {vlan_id} name '{raw_name}' has surrounding whitespace, using '{name}'"
                    ));
                }
                let length = name.chars().count();
                if length > MAX_NAME_LEN {
                    report.errors.push(ValidationError::NameTooLong {
                        vlan_id,
                        name: name.to_string(),
                        length,
                        max: MAX_NAME_LEN,
                    });
                    None
                } else {
                    Some(name.to_string())
                }
            }
        }
    }
}

fn parse_vlan_id(raw: &RawValue) -> Option<VlanId> {
    let id = match raw {
        RawValue::Int(value) => u16::try_from(*value).ok()?,
        RawValue::Text(text) => text.trim().parse::<u16>().ok()?,
    };
    VlanId::new(id)
}

/// Port keys may be numbers or digit strings.
fn parse_port(raw: &RawValue) -> Option<Port> {
    let number = match raw {
        RawValue::Int(value) => u8::try_from(*value).ok()?,
        RawValue::Text(text) => text.trim().parse::<u8>().ok()?,
    };
    Port::new(number)
}

fn parse_access(raw: &RawAccess) -> Option<AccessState> {
    match raw {
        RawAccess::Code(code) => u32::try_from(*code)
            .ok()
            .and_then(|code| char::from_digit(code, 10))
            .and_then(AccessState::from_code),
        RawAccess::Name(name) => AccessState::from_user(name),
        RawAccess::State(state) => Some(*state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SwitchError;

    fn entry(id: impl Into<RawValue>, vlan: RawVlan) -> (RawValue, RawVlan) {
        (id.into(), vlan)
    }

    fn first_error(entries: &[(RawValue, RawVlan)]) -> ValidationError {
        match VlanValidator::new().validate(entries) {
            Err(SwitchError::Validation(e)) => e,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_entries() {
        let entries = vec![
            entry(10, RawVlan::named("cams").with_port(1, AccessState::Untagged).with_port("2", 1)),
            entry("20", RawVlan::named("iot").with_port(3, "untagged").with_port(2, "TAGGED")),
        ];

        let vlans = VlanValidator::new().validate(&entries).expect("valid");
        let port = |n| Port::new(n).expect("port");

        let cams = vlans.get(VlanId::new(10).expect("id")).expect("vlan 10");
        assert_eq!(cams.access(port(1)), AccessState::Untagged);
        assert_eq!(cams.access(port(2)), AccessState::Tagged);

        let iot = vlans.get(VlanId::new(20).expect("id")).expect("vlan 20");
        assert_eq!(iot.access(port(3)), AccessState::Untagged);
        assert_eq!(iot.access(port(2)), AccessState::Tagged);
    }

    #[test]
    fn test_vlan_id_boundaries() {
        for id in [1, 4095] {
            assert!(VlanValidator::new().validate(&[entry(id, RawVlan::named("x"))]).is_ok());
        }
        for id in [0, 4096, -1] {
            assert_eq!(
                first_error(&[entry(id, RawVlan::named("x"))]),
                ValidationError::InvalidVlanId { id: id.to_string() }
            );
        }
        assert!(matches!(
            first_error(&[entry("ten", RawVlan::named("x"))]),
            ValidationError::InvalidVlanId { .. }
        ));
    }

    #[test]
    fn test_duplicate_vlan_id() {
        let entries = [entry(10, RawVlan::named("a")), entry("10", RawVlan::named("b"))];
        assert_eq!(first_error(&entries), ValidationError::DuplicateVlanId { vlan_id: 10 });
    }

    #[test]
    fn test_name_constraints() {
        assert!(VlanValidator::new()
            .validate(&[entry(5, RawVlan::named("a".repeat(20)))])
            .is_ok());

        assert!(matches!(
            first_error(&[entry(5, RawVlan::named("a".repeat(21)))]),
            ValidationError::NameTooLong { vlan_id: 5, length: 21, .. }
        ));

        let numeric = RawVlan {
            name: Some(RawValue::Int(7)),
            ports_access: Vec::new(),
        };
        assert!(matches!(
            first_error(&[entry(5, numeric)]),
            ValidationError::NameNotString { vlan_id: 5, .. }
        ));

        let entries = [entry(5, RawVlan::named("lab")), entry(6, RawVlan::named("lab"))];
        assert_eq!(
            first_error(&entries),
            ValidationError::DuplicateName {
                vlan_id: 6,
                name: String::from("lab"),
                other_vlan_id: 5
            }
        );
    }

    #[test]
    fn test_name_whitespace_trimmed() {
        let report = VlanValidator::new().check(&[entry(10, RawVlan::named(" cams "))]);
        assert!(report.errors.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(
            report.vlans.get(VlanId::new(10).expect("id")).map(|v| v.name.as_str()),
            Some("cams")
        );
    }

    #[test]
    fn test_default_name() {
        let vlans = VlanValidator::new()
            .validate(&[entry(33, RawVlan::default())])
            .expect("valid");
        assert_eq!(vlans.get(VlanId::new(33).expect("id")).map(|v| v.name.as_str()), Some("vlan33"));
    }

    #[test]
    fn test_invalid_port() {
        for port in [RawValue::Int(0), RawValue::Int(17), RawValue::from("uplink")] {
            let vlan = RawVlan::named("x").with_port(port.clone(), 1);
            assert_eq!(
                first_error(&[entry(5, vlan)]),
                ValidationError::InvalidPort {
                    vlan_id: 5,
                    port: port.to_string()
                }
            );
        }
    }

    #[test]
    fn test_malformed_access() {
        for access in [RawAccess::Code(4), RawAccess::Code(0), RawAccess::Name(String::from("trunk"))] {
            let vlan = RawVlan::named("x").with_port(2, access);
            assert!(matches!(
                first_error(&[entry(5, vlan)]),
                ValidationError::MalformedAccess { vlan_id: 5, port: 2, .. }
            ));
        }
    }

    #[test]
    fn test_home_vlan_exclusivity() {
        let entries = [
            entry(10, RawVlan::named("a").with_port(4, "untagged")),
            entry(20, RawVlan::named("b").with_port(4, 2)),
        ];
        assert_eq!(
            first_error(&entries),
            ValidationError::DuplicateUntagged {
                vlan_id: 20,
                port: 4,
                other_vlan_id: 10
            }
        );

        // Tagged in several VLANs is fine.
        let entries = [
            entry(10, RawVlan::named("a").with_port(4, "tagged")),
            entry(20, RawVlan::named("b").with_port(4, 1)),
        ];
        assert!(VlanValidator::new().validate(&entries).is_ok());
    }

    #[test]
    fn test_check_collects_all_errors() {
        let entries = [
            entry(0, RawVlan::named("a")),
            entry(5, RawVlan::named("b").with_port(99, 1)),
            entry(6, RawVlan::named("b")),
        ];
        let report = VlanValidator::new().check(&entries);
        assert_eq!(report.errors.len(), 3);
    }
}
