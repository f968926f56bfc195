//! Desired-state input parsing.
//!
//! This module loads desired VLAN state from YAML files and `--set`
//! arguments, renders a VLAN set back into `--set` form, and loads the
//! `.env` file that feeds the CLI's environment fallbacks.

use crate::error::{ConfigError, Result, SwitchError, ValidationError};
use crate::vlan::{AccessState, VlanSet};
use std::path::Path;
use tracing::{debug, info};

use super::spec::{DesiredConfig, RawAccess, RawValue, RawVlan, RawVlanEntries};

/// Configuration parser for desired-state files and the `.env` file.
#[derive(Debug, Default)]
pub struct ConfigParser;

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Loads desired VLAN state from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<DesiredConfig> {
        let path = path.as_ref();
        info!("Loading desired VLAN state from: {}", path.display());

        if !path.exists() {
            return Err(SwitchError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            SwitchError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses desired VLAN state from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<DesiredConfig> {
        debug!("Parsing YAML desired state");

        let config: DesiredConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            SwitchError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed {} VLAN entries", config.len());
        Ok(config)
    }

    /// Loads the .env file from the working directory if present.
    ///
    /// Variables already set in the environment take precedence.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = Path::new(".env");

        if env_path.exists() {
            debug!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                SwitchError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Parses one `--set` argument: `VLANID[:NAME]@PORT:ACCESS[,PORT:ACCESS]...`.
///
/// Values are kept loosely typed; range and name checks are left to the
/// validator. The name may itself contain `:` or `@`, and the port list may
/// be empty.
///
/// # Errors
///
/// Returns an error if the argument does not have the expected shape.
pub fn parse_set_spec(spec: &str) -> std::result::Result<(RawValue, RawVlan), ValidationError> {
    // Port lists never contain '@', so the last one separates the ports.
    let Some((head, ports)) = spec.rsplit_once('@') else {
        return Err(ValidationError::malformed_spec(
            spec,
            "expected '@' between the VLAN and its ports",
        ));
    };

    let (id, name) = match head.split_once(':') {
        Some((id, name)) => (id, Some(RawValue::Text(name.to_string()))),
        None => (head, None),
    };
    if id.trim().is_empty() {
        return Err(ValidationError::malformed_spec(spec, "missing VLAN ID"));
    }
    if id.contains('@') {
        return Err(ValidationError::malformed_spec(
            spec,
            "the VLAN ID is followed by more than one port list",
        ));
    }

    let mut vlan = RawVlan {
        name,
        ports_access: Vec::new(),
    };

    for entry in ports.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((port, access)) = entry.split_once(':') else {
            return Err(ValidationError::malformed_spec(
                spec,
                format!("port entry '{entry}' is not PORT:ACCESS"),
            ));
        };
        let access = match RawValue::from_token(access) {
            RawValue::Int(code) => RawAccess::Code(code),
            RawValue::Text(name) => RawAccess::Name(name.trim().to_string()),
        };
        vlan.ports_access.push((RawValue::from_token(port), access));
    }

    Ok((RawValue::from_token(id), vlan))
}

/// Parses every `--set` argument, keeping their order.
///
/// # Errors
///
/// Returns the first malformed argument.
pub fn parse_set_specs<S: AsRef<str>>(
    specs: &[S],
) -> std::result::Result<RawVlanEntries, ValidationError> {
    specs.iter().map(|s| parse_set_spec(s.as_ref())).collect()
}

/// Renders each VLAN as a `--set` argument, leaving out excluded ports.
#[must_use]
pub fn to_set_specs(vlans: &VlanSet) -> Vec<String> {
    vlans
        .iter()
        .map(|(id, vlan)| {
            let ports: Vec<String> = vlan
                .ports
                .iter()
                .filter(|(_, access)| **access != AccessState::Excluded)
                .map(|(port, access)| format!("{port}:{access}"))
                .collect();
            format!("{id}:{}@{}", vlan.name, ports.join(","))
        })
        .collect()
}

/// Renders a shell command that reproduces the VLAN set.
#[must_use]
pub fn to_set_command(program: &str, vlans: &VlanSet) -> String {
    let mut command = format!("{program} vlan");
    for spec in to_set_specs(vlans) {
        command.push_str(" --set ");
        command.push_str(&shell_quote(&spec));
    }
    command
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | ':' | ',' | '.' | '_' | '-' | '/'));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VlanValidator;
    use std::collections::BTreeSet;

    #[test]
    fn test_parse_minimal_yaml() {
        let yaml = r"
vlans:
  10:
    name: Cameras
    ports_access:
      1: untagged
      2: 1
      '3': excluded
";
        let config = ConfigParser::new().parse_yaml(yaml, None).expect("yaml");
        let entries = config.into_entries();
        assert_eq!(entries.len(), 1);

        let (id, vlan) = &entries[0];
        assert_eq!(*id, RawValue::Int(10));
        assert_eq!(vlan.name, Some(RawValue::from("Cameras")));
        assert!(vlan
            .ports_access
            .contains(&(RawValue::Int(2), RawAccess::Code(1))));
        assert!(vlan
            .ports_access
            .contains(&(RawValue::from("3"), RawAccess::Name(String::from("excluded")))));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = ConfigParser::new().parse_yaml("vlans: [1, 2", None);
        assert!(matches!(
            result,
            Err(SwitchError::Config(ConfigError::ParseError { .. }))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ConfigParser::new().load_file("/nonexistent/vlans.yaml");
        assert!(matches!(
            result,
            Err(SwitchError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("vlans.yaml");
        std::fs::write(&path, "vlans:\n  20:\n    name: iot\n").expect("write");

        let config = ConfigParser::new().load_file(&path).expect("load");
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn test_parse_set_spec() {
        let (id, vlan) = parse_set_spec("10:Cams:Front@1:untagged,2:1, 3:Excluded").expect("spec");
        assert_eq!(id, RawValue::Int(10));
        assert_eq!(vlan.name, Some(RawValue::from("Cams:Front")));
        assert_eq!(
            vlan.ports_access,
            vec![
                (RawValue::Int(1), RawAccess::Name(String::from("untagged"))),
                (RawValue::Int(2), RawAccess::Code(1)),
                (RawValue::Int(3), RawAccess::Name(String::from("Excluded"))),
            ]
        );
    }

    #[test]
    fn test_parse_set_spec_defaults() {
        let (id, vlan) = parse_set_spec("42@").expect("spec");
        assert_eq!(id, RawValue::Int(42));
        assert_eq!(vlan.name, None);
        assert!(vlan.ports_access.is_empty());
    }

    #[test]
    fn test_parse_set_spec_malformed() {
        for spec in ["10", "10@1:untagged@2:tagged", "@1:untagged", "10@1"] {
            assert!(
                matches!(parse_set_spec(spec), Err(ValidationError::MalformedSpec { .. })),
                "{spec} should be rejected"
            );
        }
    }

    #[test]
    fn test_set_spec_round_trip() {
        let specs = ["10:Cams@3:untagged,1:tagged,16:2", "20@5:1,6:excluded"];
        let entries = parse_set_specs(&specs).expect("specs");
        let vlans = VlanValidator::new().validate(&entries).expect("valid");

        let rendered = to_set_specs(&vlans);
        assert_eq!(rendered, vec!["10:Cams@1:tagged,3:untagged,16:untagged", "20:vlan20@5:tagged"]);

        let reparsed = VlanValidator::new()
            .validate(&parse_set_specs(&rendered).expect("specs"))
            .expect("valid");
        assert_eq!(reparsed.without_excluded(), vlans.without_excluded());

        let ports: BTreeSet<u8> = reparsed
            .iter()
            .flat_map(|(_, vlan)| vlan.member_ports().map(u8::from).collect::<Vec<_>>())
            .collect();
        assert_eq!(ports, [1, 3, 5, 16].into_iter().collect());
    }

    #[test]
    fn test_set_spec_round_trip_with_at_in_name() {
        let yaml = "vlans:\n  10:\n    name: lab@home\n    ports_access:\n      1: untagged\n";
        let config = ConfigParser::new().parse_yaml(yaml, None).expect("yaml");
        let vlans = VlanValidator::new().validate(&config.into_entries()).expect("valid");

        let rendered = to_set_specs(&vlans);
        assert_eq!(rendered, vec!["10:lab@home@1:untagged"]);

        let reparsed = VlanValidator::new()
            .validate(&parse_set_specs(&rendered).expect("specs"))
            .expect("valid");
        assert_eq!(reparsed.without_excluded(), vlans.without_excluded());
    }

    #[test]
    fn test_set_command_quotes() {
        let entries = parse_set_specs(&["7:My Lab@2:untagged"]).expect("specs");
        let vlans = VlanValidator::new().validate(&entries).expect("valid");
        assert_eq!(
            to_set_command("gs316ep", &vlans),
            "gs316ep vlan --set '7:My Lab@2:untagged'"
        );
    }
}
