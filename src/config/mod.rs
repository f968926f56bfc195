//! Desired-state configuration module.
//!
//! This module handles everything the operator supplies:
//! - Parsing `--set` arguments and YAML desired-state files
//! - Validating and normalizing them into a VLAN set
//! - Rendering a VLAN set back into `--set` form
//! - Loading the `.env` file behind the CLI's environment fallbacks

mod parser;
mod spec;
mod validator;

pub use parser::{ConfigParser, parse_set_spec, parse_set_specs, to_set_command, to_set_specs};
pub use spec::{DesiredConfig, RawAccess, RawValue, RawVlan, RawVlanEntries};
pub use validator::{ValidationReport, VlanValidator};
