// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # GS316EP Manager
//!
//! Declarative, idempotent VLAN management for the Netgear GS316EP switch,
//! driven through its HTML web interface, plus PoE, port mirroring and
//! firmware helpers.
//!
//! ## Overview
//!
//! The switch has no API; every read scrapes a page and every change posts
//! a form. This crate turns that into a reconciliation engine:
//!
//! 1. **Desired State**: VLANs given as `--set` arguments or a YAML file
//! 2. **Observed State**: The VLAN and PVID tables scraped from the device
//! 3. **Reconciler**: Orders the mutations so that the device never refuses
//!    them, corrects the ones it refuses anyway, and verifies the result
//!
//! ## Modules
//!
//! - [`vlan`]: Port, VLAN and PVID data model
//! - [`config`]: Desired-state parsing and validation
//! - [`switch`]: Session, HTML extraction and device primitives
//! - [`planner`]: Target synthesis, diffing and mutation execution
//! - [`reconciler`]: VLAN reconciliation engine
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! vlans:
//!   10:
//!     name: Cameras
//!     ports_access:
//!       1: untagged
//!       2: tagged
//!   20:
//!     name: IoT
//!     ports_access:
//!       3: untagged
//!       2: tagged
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod reconciler;
pub mod switch;
pub mod vlan;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, VlanValidator};
pub use error::{Result, SwitchError};
pub use planner::{PlanExecutor, ReconcilePlan};
pub use reconciler::{ReconciliationResult, Reconciler};
pub use switch::{SwitchClient, SwitchTransport, VlanDevice};
pub use vlan::{AccessState, Port, Vlan, VlanId, VlanMode, VlanSet};
