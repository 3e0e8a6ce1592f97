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

//! # Converge
//!
//! A declarative, idempotent, and reconcilable configuration engine for
//! network devices.
//!
//! ## Overview
//!
//! Converge brings desired-state management to device configuration,
//! allowing you to:
//!
//! - Define the wanted device configuration as data in a YAML file
//! - Reconcile under four modes: merged, replaced, overridden, deleted
//! - Preview every change with a check-mode dry run before sending it
//! - Diff keyed entry lists (ACL rules, interface addresses) element-wise
//!
//! ## Architecture
//!
//! The engine is a linear pipeline around **desired state reconciliation**:
//!
//! 1. **Observed state**: collected from the device and normalized
//! 2. **Desired state**: normalized from `converge.yaml`
//! 3. **Delta**: the mode-aware difference between the two
//! 4. **Operations**: per-kind CLI commands or REST calls realizing the delta
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`resource`]: Field values, states, kinds and normalization
//! - [`diff`]: Mode-aware delta computation
//! - [`synth`]: Operation synthesis (CLI and REST)
//! - [`transport`]: Device access (live REST or on-disk fixtures)
//! - [`reconciler`]: The pipeline driver
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! target:
//!   transport: rest
//!   endpoint: https://switch1.example.net
//!
//! kind: vlans
//! mode: merged
//! resources:
//!   - vlan_id: 10
//!     name: uplink
//!   - vlan_id: 20
//!     name: servers
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod collect;
pub mod config;
pub mod diff;
pub mod error;
pub mod executor;
pub mod kinds;
pub mod reconciler;
pub mod resource;
pub mod synth;
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use collect::FactCollector;
pub use config::{ConfigParser, ConfigValidator, ReconcileDoc};
pub use diff::{DiffEngine, StateDelta, StateMode};
pub use error::{ConvergeError, Result};
pub use executor::{ApplyReport, Executor};
pub use kinds::{Acls, L3Interfaces, Vlans};
pub use reconciler::{ReconcileOutcome, ReconcileRequest, Reconciler};
pub use resource::{FieldValue, KindRegistry, ResourceKind, ResourceState};
pub use synth::Operation;
pub use transport::{FixtureTransport, RawFacts, RestTransport, Transport};
