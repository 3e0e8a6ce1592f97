//! Turning deltas into device operations.
//!
//! Each resource kind synthesizes its own operations; this module holds
//! the shared operation types plus the CLI and REST assembly helpers.

mod cli;
mod operation;
mod rest;

pub use cli::CommandSet;
pub use operation::{HttpMethod, Operation, RestRequest};
pub use rest::RequestBatcher;
