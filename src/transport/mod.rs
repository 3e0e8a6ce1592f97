//! Device transports.
//!
//! A transport abstracts how facts are read from and mutations are sent
//! to a device. The engine only ever talks to `dyn Transport`, so runs
//! can target a live REST device or an on-disk fixture set with the same
//! code path.

mod fixture;
mod rest;

pub use fixture::FixtureTransport;
pub use rest::RestTransport;

use async_trait::async_trait;

use crate::error::Result;
use crate::synth::RestRequest;

/// Raw device output before kind-specific parsing.
#[derive(Debug, Clone)]
pub enum RawFacts {
    /// Unstructured CLI show output.
    CliText(String),
    /// Structured JSON from a REST API. `Null` means the device holds no
    /// configuration for the kind.
    Json(serde_json::Value),
}

impl RawFacts {
    /// True when the payload carries no configuration at all.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        match self {
            Self::CliText(text) => text.trim().is_empty(),
            Self::Json(value) => value.is_null(),
        }
    }
}

/// Read and write access to one device.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches the raw facts for a resource kind.
    async fn get_facts(&self, kind: &str) -> Result<RawFacts>;

    /// Sends CLI configuration lines, in order, as one batch.
    async fn edit_config(&self, commands: &[String]) -> Result<()>;

    /// Sends REST requests, in order, as one batch.
    async fn send_requests(&self, requests: &[RestRequest]) -> Result<()>;
}
