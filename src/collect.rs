//! Observed-state collection.

use tracing::{debug, info};

use crate::error::Result;
use crate::resource::{ResourceKind, ResourceState};
use crate::transport::Transport;

/// Reads device facts through a transport and parses them into normalized
/// observed state.
pub struct FactCollector<'a> {
    transport: &'a dyn Transport,
}

impl<'a> FactCollector<'a> {
    /// Creates a collector over the given transport.
    #[must_use]
    pub const fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// Collects the observed state for one kind.
    ///
    /// A device with no configuration for the kind yields an empty state.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the device is unreachable, or a
    /// collection error when its output cannot be parsed.
    pub async fn collect(&self, kind: &dyn ResourceKind) -> Result<ResourceState> {
        debug!(kind = kind.name(), "collecting facts");
        let raw = self.transport.get_facts(kind.name()).await?;
        let state = kind.parse_facts(&raw)?;
        info!(
            kind = kind.name(),
            resources = state.len(),
            "collected observed state"
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::Vlans;
    use crate::transport::{MockTransport, RawFacts};

    #[tokio::test]
    async fn test_collect_parses_through_the_kind() {
        let mut transport = MockTransport::new();
        transport
            .expect_get_facts()
            .withf(|kind| kind == "vlans")
            .returning(|_| Ok(RawFacts::CliText("10  ten  active\n".into())));

        let kind = Vlans::new();
        let state = FactCollector::new(&transport).collect(&kind).await.unwrap();
        assert!(state.contains("10"));
    }

    #[tokio::test]
    async fn test_absent_facts_yield_empty_state() {
        let mut transport = MockTransport::new();
        transport
            .expect_get_facts()
            .returning(|_| Ok(RawFacts::Json(serde_json::Value::Null)));

        let kind = Vlans::new();
        let state = FactCollector::new(&transport).collect(&kind).await.unwrap();
        assert!(state.is_empty());
    }
}
