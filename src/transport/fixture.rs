//! Offline transport backed by fixture files on disk.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::synth::RestRequest;
use crate::transport::{RawFacts, Transport};

/// Transport that reads facts from `{dir}/{kind}.json` or `{dir}/{kind}.txt`
/// and records mutations instead of sending them.
///
/// A missing fixture file means the device holds no configuration for the
/// kind. Useful for plan runs against captured device state and for tests.
#[derive(Debug)]
pub struct FixtureTransport {
    dir: PathBuf,
    sent: Mutex<Vec<String>>,
}

impl FixtureTransport {
    /// Creates a transport reading fixtures from `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Returns every mutation recorded so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn record(&self, lines: impl IntoIterator<Item = String>) {
        if let Ok(mut guard) = self.sent.lock() {
            guard.extend(lines);
        }
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn get_facts(&self, kind: &str) -> Result<RawFacts> {
        let json_path = self.dir.join(format!("{kind}.json"));
        if json_path.is_file() {
            let text = std::fs::read_to_string(&json_path)?;
            let value = serde_json::from_str(&text).map_err(|e| {
                TransportError::InvalidResponse {
                    message: format!("Fixture {} is not valid JSON: {e}", json_path.display()),
                }
            })?;
            return Ok(RawFacts::Json(value));
        }

        let text_path = self.dir.join(format!("{kind}.txt"));
        if text_path.is_file() {
            return Ok(RawFacts::CliText(std::fs::read_to_string(&text_path)?));
        }

        debug!(kind, "no fixture found, reporting empty configuration");
        Ok(RawFacts::Json(serde_json::Value::Null))
    }

    async fn edit_config(&self, commands: &[String]) -> Result<()> {
        self.record(commands.iter().cloned());
        Ok(())
    }

    async fn send_requests(&self, requests: &[RestRequest]) -> Result<()> {
        self.record(
            requests
                .iter()
                .map(|r| format!("{} {}", r.method, r.path)),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_fixture_is_empty_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FixtureTransport::new(dir.path());
        let facts = transport.get_facts("vlans").await.unwrap();
        assert!(facts.is_absent());
    }

    #[tokio::test]
    async fn test_reads_json_fixture_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("acls.json"), r#"{"acl-sets": []}"#).unwrap();
        let transport = FixtureTransport::new(dir.path());
        let facts = transport.get_facts("acls").await.unwrap();
        assert!(matches!(facts, RawFacts::Json(_)));
    }

    #[tokio::test]
    async fn test_reads_text_fixture() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vlans.txt"), "10  ten  active\n").unwrap();
        let transport = FixtureTransport::new(dir.path());
        let facts = transport.get_facts("vlans").await.unwrap();
        let RawFacts::CliText(text) = facts else {
            panic!("expected CLI text");
        };
        assert!(text.contains("ten"));
    }

    #[tokio::test]
    async fn test_mutations_are_recorded_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FixtureTransport::new(dir.path());
        transport.edit_config(&["vlan 10".into()]).await.unwrap();
        transport
            .send_requests(&[RestRequest::delete("/data/x")])
            .await
            .unwrap();
        assert_eq!(transport.sent(), vec!["vlan 10", "DELETE /data/x"]);
    }
}
