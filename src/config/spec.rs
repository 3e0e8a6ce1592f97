//! Configuration specification types.
//!
//! These structs map to the `converge.yaml` file: which device to talk
//! to, which resource kind to reconcile, and the desired state itself.
//! Desired resources stay as raw YAML mappings here; the engine
//! normalizes them per kind.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::diff::StateMode;
use crate::resource::NullHandling;

/// The root configuration structure for a reconciliation document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileDoc {
    /// Device target configuration.
    pub target: TargetConfig,
    /// Registry name of the resource kind to reconcile.
    pub kind: String,
    /// Reconciliation mode.
    #[serde(default)]
    pub mode: StateMode,
    /// When true, runs never mutate the device.
    #[serde(default)]
    pub check_mode: bool,
    /// Engine tuning knobs.
    #[serde(default)]
    pub settings: EngineSettings,
    /// Desired-state resources, one mapping per resource.
    #[serde(default)]
    pub resources: Vec<serde_yaml::Value>,
}

/// How to reach the device.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TargetConfig {
    /// Transport flavor.
    pub transport: TransportKind,
    /// Device API endpoint (required for the rest transport).
    #[serde(default)]
    #[validate(url(message = "endpoint must be a valid URL"))]
    pub endpoint: Option<String>,
    /// Directory of fixture files (required for the fixture transport).
    #[serde(default)]
    pub fixtures: Option<String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Available transports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Live device over its HTTP management API.
    #[default]
    Rest,
    /// Offline fixture files on disk.
    Fixture,
}

/// Engine tuning knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Overrides the kinds' null handling for the whole document.
    #[serde(default)]
    pub null_handling: Option<NullHandling>,
    /// Resource keys to protect from deletion, beyond the kinds' own
    /// defaults.
    #[serde(default)]
    pub protect: Vec<String>,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Rest => "rest",
            Self::Fixture => "fixture",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "\
target:
  transport: fixture
  fixtures: ./fixtures
kind: vlans
resources:
- vlan_id: 10
  name: ten
";

    #[test]
    fn test_parse_minimal_document() {
        let doc: ReconcileDoc = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(doc.kind, "vlans");
        assert_eq!(doc.mode, StateMode::Merged);
        assert!(!doc.check_mode);
        assert_eq!(doc.target.transport, TransportKind::Fixture);
        assert_eq!(doc.resources.len(), 1);
    }

    #[test]
    fn test_endpoint_url_is_validated() {
        let target = TargetConfig {
            transport: TransportKind::Rest,
            endpoint: Some("not a url".into()),
            fixtures: None,
            timeout_secs: None,
        };
        assert!(target.validate().is_err());

        let target = TargetConfig {
            endpoint: Some("https://switch1.example.net".into()),
            ..target
        };
        assert!(target.validate().is_ok());
    }
}
