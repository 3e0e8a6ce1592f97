//! Configuration validation for reconciliation documents.
//!
//! Catches document-level problems (bad targets, unknown kinds, shapes
//! that cannot possibly reconcile) before the engine touches a device.

use std::collections::HashSet;

use tracing::debug;
use validator::Validate;

use crate::diff::StateMode;
use crate::resource::KindRegistry;

use super::spec::{ReconcileDoc, TransportKind};

/// Validator for reconciliation documents.
#[derive(Debug)]
pub struct ConfigValidator<'a> {
    registry: &'a KindRegistry,
}

/// Validation result containing all findings.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Fatal problems.
    pub errors: Vec<ValidationIssue>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationIssue {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    /// True when no fatal problems were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
        });
    }
}

impl<'a> ConfigValidator<'a> {
    /// Creates a validator against the given kind registry.
    #[must_use]
    pub const fn new(registry: &'a KindRegistry) -> Self {
        Self { registry }
    }

    /// Validates a reconciliation document.
    #[must_use]
    pub fn validate(&self, doc: &ReconcileDoc) -> ValidationResult {
        debug!("Validating configuration document");
        let mut result = ValidationResult::default();

        self.validate_target(doc, &mut result);
        self.validate_kind(doc, &mut result);
        self.validate_resources(doc, &mut result);

        result
    }

    fn validate_target(&self, doc: &ReconcileDoc, result: &mut ValidationResult) {
        if let Err(errors) = doc.target.validate() {
            for (field, field_errors) in errors.field_errors() {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map_or_else(|| error.code.to_string(), ToString::to_string);
                    result.error(format!("target.{field}"), message);
                }
            }
        }

        match doc.target.transport {
            TransportKind::Rest => {
                if doc.target.endpoint.is_none() {
                    result.error("target.endpoint", "rest transport requires an endpoint");
                }
                if doc.target.fixtures.is_some() {
                    result
                        .warnings
                        .push("target.fixtures is ignored by the rest transport".to_string());
                }
            }
            TransportKind::Fixture => {
                if doc.target.fixtures.is_none() {
                    result.error(
                        "target.fixtures",
                        "fixture transport requires a fixtures directory",
                    );
                }
            }
        }

        if doc.target.timeout_secs == Some(0) {
            result.error("target.timeout_secs", "timeout must be greater than zero");
        }
    }

    fn validate_kind(&self, doc: &ReconcileDoc, result: &mut ValidationResult) {
        if self.registry.get(&doc.kind).is_err() {
            result.error(
                "kind",
                format!(
                    "unknown resource kind '{}' (available: {})",
                    doc.kind,
                    self.registry.names().join(", ")
                ),
            );
        }
    }

    fn validate_resources(&self, doc: &ReconcileDoc, result: &mut ValidationResult) {
        if doc.resources.is_empty() && doc.mode != StateMode::Deleted {
            result.error(
                "resources",
                format!("mode '{}' requires at least one resource", doc.mode),
            );
        }

        let key_field = self
            .registry
            .get(&doc.kind)
            .ok()
            .map(|kind| kind.key_field());

        let mut seen: HashSet<String> = HashSet::new();
        for (index, resource) in doc.resources.iter().enumerate() {
            let serde_yaml::Value::Mapping(mapping) = resource else {
                result.error(
                    format!("resources[{index}]"),
                    "resource must be a mapping of fields",
                );
                continue;
            };

            let Some(key_field) = key_field else {
                continue;
            };
            let key = mapping.get(key_field).and_then(|value| match value {
                serde_yaml::Value::String(s) => Some(s.clone()),
                serde_yaml::Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            if let Some(key) = key {
                if !seen.insert(key.clone()) {
                    result.error(
                        format!("resources[{index}].{key_field}"),
                        format!("duplicate resource key '{key}'"),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn validate(yaml: &str) -> ValidationResult {
        let registry = KindRegistry::with_builtin_kinds();
        let doc = ConfigParser::new().parse_yaml(yaml, None).unwrap();
        ConfigValidator::new(&registry).validate(&doc)
    }

    #[test]
    fn test_valid_document_passes() {
        let result = validate(
            "target: {transport: fixture, fixtures: ./f}\nkind: vlans\nresources:\n- {vlan_id: 10}",
        );
        assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn test_rest_transport_requires_endpoint() {
        let result = validate("target: {transport: rest}\nkind: vlans\nresources:\n- {vlan_id: 1}");
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "target.endpoint"));
    }

    #[test]
    fn test_unknown_kind_is_reported() {
        let result = validate(
            "target: {transport: fixture, fixtures: ./f}\nkind: bgp\nresources:\n- {x: 1}",
        );
        assert!(result.errors.iter().any(|e| e.field == "kind"));
    }

    #[test]
    fn test_empty_resources_need_deleted_mode() {
        let result =
            validate("target: {transport: fixture, fixtures: ./f}\nkind: vlans\nresources: []");
        assert!(!result.is_valid());

        let result = validate(
            "target: {transport: fixture, fixtures: ./f}\nkind: vlans\nmode: deleted\nresources: []",
        );
        assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn test_duplicate_keys_are_reported() {
        let result = validate(
            "target: {transport: fixture, fixtures: ./f}\nkind: acls\nresources:\n- {name: a}\n- {name: a}",
        );
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("duplicate")));
    }

    #[test]
    fn test_bad_endpoint_url_is_reported() {
        let result = validate(
            "target: {transport: rest, endpoint: not-a-url}\nkind: vlans\nresources:\n- {vlan_id: 1}",
        );
        assert!(!result.is_valid());
    }
}
