//! Desired-state normalization.
//!
//! Raw caller input (YAML mappings from the reconcile document) is turned
//! into a [`ResourceState`] here, under the kind's declared policy. The one
//! semantic subtlety this module exists for: an *omitted* field means "no
//! opinion", while an *explicitly null* field is a clear request — the two
//! must never be silently conflated. Which of the two a null actually means
//! is a per-kind (and per-document) policy, not a hard-coded rule.

use tracing::debug;

use crate::diff::StateMode;
use crate::error::{Result, ValidationError};

use super::kind::{NullHandling, ResourceKind};
use super::state::ResourceState;
use super::value::{FieldMap, FieldValue};

/// Normalized desired state: keyed resources plus key-less delete selectors.
#[derive(Debug, Clone, Default)]
pub struct NormalizedWant {
    /// Resources keyed by their identity field.
    pub state: ResourceState,
    /// Key-less resources from a `deleted`-mode document; these select
    /// existing resources by field match instead of by key.
    pub selectors: Vec<FieldMap>,
    /// Non-fatal findings produced while normalizing.
    pub warnings: Vec<String>,
}

impl NormalizedWant {
    /// Wraps an already-keyed state with no selectors.
    #[must_use]
    pub fn from_state(state: ResourceState) -> Self {
        Self {
            state,
            selectors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Returns true if neither keyed resources nor selectors are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_empty() && self.selectors.is_empty()
    }
}

/// Normalizer for one resource kind.
#[derive(Debug)]
pub struct Normalizer<'a> {
    /// The kind whose policy applies.
    kind: &'a dyn ResourceKind,
    /// Document-level override of the kind's null handling.
    null_handling: NullHandling,
}

impl<'a> Normalizer<'a> {
    /// Creates a normalizer using the kind's own policy.
    #[must_use]
    pub fn new(kind: &'a dyn ResourceKind) -> Self {
        Self {
            null_handling: kind.normalize_policy().null_handling,
            kind,
        }
    }

    /// Overrides the null-handling policy for this run.
    #[must_use]
    pub const fn with_null_handling(mut self, null_handling: NullHandling) -> Self {
        self.null_handling = null_handling;
        self
    }

    /// Normalizes raw resource mappings into desired state.
    ///
    /// In `deleted` mode, resources without the identity field become
    /// selectors; in every other mode a missing identity field is fatal.
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-mapping resources, missing or
    /// null identity fields, and duplicate keys.
    pub fn normalize(&self, raw: &[serde_yaml::Value], mode: StateMode) -> Result<NormalizedWant> {
        let key_field = self.kind.key_field();
        let mut want = NormalizedWant::default();

        for (index, value) in raw.iter().enumerate() {
            let fields = Self::to_field_map(value, index)?;
            let fields = self.apply_null_policy(fields, &mut want.warnings);

            match fields.get(key_field) {
                None if mode == StateMode::Deleted => {
                    debug!("Resource [{index}] has no {key_field}; treating as delete selector");
                    want.selectors.push(fields);
                }
                None | Some(FieldValue::Null) => {
                    return Err(ValidationError::MissingKey {
                        key_field: key_field.to_string(),
                    }
                    .into());
                }
                Some(key_value) => {
                    let key = key_value.to_key_string();
                    if want.state.contains(&key) {
                        return Err(ValidationError::DuplicateKey { key }.into());
                    }
                    want.state.insert(key, fields);
                }
            }
        }

        debug!(
            "Normalized {} resources ({} selectors) for kind {}",
            want.state.len(),
            want.selectors.len(),
            self.kind.name()
        );
        Ok(want)
    }

    /// Converts one raw YAML resource into a field map.
    fn to_field_map(value: &serde_yaml::Value, index: usize) -> Result<FieldMap> {
        let converted = FieldValue::from_yaml(value).map_err(|message| {
            ValidationError::invalid(message, format!("resources[{index}]"))
        })?;

        match converted {
            FieldValue::Map(fields) => Ok(fields),
            other => Err(ValidationError::invalid(
                format!("Resource must be a mapping, got: {other}"),
                format!("resources[{index}]"),
            )
            .into()),
        }
    }

    /// Applies the null-handling policy to one resource.
    fn apply_null_policy(&self, fields: FieldMap, warnings: &mut Vec<String>) -> FieldMap {
        match self.null_handling {
            NullHandling::Clear => fields,
            NullHandling::Ignore => {
                let keep = self.kind.normalize_policy().always_keep;
                let key_field = self.kind.key_field();
                let (kept, stripped): (FieldMap, FieldMap) = fields
                    .into_iter()
                    .partition(|(name, value)| {
                        !value.is_null() || name == key_field || keep.contains(&name.as_str())
                    });

                for name in stripped.keys() {
                    warnings.push(format!(
                        "Field '{name}' is null and null handling is 'ignore'; treating as unspecified"
                    ));
                }
                kept
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::Vlans;

    fn raw(yaml: &str) -> Vec<serde_yaml::Value> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_keyed_resources_are_normalized() {
        let kind = Vlans::new();
        let want = Normalizer::new(&kind)
            .normalize(&raw("[{vlan_id: 10, name: ten}]"), StateMode::Merged)
            .unwrap();

        assert_eq!(want.state.keys(), vec!["10"]);
        assert!(want.selectors.is_empty());
    }

    #[test]
    fn test_missing_key_is_fatal_outside_deleted() {
        let kind = Vlans::new();
        let err = Normalizer::new(&kind)
            .normalize(&raw("[{name: ten}]"), StateMode::Merged)
            .unwrap_err();

        assert!(err.to_string().contains("identity field"));
    }

    #[test]
    fn test_missing_key_becomes_selector_in_deleted() {
        let kind = Vlans::new();
        let want = Normalizer::new(&kind)
            .normalize(&raw("[{name: ten}]"), StateMode::Deleted)
            .unwrap();

        assert!(want.state.is_empty());
        assert_eq!(want.selectors.len(), 1);
    }

    #[test]
    fn test_explicit_null_survives_clear_policy() {
        let kind = Vlans::new();
        let want = Normalizer::new(&kind)
            .normalize(&raw("[{vlan_id: 10, name: null}]"), StateMode::Merged)
            .unwrap();

        let fields = want.state.get("10").unwrap();
        assert_eq!(fields.get("name"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_null_is_stripped_under_ignore_policy() {
        let kind = Vlans::new();
        let want = Normalizer::new(&kind)
            .with_null_handling(NullHandling::Ignore)
            .normalize(&raw("[{vlan_id: 10, name: null}]"), StateMode::Merged)
            .unwrap();

        let fields = want.state.get("10").unwrap();
        assert!(!fields.contains_key("name"));
        assert_eq!(want.warnings.len(), 1);
    }

    #[test]
    fn test_duplicate_keys_are_fatal() {
        let kind = Vlans::new();
        let err = Normalizer::new(&kind)
            .normalize(
                &raw("[{vlan_id: 10, name: a}, {vlan_id: 10, name: b}]"),
                StateMode::Merged,
            )
            .unwrap_err();

        assert!(err.to_string().contains("Duplicate resource key"));
    }
}
