//! The resource-kind capability set and registry.
//!
//! Each supported resource kind (VLANs, L3 interfaces, ACLs, ...) implements
//! [`ResourceKind`] once: how its facts parse, how its desired state is
//! validated, and how deltas turn into device operations. Everything else —
//! normalization, diffing, execution, reporting — is shared engine code that
//! dispatches through the [`KindRegistry`].

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::diff::{ResourceDelta, StateMode};
use crate::error::{Result, ValidationError};
use crate::synth::Operation;
use crate::transport::RawFacts;

use super::state::ResourceState;

/// The facts payload flavor a kind's parser expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactsFlavor {
    /// Raw CLI text (parsed with regexes / line scanning).
    CliText,
    /// Structured JSON from a REST endpoint.
    Json,
}

/// Declares that a list field holds keyed entries.
///
/// Entries are diffed element-wise by matching on the sub-key value, never
/// by list position.
#[derive(Debug, Clone, Copy)]
pub struct EntryKey {
    /// The list field name (e.g. `rules`, `ipv4`).
    pub field: &'static str,
    /// The field inside each entry that identifies it (e.g. `sequence`,
    /// `address`).
    pub sub_key: &'static str,
}

/// How the normalizer treats explicitly-null fields in the want document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullHandling {
    /// Keep nulls as explicit clear requests (a null field diffs to a
    /// `Clear` change).
    #[default]
    Clear,
    /// Strip nulls entirely, treating them the same as omitted fields.
    Ignore,
}

/// Normalization policy for one resource kind.
#[derive(Debug, Clone, Copy)]
pub struct NormalizePolicy {
    /// Null handling for non-identity fields.
    pub null_handling: NullHandling,
    /// Fields that are always kept even when null handling would strip
    /// them. Identity fields are implicitly always kept.
    pub always_keep: &'static [&'static str],
}

impl Default for NormalizePolicy {
    fn default() -> Self {
        Self {
            null_handling: NullHandling::Clear,
            always_keep: &[],
        }
    }
}

/// Capability set implemented once per resource kind.
pub trait ResourceKind: Send + Sync {
    /// The registry name of this kind (e.g. `vlans`).
    fn name(&self) -> &'static str;

    /// The field that identifies a resource of this kind.
    fn key_field(&self) -> &'static str;

    /// The facts payload flavor this kind parses.
    fn facts_flavor(&self) -> FactsFlavor;

    /// Keyed entry-list declarations for this kind.
    fn entry_keys(&self) -> &'static [EntryKey] {
        &[]
    }

    /// Resource keys that are never deleted (e.g. VLAN 1).
    fn protected_keys(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether deleting a resource resets its attributes instead of
    /// removing it (interfaces cannot be removed, only blanked).
    fn delete_resets_attributes(&self) -> bool {
        false
    }

    /// The normalization policy for this kind.
    fn normalize_policy(&self) -> NormalizePolicy {
        NormalizePolicy::default()
    }

    /// Parses raw device output into a normalized state.
    ///
    /// Absent resources produce an empty state, not an error; malformed
    /// output is a fatal collection error.
    ///
    /// # Errors
    ///
    /// Returns a collection error when the payload cannot be parsed.
    fn parse_facts(&self, raw: &RawFacts) -> Result<ResourceState>;

    /// Validates normalized desired state before diffing.
    ///
    /// # Errors
    ///
    /// Returns a validation error for schema or cross-field violations.
    fn validate_want(&self, want: &ResourceState, mode: StateMode) -> Result<()> {
        let _ = (want, mode);
        Ok(())
    }

    /// Synthesizes device operations for one resource delta.
    ///
    /// Must be pure and deterministic: an empty delta produces no
    /// operations, and a converged state diffs to an empty delta.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the delta cannot be rendered for
    /// this kind.
    fn synthesize(&self, delta: &ResourceDelta, mode: StateMode) -> Result<Vec<Operation>>;

    /// Returns the declared sub-key for an entry-list field, if any.
    fn entry_sub_key(&self, field: &str) -> Option<&'static str> {
        self.entry_keys()
            .iter()
            .find(|ek| ek.field == field)
            .map(|ek| ek.sub_key)
    }
}

impl std::fmt::Debug for dyn ResourceKind + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceKind")
            .field("name", &self.name())
            .finish()
    }
}

/// Registry of available resource kinds.
#[derive(Clone, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<&'static str, Arc<dyn ResourceKind>>,
}

impl KindRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Creates a registry with all built-in kinds registered.
    #[must_use]
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::kinds::Vlans::new()));
        registry.register(Arc::new(crate::kinds::L3Interfaces::new()));
        registry.register(Arc::new(crate::kinds::Acls::new()));
        registry
    }

    /// Registers a kind, replacing any previous kind with the same name.
    pub fn register(&mut self, kind: Arc<dyn ResourceKind>) {
        self.kinds.insert(kind.name(), kind);
    }

    /// Looks up a kind by name.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown kind names.
    pub fn get(&self, name: &str) -> Result<Arc<dyn ResourceKind>> {
        self.kinds.get(name).cloned().ok_or_else(|| {
            ValidationError::UnknownKind {
                kind: name.to_string(),
            }
            .into()
        })
    }

    /// Returns the registered kind names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.kinds.keys().copied().collect()
    }
}

impl std::fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindRegistry")
            .field("kinds", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_kinds_are_registered() {
        let registry = KindRegistry::with_builtin_kinds();
        assert_eq!(registry.names(), vec!["acls", "l3_interfaces", "vlans"]);
        assert!(registry.get("vlans").is_ok());
    }

    #[test]
    fn test_kind_trait_objects_are_debuggable() {
        let registry = KindRegistry::with_builtin_kinds();
        let kind = registry.get("vlans").unwrap();
        assert!(format!("{kind:?}").contains("vlans"));
    }

    #[test]
    fn test_unknown_kind_is_an_error() {
        let registry = KindRegistry::with_builtin_kinds();
        let err = registry.get("bfd_interfaces").unwrap_err();
        assert!(err.to_string().contains("Unknown resource kind"));
    }
}
