//! State fingerprinting for change detection.
//!
//! A fingerprint is a deterministic hash of a [`ResourceState`]'s canonical
//! JSON rendering. Equal states always produce equal fingerprints, which
//! makes "did anything change" comparisons and idempotence checks cheap.

use sha2::{Digest, Sha256};

use super::state::ResourceState;

/// Hasher for computing resource-state fingerprints.
#[derive(Debug, Default)]
pub struct StateFingerprint;

impl StateFingerprint {
    /// Creates a new fingerprint hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the fingerprint of a state.
    #[must_use]
    pub fn fingerprint(&self, state: &ResourceState) -> String {
        let mut hasher = Sha256::new();
        hasher.update(state.to_json().to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::value::{FieldMap, FieldValue};

    #[test]
    fn test_equal_states_have_equal_fingerprints() {
        let hasher = StateFingerprint::new();

        let mut a = ResourceState::new();
        let mut fields = FieldMap::new();
        fields.insert(String::from("name"), FieldValue::from("ten"));
        a.insert("10", fields.clone());

        let mut b = ResourceState::new();
        b.insert("10", fields);

        assert_eq!(hasher.fingerprint(&a), hasher.fingerprint(&b));
    }

    #[test]
    fn test_field_change_changes_fingerprint() {
        let hasher = StateFingerprint::new();

        let mut a = ResourceState::new();
        let mut fields = FieldMap::new();
        fields.insert(String::from("name"), FieldValue::from("ten"));
        a.insert("10", fields.clone());

        let mut b = ResourceState::new();
        fields.insert(String::from("name"), FieldValue::from("TEN"));
        b.insert("10", fields);

        assert_ne!(hasher.fingerprint(&a), hasher.fingerprint(&b));
    }
}
