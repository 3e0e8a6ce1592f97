//! The normalized resource-state container.
//!
//! A [`ResourceState`] maps resource keys (VLAN id, interface name, ACL
//! name) to their field maps. Two instances exist per reconciliation run:
//! `have` (collected from the device) and `want` (normalized caller input).
//! Both are immutable inputs to the differ.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::value::{FieldMap, FieldValue};

/// A keyed collection of resources of one kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceState {
    resources: BTreeMap<String, FieldMap>,
}

impl ResourceState {
    /// Creates an empty state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            resources: BTreeMap::new(),
        }
    }

    /// Inserts a resource, replacing any previous entry for the key.
    pub fn insert(&mut self, key: impl Into<String>, fields: FieldMap) {
        self.resources.insert(key.into(), fields);
    }

    /// Removes a resource by key.
    pub fn remove(&mut self, key: &str) -> Option<FieldMap> {
        self.resources.remove(key)
    }

    /// Returns the fields for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldMap> {
        self.resources.get(key)
    }

    /// Returns a mutable reference to the fields for a key.
    #[must_use]
    pub fn get_mut(&mut self, key: &str) -> Option<&mut FieldMap> {
        self.resources.get_mut(key)
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.resources.contains_key(key)
    }

    /// Returns the number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if there are no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Iterates resources in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldMap)> {
        self.resources.iter()
    }

    /// Returns the keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }

    /// Renders the whole state as canonical JSON.
    ///
    /// Key order is stable, so the rendering is deterministic and suitable
    /// for fingerprinting.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.resources
                .iter()
                .map(|(key, fields)| (key.clone(), FieldValue::Map(fields.clone()).to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, FieldMap)> for ResourceState {
    fn from_iter<I: IntoIterator<Item = (String, FieldMap)>>(iter: I) -> Self {
        Self {
            resources: iter.into_iter().collect(),
        }
    }
}
