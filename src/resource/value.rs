//! Typed field values for resource configuration.
//!
//! The engine never manipulates raw YAML/JSON maps directly. Every field of
//! a resource is a [`FieldValue`], where `Null` is a first-class value
//! meaning "explicitly cleared". A field the caller never mentioned is
//! simply absent from the containing [`FieldMap`] — the two are never
//! conflated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An ordered field-name to value mapping for a single resource.
///
/// `BTreeMap` keeps iteration deterministic, which in turn keeps synthesized
/// operation order deterministic.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A single typed configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Explicit null: the caller asked for this field to be cleared.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
    /// List value. Lists of maps form keyed entry lists when the resource
    /// kind declares a sub-key for the field.
    List(Vec<FieldValue>),
    /// Nested mapping value.
    Map(FieldMap),
}

impl FieldValue {
    /// Converts a JSON value into a field value.
    ///
    /// Whole-number JSON numbers become `Integer` so that values parsed
    /// from device facts compare equal to values parsed from YAML want
    /// documents.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n.as_i64().map_or_else(
                || Self::Float(n.as_f64().unwrap_or(0.0)),
                Self::Integer,
            ),
            serde_json::Value::String(s) => Self::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Self::List(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts a YAML value into a field value.
    ///
    /// # Errors
    ///
    /// Returns an error message for YAML constructs the data model cannot
    /// represent (non-string mapping keys, tagged values).
    pub fn from_yaml(value: &serde_yaml::Value) -> std::result::Result<Self, String> {
        match value {
            serde_yaml::Value::Null => Ok(Self::Null),
            serde_yaml::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_yaml::Value::Number(n) => n.as_i64().map_or_else(
                || Ok(Self::Float(n.as_f64().unwrap_or(0.0))),
                |i| Ok(Self::Integer(i)),
            ),
            serde_yaml::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_yaml::Value::Sequence(items) => Ok(Self::List(
                items.iter().map(Self::from_yaml).collect::<std::result::Result<_, _>>()?,
            )),
            serde_yaml::Value::Mapping(map) => {
                let mut fields = FieldMap::new();
                for (k, v) in map {
                    let key = k
                        .as_str()
                        .ok_or_else(|| format!("Mapping key is not a string: {k:?}"))?;
                    fields.insert(key.to_string(), Self::from_yaml(v)?);
                }
                Ok(Self::Map(fields))
            }
            serde_yaml::Value::Tagged(t) => Err(format!("Unsupported tagged value: !{}", t.tag)),
        }
    }

    /// Converts the field value back into JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            Self::Map(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Returns true for the explicit-null value.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text value, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integer.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the list items, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Returns the nested field map, if this is a mapping.
    #[must_use]
    pub const fn as_map(&self) -> Option<&FieldMap> {
        match self {
            Self::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Renders the value as a canonical key string.
    ///
    /// Used when a scalar field value (VLAN id, interface name, rule
    /// sequence) identifies a resource or a list entry.
    #[must_use]
    pub fn to_key_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Bool(b) => b.to_string(),
            other => other.to_json().to_string(),
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
