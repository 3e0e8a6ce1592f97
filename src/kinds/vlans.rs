//! Layer-2 VLAN database, managed over the CLI.

use regex::Regex;
use tracing::trace;

use crate::diff::{DeltaKind, FieldChange, ResourceDelta, StateMode};
use crate::error::{CollectionError, Result, ValidationError};
use crate::resource::{FactsFlavor, FieldMap, FieldValue, ResourceKind, ResourceState};
use crate::synth::{CommandSet, Operation};
use crate::transport::RawFacts;

/// Highest assignable VLAN ID.
const MAX_VLAN_ID: i64 = 4094;

/// VLANs keyed by `vlan_id`, with `name` and `state` attributes.
///
/// Facts come from `show vlan brief` style output. VLAN 1 is the default
/// VLAN and can never be deleted.
#[derive(Debug)]
pub struct Vlans {
    line: Regex,
}

impl Vlans {
    /// Creates the kind.
    ///
    /// # Panics
    ///
    /// Never panics; the pattern is a checked literal.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn new() -> Self {
        Self {
            line: Regex::new(r"^(?P<id>\d+)\s+(?P<name>\S+)\s+(?P<state>act\S*|sus\S*)")
                .unwrap_or_else(|_| unreachable!("VLAN line pattern is a checked literal")),
        }
    }

    fn parse_line(&self, line: &str) -> Option<FieldMap> {
        let caps = self.line.captures(line.trim_start())?;
        let id: i64 = caps.name("id")?.as_str().parse().ok()?;
        let mut fields = FieldMap::new();
        fields.insert("vlan_id".into(), FieldValue::Integer(id));
        fields.insert(
            "name".into(),
            FieldValue::Text(caps.name("name")?.as_str().to_string()),
        );
        let state = if caps.name("state")?.as_str().starts_with("act") {
            "active"
        } else {
            "suspend"
        };
        fields.insert("state".into(), FieldValue::Text(state.into()));
        Some(fields)
    }
}

impl Default for Vlans {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceKind for Vlans {
    fn name(&self) -> &'static str {
        "vlans"
    }

    fn key_field(&self) -> &'static str {
        "vlan_id"
    }

    fn facts_flavor(&self) -> FactsFlavor {
        FactsFlavor::CliText
    }

    fn protected_keys(&self) -> &'static [&'static str] {
        &["1"]
    }

    fn parse_facts(&self, raw: &RawFacts) -> Result<ResourceState> {
        if raw.is_absent() {
            return Ok(ResourceState::new());
        }
        let RawFacts::CliText(text) = raw else {
            return Err(CollectionError::UnsupportedPayload {
                kind: self.name().to_string(),
                expected: "CLI text".to_string(),
            }
            .into());
        };

        let mut state = ResourceState::new();
        for line in text.lines() {
            if let Some(fields) = self.parse_line(line) {
                if let Some(id) = fields.get("vlan_id") {
                    trace!(vlan = %id, "parsed VLAN line");
                    state.insert(id.to_key_string(), fields);
                }
            }
        }
        Ok(state)
    }

    fn validate_want(&self, want: &ResourceState, _mode: StateMode) -> Result<()> {
        for (key, fields) in want.iter() {
            let id = fields
                .get("vlan_id")
                .and_then(FieldValue::as_i64)
                .ok_or_else(|| {
                    ValidationError::invalid(format!("VLAN '{key}' has a non-integer id"), "vlan_id")
                })?;
            if !(1..=MAX_VLAN_ID).contains(&id) {
                return Err(ValidationError::invalid(
                    format!("VLAN id {id} is out of range 1-{MAX_VLAN_ID}"),
                    "vlan_id",
                )
                .into());
            }
            if let Some(state) = fields.get("state") {
                if !state.is_null()
                    && !matches!(state.as_str(), Some("active" | "suspend"))
                {
                    return Err(ValidationError::invalid(
                        format!("VLAN '{key}' state must be 'active' or 'suspend'"),
                        "state",
                    )
                    .into());
                }
            }
        }
        Ok(())
    }

    fn synthesize(&self, delta: &ResourceDelta, _mode: StateMode) -> Result<Vec<Operation>> {
        let context = format!("vlan {}", delta.key);
        let mut set = CommandSet::new();

        match delta.kind {
            DeltaKind::Create => {
                let desired = delta.desired.as_ref().cloned().unwrap_or_default();
                let mut wrote = false;
                for (field, value) in &desired {
                    if field == "vlan_id" {
                        continue;
                    }
                    set.push_context(&context, attribute_line(field, value));
                    wrote = true;
                }
                if !wrote {
                    set.push_toplevel(context);
                }
            }
            DeltaKind::Delete => {
                set.push_toplevel(format!("no vlan {}", delta.key));
            }
            DeltaKind::Update => {
                for change in &delta.changes {
                    match change {
                        FieldChange::Clear { field, .. } => {
                            set.push_context(&context, format!("no {field}"));
                        }
                        FieldChange::Set { field, new, .. } => {
                            set.push_context(&context, attribute_line(field, new));
                        }
                        FieldChange::Entries { field, .. } => {
                            return Err(ValidationError::invalid(
                                "VLANs carry no entry-list fields",
                                field.clone(),
                            )
                            .into());
                        }
                    }
                }
            }
        }
        Ok(set.into_operations())
    }
}

fn attribute_line(field: &str, value: &FieldValue) -> String {
    format!("{field} {value}")
}
