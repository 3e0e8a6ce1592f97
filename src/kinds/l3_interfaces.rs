//! Layer-3 interface attributes, managed over the CLI.

use regex::Regex;

use crate::diff::{DeltaKind, EntryChange, FieldChange, ResourceDelta, StateMode};
use crate::error::{CollectionError, Result, ValidationError};
use crate::resource::{EntryKey, FactsFlavor, FieldMap, FieldValue, ResourceKind, ResourceState};
use crate::synth::{CommandSet, Operation};
use crate::transport::RawFacts;

const MIN_MTU: i64 = 68;
const MAX_MTU: i64 = 9216;

/// L3 interface attributes keyed by interface `name`.
///
/// Facts come from running-config interface stanzas. The `ipv4` field is a
/// keyed entry list (one entry per address). Interfaces are never created
/// or removed by this kind: a create configures an existing interface, and
/// a delete resets its attributes to defaults.
#[derive(Debug)]
pub struct L3Interfaces {
    header: Regex,
    address: Regex,
}

impl L3Interfaces {
    /// Creates the kind.
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn new() -> Self {
        Self {
            header: Regex::new(r"^interface (?P<name>\S+)")
                .unwrap_or_else(|_| unreachable!("interface header pattern is a checked literal")),
            address: Regex::new(r"^ip address (?P<addr>\S+)(?P<secondary> secondary)?")
                .unwrap_or_else(|_| unreachable!("ip address pattern is a checked literal")),
        }
    }

    fn parse_attribute(&self, line: &str, fields: &mut FieldMap, ipv4: &mut Vec<FieldValue>) {
        if let Some(caps) = self.address.captures(line) {
            let mut entry = FieldMap::new();
            if let Some(addr) = caps.name("addr") {
                entry.insert("address".into(), FieldValue::Text(addr.as_str().into()));
            }
            if caps.name("secondary").is_some() {
                entry.insert("secondary".into(), FieldValue::Bool(true));
            }
            ipv4.push(FieldValue::Map(entry));
            return;
        }
        if let Some(rest) = line.strip_prefix("description ") {
            fields.insert("description".into(), FieldValue::Text(rest.trim().into()));
            return;
        }
        if let Some(rest) = line.strip_prefix("mtu ") {
            if let Ok(mtu) = rest.trim().parse::<i64>() {
                fields.insert("mtu".into(), FieldValue::Integer(mtu));
            }
        }
    }
}

impl Default for L3Interfaces {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceKind for L3Interfaces {
    fn name(&self) -> &'static str {
        "l3_interfaces"
    }

    fn key_field(&self) -> &'static str {
        "name"
    }

    fn facts_flavor(&self) -> FactsFlavor {
        FactsFlavor::CliText
    }

    fn entry_keys(&self) -> &'static [EntryKey] {
        &[EntryKey {
            field: "ipv4",
            sub_key: "address",
        }]
    }

    fn delete_resets_attributes(&self) -> bool {
        true
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
        let mut current: Option<(String, FieldMap, Vec<FieldValue>)> = None;

        for raw_line in text.lines() {
            let line = raw_line.trim();
            if let Some(caps) = self.header.captures(line) {
                if let Some(entry) = current.take() {
                    finish_interface(&mut state, entry);
                }
                if let Some(name) = caps.name("name") {
                    let mut fields = FieldMap::new();
                    fields.insert("name".into(), FieldValue::Text(name.as_str().into()));
                    current = Some((name.as_str().to_string(), fields, Vec::new()));
                }
                continue;
            }
            if line == "!" {
                if let Some(entry) = current.take() {
                    finish_interface(&mut state, entry);
                }
                continue;
            }
            if let Some((_, fields, ipv4)) = current.as_mut() {
                self.parse_attribute(line, fields, ipv4);
            }
        }
        if let Some(entry) = current.take() {
            finish_interface(&mut state, entry);
        }
        Ok(state)
    }

    fn validate_want(&self, want: &ResourceState, mode: StateMode) -> Result<()> {
        for (key, fields) in want.iter() {
            if let Some(mtu) = fields.get("mtu").and_then(FieldValue::as_i64) {
                if !(MIN_MTU..=MAX_MTU).contains(&mtu) {
                    return Err(ValidationError::invalid(
                        format!("Interface '{key}' mtu {mtu} is out of range {MIN_MTU}-{MAX_MTU}"),
                        "mtu",
                    )
                    .into());
                }
            }
            if let Some(entries) = fields.get("ipv4").and_then(FieldValue::as_list) {
                for entry in entries {
                    let has_address = entry
                        .as_map()
                        .is_some_and(|m| m.get("address").is_some_and(|a| !a.is_null()));
                    if !has_address && mode != StateMode::Deleted {
                        return Err(ValidationError::invalid(
                            format!("Interface '{key}' has an ipv4 entry without an address"),
                            "ipv4",
                        )
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    fn synthesize(&self, delta: &ResourceDelta, _mode: StateMode) -> Result<Vec<Operation>> {
        let context = format!("interface {}", delta.key);
        let mut set = CommandSet::new();

        match delta.kind {
            DeltaKind::Create => {
                let desired = delta.desired.as_ref().cloned().unwrap_or_default();
                for (field, value) in &desired {
                    if field == "name" {
                        continue;
                    }
                    if field == "ipv4" {
                        for entry in value.as_list().unwrap_or_default() {
                            if let Some(map) = entry.as_map() {
                                set.push_context(&context, address_line(map));
                            }
                        }
                    } else {
                        set.push_context(&context, format!("{field} {value}"));
                    }
                }
            }
            DeltaKind::Delete => {
                // Interfaces are reset, not removed.
                let observed = delta.observed.as_ref().cloned().unwrap_or_default();
                for (field, value) in &observed {
                    if field == "name" {
                        continue;
                    }
                    if field == "ipv4" {
                        for entry in value.as_list().unwrap_or_default() {
                            if let Some(addr) =
                                entry.as_map().and_then(|m| m.get("address"))
                            {
                                set.push_context(&context, format!("no ip address {addr}"));
                            }
                        }
                    } else {
                        set.push_context(&context, format!("no {field}"));
                    }
                }
            }
            DeltaKind::Update => {
                for change in &delta.changes {
                    match change {
                        FieldChange::Clear { field, .. } => {
                            set.push_context(&context, format!("no {field}"));
                        }
                        FieldChange::Set { field, new, .. } => {
                            set.push_context(&context, format!("{field} {new}"));
                        }
                        FieldChange::Entries { changes, .. } => {
                            self.synthesize_addresses(&context, changes, &mut set)?;
                        }
                    }
                }
            }
        }
        Ok(set.into_operations())
    }
}

impl L3Interfaces {
    fn synthesize_addresses(
        &self,
        context: &str,
        changes: &[EntryChange],
        set: &mut CommandSet,
    ) -> Result<()> {
        for change in changes {
            match change {
                EntryChange::Remove { key, .. } => {
                    set.push_context(context, format!("no ip address {key}"));
                }
                EntryChange::Add { entry } => {
                    set.push_context(context, address_line(entry));
                }
                EntryChange::Update { key, set: updates } => {
                    // Re-issue the full address line with its new flags.
                    let mut merged = updates.clone();
                    merged
                        .entry("address".to_string())
                        .or_insert_with(|| key.clone());
                    set.push_context(context, address_line(&merged));
                }
            }
        }
        Ok(())
    }
}

fn finish_interface(state: &mut ResourceState, entry: (String, FieldMap, Vec<FieldValue>)) {
    let (name, mut fields, ipv4) = entry;
    if !ipv4.is_empty() {
        fields.insert("ipv4".into(), FieldValue::List(ipv4));
    }
    state.insert(name, fields);
}

fn address_line(entry: &FieldMap) -> String {
    let addr = entry
        .get("address")
        .map(FieldValue::to_key_string)
        .unwrap_or_default();
    let secondary = entry
        .get("secondary")
        .and_then(FieldValue::as_bool)
        .unwrap_or(false);
    if secondary {
        format!("ip address {addr} secondary")
    } else {
        format!("ip address {addr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUNNING_CONFIG: &str = "\
interface Ethernet1
 description uplink to core
 mtu 9000
 ip address 10.0.0.1/24
 ip address 10.0.0.2/24 secondary
!
interface Ethernet2
!
";

    #[test]
    fn test_parse_running_config_stanzas() {
        let kind = L3Interfaces::new();
        let state = kind
            .parse_facts(&RawFacts::CliText(RUNNING_CONFIG.into()))
            .unwrap();
        assert_eq!(state.len(), 2);

        let eth1 = state.get("Ethernet1").unwrap();
        assert_eq!(
            eth1.get("description").unwrap().as_str(),
            Some("uplink to core")
        );
        assert_eq!(eth1.get("mtu").unwrap().as_i64(), Some(9000));
        let addrs = eth1.get("ipv4").unwrap().as_list().unwrap();
        assert_eq!(addrs.len(), 2);
        assert_eq!(
            addrs[1].as_map().unwrap().get("secondary").unwrap().as_bool(),
            Some(true)
        );

        // Bare interface carries only its identity.
        let eth2 = state.get("Ethernet2").unwrap();
        assert_eq!(eth2.len(), 1);
    }

    #[test]
    fn test_validate_rejects_addressless_entry() {
        let kind = L3Interfaces::new();
        let mut state = ResourceState::new();
        let mut fields = FieldMap::new();
        fields.insert("name".into(), FieldValue::Text("Ethernet1".into()));
        let mut entry = FieldMap::new();
        entry.insert("secondary".into(), FieldValue::Bool(true));
        fields.insert("ipv4".into(), FieldValue::List(vec![FieldValue::Map(entry)]));
        state.insert("Ethernet1", fields);
        assert!(kind.validate_want(&state, StateMode::Merged).is_err());
        // The same shape is a legal entry selector in deleted mode.
        assert!(kind.validate_want(&state, StateMode::Deleted).is_ok());
    }

    #[test]
    fn test_synthesize_entry_changes() {
        let kind = L3Interfaces::new();
        let mut added = FieldMap::new();
        added.insert("address".into(), FieldValue::Text("10.0.1.1/24".into()));

        let delta = ResourceDelta {
            key: "Ethernet1".into(),
            kind: DeltaKind::Update,
            changes: vec![
                FieldChange::Set {
                    field: "mtu".into(),
                    old: None,
                    new: FieldValue::Integer(9000),
                },
                FieldChange::Entries {
                    field: "ipv4".into(),
                    sub_key: "address".into(),
                    changes: vec![
                        EntryChange::Remove {
                            key: FieldValue::Text("10.0.0.2/24".into()),
                            entry: FieldMap::new(),
                        },
                        EntryChange::Add { entry: added },
                    ],
                },
            ],
            desired: None,
            observed: None,
        };

        let ops: Vec<String> = kind
            .synthesize(&delta, StateMode::Merged)
            .unwrap()
            .iter()
            .map(Operation::describe)
            .collect();
        assert_eq!(
            ops,
            vec![
                "interface Ethernet1",
                "mtu 9000",
                "no ip address 10.0.0.2/24",
                "ip address 10.0.1.1/24",
            ]
        );
    }

    #[test]
    fn test_synthesize_delete_resets_attributes() {
        let kind = L3Interfaces::new();
        let state = kind
            .parse_facts(&RawFacts::CliText(RUNNING_CONFIG.into()))
            .unwrap();
        let delta = ResourceDelta {
            key: "Ethernet1".into(),
            kind: DeltaKind::Delete,
            changes: Vec::new(),
            desired: None,
            observed: state.get("Ethernet1").cloned(),
        };

        let ops: Vec<String> = kind
            .synthesize(&delta, StateMode::Deleted)
            .unwrap()
            .iter()
            .map(Operation::describe)
            .collect();
        assert_eq!(
            ops,
            vec![
                "interface Ethernet1",
                "no description",
                "no ip address 10.0.0.1/24",
                "no ip address 10.0.0.2/24",
                "no mtu",
            ]
        );
    }
}
