//! Access-control lists, managed over the REST API.

use serde_json::json;

use crate::diff::{DeltaKind, EntryChange, FieldChange, ResourceDelta, StateMode};
use crate::error::{CollectionError, Result, ValidationError};
use crate::resource::{EntryKey, FactsFlavor, FieldValue, ResourceKind, ResourceState};
use crate::synth::{HttpMethod, Operation, RequestBatcher, RestRequest};
use crate::transport::RawFacts;

/// Collection path on the device API.
const ACL_SETS_PATH: &str = "/data/acl/acl-sets";

/// ACLs keyed by `name`, with `afi`, `description` and a `rules` entry
/// list keyed by `sequence`.
///
/// Facts are the JSON body of `GET /data/acl/acl-sets`. Mutations are
/// RESTCONF-style calls: resources are created with POST, changed with
/// PATCH and removed with DELETE; consecutive rule patches against one
/// ACL coalesce into a single request.
#[derive(Debug, Default)]
pub struct Acls;

impl Acls {
    /// Creates the kind.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn resource_path(name: &str) -> String {
        format!("{ACL_SETS_PATH}/acl-set={name}")
    }
}

impl ResourceKind for Acls {
    fn name(&self) -> &'static str {
        "acls"
    }

    fn key_field(&self) -> &'static str {
        "name"
    }

    fn facts_flavor(&self) -> FactsFlavor {
        FactsFlavor::Json
    }

    fn entry_keys(&self) -> &'static [EntryKey] {
        &[EntryKey {
            field: "rules",
            sub_key: "sequence",
        }]
    }

    fn parse_facts(&self, raw: &RawFacts) -> Result<ResourceState> {
        if raw.is_absent() {
            return Ok(ResourceState::new());
        }
        let RawFacts::Json(value) = raw else {
            return Err(CollectionError::UnsupportedPayload {
                kind: self.name().to_string(),
                expected: "JSON".to_string(),
            }
            .into());
        };

        let sets = value
            .get("acl-sets")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| {
                CollectionError::malformed(self.name(), "payload is missing the 'acl-sets' array")
            })?;

        let mut state = ResourceState::new();
        for set in sets {
            let FieldValue::Map(fields) = FieldValue::from_json(set) else {
                return Err(
                    CollectionError::malformed(self.name(), "acl-set item is not an object").into(),
                );
            };
            let name = fields
                .get("name")
                .and_then(FieldValue::as_str)
                .ok_or_else(|| {
                    CollectionError::malformed(self.name(), "acl-set item has no name")
                })?
                .to_string();
            state.insert(name, fields);
        }
        Ok(state)
    }

    fn validate_want(&self, want: &ResourceState, mode: StateMode) -> Result<()> {
        for (key, fields) in want.iter() {
            if let Some(afi) = fields.get("afi") {
                if !afi.is_null() && !matches!(afi.as_str(), Some("ipv4" | "ipv6")) {
                    return Err(ValidationError::invalid(
                        format!("ACL '{key}' afi must be 'ipv4' or 'ipv6'"),
                        "afi",
                    )
                    .into());
                }
            }
            let Some(rules) = fields.get("rules").and_then(FieldValue::as_list) else {
                continue;
            };
            for rule in rules {
                let sequence = rule.as_map().and_then(|m| m.get("sequence"));
                match sequence.and_then(FieldValue::as_i64) {
                    Some(seq) if seq > 0 => {}
                    Some(seq) => {
                        return Err(ValidationError::invalid(
                            format!("ACL '{key}' rule sequence {seq} must be positive"),
                            "rules",
                        )
                        .into());
                    }
                    None if mode == StateMode::Deleted => {}
                    None => {
                        return Err(ValidationError::invalid(
                            format!("ACL '{key}' has a rule without a sequence"),
                            "rules",
                        )
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    fn synthesize(&self, delta: &ResourceDelta, _mode: StateMode) -> Result<Vec<Operation>> {
        let path = Self::resource_path(&delta.key);
        let mut batcher = RequestBatcher::new();

        match delta.kind {
            DeltaKind::Create => {
                let desired = delta.desired.as_ref().cloned().unwrap_or_default();
                let body = json!({ "acl-set": [FieldValue::Map(desired).to_json()] });
                batcher.push(RestRequest::new(HttpMethod::Post, ACL_SETS_PATH, body));
            }
            DeltaKind::Delete => {
                batcher.push(RestRequest::delete(path));
            }
            DeltaKind::Update => {
                for change in &delta.changes {
                    match change {
                        FieldChange::Clear { field, .. } => {
                            batcher.push(RestRequest::delete(format!("{path}/{field}")));
                        }
                        FieldChange::Set { field, new, .. } => {
                            batcher.push(RestRequest::new(
                                HttpMethod::Patch,
                                path.clone(),
                                json!({ field.clone(): new.to_json() }),
                            ));
                        }
                        FieldChange::Entries {
                            field,
                            sub_key,
                            changes,
                        } => {
                            synthesize_rules(&path, field, sub_key, changes, &mut batcher);
                        }
                    }
                }
            }
        }
        Ok(batcher.into_operations())
    }
}

fn synthesize_rules(
    path: &str,
    field: &str,
    sub_key: &str,
    changes: &[EntryChange],
    batcher: &mut RequestBatcher,
) {
    for change in changes {
        match change {
            EntryChange::Remove { key, .. } => {
                batcher.push(RestRequest::delete(format!(
                    "{path}/{field}/rule={}",
                    key.to_key_string()
                )));
            }
            EntryChange::Add { entry } => {
                batcher.push(RestRequest::new(
                    HttpMethod::Patch,
                    path.to_string(),
                    json!({ field.to_string(): [FieldValue::Map(entry.clone()).to_json()] }),
                ));
            }
            EntryChange::Update { key, set } => {
                let mut merged = set.clone();
                merged
                    .entry(sub_key.to_string())
                    .or_insert_with(|| key.clone());
                batcher.push(RestRequest::new(
                    HttpMethod::Patch,
                    path.to_string(),
                    json!({ field.to_string(): [FieldValue::Map(merged).to_json()] }),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::FieldMap;

    fn facts() -> RawFacts {
        RawFacts::Json(json!({
            "acl-sets": [
                {
                    "name": "edge-in",
                    "afi": "ipv4",
                    "rules": [
                        {"sequence": 10, "action": "permit", "source": "10.0.0.0/8"},
                        {"sequence": 20, "action": "deny", "source": "any"}
                    ]
                }
            ]
        }))
    }

    #[test]
    fn test_parse_acl_sets() {
        let kind = Acls::new();
        let state = kind.parse_facts(&facts()).unwrap();
        assert_eq!(state.len(), 1);
        let acl = state.get("edge-in").unwrap();
        assert_eq!(acl.get("afi").unwrap().as_str(), Some("ipv4"));
        assert_eq!(acl.get("rules").unwrap().as_list().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_rejects_malformed_payload() {
        let kind = Acls::new();
        let err = kind
            .parse_facts(&RawFacts::Json(json!({"acls": []})))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::ConvergeError::Collection(CollectionError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_afi_and_sequence() {
        let kind = Acls::new();
        let mut state = ResourceState::new();
        let mut fields = FieldMap::new();
        fields.insert("name".into(), FieldValue::Text("x".into()));
        fields.insert("afi".into(), FieldValue::Text("ipx".into()));
        state.insert("x", fields.clone());
        assert!(kind.validate_want(&state, StateMode::Merged).is_err());

        fields.insert("afi".into(), FieldValue::Text("ipv4".into()));
        let mut rule = FieldMap::new();
        rule.insert("action".into(), FieldValue::Text("permit".into()));
        fields.insert("rules".into(), FieldValue::List(vec![FieldValue::Map(rule)]));
        let mut state = ResourceState::new();
        state.insert("x", fields);
        assert!(kind.validate_want(&state, StateMode::Merged).is_err());
        // A sequence-less rule is a legal selector in deleted mode.
        assert!(kind.validate_want(&state, StateMode::Deleted).is_ok());
    }

    #[test]
    fn test_synthesize_create_posts_collection() {
        let kind = Acls::new();
        let mut desired = FieldMap::new();
        desired.insert("name".into(), FieldValue::Text("mgmt".into()));
        desired.insert("afi".into(), FieldValue::Text("ipv4".into()));
        let delta = ResourceDelta {
            key: "mgmt".into(),
            kind: DeltaKind::Create,
            changes: Vec::new(),
            desired: Some(desired),
            observed: None,
        };

        let ops = kind.synthesize(&delta, StateMode::Merged).unwrap();
        assert_eq!(ops.len(), 1);
        let Operation::Request(req) = &ops[0] else {
            panic!("expected a request");
        };
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, ACL_SETS_PATH);
        assert_eq!(
            req.body,
            Some(json!({"acl-set": [{"name": "mgmt", "afi": "ipv4"}]}))
        );
    }

    #[test]
    fn test_rule_patches_coalesce() {
        let kind = Acls::new();
        let entry = |seq: i64| {
            let mut e = FieldMap::new();
            e.insert("sequence".into(), FieldValue::Integer(seq));
            e.insert("action".into(), FieldValue::Text("permit".into()));
            e
        };
        let delta = ResourceDelta {
            key: "edge-in".into(),
            kind: DeltaKind::Update,
            changes: vec![FieldChange::Entries {
                field: "rules".into(),
                sub_key: "sequence".into(),
                changes: vec![
                    EntryChange::Add { entry: entry(30) },
                    EntryChange::Add { entry: entry(40) },
                ],
            }],
            desired: None,
            observed: None,
        };

        let ops = kind.synthesize(&delta, StateMode::Merged).unwrap();
        assert_eq!(ops.len(), 1, "consecutive rule patches merge");
        let Operation::Request(req) = &ops[0] else {
            panic!("expected a request");
        };
        assert_eq!(
            req.body,
            Some(json!({"rules": [
                {"action": "permit", "sequence": 30},
                {"action": "permit", "sequence": 40}
            ]}))
        );
    }

    #[test]
    fn test_synthesize_delete_and_rule_removal_paths() {
        let kind = Acls::new();
        let delete = ResourceDelta {
            key: "edge-in".into(),
            kind: DeltaKind::Delete,
            changes: Vec::new(),
            desired: None,
            observed: None,
        };
        let ops = kind.synthesize(&delete, StateMode::Deleted).unwrap();
        assert_eq!(ops[0].describe(), "DELETE /data/acl/acl-sets/acl-set=edge-in");

        let remove_rule = ResourceDelta {
            key: "edge-in".into(),
            kind: DeltaKind::Update,
            changes: vec![FieldChange::Entries {
                field: "rules".into(),
                sub_key: "sequence".into(),
                changes: vec![EntryChange::Remove {
                    key: FieldValue::Integer(20),
                    entry: FieldMap::new(),
                }],
            }],
            desired: None,
            observed: None,
        };
        let ops = kind.synthesize(&remove_rule, StateMode::Deleted).unwrap();
        assert_eq!(
            ops[0].describe(),
            "DELETE /data/acl/acl-sets/acl-set=edge-in/rules/rule=20"
        );
    }
}
