//! Mode-aware diff between desired and observed state.

use tracing::{debug, warn};

use crate::diff::{DeltaKind, EntryChange, FieldChange, ResourceDelta, StateDelta, StateMode};
use crate::error::{ConvergeError, Result, ValidationError};
use crate::resource::{FieldMap, FieldValue, NormalizedWant, ResourceKind, ResourceState};

/// Computes [`StateDelta`]s from a normalized want and an observed have.
///
/// The engine is stateless; one instance can diff any kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine;

impl DiffEngine {
    /// Creates a diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Diffs `want` against `have` under `mode`.
    ///
    /// `extra_protected` extends the kind's own protected keys; protected
    /// resources are never deleted, only warned about.
    ///
    /// # Errors
    ///
    /// Returns a validation error when `want` is empty in a mode that
    /// requires it, or an ambiguous-delete error when a selector matches
    /// more than one resource.
    pub fn diff(
        &self,
        kind: &dyn ResourceKind,
        want: &NormalizedWant,
        have: &ResourceState,
        mode: StateMode,
        extra_protected: &[String],
    ) -> Result<StateDelta> {
        if mode != StateMode::Deleted && want.is_empty() {
            return Err(ValidationError::EmptyWant {
                mode: mode.to_string(),
            }
            .into());
        }

        let mut delta = StateDelta::default();
        delta.warnings.extend(want.warnings.iter().cloned());

        match mode {
            StateMode::Merged => self.diff_present(kind, want, have, false, &mut delta),
            StateMode::Replaced => self.diff_present(kind, want, have, true, &mut delta),
            StateMode::Overridden => {
                self.diff_overridden(kind, want, have, extra_protected, &mut delta);
            }
            StateMode::Deleted => {
                self.diff_deleted(kind, want, have, extra_protected, &mut delta)?;
            }
        }

        debug!(
            kind = kind.name(),
            %mode,
            creates = delta.creates(),
            updates = delta.updates(),
            deletes = delta.deletes(),
            "computed state delta"
        );
        Ok(delta)
    }

    /// Merged and replaced share a shape: walk the want, create what is
    /// missing, update what differs. Replaced additionally clears observed
    /// fields the want does not mention.
    fn diff_present(
        &self,
        kind: &dyn ResourceKind,
        want: &NormalizedWant,
        have: &ResourceState,
        replace: bool,
        delta: &mut StateDelta,
    ) {
        for (key, want_fields) in want.state.iter() {
            match have.get(key) {
                None => delta.deltas.push(make_create(key, want_fields)),
                Some(have_fields) => {
                    let changes = if replace {
                        replace_fields(kind, want_fields, have_fields)
                    } else {
                        merge_fields(kind, want_fields, have_fields)
                    };
                    if !changes.is_empty() {
                        delta.deltas.push(ResourceDelta {
                            key: key.clone(),
                            kind: DeltaKind::Update,
                            changes,
                            desired: Some(want_fields.clone()),
                            observed: Some(have_fields.clone()),
                        });
                    }
                }
            }
        }
    }

    /// Overridden: delete every unprotected observed resource the want does
    /// not mention, then apply replaced semantics to the rest.
    fn diff_overridden(
        &self,
        kind: &dyn ResourceKind,
        want: &NormalizedWant,
        have: &ResourceState,
        extra_protected: &[String],
        delta: &mut StateDelta,
    ) {
        for (key, have_fields) in have.iter() {
            if want.state.contains(key) {
                continue;
            }
            if is_protected(kind, extra_protected, key) {
                delta
                    .warnings
                    .push(format!("{} '{key}' is protected and was retained", kind.name()));
                continue;
            }
            delta.deltas.push(make_delete(key, have_fields));
        }
        self.diff_present(kind, want, have, true, delta);
    }

    /// Deleted: empty want deletes everything unprotected; keyed wants
    /// delete (or partially delete) named resources; key-less selectors
    /// must match exactly one resource.
    fn diff_deleted(
        &self,
        kind: &dyn ResourceKind,
        want: &NormalizedWant,
        have: &ResourceState,
        extra_protected: &[String],
        delta: &mut StateDelta,
    ) -> Result<()> {
        if want.is_empty() {
            for (key, have_fields) in have.iter() {
                if is_protected(kind, extra_protected, key) {
                    delta
                        .warnings
                        .push(format!("{} '{key}' is protected and was retained", kind.name()));
                    continue;
                }
                delta.deltas.push(make_delete(key, have_fields));
            }
            return Ok(());
        }

        for (key, want_fields) in want.state.iter() {
            let Some(have_fields) = have.get(key) else {
                delta
                    .warnings
                    .push(format!("{} '{key}' not present, nothing to delete", kind.name()));
                continue;
            };

            if is_protected(kind, extra_protected, key) {
                warn!(kind = kind.name(), %key, "refusing to delete protected resource");
                delta
                    .warnings
                    .push(format!("{} '{key}' is protected and was retained", kind.name()));
                continue;
            }

            let changes = delete_changes(kind, want_fields, have_fields)?;
            if changes.is_empty() {
                // Only the key was given: delete the whole resource.
                delta.deltas.push(make_delete(key, have_fields));
            } else {
                delta.deltas.push(ResourceDelta {
                    key: key.clone(),
                    kind: DeltaKind::Update,
                    changes,
                    desired: None,
                    observed: Some(have_fields.clone()),
                });
            }
        }

        for selector in &want.selectors {
            self.delete_by_selector(kind, selector, have, extra_protected, delta)?;
        }
        Ok(())
    }

    /// Resolves a key-less delete selector against the observed state.
    fn delete_by_selector(
        &self,
        kind: &dyn ResourceKind,
        selector: &FieldMap,
        have: &ResourceState,
        extra_protected: &[String],
        delta: &mut StateDelta,
    ) -> Result<()> {
        let matches: Vec<&str> = have
            .iter()
            .filter(|(_, fields)| selector_matches(selector, fields))
            .map(|(key, _)| key.as_str())
            .collect();

        match matches.as_slice() {
            [] => {
                delta.warnings.push(format!(
                    "{} delete selector matched no resources",
                    kind.name()
                ));
            }
            [key] => {
                let key = (*key).to_string();
                if is_protected(kind, extra_protected, &key) {
                    delta
                        .warnings
                        .push(format!("{} '{key}' is protected and was retained", kind.name()));
                } else if let Some(have_fields) = have.get(&key) {
                    delta.deltas.push(make_delete(&key, have_fields));
                }
            }
            many => {
                return Err(ConvergeError::AmbiguousDelete {
                    kind: kind.name().to_string(),
                    key_field: kind.key_field().to_string(),
                    matches: many.iter().map(|k| (*k).to_string()).collect(),
                });
            }
        }
        Ok(())
    }
}

/// True when every non-null selector field equals the observed field.
fn selector_matches(selector: &FieldMap, fields: &FieldMap) -> bool {
    selector
        .iter()
        .filter(|(_, v)| !v.is_null())
        .all(|(name, value)| fields.get(name) == Some(value))
}

fn is_protected(kind: &dyn ResourceKind, extra: &[String], key: &str) -> bool {
    kind.protected_keys().contains(&key) || extra.iter().any(|p| p == key)
}

fn make_create(key: &str, want_fields: &FieldMap) -> ResourceDelta {
    let desired: FieldMap = want_fields
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    ResourceDelta {
        key: key.to_string(),
        kind: DeltaKind::Create,
        changes: Vec::new(),
        desired: Some(desired),
        observed: None,
    }
}

fn make_delete(key: &str, have_fields: &FieldMap) -> ResourceDelta {
    ResourceDelta {
        key: key.to_string(),
        kind: DeltaKind::Delete,
        changes: Vec::new(),
        desired: None,
        observed: Some(have_fields.clone()),
    }
}

/// Merged semantics: only fields the want mentions may change. An explicit
/// null clears the observed value; absence leaves it alone.
fn merge_fields(kind: &dyn ResourceKind, want: &FieldMap, have: &FieldMap) -> Vec<FieldChange> {
    let mut clears = Vec::new();
    let mut sets = Vec::new();
    let mut entries = Vec::new();

    for (name, want_value) in want {
        if name == kind.key_field() {
            continue;
        }
        let have_value = have.get(name);
        if want_value.is_null() {
            if let Some(old) = have_value {
                clears.push(FieldChange::Clear {
                    field: name.clone(),
                    old: old.clone(),
                });
            }
            continue;
        }
        if let Some(sub_key) = kind.entry_sub_key(name) {
            let changes = merge_entries(want_value, have_value, sub_key);
            if !changes.is_empty() {
                entries.push(FieldChange::Entries {
                    field: name.clone(),
                    sub_key: sub_key.to_string(),
                    changes,
                });
            }
            continue;
        }
        if have_value != Some(want_value) {
            sets.push(FieldChange::Set {
                field: name.clone(),
                old: have_value.cloned(),
                new: want_value.clone(),
            });
        }
    }

    ordered(clears, sets, entries)
}

/// Replaced semantics: the want is the whole truth for this resource.
/// Observed fields the want does not mention are cleared, and entry lists
/// are replaced element-wise.
fn replace_fields(kind: &dyn ResourceKind, want: &FieldMap, have: &FieldMap) -> Vec<FieldChange> {
    let mut clears = Vec::new();
    let mut sets = Vec::new();
    let mut entries = Vec::new();

    for (name, old) in have {
        if name == kind.key_field() {
            continue;
        }
        let absent = match want.get(name) {
            None => true,
            Some(v) => v.is_null(),
        };
        if absent && kind.entry_sub_key(name).is_none() {
            clears.push(FieldChange::Clear {
                field: name.clone(),
                old: old.clone(),
            });
        }
    }

    for (name, want_value) in want {
        if name == kind.key_field() {
            continue;
        }
        let have_value = have.get(name);
        if let Some(sub_key) = kind.entry_sub_key(name) {
            let changes = replace_entries(want_value, have_value, sub_key);
            if !changes.is_empty() {
                entries.push(FieldChange::Entries {
                    field: name.clone(),
                    sub_key: sub_key.to_string(),
                    changes,
                });
            }
            continue;
        }
        if want_value.is_null() {
            continue;
        }
        if have_value != Some(want_value) {
            sets.push(FieldChange::Set {
                field: name.clone(),
                old: have_value.cloned(),
                new: want_value.clone(),
            });
        }
    }

    // Entry lists present in have but absent from want are emptied.
    for (name, old) in have {
        let Some(sub_key) = kind.entry_sub_key(name) else {
            continue;
        };
        // Any mention in want, null included, was diffed by the loop above.
        if want.contains_key(name) {
            continue;
        }
        let changes = replace_entries(&FieldValue::List(Vec::new()), Some(old), sub_key);
        if !changes.is_empty() {
            entries.push(FieldChange::Entries {
                field: name.clone(),
                sub_key: sub_key.to_string(),
                changes,
            });
        }
    }

    ordered(clears, sets, entries)
}

/// Deleted partial semantics: named scalar fields are cleared, named entry
/// list entries are removed. Returns empty when the want names only the key.
fn delete_changes(
    kind: &dyn ResourceKind,
    want: &FieldMap,
    have: &FieldMap,
) -> Result<Vec<FieldChange>> {
    let mut clears = Vec::new();
    let mut entries = Vec::new();

    for (name, want_value) in want {
        if name == kind.key_field() {
            continue;
        }
        if let Some(sub_key) = kind.entry_sub_key(name) {
            let removals = remove_entries(kind, want_value, have.get(name), sub_key)?;
            if !removals.is_empty() {
                entries.push(FieldChange::Entries {
                    field: name.clone(),
                    sub_key: sub_key.to_string(),
                    changes: removals,
                });
            }
            continue;
        }
        if let Some(old) = have.get(name) {
            clears.push(FieldChange::Clear {
                field: name.clone(),
                old: old.clone(),
            });
        }
    }

    Ok(ordered(clears, Vec::new(), entries))
}

fn ordered(
    clears: Vec<FieldChange>,
    sets: Vec<FieldChange>,
    entries: Vec<FieldChange>,
) -> Vec<FieldChange> {
    let mut changes = clears;
    changes.extend(sets);
    changes.extend(entries);
    changes
}

fn entry_list(value: Option<&FieldValue>) -> Vec<&FieldMap> {
    value
        .and_then(FieldValue::as_list)
        .map(|items| items.iter().filter_map(FieldValue::as_map).collect())
        .unwrap_or_default()
}

/// Merged entry semantics: add missing entries, update matched ones by
/// sub-key. Nothing is removed.
fn merge_entries(
    want_value: &FieldValue,
    have_value: Option<&FieldValue>,
    sub_key: &str,
) -> Vec<EntryChange> {
    let have_entries = entry_list(have_value);
    let mut changes = Vec::new();

    for want_entry in entry_list(Some(want_value)) {
        let Some(id) = want_entry.get(sub_key) else {
            continue;
        };
        match have_entries.iter().find(|e| e.get(sub_key) == Some(id)) {
            None => changes.push(EntryChange::Add {
                entry: strip_nulls(want_entry),
            }),
            Some(have_entry) => {
                let set: FieldMap = want_entry
                    .iter()
                    .filter(|(name, value)| {
                        !value.is_null() && have_entry.get(*name) != Some(*value)
                    })
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                if !set.is_empty() {
                    changes.push(EntryChange::Update {
                        key: id.clone(),
                        set,
                    });
                }
            }
        }
    }
    changes
}

/// Replaced entry semantics: observed entries the want does not list are
/// removed, then the merged rules apply.
fn replace_entries(
    want_value: &FieldValue,
    have_value: Option<&FieldValue>,
    sub_key: &str,
) -> Vec<EntryChange> {
    let want_entries = entry_list(Some(want_value));
    let mut changes = Vec::new();

    for have_entry in entry_list(have_value) {
        let Some(id) = have_entry.get(sub_key) else {
            continue;
        };
        if !want_entries.iter().any(|e| e.get(sub_key) == Some(id)) {
            changes.push(EntryChange::Remove {
                key: id.clone(),
                entry: have_entry.clone(),
            });
        }
    }
    changes.extend(merge_entries(want_value, have_value, sub_key));
    changes
}

/// Deleted entry semantics: each want entry selects observed entries to
/// remove, by sub-key when present, otherwise by field subset. A subset
/// selector matching more than one entry is ambiguous.
fn remove_entries(
    kind: &dyn ResourceKind,
    want_value: &FieldValue,
    have_value: Option<&FieldValue>,
    sub_key: &str,
) -> Result<Vec<EntryChange>> {
    let have_entries = entry_list(have_value);
    let mut changes = Vec::new();

    for want_entry in entry_list(Some(want_value)) {
        if let Some(id) = want_entry.get(sub_key) {
            if let Some(have_entry) = have_entries.iter().find(|e| e.get(sub_key) == Some(id)) {
                changes.push(EntryChange::Remove {
                    key: id.clone(),
                    entry: (*have_entry).clone(),
                });
            }
            continue;
        }

        let matched: Vec<&&FieldMap> = have_entries
            .iter()
            .filter(|e| selector_matches(want_entry, e))
            .collect();
        match matched.as_slice() {
            [] => {}
            [entry] => {
                let key = entry
                    .get(sub_key)
                    .cloned()
                    .unwrap_or(FieldValue::Null);
                changes.push(EntryChange::Remove {
                    key,
                    entry: (**entry).clone(),
                });
            }
            many => {
                return Err(ConvergeError::AmbiguousDelete {
                    kind: kind.name().to_string(),
                    key_field: sub_key.to_string(),
                    matches: many
                        .iter()
                        .map(|e| {
                            e.get(sub_key)
                                .map_or_else(|| "?".to_string(), FieldValue::to_key_string)
                        })
                        .collect(),
                });
            }
        }
    }
    Ok(changes)
}

fn strip_nulls(map: &FieldMap) -> FieldMap {
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
