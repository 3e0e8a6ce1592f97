//! Delta types produced by the diff engine.
//!
//! A [`StateDelta`] is the ordered list of per-resource differences between
//! `want` and `have` under one reconciliation mode. Deltas are consumed by
//! the synthesizers and can be projected onto a `have` state to predict the
//! post-apply configuration (used for check-mode reporting and idempotence
//! tests).

use serde::Serialize;

use crate::resource::{FieldMap, FieldValue, ResourceKind, ResourceState};

/// What has to happen to one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaKind {
    /// The resource is new and must be created.
    Create,
    /// The resource exists and some fields must change.
    Update,
    /// The resource must be deleted (or reset, for kinds whose resources
    /// cannot be removed).
    Delete,
}

/// An element-wise change inside a keyed entry list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "op")]
pub enum EntryChange {
    /// Remove the entry identified by the sub-key value.
    Remove {
        /// Sub-key value of the entry.
        key: FieldValue,
        /// The observed entry, for synthesizers that need its fields.
        entry: FieldMap,
    },
    /// Update the entry identified by the sub-key value.
    Update {
        /// Sub-key value of the entry.
        key: FieldValue,
        /// Fields to set on the matched entry.
        set: FieldMap,
    },
    /// Add a new entry.
    Add {
        /// The desired entry.
        entry: FieldMap,
    },
}

/// A single field-level difference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "change")]
pub enum FieldChange {
    /// The field must be cleared.
    Clear {
        /// Field name.
        field: String,
        /// The observed value being cleared.
        old: FieldValue,
    },
    /// The field must take a new value.
    Set {
        /// Field name.
        field: String,
        /// The observed value, if the field existed.
        old: Option<FieldValue>,
        /// The desired value.
        new: FieldValue,
    },
    /// A keyed entry list must change element-wise.
    Entries {
        /// Field name of the entry list.
        field: String,
        /// Sub-key identifying entries within the list.
        sub_key: String,
        /// Ordered changes: removes first, then updates, then adds.
        changes: Vec<EntryChange>,
    },
}

impl FieldChange {
    /// Returns the field name this change applies to.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Clear { field, .. } | Self::Set { field, .. } | Self::Entries { field, .. } => {
                field
            }
        }
    }
}

/// The full difference for one resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDelta {
    /// Resource key.
    pub key: String,
    /// What has to happen.
    pub kind: DeltaKind,
    /// Ordered field changes (empty for creates and deletes).
    pub changes: Vec<FieldChange>,
    /// Full desired fields (creates and updates).
    pub desired: Option<FieldMap>,
    /// Observed fields snapshot (updates and deletes).
    pub observed: Option<FieldMap>,
}

/// The complete diff result for one reconciliation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StateDelta {
    /// Per-resource deltas in application order: deletes first (where the
    /// mode demands it), then creates and updates.
    pub deltas: Vec<ResourceDelta>,
    /// Non-fatal findings produced while diffing.
    pub warnings: Vec<String>,
}

impl StateDelta {
    /// Returns true if nothing has to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Number of resources to create.
    #[must_use]
    pub fn creates(&self) -> usize {
        self.count(DeltaKind::Create)
    }

    /// Number of resources to update.
    #[must_use]
    pub fn updates(&self) -> usize {
        self.count(DeltaKind::Update)
    }

    /// Number of resources to delete.
    #[must_use]
    pub fn deletes(&self) -> usize {
        self.count(DeltaKind::Delete)
    }

    fn count(&self, kind: DeltaKind) -> usize {
        self.deltas.iter().filter(|d| d.kind == kind).count()
    }

    /// Projects the delta onto an observed state, producing the predicted
    /// post-apply state.
    ///
    /// For kinds whose resources cannot be removed (interface attributes
    /// are reset, not deleted), a delete projects to the bare identity
    /// resource instead of disappearing.
    #[must_use]
    pub fn project(&self, have: &ResourceState, kind: &dyn ResourceKind) -> ResourceState {
        let mut projected = have.clone();

        for delta in &self.deltas {
            match delta.kind {
                DeltaKind::Create => {
                    projected.insert(delta.key.clone(), delta.desired.clone().unwrap_or_default());
                }
                DeltaKind::Delete => {
                    if kind.delete_resets_attributes() {
                        if let Some(fields) = projected.get_mut(&delta.key) {
                            let key_field = kind.key_field();
                            fields.retain(|name, _| name == key_field);
                        }
                    } else {
                        projected.remove(&delta.key);
                    }
                }
                DeltaKind::Update => {
                    if let Some(fields) = projected.get_mut(&delta.key) {
                        for change in &delta.changes {
                            Self::project_change(fields, change);
                        }
                    }
                }
            }
        }

        projected
    }

    /// Applies a single field change to a projected field map.
    fn project_change(fields: &mut FieldMap, change: &FieldChange) {
        match change {
            FieldChange::Clear { field, .. } => {
                fields.remove(field);
            }
            FieldChange::Set { field, new, .. } => {
                fields.insert(field.clone(), new.clone());
            }
            FieldChange::Entries {
                field,
                sub_key,
                changes,
            } => {
                let mut entries: Vec<FieldMap> = fields
                    .get(field)
                    .and_then(FieldValue::as_list)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|item| item.as_map().cloned())
                            .collect()
                    })
                    .unwrap_or_default();

                for entry_change in changes {
                    match entry_change {
                        EntryChange::Remove { key, .. } => {
                            entries.retain(|e| e.get(sub_key) != Some(key));
                        }
                        EntryChange::Update { key, set } => {
                            if let Some(entry) =
                                entries.iter_mut().find(|e| e.get(sub_key) == Some(key))
                            {
                                entry.extend(set.iter().map(|(k, v)| (k.clone(), v.clone())));
                            }
                        }
                        EntryChange::Add { entry } => {
                            entries.push(entry.clone());
                        }
                    }
                }

                if entries.is_empty() {
                    fields.remove(field);
                } else {
                    fields.insert(
                        field.clone(),
                        FieldValue::List(entries.into_iter().map(FieldValue::Map).collect()),
                    );
                }
            }
        }
    }
}

impl std::fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ResourceDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.key)?;
        if !self.changes.is_empty() {
            write!(f, " (")?;
            for (i, change) in self.changes.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", change.field())?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
