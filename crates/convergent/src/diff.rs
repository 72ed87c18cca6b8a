//! Change classification between recorded state and checked inputs.
//!
//! Diff never touches the outside world on its own: it compares the
//! previously recorded state against freshly checked inputs, field by
//! field, under each field's declared comparison sensitivity, and
//! classifies every difference as an in-place update or a replacement.
//! Replacement is always realized by the engine as delete-then-recreate;
//! the identity resources this framework manages (paths, clones, installed
//! binaries) cannot coexist with their successors.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::property::{PropertyMap, get_string_list, is_set, joined};
use crate::schema::{Replace, ResourceSchema, Sensitivity};

/// Name of the update-command list consulted by [`Replace::UnlessUpdatable`].
pub const UPDATE_COMMANDS: &str = "updateCommands";

/// How a changed field is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiffKind {
    /// The change is applied in place.
    Update,
    /// The change requires delete-then-recreate.
    UpdateReplace,
}

/// Classification of a single changed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDiff {
    /// How the change is applied.
    pub kind: DiffKind,
    /// Whether the change originates from the inputs (as opposed to
    /// detected drift in a computed field).
    pub input_diff: bool,
}

/// The aggregate diff verdict for one resource.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResponse {
    /// Whether any field changed.
    pub has_changes: bool,
    /// Replacements tear the old instance down before creating the new one.
    pub delete_before_replace: bool,
    /// Per-field classification of every change.
    pub detailed: BTreeMap<String, PropertyDiff>,
}

impl DiffResponse {
    /// An empty diff.
    #[must_use]
    pub fn new() -> Self {
        Self {
            has_changes: false,
            delete_before_replace: true,
            detailed: BTreeMap::new(),
        }
    }

    /// Record an input-driven change.
    pub fn record(&mut self, property: impl Into<String>, kind: DiffKind) {
        self.detailed.insert(
            property.into(),
            PropertyDiff {
                kind,
                input_diff: true,
            },
        );
        self.has_changes = true;
    }

    /// Record drift in a computed field.
    pub fn record_drift(&mut self, property: impl Into<String>, kind: DiffKind) {
        self.detailed.insert(
            property.into(),
            PropertyDiff {
                kind,
                input_diff: false,
            },
        );
        self.has_changes = true;
    }

    /// Whether any recorded change requires replacement.
    #[must_use]
    pub fn requires_replace(&self) -> bool {
        self.detailed
            .values()
            .any(|d| d.kind == DiffKind::UpdateReplace)
    }
}

impl Default for DiffResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a field's value differs between old state and new inputs under
/// the declared sensitivity. Absent on both sides is never a change.
fn field_changed(sensitivity: Sensitivity, olds: &PropertyMap, news: &PropertyMap, name: &str) -> bool {
    match sensitivity {
        Sensitivity::Structural => {
            match (is_set(olds, name), is_set(news, name)) {
                (false, false) => false,
                (true, true) => olds[name] != news[name],
                _ => true,
            }
        }
        Sensitivity::Joined(separator) => {
            joined(olds, name, separator) != joined(news, name, separator)
        }
        Sensitivity::Unordered => {
            let old_set: BTreeSet<String> =
                get_string_list(olds, name).unwrap_or_default().into_iter().collect();
            let new_set: BTreeSet<String> =
                get_string_list(news, name).unwrap_or_default().into_iter().collect();
            old_set != new_set
        }
    }
}

/// Classify every changed input field per the schema.
#[must_use]
pub fn schema_diff(schema: &ResourceSchema, olds: &PropertyMap, news: &PropertyMap) -> DiffResponse {
    let updatable = !joined(news, UPDATE_COMMANDS, " && ").is_empty();
    let mut response = DiffResponse::new();

    for field in &schema.inputs {
        if !field_changed(field.sensitivity, olds, news, field.name) {
            continue;
        }
        let kind = match field.replace {
            Replace::Never => DiffKind::Update,
            Replace::Always => DiffKind::UpdateReplace,
            Replace::UnlessUpdatable => {
                if updatable {
                    DiffKind::Update
                } else {
                    DiffKind::UpdateReplace
                }
            }
        };
        response.record(field.name, kind);
    }

    response
}
