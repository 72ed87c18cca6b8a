//! Untyped property values exchanged with the engine.
//!
//! Every lifecycle operation crosses the engine boundary as a bag of named
//! properties. The framework keeps that bag as a [`PropertyMap`] and only
//! converts to a resource's typed argument/state structs at the edges, so
//! the generic check and diff engines can reason about field *presence*:
//! a property that is absent and one that is `null` both count as "not set",
//! which is a different thing from "set to the zero value".

use std::collections::BTreeMap;

use serde_json::Value;

/// An untyped mapping from property name to value.
pub type PropertyMap = serde_json::Map<String, Value>;

/// Whether a property is present with a non-null value.
#[must_use]
pub fn is_set(map: &PropertyMap, key: &str) -> bool {
    matches!(map.get(key), Some(v) if !v.is_null())
}

/// Read a string property. Returns `None` when absent, null, or not a string.
#[must_use]
pub fn get_string<'a>(map: &'a PropertyMap, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

/// Read a boolean property.
#[must_use]
pub fn get_bool(map: &PropertyMap, key: &str) -> Option<bool> {
    map.get(key).and_then(Value::as_bool)
}

/// Read an ordered list-of-strings property. Non-string elements are
/// skipped rather than failing the whole read; kind validation is the
/// check stage's job.
#[must_use]
pub fn get_string_list(map: &PropertyMap, key: &str) -> Option<Vec<String>> {
    map.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

/// Read a string-to-string mapping property.
#[must_use]
pub fn get_string_map(map: &PropertyMap, key: &str) -> Option<BTreeMap<String, String>> {
    map.get(key).and_then(Value::as_object).map(|obj| {
        obj.iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect()
    })
}

/// Normalize a list property into a single joined string.
///
/// Ordered command lists are compared through this form so that
/// list-identity differences that do not change the joined content do not
/// register as changes. An absent property normalizes to the empty string.
#[must_use]
pub fn joined(map: &PropertyMap, key: &str, separator: &str) -> String {
    get_string_list(map, key).unwrap_or_default().join(separator)
}
