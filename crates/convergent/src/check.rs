//! Generic input normalization and validation.
//!
//! Check takes the raw property maps the engine hands over (the previously
//! recorded inputs and the freshly supplied ones), fills defaults, and
//! validates the result against the resource schema. Validation problems
//! are collected as field-scoped [`CheckFailure`]s rather than aborting at
//! the first, so the caller sees every problem in one round trip.

use serde::{Deserialize, Serialize};

use crate::property::{PropertyMap, is_set};
use crate::schema::{DefaultRule, ResourceSchema};

/// A field-scoped validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFailure {
    /// The property the failure is scoped to.
    pub property: String,
    /// Why the value was rejected.
    pub reason: String,
}

impl CheckFailure {
    /// Create a failure for the given property.
    pub fn new(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            reason: reason.into(),
        }
    }
}

/// The outcome of checking one resource's inputs.
#[derive(Debug, Clone, Default)]
pub struct CheckResponse {
    /// Normalized, fully defaulted inputs.
    pub inputs: PropertyMap,
    /// Every validation failure found. Empty means the inputs are usable.
    pub failures: Vec<CheckFailure>,
}

impl CheckResponse {
    /// Whether the inputs passed validation.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Normalize and validate inputs against a schema.
///
/// The pipeline:
/// 1. On updates (non-empty old inputs), carry every `pin_once` field
///    forward from the old inputs when absent from the new ones. A value a
///    check hook resolved externally at creation is never silently
///    re-resolved on later plans.
/// 2. Apply the schema's pure default rules for fields still absent.
/// 3. Validate presence of required fields and the value kind of present
///    ones, collecting all failures.
pub fn default_check(
    schema: &ResourceSchema,
    name: &str,
    old_inputs: &PropertyMap,
    new_inputs: PropertyMap,
) -> CheckResponse {
    let mut inputs = new_inputs;
    let mut failures = Vec::new();

    if !old_inputs.is_empty() {
        for field in schema.inputs.iter().filter(|f| f.pin_once) {
            if !is_set(&inputs, field.name) && is_set(old_inputs, field.name) {
                inputs.insert(
                    field.name.to_string(),
                    old_inputs[field.name].clone(),
                );
            }
        }
    }

    for field in &schema.inputs {
        if is_set(&inputs, field.name) {
            continue;
        }
        match &field.default {
            DefaultRule::None => {}
            DefaultRule::Literal(value) => {
                inputs.insert(field.name.to_string(), value.clone());
            }
            DefaultRule::OfField(other) => {
                let value = inputs.get(*other).filter(|v| !v.is_null()).cloned();
                if let Some(value) = value {
                    inputs.insert(field.name.to_string(), value);
                }
            }
            DefaultRule::ResourceName => {
                inputs.insert(field.name.to_string(), name.into());
            }
            DefaultRule::HomeJoin(suffix) => match dirs::home_dir() {
                Some(home) => {
                    let path = home.join(suffix);
                    inputs.insert(
                        field.name.to_string(),
                        path.to_string_lossy().into_owned().into(),
                    );
                }
                None => {
                    failures.push(CheckFailure::new(
                        field.name,
                        "could not determine the home directory for the default value",
                    ));
                }
            },
        }
    }

    for field in &schema.inputs {
        match inputs.get(field.name) {
            Some(value) if !value.is_null() => {
                if !field.kind.matches(value) {
                    failures.push(CheckFailure::new(
                        field.name,
                        format!("expected {}", field.kind.describe()),
                    ));
                }
            }
            _ if field.required => {
                failures.push(CheckFailure::new(field.name, "missing required property"));
            }
            _ => {}
        }
    }

    CheckResponse { inputs, failures }
}
