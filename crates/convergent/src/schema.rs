//! Per-kind resource schema descriptors.
//!
//! A [`ResourceSchema`] declares, for one resource kind, the argument
//! fields it accepts and the state fields it records: which arguments are
//! required, how each is compared during diff, whether a change can be
//! applied in place or forces delete-then-recreate, and how absent values
//! are defaulted. The generic check and diff engines are driven entirely
//! by these declarations; a resource kind only writes code for behavior
//! the schema cannot express (external lookups, drift probes, the apply
//! actions themselves).

use serde_json::Value;

/// The value shape a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A string.
    String,
    /// A boolean.
    Bool,
    /// An ordered list of strings.
    StringList,
    /// A string-to-string mapping.
    StringMap,
}

impl FieldKind {
    /// Whether a property value matches this kind.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            Self::StringMap => value
                .as_object()
                .is_some_and(|obj| obj.values().all(Value::is_string)),
        }
    }

    /// Human-readable description for validation failures.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Bool => "a boolean",
            Self::StringList => "a list of strings",
            Self::StringMap => "a map of strings",
        }
    }
}

/// How a change to a field is realized.
///
/// The classification is a declared property of the field, not of the data:
/// identity fields (paths, repos, install locations) replace, behavioral
/// fields update in place. [`Replace::UnlessUpdatable`] is the one declared
/// exception: the field updates in place exactly when the checked inputs
/// carry non-empty `updateCommands`, and replaces otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replace {
    /// Changes apply in place.
    Never,
    /// Changes force delete-then-recreate.
    Always,
    /// Changes apply in place only when update commands are configured.
    UnlessUpdatable,
}

/// How two values of a field are compared during diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    /// Structural equality of the property values.
    Structural,
    /// List compared through its joined form with the given separator.
    Joined(&'static str),
    /// List compared as an unordered set.
    Unordered,
}

/// How an absent argument is defaulted during check.
///
/// All rules here are pure and re-applied on every check. Defaults that
/// need an external lookup (e.g. "latest release") are not schema rules;
/// they belong in a resource's check hook and run only on first creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultRule {
    /// No default; the field stays absent.
    None,
    /// A literal value.
    Literal(Value),
    /// The value of another input field.
    OfField(&'static str),
    /// The resource's declared name.
    ResourceName,
    /// The user's home directory joined with a relative suffix.
    HomeJoin(&'static str),
}

/// Declaration of a single argument or state field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    /// Property name as it appears on the wire.
    pub name: &'static str,
    /// Accepted value shape.
    pub kind: FieldKind,
    /// Whether the field must be set after defaulting.
    pub required: bool,
    /// How a change to this field is realized.
    pub replace: Replace,
    /// How values of this field are compared.
    pub sensitivity: Sensitivity,
    /// How an absent value is defaulted.
    pub default: DefaultRule,
    /// Whether a value resolved by a check hook is pinned: once present in
    /// the old inputs it is carried forward instead of re-resolved.
    pub pin_once: bool,
    /// Field documentation.
    pub doc: &'static str,
}

impl FieldSchema {
    /// Declare a required field.
    #[must_use]
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            replace: Replace::Never,
            sensitivity: Sensitivity::Structural,
            default: DefaultRule::None,
            pin_once: false,
            doc: "",
        }
    }

    /// Declare an optional field.
    #[must_use]
    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    /// A change to this field forces delete-then-recreate.
    #[must_use]
    pub fn replaces(mut self) -> Self {
        self.replace = Replace::Always;
        self
    }

    /// A change to this field replaces unless update commands are set.
    #[must_use]
    pub fn replaces_unless_updatable(mut self) -> Self {
        self.replace = Replace::UnlessUpdatable;
        self
    }

    /// Compare this field through its joined form.
    #[must_use]
    pub fn joined(mut self, separator: &'static str) -> Self {
        self.sensitivity = Sensitivity::Joined(separator);
        self
    }

    /// Compare this field as an unordered set.
    #[must_use]
    pub fn unordered(mut self) -> Self {
        self.sensitivity = Sensitivity::Unordered;
        self
    }

    /// Default this field to a literal value.
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = DefaultRule::Literal(value);
        self
    }

    /// Default this field to the value of another input field.
    #[must_use]
    pub fn default_of(mut self, field: &'static str) -> Self {
        self.default = DefaultRule::OfField(field);
        self
    }

    /// Default this field to the resource name.
    #[must_use]
    pub fn default_name(mut self) -> Self {
        self.default = DefaultRule::ResourceName;
        self
    }

    /// Default this field to `$HOME/<suffix>`.
    #[must_use]
    pub fn default_home(mut self, suffix: &'static str) -> Self {
        self.default = DefaultRule::HomeJoin(suffix);
        self
    }

    /// Carry a previously resolved value forward instead of re-resolving.
    #[must_use]
    pub fn pinned(mut self) -> Self {
        self.pin_once = true;
        self
    }

    /// Attach field documentation.
    #[must_use]
    pub fn doc(mut self, doc: &'static str) -> Self {
        self.doc = doc;
        self
    }
}

/// Schema for one resource kind.
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    /// Resource type token, e.g. `workbench:local:File`.
    pub token: &'static str,
    /// Resource documentation.
    pub description: &'static str,
    /// Argument fields.
    pub inputs: Vec<FieldSchema>,
    /// Provider-computed state fields (arguments are always embedded in
    /// state and are not repeated here).
    pub outputs: Vec<FieldSchema>,
}

impl ResourceSchema {
    /// Start a schema for the given token.
    #[must_use]
    pub fn new(token: &'static str, description: &'static str) -> Self {
        Self {
            token,
            description,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Add an argument field.
    #[must_use]
    pub fn input(mut self, field: FieldSchema) -> Self {
        self.inputs.push(field);
        self
    }

    /// Add a computed state field.
    #[must_use]
    pub fn output(mut self, field: FieldSchema) -> Self {
        self.outputs.push(field);
        self
    }

    /// Look up an argument field by name.
    #[must_use]
    pub fn input_field(&self, name: &str) -> Option<&FieldSchema> {
        self.inputs.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_kind_matches() {
        assert!(FieldKind::String.matches(&json!("x")));
        assert!(!FieldKind::String.matches(&json!(1)));
        assert!(FieldKind::Bool.matches(&json!(true)));
        assert!(FieldKind::StringList.matches(&json!(["a", "b"])));
        assert!(!FieldKind::StringList.matches(&json!(["a", 1])));
        assert!(FieldKind::StringMap.matches(&json!({"k": "v"})));
        assert!(!FieldKind::StringMap.matches(&json!({"k": 1})));
    }

    #[test]
    fn test_builder_flags() {
        let field = FieldSchema::optional("releaseVersion", FieldKind::String)
            .replaces_unless_updatable()
            .pinned()
            .doc("The release version to install.");
        assert!(!field.required);
        assert!(field.pin_once);
        assert_eq!(field.replace, Replace::UnlessUpdatable);
    }

    #[test]
    fn test_schema_lookup() {
        let schema = ResourceSchema::new("t:m:R", "test")
            .input(FieldSchema::required("org", FieldKind::String).replaces())
            .output(FieldSchema::optional("version", FieldKind::String));
        assert!(schema.input_field("org").is_some());
        assert!(schema.input_field("version").is_none());
    }
}
