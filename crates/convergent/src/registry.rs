//! Type-erased dispatch from resource tokens to lifecycle behavior.
//!
//! The engine addresses resources by string token; resource kinds are
//! written against their own typed argument/state structs. [`DynResource`]
//! bridges the two: it is object-safe, works entirely in property maps,
//! and is blanket-implemented for every [`Resource`] by serde round-trips
//! at the boundary. The [`Registry`] is an explicit value built once at
//! process start and passed to whatever serves the engine; there is no
//! ambient global table.

use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::check::CheckResponse;
use crate::diff::DiffResponse;
use crate::error::Error;
use crate::property::PropertyMap;
use crate::resource::Resource;
use crate::schema::ResourceSchema;

/// Untyped mirror of [`crate::resource::ReadResponse`].
#[derive(Debug, Clone)]
pub struct DynReadResponse {
    /// Canonical resource id.
    pub id: String,
    /// Normalized inputs.
    pub inputs: PropertyMap,
    /// Corrected state.
    pub state: PropertyMap,
}

/// Object-safe resource lifecycle over untyped property maps.
pub trait DynResource: Send + Sync {
    /// The declared schema for this kind.
    fn schema(&self) -> &ResourceSchema;

    /// Normalize and validate raw inputs.
    fn check(&self, name: &str, old_inputs: &PropertyMap, new_inputs: PropertyMap)
    -> Result<CheckResponse>;

    /// Classify changes between recorded state and checked inputs.
    fn diff(&self, id: &str, old_state: &PropertyMap, new_inputs: &PropertyMap)
    -> Result<DiffResponse>;

    /// Create the resource from checked inputs.
    fn create(&self, name: &str, inputs: PropertyMap, preview: bool)
    -> Result<(String, PropertyMap)>;

    /// Apply an in-place change.
    fn update(
        &self,
        id: &str,
        old_state: PropertyMap,
        new_inputs: PropertyMap,
        preview: bool,
    ) -> Result<PropertyMap>;

    /// Tear the resource down.
    fn delete(&self, id: &str, state: PropertyMap) -> Result<()>;

    /// Reconcile recorded state with live external truth.
    fn read(&self, id: &str, inputs: PropertyMap, state: PropertyMap) -> Result<DynReadResponse>;
}

fn decode<T: DeserializeOwned>(
    token: &str,
    map: PropertyMap,
    as_state: bool,
) -> std::result::Result<T, Error> {
    serde_json::from_value(Value::Object(map)).map_err(|source| {
        if as_state {
            Error::invalid_state(token, source)
        } else {
            Error::invalid_inputs(token, source)
        }
    })
}

fn encode<T: Serialize>(token: &str, value: &T) -> Result<PropertyMap> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::NotAnObject {
            token: token.to_string(),
        }
        .into()),
        Err(source) => Err(Error::invalid_state(token, source).into()),
    }
}

impl<R: Resource> DynResource for R {
    fn schema(&self) -> &ResourceSchema {
        Resource::schema(self)
    }

    fn check(
        &self,
        name: &str,
        old_inputs: &PropertyMap,
        new_inputs: PropertyMap,
    ) -> Result<CheckResponse> {
        Resource::check(self, name, old_inputs, new_inputs)
    }

    fn diff(
        &self,
        id: &str,
        old_state: &PropertyMap,
        new_inputs: &PropertyMap,
    ) -> Result<DiffResponse> {
        Resource::diff(self, id, old_state, new_inputs)
    }

    fn create(
        &self,
        name: &str,
        inputs: PropertyMap,
        preview: bool,
    ) -> Result<(String, PropertyMap)> {
        let token = Resource::schema(self).token;
        let args: R::Args = decode(token, inputs, false)?;
        let (id, state) = Resource::create(self, name, args, preview)?;
        Ok((id, encode(token, &state)?))
    }

    fn update(
        &self,
        id: &str,
        old_state: PropertyMap,
        new_inputs: PropertyMap,
        preview: bool,
    ) -> Result<PropertyMap> {
        let token = Resource::schema(self).token;
        let olds: R::State = decode(token, old_state, true)?;
        let news: R::Args = decode(token, new_inputs, false)?;
        let state = Resource::update(self, id, olds, news, preview)?;
        encode(token, &state)
    }

    fn delete(&self, id: &str, state: PropertyMap) -> Result<()> {
        let token = Resource::schema(self).token;
        let state: R::State = decode(token, state, true)?;
        Resource::delete(self, id, state)
    }

    fn read(&self, id: &str, inputs: PropertyMap, state: PropertyMap) -> Result<DynReadResponse> {
        let token = Resource::schema(self).token;
        let inputs: R::Args = decode(token, inputs, false)?;
        let state: R::State = decode(token, state, true)?;
        let response = Resource::read(self, id, inputs, state)?;
        Ok(DynReadResponse {
            id: response.id,
            inputs: encode(token, &response.inputs)?,
            state: encode(token, &response.state)?,
        })
    }
}

/// The set of resource kinds a provider serves, keyed by token.
#[derive(Default)]
pub struct Registry {
    resources: HashMap<&'static str, Box<dyn DynResource>>,
}

impl Registry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource kind under its schema token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateResourceType`] when the token is taken.
    pub fn register<R>(&mut self, resource: R) -> std::result::Result<(), Error>
    where
        R: Resource + 'static,
    {
        let token = Resource::schema(&resource).token;
        if self.resources.contains_key(token) {
            return Err(Error::DuplicateResourceType(token.to_string()));
        }
        self.resources.insert(token, Box::new(resource));
        Ok(())
    }

    /// Look up the behavior registered for a token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResourceType`] for unrecognized tokens; the
    /// same routing error applies at every lifecycle stage.
    pub fn get(&self, token: &str) -> std::result::Result<&dyn DynResource, Error> {
        self.resources
            .get(token)
            .map(|resource| resource.as_ref())
            .ok_or_else(|| Error::UnknownResourceType(token.to_string()))
    }

    /// Registered tokens, sorted.
    #[must_use]
    pub fn tokens(&self) -> Vec<&'static str> {
        let mut tokens: Vec<_> = self.resources.keys().copied().collect();
        tokens.sort_unstable();
        tokens
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, FieldSchema};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::LazyLock;

    #[derive(Debug, Serialize, Deserialize)]
    struct EchoArgs {
        message: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct EchoState {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        shouted: Option<String>,
    }

    static ECHO_SCHEMA: LazyLock<ResourceSchema> = LazyLock::new(|| {
        ResourceSchema::new("test:index:Echo", "Echo a message")
            .input(FieldSchema::required("message", FieldKind::String))
            .output(FieldSchema::optional("shouted", FieldKind::String))
    });

    struct Echo;

    impl Resource for Echo {
        type Args = EchoArgs;
        type State = EchoState;

        fn schema(&self) -> &ResourceSchema {
            &ECHO_SCHEMA
        }

        fn create(&self, name: &str, args: EchoArgs, preview: bool) -> Result<(String, EchoState)> {
            let shouted = (!preview).then(|| args.message.to_uppercase());
            Ok((
                name.to_string(),
                EchoState {
                    message: args.message,
                    shouted,
                },
            ))
        }

        fn update(
            &self,
            _id: &str,
            _old_state: EchoState,
            new_args: EchoArgs,
            preview: bool,
        ) -> Result<EchoState> {
            let shouted = (!preview).then(|| new_args.message.to_uppercase());
            Ok(EchoState {
                message: new_args.message,
                shouted,
            })
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(Echo).unwrap();
        registry
    }

    fn map(value: serde_json::Value) -> PropertyMap {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_unknown_token_is_a_routing_error() {
        let registry = registry();
        let err = registry.get("test:index:Missing").err().unwrap();
        assert!(matches!(err, Error::UnknownResourceType(_)));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = registry();
        let err = registry.register(Echo).unwrap_err();
        assert!(matches!(err, Error::DuplicateResourceType(_)));
    }

    #[test]
    fn test_dispatch_create_round_trips_typed_state() {
        let registry = registry();
        let resource = registry.get("test:index:Echo").unwrap();
        let (id, state) = resource
            .create("mine", map(json!({"message": "hi"})), false)
            .unwrap();
        assert_eq!(id, "mine");
        assert_eq!(state["message"], json!("hi"));
        assert_eq!(state["shouted"], json!("HI"));
    }

    #[test]
    fn test_preview_create_leaves_computed_fields_unset() {
        let registry = registry();
        let resource = registry.get("test:index:Echo").unwrap();
        let (_, state) = resource
            .create("mine", map(json!({"message": "hi"})), true)
            .unwrap();
        assert!(!state.contains_key("shouted"));
    }

    #[test]
    fn test_invalid_inputs_name_the_token() {
        let registry = registry();
        let resource = registry.get("test:index:Echo").unwrap();
        let err = resource
            .create("mine", map(json!({"message": 42})), false)
            .unwrap_err();
        assert!(err.to_string().contains("test:index:Echo"));
    }

    #[test]
    fn test_default_check_flows_through_dispatch() {
        let registry = registry();
        let resource = registry.get("test:index:Echo").unwrap();
        let response = resource
            .check("mine", &PropertyMap::new(), PropertyMap::new())
            .unwrap();
        assert_eq!(response.failures.len(), 1);
        assert_eq!(response.failures[0].property, "message");
    }

    #[test]
    fn test_no_op_diff_after_check_roundtrip() {
        // Feeding recorded state back through check as new inputs yields
        // no changes.
        let registry = registry();
        let resource = registry.get("test:index:Echo").unwrap();
        let (_, state) = resource
            .create("mine", map(json!({"message": "hi"})), false)
            .unwrap();
        let checked = resource
            .check("mine", &state, map(json!({"message": "hi"})))
            .unwrap();
        let diff = resource.diff("mine", &state, &checked.inputs).unwrap();
        assert!(!diff.has_changes);
    }

    #[test]
    fn test_tokens_sorted() {
        let registry = registry();
        assert_eq!(registry.tokens(), vec!["test:index:Echo"]);
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }
}
