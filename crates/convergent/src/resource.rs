//! The typed resource lifecycle trait.
//!
//! A resource kind implements [`Resource`] with its own argument and state
//! types; the framework supplies schema-driven `check` and `diff` so most
//! kinds only write the apply stages. The lifecycle a kind participates in:
//!
//! ```text
//! Absent --Create--> Present --Update*--> Present --Delete--> Absent
//! ```
//!
//! A replacement never reaches the resource as such: the engine realizes a
//! replace-classified diff as `Delete(old)` followed by `Create(new)`, in
//! that order, so a kind only ever sees the three transitions above.

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::check::{CheckResponse, default_check};
use crate::diff::{DiffResponse, schema_diff};
use crate::property::PropertyMap;
use crate::schema::ResourceSchema;

/// The outcome of reconciling recorded state with external truth.
#[derive(Debug, Clone)]
pub struct ReadResponse<A, S> {
    /// Canonical resource id (may differ from the id read was called with).
    pub id: String,
    /// Normalized inputs.
    pub inputs: A,
    /// Corrected state.
    pub state: S,
}

/// One resource kind's lifecycle behavior.
///
/// Contracts every implementation honors:
///
/// - **Check** performs no destructive side effects. Read-only external
///   lookups are allowed and report failure through the response's failure
///   list, field-scoped, wherever feasible.
/// - **Create/Update with `preview == true`** perform no side effects and
///   return the state that *would* result, with fields that require the
///   action left unset.
/// - **Create** derives computed state from the actual outcome of the
///   action, never from the request alone, and returns an error (no state)
///   when the action fails.
/// - **Update** preserves state fields the action did not recompute.
/// - **Delete** treats an already-absent target as success.
/// - **Read** never mutates the external system and tolerates partially
///   recorded state.
pub trait Resource: Send + Sync {
    /// Typed desired-state input.
    type Args: Serialize + DeserializeOwned + Send;
    /// Typed recorded state, a superset of [`Self::Args`].
    type State: Serialize + DeserializeOwned + Send;

    /// The declared schema for this kind.
    fn schema(&self) -> &ResourceSchema;

    /// Normalize and validate raw inputs.
    ///
    /// The default applies the schema's pin-once carry-forward, pure
    /// defaults, and validation. Kinds with externally resolved defaults
    /// override this, resolve only when `old_inputs` is empty (first
    /// creation), and delegate to [`default_check`] for the rest.
    fn check(
        &self,
        name: &str,
        old_inputs: &PropertyMap,
        new_inputs: PropertyMap,
    ) -> Result<CheckResponse> {
        Ok(default_check(self.schema(), name, old_inputs, new_inputs))
    }

    /// Classify changes between recorded state and checked inputs.
    ///
    /// The default is the schema-driven field comparison. Kinds that probe
    /// for drift (on-disk content, registry versions) override this and
    /// layer their probes on top of [`schema_diff`].
    fn diff(&self, id: &str, old_state: &PropertyMap, new_inputs: &PropertyMap) -> Result<DiffResponse> {
        let _ = id;
        Ok(schema_diff(self.schema(), old_state, new_inputs))
    }

    /// Bring the resource into existence, returning its id and state.
    fn create(&self, name: &str, args: Self::Args, preview: bool) -> Result<(String, Self::State)>;

    /// Convergently apply an in-place change.
    fn update(
        &self,
        id: &str,
        old_state: Self::State,
        new_args: Self::Args,
        preview: bool,
    ) -> Result<Self::State>;

    /// Tear the resource down. Already-gone targets are success.
    fn delete(&self, id: &str, state: Self::State) -> Result<()> {
        let _ = (id, state);
        Ok(())
    }

    /// Reconcile recorded state with live external truth.
    ///
    /// The default echoes the recorded values for kinds with no external
    /// source of drift.
    fn read(
        &self,
        id: &str,
        inputs: Self::Args,
        state: Self::State,
    ) -> Result<ReadResponse<Self::Args, Self::State>> {
        Ok(ReadResponse {
            id: id.to_string(),
            inputs,
            state,
        })
    }
}
