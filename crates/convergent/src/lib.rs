//! # Convergent
//!
//! A framework for declarative resource lifecycles.
//!
//! A resource kind declares a schema (argument fields, state fields,
//! replacement and defaulting rules) and implements the apply stages; the
//! framework supplies generic input checking, change classification, and
//! type-erased dispatch from resource tokens to behavior.
//!
//! ## Core Concepts
//!
//! - **PropertyMap**: the untyped property bag exchanged with the engine
//! - **ResourceSchema**: declared field rules driving check and diff
//! - **Resource**: the typed Check/Diff/Create/Update/Delete/Read trait
//! - **Registry**: explicit token-to-behavior dispatch, built at startup
//!
//! ## Lifecycle
//!
//! The engine drives every instance through
//! `Check -> Diff -> {Create | Update | Delete}`, persisting the returned
//! state between operations. A replacement-classified diff is realized by
//! the engine as delete-then-recreate; `Read` runs independently for
//! refresh and import.
//!
//! ## Example
//!
//! ```ignore
//! use convergent::{FieldKind, FieldSchema, Registry, Resource, ResourceSchema};
//!
//! struct Marker;
//!
//! impl Resource for Marker {
//!     type Args = MarkerArgs;   // serde structs mirroring the schema
//!     type State = MarkerState;
//!
//!     fn schema(&self) -> &ResourceSchema { &MARKER_SCHEMA }
//!
//!     fn create(&self, name: &str, args: MarkerArgs, preview: bool)
//!     -> anyhow::Result<(String, MarkerState)> {
//!         if !preview {
//!             std::fs::write(&args.path, "")?;
//!         }
//!         Ok((name.to_string(), MarkerState { path: args.path }))
//!     }
//!     // update/delete/read as needed
//! }
//!
//! let mut registry = Registry::new();
//! registry.register(Marker)?;
//! let (id, state) = registry.get("demo:index:Marker")?.create("m", inputs, false)?;
//! ```

pub mod check;
pub mod diff;
pub mod error;
pub mod property;
pub mod registry;
pub mod resource;
pub mod schema;

// Re-export main types at crate root
pub use check::{CheckFailure, CheckResponse, default_check};
pub use diff::{DiffKind, DiffResponse, PropertyDiff, schema_diff};
pub use error::Error;
pub use property::PropertyMap;
pub use registry::{DynReadResponse, DynResource, Registry};
pub use resource::{ReadResponse, Resource};
pub use schema::{DefaultRule, FieldKind, FieldSchema, Replace, ResourceSchema, Sensitivity};
