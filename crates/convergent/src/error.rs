//! Error types for the resource lifecycle framework.
//!
//! Routing and decoding failures are structured so callers can tell an
//! unknown resource token apart from a malformed payload or a failed
//! external action. Action failures themselves travel as `anyhow::Error`
//! with resource context attached by the operation that observed them.

/// Errors raised by the framework itself, as opposed to failures of the
/// external actions a resource performs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A dispatch was attempted for a token no resource was registered under.
    #[error("unknown resource type {0:?}")]
    UnknownResourceType(String),

    /// Two resources were registered under the same token.
    #[error("resource type {0:?} registered twice")]
    DuplicateResourceType(String),

    /// The engine-supplied input properties did not decode into the
    /// resource's argument type.
    #[error("invalid inputs for {token}: {source}")]
    InvalidInputs {
        /// Resource type token.
        token: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The recorded state properties did not decode into the resource's
    /// state type.
    #[error("invalid state for {token}: {source}")]
    InvalidState {
        /// Resource type token.
        token: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A value produced by a resource did not serialize to a property map.
    #[error("{token} produced a non-object property value")]
    NotAnObject {
        /// Resource type token.
        token: String,
    },
}

impl Error {
    /// Create an input-decoding error with the resource token attached.
    pub fn invalid_inputs(token: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidInputs {
            token: token.into(),
            source,
        }
    }

    /// Create a state-decoding error with the resource token attached.
    pub fn invalid_state(token: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidState {
            token: token.into(),
            source,
        }
    }
}
