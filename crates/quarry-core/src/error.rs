//! Domain error types.

use thiserror::Error;

use crate::guard::Denial;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A guard refused the operation. This is the only error expected as
    /// ordinary control flow.
    #[error(transparent)]
    Denied(#[from] Denial),

    /// A referenced entity does not exist.
    #[error("{kind} {id} not found")]
    EntityNotFound {
        /// Storage keyspace of the missing entity.
        kind: &'static str,
        /// Raw identifier that was looked up.
        id: i64,
    },

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on {kind} {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Storage keyspace of the entity.
        kind: &'static str,
        /// The entity that had the conflict.
        id: i64,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// A stored attribute blob (or one of its fields) could not be decoded.
    #[error("corrupt state: {0}")]
    CorruptState(String),

    /// A field that is neither stored, written nor declared with a default.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// Entity state broke one of its structural invariants.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A validation error in command input.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
