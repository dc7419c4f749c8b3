//! Guard ("allower") layer.
//!
//! Every state-mutating operation has a paired `*_allowed` predicate that
//! returns `Ok(())` or `Err(DomainError::Denied(..))`. Handlers call the
//! predicate strictly with `?` before mutating. Presentation code that only
//! wants to know whether an action would be accepted uses [`Probe`], which
//! turns a denial into a caller-chosen sentinel and lets every other error
//! through.

use thiserror::Error;
use tracing::debug;

use crate::error::DomainError;

/// Structured reason an operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} not allowed - {reason}")]
pub struct Denial {
    /// The operation that was attempted.
    pub operation: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

impl Denial {
    /// Creates a denial for `operation`.
    #[must_use]
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            operation,
            reason: reason.into(),
        }
    }
}

/// Builds a `DomainError::Denied` for `operation`.
#[must_use]
pub fn deny(operation: &'static str, reason: impl Into<String>) -> DomainError {
    DomainError::Denied(Denial::new(operation, reason))
}

/// Passes when `condition` holds, denies `operation` otherwise.
///
/// # Errors
///
/// Returns `DomainError::Denied` when `condition` is false.
pub fn ensure(
    condition: bool,
    operation: &'static str,
    reason: impl Into<String>,
) -> Result<(), DomainError> {
    if condition {
        Ok(())
    } else {
        Err(deny(operation, reason))
    }
}

/// Probe-mode evaluation of a guard outcome.
pub trait Probe {
    /// Returns `approved` when the guard passed and `sentinel` when it
    /// denied.
    ///
    /// # Errors
    ///
    /// Propagates any error other than a denial.
    fn probe<T>(self, approved: T, sentinel: T) -> Result<T, DomainError>;

    /// Returns whether the guard passed.
    ///
    /// # Errors
    ///
    /// Propagates any error other than a denial.
    fn is_allowed(self) -> Result<bool, DomainError>
    where
        Self: Sized,
    {
        self.probe(true, false)
    }

    /// Returns the denial, if any.
    ///
    /// # Errors
    ///
    /// Propagates any error other than a denial.
    fn denial(self) -> Result<Option<Denial>, DomainError>;
}

impl Probe for Result<(), DomainError> {
    fn probe<T>(self, approved: T, sentinel: T) -> Result<T, DomainError> {
        match self {
            Ok(()) => Ok(approved),
            Err(DomainError::Denied(denial)) => {
                debug!(
                    operation = denial.operation,
                    reason = %denial.reason,
                    "guard denied in probe mode",
                );
                Ok(sentinel)
            }
            Err(other) => Err(other),
        }
    }

    fn denial(self) -> Result<Option<Denial>, DomainError> {
        match self {
            Ok(()) => Ok(None),
            Err(DomainError::Denied(denial)) => Ok(Some(denial)),
            Err(other) => Err(other),
        }
    }
}
