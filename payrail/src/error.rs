//! Tagged error taxonomy shared by all payrail crates.
//!
//! Callers branch on the error kind, never on message text. Validation,
//! not-found, and conflict errors are caller-correctable and are raised
//! synchronously by domain operations; storage errors are opaque
//! infrastructure failures whose detail is logged rather than leaked.

use std::fmt;

use crate::intent::PaymentIntentStatus;

/// Base error type for payrail domain operations.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The request is invalid and can be corrected by the caller.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// The operation is illegal in the intent's current lifecycle state.
    #[error("{0}")]
    Conflict(#[from] ConflictError),

    /// An infrastructure failure; internal detail is not exposed to callers.
    #[error("{0}")]
    Storage(#[from] StorageError),
}

/// A caller-correctable validation failure.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Machine-readable reason for the rejection.
    pub reason: String,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// A referenced entity (intent, vendor, or product) does not exist.
#[derive(Debug, Clone)]
pub struct NotFoundError {
    /// The kind of entity that was looked up (e.g., `"vendor"`).
    pub entity: &'static str,
    /// The identifier that failed to resolve.
    pub id: String,
}

impl NotFoundError {
    /// Creates a new not-found error.
    #[must_use]
    pub fn new(entity: &'static str, id: impl Into<String>) -> Self {
        Self {
            entity,
            id: id.into(),
        }
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not found: {}", self.entity, self.id)
    }
}

impl std::error::Error for NotFoundError {}

/// An operation was attempted from an illegal lifecycle state.
#[derive(Debug, Clone)]
pub struct ConflictError {
    /// The intent the operation targeted.
    pub intent_id: String,
    /// The status observed at the time of the attempt.
    pub current: PaymentIntentStatus,
    /// The statuses from which the operation would have been legal.
    pub allowed: Vec<PaymentIntentStatus>,
}

impl ConflictError {
    /// Creates a new conflict error.
    #[must_use]
    pub fn new(
        intent_id: impl Into<String>,
        current: PaymentIntentStatus,
        allowed: &[PaymentIntentStatus],
    ) -> Self {
        Self {
            intent_id: intent_id.into(),
            current,
            allowed: allowed.to_vec(),
        }
    }
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let allowed: Vec<&str> = self.allowed.iter().map(PaymentIntentStatus::as_str).collect();
        write!(
            f,
            "payment intent {} is {}; operation requires status in [{}]",
            self.intent_id,
            self.current,
            allowed.join(", ")
        )
    }
}

impl std::error::Error for ConflictError {}

/// An opaque persistence failure.
#[derive(Debug, Clone)]
pub struct StorageError {
    /// Short description of the failing operation, safe to surface.
    pub context: String,
}

impl StorageError {
    /// Creates a new storage error.
    #[must_use]
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storage failure: {}", self.context)
    }
}

impl std::error::Error for StorageError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_branchable() {
        let err: PaymentError = ValidationError::new("unsupported chain pair").into();
        assert!(matches!(err, PaymentError::Validation(_)));

        let err: PaymentError = NotFoundError::new("vendor", "v_123").into();
        assert!(matches!(err, PaymentError::NotFound(_)));
        assert_eq!(err.to_string(), "vendor not found: v_123");
    }

    #[test]
    fn test_conflict_display_names_allowed_statuses() {
        let err = ConflictError::new(
            "pi_abc",
            PaymentIntentStatus::Submitted,
            &[PaymentIntentStatus::AwaitingUserTx],
        );
        let text = err.to_string();
        assert!(text.contains("pi_abc"));
        assert!(text.contains("submitted"));
        assert!(text.contains("awaiting_user_tx"));
    }
}
