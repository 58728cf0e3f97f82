//! Errors reported to callers of the bill runtime.

use thiserror::Error;

use tally_bills::BillId;
use tally_core::DomainError;

use crate::journal::JournalError;

/// Outcome of a rejected or failed bill operation.
///
/// - `Validation`: the command was rejected and nothing changed.
/// - `NotFound`: no bill with that id exists in this process.
/// - `Unavailable`: the runtime could not process the command (actor gone,
///   journal failure). Safe to retry; never a verdict on the command itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    #[error("invalid_argument: {0}")]
    Validation(String),

    #[error("not_found: bill {0} not found")]
    NotFound(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl BillingError {
    pub fn not_found(id: BillId) -> Self {
        Self::NotFound(id.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Unavailable(_))
    }
}

impl From<DomainError> for BillingError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg)
            | DomainError::Conflict(msg) => BillingError::Validation(msg),
            DomainError::NotFound => BillingError::NotFound("unknown".to_string()),
        }
    }
}

impl From<JournalError> for BillingError {
    fn from(value: JournalError) -> Self {
        BillingError::Unavailable(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_rejections_become_validation_errors() {
        let err: BillingError = DomainError::conflict("bill is already closed").into();
        assert_eq!(err, BillingError::Validation("bill is already closed".to_string()));
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "invalid_argument: bill is already closed");
    }

    #[test]
    fn journal_failures_are_retryable() {
        let err: BillingError = JournalError::Unavailable("disk gone".to_string()).into();
        assert!(err.is_retryable());
        assert!(matches!(err, BillingError::Unavailable(_)));
    }
}
