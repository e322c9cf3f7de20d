//! Withdrawal Error Types

use thiserror::Error;

use super::state::WithdrawalState;
use crate::runtime::StepError;

/// Withdrawal record error types
///
/// `code()` gives the literal the record service writes on the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalError {
    // === Validation Errors ===
    #[error("Withdrawal id must not be empty")]
    InvalidArgument,

    #[error("Invalid form data: {0}")]
    InvalidFormData(String),

    // === State Conflicts ===
    #[error("Withdrawal not found: {0}")]
    NotFound(String),

    #[error("Withdrawal already exists: {0}")]
    AlreadyExists(String),

    #[error("Withdrawal {id} is not pending (state {state})")]
    InvalidState { id: String, state: WithdrawalState },

    // === System Errors ===
    #[error("Storage error: {0}")]
    Storage(String),
}

impl WithdrawalError {
    /// Get the wire literal for this error
    pub fn code(&self) -> &'static str {
        match self {
            WithdrawalError::InvalidArgument | WithdrawalError::NotFound(_) => "ERROR:INVALID_ID",
            WithdrawalError::InvalidFormData(_) => "ERROR:INVALID_FORM_DATA",
            WithdrawalError::AlreadyExists(_) => "ERROR:ID_ALREADY_EXISTS",
            WithdrawalError::InvalidState { .. } => "ERROR:INVALID_STATE",
            WithdrawalError::Storage(_) => "ERROR:STORAGE",
        }
    }

    /// Whether retrying the same request can succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, WithdrawalError::Storage(_))
    }
}

/// Record failures seen from a workflow step: only storage hiccups are retried
impl From<WithdrawalError> for StepError {
    fn from(err: WithdrawalError) -> Self {
        if err.is_retriable() {
            StepError::Transport(err.code().to_string())
        } else {
            StepError::NonRetriable(err.code().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(WithdrawalError::InvalidArgument.code(), "ERROR:INVALID_ID");
        assert_eq!(
            WithdrawalError::NotFound("W1".into()).code(),
            "ERROR:INVALID_ID"
        );
        assert_eq!(
            WithdrawalError::AlreadyExists("W1".into()).code(),
            "ERROR:ID_ALREADY_EXISTS"
        );
        assert_eq!(
            WithdrawalError::InvalidState {
                id: "W1".into(),
                state: WithdrawalState::Approved
            }
            .code(),
            "ERROR:INVALID_STATE"
        );
        assert_eq!(
            WithdrawalError::InvalidFormData("x".into()).code(),
            "ERROR:INVALID_FORM_DATA"
        );
    }

    #[test]
    fn test_retriable() {
        assert!(WithdrawalError::Storage("down".into()).is_retriable());
        assert!(!WithdrawalError::NotFound("W1".into()).is_retriable());
    }

    #[test]
    fn test_into_step_error() {
        assert_eq!(
            StepError::from(WithdrawalError::AlreadyExists("W1".into())),
            StepError::NonRetriable("ERROR:ID_ALREADY_EXISTS".into())
        );
        assert_eq!(
            StepError::from(WithdrawalError::Storage("busy".into())),
            StepError::Transport("ERROR:STORAGE".into())
        );
    }

    #[test]
    fn test_display() {
        let err = WithdrawalError::AlreadyExists("W9".into());
        assert_eq!(err.to_string(), "Withdrawal already exists: W9");
    }
}
