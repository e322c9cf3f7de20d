//! Decision provider clients
//!
//! - [`auto`]: synchronous automated approval over HTTP (sports, casino)
//! - [`manual`]: asynchronous manual approval, suspended until an operator decides
//! - [`record_client`]: HTTP client of the withdrawal record service

pub mod auto;
pub mod manual;
pub mod record_client;

use std::fmt;

use async_trait::async_trait;

use crate::runtime::StepError;
use crate::withdrawal::{Domain, WithdrawalAction};

pub use auto::HttpAutoApprovalClient;
pub use manual::{CallbackRegistrar, ManualApprovalClient, Registration};
pub use record_client::RecordServiceClient;

/// Verdict rendered by a decision provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected,
}

impl Verdict {
    /// Parse a provider literal. Both verb and participle forms are accepted.
    pub fn from_literal(literal: &str) -> Option<Self> {
        match literal {
            "APPROVE" | "APPROVED" => Some(Verdict::Approved),
            "REJECT" | "REJECTED" => Some(Verdict::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approved => "APPROVED",
            Verdict::Rejected => "REJECTED",
        }
    }

    /// Record service action that records this verdict
    pub fn action(&self) -> WithdrawalAction {
        match self {
            Verdict::Approved => WithdrawalAction::Approve,
            Verdict::Rejected => WithdrawalAction::Reject,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Automated decision provider for one domain.
///
/// One call per attempt. Transport failures are retriable; an unexpected
/// literal is [`StepError::NonRetriable`] carrying the literal.
#[async_trait]
pub trait AutoApprovalClient: Send + Sync {
    fn domain(&self) -> Domain;

    async fn request_verdict(&self, id: &str) -> Result<Verdict, StepError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_literals() {
        assert_eq!(Verdict::from_literal("APPROVE"), Some(Verdict::Approved));
        assert_eq!(Verdict::from_literal("APPROVED"), Some(Verdict::Approved));
        assert_eq!(Verdict::from_literal("REJECT"), Some(Verdict::Rejected));
        assert_eq!(Verdict::from_literal("REJECTED"), Some(Verdict::Rejected));
        assert_eq!(Verdict::from_literal("DISAPPROVED"), None);
        assert_eq!(Verdict::from_literal("approve"), None);
    }

    #[test]
    fn test_verdict_action() {
        assert_eq!(Verdict::Approved.action(), WithdrawalAction::Approve);
        assert_eq!(Verdict::Rejected.action(), WithdrawalAction::Reject);
    }
}
