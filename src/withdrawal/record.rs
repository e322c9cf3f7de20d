//! Withdrawal record and its state machine.
//!
//! The record holds no locks and performs no I/O; the service applies these
//! transitions through the store's compare-and-swap.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::error::WithdrawalError;
use super::state::{Domain, DomainState, DomainStates, WithdrawalState};

/// Global state change produced by one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: WithdrawalState,
    pub to: WithdrawalState,
}

impl Transition {
    /// Pending record just received its verdict
    pub fn settled(&self) -> bool {
        self.from == WithdrawalState::Pending
            && matches!(self.to, WithdrawalState::Approved | WithdrawalState::Rejected)
    }

    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Withdrawal {
    id: String,
    state: WithdrawalState,
    domains: DomainStates,
    /// Bumped on every successful store write
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Withdrawal {
    /// Create a Pending withdrawal; the id must be non-empty
    pub fn new(id: impl Into<String>) -> Result<Self, WithdrawalError> {
        let id = id.into();
        if id.is_empty() {
            return Err(WithdrawalError::InvalidArgument);
        }
        Ok(Self {
            id,
            state: WithdrawalState::Pending,
            domains: DomainStates::default(),
            version: 0,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> WithdrawalState {
        self.state
    }

    pub fn domain_state(&self, domain: Domain) -> DomainState {
        self.domains.get(domain)
    }

    pub fn domain_states(&self) -> DomainStates {
        self.domains
    }

    /// Approve one domain and re-evaluate the override rule.
    ///
    /// No-op when the domain already holds a verdict or the record is terminal.
    pub fn approve(&mut self, domain: Domain) -> Transition {
        let from = self.state;
        if from.is_terminal() || self.domains.get(domain) != DomainState::Pending {
            return Transition { from, to: from };
        }
        self.domains.set(domain, DomainState::Approved);
        if self.domains.override_approves() {
            self.state = WithdrawalState::Approved;
        }
        Transition {
            from,
            to: self.state,
        }
    }

    /// Reject one domain.
    ///
    /// Manual rejection forces the global state to Rejected, overriding
    /// Approved. A Completed record has been paid out and ignores every
    /// rejection, manual included. Automated rejection is accepted only from a
    /// Pending domain on a non-terminal record and leaves the global state
    /// untouched.
    pub fn reject(&mut self, domain: Domain) -> Transition {
        let from = self.state;
        if from == WithdrawalState::Completed {
            return Transition { from, to: from };
        }
        match domain {
            Domain::Manual => {
                self.domains.set(Domain::Manual, DomainState::Rejected);
                self.state = WithdrawalState::Rejected;
            }
            _ => {
                if !from.is_terminal() && self.domains.get(domain) == DomainState::Pending {
                    self.domains.set(domain, DomainState::Rejected);
                }
            }
        }
        Transition {
            from,
            to: self.state,
        }
    }

    /// Approved -> Completed; any other state is left as is.
    pub fn payout(&mut self) -> Transition {
        let from = self.state;
        if self.state != WithdrawalState::Approved {
            warn!(withdrawal_id = %self.id, state = %self.state, "Payment blocked");
            return Transition { from, to: from };
        }
        info!(withdrawal_id = %self.id, "Payment triggered");
        self.state = WithdrawalState::Completed;
        Transition {
            from,
            to: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(id: &str) -> Withdrawal {
        Withdrawal::new(id).unwrap()
    }

    #[test]
    fn test_new_is_all_pending() {
        let w = pending("W1");
        assert_eq!(w.state(), WithdrawalState::Pending);
        for domain in Domain::ALL {
            assert_eq!(w.domain_state(domain), DomainState::Pending);
        }
        assert_eq!(w.version, 0);
    }

    #[test]
    fn test_empty_id_rejected() {
        assert_eq!(Withdrawal::new(""), Err(WithdrawalError::InvalidArgument));
    }

    #[test]
    fn test_auto_approvals_flip_global_without_manual() {
        let mut w = pending("W1");
        let t = w.approve(Domain::Sports);
        assert!(!t.changed());
        let t = w.approve(Domain::Casino);
        assert!(t.settled());
        assert_eq!(w.state(), WithdrawalState::Approved);
        assert_eq!(w.domain_state(Domain::Manual), DomainState::Pending);
    }

    #[test]
    fn test_manual_approval_alone_approves() {
        let mut w = pending("W1");
        w.reject(Domain::Sports);
        w.approve(Domain::Manual);
        assert_eq!(w.state(), WithdrawalState::Approved);
    }

    #[test]
    fn test_approve_settled_domain_is_noop() {
        let mut w = pending("W1");
        w.reject(Domain::Casino);
        let t = w.approve(Domain::Casino);
        assert!(!t.changed());
        assert_eq!(w.domain_state(Domain::Casino), DomainState::Rejected);
    }

    #[test]
    fn test_manual_reject_overrides_approved() {
        let mut w = pending("W1");
        w.approve(Domain::Sports);
        w.approve(Domain::Casino);
        assert_eq!(w.state(), WithdrawalState::Approved);

        let t = w.reject(Domain::Manual);
        assert_eq!(t.from, WithdrawalState::Approved);
        assert_eq!(t.to, WithdrawalState::Rejected);
        // Not a Pending -> verdict transition
        assert!(!t.settled());
        assert_eq!(w.domain_state(Domain::Manual), DomainState::Rejected);
    }

    #[test]
    fn test_manual_reject_after_manual_approve() {
        let mut w = pending("W1");
        w.approve(Domain::Manual);
        w.reject(Domain::Manual);
        assert_eq!(w.domain_state(Domain::Manual), DomainState::Rejected);
        assert_eq!(w.state(), WithdrawalState::Rejected);
    }

    #[test]
    fn test_auto_reject_leaves_global_pending() {
        let mut w = pending("W1");
        let t = w.reject(Domain::Sports);
        assert!(!t.changed());
        assert_eq!(w.state(), WithdrawalState::Pending);
        assert_eq!(w.domain_state(Domain::Sports), DomainState::Rejected);

        // Only from Pending
        w.approve(Domain::Casino);
        w.reject(Domain::Casino);
        assert_eq!(w.domain_state(Domain::Casino), DomainState::Approved);
    }

    #[test]
    fn test_completed_ignores_manual_reject() {
        let mut w = pending("W1");
        w.approve(Domain::Sports);
        w.approve(Domain::Casino);
        w.payout();

        let t = w.reject(Domain::Manual);
        assert_eq!(t.from, WithdrawalState::Completed);
        assert_eq!(t.to, WithdrawalState::Completed);
        assert_eq!(w.domain_state(Domain::Manual), DomainState::Pending);
    }

    #[test]
    fn test_payout_only_from_approved() {
        let mut w = pending("W1");
        assert!(!w.payout().changed());
        assert_eq!(w.state(), WithdrawalState::Pending);

        w.approve(Domain::Manual);
        let t = w.payout();
        assert_eq!(t.to, WithdrawalState::Completed);

        assert!(!w.payout().changed());
        assert_eq!(w.state(), WithdrawalState::Completed);

        // Completed is immutable, manual rejection included
        assert!(!w.reject(Domain::Manual).changed());
        assert!(!w.approve(Domain::Manual).changed());
        assert_eq!(w.state(), WithdrawalState::Completed);

        let mut rejected = pending("W2");
        rejected.reject(Domain::Manual);
        assert!(!rejected.payout().changed());
        assert_eq!(rejected.state(), WithdrawalState::Rejected);
    }
}
