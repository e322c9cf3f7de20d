//! Withdrawal State Definitions
//!
//! Global and per-domain states, the approval domains, and the actions the
//! record service accepts. String forms are the literals used on the wire.

use std::fmt;
use std::str::FromStr;

use super::error::WithdrawalError;

/// Global withdrawal state
///
/// Terminal states: COMPLETED, REJECTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WithdrawalState {
    /// Waiting for a verdict
    #[default]
    Pending,

    /// Approved by the override rule, payout not yet executed
    Approved,

    /// Terminal: rejected (manual rejection has final authority)
    Rejected,

    /// Terminal: payout executed
    Completed,
}

impl WithdrawalState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalState::Rejected | WithdrawalState::Completed)
    }

    /// Get the wire literal
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalState::Pending => "PENDING",
            WithdrawalState::Approved => "APPROVED",
            WithdrawalState::Rejected => "REJECTED",
            WithdrawalState::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for WithdrawalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WithdrawalState {
    type Err = WithdrawalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(WithdrawalState::Pending),
            "APPROVED" => Ok(WithdrawalState::Approved),
            "REJECTED" => Ok(WithdrawalState::Rejected),
            "COMPLETED" => Ok(WithdrawalState::Completed),
            other => Err(WithdrawalError::InvalidFormData(format!(
                "unknown withdrawal state: {}",
                other
            ))),
        }
    }
}

/// Per-domain verdict state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DomainState {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl DomainState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainState::Pending => "PENDING",
            DomainState::Approved => "APPROVED",
            DomainState::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for DomainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Approval track contributing to the overall decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Sports,
    Casino,
    Manual,
}

impl Domain {
    /// All domains, in declaration order
    pub const ALL: [Domain; 3] = [Domain::Sports, Domain::Casino, Domain::Manual];

    /// Lowercase name used in query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Sports => "sports",
            Domain::Casino => "casino",
            Domain::Manual => "manual",
        }
    }

    /// Whether an automated decision provider owns this domain
    #[inline]
    pub fn is_automated(&self) -> bool {
        !matches!(self, Domain::Manual)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Domain {
    type Err = WithdrawalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sports" => Ok(Domain::Sports),
            "casino" => Ok(Domain::Casino),
            "manual" => Ok(Domain::Manual),
            other => Err(WithdrawalError::InvalidFormData(format!(
                "unknown domain: {}",
                other
            ))),
        }
    }
}

/// Record service action (`/action?type=`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalAction {
    Approve,
    Reject,
    Payout,
}

impl WithdrawalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalAction::Approve => "approve",
            WithdrawalAction::Reject => "reject",
            WithdrawalAction::Payout => "payout",
        }
    }
}

impl fmt::Display for WithdrawalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WithdrawalAction {
    type Err = WithdrawalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(WithdrawalAction::Approve),
            "reject" => Ok(WithdrawalAction::Reject),
            "payout" => Ok(WithdrawalAction::Payout),
            other => Err(WithdrawalError::InvalidFormData(format!(
                "unknown action type: {}",
                other
            ))),
        }
    }
}

/// Domain verdict map, one slot per [`Domain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomainStates {
    pub sports: DomainState,
    pub casino: DomainState,
    pub manual: DomainState,
}

impl DomainStates {
    pub fn get(&self, domain: Domain) -> DomainState {
        match domain {
            Domain::Sports => self.sports,
            Domain::Casino => self.casino,
            Domain::Manual => self.manual,
        }
    }

    pub fn set(&mut self, domain: Domain, state: DomainState) {
        match domain {
            Domain::Sports => self.sports = state,
            Domain::Casino => self.casino = state,
            Domain::Manual => self.manual = state,
        }
    }

    /// Both automated domains approved
    #[inline]
    pub fn auto_approved(&self) -> bool {
        self.sports == DomainState::Approved && self.casino == DomainState::Approved
    }

    /// Override rule: joint automated approval unless manual rejected, or manual approval
    pub fn override_approves(&self) -> bool {
        (self.auto_approved() && self.manual != DomainState::Rejected)
            || self.manual == DomainState::Approved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(WithdrawalState::Rejected.is_terminal());
        assert!(WithdrawalState::Completed.is_terminal());

        assert!(!WithdrawalState::Pending.is_terminal());
        assert!(!WithdrawalState::Approved.is_terminal());
    }

    #[test]
    fn test_wire_literals() {
        assert_eq!(WithdrawalState::Pending.to_string(), "PENDING");
        assert_eq!(WithdrawalState::Completed.to_string(), "COMPLETED");
        assert_eq!(
            "REJECTED".parse::<WithdrawalState>().unwrap(),
            WithdrawalState::Rejected
        );
        assert!("rejected".parse::<WithdrawalState>().is_err());
    }

    #[test]
    fn test_parse_domain_and_action() {
        assert_eq!("Sports".parse::<Domain>().unwrap(), Domain::Sports);
        assert_eq!("MANUAL".parse::<Domain>().unwrap(), Domain::Manual);
        assert!("poker".parse::<Domain>().is_err());

        assert_eq!(
            "payout".parse::<WithdrawalAction>().unwrap(),
            WithdrawalAction::Payout
        );
        assert!("refund".parse::<WithdrawalAction>().is_err());
    }

    #[test]
    fn test_override_rule() {
        let mut states = DomainStates::default();
        assert!(!states.override_approves());

        states.set(Domain::Sports, DomainState::Approved);
        states.set(Domain::Casino, DomainState::Approved);
        assert!(states.override_approves());

        states.set(Domain::Manual, DomainState::Rejected);
        assert!(!states.override_approves());

        let mut manual_only = DomainStates::default();
        manual_only.set(Domain::Manual, DomainState::Approved);
        manual_only.set(Domain::Sports, DomainState::Rejected);
        assert!(manual_only.override_approves());
    }
}
