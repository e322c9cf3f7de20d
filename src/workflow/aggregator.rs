//! Approval aggregator: the workflow's pure decision function.
//!
//! Folds branch results, one at a time, into an outcome and the actions the
//! workflow must run. No I/O and no clock, so every ordering of results can
//! be replayed in a unit test.

use std::collections::HashMap;
use std::fmt;

use crate::providers::Verdict;
use crate::withdrawal::Domain;

/// What one branch delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchStatus {
    Approved,
    Rejected,
    /// Non-retriable literal, exhausted retries or a timeout
    Failed(String),
}

impl From<Verdict> for BranchStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Approved => BranchStatus::Approved,
            Verdict::Rejected => BranchStatus::Rejected,
        }
    }
}

/// Result tagged with the branch that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchResult {
    pub source: Domain,
    pub status: BranchStatus,
}

impl BranchResult {
    pub fn new(source: Domain, status: BranchStatus) -> Self {
        Self { source, status }
    }
}

/// Side effect scheduled by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Record an automated verdict on the withdrawal
    RecordVerdict { domain: Domain, verdict: Verdict },
    /// Both automated domains approved: approve with override authority
    ConfirmAutoApproval,
    Payout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Rejected,
    /// Every branch reported without a verdict; carries the last failure
    Incomplete(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Approved => write!(f, "APPROVED"),
            Outcome::Rejected => write!(f, "REJECTED"),
            Outcome::Incomplete(reason) => write!(f, "INCOMPLETE ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Keep waiting; run these actions first
    Continue(Vec<Action>),
    /// Outcome reached; run these actions, then abandon the other branches
    Resolved { outcome: Outcome, actions: Vec<Action> },
    /// Late or duplicate result, no effect
    Discarded,
}

/// Decision state over the three domains, seeded all Pending
#[derive(Debug, Clone, Default)]
pub struct ApprovalAggregator {
    results: HashMap<Domain, BranchStatus>,
    outcome: Option<Outcome>,
}

impl ApprovalAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn status(&self, domain: Domain) -> Option<&BranchStatus> {
        self.results.get(&domain)
    }

    /// Every branch has reported
    pub fn exhausted(&self) -> bool {
        Domain::ALL.iter().all(|d| self.results.contains_key(d))
    }

    /// Fold one result.
    ///
    /// Rules, in order, after recording the result:
    /// 1. sports and casino approved: Approved, confirm the auto approval
    /// 2. manual decided: manual's verdict
    /// 3. all branches in: Rejected if the last was a rejection, else Incomplete
    pub fn apply(&mut self, result: BranchResult) -> Decision {
        if self.outcome.is_some() || self.results.contains_key(&result.source) {
            return Decision::Discarded;
        }

        let mut actions = Vec::new();
        if result.source.is_automated() {
            let verdict = match result.status {
                BranchStatus::Approved => Some(Verdict::Approved),
                BranchStatus::Rejected => Some(Verdict::Rejected),
                BranchStatus::Failed(_) => None,
            };
            if let Some(verdict) = verdict {
                actions.push(Action::RecordVerdict {
                    domain: result.source,
                    verdict,
                });
            }
        }
        let last = result.status.clone();
        self.results.insert(result.source, result.status);

        let outcome = if self.is(Domain::Sports, &BranchStatus::Approved)
            && self.is(Domain::Casino, &BranchStatus::Approved)
        {
            actions.push(Action::ConfirmAutoApproval);
            Some(Outcome::Approved)
        } else {
            match self.results.get(&Domain::Manual) {
                Some(BranchStatus::Approved) => Some(Outcome::Approved),
                Some(BranchStatus::Rejected) => Some(Outcome::Rejected),
                _ if self.exhausted() => Some(match last {
                    BranchStatus::Failed(reason) => Outcome::Incomplete(reason),
                    _ => Outcome::Rejected,
                }),
                _ => None,
            }
        };

        match outcome {
            Some(outcome) => {
                if outcome == Outcome::Approved {
                    actions.push(Action::Payout);
                }
                self.outcome = Some(outcome.clone());
                Decision::Resolved { outcome, actions }
            }
            None => Decision::Continue(actions),
        }
    }

    fn is(&self, domain: Domain, status: &BranchStatus) -> bool {
        self.results.get(&domain) == Some(status)
    }
}
