//! Withdrawal approval workflow.
//!
//! ```text
//! create ──▶ ┌ sports auto ─┐
//!            ├ casino auto ─┼──▶ merge (FIFO) ──▶ aggregator ──▶ payout ──▶ status
//!            └ manual ──────┘
//! ```
//!
//! Each branch retries under its own policy and always reports exactly one
//! result. Once the aggregator resolves, the remaining branches are aborted.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::activities::RecordActivities;
use super::aggregator::{Action, ApprovalAggregator, BranchResult, BranchStatus, Decision, Outcome};
use crate::providers::{AutoApprovalClient, ManualApprovalClient, Verdict};
use crate::runtime::{BranchSet, RetryPolicy, StepError, StepOptions, execute_step};
use crate::withdrawal::{Domain, WithdrawalState};

/// Provider literal that ends an automated branch without retry
pub const DISAPPROVED: &str = "DISAPPROVED";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Step {step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: StepError,
    },
}

impl WorkflowError {
    fn step(step: &'static str) -> impl FnOnce(StepError) -> Self {
        move |source| WorkflowError::Step { step, source }
    }

    /// Wire literal: the record service's own code when it refused the step
    pub fn code(&self) -> &str {
        match self {
            WorkflowError::Step {
                source: StepError::NonRetriable(literal),
                ..
            } if literal.starts_with("ERROR:") => literal.as_str(),
            WorkflowError::Step { .. } => "ERROR:WORKFLOW_FAILED",
        }
    }
}

/// How a workflow run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// Approved and paid out
    Completed,
    Rejected,
    /// No verdict could be reached
    Incomplete(String),
    /// Approved, but the record was not Completed after payout
    PayoutBlocked(WithdrawalState),
}

impl WorkflowOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            WorkflowOutcome::Completed => "COMPLETED",
            WorkflowOutcome::Rejected => "REJECTED",
            WorkflowOutcome::Incomplete(_) => "INCOMPLETE",
            WorkflowOutcome::PayoutBlocked(_) => "PAYOUT_BLOCKED",
        }
    }
}

/// Step options of every workflow step
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOptions {
    pub create: StepOptions,
    pub auto_approval: StepOptions,
    /// Budget of the whole suspended manual step
    pub manual: StepOptions,
    pub record: StepOptions,
    pub payout: StepOptions,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        let minute = Some(Duration::from_secs(60));
        Self {
            create: StepOptions::new(minute, RetryPolicy::default().with_maximum_attempts(5)),
            auto_approval: StepOptions::new(
                Some(Duration::from_secs(10 * 60)),
                RetryPolicy::default().with_non_retriable([DISAPPROVED]),
            ),
            manual: StepOptions::new(
                Some(Duration::from_secs(10 * 60)),
                RetryPolicy::default().with_maximum_attempts(1),
            ),
            record: StepOptions::new(minute, RetryPolicy::default()),
            payout: StepOptions::new(
                minute,
                RetryPolicy::default().with_non_retriable(["ERROR:INVALID_ID", "ERROR:INVALID_STATE"]),
            ),
        }
    }
}

pub struct WithdrawalWorkflow {
    activities: Arc<dyn RecordActivities>,
    sports: Arc<dyn AutoApprovalClient>,
    casino: Arc<dyn AutoApprovalClient>,
    manual: Arc<ManualApprovalClient>,
    options: WorkflowOptions,
}

impl WithdrawalWorkflow {
    pub fn new(
        activities: Arc<dyn RecordActivities>,
        sports: Arc<dyn AutoApprovalClient>,
        casino: Arc<dyn AutoApprovalClient>,
        manual: Arc<ManualApprovalClient>,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            activities,
            sports,
            casino,
            manual,
            options,
        }
    }

    /// Run one approval to its end
    pub async fn run(&self, id: &str) -> Result<WorkflowOutcome, WorkflowError> {
        self.create(id).await?;
        self.decide(id).await
    }

    /// First step: create the record
    pub async fn create(&self, id: &str) -> Result<(), WorkflowError> {
        info!(withdrawal_id = %id, "Workflow started");
        execute_step("create", &self.options.create, || self.activities.create(id))
            .await
            .map_err(WorkflowError::step("create"))
    }

    /// Everything after create: branches, verdict, payout
    pub async fn decide(&self, id: &str) -> Result<WorkflowOutcome, WorkflowError> {
        let mut branches = self.spawn_branches(id);
        let mut aggregator = ApprovalAggregator::new();

        let outcome = loop {
            let Some(result) = branches.next().await else {
                // Only reachable if branches died without reporting
                break Outcome::Incomplete("no branch reported".into());
            };
            debug!(withdrawal_id = %id, source = %result.source, status = ?result.status, "Branch result");

            match aggregator.apply(result) {
                Decision::Continue(actions) => self.run_actions(id, &actions).await?,
                Decision::Resolved { outcome, actions } => {
                    let abandoned = branches.abandon();
                    if abandoned > 0 {
                        debug!(withdrawal_id = %id, abandoned, "Outstanding branches abandoned");
                    }
                    self.run_actions(id, &actions).await?;
                    break outcome;
                }
                Decision::Discarded => {
                    debug!(withdrawal_id = %id, "Result discarded");
                }
            }
        };

        let finished = match outcome {
            Outcome::Approved => {
                let state = execute_step("status", &self.options.record, || self.activities.status(id))
                    .await
                    .map_err(WorkflowError::step("status"))?;
                if state == WithdrawalState::Completed {
                    WorkflowOutcome::Completed
                } else {
                    warn!(withdrawal_id = %id, state = %state, "Approved but payout did not complete");
                    WorkflowOutcome::PayoutBlocked(state)
                }
            }
            Outcome::Rejected => WorkflowOutcome::Rejected,
            Outcome::Incomplete(reason) => WorkflowOutcome::Incomplete(reason),
        };

        info!(withdrawal_id = %id, outcome = finished.as_str(), "Workflow finished");
        Ok(finished)
    }

    fn spawn_branches(&self, id: &str) -> BranchSet<BranchResult> {
        let mut branches = BranchSet::new();

        for client in [self.sports.clone(), self.casino.clone()] {
            let options = self.options.auto_approval.clone();
            let id = id.to_string();
            branches.spawn(async move {
                let domain = client.domain();
                let status = match execute_step("auto_approval", &options, || client.request_verdict(&id)).await {
                    Ok(verdict) => BranchStatus::from(verdict),
                    Err(e) => {
                        info!(withdrawal_id = %id, domain = %domain, error = %e, "Auto approval failed");
                        BranchStatus::Failed(failure_reason(&e))
                    }
                };
                BranchResult::new(domain, status)
            });
        }

        let manual = self.manual.clone();
        let options = self.options.manual.clone();
        let id = id.to_string();
        branches.spawn(async move {
            let status = match execute_step("manual_approval", &options, || manual.await_decision(&id)).await {
                Ok(literal) => match Verdict::from_literal(&literal) {
                    Some(verdict) => BranchStatus::from(verdict),
                    None => BranchStatus::Failed(literal),
                },
                Err(e) => {
                    info!(withdrawal_id = %id, error = %e, "Manual approval failed");
                    BranchStatus::Failed(failure_reason(&e))
                }
            };
            BranchResult::new(Domain::Manual, status)
        });

        branches
    }

    async fn run_actions(&self, id: &str, actions: &[Action]) -> Result<(), WorkflowError> {
        for action in actions {
            match *action {
                Action::RecordVerdict { domain, verdict } => {
                    execute_step("record_decision", &self.options.record, || {
                        self.activities.record_decision(id, domain, verdict)
                    })
                    .await
                    .map_err(WorkflowError::step("record_decision"))?;
                }
                Action::ConfirmAutoApproval => {
                    execute_step("confirm_auto_approval", &self.options.record, || {
                        self.activities.confirm_auto_approval(id)
                    })
                    .await
                    .map_err(WorkflowError::step("confirm_auto_approval"))?;
                }
                Action::Payout => {
                    execute_step("payout", &self.options.payout, || self.activities.payout(id))
                        .await
                        .map_err(WorkflowError::step("payout"))?;
                }
            }
        }
        Ok(())
    }
}

fn failure_reason(error: &StepError) -> String {
    match error {
        StepError::NonRetriable(literal) => literal.clone(),
        other => other.to_string(),
    }
}
