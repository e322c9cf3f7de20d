//! Withdrawal Approval Workflow
//!
//! Fans out to the sports, casino and manual decision branches, folds their
//! results through [`ApprovalAggregator`] and pays out exactly once on
//! approval.
//!
//! # Override Rule
//!
//! 1. Sports and Casino both approved: approved, manual input not required
//! 2. Otherwise a manual verdict, once in, is final
//! 3. All branches in without either: rejected, or incomplete after a failure

pub mod activities;
pub mod aggregator;
pub mod orchestrator;

pub use activities::RecordActivities;
pub use aggregator::{Action, ApprovalAggregator, BranchResult, BranchStatus, Decision, Outcome};
pub use orchestrator::{DISAPPROVED, WithdrawalWorkflow, WorkflowError, WorkflowOptions, WorkflowOutcome};
