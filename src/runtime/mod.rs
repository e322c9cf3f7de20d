//! In-process orchestration runtime
//!
//! The primitives the approval workflow is written against:
//!
//! - [`execute_step`]: run a step with a per-attempt budget and a retry policy
//! - [`BranchSet`]: spawn concurrent branches, receive results FIFO at one merge point
//! - [`CompletionHub`]: suspend a step under a [`ContinuationToken`] until resumed
//!
//! Branches are tokio tasks, so abandoning a [`BranchSet`] aborts them.

pub mod branch;
pub mod completion;
pub mod retry;

pub use branch::BranchSet;
pub use completion::{ActivityCompleter, CompletionHub, ContinuationToken, ResumeError, Suspension};
pub use retry::{RetryPolicy, StepError, StepOptions, execute_step};
