//! Record service operations the workflow invokes as steps.

use async_trait::async_trait;

use crate::providers::Verdict;
use crate::runtime::StepError;
use crate::withdrawal::{Domain, WithdrawalState};

#[async_trait]
pub trait RecordActivities: Send + Sync {
    async fn create(&self, id: &str) -> Result<(), StepError>;

    /// Record one automated domain's verdict
    async fn record_decision(&self, id: &str, domain: Domain, verdict: Verdict) -> Result<(), StepError>;

    /// Approve both automated domains with override authority
    async fn confirm_auto_approval(&self, id: &str) -> Result<(), StepError>;

    async fn payout(&self, id: &str) -> Result<(), StepError>;

    async fn status(&self, id: &str) -> Result<WithdrawalState, StepError>;
}
