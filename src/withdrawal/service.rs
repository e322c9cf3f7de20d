//! Withdrawal record service.
//!
//! Applies state machine operations through the store's compare-and-swap and
//! resumes the suspended manual step when a record settles. Backs the HTTP
//! handlers and, in process, the workflow's record steps.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::error::WithdrawalError;
use super::record::{Transition, Withdrawal};
use super::state::{Domain, DomainState, WithdrawalAction, WithdrawalState};
use super::store::{InMemoryWithdrawalStore, WithdrawalStoreBox};
use crate::callback::CallbackRegistry;
use crate::providers::{CallbackRegistrar, Registration, Verdict};
use crate::runtime::{ActivityCompleter, ContinuationToken, StepError};
use crate::workflow::RecordActivities;

/// Give up on an id after this many lost compare-and-swap rounds
const MAX_CAS_ROUNDS: usize = 64;

pub struct WithdrawalService {
    store: WithdrawalStoreBox,
    callbacks: Arc<CallbackRegistry>,
}

impl WithdrawalService {
    pub fn new(store: WithdrawalStoreBox, callbacks: Arc<CallbackRegistry>) -> Self {
        Self { store, callbacks }
    }

    /// Service over a fresh in-memory store
    pub fn in_memory(completer: Arc<dyn ActivityCompleter>) -> Self {
        Self::new(
            Arc::new(InMemoryWithdrawalStore::new()),
            Arc::new(CallbackRegistry::new(completer)),
        )
    }

    pub fn callbacks(&self) -> &Arc<CallbackRegistry> {
        &self.callbacks
    }

    pub async fn create(&self, id: &str) -> Result<Withdrawal, WithdrawalError> {
        let withdrawal = Withdrawal::new(id)?;
        self.store.insert_new(withdrawal.clone()).await?;
        info!(withdrawal_id = %id, "Withdrawal created");
        Ok(withdrawal)
    }

    pub async fn get(&self, id: &str) -> Result<Withdrawal, WithdrawalError> {
        if id.is_empty() {
            return Err(WithdrawalError::InvalidArgument);
        }
        self.store
            .get(id)
            .await?
            .ok_or_else(|| WithdrawalError::NotFound(id.to_string()))
    }

    pub async fn state(&self, id: &str) -> Result<WithdrawalState, WithdrawalError> {
        Ok(self.get(id).await?.state())
    }

    pub async fn domain_state(&self, id: &str, domain: Domain) -> Result<DomainState, WithdrawalError> {
        Ok(self.get(id).await?.domain_state(domain))
    }

    /// All records, sorted by id
    pub async fn list(&self) -> Result<Vec<Withdrawal>, WithdrawalError> {
        self.store.all().await
    }

    pub async fn approve(&self, id: &str, domain: Domain) -> Result<Transition, WithdrawalError> {
        self.update(id, |w| w.approve(domain)).await
    }

    pub async fn reject(&self, id: &str, domain: Domain) -> Result<Transition, WithdrawalError> {
        self.update(id, |w| w.reject(domain)).await
    }

    pub async fn payout(&self, id: &str) -> Result<Transition, WithdrawalError> {
        self.update(id, |w| w.payout()).await
    }

    /// Approve both automated domains in one write
    pub async fn confirm_auto_approval(&self, id: &str) -> Result<Transition, WithdrawalError> {
        self.update(id, |w| {
            let from = w.state();
            w.approve(Domain::Sports);
            let to = w.approve(Domain::Casino).to;
            Transition { from, to }
        })
        .await
    }

    /// Dispatch an `/action` request. Approve and reject need a domain.
    pub async fn apply(
        &self,
        id: &str,
        action: WithdrawalAction,
        domain: Option<Domain>,
    ) -> Result<Transition, WithdrawalError> {
        let require_domain =
            || domain.ok_or_else(|| WithdrawalError::InvalidFormData("missing domain".into()));
        match action {
            WithdrawalAction::Approve => self.approve(id, require_domain()?).await,
            WithdrawalAction::Reject => self.reject(id, require_domain()?).await,
            WithdrawalAction::Payout => self.payout(id).await,
        }
    }

    /// Register the continuation token of a suspended manual step.
    ///
    /// Fails with `InvalidState` when the record is no longer Pending. A
    /// verdict that lands between the Pending check and the registration is
    /// picked up by the re-read below and delivered here.
    pub async fn register_callback(&self, id: &str, token: ContinuationToken) -> Result<(), WithdrawalError> {
        let current = self.get(id).await?;
        if current.state() != WithdrawalState::Pending {
            return Err(WithdrawalError::InvalidState {
                id: id.to_string(),
                state: current.state(),
            });
        }

        self.callbacks.register(id, token.clone());
        debug!(withdrawal_id = %id, "Callback registered");

        let reread = self.get(id).await?;
        if reread.state() != WithdrawalState::Pending {
            if let Some(token) = self.callbacks.take_if(id, &token) {
                info!(withdrawal_id = %id, state = %reread.state(), "Verdict raced registration, delivering");
                self.callbacks
                    .deliver(id, &token, reread.state().as_str())
                    .await;
            }
        }
        Ok(())
    }

    /// Read-modify-write of one record under compare-and-swap
    async fn update<F>(&self, id: &str, mutate: F) -> Result<Transition, WithdrawalError>
    where
        F: Fn(&mut Withdrawal) -> Transition,
    {
        for _ in 0..MAX_CAS_ROUNDS {
            let current = self.get(id).await?;
            let version = current.version;
            let mut next = current.clone();
            let transition = mutate(&mut next);

            if next == current {
                return Ok(transition);
            }
            if !self.store.update_if(version, next).await? {
                debug!(withdrawal_id = %id, version, "Concurrent update, retrying");
                continue;
            }

            if transition.changed() {
                info!(
                    withdrawal_id = %id,
                    from = %transition.from,
                    to = %transition.to,
                    "Withdrawal state changed"
                );
            }
            if transition.settled() {
                self.callbacks.resume(id, transition.to.as_str()).await;
            }
            return Ok(transition);
        }
        Err(WithdrawalError::Storage(format!("too much contention on {}", id)))
    }
}

#[async_trait]
impl RecordActivities for WithdrawalService {
    async fn create(&self, id: &str) -> Result<(), StepError> {
        WithdrawalService::create(self, id).await?;
        Ok(())
    }

    async fn record_decision(&self, id: &str, domain: Domain, verdict: Verdict) -> Result<(), StepError> {
        self.apply(id, verdict.action(), Some(domain)).await?;
        Ok(())
    }

    async fn confirm_auto_approval(&self, id: &str) -> Result<(), StepError> {
        WithdrawalService::confirm_auto_approval(self, id).await?;
        Ok(())
    }

    async fn payout(&self, id: &str) -> Result<(), StepError> {
        WithdrawalService::payout(self, id).await?;
        Ok(())
    }

    async fn status(&self, id: &str) -> Result<WithdrawalState, StepError> {
        Ok(self.state(id).await?)
    }
}

#[async_trait]
impl CallbackRegistrar for WithdrawalService {
    async fn register(&self, id: &str, token: &ContinuationToken) -> Result<Registration, StepError> {
        match self.register_callback(id, token.clone()).await {
            Ok(()) => Ok(Registration::Registered),
            Err(WithdrawalError::InvalidState { state, .. }) => Ok(Registration::AlreadySettled(state)),
            Err(e) => Err(e.into()),
        }
    }

    fn deregister(&self, id: &str, token: &ContinuationToken) {
        if self.callbacks.take_if(id, token).is_some() {
            debug!(withdrawal_id = %id, "Callback released without a decision");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::CompletionHub;

    fn service() -> (WithdrawalService, CompletionHub) {
        let hub = CompletionHub::new();
        (WithdrawalService::in_memory(Arc::new(hub.clone())), hub)
    }

    #[tokio::test]
    async fn test_create_and_duplicate() {
        let (svc, _) = service();
        svc.create("W1").await.unwrap();
        assert_eq!(svc.state("W1").await.unwrap(), WithdrawalState::Pending);
        assert_eq!(
            svc.create("W1").await.unwrap_err(),
            WithdrawalError::AlreadyExists("W1".into())
        );
        assert_eq!(svc.create("").await.unwrap_err(), WithdrawalError::InvalidArgument);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let (svc, _) = service();
        assert!(matches!(
            svc.approve("ghost", Domain::Sports).await,
            Err(WithdrawalError::NotFound(_))
        ));
        assert!(matches!(svc.state("ghost").await, Err(WithdrawalError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_apply_requires_domain() {
        let (svc, _) = service();
        svc.create("W1").await.unwrap();
        assert!(matches!(
            svc.apply("W1", WithdrawalAction::Approve, None).await,
            Err(WithdrawalError::InvalidFormData(_))
        ));
        // Payout ignores the domain
        let t = svc.apply("W1", WithdrawalAction::Payout, None).await.unwrap();
        assert!(!t.changed());
    }

    #[tokio::test]
    async fn test_version_bumps_only_on_change() {
        let (svc, _) = service();
        svc.create("W1").await.unwrap();
        svc.approve("W1", Domain::Sports).await.unwrap();
        svc.approve("W1", Domain::Sports).await.unwrap();
        assert_eq!(svc.get("W1").await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_register_on_settled_record() {
        let (svc, hub) = service();
        svc.create("W1").await.unwrap();
        svc.reject("W1", Domain::Manual).await.unwrap();

        let suspension = hub.suspend();
        let answer = CallbackRegistrar::register(&svc, "W1", suspension.token())
            .await
            .unwrap();
        assert_eq!(answer, Registration::AlreadySettled(WithdrawalState::Rejected));
        assert!(!svc.callbacks().contains("W1"));
    }

    #[tokio::test]
    async fn test_manual_decision_resumes_registered_step() {
        let (svc, hub) = service();
        svc.create("W1").await.unwrap();

        let suspension = hub.suspend();
        svc.register_callback("W1", suspension.token().clone())
            .await
            .unwrap();
        svc.approve("W1", Domain::Manual).await.unwrap();

        assert_eq!(suspension.wait().await.unwrap(), "APPROVED");
        assert!(!svc.callbacks().contains("W1"));
    }

    #[tokio::test]
    async fn test_deregister_keeps_newer_token() {
        let (svc, _) = service();
        svc.create("W1").await.unwrap();

        let stale = ContinuationToken::from("stale");
        let current = ContinuationToken::from("current");
        svc.register_callback("W1", current.clone()).await.unwrap();

        svc.deregister("W1", &stale);
        assert!(svc.callbacks().contains("W1"));
        svc.deregister("W1", &current);
        assert!(!svc.callbacks().contains("W1"));
    }

    #[tokio::test]
    async fn test_confirm_auto_approval() {
        let (svc, _) = service();
        svc.create("W1").await.unwrap();
        svc.approve("W1", Domain::Sports).await.unwrap();

        let t = svc.confirm_auto_approval("W1").await.unwrap();
        assert!(t.settled());
        assert_eq!(svc.state("W1").await.unwrap(), WithdrawalState::Approved);
        assert_eq!(
            svc.domain_state("W1", Domain::Manual).await.unwrap(),
            DomainState::Pending
        );
    }

    #[tokio::test]
    async fn test_concurrent_domain_decisions_are_serialized() {
        let (svc, _) = service();
        let svc = Arc::new(svc);
        svc.create("W1").await.unwrap();

        let mut handles = Vec::new();
        for domain in [Domain::Sports, Domain::Casino] {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move { svc.approve("W1", domain).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Neither write was lost: both domains count toward the override rule
        let w = svc.get("W1").await.unwrap();
        assert_eq!(w.state(), WithdrawalState::Approved);
        assert_eq!(w.version, 2);
    }
}
