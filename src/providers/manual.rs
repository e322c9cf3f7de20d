//! Manual approval client.
//!
//! Registers a fresh continuation token for the withdrawal, then suspends
//! until an operator decision resumes it. The client enforces no timeout of
//! its own; the workflow wraps the whole call in a step budget. A wait that
//! ends without a decision (budget exceeded, branch aborted) releases its
//! registered token.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::runtime::{CompletionHub, ContinuationToken, StepError, StepOptions, execute_step};
use crate::withdrawal::WithdrawalState;

/// Outcome of registering a continuation token for a withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    /// The record already left Pending; nothing will resume the token
    AlreadySettled(WithdrawalState),
}

/// Coordination endpoint that accepts continuation tokens
#[async_trait]
pub trait CallbackRegistrar: Send + Sync {
    async fn register(&self, id: &str, token: &ContinuationToken) -> Result<Registration, StepError>;

    /// Drop `token` for `id` if it is still the registered one
    fn deregister(&self, id: &str, token: &ContinuationToken);
}

/// Releases a registered token when the waiting step goes away
struct RegisteredToken<'a> {
    registrar: &'a dyn CallbackRegistrar,
    id: &'a str,
    token: ContinuationToken,
}

impl Drop for RegisteredToken<'_> {
    fn drop(&mut self) {
        self.registrar.deregister(self.id, &self.token);
    }
}

pub struct ManualApprovalClient {
    registrar: Arc<dyn CallbackRegistrar>,
    hub: CompletionHub,
    registration: StepOptions,
}

impl ManualApprovalClient {
    /// `registration` is the retry policy of the registration call only
    pub fn new(registrar: Arc<dyn CallbackRegistrar>, hub: CompletionHub, registration: StepOptions) -> Self {
        Self {
            registrar,
            hub,
            registration,
        }
    }

    /// Register, suspend, and return the literal status delivered on resume
    pub async fn await_decision(&self, id: &str) -> Result<String, StepError> {
        let suspension = self.hub.suspend();
        let token = suspension.token().clone();

        let registration = execute_step("register_callback", &self.registration, || {
            self.registrar.register(id, &token)
        })
        .await?;

        match registration {
            Registration::Registered => {
                let _registered = RegisteredToken {
                    registrar: self.registrar.as_ref(),
                    id,
                    token,
                };
                info!(withdrawal_id = %id, "Waiting for manual decision");
                suspension.wait().await
            }
            Registration::AlreadySettled(state) => {
                info!(withdrawal_id = %id, state = %state, "Manual decision already made");
                Ok(state.as_str().to_string())
            }
        }
    }
}
