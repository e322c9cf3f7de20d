//! Callback Correlation Store
//!
//! Holds the continuation token of the suspended manual-approval step per
//! withdrawal id and turns a manual decision into a resume of that step.
//!
//! # Concurrency
//!
//! Tokens live in a `DashMap`, so `register`, `take` and `resume` are
//! linearized per id. A resume and a registration racing on the same id are
//! resolved by [`crate::withdrawal::WithdrawalService::register_callback`],
//! which re-reads the record after registering and delivers a verdict that
//! landed in between. Whichever side takes the token delivers.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::runtime::{ActivityCompleter, ContinuationToken};

pub struct CallbackRegistry {
    slots: DashMap<String, ContinuationToken>,
    completer: Arc<dyn ActivityCompleter>,
}

impl CallbackRegistry {
    pub fn new(completer: Arc<dyn ActivityCompleter>) -> Self {
        Self {
            slots: DashMap::new(),
            completer,
        }
    }

    /// Store the token for `id`, replacing any previous one
    pub fn register(&self, id: &str, token: ContinuationToken) -> Option<ContinuationToken> {
        let previous = self.slots.insert(id.to_string(), token);
        if previous.is_some() {
            warn!(withdrawal_id = %id, "Callback token overwritten");
        }
        previous
    }

    /// Remove and return the token for `id`
    pub fn take(&self, id: &str) -> Option<ContinuationToken> {
        self.slots.remove(id).map(|(_, token)| token)
    }

    /// Remove the token for `id` only if it is still `token`
    pub fn take_if(&self, id: &str, token: &ContinuationToken) -> Option<ContinuationToken> {
        self.slots
            .remove_if(id, |_, current| current == token)
            .map(|(_, token)| token)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Resume the suspended step of `id` with `status`.
    ///
    /// No registered token is a no-op. Returns whether a token was consumed.
    pub async fn resume(&self, id: &str, status: &str) -> bool {
        let Some(token) = self.take(id) else {
            info!(withdrawal_id = %id, status, "No callback registered, nothing to resume");
            return false;
        };
        self.deliver(id, &token, status).await;
        true
    }

    /// Hand `status` to the runtime. Failures are logged, never retried.
    pub async fn deliver(&self, id: &str, token: &ContinuationToken, status: &str) {
        match self.completer.complete(token, status).await {
            Ok(()) => info!(withdrawal_id = %id, status, "Suspended approval resumed"),
            Err(e) => warn!(withdrawal_id = %id, status, error = %e, "Failed to resume suspended approval"),
        }
    }
}
