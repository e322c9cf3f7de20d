//! Asynchronous completion: suspend a step under a token, resume it later.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use super::retry::StepError;

/// Opaque handle correlating a suspended step with its external resume.
///
/// Only equality is meaningful; the contents are never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ContinuationToken {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for ContinuationToken {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResumeError {
    /// No step is suspended under this token (never issued, timed out, or already resumed)
    #[error("Unknown continuation token: {0}")]
    UnknownToken(String),

    /// The step was torn down while the value was in flight
    #[error("Suspended step abandoned: {0}")]
    Abandoned(String),
}

/// Capability to complete a suspended step from outside the workflow
#[async_trait]
pub trait ActivityCompleter: Send + Sync {
    async fn complete(&self, token: &ContinuationToken, value: &str) -> Result<(), ResumeError>;
}

/// In-process registry of suspended steps
#[derive(Clone, Default)]
pub struct CompletionHub {
    pending: Arc<DashMap<ContinuationToken, oneshot::Sender<String>>>,
}

impl CompletionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a token and park a receiver under it
    pub fn suspend(&self) -> Suspension {
        let token = ContinuationToken::mint();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(token.clone(), tx);
        debug!(token = %token, "Step suspended");
        Suspension {
            token,
            rx,
            hub: self.clone(),
        }
    }

    /// Deliver `value` to the step suspended under `token`; consumes the token
    pub fn resume(&self, token: &ContinuationToken, value: impl Into<String>) -> Result<(), ResumeError> {
        let Some((_, tx)) = self.pending.remove(token) else {
            return Err(ResumeError::UnknownToken(token.to_string()));
        };
        tx.send(value.into())
            .map_err(|_| ResumeError::Abandoned(token.to_string()))
    }

    /// Number of steps currently suspended
    pub fn suspended(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl ActivityCompleter for CompletionHub {
    async fn complete(&self, token: &ContinuationToken, value: &str) -> Result<(), ResumeError> {
        self.resume(token, value)
    }
}

/// A parked step. Dropping it deregisters the token.
pub struct Suspension {
    token: ContinuationToken,
    rx: oneshot::Receiver<String>,
    hub: CompletionHub,
}

impl Suspension {
    pub fn token(&self) -> &ContinuationToken {
        &self.token
    }

    /// Wait for the externally delivered value
    pub async fn wait(mut self) -> Result<String, StepError> {
        (&mut self.rx)
            .await
            .map_err(|_| StepError::NonRetriable(format!("suspension {} dropped", self.token)))
    }
}

impl Drop for Suspension {
    fn drop(&mut self) {
        if self.hub.pending.remove(&self.token).is_some() {
            debug!(token = %self.token, "Suspension abandoned");
        }
    }
}
