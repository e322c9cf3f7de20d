//! Automated approval client over HTTP.
//!
//! `GET {base_url}/?id={id}` answers a literal verdict. `APPROVE`/`APPROVED`
//! and `REJECT`/`REJECTED` are verdicts, any other literal is a
//! non-retriable failure, and connection errors or 5xx answers are transport
//! failures left to the step's retry policy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use super::{AutoApprovalClient, Verdict};
use crate::runtime::StepError;
use crate::withdrawal::Domain;

pub struct HttpAutoApprovalClient {
    domain: Domain,
    base_url: String,
    client: Client,
}

impl HttpAutoApprovalClient {
    pub fn new(domain: Domain, base_url: impl Into<String>) -> Self {
        Self::with_client(domain, base_url, Client::new())
    }

    /// Fails if the HTTP client cannot be built with `timeout`
    pub fn with_timeout(
        domain: Domain,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(domain, base_url, client))
    }

    pub fn with_client(domain: Domain, base_url: impl Into<String>, client: Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            domain,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl AutoApprovalClient for HttpAutoApprovalClient {
    fn domain(&self) -> Domain {
        self.domain
    }

    async fn request_verdict(&self, id: &str) -> Result<Verdict, StepError> {
        if id.is_empty() {
            return Err(StepError::NonRetriable("ERROR:INVALID_ID".into()));
        }

        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[("id", id)])
            .send()
            .await
            .map_err(|e| StepError::Transport(format!("{} provider unreachable: {}", self.domain, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StepError::Transport(format!("{} provider body: {}", self.domain, e)))?;

        if status.is_server_error() {
            return Err(StepError::Transport(format!(
                "{} provider answered {}",
                self.domain, status
            )));
        }

        let literal = body.trim();
        debug!(withdrawal_id = %id, domain = %self.domain, literal, "Auto approval answered");
        match Verdict::from_literal(literal) {
            Some(verdict) => Ok(verdict),
            None => {
                info!(withdrawal_id = %id, domain = %self.domain, literal, "Auto approval declined");
                Err(StepError::NonRetriable(literal.to_string()))
            }
        }
    }
}
