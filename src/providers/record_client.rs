//! HTTP client of the withdrawal record service, used by operator tooling.

use reqwest::Client;

use crate::runtime::StepError;
use crate::withdrawal::{Domain, WithdrawalAction, WithdrawalState};

const SUCCEED: &str = "SUCCEED";

pub struct RecordServiceClient {
    base_url: String,
    client: Client,
}

impl RecordServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    async fn get(&self, route: &str, query: &[(&str, &str)]) -> Result<String, StepError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, route))
            .query(query)
            .send()
            .await
            .map_err(|e| StepError::Transport(e.to_string()))?;
        if response.status().is_server_error() {
            return Err(StepError::Transport(format!(
                "{} answered {}",
                route,
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| StepError::Transport(e.to_string()))?;
        Ok(body.trim().to_string())
    }

    /// Start an approval workflow; returns the workflow's withdrawal id
    pub async fn start(&self, id: Option<&str>) -> Result<String, StepError> {
        let query: Vec<(&str, &str)> = id.map(|id| vec![("id", id)]).unwrap_or_default();
        let body = self.get("/start", &query).await?;
        match body.strip_prefix("SUCCEED:") {
            Some(started) => Ok(started.to_string()),
            None => Err(StepError::NonRetriable(body)),
        }
    }

    pub async fn create(&self, id: &str) -> Result<(), StepError> {
        let body = self.get("/create", &[("id", id)]).await?;
        expect_succeed(body)
    }

    pub async fn action(
        &self,
        id: &str,
        action: WithdrawalAction,
        domain: Option<Domain>,
    ) -> Result<(), StepError> {
        let mut query = vec![("type", action.as_str()), ("id", id)];
        if let Some(domain) = domain {
            query.push(("domain", domain.as_str()));
        }
        let body = self.get("/action", &query).await?;
        expect_succeed(body)
    }

    pub async fn status(&self, id: &str) -> Result<WithdrawalState, StepError> {
        let body = self.get("/status", &[("id", id)]).await?;
        body.parse::<WithdrawalState>()
            .map_err(|_| StepError::NonRetriable(body))
    }
}

fn expect_succeed(body: String) -> Result<(), StepError> {
    if body == SUCCEED {
        Ok(())
    } else {
        Err(StepError::NonRetriable(body))
    }
}
