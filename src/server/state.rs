use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::providers::{HttpAutoApprovalClient, ManualApprovalClient};
use crate::runtime::CompletionHub;
use crate::withdrawal::{Domain, WithdrawalService};
use crate::workflow::WithdrawalWorkflow;

/// Record service state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WithdrawalService>,
    /// Runs approvals started through `/start`; absent in record-only mode
    pub workflow: Option<Arc<WithdrawalWorkflow>>,
}

impl AppState {
    pub fn new(service: Arc<WithdrawalService>, workflow: Option<Arc<WithdrawalWorkflow>>) -> Self {
        Self { service, workflow }
    }

    /// Record service plus an in-process workflow wired to the configured providers
    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let hub = CompletionHub::new();
        let service = Arc::new(WithdrawalService::in_memory(Arc::new(hub.clone())));

        let timeout = Duration::from_millis(config.providers.request_timeout_ms);
        let sports = Arc::new(HttpAutoApprovalClient::with_timeout(
            Domain::Sports,
            config.providers.sports_url.clone(),
            timeout,
        )?);
        let casino = Arc::new(HttpAutoApprovalClient::with_timeout(
            Domain::Casino,
            config.providers.casino_url.clone(),
            timeout,
        )?);
        let manual = Arc::new(ManualApprovalClient::new(
            service.clone(),
            hub,
            config.workflow.manual_registration.to_step_options(),
        ));

        let workflow = WithdrawalWorkflow::new(
            service.clone(),
            sports,
            casino,
            manual,
            config.workflow.to_options(),
        );
        Ok(Self::new(service, Some(Arc::new(workflow))))
    }
}
