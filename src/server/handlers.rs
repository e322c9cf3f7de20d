//! Record service handlers.
//!
//! Bodies are plain-text literals (`SUCCEED`, `ERROR:*`, state names) that
//! the workflow steps and operator tooling match on. `view=html` switches
//! `/create` and `/action` to the operator listing.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Form, Json,
    extract::{Query, State, rejection::FormRejection},
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::state::AppState;
use crate::runtime::ContinuationToken;
use crate::withdrawal::{Domain, Withdrawal, WithdrawalAction, WithdrawalError, WithdrawalState};

pub const SUCCEED: &str = "SUCCEED";

type Params = HashMap<String, String>;

fn param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn wants_html(params: &Params) -> bool {
    param(params, "view") == Some("html")
}

fn literal(body: impl Into<String>) -> Response {
    body.into().into_response()
}

fn error_literal(err: &WithdrawalError) -> Response {
    literal(err.code())
}

/// `GET /` and `GET /list`
pub async fn list_page(State(state): State<Arc<AppState>>) -> Response {
    listing(&state).await
}

async fn listing(state: &AppState) -> Response {
    match state.service.list().await {
        Ok(records) => Html(render_listing(&records)).into_response(),
        Err(e) => error_literal(&e),
    }
}

/// `GET /create?id=`
pub async fn create(State(state): State<Arc<AppState>>, Query(params): Query<Params>) -> Response {
    let Some(id) = param(&params, "id") else {
        return error_literal(&WithdrawalError::InvalidArgument);
    };
    match state.service.create(id).await {
        Ok(_) if wants_html(&params) => listing(&state).await,
        Ok(_) => literal(SUCCEED),
        Err(e) => {
            warn!(withdrawal_id = %id, error = %e, "Create rejected");
            error_literal(&e)
        }
    }
}

/// `GET /action?type={approve|reject|payout}&domain=&id=`
pub async fn action(State(state): State<Arc<AppState>>, Query(params): Query<Params>) -> Response {
    let Some(id) = param(&params, "id") else {
        return error_literal(&WithdrawalError::InvalidArgument);
    };
    let action = match param(&params, "type").unwrap_or_default().parse::<WithdrawalAction>() {
        Ok(action) => action,
        Err(e) => return error_literal(&e),
    };
    let domain = match param(&params, "domain").map(str::parse::<Domain>).transpose() {
        Ok(domain) => domain,
        Err(e) => return error_literal(&e),
    };

    match state.service.apply(id, action, domain).await {
        Ok(_) if wants_html(&params) => listing(&state).await,
        Ok(_) => literal(SUCCEED),
        Err(e) => {
            warn!(withdrawal_id = %id, action = %action, error = %e, "Action rejected");
            error_literal(&e)
        }
    }
}

/// `GET /status?id=`
pub async fn status(State(state): State<Arc<AppState>>, Query(params): Query<Params>) -> Response {
    let Some(id) = param(&params, "id") else {
        return error_literal(&WithdrawalError::InvalidArgument);
    };
    match state.service.state(id).await {
        Ok(s) => literal(s.as_str()),
        Err(e) => error_literal(&e),
    }
}

/// `POST /registerCallback?id=` with form field `task_token`
pub async fn register_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
    form: Result<Form<Params>, FormRejection>,
) -> Response {
    let Some(id) = param(&params, "id") else {
        return error_literal(&WithdrawalError::InvalidArgument);
    };
    let token = match &form {
        Ok(Form(fields)) => param(fields, "task_token"),
        Err(_) => None,
    };
    let Some(token) = token else {
        return error_literal(&WithdrawalError::InvalidFormData("task_token".into()));
    };

    match state
        .service
        .register_callback(id, ContinuationToken::from(token))
        .await
    {
        Ok(()) => literal(SUCCEED),
        Err(e) => {
            info!(withdrawal_id = %id, error = %e, "Callback registration refused");
            error_literal(&e)
        }
    }
}

/// `GET /start?id=`: start an approval workflow, minting an id if absent
pub async fn start(State(state): State<Arc<AppState>>, Query(params): Query<Params>) -> Response {
    let Some(workflow) = state.workflow.clone() else {
        return literal("ERROR:WORKFLOW_DISABLED");
    };
    let id = param(&params, "id")
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // Create in-line so a refused id reaches the caller
    if let Err(e) = workflow.create(&id).await {
        warn!(withdrawal_id = %id, error = %e, "Workflow not started");
        return literal(e.code());
    }

    let run_id = id.clone();
    tokio::spawn(async move {
        if let Err(e) = workflow.decide(&run_id).await {
            warn!(withdrawal_id = %run_id, error = %e, "Workflow failed");
        }
    });
    info!(withdrawal_id = %id, "Workflow dispatched");
    literal(format!("{}:{}", SUCCEED, id))
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub timestamp_ms: u64,
    pub withdrawals: usize,
}

/// `GET /health`
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthResponse>> {
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let withdrawals = state.service.list().await.map(|all| all.len()).unwrap_or(0);
    Json(ApiResponse {
        code: 0,
        msg: "ok".to_string(),
        data: Some(HealthResponse {
            timestamp_ms,
            withdrawals,
        }),
    })
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Operator listing with manual approve/reject links for Pending records
pub fn render_listing(records: &[Withdrawal]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><title>Withdrawals</title></head><body>\
         <h1>Withdrawals</h1><table border=\"1\"><tr><th>ID</th><th>Created</th>\
         <th>Sports</th><th>Casino</th><th>Manual</th><th>Payment</th><th>Action</th></tr>",
    );
    for w in records {
        let id = escape_html(w.id());
        let query_id = urlencoding::encode(w.id());
        let actions = if w.state() == WithdrawalState::Pending {
            format!(
                "<a href=\"/action?type=approve&domain=manual&view=html&id={0}\">APPROVE</a> \
                 <a href=\"/action?type=reject&domain=manual&view=html&id={0}\">REJECT</a>",
                query_id
            )
        } else {
            String::new()
        };
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            id,
            w.created_at.format("%Y-%m-%d %H:%M:%S"),
            w.domain_state(Domain::Sports),
            w.domain_state(Domain::Casino),
            w.domain_state(Domain::Manual),
            w.state(),
            actions
        );
    }
    html.push_str("</table></body></html>");
    html
}
