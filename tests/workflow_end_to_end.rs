//! End-to-end: record service over HTTP, in-process workflow, mocked providers.

use std::time::Duration;

use serde::Deserialize;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use withdrawal_approval::config::AppConfig;
use withdrawal_approval::providers::RecordServiceClient;
use withdrawal_approval::server::{AppState, serve};
use withdrawal_approval::withdrawal::{Domain, WithdrawalAction, WithdrawalState};

struct TestHarness {
    base_url: String,
    client: RecordServiceClient,
    http: reqwest::Client,
    _sports: MockServer,
    _casino: MockServer,
}

impl TestHarness {
    async fn new(sports_answer: &str, casino_answer: &str) -> Self {
        let sports = provider(sports_answer).await;
        let casino = provider(casino_answer).await;

        let config = fast_config(&sports.uri(), &casino.uri());
        let state = AppState::from_config(&config).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(serve(listener, state));

        Self {
            client: RecordServiceClient::new(base_url.clone()),
            base_url,
            http: reqwest::Client::new(),
            _sports: sports,
            _casino: casino,
        }
    }

    async fn get(&self, route: &str) -> String {
        self.http
            .get(format!("{}{}", self.base_url, route))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    }

    /// Poll until the record reaches `expected`
    async fn wait_for(&self, id: &str, expected: WithdrawalState) {
        let mut last = None;
        for _ in 0..250 {
            if let Ok(state) = self.client.status(id).await {
                if state == expected {
                    return;
                }
                last = Some(state);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("{} never reached {}, last {:?}", id, expected, last);
    }
}

#[derive(Deserialize)]
struct Health {
    code: i32,
    data: HealthData,
}

#[derive(Deserialize)]
struct HealthData {
    timestamp_ms: u64,
    withdrawals: usize,
}

async fn provider(answer: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(answer))
        .mount(&server)
        .await;
    server
}

fn fast_config(sports_url: &str, casino_url: &str) -> AppConfig {
    let fast = r#"{ initial_interval_ms: 5, maximum_interval_ms: 20, expiration_interval_ms: 5000, start_to_close_ms: 5000 }"#;
    let yaml = format!(
        r#"
log_level: "info"
log_dir: "./logs"
log_file: "test.log"
use_json: false
rotation: "never"
server:
  host: "127.0.0.1"
  port: 0
providers:
  sports_url: "{sports_url}"
  casino_url: "{casino_url}"
  request_timeout_ms: 2000
workflow:
  create: {fast}
  auto_approval: {{ initial_interval_ms: 5, maximum_interval_ms: 20, start_to_close_ms: 5000, non_retriable_reasons: ["DISAPPROVED"] }}
  manual: {{ maximum_attempts: 1, start_to_close_ms: 10000 }}
  manual_registration: {fast}
  record: {fast}
  payout: {fast}
"#
    );
    serde_yaml::from_str(&yaml).unwrap()
}

// ========================================================================
// Wire contract
// ========================================================================

#[tokio::test]
async fn record_service_literals() {
    let h = TestHarness::new("APPROVE", "APPROVE").await;

    assert_eq!(h.get("/create?id=W1").await, "SUCCEED");
    assert_eq!(h.get("/create?id=W1").await, "ERROR:ID_ALREADY_EXISTS");
    assert_eq!(h.get("/create").await, "ERROR:INVALID_ID");
    assert_eq!(h.get("/status?id=ghost").await, "ERROR:INVALID_ID");
    assert_eq!(h.get("/status?id=W1").await, "PENDING");

    assert_eq!(h.get("/action?type=refund&domain=sports&id=W1").await, "ERROR:INVALID_FORM_DATA");
    assert_eq!(h.get("/action?type=approve&domain=poker&id=W1").await, "ERROR:INVALID_FORM_DATA");
    assert_eq!(h.get("/action?type=approve&domain=sports&id=ghost").await, "ERROR:INVALID_ID");

    assert_eq!(h.get("/action?type=approve&domain=sports&id=W1").await, "SUCCEED");
    assert_eq!(h.get("/action?type=approve&domain=casino&id=W1").await, "SUCCEED");
    assert_eq!(h.get("/status?id=W1").await, "APPROVED");
    assert_eq!(h.get("/action?type=payout&id=W1").await, "SUCCEED");
    assert_eq!(h.get("/status?id=W1").await, "COMPLETED");
}

#[tokio::test]
async fn register_callback_literals() {
    let h = TestHarness::new("APPROVE", "APPROVE").await;
    let url = |id: &str| format!("{}/registerCallback?id={}", h.base_url, id);
    h.client.create("W1").await.unwrap();

    let body = h
        .http
        .post(url("W1"))
        .form(&[("task_token", "opaque-token")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "SUCCEED");

    let body = h.http.post(url("W1")).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, "ERROR:INVALID_FORM_DATA");

    let body = h
        .http
        .post(url("ghost"))
        .form(&[("task_token", "t")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ERROR:INVALID_ID");

    h.client
        .action("W1", WithdrawalAction::Reject, Some(Domain::Manual))
        .await
        .unwrap();
    let body = h
        .http
        .post(url("W1"))
        .form(&[("task_token", "late")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ERROR:INVALID_STATE");
}

#[tokio::test]
async fn listing_and_health() {
    let h = TestHarness::new("APPROVE", "APPROVE").await;
    h.client.create("W1").await.unwrap();

    let html = h.get("/list").await;
    assert!(html.contains("<td>W1</td>"));
    assert!(html.contains("type=approve&domain=manual"));

    let html = h.get("/action?type=reject&domain=manual&id=W1&view=html").await;
    assert!(html.contains("<table"));
    assert_eq!(h.get("/status?id=W1").await, "REJECTED");

    let health: Health = h
        .http
        .get(format!("{}/health", h.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.code, 0);
    assert_eq!(health.data.withdrawals, 1);
    assert!(health.data.timestamp_ms > 0);
}

// ========================================================================
// Workflow
// ========================================================================

#[tokio::test]
async fn auto_approval_path_completes() {
    let h = TestHarness::new("APPROVE", "APPROVED").await;

    let id = h.client.start(Some("E1")).await.unwrap();
    assert_eq!(id, "E1");
    h.wait_for("E1", WithdrawalState::Completed).await;
}

#[tokio::test]
async fn start_mints_an_id() {
    let h = TestHarness::new("APPROVE", "APPROVE").await;

    let id = h.client.start(None).await.unwrap();
    assert!(!id.is_empty());
    h.wait_for(&id, WithdrawalState::Completed).await;
}

#[tokio::test]
async fn start_refuses_an_existing_id() {
    let h = TestHarness::new("APPROVE", "APPROVE").await;
    h.client.create("DUP").await.unwrap();

    assert_eq!(h.get("/start?id=DUP").await, "ERROR:ID_ALREADY_EXISTS");
    assert!(h.client.start(Some("DUP")).await.is_err());
    assert_eq!(h.client.status("DUP").await, Ok(WithdrawalState::Pending));
}

#[tokio::test]
async fn disapproved_falls_back_to_manual_approval() {
    let h = TestHarness::new("DISAPPROVED", "APPROVE").await;

    // Record exists once start answers; the manual step may not be suspended yet
    h.client.start(Some("E2")).await.unwrap();

    h.client
        .action("E2", WithdrawalAction::Approve, Some(Domain::Manual))
        .await
        .unwrap();
    h.wait_for("E2", WithdrawalState::Completed).await;
}

#[tokio::test]
async fn manual_rejection_blocks_payout() {
    let h = TestHarness::new("DISAPPROVED", "DISAPPROVED").await;

    h.client.start(Some("E3")).await.unwrap();

    h.client
        .action("E3", WithdrawalAction::Reject, Some(Domain::Manual))
        .await
        .unwrap();
    h.wait_for("E3", WithdrawalState::Rejected).await;

    // Give a wrongly scheduled payout time to land
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.client.status("E3").await, Ok(WithdrawalState::Rejected));
}
