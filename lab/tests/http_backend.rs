//! End-to-end tests of the HTTP transport against a fake lab backend.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vtl_lab::client::{execute_sync, submit_job, Transport};
use vtl_lab::{
    Backend, Binding, Bindings, CaseConfig, ClientError, ClusterType, DatasetSource,
    ExecutionContext, ExecutionMode, HttpTransport, JobHandle, LabConfig, Outcome, Phase,
    PollPolicy, Session, Submission,
};

// =============================================================================
// Fake backend
// =============================================================================

#[derive(Clone, Default)]
struct FakeLab {
    polls: Arc<AtomicUsize>,
    auth: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl FakeLab {
    fn record(&self, route: &str, headers: &HeaderMap) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.auth.lock().unwrap().push((route.to_string(), auth));
    }

    fn auth_for(&self, route: &str) -> Vec<Option<String>> {
        self.auth
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r == route)
            .map(|(_, a)| a.clone())
            .collect()
    }
}

async fn execute_in_memory(
    State(lab): State<FakeLab>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    lab.record("in-memory", &headers);
    if body["vtlScript"] == "fail" {
        return Json(json!({"error": {"message": "boom"}}));
    }
    let a = body["bindings"]["A"].as_i64().unwrap_or(0);
    let b = body["bindings"]["B"].as_i64().unwrap_or(0);
    Json(json!({"result": a + b}))
}

async fn submit(
    State(lab): State<FakeLab>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    lab.record("execute", &headers);
    if params.get("mode").map(String::as_str) != Some("SPARK") {
        return (StatusCode::BAD_REQUEST, r#"{"error": "unsupported mode"}"#.to_string());
    }
    if body["s3ForBindings"]["x"] != json!({"bucket": "b"}) || body["bindings"] != json!({}) {
        return (StatusCode::BAD_REQUEST, r#"{"error": "bad buckets"}"#.to_string());
    }
    (StatusCode::OK, "\"job-42\"\n".to_string())
}

async fn job_bindings(State(lab): State<FakeLab>, Path(id): Path<String>) -> Response {
    if lab.polls.fetch_add(1, Ordering::SeqCst) == 0 {
        return StatusCode::ACCEPTED.into_response();
    }
    Json(json!({"done": true, "job": id})).into_response()
}

async fn dataset(State(lab): State<FakeLab>, headers: HeaderMap) -> Json<Value> {
    lab.record("data", &headers);
    Json(json!({"dataStructure": [{"name": "id", "type": "STRING"}], "dataPoints": [["a"]]}))
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "late"
}

async fn start_fake_lab() -> (String, FakeLab) {
    let lab = FakeLab::default();
    let app = Router::new()
        .route("/api/vtl/in-memory", post(execute_in_memory))
        .route("/api/vtl/execute", post(submit))
        .route("/api/vtl/job/{id}/bindings", get(job_bindings))
        .route("/api/vtl/slow", get(slow))
        .route("/data/ds.json", get(dataset))
        .with_state(lab.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), lab)
}

fn lab_config(root: &str) -> LabConfig {
    let mut config = LabConfig::default()
        .with_api_url(format!("{}/api/vtl", root))
        .with_debounce(Duration::from_millis(10))
        .with_poll(PollPolicy {
            interval: Duration::from_millis(10),
            jitter: Duration::ZERO,
            max_attempts: Some(50),
        });
    config.token = Some("secret".to_string());
    config
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_sync_execution_over_http() {
    let (root, lab) = start_fake_lab().await;
    let transport = HttpTransport::from_config(&lab_config(&root)).unwrap();

    let mut bindings = Bindings::new();
    bindings.insert("A".into(), Binding::Dataset(json!(1)));
    bindings.insert("B".into(), Binding::Dataset(json!(2)));

    let context = ExecutionContext::InMemory;
    let outcome = execute_sync(&transport, context, "A + B", &bindings, &Map::new())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Success(json!({"result": 3})));

    let outcome = execute_sync(&transport, context, "fail", &bindings, &Map::new())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Failure("boom".to_string()));

    assert_eq!(lab.auth_for("in-memory"), vec![Some("Bearer secret".to_string()); 2]);
}

#[tokio::test]
async fn test_job_submission_over_http() {
    let (root, _lab) = start_fake_lab().await;
    let transport = HttpTransport::new(&format!("{}/api/vtl/", root)).unwrap();

    let mut bindings = Bindings::new();
    bindings.insert("x".into(), Binding::from(json!({"type": "S3", "bucket": "b"})));

    let submission = submit_job(
        &transport,
        ExecutionMode::Spark,
        ClusterType::ClusterKubernetes,
        "ds := x;",
        &bindings,
    )
    .await
    .unwrap();
    assert_eq!(submission, Submission::Accepted(JobHandle::new("job-42")));

    let rejected =
        submit_job(&transport, ExecutionMode::Memory, ClusterType::Local, "ds := x;", &bindings)
            .await
            .unwrap();
    assert_eq!(rejected, Submission::Rejected("unsupported mode".to_string()));
}

#[tokio::test]
async fn test_session_runs_job_to_completion() {
    let (root, lab) = start_fake_lab().await;
    let config = lab_config(&root);
    let transport = Arc::new(HttpTransport::from_config(&config).unwrap());

    let mut session = Session::new(&config, Backend::job(&config), transport);
    session.set_binding("x", Binding::from(json!({"type": "S3", "bucket": "b"})));
    session.set_script("ds := x;");
    assert!(session.settle_diagnostics().await.unwrap().is_empty());

    session.execute().unwrap();
    let outcome = session.run_until_settled().await.unwrap().cloned();

    assert_eq!(outcome, Some(Outcome::Success(json!({"done": true, "job": "job-42"}))));
    assert_eq!(session.phase(), Phase::Succeeded);
    assert_eq!(session.job(), None);
    assert_eq!(lab.polls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_external_dataset_gets_no_token() {
    let (root, lab) = start_fake_lab().await;
    let config = lab_config(&root);
    let transport = Arc::new(HttpTransport::from_config(&config).unwrap());

    let case = CaseConfig {
        label: "datasets".into(),
        in_memory_data: vec![DatasetSource {
            name: "ds".into(),
            url: format!("{}/data/ds.json", root),
        }],
        ..Default::default()
    };
    let backend = Backend::Sync(ExecutionContext::InMemory);
    let session = Session::open_case(&config, backend, &case, transport).await;

    assert!(session.bindings().contains_key("ds"));
    assert_eq!(session.suggestions().items.len(), 1);
    assert!(lab.auth_for("data").iter().all(Option::is_none));
}

#[tokio::test]
async fn test_request_timeout() {
    let (root, _lab) = start_fake_lab().await;
    let mut config = lab_config(&root);
    config.request_timeout = Some(Duration::from_millis(100));
    let transport = HttpTransport::from_config(&config).unwrap();

    match transport.get("slow").await {
        Err(ClientError::Timeout) => {}
        other => panic!("expected a timeout, got {:?}", other),
    }
}
