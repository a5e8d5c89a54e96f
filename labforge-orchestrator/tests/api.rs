//! HTTP surface tests against a server bound to an ephemeral port

mod common;

use common::{FakeEngine, Harness, lab_outputs, wait_for};
use labforge_core::domain::job::{Job, JobStatus};
use labforge_core::domain::lab::LabConfig;
use labforge_core::dto::job::{JobOutput, JobSummary};
use labforge_orchestrator::api::{self, AppState};
use serde_json::{Value, json};

async fn serve(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = api::create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new(FakeEngine::new()).await;
    let base = serve(h.state.clone()).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["jobs"], 0);
}

#[tokio::test]
async fn test_create_apply_and_read_back() {
    let h = Harness::new(FakeEngine::new().with_outputs(lab_outputs())).await;
    let base = serve(h.state.clone()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/job", base))
        .json(&json!({ "config": LabConfig::example("dev"), "start": "apply" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: Job = response.json().await.unwrap();

    wait_for(&h.state, created.id, JobStatus::Completed).await;

    let job: Job = client
        .get(format!("{}/job/{}", base, created.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_ne!(job.config.platform.admin_password, "change-me-please");

    let output: JobOutput = client
        .get(format!("{}/job/{}/output", base, created.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        output.lines.last().map(String::as_str),
        Some("Lab 'dev' provisioned successfully")
    );

    let list: Vec<JobSummary> = client
        .get(format!("{}/job/list", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].stack_name, "dev");
}

#[tokio::test]
async fn test_error_status_codes() {
    let h = Harness::without_credentials(FakeEngine::new()).await;
    let base = serve(h.state.clone()).await;
    let client = reqwest::Client::new();

    let missing = client
        .get(format!("{}/job/{}", base, uuid::Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("not found"));

    let mut invalid = LabConfig::example("dev");
    invalid.node_pool.min_nodes = 10;
    let bad = client
        .post(format!("{}/job", base))
        .json(&json!({ "config": invalid }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);

    let created: Job = client
        .post(format!("{}/job", base))
        .json(&json!({ "config": LabConfig::example("dev") }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let no_credentials = client
        .post(format!("{}/job/{}/apply", base, created.id))
        .send()
        .await
        .unwrap();
    assert_eq!(no_credentials.status(), 412);

    let wrong_state = client
        .post(format!("{}/job/{}/launch", base, created.id))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_state.status(), 409);
}

#[tokio::test]
async fn test_credentials_enable_operations() {
    let h = Harness::without_credentials(FakeEngine::new().with_outputs(lab_outputs())).await;
    let base = serve(h.state.clone()).await;
    let client = reqwest::Client::new();

    let status: Value = client
        .get(format!("{}/credentials/ovh", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["configured"], false);

    let incomplete = client
        .put(format!("{}/credentials/ovh", base))
        .json(&json!({
            "endpoint": "ovh-eu",
            "application_key": "ak",
            "application_secret": "",
            "consumer_key": "ck",
            "project_id": "project-1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(incomplete.status(), 400);

    let stored = client
        .put(format!("{}/credentials/ovh", base))
        .json(&json!({
            "endpoint": "ovh-eu",
            "application_key": "ak",
            "application_secret": "as",
            "consumer_key": "ck",
            "project_id": "project-1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(stored.status(), 204);

    let created: Job = client
        .post(format!("{}/job", base))
        .json(&json!({ "config": LabConfig::example("dev"), "start": "preview" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    wait_for(&h.state, created.id, JobStatus::DryRunCompleted).await;

    let unknown = client
        .get(format!("{}/credentials/aws", base))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);
}

#[tokio::test]
async fn test_delete_job() {
    let h = Harness::new(FakeEngine::new()).await;
    let base = serve(h.state.clone()).await;
    let client = reqwest::Client::new();

    let created: Job = client
        .post(format!("{}/job", base))
        .json(&json!({ "config": LabConfig::example("dev") }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let deleted = client
        .delete(format!("{}/job/{}", base, created.id))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);

    let gone = client
        .get(format!("{}/job/{}", base, created.id))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), 404);
}
