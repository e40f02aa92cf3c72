mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::{json, Value};

async fn queue_text_job(app: &TestApp, token: &str) -> i64 {
    let (status, body) = app
        .post(
            "/api/generators/text",
            json!({ "prompt": "hi", "model": "gpt-4" }),
            Some(token),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    body["jobId"].as_i64().unwrap()
}

#[tokio::test]
async fn cancel_refunds_a_queued_job() {
    let app = TestApp::idle();
    let token = app.signup("ada@example.com").await;
    let job_id = queue_text_job(&app, &token).await;

    let (status, body) = app
        .post(&format!("/api/jobs/{job_id}/cancel"), Value::Null, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["state"], "CANCELLED");

    let (_, sub) = app.get("/api/subscription", Some(&token)).await;
    assert_eq!(sub["goldBalance"], 50);
    assert_eq!(sub["queuePosition"], Value::Null);

    let (status, _) = app
        .post(&format!("/api/jobs/{job_id}/cancel"), Value::Null, Some(&token))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn jobs_are_private_to_their_account() {
    let app = TestApp::idle();
    let ada = app.signup("ada@example.com").await;
    let bob = app.signup("bob@example.com").await;
    let job_id = queue_text_job(&app, &ada).await;

    let (status, body) = app.get(&format!("/api/jobs/{job_id}"), Some(&ada)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], job_id);
    assert_eq!(body["data"]["queuePosition"], 1);

    let (status, _) = app.get(&format!("/api/jobs/{job_id}"), Some(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(&format!("/api/jobs/{job_id}/cancel"), Value::Null, Some(&bob))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/api/jobs", Some(&bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn missing_job_is_a_404() {
    let app = TestApp::idle();
    let token = app.signup("ada@example.com").await;

    let (status, body) = app.get("/api/jobs/999", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn finished_jobs_are_listed_newest_first() {
    let app = TestApp::with_workers();
    let token = app.signup("ada@example.com").await;

    for prompt in ["first", "second"] {
        let (status, _) = app
            .post(
                "/api/generators/text",
                json!({ "prompt": prompt, "model": "gpt-4" }),
                Some(&token),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app.get("/api/jobs?limit=10", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let jobs = body["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["payload"]["prompt"], "second");
    assert_eq!(jobs[0]["state"], "SUCCEEDED");
    assert_eq!(jobs[0]["attempts"], 1);
    assert!(jobs[0].get("queuePosition").is_none());

    app.shutdown().await;
}
