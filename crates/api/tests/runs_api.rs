//! Integration tests for the run lifecycle, test plans and worker health.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, TestApp};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test plans
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_plans_are_listed_sorted_without_extension() {
    let app = TestApp::new().await;
    app.write("testplan/login.jmx", "<jmeterTestPlan/>");
    app.write("testplan/checkout.jmx", "<jmeterTestPlan/>");
    app.write("testplan/notes.txt", "not a plan");

    let response = app.get("/api/v1/test-plans").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], json!(["checkout", "login"]));
}

// ---------------------------------------------------------------------------
// Status and stop while idle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn current_run_is_idle_initially() {
    let app = TestApp::new().await;

    let json = body_json(app.get("/api/v1/runs/current").await).await;

    assert_eq!(json["data"]["running"], false);
    assert!(json["data"].get("run").is_none());
}

#[tokio::test]
async fn stop_while_idle_is_conflict() {
    let app = TestApp::new().await;

    let response = app.post_json("/api/v1/runs/current/stop", json!({})).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "No load test is running");
}

// ---------------------------------------------------------------------------
// Start rejections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_with_missing_plan_is_404() {
    let app = TestApp::new().await;

    let response = app
        .post_json(
            "/api/v1/runs",
            json!({ "test_plan": "missing", "users": 10, "duration_secs": 5 }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!app.supervisor.is_active().await);
}

#[tokio::test]
async fn start_with_invalid_parameters_is_400() {
    let app = TestApp::new().await;
    app.write("testplan/checkout.jmx", "<jmeterTestPlan/>");

    for body in [
        json!({ "test_plan": "checkout", "users": 0, "duration_secs": 5 }),
        json!({ "test_plan": "../checkout", "users": 1, "duration_secs": 5 }),
    ] {
        let response = app.post_json("/api/v1/runs", body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }
}

// ---------------------------------------------------------------------------
// Full lifecycle
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[tokio::test]
async fn start_conflict_and_stop_through_the_api() {
    let app = TestApp::new().await;
    app.write("testplan/checkout.jmx", "<jmeterTestPlan/>");
    app.install_engine("exec sleep 30");

    let response = app
        .post_json(
            "/api/v1/runs",
            json!({ "jmx_file": "checkout", "thread_num": 3, "test_duration": 60 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let started = body_json(response).await;
    assert_eq!(started["data"]["test_name"], "checkout-3Vuser");
    assert_eq!(started["data"]["phase"], "running");

    let again = app
        .post_json(
            "/api/v1/runs",
            json!({ "test_plan": "checkout", "users": 3, "duration_secs": 60 }),
        )
        .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let health = body_json(app.get("/health").await).await;
    assert_eq!(health["run_active"], true);

    let stop = app.post_json("/api/v1/runs/current/stop", json!({})).await;
    assert_eq!(stop.status(), StatusCode::OK);
    assert_eq!(body_json(stop).await["data"]["run_id"], started["data"]["run_id"]);

    assert!(app.supervisor.shutdown(Duration::from_secs(20)).await);
    let status = body_json(app.get("/api/v1/runs/current").await).await;
    assert_eq!(status["data"]["running"], false);
    assert_eq!(status["data"]["last_outcome"]["stopped"], true);
}

// ---------------------------------------------------------------------------
// Worker health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn workers_health_reports_online_worker() {
    let app = TestApp::new().await;

    let response = app.get("/api/v1/workers/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["servers"][0]["status"], "online");
}
