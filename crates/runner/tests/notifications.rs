//! Outcome notifications sent by the supervisor to a local capture server.

#![cfg(unix)]

mod common;

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use common::{debug_broker, notifying_supervisor, Fixture};
use loadctl_events::WebhookRoutes;
use loadctl_runner::TransferOutcome;

#[derive(Clone, Default)]
struct Capture {
    bodies: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

impl Capture {
    fn contents(&self) -> Vec<(String, String)> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .map(|(name, body)| {
                let content = body["markdown"]["content"].as_str().unwrap_or_default();
                (name.clone(), content.to_string())
            })
            .collect()
    }
}

async fn hook(
    State(capture): State<Capture>,
    Path(name): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    capture.bodies.lock().unwrap().push((name, body));
    StatusCode::OK
}

/// Start a capture server and return routes sending `checkout` runs to
/// `/hook/checkout` and everything else to `/hook/default`.
async fn spawn_capture(capture: Capture) -> WebhookRoutes {
    let app = Router::new()
        .route("/hook/{name}", post(hook))
        .with_state(capture);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    WebhookRoutes::parse(
        Some(format!("http://{addr}/hook/default")),
        &format!("checkout=http://{addr}/hook/checkout"),
    )
    .unwrap()
}

#[tokio::test]
async fn missing_result_file_is_reported_as_success_with_warning() {
    let fx = Fixture::new(common::ENGINE_NO_RESULT, 1).await;
    let capture = Capture::default();
    let routes = spawn_capture(capture.clone()).await;
    let supervisor = notifying_supervisor(fx.runner_config(), debug_broker(), routes);

    let started = supervisor
        .start(supervisor.run_config("checkout", 1, 1, None))
        .await
        .unwrap();
    let outcome = started.completion.wait().await.unwrap();

    assert!(outcome.succeeded);
    assert_eq!(outcome.transfer.outcome, TransferOutcome::NeverAppeared);

    let sent = capture.contents();
    assert_eq!(sent.len(), 1);
    let (route, content) = &sent[0];
    assert_eq!(route, "checkout");
    assert!(content.starts_with("### checkout-1Vuser distributed load test report"));
    assert!(content.contains(
        "- Result data: <font color=\"warning\">result file was never created</font>"
    ));
}

#[tokio::test]
async fn validated_run_is_reported_without_warning() {
    let fx = Fixture::new(common::ENGINE_OK, 1).await;
    let capture = Capture::default();
    let routes = spawn_capture(capture.clone()).await;
    let supervisor = notifying_supervisor(fx.runner_config(), debug_broker(), routes);

    let started = supervisor
        .start(supervisor.run_config("checkout", 1, 1, None))
        .await
        .unwrap();
    started.completion.wait().await.unwrap();

    let sent = capture.contents();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("distributed load test report"));
    assert!(!sent[0].1.contains("Result data:"));
}

#[tokio::test]
async fn failed_run_sends_failure_notification() {
    let fx = Fixture::new(common::ENGINE_FAIL, 1).await;
    let capture = Capture::default();
    let routes = spawn_capture(capture.clone()).await;
    let supervisor = notifying_supervisor(fx.runner_config(), debug_broker(), routes);

    let started = supervisor
        .start(supervisor.run_config("checkout", 1, 1, None))
        .await
        .unwrap();
    let outcome = started.completion.wait().await.unwrap();
    assert_eq!(outcome.exit_code, 2);

    let sent = capture.contents();
    assert_eq!(sent.len(), 1);
    assert!(sent[0]
        .1
        .starts_with("### checkout-1Vuser distributed load test failed"));
}
