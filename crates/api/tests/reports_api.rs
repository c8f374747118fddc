//! Integration tests for report listing, static serving and comparison.

mod common;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{body_bytes, body_json, TestApp};
use loadctl_runner::compare::{CompareError, ReportComparer};
use serde_json::json;

fn report(app: &TestApp, dir: &str) {
    app.write(
        &format!("report/html/{dir}/index.html"),
        "<html>report</html>",
    );
    app.write(&format!("report/html/{dir}/statistics.json"), "{}");
}

// ---------------------------------------------------------------------------
// Static serving
// ---------------------------------------------------------------------------

#[tokio::test]
async fn serves_report_files_with_content_type() {
    let app = TestApp::new().await;
    report(&app, "checkout-10Vuser_20240101120000");
    app.write(
        "report/html/checkout-10Vuser_20240101120000/content/css/style.css",
        "body {}",
    );

    let response = app
        .get("/report/html/checkout-10Vuser_20240101120000/content/css/style.css")
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/css");
    assert_eq!(body_bytes(response).await, b"body {}");
}

#[tokio::test]
async fn directory_serves_its_index_page() {
    let app = TestApp::new().await;
    report(&app, "checkout-10Vuser_20240101120000");

    let response = app
        .get("/report/html/checkout-10Vuser_20240101120000")
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/html");
    assert_eq!(body_bytes(response).await, b"<html>report</html>");
}

#[tokio::test]
async fn traversal_is_forbidden() {
    let app = TestApp::new().await;
    app.write("secret.txt", "top secret");

    for uri in [
        "/report/html/../../secret.txt",
        "/report/html/%2e%2e/%2e%2e/secret.txt",
        "/report/html//etc/passwd",
    ] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        let json = body_json(response).await;
        assert_eq!(json["error"], "Access denied: invalid path");
    }
}

#[tokio::test]
async fn missing_report_file_is_404() {
    let app = TestApp::new().await;

    let response = app.get("/report/html/nothing_here/index.html").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reports_are_listed_newest_first() {
    let app = TestApp::new().await;
    report(&app, "checkout-10Vuser_20240101120000");
    report(&app, "checkout-20Vuser_20240301120000");
    report(&app, "login_20240201120000");
    // No index page: not a report.
    std::fs::create_dir_all(app.root().join("report/html/partial_20240401120000")).unwrap();

    let response = app.get("/api/v1/reports").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = json["data"].as_array().unwrap();
    let dates: Vec<&str> = data.iter().map(|r| r["date"].as_str().unwrap()).collect();
    assert_eq!(dates, ["20240301120000", "20240201120000", "20240101120000"]);
    assert_eq!(
        data[0]["path"],
        "/report/html/checkout-20Vuser_20240301120000/index.html"
    );
}

#[tokio::test]
async fn missing_report_root_lists_nothing() {
    let app = TestApp::new().await;

    let json = body_json(app.get("/api/v1/reports").await).await;

    assert_eq!(json["data"], json!([]));
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StubComparer {
    inputs: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl ReportComparer for StubComparer {
    async fn compare(
        &self,
        first: &Path,
        second: &Path,
        output_dir: &Path,
        output_name: &str,
    ) -> Result<PathBuf, CompareError> {
        let mut inputs = self.inputs.lock().unwrap();
        inputs.push(first.to_path_buf());
        inputs.push(second.to_path_buf());
        Ok(output_dir.join(output_name))
    }
}

#[tokio::test]
async fn compare_without_backend_is_unavailable() {
    let app = TestApp::new().await;
    report(&app, "a_20240101000000");
    report(&app, "b_20240102000000");

    let response = app
        .post_json(
            "/api/v1/reports/compare",
            json!({
                "report1_path": "/report/html/a_20240101000000/index.html",
                "report2_path": "/report/html/b_20240102000000/index.html",
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "COMPARE_UNAVAILABLE");
}

#[tokio::test]
async fn compare_returns_result_page_redirect() {
    let comparer = Arc::new(StubComparer::default());
    let app = TestApp::with_comparer(Some(comparer.clone())).await;
    report(&app, "a_20240101000000");
    report(&app, "b_20240102000000");

    let response = app
        .post_json(
            "/api/v1/reports/compare",
            json!({
                "report1_path": "/report/html/a_20240101000000/index.html",
                "report2_path": "/report/html/b_20240102000000/index.html",
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let redirect = json["data"]["redirect"].as_str().unwrap();
    assert!(redirect.starts_with("result.html?t="));
    assert!(redirect.contains("&data_file=performance_data_"));

    let inputs = comparer.inputs.lock().unwrap();
    assert!(inputs[0].ends_with("a_20240101000000/statistics.json"));
    assert!(inputs[1].ends_with("b_20240102000000/statistics.json"));
}

#[tokio::test]
async fn compare_with_missing_statistics_is_404() {
    let app = TestApp::with_comparer(Some(Arc::new(StubComparer::default()))).await;
    report(&app, "a_20240101000000");

    let response = app
        .post_json(
            "/api/v1/reports/compare",
            json!({
                "report1_path": "/report/html/a_20240101000000/index.html",
                "report2_path": "/report/html/gone_20240102000000/index.html",
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn compare_requires_both_paths() {
    let app = TestApp::with_comparer(Some(Arc::new(StubComparer::default()))).await;

    let response = app
        .post_json(
            "/api/v1/reports/compare",
            json!({ "report1_path": "", "report2_path": "x" }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
