#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use loadctl_core::logging::LogLevel;
use loadctl_core::transfer::TransferPolicy;
use loadctl_core::worker::WorkerServer;
use loadctl_events::{LogBroker, NotificationConfig, NotificationDispatcher, WebhookRoutes};
use loadctl_runner::compare::ReportComparer;
use loadctl_runner::clock::InstantTicker;
use loadctl_runner::{RunSupervisor, TransferSettings};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceExt;

use loadctl_api::config::ServerConfig;
use loadctl_api::router::build_app_router;
use loadctl_api::state::AppState;

/// Build a test `ServerConfig` rooted in `root` with the given workers.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config(root: &Path, workers: Vec<WorkerServer>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        engine_bin: root.join("engine.sh"),
        test_plan_dir: root.join("testplan"),
        report_dir: root.join("report/html"),
        result_dir: root.join("jtl"),
        log_dir: root.join("log"),
        workers,
        public_base_url: "http://127.0.0.1:5001".to_string(),
        notifications: NotificationConfig {
            enabled: false,
            routes: WebhookRoutes::default(),
        },
        log_level: LogLevel::Debug,
        compare_command: None,
        compare_output_dir: root.join("reportdiff/analysis"),
    }
}

/// A running application over a temporary workspace with one listening
/// worker.
pub struct TestApp {
    pub dir: TempDir,
    pub config: ServerConfig,
    pub broker: Arc<LogBroker>,
    pub supervisor: RunSupervisor,
    router: Router,
    _worker: TcpListener,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_comparer(None).await
    }

    pub async fn with_comparer(comparer: Option<Arc<dyn ReportComparer>>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = test_config(dir.path(), vec![WorkerServer::with_port("127.0.0.1", port)]);

        let broker = Arc::new(LogBroker::with_threshold(config.log_level));
        let notifier =
            NotificationDispatcher::new(config.notifications.clone(), Arc::clone(&broker))
                .unwrap();
        let runner_config = config
            .runner_config()
            .with_health_timeout(Duration::from_secs(1))
            .with_transfer(TransferSettings {
                policy: TransferPolicy {
                    max_attempts: 3,
                    ..TransferPolicy::default()
                },
                ticker: Arc::new(InstantTicker),
            });
        let supervisor =
            RunSupervisor::new(runner_config, Arc::clone(&broker), Arc::new(notifier));

        let state = AppState {
            config: Arc::new(config.clone()),
            supervisor: supervisor.clone(),
            broker: Arc::clone(&broker),
            comparer,
        };
        let router = build_app_router(state, &config);

        Self {
            dir,
            config,
            broker,
            supervisor,
            router,
            _worker: listener,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Install an executable engine script running `body`.
    #[cfg(unix)]
    pub fn install_engine(&self, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = self.write("engine.sh", &format!("#!/bin/sh\n{body}\n"));
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Write `contents` to `rel` under the workspace, creating parents.
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Send an arbitrary request through the full middleware stack.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        get(self.router.clone(), uri).await
    }

    pub async fn post_json(&self, uri: &str, json: serde_json::Value) -> Response<Body> {
        post_json(self.router.clone(), uri, json).await
    }
}

/// Send a GET request to the app and return the response.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
