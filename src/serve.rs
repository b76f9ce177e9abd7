use crate::config::ViewerConfig;
use crate::store::ProjectsRoot;
use crate::viewer::{self, ViewerError};
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "serve")]
#[derive(Clone)]
struct AppState {
    root: Arc<ProjectsRoot>,
}

#[cfg(feature = "serve")]
pub async fn run(config: &ViewerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let root = ProjectsRoot::new(&config.projects.dir, config.projects.reserved.clone());
    tracing::info!(projects = %root.root().display(), "reading transcripts");

    let app = router(root, Some(config.server.static_dir.as_path()));

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("viewer listening on http://{local_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the API router. Non-API paths fall back to files under `static_dir`
/// when that directory exists.
#[cfg(feature = "serve")]
pub fn router(root: ProjectsRoot, static_dir: Option<&Path>) -> axum::Router {
    use axum::{routing::get, Router};
    use tower_http::cors::CorsLayer;

    let state = AppState {
        root: Arc::new(root),
    };

    let mut app = Router::new()
        .route("/api/health", get(health))
        .route("/api/projects", get(api_projects))
        .route("/api/projects/{project_id}/sessions", get(api_sessions))
        .route("/api/sessions/{project_id}/{session_id}", get(api_session))
        .with_state(state);

    if let Some(dir) = static_dir.filter(|d| d.is_dir()) {
        tracing::info!(dir = %dir.display(), "serving static files");
        app = app.fallback_service(tower_http::services::ServeDir::new(dir));
    }

    app.layer(CorsLayer::permissive())
}

#[cfg(feature = "serve")]
impl axum::response::IntoResponse for ViewerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            ViewerError::NotFound(_) => StatusCode::NOT_FOUND,
            ViewerError::Internal(msg) => {
                tracing::warn!(error = %msg, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = axum::Json(serde_json::json!({"error": self.to_string()}));
        (status, body).into_response()
    }
}

/// Run file reads and aggregation off the async workers.
#[cfg(feature = "serve")]
async fn blocking<T, F>(f: F) -> Result<T, ViewerError>
where
    F: FnOnce() -> Result<T, ViewerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ViewerError::Internal(format!("request task failed: {e}")))?
}

#[cfg(feature = "serve")]
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({"ok": true}))
}

#[cfg(feature = "serve")]
async fn api_projects(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<Vec<crate::index::ProjectListing>>, ViewerError> {
    let root = Arc::clone(&state.root);
    let projects = blocking(move || viewer::list_projects(&root)).await?;
    Ok(axum::Json(projects))
}

#[cfg(feature = "serve")]
async fn api_sessions(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path(project_id): axum::extract::Path<String>,
) -> Result<axum::Json<Vec<crate::index::SessionListing>>, ViewerError> {
    let root = Arc::clone(&state.root);
    let sessions = blocking(move || viewer::list_sessions(&root, &project_id)).await?;
    Ok(axum::Json(sessions))
}

#[cfg(feature = "serve")]
async fn api_session(
    axum::extract::State(state): axum::extract::State<AppState>,
    axum::extract::Path((project_id, session_id)): axum::extract::Path<(String, String)>,
) -> Result<axum::Json<crate::format::SessionResponse>, ViewerError> {
    let root = Arc::clone(&state.root);
    let session =
        blocking(move || viewer::get_session(&root, &project_id, &session_id)).await?;
    Ok(axum::Json(session))
}

#[cfg(all(test, feature = "serve"))]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("C--Users-me-demo");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("s1.jsonl"),
            [
                r#"{"type":"user","uuid":"u1","timestamp":"2025-06-01T10:00:00.000Z","message":{"content":"hello there"}}"#,
                "not json",
                r#"{"type":"assistant","uuid":"a1","parentUuid":"u1","timestamp":"2025-06-01T10:00:02.000Z","message":{"model":"claude-sonnet-4","usage":{"input_tokens":10,"output_tokens":20}}}"#,
            ]
            .join("\n"),
        )
        .unwrap();
        tmp
    }

    fn app(tmp: &TempDir) -> axum::Router {
        let root = ProjectsRoot::new(tmp.path(), vec!["viewer".to_string()]);
        router(root, None)
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .method("GET")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_ok() {
        let tmp = fixture();
        let (status, body) = get_json(app(&tmp), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn list_projects_endpoint() {
        let tmp = fixture();
        let (status, body) = get_json(app(&tmp), "/api/projects").await;
        assert_eq!(status, StatusCode::OK);
        let projects = body.as_array().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0]["id"], "C--Users-me-demo");
        assert_eq!(projects[0]["displayName"], "C:/Users/me/demo");
        assert_eq!(projects[0]["sessionCount"], 1);
        assert_eq!(projects[0]["latestTimestamp"], "2025-06-01T10:00:02.000Z");
    }

    #[tokio::test]
    async fn list_sessions_endpoint() {
        let tmp = fixture();
        let (status, body) = get_json(app(&tmp), "/api/projects/C--Users-me-demo/sessions").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "s1");
        assert_eq!(body[0]["messageCount"], 2);
        assert_eq!(body[0]["preview"], "hello there");
        assert_eq!(body[0]["firstTimestamp"], "2025-06-01T10:00:00.000Z");
    }

    #[tokio::test]
    async fn list_sessions_unknown_project_is_404() {
        let tmp = fixture();
        let (status, body) = get_json(app(&tmp), "/api/projects/nope/sessions").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Project not found");
    }

    #[tokio::test]
    async fn get_session_endpoint() {
        let tmp = fixture();
        let (status, body) = get_json(app(&tmp), "/api/sessions/C--Users-me-demo/s1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][1]["responseTimeMs"], 2000);
        assert_eq!(body["stats"]["totalTokens"], 30);
        assert_eq!(body["stats"]["throughput"], 10.0);
        assert_eq!(body["stats"]["models"], serde_json::json!(["claude-sonnet-4"]));
    }

    #[tokio::test]
    async fn get_unknown_session_is_404() {
        let tmp = fixture();
        let (status, body) = get_json(app(&tmp), "/api/sessions/C--Users-me-demo/s2").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Session not found");
    }

    #[tokio::test]
    async fn missing_root_is_500_with_message() {
        let root = ProjectsRoot::new("/nonexistent/projects/root", Vec::new());
        let (status, body) = get_json(router(root, None), "/api/projects").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("/nonexistent/projects/root"));
    }

    #[tokio::test]
    async fn static_files_served_from_fallback() {
        let tmp = fixture();
        let public = TempDir::new().unwrap();
        std::fs::write(public.path().join("index.html"), "<h1>viewer</h1>").unwrap();
        let root = ProjectsRoot::new(tmp.path(), Vec::new());
        let app = router(root, Some(public.path()));

        let request = Request::builder()
            .uri("/index.html")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"<h1>viewer</h1>");
    }
}
