//! Web server setup and routing

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::api;
use crate::state::AppState;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/upload", post(api::upload_model))
        .route("/models", get(api::list_models))
        .route("/models/{filename}", get(api::get_model))
        // Static files (WASM frontend)
        .fallback_service(ServeDir::new(&state.config.server.web_dir))
        .layer(DefaultBodyLimit::max(state.config.storage.max_upload_bytes))
        // The frontend may be served from a different origin during development
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the web server
pub async fn run(state: Arc<AppState>, bind: &str) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "meshviewtestboundary";

    async fn test_state(dir: &TempDir, unique_names: bool) -> Arc<AppState> {
        let mut config = Config::default();
        config.storage.upload_dir = dir.path().join("uploads").display().to_string();
        config.storage.unique_names = unique_names;
        config.server.web_dir = dir.path().join("web").display().to_string();
        AppState::new(config).await.unwrap()
    }

    fn multipart_body(field: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(field: &str, file_name: &str, content: &[u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(field, file_name, content)))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_upload_then_fetch() {
        let dir = TempDir::new().unwrap();
        let app = router(test_state(&dir, false).await);

        let response = app
            .clone()
            .oneshot(upload_request("file", "part.stl", b"solid part\nendsolid part\n"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["filename"], "part.stl");
        assert_eq!(body["message"], "File uploaded successfully");

        let response = app
            .clone()
            .oneshot(Request::get("/models/part.stl").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"solid part\nendsolid part\n");

        let response = app
            .oneshot(Request::get("/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(response).await["models"], serde_json::json!(["part.stl"]));
    }

    #[tokio::test]
    async fn test_upload_unique_name() {
        let dir = TempDir::new().unwrap();
        let app = router(test_state(&dir, true).await);

        let response = app
            .oneshot(upload_request("file", "part.stl", b"solid"))
            .await
            .unwrap();
        let name = json_body(response).await["filename"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(name.starts_with("part-"));
        assert!(name.ends_with(".stl"));
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let dir = TempDir::new().unwrap();
        let app = router(test_state(&dir, false).await);

        let response = app
            .clone()
            .oneshot(upload_request("file", "payload.exe", b"MZ"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "File type not allowed");

        let response = app
            .clone()
            .oneshot(upload_request("other", "part.stl", b"solid"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No file part");

        let response = app
            .oneshot(upload_request("file", "", b"solid"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No selected file");
    }

    #[tokio::test]
    async fn test_missing_model_is_404() {
        let dir = TempDir::new().unwrap();
        let app = router(test_state(&dir, false).await);

        let response = app
            .oneshot(Request::get("/models/nope.stl").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"], "File not found");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.upload_dir = dir.path().join("uploads").display().to_string();
        config.storage.max_upload_bytes = 1024;
        let app = router(AppState::new(config).await.unwrap());

        let response = app
            .oneshot(upload_request("file", "big.stl", &vec![b'x'; 4096]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
