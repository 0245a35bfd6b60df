//! REST API handlers

use axum::{
    extract::{Multipart, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{error, warn};

use crate::state::AppState;
use crate::storage::StoreError;

/// Multipart field carrying the model
const FILE_FIELD: &str = "file";

/// API error response
#[derive(Serialize)]
struct ApiError {
    error: String,
}

impl ApiError {
    fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }

    fn response(status: StatusCode, msg: impl Into<String>) -> Response {
        (status, Json(Self::new(msg))).into_response()
    }
}

#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    filename: String,
}

#[derive(Serialize)]
struct ModelList {
    models: Vec<String>,
}

/// Accept a multipart upload and store the `file` part
pub async fn upload_model(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut upload = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some(FILE_FIELD) {
                    continue;
                }
                let file_name = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => {
                        upload = Some((file_name, bytes));
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read upload body");
                        return ApiError::response(e.status(), e.body_text());
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Malformed multipart request");
                return ApiError::response(e.status(), e.body_text());
            }
        }
    }

    let Some((file_name, bytes)) = upload else {
        return ApiError::response(StatusCode::BAD_REQUEST, "No file part");
    };

    match state.store.save(&file_name, &bytes).await {
        Ok(filename) => (
            StatusCode::OK,
            Json(UploadResponse {
                message: "File uploaded successfully",
                filename,
            }),
        )
            .into_response(),
        Err(StoreError::EmptyName) => {
            ApiError::response(StatusCode::BAD_REQUEST, "No selected file")
        }
        Err(StoreError::NotAllowed(name)) => {
            warn!(file = %name, "Rejected upload with disallowed type");
            ApiError::response(StatusCode::BAD_REQUEST, "File type not allowed")
        }
        Err(e) => {
            error!(error = %e, "Failed to store upload");
            ApiError::response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store file")
        }
    }
}

/// Serve a stored model's raw bytes
pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    request: Request,
) -> Response {
    let path = match state.store.existing_path(&filename).await {
        Ok(path) => path,
        Err(StoreError::NotFound(_)) => {
            return ApiError::response(StatusCode::NOT_FOUND, "File not found")
        }
        Err(e) => {
            error!(error = %e, filename, "Failed to look up model");
            return ApiError::response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file");
        }
    };

    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// List stored models
pub async fn list_models(State(state): State<Arc<AppState>>) -> Response {
    match state.store.list().await {
        Ok(models) => Json(ModelList { models }).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to list models");
            ApiError::response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to list models")
        }
    }
}
