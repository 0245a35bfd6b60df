//! Backend communication: uploads, model downloads and the stored-model list

use bevy::prelude::*;
use meshview_core::{
    SelectedFile, SessionId, TransportError, TransportReply, UploadConfig, UploadError,
    UploadRequest, UploadTransport,
};
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::app::{Viewer, ViewerSettings};

pub struct TransportPlugin;

impl Plugin for TransportPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingUploads>()
            .init_resource::<StoredModels>()
            .init_resource::<PendingModelList>()
            .add_systems(
                Update,
                (apply_upload_results, fetch_stored_models, process_model_list),
            );
    }
}

/// Upload outcomes from async tasks, tagged with the session that started them
#[derive(Resource, Default, Clone)]
pub struct PendingUploads(pub Arc<Mutex<VecDeque<(SessionId, Result<String, UploadError>)>>>);

impl PendingUploads {
    fn push(&self, session: SessionId, result: Result<String, UploadError>) {
        if let Ok(mut queue) = self.0.lock() {
            queue.push_back((session, result));
        }
    }
}

/// Models already stored on the backend
#[derive(Resource, Default)]
pub struct StoredModels {
    pub models: Vec<String>,
    pub loading: bool,
    /// Session the list was last fetched for
    fetched_for: Option<SessionId>,
}

/// Model list response from the backend
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
struct ModelList {
    models: Vec<String>,
}

#[derive(Resource, Default)]
struct PendingModelList(Arc<Mutex<Option<Vec<String>>>>);

/// Performs uploads with the browser's fetch API
///
/// Each attempt races the request against a timer and aborts the request
/// when the timer wins.
#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
pub struct FetchTransport;

#[cfg(target_arch = "wasm32")]
impl UploadTransport for FetchTransport {
    async fn send(&self, request: &UploadRequest<'_>) -> Result<TransportReply, TransportError> {
        use futures_util::future::{select, Either};
        use gloo_net::http::Request;

        let form = multipart_form(request).map_err(TransportError::Network)?;
        let controller = web_sys::AbortController::new()
            .map_err(|e| TransportError::Network(format!("{:?}", e)))?;
        let signal = controller.signal();

        let exchange = async {
            let response = Request::post(&request.url)
                .abort_signal(Some(&signal))
                .body(form)
                .map_err(|e| TransportError::Network(e.to_string()))?
                .send()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;
            let status = response.status();
            let body = response
                .binary()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;
            Ok(TransportReply { status, body })
        };
        let deadline = gloo_timers::future::sleep(request.timeout);

        match select(Box::pin(exchange), Box::pin(deadline)).await {
            Either::Left((result, _)) => result,
            Either::Right(((), _)) => {
                controller.abort();
                Err(TransportError::TimedOut(request.timeout))
            }
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn multipart_form(request: &UploadRequest<'_>) -> Result<web_sys::FormData, String> {
    let bytes = js_sys::Uint8Array::from(request.content);
    let parts = js_sys::Array::of1(&bytes);
    let blob = web_sys::Blob::new_with_u8_array_sequence(&parts).map_err(|e| format!("{:?}", e))?;
    let form = web_sys::FormData::new().map_err(|e| format!("{:?}", e))?;
    form.append_with_blob_and_filename(request.field, &blob, request.file_name)
        .map_err(|e| format!("{:?}", e))?;
    Ok(form)
}

#[cfg(not(target_arch = "wasm32"))]
impl UploadTransport for FetchTransport {
    async fn send(&self, _request: &UploadRequest<'_>) -> Result<TransportReply, TransportError> {
        Err(TransportError::Network(
            "fetch transport requires a browser".to_string(),
        ))
    }
}

/// Start uploading a file for a session
pub fn spawn_upload(
    config: UploadConfig,
    session: SessionId,
    file: SelectedFile,
    pending: &PendingUploads,
) {
    let pending = pending.clone();

    #[cfg(target_arch = "wasm32")]
    wasm_bindgen_futures::spawn_local(async move {
        let client = meshview_core::UploadClient::new(config, FetchTransport);
        let result = client.upload(&file).await;
        pending.push(session, result);
    });

    #[cfg(not(target_arch = "wasm32"))]
    {
        tracing::warn!(file = %file.name, url = %config.upload_url(), "Uploads are not supported on this platform");
        pending.push(
            session,
            Err(UploadError::Network {
                attempts: 0,
                message: "fetch transport requires a browser".to_string(),
            }),
        );
    }
}

/// Download a stored model's bytes
#[cfg(target_arch = "wasm32")]
pub async fn fetch_model_bytes(url: &str) -> Result<Vec<u8>, String> {
    let response = gloo_net::http::Request::get(url)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !response.ok() {
        return Err(format!("HTTP {}", response.status()));
    }
    response.binary().await.map_err(|e| e.to_string())
}

/// Apply finished uploads to the viewer
fn apply_upload_results(pending: Res<PendingUploads>, mut viewer: ResMut<Viewer>) {
    let finished: Vec<_> = match pending.0.lock() {
        Ok(mut queue) => queue.drain(..).collect(),
        Err(_) => return,
    };

    for (session, result) in finished {
        viewer.0.upload_finished(session, result);
    }
}

/// Refresh the stored-model list each time the picker is shown
fn fetch_stored_models(
    viewer: Res<Viewer>,
    settings: Res<ViewerSettings>,
    pending: Res<PendingModelList>,
    mut stored: ResMut<StoredModels>,
) {
    let session = viewer.0.session();
    if !viewer.0.picker_visible() || stored.fetched_for == Some(session) {
        return;
    }
    stored.fetched_for = Some(session);
    stored.loading = true;

    let url = settings.upload().models_index_url();

    #[cfg(target_arch = "wasm32")]
    {
        use wasm_bindgen_futures::spawn_local;

        let pending_clone = pending.0.clone();

        spawn_local(async move {
            tracing::debug!("Fetching stored models from: {}", url);

            let models = match gloo_net::http::Request::get(&url).send().await {
                Ok(response) => match response.json::<ModelList>().await {
                    Ok(list) => list.models,
                    Err(e) => {
                        tracing::warn!("Invalid model list from {}: {}", url, e);
                        Vec::new()
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to fetch model list: {:?}", e);
                    Vec::new()
                }
            };

            if let Ok(mut data) = pending_clone.lock() {
                *data = Some(models);
            }
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        tracing::debug!("Skipping model list fetch from {}", url);
        if let Ok(mut data) = pending.0.lock() {
            *data = Some(Vec::new());
        }
    }
}

/// Process a fetched model list
fn process_model_list(pending: Res<PendingModelList>, mut stored: ResMut<StoredModels>) {
    if let Ok(mut data) = pending.0.lock() {
        if let Some(models) = data.take() {
            stored.models = models;
            stored.loading = false;
        }
    }
}
