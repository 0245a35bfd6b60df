//! Viewer state machine
//!
//! ```text
//! NoFile    --select_file-->          Uploading
//! Uploading --upload_finished(Ok)-->  Viewing(model_url)
//! Uploading --upload_finished(Err)--> Error(message)
//! Viewing   --load_failed-->          Error(message)
//! Viewing   --new_model-->            NoFile
//! Error     --new_model-->            NoFile
//! Error     --select_file-->          Uploading
//! NoFile    --open_existing-->        Viewing(model_url)
//! ```
//!
//! Every selection starts a new session. Upload and load completions carry
//! the session they were started for and are dropped when it is no longer
//! current, so a late reply can never overwrite a newer selection.

use std::fmt;

use crate::color::Rgb;
use crate::format::ModelFormat;
use crate::framing::CameraFrame;
use crate::picker::{PickRejection, SelectedFile};
use crate::upload::UploadError;

/// Message shown when model bytes could not be decoded
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load model. The file may be corrupt.";

/// Monotonically increasing id of a viewing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionId(pub u64);

impl SessionId {
    fn next(self) -> Self {
        SessionId(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which sub-view the page shows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewerPhase {
    #[default]
    NoFile,
    Uploading,
    Viewing { model_url: String },
    Error { message: String },
}

impl ViewerPhase {
    pub fn name(&self) -> &'static str {
        match self {
            ViewerPhase::NoFile => "no-file",
            ViewerPhase::Uploading => "uploading",
            ViewerPhase::Viewing { .. } => "viewing",
            ViewerPhase::Error { .. } => "error",
        }
    }
}

/// Material parameters, independent of the loaded geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplaySettings {
    pub wireframe: bool,
    pub color: Rgb,
}

/// A model the scene should fetch and decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub session: SessionId,
    pub model_url: String,
    pub format: ModelFormat,
}

/// Page-level viewer state
#[derive(Debug, Clone, Default)]
pub struct ViewerState {
    phase: ViewerPhase,
    display: DisplaySettings,
    session: SessionId,
    file_name: Option<String>,
    format: Option<ModelFormat>,
    notice: Option<String>,
    pending_load: Option<LoadRequest>,
    camera_frame: Option<CameraFrame>,
    loads_issued: u64,
}

impl ViewerState {
    pub fn new(default_color: Rgb) -> Self {
        Self {
            display: DisplaySettings {
                wireframe: false,
                color: default_color,
            },
            ..Self::default()
        }
    }

    pub fn phase(&self) -> &ViewerPhase {
        &self.phase
    }

    pub fn display(&self) -> DisplaySettings {
        self.display
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Name of the file being uploaded or viewed
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn format(&self) -> Option<ModelFormat> {
        self.format
    }

    /// Non-blocking feedback, e.g. a rejected file type
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn model_url(&self) -> Option<&str> {
        match &self.phase {
            ViewerPhase::Viewing { model_url } => Some(model_url),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            ViewerPhase::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.phase == ViewerPhase::Uploading
    }

    /// The picker is offered whenever no upload is running and nothing is shown
    pub fn picker_visible(&self) -> bool {
        matches!(self.phase, ViewerPhase::NoFile | ViewerPhase::Error { .. })
    }

    /// Camera placement of the current model, once it has loaded
    pub fn camera_frame(&self) -> Option<CameraFrame> {
        self.camera_frame
    }

    /// Number of load requests queued since creation
    ///
    /// Diagnostics hook: reported by the scene with every load it starts.
    pub fn loads_issued(&self) -> u64 {
        self.loads_issued
    }

    /// Start a new session for an accepted file
    ///
    /// Returns the session the upload must report back with, or `None` while
    /// another upload is in flight.
    pub fn select_file(&mut self, file: &SelectedFile) -> Option<SessionId> {
        if self.is_uploading() {
            tracing::warn!(file = %file.name, "Ignoring file selection during upload");
            return None;
        }

        let session = self.begin_session(Some(file.name.clone()), Some(file.format));
        self.phase = ViewerPhase::Uploading;
        tracing::info!(%session, file = %file.name, "Uploading");
        Some(session)
    }

    /// View a model already stored on the backend, skipping the upload
    ///
    /// Like [`select_file`](Self::select_file), returns `Ok(None)` while an
    /// upload is in flight.
    pub fn open_existing(
        &mut self,
        filename: &str,
        model_url: String,
    ) -> Result<Option<SessionId>, PickRejection> {
        let format = ModelFormat::from_file_name(filename).ok_or_else(|| {
            PickRejection::UnsupportedExtension {
                name: filename.to_string(),
            }
        })?;
        if self.is_uploading() {
            tracing::warn!(filename, "Ignoring model selection during upload");
            return Ok(None);
        }

        let session = self.begin_session(Some(filename.to_string()), Some(format));
        self.enter_viewing(model_url);
        Ok(Some(session))
    }

    /// Record a rejected pick without changing phase
    pub fn reject(&mut self, rejection: &PickRejection) {
        tracing::info!(%rejection, "File rejected");
        self.notice = Some(rejection.to_string());
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    /// Apply an upload outcome; returns false when it was stale
    pub fn upload_finished(
        &mut self,
        session: SessionId,
        result: Result<String, UploadError>,
    ) -> bool {
        if session != self.session || !self.is_uploading() {
            tracing::debug!(%session, current = %self.session, "Dropping stale upload result");
            return false;
        }

        match result {
            Ok(model_url) => self.enter_viewing(model_url),
            Err(e) => {
                tracing::error!(%session, error = %e, "Upload failed");
                self.phase = ViewerPhase::Error {
                    message: e.user_message().to_string(),
                };
            }
        }
        true
    }

    /// Hand the pending load to the scene (at most once per session)
    pub fn take_load_request(&mut self) -> Option<LoadRequest> {
        self.pending_load.take()
    }

    /// Record the framing of a loaded model; returns false when stale
    pub fn load_finished(&mut self, session: SessionId, frame: CameraFrame) -> bool {
        if session != self.session || self.model_url().is_none() {
            tracing::debug!(%session, current = %self.session, "Dropping stale load result");
            return false;
        }
        self.camera_frame = Some(frame);
        true
    }

    /// Fetch or decode failure for the current model; returns false when stale
    pub fn load_failed(&mut self, session: SessionId, error: &dyn fmt::Display) -> bool {
        if session != self.session || self.model_url().is_none() {
            tracing::debug!(%session, current = %self.session, "Dropping stale load failure");
            return false;
        }
        tracing::error!(%session, %error, "Model load failed");
        self.phase = ViewerPhase::Error {
            message: LOAD_FAILED_MESSAGE.to_string(),
        };
        self.camera_frame = None;
        true
    }

    pub fn toggle_wireframe(&mut self) {
        self.display.wireframe = !self.display.wireframe;
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.display.color = color;
    }

    /// Frame the camera should return to
    pub fn reset_camera(&self) -> Option<CameraFrame> {
        self.camera_frame
    }

    /// Drop the current model or error and return to the picker
    pub fn new_model(&mut self) {
        let session = self.begin_session(None, None);
        self.phase = ViewerPhase::NoFile;
        tracing::info!(%session, "New model requested");
    }

    fn begin_session(
        &mut self,
        file_name: Option<String>,
        format: Option<ModelFormat>,
    ) -> SessionId {
        self.session = self.session.next();
        self.file_name = file_name;
        self.format = format;
        self.notice = None;
        self.pending_load = None;
        self.camera_frame = None;
        self.session
    }

    fn enter_viewing(&mut self, model_url: String) {
        if let Some(format) = self.format {
            self.pending_load = Some(LoadRequest {
                session: self.session,
                model_url: model_url.clone(),
                format,
            });
            self.loads_issued += 1;
        }
        tracing::info!(session = %self.session, url = %model_url, "Viewing");
        self.phase = ViewerPhase::Viewing { model_url };
    }
}
