//! Meshview Core - Model viewer logic shared by the frontend and the server
//!
//! This crate holds everything about viewing a model that does not touch the
//! browser or the renderer:
//! - File format detection and acceptance of user-picked files
//! - The upload client with retry/deadline handling behind a transport trait
//! - STL/OBJ decoding, normalization and camera framing
//! - The viewer state machine (no file, uploading, viewing, error)

pub mod color;
pub mod config;
pub mod format;
pub mod framing;
pub mod geometry;
pub mod picker;
pub mod upload;
pub mod viewer;

pub use color::{ColorParseError, Rgb};
pub use config::{UploadConfig, ViewerConfig};
pub use format::ModelFormat;
pub use framing::CameraFrame;
pub use geometry::{decode, decode_tagged, Aabb, DecodeError, MeshData};
pub use picker::{accept_file, PickRejection, SelectedFile};
pub use upload::{
    TransportError, TransportReply, UploadClient, UploadError, UploadRequest, UploadTransport,
    UPLOAD_FAILED_MESSAGE, UPLOAD_TIMEOUT_MESSAGE,
};
pub use viewer::{
    DisplaySettings, LoadRequest, SessionId, ViewerPhase, ViewerState, LOAD_FAILED_MESSAGE,
};
