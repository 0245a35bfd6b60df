//! Meshview Web - Browser STL/OBJ viewer
//!
//! This crate provides the page users interact with: a drop zone and file
//! dialog, the upload to the backend, and the Bevy scene that renders the
//! returned model with orbit controls, wireframe and color settings.

mod app;
mod file_picker;
mod scene;
mod transport;
mod ui;

use wasm_bindgen::prelude::*;

/// Entry point for WASM module
#[wasm_bindgen(start)]
pub fn main() {
    // Set panic hook for better error messages
    console_error_panic_hook::set_once();

    // Initialize logging with filtering to reduce wgpu noise
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::WARN)
            .build()
    );

    // Run the Bevy app
    app::run();
}
