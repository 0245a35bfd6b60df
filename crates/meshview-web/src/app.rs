//! Bevy application setup

use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use bevy_picking::DefaultPickingPlugins;
use meshview_core::config::ViewerConfig;
use meshview_core::{UploadConfig, ViewerState};

use crate::file_picker::FilePickerPlugin;
use crate::scene::ScenePlugin;
use crate::transport::TransportPlugin;
use crate::ui::UiPlugin;

/// The page-level viewer state machine
#[derive(Resource, Debug)]
pub struct Viewer(pub ViewerState);

/// Backend address and upload policy for this page
#[derive(Resource, Debug, Clone)]
pub struct ViewerSettings(pub ViewerConfig);

impl ViewerSettings {
    /// Build settings from `?backend=` or fall back to the page's own origin
    #[cfg(target_arch = "wasm32")]
    pub fn from_browser() -> Self {
        let mut config = ViewerConfig::default();

        let Some(window) = web_sys::window() else {
            return Self(config);
        };
        let location = window.location();

        if let Some(backend) = location
            .search()
            .ok()
            .and_then(|search| meshview_core::config::parse_query_param(&search, "backend"))
        {
            tracing::info!("Using backend from URL parameter: {}", backend);
            config.upload = UploadConfig::from_backend_address(&backend);
        } else if let Ok(origin) = location.origin() {
            config.upload = UploadConfig::with_base_url(&origin);
        }

        Self(config)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_browser() -> Self {
        let mut config = ViewerConfig::default();
        if let Ok(backend) = std::env::var("MESHVIEW_BACKEND") {
            config.upload = UploadConfig::from_backend_address(&backend);
        }
        Self(config)
    }

    pub fn upload(&self) -> &UploadConfig {
        &self.0.upload
    }
}

/// Run the Bevy application
pub fn run() {
    let settings = ViewerSettings::from_browser();
    let viewer = Viewer(ViewerState::new(settings.0.default_color));

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.95, 0.95, 0.96))) // Light page background
        .insert_resource(settings)
        .insert_resource(viewer)
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Meshview - 3D Model Viewer".to_string(),
                canvas: Some("#meshview-canvas".to_string()),
                fit_canvas_to_parent: true,
                prevent_default_event_handling: false,
                ..default()
            }),
            ..default()
        }))
        // bevy_egui looks for bevy_picking::PickingPlugin, so picking is added first
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(EguiPlugin::default())
        .add_plugins(FilePickerPlugin)
        .add_plugins(TransportPlugin)
        .add_plugins(ScenePlugin)
        .add_plugins(UiPlugin)
        .run();
}
