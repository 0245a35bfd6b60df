//! Model file picker for WASM
//!
//! Files arrive from two places: a hidden `<input type="file">` opened from
//! the UI, and `drop` events anywhere on the page. Both read the first file
//! with a `FileReader` and queue it; a Bevy system then runs it through
//! [`accept_file`] and hands accepted files to the viewer and the uploader.
//!
//! Uses JavaScript interop for the browser file APIs.

use bevy::prelude::*;
use meshview_core::accept_file;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::app::{Viewer, ViewerSettings};
use crate::transport::{spawn_upload, PendingUploads};

/// File picker plugin
pub struct FilePickerPlugin;

impl Plugin for FilePickerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingPicks>()
            .init_resource::<DragHover>()
            .add_systems(Startup, install_drop_handlers)
            .add_systems(Update, process_picked_files);
    }
}

/// A file read in the browser, not yet accepted
#[derive(Debug, Clone)]
pub struct PickedFile {
    /// Filename (without path)
    pub name: String,
    /// File content; left empty for names that will be rejected anyway
    pub content: Vec<u8>,
}

/// Picked files from JavaScript callbacks
#[derive(Resource, Default, Clone)]
pub struct PendingPicks(pub Arc<Mutex<VecDeque<PickedFile>>>);

/// Whether a drag is currently hovering over the page
#[derive(Resource, Default, Clone)]
pub struct DragHover(pub Arc<AtomicBool>);

impl DragHover {
    pub fn is_hovering(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Accept queued files and start uploads
fn process_picked_files(
    pending: Res<PendingPicks>,
    settings: Res<ViewerSettings>,
    uploads: Res<PendingUploads>,
    mut viewer: ResMut<Viewer>,
) {
    let picked: Vec<PickedFile> = match pending.0.lock() {
        Ok(mut queue) => queue.drain(..).collect(),
        Err(_) => return,
    };

    for file in picked {
        if !viewer.0.picker_visible() {
            tracing::debug!(name = %file.name, "Picker hidden, ignoring file");
            continue;
        }

        match accept_file(&file.name, file.content) {
            Ok(selected) => {
                if let Some(session) = viewer.0.select_file(&selected) {
                    spawn_upload(settings.upload().clone(), session, selected, &uploads);
                }
            }
            Err(rejection) => viewer.0.reject(&rejection),
        }
    }
}

// ============================================================================
// JavaScript Interop (WASM only)
// ============================================================================

#[cfg(target_arch = "wasm32")]
mod js_interop {
    use super::*;
    use meshview_core::ModelFormat;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use web_sys::{DragEvent, File, FileReader, HtmlInputElement};

    /// Id of the hidden input shared by every dialog
    const FILE_INPUT_ID: &str = "meshview-file-input";

    /// Open a file picker dialog using a hidden HTML input element
    ///
    /// The input is created once and reused, so a cancelled dialog leaves
    /// nothing behind.
    pub fn open_file_dialog(pending: &PendingPicks) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            tracing::error!("open_file_dialog: no document");
            return;
        };

        let existing = document
            .get_element_by_id(FILE_INPUT_ID)
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok());
        let input = match existing {
            Some(input) => input,
            None => match create_file_input(&document, pending) {
                Some(input) => input,
                None => return,
            },
        };

        // Cleared so picking the same file again still fires change
        input.set_value("");
        input.click();
    }

    fn create_file_input(
        document: &web_sys::Document,
        pending: &PendingPicks,
    ) -> Option<HtmlInputElement> {
        let Some(input) = document
            .create_element("input")
            .ok()
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
        else {
            tracing::error!("open_file_dialog: failed to create input element");
            return None;
        };

        input.set_id(FILE_INPUT_ID);
        input.set_type("file");
        input.set_accept(&ModelFormat::accept_string());
        input.style().set_property("display", "none").ok();

        // Append to body - required for click() to work in many browsers
        let Some(body) = document.body() else {
            tracing::error!("open_file_dialog: no document body");
            return None;
        };
        if let Err(e) = body.append_child(&input) {
            tracing::error!("open_file_dialog: failed to append input: {:?}", e);
            return None;
        }

        let input_clone = input.clone();
        let queue = pending.0.clone();

        let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            if let Some(file) = input_clone.files().and_then(|files| files.get(0)) {
                read_file(file, queue.clone());
            }
        }) as Box<dyn FnMut(_)>);

        input.set_onchange(Some(closure.as_ref().unchecked_ref()));
        closure.forget();

        Some(input)
    }

    /// Listen for files dragged onto the page
    pub fn install_drop_handlers(pending: &PendingPicks, hover: &DragHover) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            tracing::error!("install_drop_handlers: no document");
            return;
        };

        // Without preventDefault on dragover the browser navigates to the file on drop
        let hover_over = hover.0.clone();
        let on_dragover = Closure::wrap(Box::new(move |event: DragEvent| {
            event.prevent_default();
            hover_over.store(true, Ordering::Relaxed);
        }) as Box<dyn FnMut(_)>);

        let hover_leave = hover.0.clone();
        let on_dragleave = Closure::wrap(Box::new(move |event: DragEvent| {
            event.prevent_default();
            hover_leave.store(false, Ordering::Relaxed);
        }) as Box<dyn FnMut(_)>);

        let hover_drop = hover.0.clone();
        let queue = pending.0.clone();
        let on_drop = Closure::wrap(Box::new(move |event: DragEvent| {
            event.prevent_default();
            hover_drop.store(false, Ordering::Relaxed);

            let file = event
                .data_transfer()
                .and_then(|transfer| transfer.files())
                .and_then(|files| files.get(0));
            if let Some(file) = file {
                read_file(file, queue.clone());
            }
        }) as Box<dyn FnMut(_)>);

        for (name, handler) in [
            ("dragover", &on_dragover),
            ("dragleave", &on_dragleave),
            ("drop", &on_drop),
        ] {
            if let Err(e) =
                document.add_event_listener_with_callback(name, handler.as_ref().unchecked_ref())
            {
                tracing::error!("install_drop_handlers: failed to add {} listener: {:?}", name, e);
            }
        }

        on_dragover.forget();
        on_dragleave.forget();
        on_drop.forget();
    }

    /// Read a file's bytes and queue it
    fn read_file(file: File, queue: Arc<Mutex<VecDeque<PickedFile>>>) {
        let name = file.name();

        // Unsupported names are queued without content so they can be reported
        if ModelFormat::from_file_name(&name).is_none() {
            push(&queue, PickedFile { name, content: Vec::new() });
            return;
        }

        let reader = match FileReader::new() {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("Failed to create FileReader: {:?}", e);
                return;
            }
        };
        let reader_clone = reader.clone();

        let onload = Closure::wrap(Box::new(move |_: web_sys::Event| {
            let content = match reader_clone.result() {
                Ok(result) => match result.dyn_into::<js_sys::ArrayBuffer>() {
                    Ok(buffer) => js_sys::Uint8Array::new(&buffer).to_vec(),
                    Err(_) => {
                        tracing::error!("File read did not produce an ArrayBuffer");
                        return;
                    }
                },
                Err(e) => {
                    tracing::error!("File read error: {:?}", e);
                    return;
                }
            };
            tracing::info!("File loaded: {} ({} bytes)", name, content.len());
            push(&queue, PickedFile { name: name.clone(), content });
        }) as Box<dyn FnMut(_)>);

        reader.set_onload(Some(onload.as_ref().unchecked_ref()));
        onload.forget();

        if let Err(e) = reader.read_as_array_buffer(&file) {
            tracing::error!("Failed to start file read: {:?}", e);
        }
    }

    fn push(queue: &Arc<Mutex<VecDeque<PickedFile>>>, file: PickedFile) {
        if let Ok(mut pending) = queue.lock() {
            pending.push_back(file);
        }
    }
}

// Non-WASM stubs
#[cfg(not(target_arch = "wasm32"))]
mod js_interop {
    use super::*;

    pub fn open_file_dialog(_pending: &PendingPicks) {
        tracing::warn!("File dialog not supported on this platform");
    }

    pub fn install_drop_handlers(_pending: &PendingPicks, _hover: &DragHover) {}
}

pub use js_interop::open_file_dialog;

fn install_drop_handlers(pending: Res<PendingPicks>, hover: Res<DragHover>) {
    js_interop::install_drop_handlers(&pending, &hover);
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::{ViewerPhase, ViewerState};

    fn test_app() -> App {
        let mut app = App::new();
        app.insert_resource(ViewerSettings(Default::default()))
            .insert_resource(Viewer(ViewerState::default()))
            .init_resource::<PendingPicks>()
            .init_resource::<PendingUploads>()
            .add_systems(Update, process_picked_files);
        app
    }

    fn queue(app: &App, name: &str) {
        let pending = app.world().resource::<PendingPicks>();
        pending.0.lock().unwrap().push_back(PickedFile {
            name: name.to_string(),
            content: b"solid x\nendsolid x\n".to_vec(),
        });
    }

    #[test]
    fn test_rejected_file_keeps_picker_open() {
        let mut app = test_app();
        queue(&app, "model.glb");
        app.update();

        let viewer = &app.world().resource::<Viewer>().0;
        assert_eq!(viewer.phase(), &ViewerPhase::NoFile);
        assert!(viewer.notice().unwrap().contains("model.glb"));
    }

    #[test]
    fn test_accepted_file_starts_upload() {
        let mut app = test_app();
        queue(&app, "Part.STL");
        app.update();

        let viewer = &app.world().resource::<Viewer>().0;
        assert_eq!(viewer.phase(), &ViewerPhase::Uploading);
        assert_eq!(viewer.file_name(), Some("Part.STL"));
    }

    #[test]
    fn test_only_first_of_burst_is_selected() {
        let mut app = test_app();
        queue(&app, "a.stl");
        queue(&app, "b.obj");
        app.update();

        let viewer = &app.world().resource::<Viewer>().0;
        assert_eq!(viewer.file_name(), Some("a.stl"));
    }
}
