//! 3D scene: camera, lights and the loaded model

use bevy::input::mouse::{MouseMotion, MouseWheel};
use bevy::prelude::*;
use meshview_core::{CameraFrame, DisplaySettings, MeshData, SessionId};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::app::Viewer;

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<OrbitCamera>()
            .init_resource::<PendingLoads>()
            .add_systems(Startup, setup_scene)
            .add_systems(
                Update,
                (
                    start_model_loads,
                    apply_model_loads,
                    clear_stale_model,
                    sync_model_display,
                )
                    .chain(),
            )
            .add_systems(Update, update_camera);
    }
}

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Marker for entities that belong to the loaded model
#[derive(Component)]
pub struct LoadedModel;

/// Marker for the wireframe (line list) rendition of the model
#[derive(Component)]
pub struct ModelWireframe;

/// Orbit camera around a target, Y up
#[derive(Resource, Debug, Clone)]
pub struct OrbitCamera {
    pub distance: f32,
    pub target_distance: f32, // For smooth zoom
    /// Angle around +Y measured from +Z toward +X
    pub azimuth: f32,
    pub elevation: f32,
    pub target: Vec3,
    pub target_focus: Vec3, // For smooth re-centering
    pub sensitivity: f32,
    pub zoom_speed: f32,
    pub smooth_factor: f32,
    /// Distance of the last framing; zoom and clipping planes scale with it
    pub frame_distance: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        let mut camera = Self {
            distance: 0.0,
            target_distance: 0.0,
            azimuth: 0.0,
            elevation: 0.0,
            target: Vec3::ZERO,
            target_focus: Vec3::ZERO,
            sensitivity: 0.005,
            zoom_speed: 0.1,
            smooth_factor: 0.15,
            frame_distance: 1.0,
        };
        camera.frame(&CameraFrame::default());
        camera
    }
}

impl OrbitCamera {
    /// Jump to a frame, discarding any in-progress smoothing
    pub fn frame(&mut self, frame: &CameraFrame) {
        let (azimuth, elevation) = frame.orbit_angles();
        let target = Vec3::from_array(frame.target);
        self.azimuth = azimuth;
        self.elevation = elevation;
        self.distance = frame.distance();
        self.target_distance = self.distance;
        self.target = target;
        self.target_focus = target;
        self.frame_distance = self.distance.max(f32::EPSILON);
    }

    /// Current eye position
    pub fn eye(&self) -> Vec3 {
        let offset = Vec3::new(
            self.azimuth.sin() * self.elevation.cos(),
            self.elevation.sin(),
            self.azimuth.cos() * self.elevation.cos(),
        );
        self.target + offset * self.distance
    }

    fn zoom_limits(&self) -> (f32, f32) {
        (self.frame_distance * 0.05, self.frame_distance * 10.0)
    }

    /// Clipping planes sized to the framed model
    pub fn clip_planes(&self) -> (f32, f32) {
        (self.frame_distance * 0.001, self.frame_distance * 100.0)
    }
}

/// Decoded meshes (or failures) from async loads, tagged with their session
#[derive(Resource, Default, Clone)]
pub struct PendingLoads(pub Arc<Mutex<VecDeque<(SessionId, Result<MeshData, String>)>>>);

impl PendingLoads {
    fn push(&self, session: SessionId, result: Result<MeshData, String>) {
        if let Ok(mut queue) = self.0.lock() {
            queue.push_back((session, result));
        }
    }
}

fn setup_scene(mut commands: Commands, orbit: Res<OrbitCamera>) {
    let (near, far) = orbit.clip_planes();
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            near,
            far,
            ..default()
        }),
        Transform::from_translation(orbit.eye()).looking_at(orbit.target, Vec3::Y),
        MainCamera,
    ));

    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 400.0,
        ..default()
    });

    // Key light from above and in front
    commands.spawn((
        DirectionalLight {
            illuminance: 6000.0,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(1.0, 2.0, 1.5).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // Fill light from the opposite side
    commands.spawn((
        DirectionalLight {
            illuminance: 2000.0,
            shadows_enabled: false,
            color: Color::srgb(0.9, 0.95, 1.0),
            ..default()
        },
        Transform::from_xyz(-1.5, -0.5, -1.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

/// Decode and normalize model bytes for display
pub fn prepare_mesh(format: meshview_core::ModelFormat, bytes: &[u8]) -> Result<MeshData, String> {
    let mut mesh = meshview_core::decode(format, bytes).map_err(|e| e.to_string())?;
    mesh.normalize();
    Ok(mesh)
}

/// Fetch and decode the model for a newly entered viewing session
fn start_model_loads(mut viewer: ResMut<Viewer>, pending: Res<PendingLoads>) {
    let Some(request) = viewer.0.take_load_request() else {
        return;
    };
    tracing::info!(
        session = %request.session,
        url = %request.model_url,
        loads = viewer.0.loads_issued(),
        "Loading model"
    );

    #[cfg(target_arch = "wasm32")]
    {
        let pending = pending.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let result = match crate::transport::fetch_model_bytes(&request.model_url).await {
                Ok(bytes) => prepare_mesh(request.format, &bytes),
                Err(e) => Err(format!("Failed to fetch {}: {}", request.model_url, e)),
            };
            pending.push(request.session, result);
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    pending.push(
        request.session,
        Err("model loading requires a browser".to_string()),
    );
}

/// Spawn finished models and frame the camera on them
fn apply_model_loads(
    mut commands: Commands,
    pending: Res<PendingLoads>,
    mut viewer: ResMut<Viewer>,
    mut orbit: ResMut<OrbitCamera>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    existing: Query<Entity, With<LoadedModel>>,
    mut projection: Query<&mut Projection, With<MainCamera>>,
) {
    let finished: Vec<_> = match pending.0.lock() {
        Ok(mut queue) => queue.drain(..).collect(),
        Err(_) => return,
    };

    for (session, result) in finished {
        let mesh = match result {
            Ok(mesh) => mesh,
            Err(e) => {
                viewer.0.load_failed(session, &e);
                continue;
            }
        };
        let Some(bounds) = mesh.bounds() else {
            viewer.0.load_failed(session, &"mesh has no vertices");
            continue;
        };

        let frame = CameraFrame::from_bounds(&bounds);
        if !viewer.0.load_finished(session, frame) {
            continue;
        }

        for entity in &existing {
            commands.entity(entity).despawn();
        }
        spawn_model(
            &mut commands,
            &mut meshes,
            &mut materials,
            &mesh,
            viewer.0.display(),
        );

        orbit.frame(&frame);
        if let Ok(mut projection) = projection.single_mut() {
            if let Projection::Perspective(perspective) = projection.as_mut() {
                (perspective.near, perspective.far) = orbit.clip_planes();
            }
        }

        tracing::info!(
            %session,
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            "Model displayed"
        );
    }
}

fn spawn_model(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    mesh: &MeshData,
    display: DisplaySettings,
) {
    let color = display_color(&display);

    let solid_material = materials.add(StandardMaterial {
        base_color: color,
        perceptual_roughness: 0.5,
        metallic: 0.5,
        double_sided: true,
        cull_mode: None,
        ..default()
    });
    commands.spawn((
        Mesh3d(meshes.add(solid_mesh(mesh))),
        MeshMaterial3d(solid_material),
        Transform::default(),
        solid_visibility(&display),
        LoadedModel,
    ));

    // Lines are unlit so they read clearly regardless of orientation
    let line_material = materials.add(StandardMaterial {
        base_color: color,
        unlit: true,
        ..default()
    });
    commands.spawn((
        Mesh3d(meshes.add(wireframe_mesh(mesh))),
        MeshMaterial3d(line_material),
        Transform::default(),
        wireframe_visibility(&display),
        LoadedModel,
        ModelWireframe,
    ));
}

fn display_color(display: &DisplaySettings) -> Color {
    let [r, g, b] = display.color.to_array();
    Color::srgb_u8(r, g, b)
}

fn solid_visibility(display: &DisplaySettings) -> Visibility {
    if display.wireframe {
        Visibility::Hidden
    } else {
        Visibility::Inherited
    }
}

fn wireframe_visibility(display: &DisplaySettings) -> Visibility {
    if display.wireframe {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    }
}

/// Triangle mesh with smooth normals
pub fn solid_mesh(mesh: &MeshData) -> Mesh {
    use bevy::asset::RenderAssetUsages;
    use bevy::mesh::Indices;
    use bevy::render::render_resource::PrimitiveTopology;

    let mut out = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, mesh.positions.clone())
        .with_inserted_indices(Indices::U32(mesh.indices.clone()));
    if mesh.has_normals() {
        out.insert_attribute(Mesh::ATTRIBUTE_NORMAL, mesh.normals.clone());
    } else {
        out.compute_smooth_normals();
    }
    out
}

/// Line list over every unique triangle edge
pub fn wireframe_mesh(mesh: &MeshData) -> Mesh {
    use bevy::asset::RenderAssetUsages;
    use bevy::mesh::Indices;
    use bevy::render::render_resource::PrimitiveTopology;

    Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, mesh.positions.clone())
        .with_inserted_indices(Indices::U32(mesh.edge_indices()))
}

/// Remove the model once its session is over
fn clear_stale_model(
    mut commands: Commands,
    viewer: Res<Viewer>,
    existing: Query<Entity, With<LoadedModel>>,
) {
    if viewer.0.camera_frame().is_some() {
        return;
    }
    for entity in &existing {
        commands.entity(entity).despawn();
    }
}

/// Apply wireframe and color changes to the loaded model
fn sync_model_display(
    viewer: Res<Viewer>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut parts: Query<
        (
            &mut Visibility,
            &MeshMaterial3d<StandardMaterial>,
            Has<ModelWireframe>,
        ),
        With<LoadedModel>,
    >,
    mut applied: Local<Option<DisplaySettings>>,
) {
    let display = viewer.0.display();
    if *applied == Some(display) {
        return;
    }
    *applied = Some(display);

    let color = display_color(&display);

    for (mut visibility, material, is_wireframe) in &mut parts {
        let wanted = if is_wireframe {
            wireframe_visibility(&display)
        } else {
            solid_visibility(&display)
        };
        visibility.set_if_neq(wanted);

        if let Some(material) = materials.get_mut(&material.0) {
            if material.base_color != color {
                material.base_color = color;
            }
        }
    }
}

fn update_camera(
    mut camera_query: Query<&mut Transform, With<MainCamera>>,
    mut orbit: ResMut<OrbitCamera>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut mouse_wheel: MessageReader<MouseWheel>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    time: Res<Time>,
    viewer: Res<Viewer>,
    mut contexts: bevy_egui::EguiContexts,
) {
    // Check if egui wants the mouse - if so, don't process camera controls
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input())
        .unwrap_or(false);
    let interactive = !egui_wants_pointer && viewer.0.camera_frame().is_some();

    let mut total_motion = Vec2::ZERO;
    for motion in mouse_motion.read() {
        total_motion += motion.delta;
    }

    // Orbit with left mouse drag
    if mouse_button.pressed(MouseButton::Left) && interactive {
        orbit.azimuth -= total_motion.x * orbit.sensitivity;
        orbit.elevation =
            (orbit.elevation + total_motion.y * orbit.sensitivity).clamp(-1.5, 1.5);
    }

    // Pan with right mouse drag in the camera's view plane
    if mouse_button.pressed(MouseButton::Right) && interactive {
        let right = Vec3::new(orbit.azimuth.cos(), 0.0, -orbit.azimuth.sin());
        let up = Vec3::Y;
        let pan_speed = orbit.distance * 0.002;
        let delta = (-right * total_motion.x + up * total_motion.y) * pan_speed;
        orbit.target_focus += delta;
    }

    let (min_distance, max_distance) = orbit.zoom_limits();
    if interactive {
        for scroll in mouse_wheel.read() {
            let zoom_factor = 1.0 - scroll.y * orbit.zoom_speed * 0.3;
            orbit.target_distance =
                (orbit.target_distance * zoom_factor).clamp(min_distance, max_distance);
        }
    } else {
        // Drain the scroll events even if we're not using them
        for _ in mouse_wheel.read() {}
    }

    // Touch support for mobile
    if touch_input.iter().count() == 1 && interactive {
        for touch in touch_input.iter() {
            let delta = touch.delta();
            if delta != Vec2::ZERO {
                orbit.azimuth -= delta.x * orbit.sensitivity;
                orbit.elevation =
                    (orbit.elevation + delta.y * orbit.sensitivity).clamp(-1.5, 1.5);
            }
        }
    }

    // Pinch to zoom
    if touch_input.iter().count() == 2 && interactive {
        let touches: Vec<_> = touch_input.iter().collect();
        if let (Some(t1), Some(t2)) = (touches.first(), touches.get(1)) {
            let curr_dist = t1.position().distance(t2.position());
            let prev_dist = (t1.position() - t1.delta()).distance(t2.position() - t2.delta());
            let zoom_factor = prev_dist / curr_dist.max(1.0);
            orbit.target_distance =
                (orbit.target_distance * zoom_factor).clamp(min_distance, max_distance);
        }
    }

    // Smooth interpolation for zoom and target
    let dt = time.delta_secs();
    let lerp_factor = 1.0 - (-orbit.smooth_factor * 60.0 * dt).exp();
    orbit.distance = orbit.distance + (orbit.target_distance - orbit.distance) * lerp_factor;
    orbit.target = orbit.target + (orbit.target_focus - orbit.target) * lerp_factor;

    if let Ok(mut transform) = camera_query.single_mut() {
        transform.translation = orbit.eye();
        transform.look_at(orbit.target, Vec3::Y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::{accept_file, ModelFormat, Rgb, ViewerState};

    const TETRA: &str = "solid t
facet normal 0 0 -1
 outer loop
  vertex 0 0 0
  vertex 0 2 0
  vertex 2 0 0
 endloop
endfacet
facet normal 0 -1 0
 outer loop
  vertex 0 0 0
  vertex 2 0 0
  vertex 0 0 2
 endloop
endfacet
facet normal -1 0 0
 outer loop
  vertex 0 0 0
  vertex 0 0 2
  vertex 0 2 0
 endloop
endfacet
facet normal 1 1 1
 outer loop
  vertex 2 0 0
  vertex 0 2 0
  vertex 0 0 2
 endloop
endfacet
endsolid t
";

    fn viewing_app() -> (App, SessionId) {
        let mut app = App::new();
        let mut viewer = ViewerState::new(Rgb::new(0x88, 0x88, 0x88));
        let file = accept_file("tetra.stl", TETRA.as_bytes().to_vec()).unwrap();
        let session = viewer.select_file(&file).unwrap();
        viewer.upload_finished(session, Ok("http://localhost:5001/models/tetra.stl".into()));

        app.insert_resource(Viewer(viewer))
            .init_resource::<OrbitCamera>()
            .init_resource::<PendingLoads>()
            .init_resource::<Assets<Mesh>>()
            .init_resource::<Assets<StandardMaterial>>()
            .add_systems(
                Update,
                (apply_model_loads, clear_stale_model, sync_model_display).chain(),
            );
        (app, session)
    }

    fn model_count(app: &mut App) -> usize {
        app.world_mut()
            .query_filtered::<Entity, With<LoadedModel>>()
            .iter(app.world())
            .count()
    }

    #[test]
    fn test_orbit_frame_reproduces_eye() {
        let frame = CameraFrame {
            eye: [4.0, 4.0, 4.0],
            target: [0.0, 0.0, 0.0],
        };
        let mut orbit = OrbitCamera::default();
        orbit.frame(&frame);

        let eye = orbit.eye();
        assert!((eye - Vec3::splat(4.0)).length() < 1e-4);
        assert!((orbit.frame_distance - 48f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn test_prepare_mesh_centers_model() {
        let mesh = prepare_mesh(ModelFormat::Stl, TETRA.as_bytes()).unwrap();
        let bounds = mesh.bounds().unwrap();
        for c in bounds.center() {
            assert!(c.abs() < 1e-5);
        }
        assert!(mesh.has_normals());
    }

    #[test]
    fn test_wireframe_mesh_has_unique_edges() {
        let mesh = prepare_mesh(ModelFormat::Stl, TETRA.as_bytes()).unwrap();
        let lines = wireframe_mesh(&mesh);
        assert_eq!(lines.indices().map(|i| i.len()), Some(mesh.edge_indices().len()));
        assert_eq!(
            solid_mesh(&mesh).indices().map(|i| i.len()),
            Some(mesh.indices.len())
        );
    }

    #[test]
    fn test_loaded_model_is_spawned_and_framed() {
        let (mut app, session) = viewing_app();
        let mesh = prepare_mesh(ModelFormat::Stl, TETRA.as_bytes()).unwrap();
        app.world().resource::<PendingLoads>().push(session, Ok(mesh));
        app.update();

        assert_eq!(model_count(&mut app), 2);
        let frame = app.world().resource::<Viewer>().0.camera_frame().unwrap();
        assert_eq!(frame.eye, [4.0, 4.0, 4.0]);
        let orbit = app.world().resource::<OrbitCamera>();
        assert!((orbit.eye() - Vec3::splat(4.0)).length() < 1e-4);
    }

    #[test]
    fn test_failed_load_shows_error_and_spawns_nothing() {
        let (mut app, session) = viewing_app();
        app.world()
            .resource::<PendingLoads>()
            .push(session, Err("bad bytes".to_string()));
        app.update();

        assert_eq!(model_count(&mut app), 0);
        assert_eq!(
            app.world().resource::<Viewer>().0.error(),
            Some(meshview_core::LOAD_FAILED_MESSAGE)
        );
    }

    #[test]
    fn test_new_model_removes_loaded_model() {
        let (mut app, session) = viewing_app();
        let mesh = prepare_mesh(ModelFormat::Stl, TETRA.as_bytes()).unwrap();
        app.world().resource::<PendingLoads>().push(session, Ok(mesh));
        app.update();
        assert_eq!(model_count(&mut app), 2);

        app.world_mut().resource_mut::<Viewer>().0.new_model();
        app.update();
        assert_eq!(model_count(&mut app), 0);
    }

    #[test]
    fn test_wireframe_toggle_swaps_visibility() {
        let (mut app, session) = viewing_app();
        let mesh = prepare_mesh(ModelFormat::Stl, TETRA.as_bytes()).unwrap();
        app.world().resource::<PendingLoads>().push(session, Ok(mesh));
        app.update();

        app.world_mut().resource_mut::<Viewer>().0.toggle_wireframe();
        app.update();

        let mut query = app
            .world_mut()
            .query_filtered::<(&Visibility, Has<ModelWireframe>), With<LoadedModel>>();
        for (visibility, is_wireframe) in query.iter(app.world()) {
            if is_wireframe {
                assert_eq!(*visibility, Visibility::Inherited);
            } else {
                assert_eq!(*visibility, Visibility::Hidden);
            }
        }
    }
}
