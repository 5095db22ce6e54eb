//! Orbit camera driven by the core camera state

use anatomyhero_core::Viewport;
use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll, MouseScrollUnit};
use bevy::prelude::*;
use tracing::debug;
use bevy::window::PrimaryWindow;
use bevy_egui::EguiContexts;

use crate::state::ViewerState;

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Pixels of wheel travel treated as one scroll line
const PIXELS_PER_LINE: f32 = 100.0;

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_camera).add_systems(
            Update,
            (sync_viewport, orbit_camera, apply_camera_state).chain(),
        );
    }
}

fn spawn_camera(mut commands: Commands, state: Res<ViewerState>) {
    let camera = state.camera();
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: camera.fov_y,
            near: camera.near,
            far: camera.far,
            ..default()
        }),
        Transform::from_translation(camera.position()).looking_at(camera.target, Vec3::Y),
        AmbientLight::default(),
        MainCamera,
    ));
}

/// Keep the core viewport in step with the window so picking and label
/// projection use the current size
fn sync_viewport(
    mut state: ResMut<ViewerState>,
    windows: Query<&Window, With<PrimaryWindow>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let viewport = Viewport::new(window.width(), window.height());
    if *state.viewport() != viewport {
        debug!(width = viewport.width, height = viewport.height, "Viewport resized");
        state.set_viewport(viewport);
    }
}

/// Mouse and touch gestures into orbit and zoom. The core ignores them
/// while controls are disabled (isolate mode).
fn orbit_camera(
    mut state: ResMut<ViewerState>,
    motion: Res<AccumulatedMouseMotion>,
    scroll: Res<AccumulatedMouseScroll>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    touches: Res<Touches>,
    mut contexts: EguiContexts,
) {
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input() || ctx.is_pointer_over_area())
        .unwrap_or(false);
    if egui_wants_pointer {
        return;
    }

    let camera = state.camera_mut();

    if mouse_button.pressed(MouseButton::Left) && motion.delta != Vec2::ZERO {
        camera.orbit(motion.delta);
    }

    let lines = match scroll.unit {
        MouseScrollUnit::Line => scroll.delta.y,
        MouseScrollUnit::Pixel => scroll.delta.y / PIXELS_PER_LINE,
    };
    if lines != 0.0 {
        camera.zoom(lines);
    }

    let active: Vec<_> = touches.iter().collect();
    match active.as_slice() {
        [touch] => {
            let delta = touch.delta();
            if delta != Vec2::ZERO {
                camera.orbit(delta);
            }
        }
        [a, b] => {
            let current = a.position().distance(b.position());
            let previous = (a.position() - a.delta()).distance(b.position() - b.delta());
            if current > 1.0 && previous > 1.0 && camera.zoom_speed > 0.0 {
                // A spreading pinch (ratio < 1) zooms in
                let ratio = previous / current;
                camera.zoom((1.0 - ratio) / camera.zoom_speed);
            }
        }
        _ => {}
    }
}

/// Write the core camera onto the bevy camera entity
fn apply_camera_state(
    state: Res<ViewerState>,
    mut camera_query: Query<(&mut Transform, &mut Projection), With<MainCamera>>,
) {
    if !state.is_changed() {
        return;
    }
    let Ok((mut transform, mut projection)) = camera_query.single_mut() else {
        return;
    };
    let camera = state.camera();
    *transform = Transform::from_translation(camera.position()).looking_at(camera.target, Vec3::Y);
    if let Projection::Perspective(perspective) = projection.as_mut() {
        perspective.fov = camera.fov_y;
        perspective.near = camera.near;
        perspective.far = camera.far;
    }
}
