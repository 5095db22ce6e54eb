//! Mouse, touch and keyboard input routed into the viewer state

use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_egui::EguiContexts;

use crate::state::ViewerState;

/// Pointer bookkeeping between frames
#[derive(Resource, Default)]
pub struct PointerTrack {
    /// Last cursor position forwarded to the viewer
    last_cursor: Option<Vec2>,
    /// Touch currently acting as the pointer
    touch: Option<u64>,
}

pub struct PointerPlugin;

impl Plugin for PointerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PointerTrack>()
            .add_systems(
                Update,
                (
                    (route_mouse, route_touch, flush_hover).chain(),
                    handle_escape,
                ),
            );
    }
}

/// Press, move and release of the left button become the viewer's pointer
/// gesture. Hover picking is throttled inside the viewer.
fn route_mouse(
    mut state: ResMut<ViewerState>,
    mut track: ResMut<PointerTrack>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    time: Res<Time>,
    mut contexts: EguiContexts,
) {
    if track.touch.is_some() {
        return;
    }
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input() || ctx.is_pointer_over_area())
        .unwrap_or(false);
    let cursor = windows.single().ok().and_then(|w| w.cursor_position());

    let Some(cursor) = cursor.filter(|_| !egui_wants_pointer) else {
        if track.last_cursor.take().is_some() {
            state.pointer_left();
        }
        return;
    };

    if mouse_button.just_pressed(MouseButton::Left) {
        state.pointer_down(cursor);
    }
    if track.last_cursor != Some(cursor) {
        state.pointer_moved(cursor, time.elapsed());
        track.last_cursor = Some(cursor);
    }
    if mouse_button.just_released(MouseButton::Left) {
        state.pointer_up(cursor);
    }
}

/// First finger down acts as the pointer. A tap that stays under the drag
/// threshold is a click; a longer drag orbits or draws the isolate box.
fn route_touch(
    mut state: ResMut<ViewerState>,
    mut track: ResMut<PointerTrack>,
    touches: Res<Touches>,
    time: Res<Time>,
    mut contexts: EguiContexts,
) {
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input())
        .unwrap_or(false);

    if track.touch.is_none() && !egui_wants_pointer {
        if let Some(touch) = touches.iter_just_pressed().next() {
            track.touch = Some(touch.id());
            state.pointer_down(touch.position());
        }
    }
    let Some(id) = track.touch else {
        return;
    };

    if touches.iter_just_canceled().any(|t| t.id() == id) {
        track.touch = None;
        state.pointer_left();
        return;
    }
    if let Some(touch) = touches.iter_just_released().find(|t| t.id() == id) {
        track.touch = None;
        state.pointer_up(touch.position());
        return;
    }
    // A second finger turns the gesture into a pinch
    if touches.iter().count() > 1 {
        track.touch = None;
        state.pointer_left();
        return;
    }
    if let Some(touch) = touches.get_pressed(id) {
        if touch.delta() != Vec2::ZERO {
            state.pointer_moved(touch.position(), time.elapsed());
        }
    }
}

/// A cursor that stops inside the throttle window still gets its hover
/// resolved once the window passes
fn flush_hover(mut state: ResMut<ViewerState>, time: Res<Time>) {
    state.tick(time.elapsed());
}

/// Escape clears the selection unless a text field has focus
fn handle_escape(
    mut state: ResMut<ViewerState>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mut contexts: EguiContexts,
) {
    let egui_wants_keyboard = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_keyboard_input())
        .unwrap_or(false);
    if keyboard.just_pressed(KeyCode::Escape) && !egui_wants_keyboard {
        state.reset_selection();
    }
}
