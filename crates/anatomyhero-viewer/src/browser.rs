//! Fullscreen and screenshot controls

use bevy::prelude::*;
use bevy::render::view::screenshot::{save_to_disk, Screenshot};
use tracing::info;

pub const SCREENSHOT_FILE: &str = "anatomyhero-screenshot.png";

/// Capture the primary window. In the browser the image is offered as a
/// download; natively it is written to the working directory.
pub fn take_screenshot(commands: &mut Commands) {
    info!(file = SCREENSHOT_FILE, "Taking screenshot");
    commands
        .spawn(Screenshot::primary_window())
        .observe(save_to_disk(SCREENSHOT_FILE));
}

/// Toggle fullscreen through the DOM fullscreen API
#[cfg(target_arch = "wasm32")]
pub fn toggle_fullscreen(_window: &mut Window) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        warn!("No document; fullscreen unavailable");
        return;
    };
    if document.fullscreen_element().is_some() {
        document.exit_fullscreen();
    } else if let Some(root) = document.document_element() {
        if let Err(e) = root.request_fullscreen() {
            warn!(error = ?e, "Fullscreen request rejected");
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn toggle_fullscreen(window: &mut Window) {
    use bevy::window::{MonitorSelection, WindowMode};

    window.mode = match window.mode {
        WindowMode::Windowed => WindowMode::BorderlessFullscreen(MonitorSelection::Current),
        _ => WindowMode::Windowed,
    };
}
