//! Interaction mode state machine
//!
//! `Normal`, `Annotate` and `Isolate` are mutually exclusive; fade is an
//! independent flag that composes with any of them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::camera::CameraState;
use crate::part::PartId;
use crate::picking::DragRect;
use crate::registry::SceneRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionMode {
    #[default]
    Normal,
    /// Clicks place annotation points instead of selecting
    Annotate,
    /// Clicks are ignored; drag rectangles choose the visible subset
    Isolate,
}

impl std::fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InteractionMode::Normal => write!(f, "normal"),
            InteractionMode::Annotate => write!(f, "annotate"),
            InteractionMode::Isolate => write!(f, "isolate"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ModeController {
    mode: InteractionMode,
    fade_active: bool,
    /// Camera-control enablement at isolate entry
    saved_controls: Option<bool>,
    /// Visibility of every part at isolate entry
    original_visibility: HashMap<PartId, bool>,
    drag: DragRect,
}

impl ModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn fade_active(&self) -> bool {
        self.fade_active
    }

    pub fn is(&self, mode: InteractionMode) -> bool {
        self.mode == mode
    }

    pub fn drag(&self) -> &DragRect {
        &self.drag
    }

    pub fn drag_mut(&mut self) -> &mut DragRect {
        &mut self.drag
    }

    /// Flip the fade flag and return the new value
    pub fn toggle_fade(&mut self) -> bool {
        self.fade_active = !self.fade_active;
        info!(fade = self.fade_active, "Fade toggled");
        self.fade_active
    }

    /// Normal <-> Annotate. Leaving Isolate first if it is active.
    pub fn toggle_annotate(&mut self, registry: &mut SceneRegistry, camera: &mut CameraState) {
        match self.mode {
            InteractionMode::Annotate => self.set_mode(InteractionMode::Normal),
            InteractionMode::Isolate => {
                self.exit_isolate(registry, camera);
                self.set_mode(InteractionMode::Annotate);
            }
            InteractionMode::Normal => self.set_mode(InteractionMode::Annotate),
        }
    }

    /// Normal <-> Isolate. Leaving Annotate first if it is active.
    pub fn toggle_isolate(&mut self, registry: &mut SceneRegistry, camera: &mut CameraState) {
        if self.mode == InteractionMode::Isolate {
            self.exit_isolate(registry, camera);
        } else {
            self.enter_isolate(registry, camera);
        }
    }

    fn enter_isolate(&mut self, registry: &mut SceneRegistry, camera: &mut CameraState) {
        self.saved_controls = Some(camera.controls_enabled);
        camera.controls_enabled = false;

        self.original_visibility = registry
            .all_parts()
            .map(|p| (p.id, p.visible))
            .collect();
        for part in registry.all_parts_mut() {
            part.visible = true;
        }
        debug!(parts = self.original_visibility.len(), "Visibility snapshot taken");
        self.set_mode(InteractionMode::Isolate);
    }

    fn exit_isolate(&mut self, registry: &mut SceneRegistry, camera: &mut CameraState) {
        if let Some(enabled) = self.saved_controls.take() {
            camera.controls_enabled = enabled;
        }
        for part in registry.all_parts_mut() {
            if let Some(&visible) = self.original_visibility.get(&part.id) {
                part.visible = visible;
            }
        }
        self.original_visibility.clear();
        self.drag.cancel();
        self.set_mode(InteractionMode::Normal);
    }

    /// While isolating, record what a part's visibility should be once
    /// isolate ends. Returns false outside isolate.
    pub fn set_restored_visibility(&mut self, part: PartId, visible: bool) -> bool {
        if self.mode != InteractionMode::Isolate {
            return false;
        }
        self.original_visibility.insert(part, visible);
        true
    }

    /// Back to the initial state. Scene-wide visibility is the caller's job.
    pub fn reset(&mut self, camera: &mut CameraState) {
        if let Some(enabled) = self.saved_controls.take() {
            camera.controls_enabled = enabled;
        }
        self.original_visibility.clear();
        self.drag.cancel();
        self.fade_active = false;
        self.set_mode(InteractionMode::Normal);
    }

    fn set_mode(&mut self, mode: InteractionMode) {
        if self.mode != mode {
            info!(from = %self.mode, to = %mode, "Interaction mode changed");
            self.mode = mode;
        }
    }
}
