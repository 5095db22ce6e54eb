//! The viewer controller: one owned state object that every input path goes
//! through. Rendering layers read it; they never mutate parts directly.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use bevy_math::{Vec2, Vec3};
use tracing::{debug, info, warn};

use crate::annotation::{Annotation, AnnotationDraft, AnnotationPersistence, AnnotationStore};
use crate::camera::{CameraState, CameraView, Viewport};
use crate::config::ViewerConfig;
use crate::description::{
    Description, DescriptionCatalog, DescriptionError, DescriptionPanel, DescriptionRequests,
    DescriptionTicket,
};
use crate::loading::{LoadOutcome, LoadProgress, LoadUpdate};
use crate::material::MaterialStore;
use crate::mode::{InteractionMode, ModeController};
use crate::part::{Aabb, Part, PartId, SceneNode};
use crate::picking::{self, DragEnd, PickHit};
use crate::registry::SceneRegistry;
use crate::search::{SearchEntry, SearchIndex};
use crate::throttle::Throttle;

/// Something the UI may want to react to
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    ModeChanged(InteractionMode),
    FadeChanged(bool),
    HoverChanged(Option<PartId>),
    SelectionChanged(Option<PartId>),
    /// A description lookup should be started for this ticket
    DescriptionRequested(DescriptionTicket),
    VisibilityChanged,
    CameraFramed(Aabb),
    /// An annotate-mode click hit a surface; the dialog should open
    AnnotationPending(Vec3),
    AnnotationSaved(Annotation),
    AnnotationDeleted(String),
    LoadProgress { system: String, update: LoadUpdate },
    SystemFailed { system: String, reason: String },
}

/// Subscriber to viewer events
pub trait ViewerObserver: Send + Sync {
    fn notify(&self, event: &ViewerEvent);
}

impl<F> ViewerObserver for F
where
    F: Fn(&ViewerEvent) + Send + Sync,
{
    fn notify(&self, event: &ViewerEvent) {
        self(event)
    }
}

/// Screen placement of an annotation label
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationLabel {
    pub id: String,
    pub title: String,
    pub pixel: Vec2,
}

const MAX_QUEUED_EVENTS: usize = 1024;

pub struct Viewer {
    config: ViewerConfig,
    registry: SceneRegistry,
    materials: MaterialStore,
    modes: ModeController,
    camera: CameraState,
    viewport: Viewport,
    hovered: Option<PartId>,
    selected: Option<PartId>,
    pending_annotation: Option<Vec3>,
    hover_throttle: Throttle,
    /// Last pointer position dropped by the hover throttle
    pending_hover: Option<Vec2>,
    descriptions: DescriptionRequests,
    catalog: DescriptionCatalog,
    annotations: AnnotationStore,
    progress: LoadProgress,
    observers: Vec<Box<dyn ViewerObserver>>,
    events: VecDeque<ViewerEvent>,
}

impl std::fmt::Debug for Viewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewer")
            .field("parts", &self.registry.len())
            .field("mode", &self.modes.mode())
            .field("fade", &self.modes.fade_active())
            .field("hovered", &self.hovered)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl Viewer {
    pub fn new(config: ViewerConfig, persistence: Box<dyn AnnotationPersistence>) -> Self {
        let catalog = if config.descriptions.use_local_catalog {
            DescriptionCatalog::builtin()
        } else {
            DescriptionCatalog::empty()
        };
        Self {
            materials: MaterialStore::new(config.appearance.levels()),
            hover_throttle: Throttle::new(config.interaction.hover_throttle()),
            pending_hover: None,
            annotations: AnnotationStore::open(persistence),
            registry: SceneRegistry::new(),
            modes: ModeController::new(),
            camera: CameraState::default(),
            viewport: Viewport::new(1280.0, 720.0),
            hovered: None,
            selected: None,
            pending_annotation: None,
            descriptions: DescriptionRequests::new(),
            catalog,
            progress: LoadProgress::new(),
            observers: Vec::new(),
            events: VecDeque::new(),
            config,
        }
    }

    // ---- accessors ----

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.registry.get(id)
    }

    pub fn materials(&self) -> &MaterialStore {
        &self.materials
    }

    pub fn mode(&self) -> InteractionMode {
        self.modes.mode()
    }

    pub fn fade_active(&self) -> bool {
        self.modes.fade_active()
    }

    pub fn hovered(&self) -> Option<PartId> {
        self.hovered
    }

    pub fn selected(&self) -> Option<PartId> {
        self.selected
    }

    pub fn pending_annotation(&self) -> Option<Vec3> {
        self.pending_annotation
    }

    pub fn description_panel(&self) -> &DescriptionPanel {
        self.descriptions.panel()
    }

    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    pub fn progress(&self) -> &LoadProgress {
        &self.progress
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    /// Orbit input from the rendering layer
    pub fn camera_mut(&mut self) -> &mut CameraState {
        &mut self.camera
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Resize notification; projections use the new size from now on
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn camera_view(&self) -> CameraView {
        self.camera.view(self.viewport.aspect())
    }

    /// Corners of the isolate rectangle currently being drawn
    pub fn drag_rect(&self) -> Option<(Vec2, Vec2)> {
        let drag = self.modes.drag();
        (self.modes.is(InteractionMode::Isolate) && drag.active).then(|| drag.corners())
    }

    // ---- events ----

    pub fn subscribe(&mut self, observer: Box<dyn ViewerObserver>) {
        self.observers.push(observer);
    }

    /// Take every event queued since the last call
    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        self.events.drain(..).collect()
    }

    fn emit(&mut self, event: ViewerEvent) {
        for observer in &self.observers {
            observer.notify(&event);
        }
        if self.events.len() >= MAX_QUEUED_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    // ---- loading ----

    /// Announce how many systems are about to load
    pub fn begin_loading(&mut self, systems: usize) {
        self.progress.expect(systems);
    }

    /// Bring a freshly registered part under material control. Resting
    /// opacity is applied before the baseline is captured.
    fn adopt_part(&mut self, id: PartId, visible: bool) {
        let resting = self.materials.levels().resting_opacity;
        let Some(part) = self.registry.get_mut(id) else {
            return;
        };
        part.appearance = part.appearance.with_opacity(resting);
        self.materials.capture_baseline(part);
        // Arrivals during isolate keep their own visibility both now and on exit
        self.modes.set_restored_visibility(id, visible);
        self.restyle(id);
    }

    /// A system's scene finished loading. Its parts start hidden.
    pub fn system_loaded(&mut self, system: &str, root: &SceneNode) -> Vec<PartId> {
        let ids = self.registry.register_tree(root, system, false);
        for &id in &ids {
            self.adopt_part(id, false);
        }
        let update = self
            .progress
            .record(system, &LoadOutcome::Loaded { parts: ids.len() });
        info!(system = %system, parts = ids.len(), "System registered");
        self.emit(ViewerEvent::LoadProgress {
            system: system.to_string(),
            update,
        });
        ids
    }

    pub fn system_failed(&mut self, system: &str, reason: &str) -> LoadUpdate {
        let update = self.progress.record(
            system,
            &LoadOutcome::Failed {
                reason: reason.to_string(),
            },
        );
        self.emit(ViewerEvent::SystemFailed {
            system: system.to_string(),
            reason: reason.to_string(),
        });
        self.emit(ViewerEvent::LoadProgress {
            system: system.to_string(),
            update,
        });
        update
    }

    // ---- appearance ----

    /// Write the appearance a part should have for the current state
    fn restyle(&mut self, id: PartId) {
        let fade = self.modes.fade_active();
        let rest = self.materials.rest_opacity(fade);
        let (selected, hovered) = (self.selected, self.hovered);
        let Some(part) = self.registry.get_mut(id) else {
            return;
        };
        if selected == Some(id) {
            self.materials.apply_select(part);
        } else if hovered == Some(id) {
            self.materials.apply_hover(part, fade);
        } else {
            self.materials.clear_to_baseline(part, Some(rest));
        }
    }

    fn restyle_all(&mut self) {
        let ids: Vec<PartId> = self.registry.all_parts().map(|p| p.id).collect();
        for id in ids {
            self.restyle(id);
        }
    }

    // ---- pointer input ----

    fn pick_visible(&self, pixel: Vec2) -> Option<PickHit> {
        picking::pick(self.registry.all_parts(), pixel, &self.viewport, &self.camera_view())
    }

    pub fn pointer_down(&mut self, pixel: Vec2) {
        self.pending_hover = None;
        self.modes.drag_mut().begin(pixel);
    }

    /// Pointer motion at `now` on the caller's clock. Hover picking is
    /// throttled and skipped while a button is held or in isolate mode.
    /// A throttled position is kept and picked later by [`Viewer::tick`].
    pub fn pointer_moved(&mut self, pixel: Vec2, now: Duration) {
        if self.modes.drag().pending {
            let threshold = self.config.interaction.drag_threshold_px;
            self.modes.drag_mut().update(pixel, threshold);
            return;
        }
        if self.modes.is(InteractionMode::Isolate) {
            return;
        }
        self.pending_hover = Some(pixel);
        self.tick(now);
    }

    /// Pick the last throttled pointer position once the throttle allows,
    /// so hover follows a pointer that stopped moving. Call every frame.
    pub fn tick(&mut self, now: Duration) {
        let Some(pixel) = self.pending_hover else {
            return;
        };
        if self.modes.drag().pending || self.modes.is(InteractionMode::Isolate) {
            self.pending_hover = None;
            return;
        }
        if !self.hover_throttle.ready(now) {
            return;
        }
        self.pending_hover = None;
        let hit = self.pick_visible(pixel).map(|h| h.part);
        self.set_hovered(hit);
    }

    /// Pointer left the canvas
    pub fn pointer_left(&mut self) {
        self.pending_hover = None;
        self.modes.drag_mut().cancel();
        self.set_hovered(None);
    }

    pub fn pointer_up(&mut self, pixel: Vec2) {
        let threshold = self.config.interaction.drag_threshold_px;
        match self.modes.drag_mut().finish(pixel, threshold) {
            Some(DragEnd::Click(at)) => self.click(at),
            Some(DragEnd::Rect(start, end)) if self.modes.is(InteractionMode::Isolate) => {
                self.isolate_rect(start, end);
            }
            _ => {}
        }
    }

    fn set_hovered(&mut self, next: Option<PartId>) {
        if next == self.hovered {
            return;
        }
        let previous = std::mem::replace(&mut self.hovered, next);
        if let Some(prev) = previous {
            self.restyle(prev);
        }
        if let Some(id) = next {
            self.restyle(id);
        }
        self.emit(ViewerEvent::HoverChanged(next));
    }

    /// A click (or tap) at a pixel, dispatched by mode
    pub fn click(&mut self, pixel: Vec2) {
        match self.modes.mode() {
            InteractionMode::Normal => match self.pick_visible(pixel) {
                Some(hit) => self.select(hit.part),
                None => self.reset_selection(),
            },
            InteractionMode::Annotate => {
                let view = self.camera_view();
                if let Some(hit) =
                    picking::pick_any(self.registry.all_parts(), pixel, &self.viewport, &view)
                {
                    debug!(point = ?hit.point, "Annotation point picked");
                    self.pending_annotation = Some(hit.point);
                    self.emit(ViewerEvent::AnnotationPending(hit.point));
                }
            }
            InteractionMode::Isolate => {}
        }
    }

    // ---- selection ----

    fn select(&mut self, id: PartId) {
        let previous = self.selected.replace(id);
        if let Some(prev) = previous.filter(|p| *p != id) {
            self.restyle(prev);
        }
        self.restyle(id);
        info!(part = %id, "Part selected");
        self.emit(ViewerEvent::SelectionChanged(Some(id)));
        self.request_description(id);
    }

    fn request_description(&mut self, id: PartId) {
        let Some(name) = self.registry.get(id).map(|p| p.display_name().to_string()) else {
            return;
        };
        let ticket = self.descriptions.begin(&name);
        self.emit(ViewerEvent::DescriptionRequested(ticket));
    }

    /// Select a part chosen from search results, showing its system first
    pub fn select_part(&mut self, id: PartId) -> bool {
        let Some((system, visible)) = self.registry.get(id).map(|p| (p.system.clone(), p.visible))
        else {
            warn!(part = %id, "Cannot select unknown part");
            return false;
        };
        if !visible {
            self.set_system_visible(&system, true);
            if let Some(part) = self.registry.get_mut(id) {
                part.visible = true;
            }
        }
        self.select(id);
        true
    }

    /// Clear the selection and close the description panel. The part
    /// returns to its baseline even if the pointer is still over it.
    pub fn reset_selection(&mut self) {
        if let Some(prev) = self.selected.take() {
            if self.hovered == Some(prev) {
                self.hovered = None;
                self.emit(ViewerEvent::HoverChanged(None));
            }
            let rest = self.materials.rest_opacity(self.modes.fade_active());
            if let Some(part) = self.registry.get_mut(prev) {
                self.materials.clear_to_baseline(part, Some(rest));
            }
            info!(part = %prev, "Selection cleared");
            self.emit(ViewerEvent::SelectionChanged(None));
        }
        self.descriptions.close();
    }

    // ---- descriptions ----

    /// Bundled description for a name, if the local catalogue is enabled
    pub fn local_description(&self, name: &str) -> Option<Description> {
        self.catalog.lookup(name)
    }

    /// Apply a provider response; stale tickets are dropped
    pub fn resolve_description(
        &mut self,
        ticket: &DescriptionTicket,
        result: Result<Description, DescriptionError>,
    ) -> bool {
        self.descriptions.resolve(ticket, result)
    }

    pub fn close_description(&mut self) {
        self.descriptions.close();
    }

    // ---- modes ----

    pub fn toggle_fade(&mut self) {
        let active = self.modes.toggle_fade();
        self.restyle_all();
        self.emit(ViewerEvent::FadeChanged(active));
    }

    pub fn toggle_annotate(&mut self) {
        let was_isolating = self.modes.is(InteractionMode::Isolate);
        self.modes
            .toggle_annotate(&mut self.registry, &mut self.camera);
        if !self.modes.is(InteractionMode::Annotate) {
            self.pending_annotation = None;
        }
        self.emit(ViewerEvent::ModeChanged(self.modes.mode()));
        if was_isolating {
            self.emit(ViewerEvent::VisibilityChanged);
        }
    }

    pub fn toggle_isolate(&mut self) {
        self.pending_annotation = None;
        self.modes
            .toggle_isolate(&mut self.registry, &mut self.camera);
        if self.modes.is(InteractionMode::Isolate) {
            self.set_hovered(None);
        }
        self.emit(ViewerEvent::ModeChanged(self.modes.mode()));
        self.emit(ViewerEvent::VisibilityChanged);
    }

    /// Show exactly the visible parts whose centres fall in the rectangle,
    /// frame them and describe the first. An empty match changes nothing.
    pub fn isolate_rect(&mut self, start: Vec2, end: Vec2) -> Vec<PartId> {
        if !self.modes.is(InteractionMode::Isolate) {
            return Vec::new();
        }
        let view = self.camera_view();
        let matched = picking::pick_rect(self.registry.all_parts(), start, end, &self.viewport, &view);
        if matched.is_empty() {
            debug!("Isolate rectangle matched no parts");
            return matched;
        }

        let keep: HashSet<PartId> = matched.iter().copied().collect();
        for part in self.registry.all_parts_mut() {
            part.visible = keep.contains(&part.id);
        }
        info!(parts = matched.len(), "Isolated parts");
        self.emit(ViewerEvent::VisibilityChanged);

        if let Some(prev) = self.selected.filter(|id| !keep.contains(id)) {
            self.selected = None;
            self.restyle(prev);
            debug!(part = %prev, "Selection dropped by isolate");
            self.emit(ViewerEvent::SelectionChanged(None));
        }

        if let Some(bounds) = self.registry.bounds_of(&matched) {
            self.camera.frame(&bounds);
            self.emit(ViewerEvent::CameraFramed(bounds));
        }
        self.request_description(matched[0]);
        matched
    }

    /// Full reset: initial mode, no fade, nothing selected, everything
    /// visible, camera back home
    pub fn reset_view(&mut self) {
        if self.modes.is(InteractionMode::Isolate) {
            self.modes
                .toggle_isolate(&mut self.registry, &mut self.camera);
        }
        self.modes.reset(&mut self.camera);
        self.pending_annotation = None;

        let had_selection = self.selected.take().is_some();
        let had_hover = self.hovered.take().is_some();
        self.descriptions.close();

        for part in self.registry.all_parts_mut() {
            part.visible = true;
        }
        self.restyle_all();
        self.camera.reset();
        info!("View reset");

        if had_selection {
            self.emit(ViewerEvent::SelectionChanged(None));
        }
        if had_hover {
            self.emit(ViewerEvent::HoverChanged(None));
        }
        self.emit(ViewerEvent::ModeChanged(InteractionMode::Normal));
        self.emit(ViewerEvent::FadeChanged(false));
        self.emit(ViewerEvent::VisibilityChanged);
    }

    // ---- systems ----

    fn apply_system_visibility(&mut self, system: &str, visible: bool) -> bool {
        let ids: Vec<PartId> = self.registry.system_parts(system).map(|p| p.id).collect();
        if ids.is_empty() {
            warn!(system = %system, "System not loaded yet");
            return false;
        }
        let isolating = self.modes.is(InteractionMode::Isolate);
        for id in ids {
            if isolating {
                self.modes.set_restored_visibility(id, visible);
            } else if let Some(part) = self.registry.get_mut(id) {
                part.visible = visible;
            }
        }
        true
    }

    fn drop_hidden_hover(&mut self) {
        let hidden = self
            .hovered
            .and_then(|id| self.registry.get(id))
            .is_some_and(|p| !p.visible);
        if hidden {
            self.set_hovered(None);
        }
    }

    /// Checkbox toggle for one system. During isolate this changes what is
    /// restored on exit rather than what is shown now.
    pub fn set_system_visible(&mut self, system: &str, visible: bool) {
        if self.apply_system_visibility(system, visible) {
            debug!(system = %system, visible, "System visibility changed");
            self.drop_hidden_hover();
            self.emit(ViewerEvent::VisibilityChanged);
        }
    }

    /// Exclusive checkbox behaviour: this system on, every other off
    pub fn show_only_system(&mut self, system: &str) {
        let mut changed = false;
        for other in self.registry.systems() {
            changed |= self.apply_system_visibility(&other, other == system);
        }
        if changed {
            self.drop_hidden_hover();
            self.emit(ViewerEvent::VisibilityChanged);
        }
    }

    /// Whether any part of the system is currently shown
    pub fn is_system_visible(&self, system: &str) -> bool {
        self.registry.system_parts(system).any(|p| p.visible)
    }

    // ---- annotations ----

    /// Save the dialog contents at the pending point. Missing title,
    /// description or point makes this a no-op.
    pub fn save_annotation(&mut self, title: &str, description: &str) -> Option<Annotation> {
        let draft = AnnotationDraft {
            title: title.to_string(),
            description: description.to_string(),
            position: self.pending_annotation,
        };
        let saved = self.annotations.add(&draft)?;
        self.pending_annotation = None;
        self.emit(ViewerEvent::AnnotationSaved(saved.clone()));
        Some(saved)
    }

    pub fn cancel_annotation(&mut self) {
        self.pending_annotation = None;
    }

    pub fn delete_annotation(&mut self, id: &str) -> bool {
        if self.annotations.delete(id).is_some() {
            self.emit(ViewerEvent::AnnotationDeleted(id.to_string()));
            true
        } else {
            false
        }
    }

    /// Label positions for the current camera and viewport
    pub fn annotation_labels(&self) -> Vec<AnnotationLabel> {
        let view = self.camera_view();
        self.annotations
            .iter()
            .filter_map(|a| {
                view.world_to_pixel(a.world_position, &self.viewport)
                    .map(|pixel| AnnotationLabel {
                        id: a.id.clone(),
                        title: a.title.clone(),
                        pixel,
                    })
            })
            .collect()
    }

    // ---- search ----

    pub fn search(&self, query: &str) -> Vec<SearchEntry> {
        SearchIndex::build(&self.registry).query(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::MemoryPersistence;
    use crate::appearance::{rgb_from_hex, Appearance};
    use crate::part::Surface;
    use std::sync::{Arc, Mutex};

    const CENTER: Vec2 = Vec2::new(400.0, 300.0);
    const EMPTY: Vec2 = Vec2::new(5.0, 5.0);

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn organ(name: &str, center: Vec3) -> SceneNode {
        SceneNode::mesh(
            name,
            Appearance::with_color([0.7, 0.1, 0.1]),
            Aabb::from_center_half_extents(center, Vec3::splat(0.25)),
        )
    }

    fn viewer() -> Viewer {
        let mut viewer = Viewer::new(ViewerConfig::default(), Box::new(MemoryPersistence::new()));
        viewer.set_viewport(Viewport::new(800.0, 600.0));
        viewer
    }

    /// Heart at the centre, lungs either side, liver far off to the right
    fn loaded_viewer() -> (Viewer, Vec<PartId>) {
        let mut viewer = viewer();
        viewer.begin_loading(1);
        let tree = SceneNode::group(
            "Viscera",
            vec![
                organ("Heart", Vec3::ZERO),
                organ("Left Lung", Vec3::new(-0.5, 0.0, -1.0)),
                organ("Right Lung", Vec3::new(0.5, 0.0, -1.0)),
                organ("Liver", Vec3::new(3.0, 0.0, 0.0)),
            ],
        );
        let ids = viewer.system_loaded("visceral", &tree);
        viewer.set_system_visible("visceral", true);
        viewer.drain_events();
        (viewer, ids)
    }

    fn opacity(viewer: &Viewer, id: PartId) -> f32 {
        viewer.part(id).unwrap().appearance.opacity
    }

    #[test]
    fn test_parts_load_hidden_with_resting_baseline() {
        let mut viewer = viewer();
        let ids = viewer.system_loaded("visceral", &organ("Heart", Vec3::ZERO));
        let part = viewer.part(ids[0]).unwrap();
        assert!(!part.visible);
        assert_eq!(part.appearance.opacity, 0.8);
        assert!(part.appearance.transparent);
        assert_eq!(viewer.materials().baseline(ids[0]).unwrap().opacity, 0.8);
    }

    #[test]
    fn test_out_of_order_loads() {
        let mut viewer = viewer();
        viewer.begin_loading(2);

        let muscles = SceneNode::mesh("Biceps", Appearance::with_color([0.8, 0.2, 0.2]), Aabb::new(Vec3::ZERO, Vec3::ONE));
        let bones = SceneNode::mesh("Femur", Appearance::with_color([0.9, 0.9, 0.8]), Aabb::new(Vec3::ZERO, Vec3::ONE));

        let biceps = viewer.system_loaded("muscular", &muscles)[0];
        assert!(!viewer.progress().is_finished());
        let femur = viewer.system_loaded("skeletal", &bones)[0];

        let finished: Vec<LoadUpdate> = viewer
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                ViewerEvent::LoadProgress { update, .. } => Some(update),
                _ => None,
            })
            .collect();
        assert_eq!(finished.len(), 2);
        assert_eq!(finished.iter().filter(|u| u.finished).count(), 1);
        assert_eq!(finished[1].percent, 100);

        assert_eq!(viewer.materials().baseline(biceps).unwrap().base_color, [0.8, 0.2, 0.2]);
        assert_eq!(viewer.materials().baseline(femur).unwrap().base_color, [0.9, 0.9, 0.8]);
        assert_eq!(viewer.part(femur).unwrap().system, "skeletal");
    }

    #[test]
    fn test_failed_system_still_finishes() {
        let mut viewer = viewer();
        viewer.begin_loading(2);
        viewer.system_failed("nervous", "404");
        viewer.system_loaded("skeletal", &organ("Skull", Vec3::ZERO));
        assert!(viewer.progress().is_finished());
        assert_eq!(viewer.progress().failures().len(), 1);
    }

    #[test]
    fn test_click_heart_then_empty_space() {
        let (mut viewer, ids) = loaded_viewer();
        let heart = ids[0];

        viewer.click(CENTER);
        assert_eq!(viewer.selected(), Some(heart));
        let requested: Vec<String> = viewer
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                ViewerEvent::DescriptionRequested(t) => Some(t.name),
                _ => None,
            })
            .collect();
        assert_eq!(requested, vec!["Heart".to_string()]);
        assert_eq!(
            viewer.description_panel(),
            &DescriptionPanel::Loading {
                name: "Heart".to_string()
            }
        );

        viewer.click(EMPTY);
        assert_eq!(viewer.selected(), None);
        assert_eq!(viewer.description_panel(), &DescriptionPanel::Closed);
    }

    #[test]
    fn test_hidden_parts_are_not_clickable() {
        let (mut viewer, _) = loaded_viewer();
        viewer.set_system_visible("visceral", false);
        viewer.click(CENTER);
        assert_eq!(viewer.selected(), None);
    }

    #[test]
    fn test_pointer_up_without_motion_is_a_click() {
        let (mut viewer, ids) = loaded_viewer();
        viewer.pointer_down(CENTER);
        viewer.pointer_moved(CENTER + Vec2::new(1.0, 1.0), ms(0));
        viewer.pointer_up(CENTER + Vec2::new(1.0, 1.0));
        assert_eq!(viewer.selected(), Some(ids[0]));

        // An orbit drag is not a click
        viewer.pointer_down(EMPTY);
        viewer.pointer_moved(EMPTY + Vec2::new(80.0, 0.0), ms(10));
        viewer.pointer_up(EMPTY + Vec2::new(80.0, 0.0));
        assert_eq!(viewer.selected(), Some(ids[0]));
    }

    #[test]
    fn test_hover_never_overrides_selection() {
        let (mut viewer, ids) = loaded_viewer();
        let heart = ids[0];
        viewer.click(CENTER);
        let selected_look = viewer.part(heart).unwrap().appearance;
        assert_eq!(selected_look.emissive, rgb_from_hex(0x3399ff));

        viewer.pointer_moved(CENTER, ms(0));
        assert_eq!(viewer.hovered(), Some(heart));
        assert_eq!(viewer.part(heart).unwrap().appearance, selected_look);

        viewer.pointer_moved(EMPTY, ms(200));
        assert_eq!(viewer.hovered(), None);
        assert_eq!(viewer.part(heart).unwrap().appearance, selected_look);
    }

    #[test]
    fn test_hover_is_throttled_and_restores() {
        let (mut viewer, ids) = loaded_viewer();
        let heart = ids[0];

        viewer.pointer_moved(CENTER, ms(0));
        assert_eq!(viewer.hovered(), Some(heart));
        assert_eq!(viewer.part(heart).unwrap().appearance.emissive, rgb_from_hex(0x555555));

        // Within the interval: ignored
        viewer.pointer_moved(EMPTY, ms(50));
        assert_eq!(viewer.hovered(), Some(heart));

        viewer.pointer_moved(EMPTY, ms(150));
        assert_eq!(viewer.hovered(), None);
        let baseline = **viewer.materials().baseline(heart).unwrap();
        assert_eq!(viewer.part(heart).unwrap().appearance, baseline);
    }

    #[test]
    fn test_hover_settles_after_pointer_stops() {
        let (mut viewer, ids) = loaded_viewer();
        let heart = ids[0];

        viewer.pointer_moved(CENTER, ms(0));
        assert_eq!(viewer.hovered(), Some(heart));

        // Last move lands inside the interval and nothing follows it
        viewer.pointer_moved(EMPTY, ms(50));
        assert_eq!(viewer.hovered(), Some(heart));
        viewer.tick(ms(60));
        assert_eq!(viewer.hovered(), Some(heart));

        viewer.tick(ms(100));
        assert_eq!(viewer.hovered(), None);
        let baseline = **viewer.materials().baseline(heart).unwrap();
        assert_eq!(viewer.part(heart).unwrap().appearance, baseline);

        // Nothing pending: ticking is a no-op
        viewer.drain_events();
        viewer.tick(ms(500));
        assert!(viewer.drain_events().is_empty());
    }

    #[test]
    fn test_pointer_left_drops_pending_hover() {
        let (mut viewer, ids) = loaded_viewer();
        viewer.pointer_moved(EMPTY, ms(0));
        viewer.pointer_moved(CENTER, ms(50));
        viewer.pointer_left();
        viewer.tick(ms(200));
        assert_eq!(viewer.hovered(), None);
        assert_eq!(opacity(&viewer, ids[0]), 0.8);
    }

    #[test]
    fn test_baseline_stable_through_interaction() {
        let (mut viewer, ids) = loaded_viewer();
        let heart = ids[0];
        let original = viewer.materials().baseline(heart).unwrap().clone();
        let value = *original;

        for step in 0..4u64 {
            viewer.pointer_moved(CENTER, ms(step * 1000));
            viewer.click(CENTER);
            viewer.toggle_fade();
            viewer.pointer_moved(EMPTY, ms(step * 1000 + 500));
            viewer.reset_selection();
        }

        let after = viewer.materials().baseline(heart).unwrap();
        assert!(Arc::ptr_eq(&original, after));
        assert_eq!(**after, value);
    }

    #[test]
    fn test_reset_selection_is_idempotent() {
        let (mut viewer, ids) = loaded_viewer();
        viewer.click(CENTER);

        viewer.reset_selection();
        let snapshot = |v: &Viewer| {
            (
                v.selected(),
                v.hovered(),
                v.description_panel().clone(),
                v.registry().all_parts().map(|p| p.appearance).collect::<Vec<_>>(),
            )
        };
        let once = snapshot(&viewer);
        viewer.reset_selection();
        assert_eq!(snapshot(&viewer), once);
        assert_eq!(opacity(&viewer, ids[0]), 0.8);
    }

    #[test]
    fn test_reset_selection_under_pointer_restores_baseline() {
        let (mut viewer, ids) = loaded_viewer();
        let heart = ids[0];
        viewer.pointer_moved(CENTER, ms(0));
        viewer.click(CENTER);
        assert_eq!(viewer.selected(), Some(heart));
        assert_eq!(viewer.hovered(), Some(heart));
        viewer.drain_events();

        viewer.reset_selection();
        let baseline = **viewer.materials().baseline(heart).unwrap();
        assert_eq!(viewer.part(heart).unwrap().appearance, baseline);
        assert_eq!(opacity(&viewer, heart), 0.8);
        assert_eq!(viewer.hovered(), None);
        assert_eq!(
            viewer.drain_events(),
            vec![
                ViewerEvent::HoverChanged(None),
                ViewerEvent::SelectionChanged(None)
            ]
        );

        // Moving again over the part hovers it as usual
        viewer.pointer_moved(CENTER, ms(500));
        assert_eq!(viewer.hovered(), Some(heart));
        assert_eq!(viewer.part(heart).unwrap().appearance.emissive, rgb_from_hex(0x555555));
    }

    #[test]
    fn test_fade_round_trip() {
        let (mut viewer, ids) = loaded_viewer();
        let heart = ids[0];
        viewer.click(CENTER);

        viewer.toggle_fade();
        assert!(viewer.fade_active());
        assert_eq!(opacity(&viewer, heart), 1.0);
        for &id in &ids[1..] {
            assert_eq!(opacity(&viewer, id), 0.3);
        }

        viewer.toggle_fade();
        assert!(!viewer.fade_active());
        assert_eq!(opacity(&viewer, heart), 1.0);
        for &id in &ids[1..] {
            assert_eq!(opacity(&viewer, id), 0.8);
        }
    }

    #[test]
    fn test_isolate_without_drag_restores_visibility() {
        let (mut viewer, _) = loaded_viewer();
        viewer.system_loaded("skeletal", &organ("Skull", Vec3::new(0.0, 2.0, 0.0)));
        let before: Vec<bool> = viewer.registry().all_parts().map(|p| p.visible).collect();
        assert!(before.contains(&false));

        viewer.toggle_isolate();
        assert!(viewer.registry().all_parts().all(|p| p.visible));
        assert!(!viewer.camera().controls_enabled);
        viewer.click(CENTER);
        assert_eq!(viewer.selected(), None);

        viewer.toggle_isolate();
        let after: Vec<bool> = viewer.registry().all_parts().map(|p| p.visible).collect();
        assert_eq!(after, before);
        assert!(viewer.camera().controls_enabled);
    }

    #[test]
    fn test_isolate_drag_narrow_rect() {
        let (mut viewer, ids) = loaded_viewer();
        let left = ids[1];
        viewer.toggle_isolate();
        viewer.drain_events();

        // The left lung projects left of centre; the heart sits on it
        viewer.pointer_down(Vec2::new(300.0, 200.0));
        viewer.pointer_moved(Vec2::new(390.0, 400.0), ms(0));
        assert!(viewer.drag_rect().is_some());
        viewer.pointer_up(Vec2::new(390.0, 400.0));
        assert!(viewer.drag_rect().is_none());

        let visible: Vec<PartId> = viewer.registry().visible_parts().map(|p| p.id).collect();
        assert_eq!(visible, vec![left]);

        let events = viewer.drain_events();
        assert!(events.iter().any(|e| matches!(e, ViewerEvent::CameraFramed(_))));
        assert!(events
            .iter()
            .any(|e| matches!(e, ViewerEvent::DescriptionRequested(t) if t.name == "Left Lung")));
    }

    #[test]
    fn test_isolate_drops_selection_outside_rect() {
        let (mut viewer, ids) = loaded_viewer();
        let (heart, left) = (ids[0], ids[1]);
        viewer.click(CENTER);
        assert_eq!(viewer.selected(), Some(heart));
        viewer.toggle_isolate();
        viewer.drain_events();

        viewer.pointer_down(Vec2::new(300.0, 200.0));
        viewer.pointer_moved(Vec2::new(390.0, 400.0), ms(0));
        viewer.pointer_up(Vec2::new(390.0, 400.0));

        assert_eq!(viewer.selected(), None);
        let baseline = **viewer.materials().baseline(heart).unwrap();
        assert_eq!(viewer.part(heart).unwrap().appearance, baseline);
        let events = viewer.drain_events();
        assert!(events.contains(&ViewerEvent::SelectionChanged(None)));
        assert!(events
            .iter()
            .any(|e| matches!(e, ViewerEvent::DescriptionRequested(t) if t.name == "Left Lung")));
        assert_eq!(viewer.registry().visible_parts().map(|p| p.id).collect::<Vec<_>>(), vec![left]);
    }

    #[test]
    fn test_isolate_keeps_selection_inside_rect() {
        let (mut viewer, ids) = loaded_viewer();
        let heart = ids[0];
        viewer.click(CENTER);
        viewer.toggle_isolate();

        let matched = viewer.isolate_rect(Vec2::new(350.0, 250.0), Vec2::new(450.0, 350.0));
        assert!(matched.contains(&heart));
        assert_eq!(viewer.selected(), Some(heart));
        assert_eq!(viewer.part(heart).unwrap().appearance.emissive, rgb_from_hex(0x3399ff));
    }

    #[test]
    fn test_isolate_empty_rect_changes_nothing() {
        let (mut viewer, _) = loaded_viewer();
        viewer.toggle_isolate();
        let camera = viewer.camera().clone();
        let matched = viewer.isolate_rect(Vec2::new(0.0, 0.0), Vec2::new(60.0, 60.0));
        assert!(matched.is_empty());
        assert_eq!(viewer.registry().visible_parts().count(), 4);
        assert_eq!(viewer.camera(), &camera);
    }

    #[test]
    fn test_isolate_frames_exactly_two() {
        let mut viewer = viewer();
        let tree = SceneNode::group(
            "Body",
            vec![
                organ("Left Kidney", Vec3::new(-0.5, 0.0, 0.0)),
                organ("Right Kidney", Vec3::new(0.5, 0.0, 0.0)),
                organ("Liver", Vec3::new(3.0, 0.0, 0.0)),
                organ("Brain", Vec3::new(0.0, 2.0, 0.0)),
            ],
        );
        let ids = viewer.system_loaded("visceral", &tree);
        viewer.set_system_visible("visceral", true);
        viewer.toggle_isolate();

        viewer.pointer_down(Vec2::new(300.0, 200.0));
        viewer.pointer_moved(Vec2::new(500.0, 400.0), ms(0));
        viewer.pointer_up(Vec2::new(500.0, 400.0));

        let visible: Vec<PartId> = viewer.registry().visible_parts().map(|p| p.id).collect();
        assert_eq!(visible, vec![ids[0], ids[1]]);
        assert_eq!(viewer.camera().target, Vec3::ZERO);
        assert!(viewer.camera().distance < 5.0);
        assert_eq!(
            viewer.description_panel(),
            &DescriptionPanel::Loading {
                name: "Left Kidney".to_string()
            }
        );

        // Exit restores the pre-isolate visibility
        viewer.toggle_isolate();
        assert_eq!(viewer.registry().visible_parts().count(), 4);
    }

    #[test]
    fn test_reset_view() {
        let (mut viewer, ids) = loaded_viewer();
        viewer.click(CENTER);
        viewer.toggle_fade();
        viewer.set_system_visible("visceral", false);
        viewer.toggle_isolate();
        viewer.camera_mut().frame(&Aabb::new(Vec3::splat(5.0), Vec3::splat(6.0)));

        viewer.reset_view();
        assert_eq!(viewer.mode(), InteractionMode::Normal);
        assert!(!viewer.fade_active());
        assert_eq!(viewer.selected(), None);
        assert_eq!(viewer.hovered(), None);
        assert!(viewer.registry().all_parts().all(|p| p.visible));
        assert!(viewer.camera().controls_enabled);
        assert_eq!(viewer.camera().target, Vec3::ZERO);
        for id in ids {
            assert_eq!(opacity(&viewer, id), 0.8);
        }
    }

    #[test]
    fn test_show_only_system_and_isolate_snapshot() {
        let (mut viewer, ids) = loaded_viewer();
        let skull = viewer.system_loaded("skeletal", &organ("Skull", Vec3::new(0.0, 2.0, 0.0)))[0];

        viewer.show_only_system("skeletal");
        assert!(viewer.part(skull).unwrap().visible);
        assert!(!viewer.part(ids[0]).unwrap().visible);

        viewer.toggle_isolate();
        viewer.show_only_system("visceral");
        // Live state untouched while isolating
        assert!(viewer.part(skull).unwrap().visible);
        viewer.toggle_isolate();
        assert!(!viewer.part(skull).unwrap().visible);
        assert!(viewer.part(ids[0]).unwrap().visible);
    }

    #[test]
    fn test_search_select_shows_system() {
        let (mut viewer, _) = loaded_viewer();
        let skull = viewer.system_loaded("skeletal", &organ("Skull", Vec3::new(0.0, 2.0, 0.0)))[0];
        let results = viewer.search("sku");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].part, skull);

        assert!(viewer.select_part(skull));
        assert!(viewer.is_system_visible("skeletal"));
        assert_eq!(viewer.selected(), Some(skull));
        assert!(!viewer.select_part(PartId(9999)));
    }

    #[test]
    fn test_annotation_flow() {
        let (mut viewer, _) = loaded_viewer();
        viewer.set_system_visible("visceral", false);

        // No pending point yet: saving does nothing
        assert!(viewer.save_annotation("Note A", "test").is_none());

        viewer.toggle_annotate();
        viewer.click(CENTER);
        let point = viewer.pending_annotation().unwrap();
        assert_eq!(viewer.selected(), None);
        assert!((point.z - 0.25).abs() < 1e-3);

        assert!(viewer.save_annotation("", "test").is_none());
        let saved = viewer.save_annotation("Note A", "test").unwrap();
        assert_eq!(viewer.annotations().len(), 1);
        assert_eq!(saved.world_position, point);
        assert!(viewer.pending_annotation().is_none());

        let labels = viewer.annotation_labels();
        assert_eq!(labels.len(), 1);
        assert!((labels[0].pixel - CENTER).length() < 1.0);

        assert!(viewer.delete_annotation(&saved.id));
        assert!(viewer.annotations().is_empty());
        assert!(!viewer.delete_annotation(&saved.id));
    }

    /// Thin horizontal band in the plane `z`, split along its diagonal
    fn rib(y: f32, z: f32) -> [[Vec3; 3]; 2] {
        let a = Vec3::new(-0.8, y - 0.05, z);
        let b = Vec3::new(0.8, y - 0.05, z);
        let c = Vec3::new(0.8, y + 0.05, z);
        let d = Vec3::new(-0.8, y + 0.05, z);
        [[a, b, c], [a, c, d]]
    }

    /// Rib cage whose bounding box swallows the heart
    fn thorax_viewer() -> (Viewer, PartId, PartId) {
        let mut viewer = viewer();
        viewer.begin_loading(1);
        let triangles: Vec<[Vec3; 3]> = [(0.6, 0.8), (-0.6, 0.8), (0.6, -0.8), (-0.6, -0.8)]
            .into_iter()
            .flat_map(|(y, z)| rib(y, z))
            .collect();
        let ribs = SceneNode::mesh_with_surface(
            "Rib Cage",
            Appearance::with_color([0.9, 0.9, 0.8]),
            Surface::new(triangles),
        )
        .unwrap();
        let tree = SceneNode::group("Thorax", vec![ribs, organ("Heart", Vec3::ZERO)]);
        let ids = viewer.system_loaded("thorax", &tree);
        viewer.set_system_visible("thorax", true);
        viewer.drain_events();
        (viewer, ids[0], ids[1])
    }

    #[test]
    fn test_nested_part_selectable_between_ribs() {
        let (mut viewer, ribs, heart) = thorax_viewer();
        let cage = viewer.part(ribs).unwrap().bounds;
        assert!(cage.min.cmple(Vec3::splat(-0.25)).all());
        assert!(cage.max.cmpge(Vec3::splat(0.25)).all());

        viewer.click(CENTER);
        assert_eq!(viewer.selected(), Some(heart));

        let on_rib = Vec3::new(0.3, 0.6, 0.8);
        let pixel = viewer.camera_view().world_to_pixel(on_rib, viewer.viewport()).unwrap();
        viewer.click(pixel);
        assert_eq!(viewer.selected(), Some(ribs));
    }

    #[test]
    fn test_annotation_lands_on_surface() {
        let (mut viewer, _, _) = thorax_viewer();
        let on_rib = Vec3::new(0.3, 0.6, 0.8);
        let pixel = viewer.camera_view().world_to_pixel(on_rib, viewer.viewport()).unwrap();

        viewer.toggle_annotate();
        viewer.click(pixel);
        let point = viewer.pending_annotation().unwrap();
        assert!((point - on_rib).length() < 1e-3, "{point:?}");
    }

    #[test]
    fn test_stale_description_discarded() {
        let (mut viewer, _) = loaded_viewer();
        viewer.click(CENTER);
        viewer.click(EMPTY);
        let first = viewer
            .drain_events()
            .into_iter()
            .find_map(|e| match e {
                ViewerEvent::DescriptionRequested(t) => Some(t),
                _ => None,
            })
            .unwrap();
        viewer.click(CENTER);

        assert!(!viewer.resolve_description(&first, Ok(Description::new("Heart", "old"))));
    }

    #[test]
    fn test_observer_receives_events() {
        let (mut viewer, _) = loaded_viewer();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        viewer.subscribe(Box::new(move |e: &ViewerEvent| {
            if let Ok(mut v) = sink.lock() {
                v.push(e.clone());
            }
        }));

        viewer.toggle_annotate();
        viewer.toggle_fade();
        let seen = seen.lock().unwrap();
        assert!(seen.contains(&ViewerEvent::ModeChanged(InteractionMode::Annotate)));
        assert!(seen.contains(&ViewerEvent::FadeChanged(true)));
    }
}
