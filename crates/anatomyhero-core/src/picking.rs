//! Pointer picking: pixel -> ray -> nearest part, and drag-rectangle picking

use bevy_math::{Vec2, Vec3};

use crate::camera::{CameraView, Viewport};
use crate::part::{Part, PartId};

/// A pick result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub part: PartId,
    /// Distance along the pick ray
    pub distance: f32,
    /// World-space intersection point
    pub point: Vec3,
}

/// Nearest visible part under the pointer. Hidden parts are never hit.
pub fn pick<'a>(
    parts: impl IntoIterator<Item = &'a Part>,
    pixel: Vec2,
    viewport: &Viewport,
    camera: &CameraView,
) -> Option<PickHit> {
    pick_filtered(parts, pixel, viewport, camera, |p| p.visible)
}

/// Nearest part under the pointer regardless of visibility.
/// Annotation placement uses this: a note may land on any surface.
pub fn pick_any<'a>(
    parts: impl IntoIterator<Item = &'a Part>,
    pixel: Vec2,
    viewport: &Viewport,
    camera: &CameraView,
) -> Option<PickHit> {
    pick_filtered(parts, pixel, viewport, camera, |_| true)
}

fn pick_filtered<'a>(
    parts: impl IntoIterator<Item = &'a Part>,
    pixel: Vec2,
    viewport: &Viewport,
    camera: &CameraView,
    accept: impl Fn(&Part) -> bool,
) -> Option<PickHit> {
    let ray = camera.ray_through_pixel(pixel, viewport)?;

    let mut closest: Option<PickHit> = None;
    for part in parts.into_iter().filter(|p| accept(p)) {
        let Some(t) = part.ray_hit(&ray) else {
            continue;
        };
        if closest.map_or(true, |c| t < c.distance) {
            closest = Some(PickHit {
                part: part.id,
                distance: t,
                point: ray.get_point(t),
            });
        }
    }
    closest
}

/// Visible parts whose bounding-box centre projects inside the rectangle
/// spanned by two pixel corners. Centre containment only: a large part
/// whose centre lies outside is not matched even if it overlaps.
pub fn pick_rect<'a>(
    parts: impl IntoIterator<Item = &'a Part>,
    start: Vec2,
    end: Vec2,
    viewport: &Viewport,
    camera: &CameraView,
) -> Vec<PartId> {
    if viewport.is_empty() {
        return Vec::new();
    }
    let a = viewport.pixel_to_ndc(start);
    let b = viewport.pixel_to_ndc(end);
    let (min, max) = (a.min(b), a.max(b));

    parts
        .into_iter()
        .filter(|p| p.visible)
        .filter(|p| {
            camera
                .project_to_ndc(p.bounds.center())
                .map(|ndc| {
                    ndc.x >= min.x && ndc.x <= max.x && ndc.y >= min.y && ndc.y <= max.y
                })
                .unwrap_or(false)
        })
        .map(|p| p.id)
        .collect()
}

/// How a press-move-release gesture ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragEnd {
    /// Movement stayed under the threshold on both axes
    Click(Vec2),
    /// Both axes passed the threshold: a selection rectangle
    Rect(Vec2, Vec2),
    /// Moved along one axis only; neither a click nor a usable rectangle
    Moved,
}

/// Press-move-release tracking shared by click detection and the isolate
/// drag rectangle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DragRect {
    /// Pointer is down
    pub pending: bool,
    /// Moved past the threshold on at least one axis
    pub moved: bool,
    /// Past the threshold on both axes; a rectangle is being drawn
    pub active: bool,
    pub start: Vec2,
    pub current: Vec2,
}

impl DragRect {
    pub fn begin(&mut self, at: Vec2) {
        *self = DragRect {
            pending: true,
            start: at,
            current: at,
            ..Default::default()
        };
    }

    pub fn update(&mut self, at: Vec2, threshold: f32) {
        if !self.pending {
            return;
        }
        self.current = at;
        let delta = (self.current - self.start).abs();
        self.moved |= delta.x >= threshold || delta.y >= threshold;
        self.active = delta.x >= threshold && delta.y >= threshold;
    }

    /// Finish the gesture. None if no press was in progress.
    pub fn finish(&mut self, at: Vec2, threshold: f32) -> Option<DragEnd> {
        if !self.pending {
            return None;
        }
        self.update(at, threshold);
        let end = if self.active {
            DragEnd::Rect(self.start, self.current)
        } else if self.moved {
            DragEnd::Moved
        } else {
            DragEnd::Click(self.start)
        };
        self.cancel();
        Some(end)
    }

    pub fn cancel(&mut self) {
        *self = DragRect::default();
    }

    /// Top-left and bottom-right corners of the current rectangle
    pub fn corners(&self) -> (Vec2, Vec2) {
        (self.start.min(self.current), self.start.max(self.current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::Appearance;
    use crate::camera::CameraState;
    use crate::part::Aabb;

    fn part(id: u64, center: Vec3, visible: bool) -> Part {
        Part {
            id: PartId(id),
            name: format!("P{id}"),
            parent_name: None,
            system: "visceral".to_string(),
            visible,
            appearance: Appearance::default(),
            bounds: Aabb::from_center_half_extents(center, Vec3::splat(0.25)),
            surface: None,
        }
    }

    fn setup() -> (Viewport, CameraView) {
        let viewport = Viewport::new(800.0, 600.0);
        let view = CameraState::default().view(viewport.aspect());
        (viewport, view)
    }

    #[test]
    fn test_pick_nearest_wins() {
        let (viewport, view) = setup();
        let parts = vec![
            part(1, Vec3::new(0.0, 0.0, -1.0), true),
            part(2, Vec3::new(0.0, 0.0, 1.0), true),
        ];
        let hit = pick(&parts, Vec2::new(400.0, 300.0), &viewport, &view).unwrap();
        assert_eq!(hit.part, PartId(2));
        assert!((hit.point.z - 1.25).abs() < 1e-3);
    }

    #[test]
    fn test_hidden_parts_not_pickable() {
        let (viewport, view) = setup();
        let parts = vec![
            part(1, Vec3::new(0.0, 0.0, -1.0), true),
            part(2, Vec3::new(0.0, 0.0, 1.0), false),
        ];
        let hit = pick(&parts, Vec2::new(400.0, 300.0), &viewport, &view).unwrap();
        assert_eq!(hit.part, PartId(1));

        let any = pick_any(&parts, Vec2::new(400.0, 300.0), &viewport, &view).unwrap();
        assert_eq!(any.part, PartId(2));
    }

    #[test]
    fn test_pick_empty_scene_and_miss() {
        let (viewport, view) = setup();
        assert!(pick(&Vec::<Part>::new(), Vec2::new(400.0, 300.0), &viewport, &view).is_none());

        let parts = vec![part(1, Vec3::ZERO, true)];
        assert!(pick(&parts, Vec2::new(5.0, 5.0), &viewport, &view).is_none());
    }

    #[test]
    fn test_pick_rect_center_containment() {
        let (viewport, view) = setup();
        let parts = vec![
            part(1, Vec3::new(-0.5, 0.0, 0.0), true),
            part(2, Vec3::new(0.5, 0.0, 0.0), true),
            part(3, Vec3::new(3.0, 0.0, 0.0), true),
            part(4, Vec3::new(0.0, 0.0, 0.0), false),
        ];
        // Drag from bottom-right to top-left; corner order must not matter
        let ids = pick_rect(
            &parts,
            Vec2::new(500.0, 400.0),
            Vec2::new(300.0, 200.0),
            &viewport,
            &view,
        );
        assert_eq!(ids, vec![PartId(1), PartId(2)]);
    }

    #[test]
    fn test_drag_rect_threshold() {
        let mut drag = DragRect::default();
        assert_eq!(drag.finish(Vec2::ZERO, 4.0), None);

        drag.begin(Vec2::new(10.0, 10.0));
        drag.update(Vec2::new(12.0, 11.0), 4.0);
        assert!(!drag.moved);
        assert_eq!(
            drag.finish(Vec2::new(12.0, 11.0), 4.0),
            Some(DragEnd::Click(Vec2::new(10.0, 10.0)))
        );
        assert!(!drag.pending);

        drag.begin(Vec2::new(10.0, 10.0));
        drag.update(Vec2::new(12.0, 30.0), 4.0);
        assert!(drag.moved && !drag.active);
        assert_eq!(drag.finish(Vec2::new(12.0, 30.0), 4.0), Some(DragEnd::Moved));

        drag.begin(Vec2::new(10.0, 10.0));
        assert_eq!(
            drag.finish(Vec2::new(50.0, 60.0), 4.0),
            Some(DragEnd::Rect(Vec2::new(10.0, 10.0), Vec2::new(50.0, 60.0)))
        );
    }
}
