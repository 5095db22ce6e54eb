//! Orbit camera state and the projection math picking needs

use bevy_math::{Dir3, Mat4, Ray3d, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::part::Aabb;

/// Render viewport in device pixels. Pixel y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Pixel position to normalized device coordinates (-1..1, y up)
    pub fn pixel_to_ndc(&self, pixel: Vec2) -> Vec2 {
        Vec2::new(
            (pixel.x - self.x) / self.width * 2.0 - 1.0,
            1.0 - (pixel.y - self.y) / self.height * 2.0,
        )
    }

    pub fn ndc_to_pixel(&self, ndc: Vec2) -> Vec2 {
        Vec2::new(
            self.x + (ndc.x + 1.0) * 0.5 * self.width,
            self.y + (1.0 - ndc.y) * 0.5 * self.height,
        )
    }
}

/// Orbit camera: spherical coordinates around a target, Y up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub target: Vec3,
    pub distance: f32,
    /// Rotation around the Y axis, radians
    pub azimuth: f32,
    /// Angle above the horizontal plane, radians
    pub elevation: f32,
    /// Vertical field of view, radians
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    /// Whether user orbit/zoom input is applied
    pub controls_enabled: bool,
    pub sensitivity: f32,
    pub zoom_speed: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 5.0,
            azimuth: 0.0,
            elevation: 0.0,
            fov_y: 75f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            controls_enabled: true,
            sensitivity: 0.005,
            zoom_speed: 0.1,
        }
    }
}

const MIN_DISTANCE: f32 = 0.1;
const MAX_DISTANCE: f32 = 100.0;
const MAX_ELEVATION: f32 = 1.5;

impl CameraState {
    pub fn position(&self) -> Vec3 {
        let (sin_az, cos_az) = self.azimuth.sin_cos();
        let (sin_el, cos_el) = self.elevation.sin_cos();
        self.target
            + Vec3::new(
                self.distance * sin_az * cos_el,
                self.distance * sin_el,
                self.distance * cos_az * cos_el,
            )
    }

    /// Matrices for the given viewport aspect ratio
    pub fn view(&self, aspect: f32) -> CameraView {
        let position = self.position();
        let view = Mat4::look_at_rh(position, self.target, Vec3::Y);
        let projection = Mat4::perspective_rh(self.fov_y, aspect.max(1e-3), self.near, self.far);
        CameraView {
            position,
            view,
            projection,
        }
    }

    /// Apply a pointer drag delta in pixels
    pub fn orbit(&mut self, delta: Vec2) {
        if !self.controls_enabled {
            return;
        }
        self.azimuth -= delta.x * self.sensitivity;
        self.elevation =
            (self.elevation + delta.y * self.sensitivity).clamp(-MAX_ELEVATION, MAX_ELEVATION);
    }

    /// Apply a scroll delta; positive zooms in
    pub fn zoom(&mut self, scroll: f32) {
        if !self.controls_enabled {
            return;
        }
        let factor = 1.0 - scroll * self.zoom_speed;
        self.distance = (self.distance * factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Re-target on the box so its bounding sphere fits the vertical fov
    pub fn frame(&mut self, bounds: &Aabb) {
        let radius = bounds.bounding_radius().max(0.01);
        let half_fov = (self.fov_y * 0.5).max(0.01);
        self.target = bounds.center();
        self.distance = (radius / half_fov.sin() * 1.1).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Back to the initial orbit. Lens and input settings are kept.
    pub fn reset(&mut self) {
        let initial = CameraState::default();
        self.target = initial.target;
        self.distance = initial.distance;
        self.azimuth = initial.azimuth;
        self.elevation = initial.elevation;
    }
}

/// Camera matrices for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

impl CameraView {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Ray from the near plane through a point in normalized device coordinates
    pub fn ray_through_ndc(&self, ndc: Vec2) -> Option<Ray3d> {
        let inverse = self.view_projection().inverse();
        let near = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 0.0));
        let far = inverse.project_point3(Vec3::new(ndc.x, ndc.y, 1.0));
        let direction = Dir3::new(far - near).ok()?;
        Some(Ray3d::new(near, direction))
    }

    pub fn ray_through_pixel(&self, pixel: Vec2, viewport: &Viewport) -> Option<Ray3d> {
        if viewport.is_empty() {
            return None;
        }
        self.ray_through_ndc(viewport.pixel_to_ndc(pixel))
    }

    /// Project a world point to NDC. None when the point is behind the camera.
    pub fn project_to_ndc(&self, point: Vec3) -> Option<Vec3> {
        let clip = self.view_projection() * Vec4::new(point.x, point.y, point.z, 1.0);
        if clip.w <= 0.0 {
            return None;
        }
        Some(clip.truncate() / clip.w)
    }

    /// Screen position of a world point, for placing labels
    pub fn world_to_pixel(&self, point: Vec3, viewport: &Viewport) -> Option<Vec2> {
        let ndc = self.project_to_ndc(point)?;
        Some(viewport.ndc_to_pixel(ndc.truncate()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_position_matches_orbit() {
        let camera = CameraState::default();
        let pos = camera.position();
        assert!((pos - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn test_center_pixel_ray_points_at_target() {
        let camera = CameraState::default();
        let viewport = Viewport::new(800.0, 600.0);
        let view = camera.view(viewport.aspect());
        let ray = view.ray_through_pixel(Vec2::new(400.0, 300.0), &viewport).unwrap();
        let dir: Vec3 = *ray.direction;
        assert!((dir - Vec3::NEG_Z).length() < 1e-4);
    }

    #[test]
    fn test_world_to_pixel_center_and_behind() {
        let camera = CameraState::default();
        let viewport = Viewport::new(800.0, 600.0);
        let view = camera.view(viewport.aspect());

        let center = view.world_to_pixel(Vec3::ZERO, &viewport).unwrap();
        assert!((center - Vec2::new(400.0, 300.0)).length() < 1e-3);

        // Above the target projects above the centre (smaller pixel y)
        let above = view.world_to_pixel(Vec3::new(0.0, 1.0, 0.0), &viewport).unwrap();
        assert!(above.y < 300.0);

        assert!(view.world_to_pixel(Vec3::new(0.0, 0.0, 10.0), &viewport).is_none());
    }

    #[test]
    fn test_frame_then_reset() {
        let mut camera = CameraState::default();
        camera.frame(&Aabb::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 3.0, 3.0)));
        assert_eq!(camera.target, Vec3::splat(2.0));
        assert!(camera.distance > 3f32.sqrt());

        camera.reset();
        assert_eq!(camera.target, Vec3::ZERO);
        assert_eq!(camera.distance, 5.0);
    }

    #[test]
    fn test_controls_disabled_ignores_input() {
        let mut camera = CameraState::default();
        camera.controls_enabled = false;
        camera.orbit(Vec2::new(100.0, 50.0));
        camera.zoom(1.0);
        assert_eq!(camera.azimuth, 0.0);
        assert_eq!(camera.distance, 5.0);
    }
}
