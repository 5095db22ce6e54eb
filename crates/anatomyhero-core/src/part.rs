//! Part types: pickable leaves of a loaded anatomical system

use std::sync::Arc;

use bevy_math::{Ray3d, Vec3};
use serde::{Deserialize, Serialize};

use crate::appearance::Appearance;

/// Stable identifier of a registered part, assigned by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartId(pub u64);

impl std::fmt::Display for PartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "part-{}", self.0)
    }
}

/// World-space axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Smallest box containing all points, or None for an empty set
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn half_extents(&self) -> Vec3 {
        self.size() * 0.5
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Radius of the sphere through the box corners
    pub fn bounding_radius(&self) -> f32 {
        self.half_extents().length()
    }

    /// Slab-method ray intersection; returns the entry distance along the ray,
    /// or the exit distance when the origin is inside the box
    pub fn ray_hit(&self, ray: &Ray3d) -> Option<f32> {
        let origin = ray.origin;
        let dir: Vec3 = *ray.direction;
        let inv = Vec3::new(
            if dir.x != 0.0 { 1.0 / dir.x } else { f32::INFINITY },
            if dir.y != 0.0 { 1.0 / dir.y } else { f32::INFINITY },
            if dir.z != 0.0 { 1.0 / dir.z } else { f32::INFINITY },
        );

        let mut tmin = f32::NEG_INFINITY;
        let mut tmax = f32::INFINITY;
        for axis in 0..3 {
            let (o, i, lo, hi) = (origin[axis], inv[axis], self.min[axis], self.max[axis]);
            if i.is_infinite() {
                // Parallel to this slab: must already be inside it
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let (mut t0, mut t1) = ((lo - o) * i, (hi - o) * i);
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            tmin = tmin.max(t0);
            tmax = tmax.min(t1);
            if tmin > tmax {
                return None;
            }
        }

        if tmax < 0.0 {
            return None;
        }
        Some(if tmin >= 0.0 { tmin } else { tmax })
    }
}

/// World-space triangles of one mesh, used for exact picking
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Surface {
    triangles: Vec<[Vec3; 3]>,
}

impl Surface {
    pub fn new(triangles: Vec<[Vec3; 3]>) -> Self {
        Self { triangles }
    }

    /// Triangle list from vertex positions and optional indices.
    /// Out-of-range indices and a trailing partial triangle are skipped.
    pub fn from_indexed(positions: &[Vec3], indices: Option<&[usize]>) -> Self {
        let corner = |i: usize| positions.get(i).copied();
        let triangles = match indices {
            Some(indices) => indices
                .chunks_exact(3)
                .filter_map(|t| Some([corner(t[0])?, corner(t[1])?, corner(t[2])?]))
                .collect(),
            None => positions
                .chunks_exact(3)
                .map(|t| [t[0], t[1], t[2]])
                .collect(),
        };
        Self { triangles }
    }

    pub fn triangles(&self) -> &[[Vec3; 3]] {
        &self.triangles
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.triangles.iter().flatten().copied())
    }

    /// Same triangles with every corner mapped through `f`
    pub fn map_points(&self, f: impl Fn(Vec3) -> Vec3) -> Self {
        Self {
            triangles: self
                .triangles
                .iter()
                .map(|[a, b, c]| [f(*a), f(*b), f(*c)])
                .collect(),
        }
    }

    /// Distance to the nearest triangle along the ray, either winding
    pub fn ray_hit(&self, ray: &Ray3d) -> Option<f32> {
        self.triangles
            .iter()
            .filter_map(|t| ray_triangle(ray, t))
            .min_by(f32::total_cmp)
    }
}

/// Möller-Trumbore, two-sided
fn ray_triangle(ray: &Ray3d, [a, b, c]: &[Vec3; 3]) -> Option<f32> {
    let dir: Vec3 = *ray.direction;
    let e1 = *b - *a;
    let e2 = *c - *a;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < f32::EPSILON {
        return None;
    }
    let inv = 1.0 / det;
    let s = ray.origin - *a;
    let u = s.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv;
    (t > f32::EPSILON).then_some(t)
}

/// A node of a loaded system's scene graph.
///
/// Groups only structure the tree; meshes become parts. The distinction is
/// resolved once when the tree is registered.
#[derive(Debug, Clone)]
pub enum SceneNode {
    Group {
        name: Option<String>,
        children: Vec<SceneNode>,
    },
    Mesh {
        name: Option<String>,
        appearance: Appearance,
        bounds: Aabb,
        /// Triangles for exact picking; the box stands in when absent
        surface: Option<Arc<Surface>>,
    },
}

impl SceneNode {
    pub fn group(name: impl Into<String>, children: Vec<SceneNode>) -> Self {
        SceneNode::Group {
            name: Some(name.into()),
            children,
        }
    }

    pub fn mesh(name: impl Into<String>, appearance: Appearance, bounds: Aabb) -> Self {
        SceneNode::Mesh {
            name: Some(name.into()),
            appearance,
            bounds,
            surface: None,
        }
    }

    /// Mesh whose bounds come from its triangles. None for an empty surface.
    pub fn mesh_with_surface(
        name: impl Into<String>,
        appearance: Appearance,
        surface: Surface,
    ) -> Option<Self> {
        let bounds = surface.bounds()?;
        Some(SceneNode::Mesh {
            name: Some(name.into()),
            appearance,
            bounds,
            surface: Some(Arc::new(surface)),
        })
    }

    /// Flatten into part drafts, depth-first, recording each mesh's nearest
    /// named ancestor
    pub fn leaves(&self) -> Vec<PartDraft> {
        let mut out = Vec::new();
        self.collect_leaves(None, &mut out);
        out
    }

    fn collect_leaves(&self, ancestor: Option<&str>, out: &mut Vec<PartDraft>) {
        match self {
            SceneNode::Group { name, children } => {
                let named = name.as_deref().filter(|n| !n.is_empty()).or(ancestor);
                for child in children {
                    child.collect_leaves(named, out);
                }
            }
            SceneNode::Mesh {
                name,
                appearance,
                bounds,
                surface,
            } => out.push(PartDraft {
                name: name.clone().unwrap_or_default(),
                parent_name: ancestor.map(str::to_string),
                appearance: *appearance,
                bounds: *bounds,
                surface: surface.clone(),
            }),
        }
    }
}

/// Everything needed to register a part, before it has an id
#[derive(Debug, Clone)]
pub struct PartDraft {
    pub name: String,
    pub parent_name: Option<String>,
    pub appearance: Appearance,
    pub bounds: Aabb,
    pub surface: Option<Arc<Surface>>,
}

/// A registered, pickable, nameable unit of the scene
#[derive(Debug, Clone)]
pub struct Part {
    pub id: PartId,
    /// Own node name; may be empty for anonymous meshes
    pub name: String,
    /// Nearest named ancestor in the loaded scene graph
    pub parent_name: Option<String>,
    /// Owning system, e.g. "skeletal"
    pub system: String,
    pub visible: bool,
    /// Live appearance read by the renderer
    pub appearance: Appearance,
    pub bounds: Aabb,
    /// Shared with the draft; never copied per frame
    pub surface: Option<Arc<Surface>>,
}

impl Part {
    /// Distance along the ray to this part. The box is a broad phase; when
    /// triangles are known only a triangle hit counts.
    pub fn ray_hit(&self, ray: &Ray3d) -> Option<f32> {
        let box_hit = self.bounds.ray_hit(ray)?;
        match &self.surface {
            Some(surface) => surface.ray_hit(ray),
            None => Some(box_hit),
        }
    }

    /// Name shown to users and used for descriptions
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if let Some(parent) = self.parent_name.as_deref().filter(|p| !p.is_empty()) {
            parent
        } else {
            "Unnamed part"
        }
    }
}
