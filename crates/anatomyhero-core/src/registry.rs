//! Scene registry - owns every loaded part

use std::collections::HashMap;

use tracing::debug;

use crate::part::{Aabb, Part, PartDraft, PartId, SceneNode};

/// Owns the set of loaded parts in registration order.
///
/// Parts are only ever added; a whole-scene teardown goes through [`SceneRegistry::clear`].
#[derive(Debug, Default)]
pub struct SceneRegistry {
    parts: Vec<Part>,
    index: HashMap<PartId, usize>,
    next_id: u64,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single loaded mesh under `system`
    pub fn register(&mut self, draft: PartDraft, system: &str, visible: bool) -> PartId {
        self.next_id += 1;
        let id = PartId(self.next_id);
        debug!(part = %id, name = %draft.name, system = %system, "Registering part");

        self.index.insert(id, self.parts.len());
        self.parts.push(Part {
            id,
            name: draft.name,
            parent_name: draft.parent_name,
            system: system.to_string(),
            visible,
            appearance: draft.appearance,
            bounds: draft.bounds,
            surface: draft.surface,
        });
        id
    }

    /// Register every mesh leaf of a loaded system's scene graph
    pub fn register_tree(&mut self, root: &SceneNode, system: &str, visible: bool) -> Vec<PartId> {
        root.leaves()
            .into_iter()
            .map(|draft| self.register(draft, system, visible))
            .collect()
    }

    /// All parts in registration order. Each call starts a fresh pass.
    pub fn all_parts(&self) -> impl Iterator<Item = &Part> + '_ {
        self.parts.iter()
    }

    pub fn all_parts_mut(&mut self) -> impl Iterator<Item = &mut Part> + '_ {
        self.parts.iter_mut()
    }

    pub fn visible_parts(&self) -> impl Iterator<Item = &Part> + '_ {
        self.parts.iter().filter(|p| p.visible)
    }

    pub fn system_parts(&self, system: &str) -> impl Iterator<Item = &Part> + '_ {
        let system = system.to_string();
        self.parts.iter().filter(move |p| p.system == system)
    }

    pub fn get(&self, id: PartId) -> Option<&Part> {
        self.index.get(&id).map(|&i| &self.parts[i])
    }

    pub fn get_mut(&mut self, id: PartId) -> Option<&mut Part> {
        match self.index.get(&id) {
            Some(&i) => self.parts.get_mut(i),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Distinct system tags in first-registration order
    pub fn systems(&self) -> Vec<String> {
        let mut systems: Vec<String> = Vec::new();
        for part in &self.parts {
            if !systems.contains(&part.system) {
                systems.push(part.system.clone());
            }
        }
        systems
    }

    /// Union of the bounds of the given parts
    pub fn bounds_of<'a>(&self, ids: impl IntoIterator<Item = &'a PartId>) -> Option<Aabb> {
        ids.into_iter()
            .filter_map(|id| self.get(*id))
            .map(|p| p.bounds)
            .reduce(|a, b| a.union(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::Appearance;
    use bevy_math::Vec3;

    fn draft(name: &str) -> PartDraft {
        PartDraft {
            name: name.to_string(),
            parent_name: None,
            appearance: Appearance::default(),
            bounds: Aabb::new(Vec3::ZERO, Vec3::ONE),
            surface: None,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = SceneRegistry::new();
        let skull = registry.register(draft("Skull"), "skeletal", true);
        let heart = registry.register(draft("Heart"), "visceral", false);

        assert_ne!(skull, heart);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(skull).unwrap().name, "Skull");
        assert_eq!(registry.get(heart).unwrap().system, "visceral");
        assert!(registry.get(PartId(999)).is_none());
    }

    #[test]
    fn test_all_parts_is_restartable() {
        let mut registry = SceneRegistry::new();
        registry.register(draft("Femur"), "skeletal", true);
        registry.register(draft("Tibia"), "skeletal", true);

        assert_eq!(registry.all_parts().count(), 2);
        assert_eq!(registry.all_parts().count(), 2);
    }

    #[test]
    fn test_visible_parts_filter() {
        let mut registry = SceneRegistry::new();
        let a = registry.register(draft("Aorta"), "arterial", true);
        registry.register(draft("Portal Vein"), "venous", false);

        let visible: Vec<PartId> = registry.visible_parts().map(|p| p.id).collect();
        assert_eq!(visible, vec![a]);
    }

    #[test]
    fn test_register_tree_and_systems() {
        let mut registry = SceneRegistry::new();
        let tree = SceneNode::group(
            "Muscles",
            vec![
                SceneNode::mesh("Biceps", Appearance::default(), Aabb::new(Vec3::ZERO, Vec3::ONE)),
                SceneNode::mesh("Triceps", Appearance::default(), Aabb::new(Vec3::ZERO, Vec3::ONE)),
            ],
        );
        let ids = registry.register_tree(&tree, "muscular", false);
        registry.register(draft("Skull"), "skeletal", false);

        assert_eq!(ids.len(), 2);
        assert_eq!(registry.system_parts("muscular").count(), 2);
        assert_eq!(registry.systems(), vec!["muscular".to_string(), "skeletal".to_string()]);
    }

    #[test]
    fn test_bounds_of() {
        let mut registry = SceneRegistry::new();
        let mut d = draft("A");
        d.bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let a = registry.register(d, "s", true);
        let mut d = draft("B");
        d.bounds = Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0));
        let b = registry.register(d, "s", true);

        let bounds = registry.bounds_of(&[a, b]).unwrap();
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::splat(3.0));
        assert!(registry.bounds_of(&Vec::<PartId>::new()).is_none());
    }
}
