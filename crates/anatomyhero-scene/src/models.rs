//! glTF loading per anatomical system, part registration and render sync

use std::collections::HashMap;
use std::sync::Arc;

use anatomyhero_core::{Aabb, Appearance, PartId, SceneNode, Surface};
use bevy::asset::{LoadState, RecursiveDependencyLoadState};
use bevy::color::LinearRgba;
use bevy::gltf::Gltf;
use bevy::math::Affine3A;
use bevy::prelude::*;
use tracing::{error, info};
use bevy::render::render_resource::PrimitiveTopology;

use crate::state::ViewerState;

/// Largest dimension a loaded system is scaled to
pub const MODEL_EXTENT: f32 = 2.0;

/// Root entity of one loaded system's scene
#[derive(Component, Debug, Clone)]
pub struct SystemRoot {
    pub system: String,
}

/// Scene spawned, meshes not yet registered
#[derive(Component)]
struct AwaitingMeshes;

/// Links a mesh entity to its registered part
#[derive(Component, Debug, Clone, Copy)]
pub struct PartEntity {
    pub id: PartId,
}

/// glTF handles still loading, keyed by system id
#[derive(Resource, Default)]
pub struct ModelLoads {
    pub loading: HashMap<String, Handle<Gltf>>,
}

pub struct ModelsPlugin;

impl Plugin for ModelsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ModelLoads>()
            .add_systems(Startup, start_model_loads)
            .add_systems(Update, (poll_model_loads, register_system_meshes).chain())
            .add_systems(PostUpdate, sync_part_render);
    }
}

fn start_model_loads(
    mut state: ResMut<ViewerState>,
    mut loads: ResMut<ModelLoads>,
    asset_server: Res<AssetServer>,
) {
    let systems: Vec<(String, String)> = state
        .config()
        .systems
        .iter()
        .map(|s| (s.id.clone(), s.model_path()))
        .collect();
    state.begin_loading(systems.len());

    for (system, path) in systems {
        info!(system = %system, path = %path, "Loading system model");
        let handle: Handle<Gltf> = asset_server.load(path);
        loads.loading.insert(system, handle);
    }
}

/// Spawn each system's scene once its glTF and dependencies are in
fn poll_model_loads(
    mut commands: Commands,
    mut state: ResMut<ViewerState>,
    mut loads: ResMut<ModelLoads>,
    asset_server: Res<AssetServer>,
    gltf_assets: Res<Assets<Gltf>>,
) {
    let systems: Vec<String> = loads.loading.keys().cloned().collect();
    for system in systems {
        let Some(handle) = loads.loading.get(&system) else {
            continue;
        };

        let failure = match asset_server.get_load_state(handle.id()) {
            Some(LoadState::Failed(err)) => Some(err.to_string()),
            Some(LoadState::Loaded) => {
                match asset_server.get_recursive_dependency_load_state(handle.id()) {
                    Some(RecursiveDependencyLoadState::Loaded) => {
                        let scene = gltf_assets.get(handle).and_then(|gltf| {
                            gltf.default_scene
                                .clone()
                                .or_else(|| gltf.scenes.first().cloned())
                        });
                        match scene {
                            Some(scene) => {
                                commands.spawn((
                                    SceneRoot(scene),
                                    Transform::default(),
                                    Visibility::default(),
                                    SystemRoot {
                                        system: system.clone(),
                                    },
                                    AwaitingMeshes,
                                ));
                                None
                            }
                            None => Some("model contains no scene".to_string()),
                        }
                    }
                    Some(RecursiveDependencyLoadState::Failed(err)) => Some(err.to_string()),
                    _ => continue,
                }
            }
            _ => continue,
        };

        if let Some(reason) = failure {
            error!(system = %system, reason = %reason, "Failed to load model");
            state.system_failed(&system, &reason);
        }
        loads.loading.remove(&system);
    }
}

/// A mesh entity found under a system root
struct FoundMesh {
    entity: Entity,
    /// Bounds in the root's space, before normalisation
    bounds: Aabb,
    /// Triangles in the root's space, for triangle-list meshes
    surface: Option<Surface>,
    name: Option<String>,
    parent_name: Option<String>,
    material: Option<Handle<StandardMaterial>>,
}

type NodeQuery<'w, 's> = Query<
    'w,
    's,
    (
        Option<&'static Transform>,
        Option<&'static Name>,
        Option<&'static Mesh3d>,
        Option<&'static MeshMaterial3d<StandardMaterial>>,
    ),
    Without<SystemRoot>,
>;

/// Depth-first walk below `root`, accumulating transforms and the chain of
/// named ancestors. A mesh is named after its glTF node (the nearest named
/// ancestor) and its parent after the next one up.
fn collect_meshes(
    root: Entity,
    children: &Query<&Children>,
    nodes: &NodeQuery,
    meshes: &Assets<Mesh>,
) -> Vec<FoundMesh> {
    let mut found = Vec::new();
    let mut stack: Vec<(Entity, Affine3A, Vec<String>)> = Vec::new();
    if let Ok(top) = children.get(root) {
        let top: &[Entity] = top;
        for &child in top.iter().rev() {
            stack.push((child, Affine3A::IDENTITY, Vec::new()));
        }
    }

    while let Some((entity, parent_affine, names)) = stack.pop() {
        let Ok((transform, name, mesh, material)) = nodes.get(entity) else {
            continue;
        };
        let affine = match transform {
            Some(t) => parent_affine * t.compute_affine(),
            None => parent_affine,
        };

        if let Some(mesh) = mesh.and_then(|m| meshes.get(&m.0)) {
            let points = mesh
                .attribute(Mesh::ATTRIBUTE_POSITION)
                .and_then(|v| v.as_float3())
                .map(|positions| {
                    positions
                        .iter()
                        .map(|p| affine.transform_point3(Vec3::from_array(*p)))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let surface = (mesh.primitive_topology() == PrimitiveTopology::TriangleList)
                .then(|| {
                    let indices: Option<Vec<usize>> = mesh.indices().map(|i| i.iter().collect());
                    Surface::from_indexed(&points, indices.as_deref())
                })
                .filter(|s| !s.is_empty());
            if let Some(bounds) = Aabb::from_points(points) {
                found.push(FoundMesh {
                    entity,
                    bounds,
                    surface,
                    name: names.last().cloned(),
                    parent_name: names.iter().rev().nth(1).cloned(),
                    material: material.map(|m| m.0.clone()),
                });
            }
        }

        if let Ok(kids) = children.get(entity) {
            let kids: &[Entity] = kids;
            let mut chain = names;
            if let Some(name) = name.map(|n| n.as_str()).filter(|n| !n.is_empty()) {
                chain.push(name.to_string());
            }
            for &child in kids.iter().rev() {
                stack.push((child, affine, chain.clone()));
            }
        }
    }
    found
}

/// Centre a box on the origin and scale its largest side to `extent`
pub fn normalize_to_extent(bounds: &Aabb, extent: f32) -> Transform {
    let largest = bounds.size().max_element();
    let scale = if largest > f32::EPSILON {
        extent / largest
    } else {
        1.0
    };
    Transform {
        translation: -bounds.center() * scale,
        scale: Vec3::splat(scale),
        ..default()
    }
}

fn apply_uniform(bounds: &Aabb, transform: &Transform) -> Aabb {
    Aabb::new(
        bounds.min * transform.scale + transform.translation,
        bounds.max * transform.scale + transform.translation,
    )
}

/// Read a material into the core's appearance value
pub fn appearance_of(material: &StandardMaterial) -> Appearance {
    let base = material.base_color.to_linear();
    let emissive = material.emissive;
    Appearance {
        base_color: [base.red, base.green, base.blue],
        opacity: base.alpha,
        emissive: [emissive.red, emissive.green, emissive.blue],
        emissive_intensity: 1.0,
        transparent: !matches!(material.alpha_mode, AlphaMode::Opaque),
    }
}

pub fn write_appearance(material: &mut StandardMaterial, appearance: &Appearance) {
    let [r, g, b] = appearance.base_color;
    material.base_color = Color::linear_rgba(r, g, b, appearance.opacity);
    let [er, eg, eb] = appearance.emissive_linear();
    material.emissive = LinearRgba::rgb(er, eg, eb);
    material.alpha_mode = if appearance.transparent {
        AlphaMode::Blend
    } else {
        AlphaMode::Opaque
    };
}

/// Normalise each freshly spawned system and register its meshes as parts.
/// Every mesh gets its own material copy so per-part styling stays local.
fn register_system_meshes(
    mut commands: Commands,
    mut state: ResMut<ViewerState>,
    roots: Query<(Entity, &SystemRoot), With<AwaitingMeshes>>,
    mut root_transforms: Query<&mut Transform, With<SystemRoot>>,
    children: Query<&Children>,
    nodes: NodeQuery,
    meshes: Res<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    for (root, system_root) in &roots {
        // The scene spawner attaches the whole instance at once
        if children.get(root).is_err() {
            continue;
        }

        let found = collect_meshes(root, &children, &nodes, &meshes);
        let model_bounds = found
            .iter()
            .map(|m| m.bounds)
            .reduce(|a, b| a.union(&b));
        let normalize = model_bounds
            .map(|b| normalize_to_extent(&b, MODEL_EXTENT))
            .unwrap_or_default();
        if let Ok(mut transform) = root_transforms.get_mut(root) {
            *transform = normalize;
        }

        let mut nodes_out = Vec::with_capacity(found.len());
        for mesh in &found {
            let source = mesh
                .material
                .as_ref()
                .and_then(|h| materials.get(h))
                .cloned();
            let appearance = match source {
                Some(source) => {
                    let appearance = appearance_of(&source);
                    let own = materials.add(source);
                    commands.entity(mesh.entity).insert(MeshMaterial3d(own));
                    appearance
                }
                None => {
                    let appearance = Appearance::default();
                    let mut own = StandardMaterial::default();
                    write_appearance(&mut own, &appearance);
                    commands
                        .entity(mesh.entity)
                        .insert(MeshMaterial3d(materials.add(own)));
                    appearance
                }
            };
            let surface = mesh.surface.as_ref().map(|s| {
                Arc::new(s.map_points(|p| p * normalize.scale + normalize.translation))
            });
            nodes_out.push(SceneNode::Group {
                name: mesh.parent_name.clone(),
                children: vec![SceneNode::Mesh {
                    name: mesh.name.clone(),
                    appearance,
                    bounds: apply_uniform(&mesh.bounds, &normalize),
                    surface,
                }],
            });
        }

        let tree = SceneNode::Group {
            name: None,
            children: nodes_out,
        };
        let ids = state.system_loaded(&system_root.system, &tree);
        for (mesh, id) in found.iter().zip(ids) {
            commands.entity(mesh.entity).insert(PartEntity { id });
        }
        commands.entity(root).remove::<AwaitingMeshes>();
    }
}

/// Mirror part visibility and appearance onto entities and materials.
/// Reads the core state only; materials are rewritten when the part's
/// appearance differs from what was last written.
fn sync_part_render(
    state: Res<ViewerState>,
    mut parts: Query<(
        Entity,
        &PartEntity,
        &MeshMaterial3d<StandardMaterial>,
        &mut Visibility,
    )>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut written: Local<HashMap<Entity, Appearance>>,
) {
    for (entity, part_entity, material, mut visibility) in &mut parts {
        let Some(part) = state.part(part_entity.id) else {
            continue;
        };
        visibility.set_if_neq(if part.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        });

        if written.get(&entity) == Some(&part.appearance) {
            continue;
        }
        if let Some(target) = materials.get_mut(&material.0) {
            write_appearance(target, &part.appearance);
            written.insert(entity, part.appearance);
        }
    }
}
