//! Sphere markers at saved annotation points

use std::collections::HashSet;

use bevy::prelude::*;
use tracing::debug;

use crate::state::ViewerState;

const MARKER_RADIUS: f32 = 0.02;

#[derive(Component, Debug, Clone)]
pub struct AnnotationMarker {
    pub annotation_id: String,
}

/// Shared mesh and material for every marker
#[derive(Resource)]
struct MarkerAssets {
    mesh: Handle<Mesh>,
    material: Handle<StandardMaterial>,
}

pub struct MarkersPlugin;

impl Plugin for MarkersPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_marker_assets)
            .add_systems(PostUpdate, sync_annotation_markers);
    }
}

fn setup_marker_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.insert_resource(MarkerAssets {
        mesh: meshes.add(Sphere::new(MARKER_RADIUS)),
        material: materials.add(StandardMaterial {
            base_color: Color::srgb(1.0, 0.2, 0.2),
            unlit: true,
            ..default()
        }),
    });
}

/// Spawn a marker for each new annotation and despawn markers whose
/// annotation was deleted
fn sync_annotation_markers(
    mut commands: Commands,
    state: Res<ViewerState>,
    assets: Option<Res<MarkerAssets>>,
    markers: Query<(Entity, &AnnotationMarker)>,
) {
    let Some(assets) = assets else {
        return;
    };
    if !state.is_changed() {
        return;
    }

    let mut present = HashSet::new();
    for (entity, marker) in &markers {
        if state.annotations().get(&marker.annotation_id).is_some() {
            present.insert(marker.annotation_id.clone());
        } else {
            commands.entity(entity).despawn();
        }
    }

    for annotation in state.annotations().iter() {
        if present.contains(&annotation.id) {
            continue;
        }
        debug!(annotation = %annotation.id, "Spawning annotation marker");
        commands.spawn((
            Mesh3d(assets.mesh.clone()),
            MeshMaterial3d(assets.material.clone()),
            Transform::from_translation(annotation.world_position),
            AnnotationMarker {
                annotation_id: annotation.id.clone(),
            },
        ));
    }
}
