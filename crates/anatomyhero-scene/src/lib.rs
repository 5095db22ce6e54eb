//! AnatomyHero Scene - Bevy plugin over the core viewer state
//!
//! The core `Viewer` lives in the `ViewerState` resource and is the only
//! place part state changes. Systems here feed it input (pointer, camera
//! gestures, loaded meshes) and mirror its state onto entities.

pub mod camera;
pub mod lights;
pub mod markers;
pub mod models;
pub mod pointer;
pub mod state;

use anatomyhero_core::{MemoryPersistence, ViewerConfig};
use bevy::prelude::*;

pub use camera::MainCamera;
pub use lights::Theme;
pub use models::{ModelLoads, PartEntity, SystemRoot};
pub use state::ViewerState;

/// Sets up camera, lights, model loading, input routing and render sync.
///
/// Insert a `ViewerState` before adding the plugin to choose the
/// annotation persistence; otherwise an in-memory store is used.
pub struct AnatomyScenePlugin {
    pub config: ViewerConfig,
}

impl Plugin for AnatomyScenePlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<ViewerState>() {
            app.insert_resource(ViewerState::new(
                self.config.clone(),
                Box::new(MemoryPersistence::new()),
            ));
        }
        app.add_plugins(camera::CameraPlugin)
            .add_plugins(lights::LightsPlugin)
            .add_plugins(models::ModelsPlugin)
            .add_plugins(pointer::PointerPlugin)
            .add_plugins(markers::MarkersPlugin);
    }
}
