//! The viewer state resource

use anatomyhero_core::{AnnotationPersistence, Viewer, ViewerConfig};
use bevy::prelude::*;

/// Core viewer state shared by every system. UI and input systems call its
/// operations; render systems only read it.
#[derive(Resource, Deref, DerefMut)]
pub struct ViewerState(pub Viewer);

impl ViewerState {
    pub fn new(config: ViewerConfig, persistence: Box<dyn AnnotationPersistence>) -> Self {
        Self(Viewer::new(config, persistence))
    }
}
