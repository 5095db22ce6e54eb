//! AnatomyHero Core - part registry, selection and view state
//!
//! Everything here is renderer-agnostic:
//! - Part registry with per-part baselines and appearance rules
//! - Pointer picking, drag rectangles and the interaction mode machine
//! - Orbit camera math shared by picking and the renderer
//! - Annotations with pluggable persistence
//! - Part descriptions, search and viewer configuration

pub mod annotation;
pub mod appearance;
pub mod camera;
pub mod config;
pub mod description;
pub mod loading;
pub mod material;
pub mod mode;
pub mod part;
pub mod picking;
pub mod registry;
pub mod search;
pub mod throttle;
pub mod viewer;

pub use annotation::{
    Annotation, AnnotationDraft, AnnotationPersistence, AnnotationStore, JsonFilePersistence,
    MemoryPersistence, PersistenceError,
};
pub use appearance::{Appearance, AppearanceLevels, Rgb};
pub use camera::{CameraState, CameraView, Viewport};
pub use config::{load_config, save_default_config, ConfigError, ViewerConfig};
pub use description::{
    Description, DescriptionCatalog, DescriptionError, DescriptionPanel, DescriptionTicket,
};
pub use loading::{LoadOutcome, LoadProgress, LoadUpdate};
pub use material::MaterialStore;
pub use mode::InteractionMode;
pub use part::{Aabb, Part, PartDraft, PartId, SceneNode, Surface};
pub use registry::SceneRegistry;
pub use search::{PartIcon, SearchEntry, SearchIndex};
pub use viewer::{AnnotationLabel, Viewer, ViewerEvent, ViewerObserver};
