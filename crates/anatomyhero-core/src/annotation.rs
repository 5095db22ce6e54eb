//! User point annotations and their persistence
//!
//! The whole collection is stored as one serialized blob. Every mutation
//! rewrites it; there are no partial updates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bevy_math::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A world-anchored note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub title: String,
    pub description: String,
    pub world_position: Vec3,
}

/// Contents of the annotation dialog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationDraft {
    pub title: String,
    pub description: String,
    pub position: Option<Vec3>,
}

impl AnnotationDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>, position: Vec3) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            position: Some(position),
        }
    }

    /// Title, description and point are all present
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty()
            && !self.description.trim().is_empty()
            && self.position.is_some()
    }
}

pub type AnnotationMap = BTreeMap<String, Annotation>;

/// Backing store for the annotation blob
pub trait AnnotationPersistence: Send + Sync {
    fn load_all(&self) -> Result<AnnotationMap, PersistenceError>;
    fn save_all(&self, annotations: &AnnotationMap) -> Result<(), PersistenceError>;
}

/// Decode a stored blob. Annotations are kept as a JSON array.
pub fn decode_blob(blob: &str) -> Result<AnnotationMap, PersistenceError> {
    let list: Vec<Annotation> = serde_json::from_str(blob)?;
    Ok(list.into_iter().map(|a| (a.id.clone(), a)).collect())
}

pub fn encode_blob(annotations: &AnnotationMap) -> Result<String, PersistenceError> {
    let list: Vec<&Annotation> = annotations.values().collect();
    Ok(serde_json::to_string(&list)?)
}

/// In-process blob, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    blob: Arc<Mutex<Option<String>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blob(&self) -> Option<String> {
        self.blob.lock().ok().and_then(|b| b.clone())
    }
}

impl AnnotationPersistence for MemoryPersistence {
    fn load_all(&self) -> Result<AnnotationMap, PersistenceError> {
        match self.blob() {
            Some(blob) => decode_blob(&blob),
            None => Ok(AnnotationMap::new()),
        }
    }

    fn save_all(&self, annotations: &AnnotationMap) -> Result<(), PersistenceError> {
        let encoded = encode_blob(annotations)?;
        let mut blob = self
            .blob
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        *blob = Some(encoded);
        Ok(())
    }
}

/// JSON file on disk; a missing file reads as empty
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnnotationPersistence for JsonFilePersistence {
    fn load_all(&self) -> Result<AnnotationMap, PersistenceError> {
        if !self.path.exists() {
            return Ok(AnnotationMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(AnnotationMap::new());
        }
        decode_blob(&content)
    }

    fn save_all(&self, annotations: &AnnotationMap) -> Result<(), PersistenceError> {
        let list: Vec<&Annotation> = annotations.values().collect();
        let content = serde_json::to_string_pretty(&list)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Owns the annotation collection and writes it through on every change
pub struct AnnotationStore {
    annotations: AnnotationMap,
    persistence: Box<dyn AnnotationPersistence>,
    last_millis: i64,
}

impl std::fmt::Debug for AnnotationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationStore")
            .field("annotations", &self.annotations)
            .field("last_millis", &self.last_millis)
            .finish_non_exhaustive()
    }
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::open(Box::new(MemoryPersistence::new()))
    }
}

impl AnnotationStore {
    /// Load whatever the backend holds. Corrupt or unreadable data is
    /// treated as an empty collection.
    pub fn open(persistence: Box<dyn AnnotationPersistence>) -> Self {
        let annotations = match persistence.load_all() {
            Ok(annotations) => {
                info!(count = annotations.len(), "Loaded annotations");
                annotations
            }
            Err(e) => {
                warn!(error = %e, "Could not read stored annotations, starting empty");
                AnnotationMap::new()
            }
        };
        let last_millis = annotations
            .keys()
            .filter_map(|id| parse_id_millis(id))
            .max()
            .unwrap_or(0);

        Self {
            annotations,
            persistence,
            last_millis,
        }
    }

    /// Create from a completed dialog. Incomplete drafts are ignored.
    pub fn add(&mut self, draft: &AnnotationDraft) -> Option<Annotation> {
        self.add_at(draft, chrono::Utc::now().timestamp_millis())
    }

    /// Like [`AnnotationStore::add`] with an explicit clock reading
    pub fn add_at(&mut self, draft: &AnnotationDraft, now_millis: i64) -> Option<Annotation> {
        if !draft.is_complete() {
            debug!("Ignoring incomplete annotation draft");
            return None;
        }
        let position = draft.position?;

        let millis = now_millis.max(self.last_millis + 1);
        self.last_millis = millis;

        let annotation = Annotation {
            id: format!("annotation-{millis}"),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            world_position: position,
        };
        info!(id = %annotation.id, title = %annotation.title, "Annotation added");
        self.annotations
            .insert(annotation.id.clone(), annotation.clone());
        self.persist();
        Some(annotation)
    }

    pub fn delete(&mut self, id: &str) -> Option<Annotation> {
        let removed = self.annotations.remove(id);
        if removed.is_some() {
            info!(id = %id, "Annotation deleted");
            self.persist();
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.annotations.get(id)
    }

    /// Annotations in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> + '_ {
        let mut list: Vec<&Annotation> = self.annotations.values().collect();
        list.sort_by_key(|a| parse_id_millis(&a.id).unwrap_or(i64::MAX));
        list.into_iter()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    fn persist(&self) {
        if let Err(e) = self.persistence.save_all(&self.annotations) {
            error!(error = %e, "Failed to persist annotations");
        }
    }
}

fn parse_id_millis(id: &str) -> Option<i64> {
    id.strip_prefix("annotation-")?.parse().ok()
}
