//! Annotation persistence for the viewer: browser localStorage on the web,
//! a JSON file next to the executable otherwise

use anatomyhero_core::AnnotationPersistence;

/// Persistence backend for this target, keyed by the configured storage key
pub fn annotation_persistence(key: &str) -> Box<dyn AnnotationPersistence> {
    #[cfg(target_arch = "wasm32")]
    {
        Box::new(web::LocalStoragePersistence::new(key))
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Box::new(anatomyhero_core::JsonFilePersistence::new(format!("{key}.json")))
    }
}

#[cfg(target_arch = "wasm32")]
mod web {
    use anatomyhero_core::annotation::{decode_blob, encode_blob, AnnotationMap};
    use anatomyhero_core::{AnnotationPersistence, PersistenceError};

    /// One localStorage item holding the whole collection as JSON.
    /// The storage handle is looked up per call; it is not `Send`.
    pub struct LocalStoragePersistence {
        key: String,
    }

    impl LocalStoragePersistence {
        pub fn new(key: impl Into<String>) -> Self {
            Self { key: key.into() }
        }
    }

    fn local_storage() -> Result<web_sys::Storage, PersistenceError> {
        let window = web_sys::window()
            .ok_or_else(|| PersistenceError::Unavailable("no window".to_string()))?;
        window
            .local_storage()
            .map_err(|e| PersistenceError::Unavailable(format!("{e:?}")))?
            .ok_or_else(|| PersistenceError::Unavailable("localStorage disabled".to_string()))
    }

    impl AnnotationPersistence for LocalStoragePersistence {
        fn load_all(&self) -> Result<AnnotationMap, PersistenceError> {
            match local_storage()?.get_item(&self.key) {
                Ok(Some(blob)) => decode_blob(&blob),
                Ok(None) => Ok(AnnotationMap::new()),
                Err(e) => Err(PersistenceError::Unavailable(format!("{e:?}"))),
            }
        }

        fn save_all(&self, annotations: &AnnotationMap) -> Result<(), PersistenceError> {
            let blob = encode_blob(annotations)?;
            local_storage()?
                .set_item(&self.key, &blob)
                .map_err(|e| PersistenceError::Unavailable(format!("{e:?}")))
        }
    }
}
