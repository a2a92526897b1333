//! Shared, reloadable access to the current taxonomy

use super::{HierarchyError, HierarchyStore};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{error, info};

/// Holds the current [`HierarchyStore`] and swaps it whole on reload
///
/// Readers take an `Arc` snapshot and keep using it for the duration of
/// a request; a concurrent reload never changes what they see.
pub struct StoreHandle {
    source: PathBuf,
    current: RwLock<Arc<HierarchyStore>>,
}

impl StoreHandle {
    /// Load from `source`, falling back to the built-in taxonomy
    pub fn open(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let store = HierarchyStore::load_or_default(&source);
        Self::with_store(source, store)
    }

    pub fn with_store(source: impl Into<PathBuf>, store: HierarchyStore) -> Self {
        Self {
            source: source.into(),
            current: RwLock::new(Arc::new(store)),
        }
    }

    /// Current store
    pub fn snapshot(&self) -> Arc<HierarchyStore> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Rebuild from the source and swap it in
    ///
    /// On failure the previous store stays in place and the error is returned.
    pub fn reload(&self) -> Result<Arc<HierarchyStore>, HierarchyError> {
        let store = match HierarchyStore::load(&self.source) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Taxonomy reload from {} failed: {}", self.source.display(), e);
                return Err(e);
            }
        };
        self.swap(Arc::clone(&store));
        info!("Taxonomy reloaded: {} codes", store.len());
        Ok(store)
    }

    /// Swap in an already-built store
    pub fn replace(&self, store: HierarchyStore) -> Arc<HierarchyStore> {
        let store = Arc::new(store);
        self.swap(Arc::clone(&store));
        store
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    fn swap(&self, store: Arc<HierarchyStore>) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = store;
    }
}
