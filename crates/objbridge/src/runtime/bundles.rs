//! In-memory bundle table.

use crate::error::ForeignResult;
use crate::foreign::BundleLoader;
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

/// A [`BundleLoader`] over a fixed table of framework names and paths.
/// Loading only records the path.
#[derive(Default)]
pub struct MemoryBundles {
    known: RwLock<FxHashMap<String, PathBuf>>,
    loaded: RwLock<FxHashSet<PathBuf>>,
    order: RwLock<Vec<PathBuf>>,
}

impl MemoryBundles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `name` locatable at `path`.
    pub fn with_framework(self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.known.write().insert(name.to_string(), path.into());
        self
    }

    /// Paths loaded so far, in load order.
    pub fn loaded(&self) -> Vec<PathBuf> {
        self.order.read().clone()
    }
}

impl BundleLoader for MemoryBundles {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.known.read().get(name).cloned()
    }

    fn is_loaded(&self, path: &Path) -> bool {
        self.loaded.read().contains(path)
    }

    fn load(&self, path: &Path) -> ForeignResult<bool> {
        if !self.known.read().values().any(|p| p == path) {
            return Ok(false);
        }
        if self.loaded.write().insert(path.to_path_buf()) {
            self.order.write().push(path.to_path_buf());
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_known_bundle_once() {
        let bundles = MemoryBundles::new().with_framework("AppKit", "/F/AppKit");
        let path = bundles.locate("AppKit").unwrap();
        assert!(!bundles.is_loaded(&path));
        assert!(bundles.load(&path).unwrap());
        assert!(bundles.load(&path).unwrap());
        assert!(bundles.is_loaded(&path));
        assert_eq!(bundles.loaded(), vec![PathBuf::from("/F/AppKit")]);
        assert!(!bundles.load(Path::new("/F/Other")).unwrap());
        assert_eq!(bundles.locate("Other"), None);
    }
}
