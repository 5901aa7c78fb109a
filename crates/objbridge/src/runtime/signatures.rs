//! In-memory signature metadata.

use crate::error::ForeignResult;
use crate::foreign::SignatureLoader;
use crate::value::Value;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

/// A [`SignatureLoader`] backed by tables held in memory.
///
/// Constants registered per bundle become visible once that bundle's
/// signatures are loaded; constants added with [`define`](Self::define) are
/// visible immediately.
#[derive(Default)]
pub struct MemorySignatures {
    bundles: RwLock<FxHashMap<PathBuf, Vec<(String, Value)>>>,
    constants: RwLock<FxHashMap<String, Value>>,
    loaded: RwLock<Vec<PathBuf>>,
}

impl MemorySignatures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the constants shipped with the bundle at `path`.
    pub fn with_bundle<I, S>(self, path: impl Into<PathBuf>, constants: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        self.bundles.write().insert(
            path.into(),
            constants.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        );
        self
    }

    /// Makes a constant visible immediately.
    pub fn define(&self, name: &str, value: Value) {
        self.constants.write().insert(name.to_string(), value);
    }

    /// Paths whose signatures have been loaded, in load order.
    pub fn loaded(&self) -> Vec<PathBuf> {
        self.loaded.read().clone()
    }
}

impl SignatureLoader for MemorySignatures {
    fn load_signatures(&self, path: &Path) -> ForeignResult<bool> {
        let Some(constants) = self.bundles.read().get(path).cloned() else {
            return Ok(false);
        };
        self.constants.write().extend(constants);
        self.loaded.write().push(path.to_path_buf());
        Ok(true)
    }

    fn lookup_constant(&self, name: &str) -> Option<Value> {
        self.constants.read().get(name).cloned()
    }
}
