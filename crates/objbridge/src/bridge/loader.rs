//! Framework loading.

use super::Bridge;
use crate::error::{Error, Result};
use std::path::Path;

impl Bridge {
    /// Loads the signature metadata of the configured preload frameworks.
    /// Frameworks that can't be located are skipped.
    pub(crate) fn preload(&self) {
        let Some(bundles) = self.shared().bundles.as_ref() else {
            objbridge_log::trace!("no bundle loader, skipping preload");
            return;
        };
        for name in &self.config().preload {
            let Some(path) = bundles.locate(name) else {
                objbridge_log::debug!("preload framework {name} not found");
                continue;
            };
            if let Err(err) = self.load_signatures_at(name, &path) {
                objbridge_log::warn!("{err}");
            }
        }
    }

    fn load_signatures_at(&self, name: &str, path: &Path) -> Result<bool> {
        let Some(loader) = self.signatures() else {
            return Ok(false);
        };
        let found = loader
            .load_signatures(path)
            .map_err(|source| Error::ForeignDispatchFailure {
                receiver: name.to_string(),
                selector: "load_signatures".to_string(),
                source,
            })?;
        if !found {
            objbridge_log::warn!("no signature metadata for {name} at {}", path.display());
        }
        Ok(found)
    }

    /// Loads a framework and its signature metadata.
    ///
    /// Returns `false` if the framework was already loaded.
    ///
    /// # Errors
    ///
    /// [`Error::FrameworkNotFound`] if there is no bundle loader, the
    /// framework can't be located, or the loader refuses it.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use objbridge::runtime::{LocalRuntime, MemoryBundles};
    /// use objbridge::Bridge;
    ///
    /// let bundles = Arc::new(MemoryBundles::new().with_framework("AppKit", "/F/AppKit"));
    /// let bridge = Bridge::builder(LocalRuntime::new()).bundles(bundles).build();
    ///
    /// assert!(bridge.require_framework("AppKit").unwrap());
    /// assert!(!bridge.require_framework("AppKit").unwrap());
    /// assert!(bridge.framework_loaded("AppKit"));
    /// ```
    pub fn require_framework(&self, name: &str) -> Result<bool> {
        let not_found = || Error::FrameworkNotFound { name: name.to_string() };
        let bundles = self.shared().bundles.as_ref().ok_or_else(not_found)?;
        let path = bundles.locate(name).ok_or_else(not_found)?;
        if bundles.is_loaded(&path) {
            return Ok(false);
        }
        let loaded = bundles.load(&path).map_err(|source| Error::ForeignDispatchFailure {
            receiver: name.to_string(),
            selector: "load".to_string(),
            source,
        })?;
        if !loaded {
            return Err(not_found());
        }
        self.load_signatures_at(name, &path)?;
        objbridge_log::info!("loaded framework {name} from {}", path.display());
        Ok(true)
    }

    /// Returns `true` if the framework has been loaded.
    pub fn framework_loaded(&self, name: &str) -> bool {
        let Some(bundles) = self.shared().bundles.as_ref() else {
            return false;
        };
        bundles.locate(name).is_some_and(|path| bundles.is_loaded(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::runtime::{LocalRuntime, MemoryBundles, MemorySignatures};
    use crate::value::Value;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[test]
    fn test_require_loads_signatures() {
        let sigs = Arc::new(MemorySignatures::new().with_bundle("/F/AppKit", [("NSOKButton", Value::Int(1))]));
        let bundles = Arc::new(MemoryBundles::new().with_framework("AppKit", "/F/AppKit"));
        let bridge = Bridge::builder(LocalRuntime::new())
            .signatures(sigs.clone())
            .bundles(bundles)
            .build();

        assert!(!bridge.framework_loaded("AppKit"));
        assert!(bridge.resolve("NSOKButton").is_err());
        assert!(bridge.require_framework("AppKit").unwrap());
        assert!(bridge.framework_loaded("AppKit"));
        assert_eq!(
            bridge.resolve("NSOKButton").unwrap().as_constant(),
            Some(&Value::Int(1))
        );
        assert!(!bridge.require_framework("AppKit").unwrap());
        assert_eq!(sigs.loaded(), vec![PathBuf::from("/F/AppKit")]);
    }

    #[test]
    fn test_unknown_framework() {
        let bridge = Bridge::builder(LocalRuntime::new())
            .bundles(Arc::new(MemoryBundles::new()))
            .build();
        assert_eq!(
            bridge.require_framework("Quartz").unwrap_err(),
            Error::FrameworkNotFound { name: "Quartz".into() }
        );
        let bare = Bridge::new(LocalRuntime::new());
        assert!(matches!(bare.require_framework("Quartz"), Err(Error::FrameworkNotFound { .. })));
        assert!(!bare.framework_loaded("Quartz"));
    }

    #[test]
    fn test_preload_reads_configured_frameworks() {
        let sigs = Arc::new(
            MemorySignatures::new()
                .with_bundle("/F/Foundation", [("NSNotFound", Value::Int(i64::MAX))])
                .with_bundle("/F/Extra", [("XExtra", Value::Int(2))]),
        );
        let bundles = Arc::new(
            MemoryBundles::new()
                .with_framework("Foundation", "/F/Foundation")
                .with_framework("Extra", "/F/Extra"),
        );
        let bridge = Bridge::builder(LocalRuntime::new())
            .config(BridgeConfig::default().with_preload(["Foundation", "Missing"]))
            .signatures(sigs.clone())
            .bundles(bundles)
            .build();

        assert_eq!(sigs.loaded(), vec![PathBuf::from("/F/Foundation")]);
        assert!(bridge.resolve("NSNotFound").is_ok());
        assert!(bridge.resolve("XExtra").is_err());
    }
}
