//! Mirror classes and their registry.
//!
//! Every representable foreign class gets exactly one [`MirrorClass`] per
//! bridge, created lazily on first reference. The mirror chain follows the
//! foreign superclass chain, skipping internal classes whose names can't be
//! host identifiers, and ends at a shared root mirror.
//!
//! # Thread Safety
//!
//! Lookups of already imported classes only take a read lock. Imports are
//! serialized by a reentrant lock so that concurrent resolution of one name
//! still produces one mirror; reentrancy lets an import resolve its own
//! superclasses on the same thread.

use super::Bridge;
use super::accessor::AccessorBinding;
use super::forward::ForwarderHook;
use super::registrar::{HostClassMethod, HostMethod};
use crate::error::{Error, Result};
use crate::foreign::ClassHandle;
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::{ReentrantMutex, RwLock};
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

pub(crate) struct MirrorInner {
    name: String,
    foreign: Option<ClassHandle>,
    superclass: Option<MirrorClass>,
    derived: bool,
    forwarder: Option<ForwarderHook>,
    pub(crate) accessors: RwLock<FxHashMap<String, Arc<AccessorBinding>>>,
    pub(crate) methods: RwLock<FxHashMap<String, HostMethod>>,
    pub(crate) class_methods: RwLock<FxHashMap<String, HostClassMethod>>,
}

/// Host-side proxy for one foreign class.
///
/// Clones refer to the same mirror; equality is identity.
#[derive(Clone)]
pub struct MirrorClass {
    inner: Arc<MirrorInner>,
}

impl MirrorClass {
    pub(crate) fn new(
        name: &str,
        foreign: Option<ClassHandle>,
        superclass: Option<MirrorClass>,
        derived: bool,
        forwarder: Option<ForwarderHook>,
    ) -> Self {
        MirrorClass {
            inner: Arc::new(MirrorInner {
                name: name.to_string(),
                foreign,
                superclass,
                derived,
                forwarder,
                accessors: RwLock::new(FxHashMap::default()),
                methods: RwLock::new(FxHashMap::default()),
                class_methods: RwLock::new(FxHashMap::default()),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &MirrorInner {
        &self.inner
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The foreign class this mirror stands for. `None` only for the root.
    #[inline]
    pub fn foreign(&self) -> Option<ClassHandle> {
        self.inner.foreign
    }

    pub fn superclass(&self) -> Option<&MirrorClass> {
        self.inner.superclass.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.inner.superclass.is_none()
    }

    /// Returns `true` for classes created by host subclassing.
    pub fn is_derived(&self) -> bool {
        self.inner.derived
    }

    /// Superclasses, nearest first, ending with the root.
    pub fn ancestors(&self) -> Vec<MirrorClass> {
        let mut out = Vec::new();
        let mut current = self.superclass();
        while let Some(class) = current {
            out.push(class.clone());
            current = class.superclass();
        }
        out
    }

    /// Returns `true` if `self` is `other` or inherits from it.
    pub fn is_subclass_of(&self, other: &MirrorClass) -> bool {
        self == other || self.ancestors().iter().any(|a| a == other)
    }

    /// This class followed by its superclasses.
    fn lineage(&self) -> impl Iterator<Item = &MirrorClass> {
        std::iter::successors(Some(self), |c| c.superclass())
    }

    /// The dispatch forwarder, installed on the class directly below the
    /// root and inherited from there.
    pub(crate) fn forwarder(&self) -> Option<ForwarderHook> {
        self.lineage().find_map(|c| c.inner.forwarder)
    }

    pub(crate) fn find_method(&self, name: &str) -> Option<HostMethod> {
        self.lineage()
            .find_map(|c| c.inner.methods.read().get(name).cloned())
    }

    pub(crate) fn find_class_method(&self, name: &str) -> Option<HostClassMethod> {
        self.lineage()
            .find_map(|c| c.inner.class_methods.read().get(name).cloned())
    }

    pub(crate) fn find_accessor(&self, key: &str) -> Option<Arc<AccessorBinding>> {
        self.lineage()
            .find_map(|c| c.inner.accessors.read().get(key).cloned())
    }

    /// The nearest accessor binding matching `pred`.
    pub(crate) fn find_accessor_where(
        &self,
        pred: impl Fn(&AccessorBinding) -> bool,
    ) -> Option<Arc<AccessorBinding>> {
        self.lineage().find_map(|c| {
            c.inner
                .accessors
                .read()
                .values()
                .find(|b| pred(b))
                .cloned()
        })
    }

    /// Host methods defined directly on this class.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.methods.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Keys with an accessor binding on this class.
    pub fn accessor_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.accessors.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl PartialEq for MirrorClass {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for MirrorClass {}

impl fmt::Debug for MirrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorClass")
            .field("name", &self.inner.name)
            .field("foreign", &self.inner.foreign)
            .field("derived", &self.inner.derived)
            .finish()
    }
}

impl fmt::Display for MirrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

// ============================================================================
// Registry
// ============================================================================

pub(crate) struct MirrorRegistry {
    root: MirrorClass,
    by_name: RwLock<FxHashMap<String, MirrorClass>>,
    by_handle: RwLock<FxHashMap<ClassHandle, MirrorClass>>,
    /// Names being imported on the owning thread, outermost first.
    importing: ReentrantMutex<RefCell<Vec<String>>>,
}

impl MirrorRegistry {
    pub(crate) fn new(root_name: &str) -> Self {
        let root = MirrorClass::new(root_name, None, None, false, None);
        let mut by_name = FxHashMap::default();
        by_name.insert(root_name.to_string(), root.clone());
        MirrorRegistry {
            root,
            by_name: RwLock::new(by_name),
            by_handle: RwLock::new(FxHashMap::default()),
            importing: ReentrantMutex::new(RefCell::new(Vec::new())),
        }
    }

    fn cached(&self, name: &str) -> Option<MirrorClass> {
        self.by_name.read().get(name).cloned()
    }

    fn cached_handle(&self, handle: ClassHandle) -> Option<MirrorClass> {
        self.by_handle.read().get(&handle).cloned()
    }

    pub(crate) fn insert(&self, name: &str, mirror: &MirrorClass) {
        if let Some(handle) = mirror.foreign() {
            self.by_handle.write().insert(handle, mirror.clone());
        }
        self.by_name.write().insert(name.to_string(), mirror.clone());
    }

    /// Runs `f` while holding the import lock.
    pub(crate) fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.importing.lock();
        f()
    }
}

impl Bridge {
    /// The shared root of every mirror chain.
    pub fn root(&self) -> MirrorClass {
        self.shared().registry.root.clone()
    }

    /// Returns the mirror registered under `name` without importing.
    pub fn mirror(&self, name: &str) -> Option<MirrorClass> {
        self.shared().registry.cached(name)
    }

    /// Resolves a foreign class name to its mirror, importing it and any
    /// missing superclasses on first use.
    ///
    /// # Errors
    ///
    /// - [`Error::ClassNotFound`] if the foreign runtime has no such class or
    ///   the name can't be a host identifier.
    /// - [`Error::ImportCycle`] if the foreign hierarchy loops back onto a
    ///   class that is still being imported.
    ///
    /// # Example
    ///
    /// ```
    /// use objbridge::runtime::LocalRuntime;
    /// use objbridge::Bridge;
    ///
    /// let bridge = Bridge::new(LocalRuntime::new());
    /// let a = bridge.import_class("NSMutableArray").unwrap();
    /// let b = bridge.import_class("NSMutableArray").unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(a.ancestors().len(), 3);
    /// ```
    pub fn import_class(&self, name: &str) -> Result<MirrorClass> {
        let registry = &self.shared().registry;
        if let Some(found) = registry.cached(name) {
            return Ok(found);
        }
        if !self.config().is_representable(name) {
            return Err(Error::ClassNotFound { name: name.to_string() });
        }

        let importing = registry.importing.lock();
        // Another thread may have finished this import while we waited.
        if let Some(found) = registry.cached(name) {
            return Ok(found);
        }
        if importing.borrow().iter().any(|n| n == name) {
            let mut chain = importing.borrow().clone();
            chain.push(name.to_string());
            return Err(Error::ImportCycle {
                name: name.to_string(),
                chain,
            });
        }

        let handle = self
            .runtime()
            .class_by_name(name)
            .ok_or_else(|| Error::ClassNotFound { name: name.to_string() })?;
        if let Some(existing) = registry.cached_handle(handle) {
            registry.insert(name, &existing);
            return Ok(existing);
        }

        importing.borrow_mut().push(name.to_string());
        let built = self.build_mirror(name, handle);
        importing.borrow_mut().pop();
        built
    }

    fn build_mirror(&self, name: &str, handle: ClassHandle) -> Result<MirrorClass> {
        objbridge_log::debug!("importing foreign class {name}");
        let superclass = self.lookup_superclass(handle)?;
        let forwarder = if superclass.is_root() {
            Some(super::forward::forward as ForwarderHook)
        } else {
            None
        };
        let mirror = MirrorClass::new(name, Some(handle), Some(superclass), false, forwarder);
        self.shared().registry.insert(name, &mirror);

        objbridge_log::debug!(
            "imported {name} < {}",
            mirror
                .ancestors()
                .iter()
                .map(MirrorClass::name)
                .collect::<Vec<_>>()
                .join(" < ")
        );
        Ok(mirror)
    }

    /// Finds the mirror for the nearest representable ancestor of `handle`.
    fn lookup_superclass(&self, handle: ClassHandle) -> Result<MirrorClass> {
        let registry = &self.shared().registry;
        let mut visited = FxHashSet::default();
        let mut skipped = Vec::new();
        visited.insert(handle);
        let mut current = handle;

        loop {
            let Some(parent) = self.runtime().superclass_of(current) else {
                return Ok(self.root());
            };
            // Self-parented root sentinel.
            if parent == current {
                return Ok(self.root());
            }
            if !visited.insert(parent) {
                let mut chain = vec![self.foreign_class_name(handle)];
                chain.extend(skipped);
                chain.push(self.foreign_class_name(parent));
                return Err(Error::ImportCycle {
                    name: self.foreign_class_name(handle),
                    chain,
                });
            }
            if let Some(mirror) = registry.cached_handle(parent) {
                return Ok(mirror);
            }
            match self.runtime().class_name(parent) {
                Some(name) if self.config().is_representable(&name) => {
                    return self.import_class(&name);
                }
                other => {
                    objbridge_log::trace!(
                        "skipping internal superclass {}",
                        other.as_deref().unwrap_or("<unnamed>")
                    );
                    skipped.push(other.unwrap_or_else(|| format!("#{}", parent.0)));
                    current = parent;
                }
            }
        }
    }

    /// The mirror for a foreign class handle: its own mirror when its name is
    /// representable, otherwise the mirror of its nearest representable
    /// ancestor.
    pub fn mirror_for_handle(&self, handle: ClassHandle) -> Result<MirrorClass> {
        if let Some(mirror) = self.shared().registry.cached_handle(handle) {
            return Ok(mirror);
        }
        let name = self
            .runtime()
            .class_name(handle)
            .ok_or_else(|| Error::ClassNotFound { name: format!("#{}", handle.0) })?;
        if self.config().is_representable(&name) {
            return self.import_class(&name);
        }
        self.lookup_superclass(handle)
    }

    pub(crate) fn register_mirror(&self, name: &str, mirror: &MirrorClass) {
        self.shared().registry.insert(name, mirror);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign::ForeignRuntime;
    use crate::runtime::LocalRuntime;

    fn chain(mirror: &MirrorClass) -> Vec<String> {
        std::iter::once(mirror.clone())
            .chain(mirror.ancestors())
            .map(|m| m.name().to_string())
            .collect()
    }

    #[test]
    fn test_import_builds_chain_to_root() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt);
        let m = bridge.import_class("NSMutableString").unwrap();
        assert_eq!(chain(&m), vec!["NSMutableString", "NSString", "NSObject", "ObjcID"]);
        assert!(bridge.mirror("NSString").is_some());
    }

    #[test]
    fn test_forwarder_only_below_root() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt);
        let obj = bridge.import_class("NSObject").unwrap();
        let s = bridge.import_class("NSString").unwrap();
        assert!(obj.inner().forwarder.is_some());
        assert!(s.inner().forwarder.is_none());
        assert!(s.forwarder().is_some());
        assert!(bridge.root().forwarder().is_none());
    }

    #[test]
    fn test_internal_classes_are_skipped() {
        let rt = LocalRuntime::new();
        let base = rt.class_by_name("NSObject").unwrap();
        let hidden = rt.define_class("_NSHidden", Some(base)).unwrap();
        let proxy = rt.define_class("%Proxy", Some(hidden)).unwrap();
        rt.define_class("Visible", Some(proxy)).unwrap();

        let bridge = Bridge::new(rt);
        let visible = bridge.import_class("Visible").unwrap();
        assert_eq!(chain(&visible), vec!["Visible", "NSObject", "ObjcID"]);
        assert!(bridge.mirror("_NSHidden").is_none());
        assert!(matches!(
            bridge.import_class("_NSHidden"),
            Err(Error::ClassNotFound { .. })
        ));
    }

    #[test]
    fn test_mirror_for_internal_handle_uses_ancestor() {
        let rt = LocalRuntime::new();
        let base = rt.class_by_name("NSObject").unwrap();
        let hidden = rt.define_class("__NSCFThing", Some(base)).unwrap();
        let bridge = Bridge::new(rt);
        let mirror = bridge.mirror_for_handle(hidden).unwrap();
        assert_eq!(mirror.name(), "NSObject");
    }

    #[test]
    fn test_missing_class() {
        let bridge = Bridge::new(LocalRuntime::new());
        assert_eq!(
            bridge.import_class("NoSuchThing").unwrap_err(),
            Error::ClassNotFound { name: "NoSuchThing".into() }
        );
    }

    #[test]
    fn test_root_resolves_by_name() {
        let bridge = Bridge::new(LocalRuntime::new());
        let root = bridge.import_class("ObjcID").unwrap();
        assert!(root.is_root());
        assert_eq!(root, bridge.root());
    }
}
