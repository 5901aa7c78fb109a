//! Classes and method tables of the local runtime.
//!
//! Classes are registered once and never removed. Each class keeps separate
//! instance and class method tables keyed by interned selector, plus a lookup
//! cache that is flushed whenever any method is bound, so overrides published
//! after a lookup are seen by the next send.

use super::LocalRuntime;
use crate::encoding::Signature;
use crate::error::ForeignResult;
use crate::foreign::{ClassHandle, MethodImp};
use crate::selector::Selector;
use crate::value::{ObjectRef, Value};
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::fmt;

/// Native instance method implementation.
pub type NativeFn = fn(&LocalRuntime, &ObjectRef, &[Value]) -> ForeignResult<Value>;

/// Native class method implementation.
pub type ClassNativeFn = fn(&LocalRuntime, ClassHandle, &[Value]) -> ForeignResult<Value>;

#[derive(Clone)]
pub(crate) enum Imp {
    Native(NativeFn),
    ClassNative(ClassNativeFn),
    Bound(MethodImp),
}

/// A method table entry.
#[derive(Clone)]
pub struct Method {
    pub selector: Selector,
    pub signature: Signature,
    pub(crate) imp: Imp,
}

impl Method {
    /// Returns `true` if the implementation was published from the host side.
    pub fn is_bound(&self) -> bool {
        matches!(self.imp, Imp::Bound(_))
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("selector", &self.selector)
            .field("signature", &self.signature.encoding())
            .field("bound", &self.is_bound())
            .finish()
    }
}

pub(crate) struct RuntimeClass {
    pub(crate) name: String,
    pub(crate) parent: Option<ClassHandle>,
    methods: RwLock<FxHashMap<Selector, Method>>,
    class_methods: RwLock<FxHashMap<Selector, Method>>,
    cache: RwLock<FxHashMap<(Selector, bool), Method>>,
    /// `(trigger key, dependent key)` pairs.
    pub(crate) dependents: RwLock<Vec<(String, String)>>,
}

impl RuntimeClass {
    pub(crate) fn new(name: &str, parent: Option<ClassHandle>) -> Self {
        RuntimeClass {
            name: name.to_string(),
            parent,
            methods: RwLock::new(FxHashMap::default()),
            class_methods: RwLock::new(FxHashMap::default()),
            cache: RwLock::new(FxHashMap::default()),
            dependents: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn insert(&self, method: Method, is_static: bool) {
        let table = if is_static { &self.class_methods } else { &self.methods };
        table.write().insert(method.selector.clone(), method);
    }

    pub(crate) fn own_method(&self, selector: &str, is_static: bool) -> Option<Method> {
        let table = if is_static { &self.class_methods } else { &self.methods };
        table.read().get(selector).cloned()
    }

    pub(crate) fn cached(&self, selector: &Selector, is_static: bool) -> Option<Method> {
        self.cache.read().get(&(selector.clone(), is_static)).cloned()
    }

    pub(crate) fn remember(&self, selector: Selector, is_static: bool, method: Method) {
        self.cache.write().insert((selector, is_static), method);
    }

    pub(crate) fn flush_cache(&self) {
        self.cache.write().clear();
    }

    pub(crate) fn selectors(&self, is_static: bool) -> Vec<Selector> {
        let table = if is_static { &self.class_methods } else { &self.methods };
        table.read().keys().cloned().collect()
    }
}

impl LocalRuntime {
    pub(crate) fn class(&self, handle: ClassHandle) -> Option<std::sync::Arc<RuntimeClass>> {
        self.classes.read().get(handle.0 as usize).cloned()
    }

    /// Creates a class. `parent` is `None` for a root class.
    ///
    /// # Errors
    ///
    /// Returns `ClassExists` if the name is taken and `UnknownClass` if the
    /// parent handle was never issued.
    pub fn define_class(&self, name: &str, parent: Option<ClassHandle>) -> ForeignResult<ClassHandle> {
        use crate::error::ForeignError;

        if let Some(parent) = parent {
            if self.class(parent).is_none() {
                return Err(ForeignError::UnknownClass { handle: parent.0 });
            }
        }

        let mut names = self.names.write();
        if names.contains_key(name) {
            return Err(ForeignError::ClassExists { name: name.to_string() });
        }
        let mut classes = self.classes.write();
        let handle = ClassHandle(classes.len() as u64);
        classes.push(std::sync::Arc::new(RuntimeClass::new(name, parent)));
        names.insert(name.to_string(), handle);
        Ok(handle)
    }

    /// Adds a native instance method, parsing `encoding` for its signature.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a malformed encoding and `UnknownClass`
    /// for an unknown class.
    pub fn add_method(&self, class: ClassHandle, selector: &str, encoding: &str, imp: NativeFn) -> ForeignResult<()> {
        self.install(class, selector, encoding, Imp::Native(imp), false)
    }

    /// Adds a native class method.
    ///
    /// # Errors
    ///
    /// Same as [`add_method`](Self::add_method).
    pub fn add_class_method(
        &self,
        class: ClassHandle,
        selector: &str,
        encoding: &str,
        imp: ClassNativeFn,
    ) -> ForeignResult<()> {
        self.install(class, selector, encoding, Imp::ClassNative(imp), true)
    }

    fn install(&self, class: ClassHandle, selector: &str, encoding: &str, imp: Imp, is_static: bool) -> ForeignResult<()> {
        use crate::error::ForeignError;

        let signature = Signature::parse(encoding).map_err(|bad| ForeignError::InvalidArgument {
            selector: selector.to_string(),
            reason: format!("bad type '{}' in encoding '{encoding}'", bad.0),
        })?;
        self.insert_method(
            class,
            Method {
                selector: Selector::intern(selector),
                signature,
                imp,
            },
            is_static,
        )
    }

    pub(crate) fn insert_method(&self, class: ClassHandle, method: Method, is_static: bool) -> ForeignResult<()> {
        let target = self
            .class(class)
            .ok_or(crate::error::ForeignError::UnknownClass { handle: class.0 })?;
        target.insert(method, is_static);
        // Subclasses may have cached the method this one now shadows.
        for class in self.classes.read().iter() {
            class.flush_cache();
        }
        Ok(())
    }

    /// Finds the method `class` runs for `selector`, walking up the chain.
    pub fn lookup_method(&self, class: ClassHandle, selector: &str, is_static: bool) -> Option<Method> {
        let start = self.class(class)?;
        let key = Selector::intern(selector);
        if let Some(hit) = start.cached(&key, is_static) {
            return Some(hit);
        }

        let mut current = Some(start.clone());
        while let Some(class) = current {
            if let Some(method) = class.own_method(selector, is_static) {
                start.remember(key, is_static, method.clone());
                return Some(method);
            }
            current = class.parent.and_then(|p| self.class(p));
        }
        None
    }

    /// Returns `true` if `class` is `ancestor_name` or inherits from it.
    pub fn is_kind_of(&self, class: ClassHandle, ancestor_name: &str) -> bool {
        let mut current = self.class(class);
        while let Some(class) = current {
            if class.name == ancestor_name {
                return true;
            }
            current = class.parent.and_then(|p| self.class(p));
        }
        false
    }

    /// Selectors defined directly on `class`, sorted.
    pub fn own_selectors(&self, class: ClassHandle, is_static: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .class(class)
            .map(|c| c.selectors(is_static).iter().map(|s| s.name().to_string()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}
