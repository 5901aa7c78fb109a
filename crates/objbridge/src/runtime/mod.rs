//! An in-process foreign runtime.
//!
//! [`LocalRuntime`] is a small Objective-C flavoured object model that
//! implements [`ForeignRuntime`]: named classes with single inheritance,
//! refcounted instances, selector dispatch with signature checking, and a
//! recorded change-notification log. It ships the Foundation collection
//! classes the bridge adapts (`NSString`, `NSArray`, `NSDictionary` and their
//! mutable variants) so the bridge can run without a platform runtime.
//!
//! # Example
//!
//! ```
//! use objbridge::foreign::ForeignRuntime;
//! use objbridge::runtime::LocalRuntime;
//! use objbridge::Value;
//!
//! let rt = LocalRuntime::new();
//! let s = rt.new_string("hello", false);
//! assert_eq!(rt.invoke(&s, "length", &[]).unwrap(), Value::Int(5));
//! ```

mod bundles;
pub mod class;
mod dispatch;
mod foundation;
pub mod object;
mod observe;
mod signatures;

pub use bundles::MemoryBundles;
pub use class::{ClassNativeFn, Method, NativeFn};
pub use observe::{Notification, Phase};
pub use signatures::MemorySignatures;

use crate::encoding::Signature;
use crate::error::{ForeignError, ForeignResult};
use crate::foreign::{ClassHandle, DeallocHook, ForeignRuntime, IndexChange, MethodImp, ObjectId};
use crate::selector::Selector;
use crate::value::{ObjectRef, Value};
use class::{Imp, RuntimeClass};
use fxhash::FxHashMap;
use object::RuntimeObject;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, OnceLock, Weak};

/// Names of the Foundation classes installed at start-up.
#[derive(Debug, Clone)]
pub(crate) struct FoundationNames {
    pub(crate) root: String,
    pub(crate) text: String,
    pub(crate) mutable_text: String,
    pub(crate) array: String,
    pub(crate) mutable_array: String,
    pub(crate) dictionary: String,
    pub(crate) mutable_dictionary: String,
}

/// The in-process runtime.
pub struct LocalRuntime {
    me: Weak<LocalRuntime>,
    classes: RwLock<Vec<Arc<RuntimeClass>>>,
    names: RwLock<FxHashMap<String, ClassHandle>>,
    objects: RwLock<FxHashMap<ObjectId, Arc<RuntimeObject>>>,
    dealloc_hooks: Mutex<FxHashMap<ObjectId, Vec<DeallocHook>>>,
    next_object: AtomicU64,
    foundation: OnceLock<FoundationNames>,
    log: Mutex<Vec<Notification>>,
}

impl LocalRuntime {
    /// Creates a runtime with `NSObject` and the Foundation collection
    /// classes installed.
    pub fn new() -> Arc<LocalRuntime> {
        let rt = Self::bare();
        foundation::install(&rt);
        rt
    }

    /// Creates a runtime with no classes at all.
    pub fn bare() -> Arc<LocalRuntime> {
        Arc::new_cyclic(|me| LocalRuntime {
            me: me.clone(),
            classes: RwLock::new(Vec::new()),
            names: RwLock::new(FxHashMap::default()),
            objects: RwLock::new(FxHashMap::default()),
            dealloc_hooks: Mutex::new(FxHashMap::default()),
            next_object: AtomicU64::new(1),
            foundation: OnceLock::new(),
            log: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn weak_dyn(&self) -> Weak<dyn ForeignRuntime> {
        self.me.clone()
    }

    pub(crate) fn names(&self) -> ForeignResult<&FoundationNames> {
        self.foundation.get().ok_or_else(|| ForeignError::Exception {
            name: "NSInternalInconsistencyException".to_string(),
            reason: "Foundation classes are not installed".to_string(),
        })
    }

    pub(crate) fn class_name_of(&self, class: ClassHandle) -> String {
        self.class(class).map(|c| c.name.clone()).unwrap_or_else(|| format!("#{}", class.0))
    }

    pub(crate) fn receiver_class_name(&self, object: &ObjectRef) -> String {
        self.object(object.id())
            .map(|o| self.class_name_of(o.class))
            .unwrap_or_else(|_| "<dead object>".to_string())
    }

    /// Returns `true` if the instance's class is `ancestor_name` or inherits
    /// from it.
    pub fn object_is_kind_of(&self, object: &ObjectRef, ancestor_name: &str) -> bool {
        self.object(object.id())
            .map(|o| self.is_kind_of(o.class, ancestor_name))
            .unwrap_or(false)
    }
}

impl ForeignRuntime for LocalRuntime {
    fn class_by_name(&self, name: &str) -> Option<ClassHandle> {
        self.names.read().get(name).copied()
    }

    fn class_name(&self, class: ClassHandle) -> Option<String> {
        self.class(class).map(|c| c.name.clone())
    }

    fn superclass_of(&self, class: ClassHandle) -> Option<ClassHandle> {
        self.class(class).and_then(|c| c.parent)
    }

    fn class_of(&self, object: &ObjectRef) -> ForeignResult<ClassHandle> {
        Ok(self.object(object.id())?.class)
    }

    fn create_instance(&self, class: ClassHandle) -> ForeignResult<ObjectRef> {
        if self.class(class).is_none() {
            return Err(ForeignError::UnknownClass { handle: class.0 });
        }
        let payload = self.initial_payload(class);
        Ok(self.allocate(class, payload))
    }

    fn invoke(&self, receiver: &ObjectRef, selector: &str, args: &[Value]) -> ForeignResult<Value> {
        let class = self.object(receiver.id())?.class;
        self.send(receiver, class, selector, args)
    }

    fn invoke_super(
        &self,
        receiver: &ObjectRef,
        class: ClassHandle,
        selector: &str,
        args: &[Value],
    ) -> ForeignResult<Value> {
        self.send(receiver, class, selector, args)
    }

    fn invoke_class(&self, class: ClassHandle, selector: &str, args: &[Value]) -> ForeignResult<Value> {
        self.send_class(class, selector, args)
    }

    fn method_signature(&self, class: ClassHandle, selector: &str, is_static: bool) -> Option<Signature> {
        self.lookup_method(class, selector, is_static).map(|m| m.signature)
    }

    fn register_class(&self, name: &str, parent: ClassHandle) -> ForeignResult<ClassHandle> {
        self.define_class(name, Some(parent))
    }

    fn bind_method(
        &self,
        class: ClassHandle,
        selector: &str,
        signature: &Signature,
        is_static: bool,
        imp: MethodImp,
    ) -> ForeignResult<()> {
        self.insert_method(
            class,
            Method {
                selector: Selector::intern(selector),
                signature: signature.clone(),
                imp: Imp::Bound(imp),
            },
            is_static,
        )
    }

    fn will_change(&self, object: &ObjectRef, key: &str, change: Option<&IndexChange>) {
        self.record(object, key, Phase::Will, change);
    }

    fn did_change(&self, object: &ObjectRef, key: &str, change: Option<&IndexChange>) {
        self.record(object, key, Phase::Did, change);
    }

    fn set_keys_trigger_change_notifications(
        &self,
        class: ClassHandle,
        keys: &[String],
        dependent: &str,
    ) -> ForeignResult<()> {
        let target = self.class(class).ok_or(ForeignError::UnknownClass { handle: class.0 })?;
        let mut deps = target.dependents.write();
        for key in keys {
            let entry = (key.clone(), dependent.to_string());
            if !deps.contains(&entry) {
                deps.push(entry);
            }
        }
        Ok(())
    }

    fn retain(&self, object: ObjectId) {
        self.retain_object(object);
    }

    fn release(&self, object: ObjectId) {
        self.release_object(object);
    }

    fn on_dealloc(&self, object: ObjectId, hook: DeallocHook) -> bool {
        // Holding the table lock orders this against a concurrent dealloc.
        let objects = self.objects.read();
        if !objects.contains_key(&object) {
            return false;
        }
        self.dealloc_hooks.lock().entry(object).or_default().push(hook);
        true
    }
}
