//! Host-side instances of mirror classes.
//!
//! An [`Instance`] is a foreign object seen through its mirror class. The
//! foreign object owns all real state; the host side only keeps a small
//! companion ([`HostState`]) holding accessor slots and map defaults, shared
//! by every `Instance` that wraps the same object.

use super::forward::Call;
use super::mirror::MirrorClass;
use super::{Bridge, accessor};
use crate::error::{Error, Result};
use crate::foreign::ObjectId;
use crate::selector::selector_for_call;
use crate::value::{ObjectRef, Value};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Computed default for missing map keys, called with the container and the
/// key.
pub type DefaultProc = Arc<dyn Fn(&Value, &Value) -> Result<Value> + Send + Sync>;

/// Host-side state attached to one foreign object.
#[derive(Default)]
pub struct HostState {
    slots: Mutex<FxHashMap<String, Value>>,
    default_value: Mutex<Option<Value>>,
    default_proc: Mutex<Option<DefaultProc>>,
}

impl HostState {
    pub fn slot(&self, key: &str) -> Option<Value> {
        self.slots.lock().get(key).cloned()
    }

    pub fn set_slot(&self, key: &str, value: Value) {
        self.slots.lock().insert(key.to_string(), value);
    }

    pub fn has_slot(&self, key: &str) -> bool {
        self.slots.lock().contains_key(key)
    }

    pub fn default_value(&self) -> Option<Value> {
        self.default_value.lock().clone()
    }

    pub fn set_default_value(&self, value: Option<Value>) {
        *self.default_value.lock() = value;
    }

    pub fn default_proc(&self) -> Option<DefaultProc> {
        self.default_proc.lock().clone()
    }

    pub fn set_default_proc(&self, proc_: Option<DefaultProc>) {
        *self.default_proc.lock() = proc_;
    }
}

impl fmt::Debug for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostState")
            .field("slots", &*self.slots.lock())
            .field("default_value", &*self.default_value.lock())
            .field("default_proc", &self.default_proc.lock().is_some())
            .finish()
    }
}

/// A foreign object together with its mirror class.
#[derive(Clone)]
pub struct Instance {
    object: ObjectRef,
    class: MirrorClass,
    state: Arc<HostState>,
}

impl Instance {
    #[inline]
    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    #[inline]
    pub fn class(&self) -> &MirrorClass {
        &self.class
    }

    pub fn state(&self) -> &HostState {
        &self.state
    }

    pub fn id(&self) -> ObjectId {
        self.object.id()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.object.clone())
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.object == other.object
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<{} {}>", self.class.name(), self.object.id())
    }
}

impl Bridge {
    /// The companion state of a foreign object, created on first use.
    ///
    /// The state lives until the foreign object is deallocated. A dead object
    /// gets a fresh state that is not kept.
    pub fn companion(&self, id: ObjectId) -> Arc<HostState> {
        let mut companions = self.shared().companions.lock();
        if let Some(state) = companions.get(&id) {
            return Arc::clone(state);
        }
        let state = Arc::new(HostState::default());
        let shared = Arc::downgrade(&self.shared);
        let attached = self.runtime().on_dealloc(
            id,
            Box::new(move |id| {
                if let Some(shared) = shared.upgrade() {
                    // Slots may hold the last handle to other objects, so the
                    // state is dropped after the lock.
                    let removed = shared.companions.lock().remove(&id);
                    drop(removed);
                }
            }),
        );
        if attached {
            companions.insert(id, Arc::clone(&state));
        }
        state
    }

    /// Drops the companion state of a foreign object before it dies.
    pub fn forget_companion(&self, id: ObjectId) {
        let removed = self.shared().companions.lock().remove(&id);
        drop(removed);
    }

    /// Number of foreign objects that currently have companion state.
    pub fn companion_count(&self) -> usize {
        self.shared().companions.lock().len()
    }

    /// Wraps a foreign object in the mirror of its class.
    ///
    /// Objects of internal classes get the mirror of their nearest
    /// representable ancestor.
    pub fn wrap(&self, object: &ObjectRef) -> Result<Instance> {
        let class = self.mirror_for_handle(self.class_of(object)?)?;
        Ok(Instance {
            object: object.clone(),
            class,
            state: self.companion(object.id()),
        })
    }

    /// Wraps a value holding a foreign object.
    pub fn wrap_value(&self, value: &Value) -> Result<Instance> {
        match value {
            Value::Object(object) => self.wrap(object),
            other => Err(Error::InvalidArgument {
                receiver: other.type_name().to_string(),
                operation: "wrap".to_string(),
                reason: "not a foreign object".to_string(),
            }),
        }
    }

    /// Allocates an uninitialized instance of `class`.
    pub fn alloc(&self, class: &MirrorClass) -> Result<Instance> {
        let handle = class.foreign().ok_or_else(|| Error::UseForeignInitializer {
            class: class.name().to_string(),
        })?;
        let object = self
            .runtime()
            .create_instance(handle)
            .map_err(|source| Error::ForeignDispatchFailure {
                receiver: class.name().to_string(),
                selector: "alloc".to_string(),
                source,
            })?;
        let state = self.companion(object.id());
        Ok(Instance {
            object,
            class: class.clone(),
            state,
        })
    }

    /// Allocates an instance and runs `initializer` on it.
    ///
    /// The initializer's result is the instance, since initializers may
    /// return a different object than the one allocated.
    pub fn alloc_init(&self, class: &MirrorClass, initializer: &str, args: Vec<Value>) -> Result<Instance> {
        let allocated = self.alloc(class)?;
        match self.send(&allocated, initializer, args)? {
            Value::Object(object) if object == *allocated.object() => Ok(allocated),
            Value::Object(object) => self.wrap(&object),
            _ => Err(Error::InvalidArgument {
                receiver: class.name().to_string(),
                operation: initializer.to_string(),
                reason: "initializer did not return an object".to_string(),
            }),
        }
    }

    /// The host constructor. Mirror classes can only be instantiated through
    /// [`alloc`](Self::alloc) and a foreign initializer, so this always fails.
    pub fn new_instance(&self, class: &MirrorClass) -> Result<Instance> {
        Err(Error::UseForeignInitializer {
            class: class.name().to_string(),
        })
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Calls `name` on an instance.
    pub fn send(&self, receiver: &Instance, name: &str, args: Vec<Value>) -> Result<Value> {
        self.call(receiver, &Call::new(name, args))
    }

    /// Calls `name` on the instance wrapping `object`.
    pub fn send_object(&self, object: &ObjectRef, name: &str, args: Vec<Value>) -> Result<Value> {
        self.send(&self.wrap(object)?, name, args)
    }

    /// Runs a call through host methods, accessors and the dispatch
    /// forwarder, in that order.
    pub fn call(&self, receiver: &Instance, call: &Call) -> Result<Value> {
        if let Some(method) = receiver.class().find_method(&call.name) {
            return method.call(self, receiver, &call.args);
        }
        if let Some(result) = accessor::dispatch(self, receiver, call)? {
            return Ok(result);
        }
        match receiver.class().forwarder() {
            Some(forward) => forward(self, receiver, call),
            None => Err(Error::NoMethod {
                class: receiver.class().name().to_string(),
                name: call.name.clone(),
                tried: vec!["host method", "accessor"],
            }),
        }
    }

    /// Sends `name` to the superclass implementation of `from`.
    pub fn send_super(
        &self,
        receiver: &Instance,
        from: &MirrorClass,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        let selector = selector_for_call(name, args.len());
        let parent = from
            .superclass()
            .and_then(MirrorClass::foreign)
            .ok_or_else(|| Error::NoMethod {
                class: from.name().to_string(),
                name: name.to_string(),
                tried: vec!["superclass"],
            })?;
        self.runtime()
            .invoke_super(receiver.object(), parent, &selector, &args)
            .map_err(|source| Error::ForeignDispatchFailure {
                receiver: self.class_name_of(receiver.object()),
                selector,
                source,
            })
    }

    /// Calls a class method: host class methods first, then the foreign
    /// class object.
    pub fn send_class(&self, class: &MirrorClass, name: &str, args: Vec<Value>) -> Result<Value> {
        if let Some(method) = class.find_class_method(name) {
            return method.call(self, class, &args);
        }
        let handle = class.foreign().ok_or_else(|| Error::NoMethod {
            class: class.name().to_string(),
            name: name.to_string(),
            tried: vec!["host class method"],
        })?;
        self.invoke_class(handle, &selector_for_call(name, args.len()), &args)
    }

    /// Returns `true` if a call to `name` would find an implementation
    /// without falling back to the foreign side's error path.
    pub fn responds_to(&self, receiver: &Instance, name: &str) -> Result<bool> {
        let class = receiver.class();
        if class.find_method(name).is_some() || accessor::binds(class, name) {
            return Ok(true);
        }
        if let Some(family) = self.family_of(receiver.object())? {
            if crate::adapters::contract(family).contains(&name) {
                return Ok(true);
            }
        }
        for argc in [0, 1] {
            let selector = Value::from(selector_for_call(name, argc));
            if self
                .invoke(receiver.object(), "respondsToSelector:", &[selector])?
                .truthy()
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
