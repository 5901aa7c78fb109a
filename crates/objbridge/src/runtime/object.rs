//! Instances of the local runtime and their reference counts.
//!
//! An instance stays in the object table while its count is above zero. The
//! count starts at one for the allocation; [`ObjectRef`] handles give that
//! retain back when the last clone is dropped.

use super::LocalRuntime;
use crate::error::{ForeignError, ForeignResult};
use crate::foreign::{ClassHandle, ObjectId};
use crate::value::{ObjectRef, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Backing storage of an instance.
#[derive(Debug, Clone, Default)]
pub(crate) enum Payload {
    #[default]
    Plain,
    Text(String),
    Array(Vec<Value>),
    Dict(Vec<(Value, Value)>),
}

pub(crate) struct RuntimeObject {
    pub(crate) class: ClassHandle,
    refcount: AtomicU32,
    pub(crate) payload: Mutex<Payload>,
}

impl RuntimeObject {
    fn new(class: ClassHandle, payload: Payload) -> Self {
        RuntimeObject {
            class,
            refcount: AtomicU32::new(1),
            payload: Mutex::new(payload),
        }
    }

    pub(crate) fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }
}

impl LocalRuntime {
    pub(crate) fn object(&self, id: ObjectId) -> ForeignResult<Arc<RuntimeObject>> {
        self.objects
            .read()
            .get(&id)
            .cloned()
            .ok_or(ForeignError::InvalidObject { id: id.0 })
    }

    /// Allocates an instance with an explicit payload.
    pub(crate) fn allocate(&self, class: ClassHandle, payload: Payload) -> ObjectRef {
        let id = ObjectId(self.next_object.fetch_add(1, Ordering::Relaxed));
        let object = Arc::new(RuntimeObject::new(class, payload));
        self.objects.write().insert(id, object);
        ObjectRef::adopt(self.weak_dyn(), id)
    }

    /// The payload a fresh instance of `class` starts with.
    pub(crate) fn initial_payload(&self, class: ClassHandle) -> Payload {
        let Some(names) = self.foundation.get() else {
            return Payload::Plain;
        };
        if self.is_kind_of(class, &names.text) {
            Payload::Text(String::new())
        } else if self.is_kind_of(class, &names.array) {
            Payload::Array(Vec::new())
        } else if self.is_kind_of(class, &names.dictionary) {
            Payload::Dict(Vec::new())
        } else {
            Payload::Plain
        }
    }

    pub(crate) fn retain_object(&self, id: ObjectId) {
        if let Ok(object) = self.object(id) {
            object.refcount.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub(crate) fn release_object(&self, id: ObjectId) {
        let Ok(object) = self.object(id) else {
            return;
        };
        if object.refcount.fetch_sub(1, Ordering::AcqRel) == 1 {
            let (removed, hooks) = {
                let mut objects = self.objects.write();
                (objects.remove(&id), self.dealloc_hooks.lock().remove(&id))
            };
            // Dropping the payload may release nested instances, which takes
            // the table lock again.
            drop(removed);
            for hook in hooks.into_iter().flatten() {
                hook(id);
            }
        }
    }

    /// Current foreign reference count of an instance, or `None` once it
    /// has been deallocated.
    pub fn refcount(&self, id: ObjectId) -> Option<u32> {
        self.object(id).ok().map(|o| o.refcount())
    }

    /// Number of live instances.
    pub fn live_objects(&self) -> usize {
        self.objects.read().len()
    }

    /// Runs `f` with the payload of `object` locked.
    pub(crate) fn with_payload<R>(&self, object: &ObjectRef, f: impl FnOnce(&mut Payload) -> R) -> ForeignResult<R> {
        let target = self.object(object.id())?;
        let mut payload = target.payload.lock();
        Ok(f(&mut payload))
    }

    /// A detached copy of an instance's payload.
    pub(crate) fn snapshot(&self, object: &ObjectRef) -> ForeignResult<Payload> {
        self.with_payload(object, |p| p.clone())
    }

    /// The contents of a string, array or dictionary instance as a host
    /// value, one level deep. Other instances yield `Value::Nil`.
    pub fn contents(&self, object: &ObjectRef) -> ForeignResult<Value> {
        Ok(match self.snapshot(object)? {
            Payload::Plain => Value::Nil,
            Payload::Text(s) => Value::Str(s),
            Payload::Array(items) => Value::Array(items),
            Payload::Dict(pairs) => Value::Map(pairs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::LocalRuntime;
    use crate::foreign::ForeignRuntime;

    #[test]
    fn test_last_handle_deallocates() {
        let rt = LocalRuntime::new();
        let class = rt.class_by_name("NSObject").unwrap();
        let before = rt.live_objects();

        let obj = rt.create_instance(class).unwrap();
        let id = obj.id();
        let copy = obj.clone();
        assert_eq!(rt.refcount(id), Some(1));

        drop(obj);
        assert_eq!(rt.refcount(id), Some(1));
        drop(copy);
        assert_eq!(rt.refcount(id), None);
        assert_eq!(rt.live_objects(), before);
    }

    #[test]
    fn test_explicit_retain_keeps_object() {
        let rt = LocalRuntime::new();
        let class = rt.class_by_name("NSObject").unwrap();
        let obj = rt.create_instance(class).unwrap();
        let id = obj.id();

        rt.retain(id);
        drop(obj);
        assert_eq!(rt.refcount(id), Some(1));
        rt.release(id);
        assert_eq!(rt.refcount(id), None);
    }

    #[test]
    fn test_nested_release() {
        let rt = LocalRuntime::new();
        let inner = rt.new_string("inner", false);
        let inner_id = inner.id();
        let outer = rt.new_array(vec![inner.into()], true);

        assert!(rt.refcount(inner_id).is_some());
        drop(outer);
        assert_eq!(rt.refcount(inner_id), None);
    }
}
