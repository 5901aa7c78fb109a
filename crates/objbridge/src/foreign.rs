//! The seam between the bridge and a foreign runtime.
//!
//! The bridge never talks to a foreign object model directly. Everything it
//! needs (class lookup, instance creation, message sends, method binding and
//! the change-notification protocol) goes through [`ForeignRuntime`]. Bundle
//! and signature metadata loading are separate collaborators,
//! [`BundleLoader`] and [`SignatureLoader`].

use crate::encoding::Signature;
use crate::error::ForeignResult;
use crate::value::{ObjectRef, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opaque identity of one foreign class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassHandle(pub u64);

/// Opaque identity of one foreign instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Kind of change announced for an indexed (to-many) property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Setting,
    Insertion,
    Removal,
    Replacement,
}

/// The index-scoped part of a change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexChange {
    pub kind: ChangeKind,
    pub indexes: Vec<usize>,
}

impl IndexChange {
    /// A change touching a single index.
    pub fn at(kind: ChangeKind, index: usize) -> Self {
        IndexChange {
            kind,
            indexes: vec![index],
        }
    }
}

/// Receiver of a host implementation called from the foreign side.
#[derive(Debug, Clone, Copy)]
pub enum Receiver<'a> {
    Instance(&'a ObjectRef),
    Class(ClassHandle),
}

/// A host implementation bound into a foreign method table.
pub type MethodImp = Arc<dyn Fn(Receiver<'_>, &[Value]) -> ForeignResult<Value> + Send + Sync>;

/// Runs once when a foreign instance is deallocated.
pub type DeallocHook = Box<dyn FnOnce(ObjectId) + Send>;

/// The foreign object model.
///
/// Implementations must be usable from any thread. Calls block until the
/// foreign side returns.
pub trait ForeignRuntime: Send + Sync {
    /// Looks up a class by its foreign name.
    fn class_by_name(&self, name: &str) -> Option<ClassHandle>;

    /// Returns the foreign name of a class.
    fn class_name(&self, class: ClassHandle) -> Option<String>;

    /// Returns the parent of a class, or `None` for a root class.
    fn superclass_of(&self, class: ClassHandle) -> Option<ClassHandle>;

    /// Returns the class of a live instance.
    fn class_of(&self, object: &ObjectRef) -> ForeignResult<ClassHandle>;

    /// Allocates an uninitialized instance. The returned reference owns the
    /// allocation's initial retain.
    fn create_instance(&self, class: ClassHandle) -> ForeignResult<ObjectRef>;

    /// Sends `selector` to an instance.
    fn invoke(&self, receiver: &ObjectRef, selector: &str, args: &[Value]) -> ForeignResult<Value>;

    /// Sends `selector` to an instance, starting method lookup at `class`.
    fn invoke_super(
        &self,
        receiver: &ObjectRef,
        class: ClassHandle,
        selector: &str,
        args: &[Value],
    ) -> ForeignResult<Value>;

    /// Sends `selector` to a class object.
    fn invoke_class(&self, class: ClassHandle, selector: &str, args: &[Value]) -> ForeignResult<Value>;

    /// Returns the signature of the method `class` would run for `selector`,
    /// searching the whole superclass chain.
    fn method_signature(&self, class: ClassHandle, selector: &str, is_static: bool) -> Option<Signature>;

    /// Creates a new class named `name` under `parent`.
    fn register_class(&self, name: &str, parent: ClassHandle) -> ForeignResult<ClassHandle>;

    /// Publishes a host implementation into a class's method table.
    fn bind_method(
        &self,
        class: ClassHandle,
        selector: &str,
        signature: &Signature,
        is_static: bool,
        imp: MethodImp,
    ) -> ForeignResult<()>;

    /// Announces that `key` is about to change.
    fn will_change(&self, object: &ObjectRef, key: &str, change: Option<&IndexChange>);

    /// Announces that `key` has changed.
    fn did_change(&self, object: &ObjectRef, key: &str, change: Option<&IndexChange>);

    /// Registers `keys` as triggering change notifications for `dependent`.
    fn set_keys_trigger_change_notifications(
        &self,
        class: ClassHandle,
        keys: &[String],
        dependent: &str,
    ) -> ForeignResult<()>;

    /// Adds one foreign retain.
    fn retain(&self, object: ObjectId);

    /// Drops one foreign retain.
    fn release(&self, object: ObjectId);

    /// Arranges for `hook` to run when `object` is deallocated. Returns
    /// `false`, without keeping the hook, if the object is already gone.
    fn on_dealloc(&self, object: ObjectId, hook: DeallocHook) -> bool;
}

/// Locates and loads foreign bundles.
pub trait BundleLoader: Send + Sync {
    /// Returns the on-disk location of a named bundle.
    fn locate(&self, name: &str) -> Option<PathBuf>;

    /// Returns `true` if the bundle at `path` is already loaded.
    fn is_loaded(&self, path: &Path) -> bool;

    /// Loads the bundle at `path`, returning whether it is now loaded.
    fn load(&self, path: &Path) -> ForeignResult<bool>;
}

/// Provides foreign constant and type metadata.
pub trait SignatureLoader: Send + Sync {
    /// Makes the metadata shipped with the bundle at `path` queryable.
    /// Returns `false` if the bundle ships no metadata.
    fn load_signatures(&self, path: &Path) -> ForeignResult<bool>;

    /// Looks up a foreign constant or enumeration value.
    fn lookup_constant(&self, name: &str) -> Option<Value>;
}
