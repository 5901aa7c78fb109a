//! Property accessors and change notifications.
//!
//! Accessors are table entries, not generated methods. Each
//! [`AccessorBinding`] on a mirror class maps a property key to its getter
//! and setter names, where the value lives, and whether writes are
//! announced. A call is matched against the table at dispatch time:
//!
//! | Call                            | Meaning                         |
//! |---------------------------------|---------------------------------|
//! | `key`                           | read                            |
//! | `key=` / `setKey`               | write                           |
//! | `countOfKey`                    | indexed count                   |
//! | `objectInKeyAtIndex`            | indexed read                    |
//! | `insertObject_inKeyAtIndex`     | indexed insert                  |
//! | `removeObjectFromKeyAtIndex`    | indexed remove                  |
//! | `replaceObjectInKeyAtIndex_withObject` | indexed replace          |
//!
//! A notifying write runs validation first, then sends "will change",
//! assigns, and sends "did change". A failed validation sends nothing.
//! Because the notification pair is applied by the dispatcher rather than
//! baked into a setter, re-declaring a key or overriding its setter never
//! stacks a second pair.
//!
//! # Example
//!
//! ```
//! use objbridge::runtime::LocalRuntime;
//! use objbridge::{Bridge, Value};
//!
//! let rt = LocalRuntime::new();
//! let bridge = Bridge::new(rt.clone());
//! let class = bridge.import_class("NSObject").unwrap();
//! bridge.declare_accessor(&class, "title", true).unwrap();
//!
//! let obj = bridge.alloc_init(&class, "init", vec![]).unwrap();
//! bridge.send(&obj, "title=", vec![Value::from("Inbox")]).unwrap();
//! assert_eq!(bridge.send(&obj, "title", vec![]).unwrap(), Value::from("Inbox"));
//! assert_eq!(rt.take_notifications().len(), 2);
//! ```

use super::Bridge;
use super::forward::Call;
use super::instance::Instance;
use super::mirror::MirrorClass;
use crate::adapters::{ArrayAdapter, DictionaryAdapter, Family, Observer, StringAdapter, wrong_type};
use crate::encoding::Signature;
use crate::error::{Error, ForeignError, Result};
use crate::foreign::{ChangeKind, IndexChange, MethodImp, Receiver};
use crate::selector::{capitalize_key, selector_for_call};
use crate::value::{ObjectRef, Value};
use std::fmt;
use std::sync::Arc;

/// Checks or coerces a value before it is assigned.
pub type Validator = Arc<dyn Fn(&Instance, &Value) -> Result<Value> + Send + Sync>;

/// Host replacement for the plain assignment of a generated setter.
pub type SetterOverride = Arc<dyn Fn(&Bridge, &Instance, Value) -> Result<()> + Send + Sync>;

/// Which halves of an accessor pair are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
    WriteOnly,
}

/// Where an accessor's value lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// A slot in the instance's host-side companion state.
    Slot,
    /// The foreign object, through `valueForKey:` and `setValue:forKey:`.
    Foreign,
    /// A slot holding a host array, with indexed entry points.
    Indexed,
}

/// One property key bound on a mirror class.
#[derive(Clone)]
pub struct AccessorBinding {
    key: String,
    access: Access,
    notify: bool,
    storage: Storage,
    validator: Option<Validator>,
    setter_override: Option<SetterOverride>,
}

impl AccessorBinding {
    fn new(key: &str, access: Access, notify: bool, storage: Storage) -> Self {
        AccessorBinding {
            key: key.to_string(),
            access,
            notify,
            storage,
            validator: None,
            setter_override: None,
        }
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The host name of the getter, if the key is readable.
    pub fn getter(&self) -> Option<String> {
        self.is_readable().then(|| self.key.clone())
    }

    /// The host name of the setter, if the key is writable.
    pub fn setter(&self) -> Option<String> {
        self.is_writable().then(|| format!("{}=", self.key))
    }

    #[inline]
    pub fn notifies(&self) -> bool {
        self.notify
    }

    #[inline]
    pub fn storage(&self) -> Storage {
        self.storage
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn is_readable(&self) -> bool {
        self.access != Access::WriteOnly
    }

    pub fn is_writable(&self) -> bool {
        self.access != Access::ReadOnly
    }

    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }

    pub fn has_setter_override(&self) -> bool {
        self.setter_override.is_some()
    }
}

impl fmt::Debug for AccessorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorBinding")
            .field("key", &self.key)
            .field("access", &self.access)
            .field("notify", &self.notify)
            .field("storage", &self.storage)
            .field("validator", &self.validator.is_some())
            .field("setter_override", &self.setter_override.is_some())
            .finish()
    }
}

// ============================================================================
// Indexed entry points
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexedOp {
    Count,
    ObjectAt,
    Insert,
    Remove,
    Replace,
}

impl IndexedOp {
    const ALL: [IndexedOp; 5] = [
        IndexedOp::Count,
        IndexedOp::ObjectAt,
        IndexedOp::Insert,
        IndexedOp::Remove,
        IndexedOp::Replace,
    ];

    /// Host-name prefix and suffix around the capitalized key.
    fn affixes(self) -> (&'static str, &'static str) {
        match self {
            IndexedOp::Count => ("countOf", ""),
            IndexedOp::ObjectAt => ("objectIn", "AtIndex"),
            IndexedOp::Insert => ("insertObject_in", "AtIndex"),
            IndexedOp::Remove => ("removeObjectFrom", "AtIndex"),
            IndexedOp::Replace => ("replaceObjectIn", "AtIndex_withObject"),
        }
    }

    fn argc(self) -> usize {
        match self {
            IndexedOp::Count => 0,
            IndexedOp::ObjectAt | IndexedOp::Remove => 1,
            IndexedOp::Insert | IndexedOp::Replace => 2,
        }
    }

    fn encoding(self) -> &'static str {
        match self {
            IndexedOp::Count => "Q@:",
            IndexedOp::ObjectAt => "@@:Q",
            IndexedOp::Insert => "v@:@Q",
            IndexedOp::Remove => "v@:Q",
            IndexedOp::Replace => "v@:Q@",
        }
    }

    fn host_name(self, key: &str) -> String {
        let (prefix, suffix) = self.affixes();
        format!("{prefix}{}{suffix}", capitalize_key(key))
    }

    /// The capitalized key embedded in `name`, if `name` has this shape.
    fn key_part(self, name: &str) -> Option<&str> {
        let (prefix, suffix) = self.affixes();
        let part = name.strip_prefix(prefix)?.strip_suffix(suffix)?;
        (!part.is_empty()).then_some(part)
    }
}

enum Target {
    Get(Arc<AccessorBinding>),
    Set(Arc<AccessorBinding>),
    Indexed(Arc<AccessorBinding>, IndexedOp),
}

fn resolve(class: &MirrorClass, name: &str) -> Option<Target> {
    if let Some(key) = name.strip_suffix('=') {
        return class
            .find_accessor(key)
            .filter(|b| b.is_writable())
            .map(Target::Set);
    }
    if let Some(binding) = class.find_accessor(name).filter(|b| b.is_readable()) {
        return Some(Target::Get(binding));
    }
    if let Some(rest) = name.strip_prefix("set") {
        let found = class.find_accessor_where(|b| b.is_writable() && capitalize_key(&b.key) == rest);
        if let Some(binding) = found {
            return Some(Target::Set(binding));
        }
    }
    IndexedOp::ALL.iter().find_map(|op| {
        let part = op.key_part(name)?;
        class
            .find_accessor_where(|b| b.storage == Storage::Indexed && capitalize_key(&b.key) == part)
            .map(|b| Target::Indexed(b, *op))
    })
}

/// Returns `true` if `name` is an accessor call on `class`.
pub(crate) fn binds(class: &MirrorClass, name: &str) -> bool {
    resolve(class, name).is_some()
}

/// Runs `call` if it names an accessor on the receiver's class.
pub(crate) fn dispatch(bridge: &Bridge, inst: &Instance, call: &Call) -> Result<Option<Value>> {
    let Some(target) = resolve(inst.class(), &call.name) else {
        return Ok(None);
    };
    let receiver = inst.class().name();
    let value = match target {
        Target::Get(binding) => {
            call.expect_args(receiver, 0, 0)?;
            read(bridge, inst, &binding)?
        }
        Target::Set(binding) => {
            call.expect_args(receiver, 1, 1)?;
            let value = call.args[0].clone();
            write(bridge, inst, &binding, value.clone())?;
            value
        }
        Target::Indexed(binding, op) => {
            call.expect_args(receiver, op.argc(), op.argc())?;
            indexed(bridge, inst, &binding, op, &call.args)?
        }
    };
    Ok(Some(value))
}

fn read(bridge: &Bridge, inst: &Instance, binding: &AccessorBinding) -> Result<Value> {
    match binding.storage {
        Storage::Slot => Ok(inst.state().slot(&binding.key).unwrap_or_default()),
        Storage::Indexed => Ok(inst
            .state()
            .slot(&binding.key)
            .unwrap_or_else(|| Value::Array(Vec::new()))),
        Storage::Foreign => bridge.invoke(inst.object(), "valueForKey:", &[Value::from(binding.key.as_str())]),
    }
}

fn assign(bridge: &Bridge, inst: &Instance, binding: &AccessorBinding, value: Value) -> Result<()> {
    if let Some(custom) = &binding.setter_override {
        return custom(bridge, inst, value);
    }
    match binding.storage {
        Storage::Slot | Storage::Indexed => {
            inst.state().set_slot(&binding.key, value);
            Ok(())
        }
        Storage::Foreign => bridge
            .invoke(
                inst.object(),
                "setValue:forKey:",
                &[value, Value::from(binding.key.as_str())],
            )
            .map(|_| ()),
    }
}

fn write(bridge: &Bridge, inst: &Instance, binding: &AccessorBinding, value: Value) -> Result<()> {
    let value = match &binding.validator {
        Some(validate) => validate(inst, &value)?,
        None => value,
    };
    if !binding.notify {
        return assign(bridge, inst, binding, value);
    }
    let runtime = bridge.runtime();
    runtime.will_change(inst.object(), &binding.key, None);
    let result = assign(bridge, inst, binding, value);
    runtime.did_change(inst.object(), &binding.key, None);
    result
}

fn index_arg(receiver: &str, value: &Value, len: usize, inclusive: bool) -> Result<usize> {
    let Value::Int(i) = value else {
        return Err(wrong_type(receiver, "integer", value));
    };
    let limit = if inclusive { len } else { len.saturating_sub(1) };
    if *i < 0 || (*i as usize) > limit || (!inclusive && len == 0) {
        return Err(Error::IndexOutOfRange {
            receiver: receiver.to_string(),
            index: *i,
            len,
        });
    }
    Ok(*i as usize)
}

fn indexed(
    bridge: &Bridge,
    inst: &Instance,
    binding: &AccessorBinding,
    op: IndexedOp,
    args: &[Value],
) -> Result<Value> {
    let receiver = inst.class().name();
    let mut items = match read(bridge, inst, binding)? {
        Value::Array(items) => items,
        other => return Err(wrong_type(receiver, "array", &other)),
    };
    let (kind, index) = match op {
        IndexedOp::Count => return Ok(Value::Int(items.len() as i64)),
        IndexedOp::ObjectAt => {
            let i = index_arg(receiver, &args[0], items.len(), false)?;
            return Ok(items.swap_remove(i));
        }
        IndexedOp::Insert => (ChangeKind::Insertion, index_arg(receiver, &args[1], items.len(), true)?),
        IndexedOp::Remove => (ChangeKind::Removal, index_arg(receiver, &args[0], items.len(), false)?),
        IndexedOp::Replace => (ChangeKind::Replacement, index_arg(receiver, &args[0], items.len(), false)?),
    };

    let change = IndexChange::at(kind, index);
    let runtime = bridge.runtime();
    runtime.will_change(inst.object(), &binding.key, Some(&change));
    match op {
        IndexedOp::Insert => items.insert(index, args[0].clone()),
        IndexedOp::Remove => {
            items.remove(index);
        }
        _ => items[index] = args[1].clone(),
    }
    inst.state().set_slot(&binding.key, Value::Array(items));
    runtime.did_change(inst.object(), &binding.key, Some(&change));
    Ok(Value::Nil)
}

// ============================================================================
// Declarations
// ============================================================================

impl Bridge {
    fn bind_accessor(&self, class: &MirrorClass, binding: AccessorBinding) {
        objbridge_log::debug!(
            "{}: accessor '{}' ({:?}, notify={})",
            class.name(),
            binding.key,
            binding.access,
            binding.notify
        );
        class
            .inner()
            .accessors
            .write()
            .insert(binding.key.clone(), Arc::new(binding));
    }

    /// Binds a getter and setter for `key`, backed by a host-side slot.
    ///
    /// With `notify`, every write through the setter is surrounded by one
    /// "will change"/"did change" pair for `key`. Declaring the same key
    /// again replaces the previous binding.
    pub fn declare_accessor(&self, class: &MirrorClass, key: &str, notify: bool) -> Result<()> {
        self.bind_accessor(class, AccessorBinding::new(key, Access::ReadWrite, notify, Storage::Slot));
        Ok(())
    }

    /// Binds a getter only.
    pub fn declare_reader(&self, class: &MirrorClass, key: &str) -> Result<()> {
        self.bind_accessor(class, AccessorBinding::new(key, Access::ReadOnly, false, Storage::Slot));
        Ok(())
    }

    /// Binds a setter only.
    pub fn declare_writer(&self, class: &MirrorClass, key: &str, notify: bool) -> Result<()> {
        self.bind_accessor(class, AccessorBinding::new(key, Access::WriteOnly, notify, Storage::Slot));
        Ok(())
    }

    /// Binds a connection point: a setter with no notifications.
    pub fn declare_outlet(&self, class: &MirrorClass, key: &str) -> Result<()> {
        self.bind_accessor(class, AccessorBinding::new(key, Access::WriteOnly, false, Storage::Slot));
        Ok(())
    }

    /// Binds `keys` to the foreign object's own key-value coding. The
    /// foreign side announces its own changes, so these never notify.
    pub fn declare_wrapper(&self, class: &MirrorClass, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.bind_accessor(class, AccessorBinding::new(key, Access::ReadWrite, false, Storage::Foreign));
        }
        Ok(())
    }

    fn update_binding(
        &self,
        class: &MirrorClass,
        key: &str,
        update: impl FnOnce(&mut AccessorBinding),
    ) -> Result<()> {
        let current = class.find_accessor(key).ok_or_else(|| Error::AccessorNotFound {
            class: class.name().to_string(),
            key: key.to_string(),
        })?;
        let mut binding = AccessorBinding::clone(&current);
        update(&mut binding);
        self.bind_accessor(class, binding);
        Ok(())
    }

    /// Installs a check that runs on every write to `key` before anything
    /// is announced. The validator may also coerce the value.
    ///
    /// # Errors
    ///
    /// [`Error::AccessorNotFound`] if `key` has no binding on `class` or its
    /// superclasses.
    pub fn set_validator(
        &self,
        class: &MirrorClass,
        key: &str,
        validator: impl Fn(&Instance, &Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Result<()> {
        let validator: Validator = Arc::new(validator);
        self.update_binding(class, key, |b| b.validator = Some(validator))
    }

    /// Replaces the plain assignment of `key`'s setter with host code. The
    /// binding's notifications still wrap the override exactly once.
    pub fn override_setter(
        &self,
        class: &MirrorClass,
        key: &str,
        setter: impl Fn(&Bridge, &Instance, Value) -> Result<()> + Send + Sync + 'static,
    ) -> Result<()> {
        let setter: SetterOverride = Arc::new(setter);
        self.update_binding(class, key, |b| b.setter_override = Some(setter))
    }

    /// Binds a to-many property backed by a host array, with indexed entry
    /// points that announce the exact index they change.
    ///
    /// On classes created by subclassing, the entry points are also
    /// published to the foreign side, so foreign callers can reach them.
    pub fn declare_array_accessor(&self, class: &MirrorClass, key: &str) -> Result<()> {
        self.bind_accessor(class, AccessorBinding::new(key, Access::ReadWrite, true, Storage::Indexed));
        let Some(handle) = class.foreign().filter(|_| class.is_derived()) else {
            return Ok(());
        };
        for op in IndexedOp::ALL {
            let host_name = op.host_name(key);
            let selector = selector_for_call(&host_name, op.argc());
            let signature = Signature::parse(op.encoding()).map_err(|e| Error::InvalidTypeEncoding {
                method: host_name.clone(),
                token: e.0,
            })?;
            let weak = self.downgrade();
            let imp: MethodImp = Arc::new(move |receiver, args| {
                let Receiver::Instance(object) = receiver else {
                    return Err(ForeignError::Exception {
                        name: "HostError".to_string(),
                        reason: format!("{host_name} is an instance method"),
                    });
                };
                let bridge = Bridge::upgrade(&weak)?;
                let inst = bridge.wrap(object)?;
                Ok(bridge.call(&inst, &Call::new(&host_name, args.to_vec()))?)
            });
            self.runtime()
                .bind_method(handle, &selector, &signature, false, imp)
                .map_err(|source| Error::ForeignDispatchFailure {
                    receiver: class.name().to_string(),
                    selector: selector.clone(),
                    source,
                })?;
            objbridge_log::debug!("{}: published {selector}", class.name());
        }
        Ok(())
    }

    /// Registers `dependent` as changing whenever any of `keys` changes.
    pub fn depends_on(&self, class: &MirrorClass, dependent: &str, keys: &[&str]) -> Result<()> {
        let handle = class.foreign().ok_or_else(|| Error::UseForeignInitializer {
            class: class.name().to_string(),
        })?;
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        self.runtime()
            .set_keys_trigger_change_notifications(handle, &keys, dependent)
            .map_err(|source| Error::ForeignDispatchFailure {
                receiver: class.name().to_string(),
                selector: "setKeys:triggerChangeNotificationsForDependentKey:".to_string(),
                source,
            })
    }

    // ========================================================================
    // Key-value coding
    // ========================================================================

    /// Reads `key` through its accessor binding.
    ///
    /// # Errors
    ///
    /// [`Error::AccessorNotFound`] if no readable binding exists.
    pub fn value_for_key(&self, inst: &Instance, key: &str) -> Result<Value> {
        match inst.class().find_accessor(key).filter(|b| b.is_readable()) {
            Some(binding) => read(self, inst, &binding),
            None => Err(Error::AccessorNotFound {
                class: inst.class().name().to_string(),
                key: key.to_string(),
            }),
        }
    }

    /// Writes `key` through its accessor binding, with the binding's
    /// validation and notifications.
    pub fn set_value_for_key(&self, inst: &Instance, key: &str, value: Value) -> Result<()> {
        match inst.class().find_accessor(key).filter(|b| b.is_writable()) {
            Some(binding) => write(self, inst, &binding, value),
            None => Err(Error::AccessorNotFound {
                class: inst.class().name().to_string(),
                key: key.to_string(),
            }),
        }
    }

    /// Key-value coding for calls that come back from the foreign side's
    /// undefined-key hooks. Foreign-backed bindings are skipped, since the
    /// foreign side has already failed to find them.
    pub(crate) fn host_value_for_key(&self, inst: &Instance, key: &str) -> Result<Value> {
        match inst.class().find_accessor(key) {
            Some(binding) if binding.storage != Storage::Foreign && binding.is_readable() => {
                read(self, inst, &binding)
            }
            _ => Err(Error::AccessorNotFound {
                class: inst.class().name().to_string(),
                key: key.to_string(),
            }),
        }
    }

    pub(crate) fn host_set_value_for_key(&self, inst: &Instance, key: &str, value: Value) -> Result<()> {
        match inst.class().find_accessor(key) {
            Some(binding) if binding.storage != Storage::Foreign && binding.is_writable() => {
                write(self, inst, &binding, value)
            }
            _ => Err(Error::AccessorNotFound {
                class: inst.class().name().to_string(),
                key: key.to_string(),
            }),
        }
    }

    // ========================================================================
    // Observed mutation
    // ========================================================================

    fn observed_object(&self, inst: &Instance, key: &str, family: Family) -> Result<ObjectRef> {
        match self.value_for_key(inst, key)? {
            Value::Object(object) => {
                self.expect_family(&object, family)?;
                Ok(object)
            }
            other => Err(Error::InvalidArgument {
                receiver: inst.class().name().to_string(),
                operation: key.to_string(),
                reason: format!("{} is not a foreign collection", other.type_name()),
            }),
        }
    }

    /// Runs `f` against the sequence held in `key`. If `f` changes the
    /// sequence, exactly one notification pair is sent for `key`, with the
    /// "will change" going out right before the first change.
    ///
    /// # Example
    ///
    /// ```
    /// use objbridge::adapters::SequenceLike;
    /// use objbridge::runtime::LocalRuntime;
    /// use objbridge::{Bridge, Value};
    ///
    /// let rt = LocalRuntime::new();
    /// let bridge = Bridge::new(rt.clone());
    /// let class = bridge.import_class("NSObject").unwrap();
    /// bridge.declare_accessor(&class, "tags", true).unwrap();
    /// let obj = bridge.alloc_init(&class, "init", vec![]).unwrap();
    /// bridge.set_value_for_key(&obj, "tags", rt.new_array(vec![], true).into()).unwrap();
    /// rt.take_notifications();
    ///
    /// bridge
    ///     .mutate_observed_sequence(&obj, "tags", |tags| {
    ///         tags.push([Value::from("a")])?;
    ///         tags.push([Value::from("b")])
    ///     })
    ///     .unwrap();
    /// assert_eq!(rt.take_notifications().len(), 2);
    /// ```
    pub fn mutate_observed_sequence<R>(
        &self,
        inst: &Instance,
        key: &str,
        f: impl FnOnce(&ArrayAdapter<'_>) -> Result<R>,
    ) -> Result<R> {
        let object = self.observed_object(inst, key, Family::Sequence)?;
        let view = ArrayAdapter::observed(self, object, Observer::new(inst.object().clone(), key));
        let result = f(&view);
        if let Some(observer) = view.observer() {
            observer.finish(self);
        }
        result
    }

    /// Map counterpart of [`mutate_observed_sequence`](Self::mutate_observed_sequence).
    pub fn mutate_observed_map<R>(
        &self,
        inst: &Instance,
        key: &str,
        f: impl FnOnce(&DictionaryAdapter<'_>) -> Result<R>,
    ) -> Result<R> {
        let object = self.observed_object(inst, key, Family::Map)?;
        let view = DictionaryAdapter::observed(self, object, Observer::new(inst.object().clone(), key));
        let result = f(&view);
        if let Some(observer) = view.observer() {
            observer.finish(self);
        }
        result
    }

    /// Text counterpart of [`mutate_observed_sequence`](Self::mutate_observed_sequence).
    pub fn mutate_observed_text<R>(
        &self,
        inst: &Instance,
        key: &str,
        f: impl FnOnce(&StringAdapter<'_>) -> Result<R>,
    ) -> Result<R> {
        let object = self.observed_object(inst, key, Family::Text)?;
        let view = StringAdapter::observed(self, object, Observer::new(inst.object().clone(), key));
        let result = f(&view);
        if let Some(observer) = view.observer() {
            observer.finish(self);
        }
        result
    }
}
