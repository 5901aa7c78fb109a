//! Values that cross the bridge.
//!
//! A [`Value`] is either a plain host value or an [`ObjectRef`] to a live
//! foreign instance. `ObjectRef` is a non-owning handle: the foreign
//! runtime's reference count decides when the instance dies, and the bridge
//! only contributes one retain per handle family.

use crate::foreign::{ForeignRuntime, ObjectId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

struct Retained {
    id: ObjectId,
    runtime: Weak<dyn ForeignRuntime>,
}

impl Drop for Retained {
    fn drop(&mut self) {
        // A runtime that is already gone has released everything itself.
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.release(self.id);
        }
    }
}

/// A reference to a live foreign instance.
///
/// All clones share a single foreign retain, which is taken when the first
/// handle is created and given back when the last clone is dropped. Equality
/// and hashing are by identity.
#[derive(Clone)]
pub struct ObjectRef {
    inner: Arc<Retained>,
}

impl ObjectRef {
    /// Takes over a retain the runtime already holds for the caller, such as
    /// the one returned from an allocation.
    pub fn adopt(runtime: Weak<dyn ForeignRuntime>, id: ObjectId) -> Self {
        ObjectRef {
            inner: Arc::new(Retained { id, runtime }),
        }
    }

    /// Retains `id` and returns a handle that releases it on last drop.
    pub fn retain(runtime: &Arc<dyn ForeignRuntime>, id: ObjectId) -> Self {
        runtime.retain(id);
        Self::adopt(Arc::downgrade(runtime), id)
    }

    /// The foreign identity.
    #[inline]
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// The runtime that owns the instance, if it is still alive.
    pub fn runtime(&self) -> Option<Arc<dyn ForeignRuntime>> {
        self.inner.runtime.upgrade()
    }

    /// Number of host handles sharing this retain.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ObjectRef {}

impl Hash for ObjectRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({})", self.inner.id)
    }
}

/// A host range literal: `start..end`, `start..=end` or `start..`.
///
/// Negative bounds count from the end of the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeSpec {
    pub start: i64,
    pub end: Option<i64>,
    pub exclusive: bool,
}

impl RangeSpec {
    pub const fn new(start: i64, end: Option<i64>, exclusive: bool) -> Self {
        RangeSpec { start, end, exclusive }
    }

    /// Resolves the range against a container of `count` elements, returning
    /// `(location, length)`.
    ///
    /// Returns `None` if the start lies outside `0..=count`. The length is
    /// clamped to the elements that exist.
    pub fn resolve(&self, count: usize) -> Option<(usize, usize)> {
        let count_i = count as i64;
        let mut loc = self.start;
        if loc < 0 {
            loc += count_i;
        }
        if loc < 0 || loc > count_i {
            return None;
        }
        let last = match self.end {
            None => count_i - 1,
            Some(mut end) => {
                if end < 0 {
                    end += count_i;
                }
                if self.exclusive { end.saturating_sub(1) } else { end }
            }
        };
        let len = last.saturating_sub(loc).saturating_add(1).clamp(0, count_i - loc);
        Some((loc as usize, len as usize))
    }
}

impl From<std::ops::Range<i64>> for RangeSpec {
    fn from(r: std::ops::Range<i64>) -> Self {
        RangeSpec::new(r.start, Some(r.end), true)
    }
}

impl From<std::ops::RangeInclusive<i64>> for RangeSpec {
    fn from(r: std::ops::RangeInclusive<i64>) -> Self {
        RangeSpec::new(*r.start(), Some(*r.end()), false)
    }
}

impl From<std::ops::RangeFrom<i64>> for RangeSpec {
    fn from(r: std::ops::RangeFrom<i64>) -> Self {
        RangeSpec::new(r.start, None, false)
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            None => write!(f, "{}..", self.start),
            Some(end) if self.exclusive => write!(f, "{}...{}", self.start, end),
            Some(end) => write!(f, "{}..{}", self.start, end),
        }
    }
}

/// A value passed to or returned from a call.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    /// Insertion-ordered key/value pairs.
    Map(Vec<(Value, Value)>),
    Range(RangeSpec),
    Object(ObjectRef),
}

impl Value {
    /// Host type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Range(_) => "range",
            Value::Object(_) => "foreign object",
        }
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Host truthiness: everything except `nil` and `false`.
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns `true` if the value or anything nested in it is a range, which
    /// has no foreign counterpart.
    pub fn contains_range(&self) -> bool {
        match self {
            Value::Range(_) => true,
            Value::Array(items) => items.iter().any(Value::contains_range),
            Value::Map(pairs) => pairs
                .iter()
                .any(|(k, v)| k.contains_range() || v.contains_range()),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}=>{v}")?;
                }
                f.write_str("}")
            }
            Value::Range(r) => write!(f, "{r}"),
            Value::Object(o) => write!(f, "#<{}>", o.id()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<RangeSpec> for Value {
    fn from(r: RangeSpec) -> Self {
        Value::Range(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

/// Builds a `Value::Array` from anything convertible.
///
/// ```
/// use objbridge::{values, Value};
///
/// assert_eq!(values![1, "a"], Value::Array(vec![Value::Int(1), Value::from("a")]));
/// ```
#[macro_export]
macro_rules! values {
    ($($item:expr),* $(,)?) => {
        $crate::Value::Array(vec![$($crate::Value::from($item)),*])
    };
}
