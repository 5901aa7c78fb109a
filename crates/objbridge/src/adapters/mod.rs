//! Collection adapters.
//!
//! Foreign strings, arrays and dictionaries get the behaviour of host
//! collections through thin views built on a handful of foreign primitives
//! (count, get-at, set-at, insert, remove and their map and text
//! equivalents). A view holds nothing but the reference; every read and
//! write goes to the live foreign object.
//!
//! | Family     | Trait            | View                  |
//! |------------|------------------|-----------------------|
//! | text       | [`TextLike`]     | [`StringAdapter`]     |
//! | sequence   | [`SequenceLike`] | [`ArrayAdapter`]      |
//! | map        | [`MapLike`]      | [`DictionaryAdapter`] |
//!
//! # Example
//!
//! ```
//! use objbridge::adapters::SequenceLike;
//! use objbridge::runtime::LocalRuntime;
//! use objbridge::{values, Bridge, SeqIndex};
//!
//! let rt = LocalRuntime::new();
//! let bridge = Bridge::new(rt.clone());
//! let obj = rt.new_array(vec![10.into(), 20.into(), 30.into(), 40.into(), 50.into()], true);
//!
//! let seq = bridge.sequence(&obj).unwrap();
//! let removed = seq.slice_bang(SeqIndex::Span { start: 1, len: 2 }).unwrap();
//! assert_eq!(removed, Some(values![20, 30]));
//! assert_eq!(seq.to_vec().unwrap(), vec![10.into(), 40.into(), 50.into()]);
//! ```

pub mod index;
pub mod map;
pub mod sequence;
pub mod text;

pub use index::SeqIndex;
pub use map::{DictionaryAdapter, MapLike};
pub use sequence::{ArrayAdapter, SequenceLike};
pub use text::{StringAdapter, TextLike};

use crate::bridge::Bridge;
use crate::bridge::forward::Call;
use crate::bridge::instance::Instance;
use crate::error::{Error, Result};
use crate::value::{ObjectRef, Value};
use std::cell::Cell;

/// The collection family of a foreign class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Text,
    Sequence,
    Map,
}

/// Host names each family's adapter answers to.
pub fn contract(family: Family) -> &'static [&'static str] {
    match family {
        Family::Text => text::CONTRACT,
        Family::Sequence => sequence::CONTRACT,
        Family::Map => map::CONTRACT,
    }
}

/// Runs a contract call against the matching adapter.
pub(crate) fn dispatch(bridge: &Bridge, family: Family, receiver: &Instance, call: &Call) -> Result<Value> {
    let object = receiver.object().clone();
    match family {
        Family::Text => text::dispatch(&StringAdapter::new(bridge, object), call),
        Family::Sequence => sequence::dispatch(&ArrayAdapter::new(bridge, object), call),
        Family::Map => map::dispatch(&DictionaryAdapter::new(bridge, object), call),
    }
}

/// Lazily emitted change notifications for one property.
///
/// The "will change" notification goes out right before the first mutating
/// primitive; [`finish`](Self::finish) sends the matching "did change" only
/// if a "will" was sent.
#[derive(Debug)]
pub(crate) struct Observer {
    owner: ObjectRef,
    key: String,
    fired: Cell<bool>,
}

impl Observer {
    pub(crate) fn new(owner: ObjectRef, key: &str) -> Self {
        Observer {
            owner,
            key: key.to_string(),
            fired: Cell::new(false),
        }
    }

    pub(crate) fn touch(&self, bridge: &Bridge) {
        if !self.fired.replace(true) {
            bridge.runtime().will_change(&self.owner, &self.key, None);
        }
    }

    pub(crate) fn finish(&self, bridge: &Bridge) {
        if self.fired.get() {
            bridge.runtime().did_change(&self.owner, &self.key, None);
        }
    }
}

pub(crate) fn touch(bridge: &Bridge, observer: Option<&Observer>) {
    if let Some(observer) = observer {
        observer.touch(bridge);
    }
}

/// Reads an integer result of a foreign call.
pub(crate) fn int_result(receiver: &str, selector: &str, value: Value) -> Result<i64> {
    value.as_int().ok_or_else(|| Error::InvalidArgument {
        receiver: receiver.to_string(),
        operation: selector.to_string(),
        reason: format!("expected an integer result, got {}", value.type_name()),
    })
}

/// Rejects an argument of the wrong kind.
pub(crate) fn wrong_type(receiver: &str, expected: &'static str, got: &Value) -> Error {
    Error::InvalidIndexType {
        receiver: receiver.to_string(),
        expected,
        got: got.type_name().to_string(),
    }
}

/// Calls a block and returns its truthiness.
pub(crate) fn block_truthy(call: &Call, receiver: &str, args: &[Value]) -> Result<bool> {
    Ok((call.require_block(receiver)?)(args)?.truthy())
}

/// Reads a non-negative count argument.
pub(crate) fn count_arg(receiver: &str, value: &Value) -> Result<usize> {
    match value {
        Value::Int(n) if *n >= 0 => Ok(*n as usize),
        Value::Int(n) => Err(Error::InvalidArgument {
            receiver: receiver.to_string(),
            operation: "count".to_string(),
            reason: format!("negative count ({n})"),
        }),
        other => Err(wrong_type(receiver, "integer", other)),
    }
}

impl Bridge {
    /// A sequence view of a foreign array.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the object is not in the sequence family.
    pub fn sequence(&self, object: &ObjectRef) -> Result<ArrayAdapter<'_>> {
        self.expect_family(object, Family::Sequence)?;
        Ok(ArrayAdapter::new(self, object.clone()))
    }

    /// A map view of a foreign dictionary.
    pub fn map(&self, object: &ObjectRef) -> Result<DictionaryAdapter<'_>> {
        self.expect_family(object, Family::Map)?;
        Ok(DictionaryAdapter::new(self, object.clone()))
    }

    /// A text view of a foreign string.
    pub fn text(&self, object: &ObjectRef) -> Result<StringAdapter<'_>> {
        self.expect_family(object, Family::Text)?;
        Ok(StringAdapter::new(self, object.clone()))
    }

    pub(crate) fn expect_family(&self, object: &ObjectRef, family: Family) -> Result<()> {
        if self.family_of(object)? == Some(family) {
            return Ok(());
        }
        Err(Error::InvalidArgument {
            receiver: self.class_name_of(object),
            operation: format!("{family:?}").to_lowercase(),
            reason: format!("not a {family:?} object").to_lowercase(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::LocalRuntime;

    #[test]
    fn test_views_check_family() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let s = rt.new_string("x", false);
        assert!(bridge.text(&s).is_ok());
        let err = bridge.sequence(&s).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { ref receiver, .. } if receiver == "NSString"));
    }

    #[test]
    fn test_contracts_are_disjoint_from_primitives() {
        for family in [Family::Text, Family::Sequence, Family::Map] {
            assert!(!contract(family).contains(&"count"));
            assert!(!contract(family).contains(&"objectAtIndex:"));
        }
        // Answered by the adapter unless the config sends it through.
        assert!(contract(Family::Text).contains(&"length"));
    }
}
