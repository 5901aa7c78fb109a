//! The dispatch forwarder.
//!
//! Runs when a call on a foreign-backed instance has no host method and no
//! accessor. Two strategies are tried in order:
//!
//! 1. **Adapter**: if the receiver is a text, sequence or map and the call
//!    name belongs to that family's host collection contract (and is not on
//!    the family's passthrough list), the matching adapter operation runs
//!    against the live foreign object.
//! 2. **Raw forward**: the call name is converted to a selector and sent to
//!    the foreign object as is.
//!
//! Arguments are checked locally before anything crosses the boundary.

use super::Bridge;
use super::instance::Instance;
use crate::adapters::{self, Family};
use crate::error::{Error, Result};
use crate::fallback::{self, Resolution, Strategy};
use crate::selector::selector_for_call;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// A host closure passed along with a call.
pub type Block = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Entry point installed on mirror classes directly below the root.
pub type ForwarderHook = fn(&Bridge, &Instance, &Call) -> Result<Value>;

/// One host-side call: a name, its arguments and an optional block.
#[derive(Clone)]
pub struct Call {
    pub name: String,
    pub args: Vec<Value>,
    pub block: Option<Block>,
}

impl Call {
    pub fn new(name: &str, args: Vec<Value>) -> Self {
        Call {
            name: name.to_string(),
            args,
            block: None,
        }
    }

    /// Attaches a block.
    pub fn with_block(mut self, block: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static) -> Self {
        self.block = Some(Arc::new(block));
        self
    }

    /// Checks the argument count against `min..=max`.
    pub fn expect_args(&self, receiver: &str, min: usize, max: usize) -> Result<()> {
        let got = self.args.len();
        if got < min || got > max {
            let expected = if min == max {
                min.to_string()
            } else if max == usize::MAX {
                format!("{min}+")
            } else {
                format!("{min}..{max}")
            };
            return Err(Error::InvalidArgumentCount {
                receiver: receiver.to_string(),
                operation: self.name.clone(),
                expected,
                got,
            });
        }
        Ok(())
    }

    /// The block, or an argument error naming the call.
    pub fn require_block(&self, receiver: &str) -> Result<&Block> {
        self.block.as_ref().ok_or_else(|| Error::InvalidArgument {
            receiver: receiver.to_string(),
            operation: self.name.clone(),
            reason: "no block given".to_string(),
        })
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("block", &self.block.is_some())
            .finish()
    }
}

struct Dispatch<'a> {
    bridge: &'a Bridge,
    receiver: &'a Instance,
    call: &'a Call,
}

struct AdapterStrategy;
struct RawForward;

impl Strategy<Dispatch<'_>, Value> for AdapterStrategy {
    fn name(&self) -> &'static str {
        "collection adapter"
    }

    fn attempt(&self, d: &Dispatch<'_>) -> Result<Option<Value>> {
        let Some(family) = d.bridge.family_of(d.receiver.object())? else {
            return Ok(None);
        };
        let config = d.bridge.config();
        let passthrough = match family {
            Family::Text => &config.text_passthrough,
            Family::Sequence => &config.sequence_passthrough,
            Family::Map => &config.map_passthrough,
        };
        let name = d.call.name.as_str();
        if passthrough.iter().any(|p| p == name) || !adapters::contract(family).contains(&name) {
            objbridge_log::trace!("{name} on {family:?} goes to the foreign side");
            return Ok(None);
        }
        objbridge_log::trace!("{name} on {family:?} handled by the adapter");
        adapters::dispatch(d.bridge, family, d.receiver, d.call).map(Some)
    }
}

impl Strategy<Dispatch<'_>, Value> for RawForward {
    fn name(&self) -> &'static str {
        "foreign selector"
    }

    fn attempt(&self, d: &Dispatch<'_>) -> Result<Option<Value>> {
        let receiver = d.bridge.class_name_of(d.receiver.object());
        if d.call.block.is_some() {
            return Err(Error::InvalidArgument {
                receiver,
                operation: d.call.name.clone(),
                reason: "foreign methods don't take blocks".to_string(),
            });
        }
        if let Some(bad) = d.call.args.iter().find(|a| a.contains_range()) {
            return Err(Error::InvalidArgument {
                receiver,
                operation: d.call.name.clone(),
                reason: format!("no implicit conversion of {} into a foreign value", bad.type_name()),
            });
        }
        let selector = selector_for_call(&d.call.name, d.call.args.len());
        objbridge_log::trace!("forwarding {} as -[{receiver} {selector}]", d.call.name);
        d.bridge.invoke(d.receiver.object(), &selector, &d.call.args).map(Some)
    }
}

/// Resolves a call that has no host implementation.
///
/// # Errors
///
/// Local validation errors from the adapter, or
/// [`Error::ForeignDispatchFailure`] if the foreign call fails. A foreign
/// failure is never retried.
pub fn forward(bridge: &Bridge, receiver: &Instance, call: &Call) -> Result<Value> {
    let input = Dispatch {
        bridge,
        receiver,
        call,
    };
    match fallback::resolve::<Dispatch<'_>, Value>(&[&AdapterStrategy, &RawForward], &input)? {
        Resolution::Found(value) => Ok(value),
        Resolution::Exhausted(tried) => Err(Error::NoMethod {
            class: receiver.class().name().to_string(),
            name: call.name.clone(),
            tried,
        }),
    }
}
