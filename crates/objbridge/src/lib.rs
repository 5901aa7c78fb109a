//! `objbridge`: an object bridge to Objective-C style runtimes
//!
//! `objbridge` exposes the classes and objects of a dynamic, message-passing
//! foreign runtime to Rust as if they were host types. It provides:
//!
//! - **Lazy Class Mirrors** created on first reference, following the foreign
//!   superclass chain up to a shared root
//! - **Collection Adapters** giving foreign strings, arrays and dictionaries
//!   the behaviour of host collections, live against the foreign object
//! - **Fallback Dispatch** that routes unbound calls to an adapter or to a
//!   raw foreign selector
//! - **Accessors with Change Notifications** declared from a table, not
//!   generated source
//! - **Host Subclassing** that publishes overrides back into the foreign
//!   method tables
//!
//! # Architecture
//!
//! - [`foreign`]: the seam to a foreign runtime ([`ForeignRuntime`],
//!   [`BundleLoader`](foreign::BundleLoader),
//!   [`SignatureLoader`](foreign::SignatureLoader))
//! - [`bridge`]: the [`Bridge`] context, mirrors, instances, dispatch,
//!   accessors, subclassing and name resolution
//! - [`adapters`]: the text, sequence and map views
//! - [`runtime`]: an in-process reference runtime with the Foundation
//!   collection classes
//!
//! # Example
//!
//! ```rust
//! use objbridge::runtime::LocalRuntime;
//! use objbridge::{Bridge, Value, values};
//!
//! let rt = LocalRuntime::new();
//! let bridge = Bridge::new(rt.clone());
//!
//! let list = bridge.wrap(&rt.new_array(vec![3.into(), 1.into(), 2.into()], true)).unwrap();
//! bridge.send(&list, "sort!", vec![]).unwrap();
//! assert_eq!(bridge.send(&list, "to_a", vec![]).unwrap(), values![1, 2, 3]);
//! assert_eq!(bridge.send(&list, "count", vec![]).unwrap(), Value::Int(3));
//! ```

pub mod adapters;
pub mod bridge;
pub mod config;
pub mod encoding;
pub mod error;
pub mod fallback;
pub mod foreign;
pub mod runtime;
pub mod selector;
pub mod value;

use std::sync::OnceLock;

// Re-export commonly used types
pub use adapters::{MapLike, SeqIndex, SequenceLike, TextLike};
pub use bridge::forward::Call;
pub use bridge::instance::Instance;
pub use bridge::mirror::MirrorClass;
pub use bridge::resolver::{Namespace, Resolved};
pub use bridge::{Bridge, BridgeBuilder};
pub use config::BridgeConfig;
pub use error::{Error, ForeignError, ForeignResult, Result};
pub use foreign::ForeignRuntime;
pub use selector::Selector;
pub use value::{ObjectRef, RangeSpec, Value};

static GLOBAL: OnceLock<Bridge> = OnceLock::new();

/// Publishes `bridge` as the process-wide bridge.
///
/// # Errors
///
/// [`Error::AlreadyInstalled`] if a bridge was installed before.
pub fn install(bridge: Bridge) -> Result<()> {
    GLOBAL.set(bridge).map_err(|_| Error::AlreadyInstalled)?;
    objbridge_log::info!("bridge installed");
    Ok(())
}

/// The process-wide bridge, if one was installed.
pub fn bridge() -> Option<&'static Bridge> {
    GLOBAL.get()
}
