//! The bridge context.
//!
//! A [`Bridge`] owns everything that is process-wide in the object model:
//! the foreign runtime it talks to, the loaders, the configuration, the
//! mirror registry and the host-side companion state of foreign objects.
//! It is cheap to clone; clones share the same state.
//!
//! # Example
//!
//! ```
//! use objbridge::runtime::LocalRuntime;
//! use objbridge::{Bridge, Value};
//!
//! let rt = LocalRuntime::new();
//! let bridge = Bridge::new(rt.clone());
//!
//! let array = bridge.import_class("NSArray").unwrap();
//! assert_eq!(array.superclass().unwrap().name(), "NSObject");
//!
//! let items = bridge.wrap(&rt.new_array(vec![1.into(), 2.into()], true)).unwrap();
//! bridge.send(&items, "push", vec![Value::Int(3)]).unwrap();
//! assert_eq!(bridge.send(&items, "count", vec![]).unwrap(), Value::Int(3));
//! ```

pub mod accessor;
mod convert;
pub mod forward;
pub mod instance;
mod loader;
pub mod mirror;
pub mod registrar;
pub mod resolver;

use crate::adapters::Family;
use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::foreign::{BundleLoader, ClassHandle, ForeignRuntime, ObjectId, SignatureLoader};
use crate::value::{ObjectRef, Value};
use fxhash::FxHashMap;
use instance::HostState;
use mirror::MirrorRegistry;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};

/// What the bridge has learned about one foreign class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClassTraits {
    pub(crate) family: Option<Family>,
    pub(crate) mutable: bool,
}

pub(crate) struct Shared {
    pub(crate) runtime: Arc<dyn ForeignRuntime>,
    pub(crate) signatures: Option<Arc<dyn SignatureLoader>>,
    pub(crate) bundles: Option<Arc<dyn BundleLoader>>,
    pub(crate) config: BridgeConfig,
    pub(crate) registry: MirrorRegistry,
    pub(crate) companions: Mutex<FxHashMap<ObjectId, Arc<HostState>>>,
    traits: RwLock<FxHashMap<ClassHandle, ClassTraits>>,
}

/// Connection between host code and one foreign runtime.
#[derive(Clone)]
pub struct Bridge {
    shared: Arc<Shared>,
}

/// Builder for [`Bridge`].
pub struct BridgeBuilder {
    runtime: Arc<dyn ForeignRuntime>,
    config: BridgeConfig,
    signatures: Option<Arc<dyn SignatureLoader>>,
    bundles: Option<Arc<dyn BundleLoader>>,
}

impl BridgeBuilder {
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn signatures(mut self, loader: Arc<dyn SignatureLoader>) -> Self {
        self.signatures = Some(loader);
        self
    }

    pub fn bundles(mut self, loader: Arc<dyn BundleLoader>) -> Self {
        self.bundles = Some(loader);
        self
    }

    /// Builds the bridge, applies the configured log level and loads the
    /// signatures of the preload frameworks.
    pub fn build(self) -> Bridge {
        if let Some(level) = self.config.log_level {
            objbridge_log::set_level(level);
        }
        let registry = MirrorRegistry::new(&self.config.root_name);
        let bridge = Bridge {
            shared: Arc::new(Shared {
                runtime: self.runtime,
                signatures: self.signatures,
                bundles: self.bundles,
                config: self.config,
                registry,
                companions: Mutex::new(FxHashMap::default()),
                traits: RwLock::new(FxHashMap::default()),
            }),
        };
        bridge.preload();
        bridge
    }
}

impl Bridge {
    /// Starts building a bridge over `runtime`.
    pub fn builder(runtime: Arc<dyn ForeignRuntime>) -> BridgeBuilder {
        BridgeBuilder {
            runtime,
            config: BridgeConfig::default(),
            signatures: None,
            bundles: None,
        }
    }

    /// A bridge with the default configuration and no loaders.
    pub fn new(runtime: Arc<dyn ForeignRuntime>) -> Bridge {
        Bridge::builder(runtime).build()
    }

    #[inline]
    pub fn runtime(&self) -> &Arc<dyn ForeignRuntime> {
        &self.shared.runtime
    }

    #[inline]
    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    pub fn signatures(&self) -> Option<&Arc<dyn SignatureLoader>> {
        self.shared.signatures.as_ref()
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared> {
        Arc::downgrade(&self.shared)
    }

    pub(crate) fn upgrade(weak: &Weak<Shared>) -> Result<Bridge> {
        weak.upgrade().map(|shared| Bridge { shared }).ok_or(Error::BridgeReleased)
    }

    /// Returns `true` if both handles share the same state.
    pub fn ptr_eq(&self, other: &Bridge) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // ========================================================================
    // Foreign calls
    // ========================================================================

    /// Sends `selector` to a foreign object, reporting a foreign failure as
    /// [`Error::ForeignDispatchFailure`].
    pub fn invoke(&self, object: &ObjectRef, selector: &str, args: &[Value]) -> Result<Value> {
        self.runtime()
            .invoke(object, selector, args)
            .map_err(|source| Error::ForeignDispatchFailure {
                receiver: self.class_name_of(object),
                selector: selector.to_string(),
                source,
            })
    }

    /// Sends `selector` to a foreign class object.
    pub fn invoke_class(&self, class: ClassHandle, selector: &str, args: &[Value]) -> Result<Value> {
        self.runtime()
            .invoke_class(class, selector, args)
            .map_err(|source| Error::ForeignDispatchFailure {
                receiver: self.foreign_class_name(class),
                selector: selector.to_string(),
                source,
            })
    }

    /// The foreign class of a live object.
    pub fn class_of(&self, object: &ObjectRef) -> Result<ClassHandle> {
        self.runtime()
            .class_of(object)
            .map_err(|source| Error::ForeignDispatchFailure {
                receiver: format!("object {}", object.id()),
                selector: "class".to_string(),
                source,
            })
    }

    /// Foreign class name of `object`, for messages.
    pub fn class_name_of(&self, object: &ObjectRef) -> String {
        match self.runtime().class_of(object) {
            Ok(class) => self.foreign_class_name(class),
            Err(_) => format!("<dead object {}>", object.id()),
        }
    }

    pub(crate) fn foreign_class_name(&self, class: ClassHandle) -> String {
        self.runtime()
            .class_name(class)
            .unwrap_or_else(|| format!("#{}", class.0))
    }

    /// Foreign equality between two values.
    ///
    /// Objects are compared with `isEqual:`, so a foreign string equals a
    /// host string with the same contents. Host values compare structurally,
    /// with integers and floats comparing numerically.
    pub fn values_equal(&self, a: &Value, b: &Value) -> Result<bool> {
        match (a, b) {
            (Value::Object(x), Value::Object(y)) if x == y => Ok(true),
            (Value::Object(x), other) | (other, Value::Object(x)) => {
                Ok(self.invoke(x, "isEqual:", std::slice::from_ref(other))?.truthy())
            }
            (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => Ok((*i as f64) == *f),
            (Value::Array(x), Value::Array(y)) => {
                if x.len() != y.len() {
                    return Ok(false);
                }
                for (l, r) in x.iter().zip(y) {
                    if !self.values_equal(l, r)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(a == b),
        }
    }

    // ========================================================================
    // Class families
    // ========================================================================

    pub(crate) fn traits_of(&self, object: &ObjectRef) -> Result<ClassTraits> {
        let class = self.class_of(object)?;
        if let Some(traits) = self.shared.traits.read().get(&class) {
            return Ok(*traits);
        }
        let traits = self.classify(class);
        self.shared.traits.write().insert(class, traits);
        Ok(traits)
    }

    fn classify(&self, class: ClassHandle) -> ClassTraits {
        let config = self.config();
        let families = [
            (Family::Text, &config.text_family),
            (Family::Sequence, &config.sequence_family),
            (Family::Map, &config.map_family),
        ];
        let mut traits = ClassTraits {
            family: None,
            mutable: false,
        };
        let mut current = Some(class);
        let mut steps = 0;
        while let Some(handle) = current {
            if let Some(name) = self.runtime().class_name(handle) {
                for (family, names) in &families {
                    if name == names.mutable {
                        traits.family.get_or_insert(*family);
                        traits.mutable = true;
                    } else if name == names.immutable {
                        traits.family.get_or_insert(*family);
                    }
                }
            }
            let parent = self.runtime().superclass_of(handle);
            steps += 1;
            // A self-parented sentinel or a malformed chain ends the walk.
            if parent == Some(handle) || steps > 4096 {
                break;
            }
            current = parent;
        }
        traits
    }

    /// The collection family of a foreign object, if it belongs to one.
    pub fn family_of(&self, object: &ObjectRef) -> Result<Option<Family>> {
        Ok(self.traits_of(object)?.family)
    }

    /// Returns `true` if the object's class is the mutable member of its
    /// collection family.
    pub fn is_mutable(&self, object: &ObjectRef) -> Result<bool> {
        Ok(self.traits_of(object)?.mutable)
    }
}
