//! Name resolution.
//!
//! An unresolved name is tried as a foreign constant first (through the
//! signature loader), then as a foreign class (through the mirror import).
//! If neither answers, the failure is [`Error::NameNotFound`] so that a
//! surrounding scope can still supply its own definition.
//!
//! A [`Namespace`] puts that resolution between its own host definitions
//! and whatever resolver was in place before it:
//!
//! 1. names defined in the namespace itself;
//! 2. the bridge;
//! 3. the previous resolver, if one was installed.

use super::Bridge;
use super::mirror::MirrorClass;
use crate::error::{Error, Result};
use crate::fallback::{self, Resolution, Strategy};
use crate::value::Value;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// What a name resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Constant(Value),
    Class(MirrorClass),
}

impl Resolved {
    pub fn as_class(&self) -> Option<&MirrorClass> {
        match self {
            Resolved::Class(class) => Some(class),
            Resolved::Constant(_) => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Resolved::Constant(value) => Some(value),
            Resolved::Class(_) => None,
        }
    }
}

impl Bridge {
    /// Resolves `name` as a foreign constant, then as a foreign class.
    ///
    /// # Errors
    ///
    /// - [`Error::NameNotFound`] if neither exists.
    /// - [`Error::ImportCycle`] from a malformed foreign hierarchy.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use objbridge::bridge::resolver::Resolved;
    /// use objbridge::runtime::{LocalRuntime, MemorySignatures};
    /// use objbridge::{Bridge, Value};
    ///
    /// let sigs = Arc::new(MemorySignatures::new());
    /// sigs.define("NSNotFound", Value::Int(-1));
    /// let bridge = Bridge::builder(LocalRuntime::new()).signatures(sigs).build();
    ///
    /// assert_eq!(bridge.resolve("NSNotFound").unwrap(), Resolved::Constant(Value::Int(-1)));
    /// assert!(bridge.resolve("NSArray").unwrap().as_class().is_some());
    /// assert!(bridge.resolve("NSNothing").is_err());
    /// ```
    pub fn resolve(&self, name: &str) -> Result<Resolved> {
        let lookup = Lookup { bridge: self, name };
        match fallback::resolve::<Lookup<'_>, Resolved>(&[&ForeignConstant, &ForeignClass], &lookup)? {
            Resolution::Found(resolved) => Ok(resolved),
            Resolution::Exhausted(tried) => {
                objbridge_log::trace!("{name} not found as {}", tried.join(" or "));
                Err(Error::NameNotFound { name: name.to_string() })
            }
        }
    }
}

struct Lookup<'a> {
    bridge: &'a Bridge,
    name: &'a str,
}

struct ForeignConstant;
struct ForeignClass;

impl Strategy<Lookup<'_>, Resolved> for ForeignConstant {
    fn name(&self) -> &'static str {
        "foreign constant"
    }

    fn attempt(&self, input: &Lookup<'_>) -> Result<Option<Resolved>> {
        let Some(loader) = input.bridge.signatures() else {
            return Ok(None);
        };
        Ok(loader.lookup_constant(input.name).map(|value| {
            objbridge_log::trace!("{} resolved as a foreign constant", input.name);
            Resolved::Constant(value)
        }))
    }
}

impl Strategy<Lookup<'_>, Resolved> for ForeignClass {
    fn name(&self) -> &'static str {
        "foreign class"
    }

    fn attempt(&self, input: &Lookup<'_>) -> Result<Option<Resolved>> {
        match input.bridge.import_class(input.name) {
            Ok(class) => Ok(Some(Resolved::Class(class))),
            Err(Error::ClassNotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// A resolver consulted when a namespace and its bridge both fail.
pub type Fallback = Arc<dyn Fn(&str) -> Result<Resolved> + Send + Sync>;

/// A scope of host definitions layered over the bridge.
pub struct Namespace {
    name: String,
    bridge: Bridge,
    own: RwLock<FxHashMap<String, Resolved>>,
    previous: Option<Fallback>,
}

impl Namespace {
    pub fn new(name: &str, bridge: Bridge) -> Self {
        Namespace {
            name: name.to_string(),
            bridge,
            own: RwLock::new(FxHashMap::default()),
            previous: None,
        }
    }

    /// Installs the resolver that was in place before this namespace.
    pub fn with_previous(mut self, previous: impl Fn(&str) -> Result<Resolved> + Send + Sync + 'static) -> Self {
        self.previous = Some(Arc::new(previous));
        self
    }

    /// Chains to an enclosing namespace.
    pub fn with_parent(self, parent: Arc<Namespace>) -> Self {
        self.with_previous(move |name| parent.lookup(name))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Defines `name` in this namespace, shadowing the bridge.
    pub fn define(&self, name: &str, value: Resolved) {
        self.own.write().insert(name.to_string(), value);
    }

    /// Returns `true` if `name` is defined in this namespace itself.
    pub fn defines(&self, name: &str) -> bool {
        self.own.read().contains_key(name)
    }

    /// Looks `name` up in this namespace, the bridge, then the previous
    /// resolver.
    pub fn lookup(&self, name: &str) -> Result<Resolved> {
        if let Some(found) = self.own.read().get(name) {
            return Ok(found.clone());
        }
        match self.bridge.resolve(name) {
            Err(Error::NameNotFound { .. }) => {}
            other => return other,
        }
        match &self.previous {
            Some(previous) => previous(name),
            None => {
                objbridge_log::debug!("{}: {name} is not defined", self.name);
                Err(Error::NameNotFound { name: name.to_string() })
            }
        }
    }

    /// Looks up a class.
    ///
    /// # Errors
    ///
    /// [`Error::NameNotFound`] if `name` is missing or names a constant.
    pub fn class(&self, name: &str) -> Result<MirrorClass> {
        match self.lookup(name)? {
            Resolved::Class(class) => Ok(class),
            Resolved::Constant(_) => Err(Error::NameNotFound { name: name.to_string() }),
        }
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.own.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("own", &names)
            .field("previous", &self.previous.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{LocalRuntime, MemorySignatures};

    fn bridge_with(constants: &[(&str, Value)]) -> Bridge {
        let sigs = Arc::new(MemorySignatures::new());
        for (name, value) in constants {
            sigs.define(name, value.clone());
        }
        Bridge::builder(LocalRuntime::new()).signatures(sigs).build()
    }

    #[test]
    fn test_constant_wins_over_class() {
        let bridge = bridge_with(&[("NSString", Value::Int(7))]);
        assert_eq!(bridge.resolve("NSString").unwrap(), Resolved::Constant(Value::Int(7)));
    }

    #[test]
    fn test_resolution_without_signature_loader() {
        let bridge = Bridge::new(LocalRuntime::new());
        assert_eq!(bridge.resolve("NSArray").unwrap().as_class(), bridge.mirror("NSArray").as_ref());
        assert_eq!(
            bridge.resolve("NSNotFound").unwrap_err(),
            Error::NameNotFound { name: "NSNotFound".into() }
        );
    }

    #[test]
    fn test_class_resolution_registers_mirror() {
        let bridge = bridge_with(&[]);
        assert!(bridge.mirror("NSMutableDictionary").is_none());
        let resolved = bridge.resolve("NSMutableDictionary").unwrap();
        assert_eq!(resolved.as_class(), bridge.mirror("NSMutableDictionary").as_ref());
    }

    #[test]
    fn test_missing_name() {
        let bridge = bridge_with(&[]);
        assert_eq!(
            bridge.resolve("Nope").unwrap_err(),
            Error::NameNotFound { name: "Nope".into() }
        );
        assert!(matches!(bridge.resolve("_Private"), Err(Error::NameNotFound { .. })));
    }

    #[test]
    fn test_namespace_order() {
        let bridge = bridge_with(&[("NSNotFound", Value::Int(-1))]);
        let ns = Namespace::new("App", bridge.clone())
            .with_previous(|name| match name {
                "Version" => Ok(Resolved::Constant(Value::from("1.0"))),
                "NSNotFound" => Ok(Resolved::Constant(Value::Int(0))),
                _ => Err(Error::NameNotFound { name: name.to_string() }),
            });
        ns.define("Limit", Resolved::Constant(Value::Int(10)));
        ns.define("NSArray", Resolved::Constant(Value::Nil));

        assert_eq!(ns.lookup("Limit").unwrap(), Resolved::Constant(Value::Int(10)));
        assert_eq!(ns.lookup("NSArray").unwrap(), Resolved::Constant(Value::Nil));
        assert_eq!(ns.lookup("NSNotFound").unwrap(), Resolved::Constant(Value::Int(-1)));
        assert_eq!(ns.lookup("Version").unwrap(), Resolved::Constant(Value::from("1.0")));
        assert_eq!(ns.class("NSString").unwrap().name(), "NSString");
        assert!(matches!(ns.lookup("Missing"), Err(Error::NameNotFound { .. })));
        assert!(matches!(ns.class("Limit"), Err(Error::NameNotFound { .. })));
    }

    #[test]
    fn test_nested_namespaces() {
        let bridge = bridge_with(&[]);
        let outer = Arc::new(Namespace::new("Outer", bridge.clone()));
        outer.define("Shared", Resolved::Constant(Value::Int(1)));
        let inner = Namespace::new("Inner", bridge).with_parent(outer);
        assert_eq!(inner.lookup("Shared").unwrap(), Resolved::Constant(Value::Int(1)));
        assert!(!inner.defines("Shared"));
    }
}
