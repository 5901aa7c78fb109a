//! Host subclasses of mirror classes.
//!
//! [`Bridge::define_subclass`] registers a new foreign class under the
//! foreign class of the host superclass and mirrors it. Host methods defined
//! on the subclass stay host-side unless the foreign side has to see them:
//!
//! - a method whose selector already exists in the foreign superclass chain
//!   is an override and is published automatically;
//! - [`Bridge::export_method`] publishes a new method under an explicit
//!   signature;
//! - anything else is invisible to foreign callers.
//!
//! Published implementations hold the bridge weakly, so a dropped bridge
//! turns foreign calls into [`Error::BridgeReleased`] failures instead of
//! keeping the bridge alive.

use super::Bridge;
use super::instance::Instance;
use super::mirror::MirrorClass;
use crate::adapters::{TextLike, wrong_type};
use crate::encoding::{Signature, TypeCode};
use crate::error::{Error, ForeignError, Result};
use crate::foreign::{ClassHandle, MethodImp, Receiver};
use crate::selector::{selector_for_call, selector_for_export};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Body of a host instance method.
pub type HostFn = Arc<dyn Fn(&Bridge, &Instance, &[Value]) -> Result<Value> + Send + Sync>;

/// Body of a host class method.
pub type HostClassFn = Arc<dyn Fn(&Bridge, &MirrorClass, &[Value]) -> Result<Value> + Send + Sync>;

/// A host instance method with a fixed arity.
#[derive(Clone)]
pub struct HostMethod {
    name: String,
    arity: usize,
    imp: HostFn,
}

impl HostMethod {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Runs the method after checking the argument count.
    pub fn call(&self, bridge: &Bridge, receiver: &Instance, args: &[Value]) -> Result<Value> {
        check_arity(receiver.class().name(), &self.name, self.arity, args)?;
        (self.imp)(bridge, receiver, args)
    }
}

impl fmt::Debug for HostMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostMethod")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// A host class method with a fixed arity.
#[derive(Clone)]
pub struct HostClassMethod {
    name: String,
    arity: usize,
    imp: HostClassFn,
}

impl HostClassMethod {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, bridge: &Bridge, class: &MirrorClass, args: &[Value]) -> Result<Value> {
        check_arity(class.name(), &self.name, self.arity, args)?;
        (self.imp)(bridge, class, args)
    }
}

impl fmt::Debug for HostClassMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostClassMethod")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

fn check_arity(receiver: &str, name: &str, arity: usize, args: &[Value]) -> Result<()> {
    if args.len() != arity {
        return Err(Error::InvalidArgumentCount {
            receiver: receiver.to_string(),
            operation: name.to_string(),
            expected: arity.to_string(),
            got: args.len(),
        });
    }
    Ok(())
}

/// Whether and how a host method became visible to the foreign side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Publication {
    /// Only host callers can reach the method.
    HostOnly,
    /// Replaces an inherited foreign method with this selector.
    Override(String),
    /// A new foreign method with an explicit signature.
    Exported(String),
}

impl Publication {
    pub fn selector(&self) -> Option<&str> {
        match self {
            Publication::HostOnly => None,
            Publication::Override(s) | Publication::Exported(s) => Some(s),
        }
    }

    pub fn is_published(&self) -> bool {
        !matches!(self, Publication::HostOnly)
    }
}

/// How an exported method's foreign signature is written.
#[derive(Debug, Clone, Copy)]
pub enum ExportSignature<'a> {
    /// Host type tokens, the return type first: `&["int", "id"]`.
    Tokens(&'a [&'a str]),
    /// A full type encoding: `"i@:@"`.
    Encoding(&'a str),
}

fn check_override_arity(class: &MirrorClass, name: &str, inherited: &Signature, arity: usize) -> Result<()> {
    if inherited.arg_count() != arity {
        return Err(Error::InvalidArgumentCount {
            receiver: class.name().to_string(),
            operation: name.to_string(),
            expected: inherited.arg_count().to_string(),
            got: arity,
        });
    }
    Ok(())
}

fn fixed_signature(encoding: &str) -> Result<Signature> {
    Signature::parse(encoding).map_err(|e| Error::InvalidTypeEncoding {
        method: encoding.to_string(),
        token: e.0,
    })
}

fn unknown_key(err: Error) -> ForeignError {
    match err {
        Error::AccessorNotFound { .. } => ForeignError::Exception {
            name: "NSUnknownKeyException".to_string(),
            reason: err.to_string(),
        },
        other => other.into(),
    }
}

fn key_arg(bridge: &Bridge, value: &Value) -> Result<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        Value::Object(object) => bridge.text(object)?.read(),
        other => Err(wrong_type("key", "string", other)),
    }
}

fn not_an_instance(selector: &str) -> ForeignError {
    ForeignError::Exception {
        name: "HostError".to_string(),
        reason: format!("'{selector}' is an instance method"),
    }
}

impl Bridge {
    // ========================================================================
    // Subclassing
    // ========================================================================

    /// Creates a foreign class `name` under `parent`'s foreign class and
    /// returns its mirror.
    ///
    /// The new class answers the foreign side's undefined-key hooks with the
    /// host accessor table, so foreign key-value coding reaches accessors
    /// declared on the host side.
    ///
    /// # Errors
    ///
    /// - [`Error::ClassAlreadyDefined`] if a mirror or foreign class already
    ///   uses `name`.
    /// - [`Error::InvalidArgument`] if `parent` is the root proxy.
    ///
    /// # Example
    ///
    /// ```
    /// use objbridge::runtime::LocalRuntime;
    /// use objbridge::Bridge;
    ///
    /// let bridge = Bridge::new(LocalRuntime::new());
    /// let base = bridge.import_class("NSObject").unwrap();
    /// let view = bridge.define_subclass(&base, "MyView").unwrap();
    /// assert!(view.is_derived());
    /// assert_eq!(bridge.import_class("MyView").unwrap(), view);
    /// ```
    pub fn define_subclass(&self, parent: &MirrorClass, name: &str) -> Result<MirrorClass> {
        let parent_handle = parent.foreign().ok_or_else(|| Error::InvalidArgument {
            receiver: parent.name().to_string(),
            operation: "subclass".to_string(),
            reason: "the root proxy has no foreign class".to_string(),
        })?;

        self.shared().registry.exclusive(|| {
            if self.mirror(name).is_some() || self.runtime().class_by_name(name).is_some() {
                return Err(Error::ClassAlreadyDefined { name: name.to_string() });
            }
            let handle = self
                .runtime()
                .register_class(name, parent_handle)
                .map_err(|source| match source {
                    ForeignError::ClassExists { name } => Error::ClassAlreadyDefined { name },
                    source => Error::ForeignDispatchFailure {
                        receiver: parent.name().to_string(),
                        selector: "subclass".to_string(),
                        source,
                    },
                })?;
            let mirror = MirrorClass::new(name, Some(handle), Some(parent.clone()), true, None);
            self.register_mirror(name, &mirror);
            self.bind_key_value_hooks(&mirror, handle)?;
            objbridge_log::debug!("defined {name} < {}", parent.name());
            Ok(mirror)
        })
    }

    fn bind_key_value_hooks(&self, class: &MirrorClass, handle: ClassHandle) -> Result<()> {
        let weak = self.downgrade();
        let get: MethodImp = Arc::new(move |receiver, args| {
            let Receiver::Instance(object) = receiver else {
                return Err(not_an_instance("valueForUndefinedKey:"));
            };
            let bridge = Bridge::upgrade(&weak)?;
            let inst = bridge.wrap(object)?;
            let key = key_arg(&bridge, &args[0])?;
            bridge.host_value_for_key(&inst, &key).map_err(unknown_key)
        });
        self.bind(class, handle, "valueForUndefinedKey:", &fixed_signature("@@:@")?, false, get)?;

        let weak = self.downgrade();
        let set: MethodImp = Arc::new(move |receiver, args| {
            let Receiver::Instance(object) = receiver else {
                return Err(not_an_instance("setValue:forUndefinedKey:"));
            };
            let bridge = Bridge::upgrade(&weak)?;
            let inst = bridge.wrap(object)?;
            let key = key_arg(&bridge, &args[1])?;
            bridge
                .host_set_value_for_key(&inst, &key, args[0].clone())
                .map_err(unknown_key)?;
            Ok(Value::Nil)
        });
        self.bind(class, handle, "setValue:forUndefinedKey:", &fixed_signature("v@:@@")?, false, set)
    }

    fn bind(
        &self,
        class: &MirrorClass,
        handle: ClassHandle,
        selector: &str,
        signature: &Signature,
        is_static: bool,
        imp: MethodImp,
    ) -> Result<()> {
        self.runtime()
            .bind_method(handle, selector, signature, is_static, imp)
            .map_err(|source| Error::ForeignDispatchFailure {
                receiver: class.name().to_string(),
                selector: selector.to_string(),
                source,
            })?;
        objbridge_log::debug!("{}: published {selector} ({})", class.name(), signature.encoding());
        Ok(())
    }

    /// The signature `selector` has in the foreign superclass chain of a
    /// derived class, if any.
    fn inherited_signature(&self, class: &MirrorClass, selector: &str, is_static: bool) -> Option<Signature> {
        let handle = class.foreign().filter(|_| class.is_derived())?;
        let parent = self.runtime().superclass_of(handle)?;
        self.runtime().method_signature(parent, selector, is_static)
    }

    fn publish_method(
        &self,
        class: &MirrorClass,
        selector: &str,
        signature: &Signature,
        method: HostMethod,
    ) -> Result<()> {
        let handle = derived_handle(class)?;
        let weak = self.downgrade();
        let void = signature.ret() == TypeCode::Void;
        let name = selector.to_string();
        let imp: MethodImp = Arc::new(move |receiver, args| {
            let Receiver::Instance(object) = receiver else {
                return Err(not_an_instance(&name));
            };
            let bridge = Bridge::upgrade(&weak)?;
            let inst = bridge.wrap(object)?;
            let out = method.call(&bridge, &inst, args)?;
            Ok(if void { Value::Nil } else { out })
        });
        self.bind(class, handle, selector, signature, false, imp)
    }

    fn publish_class_method(
        &self,
        class: &MirrorClass,
        selector: &str,
        signature: &Signature,
        method: HostClassMethod,
    ) -> Result<()> {
        let handle = derived_handle(class)?;
        let weak = self.downgrade();
        let void = signature.ret() == TypeCode::Void;
        let name = selector.to_string();
        let imp: MethodImp = Arc::new(move |receiver, args| {
            let Receiver::Class(class) = receiver else {
                return Err(ForeignError::Exception {
                    name: "HostError".to_string(),
                    reason: format!("'{name}' is a class method"),
                });
            };
            let bridge = Bridge::upgrade(&weak)?;
            let mirror = bridge.mirror_for_handle(class)?;
            let out = method.call(&bridge, &mirror, args)?;
            Ok(if void { Value::Nil } else { out })
        });
        self.bind(class, handle, selector, signature, true, imp)
    }

    // ========================================================================
    // Methods
    // ========================================================================

    /// Defines a host instance method taking exactly `arity` arguments.
    ///
    /// On a derived class, a method whose selector the foreign superclass
    /// chain already answers is published as an override, with the
    /// inherited signature.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgumentCount`] if `arity` does not match the
    /// inherited method being overridden.
    pub fn define_method(
        &self,
        class: &MirrorClass,
        name: &str,
        arity: usize,
        body: impl Fn(&Bridge, &Instance, &[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Result<Publication> {
        let method = HostMethod {
            name: name.to_string(),
            arity,
            imp: Arc::new(body),
        };
        let selector = selector_for_call(name, arity);
        let inherited = self.inherited_signature(class, &selector, false);
        if let Some(signature) = &inherited {
            check_override_arity(class, name, signature, arity)?;
        }

        class
            .inner()
            .methods
            .write()
            .insert(name.to_string(), method.clone());

        match inherited {
            Some(signature) => {
                self.publish_method(class, &selector, &signature, method)?;
                Ok(Publication::Override(selector))
            }
            None => {
                objbridge_log::debug!("{}#{name} stays host-side", class.name());
                Ok(Publication::HostOnly)
            }
        }
    }

    /// Defines a host class method. Overrides of foreign class methods on a
    /// derived class are published the same way instance methods are.
    pub fn define_class_method(
        &self,
        class: &MirrorClass,
        name: &str,
        arity: usize,
        body: impl Fn(&Bridge, &MirrorClass, &[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Result<Publication> {
        let method = HostClassMethod {
            name: name.to_string(),
            arity,
            imp: Arc::new(body),
        };
        let selector = selector_for_call(name, arity);
        let inherited = self.inherited_signature(class, &selector, true);
        if let Some(signature) = &inherited {
            check_override_arity(class, name, signature, arity)?;
        }

        class
            .inner()
            .class_methods
            .write()
            .insert(name.to_string(), method.clone());

        match inherited {
            Some(signature) => {
                self.publish_class_method(class, &selector, &signature, method)?;
                Ok(Publication::Override(selector))
            }
            None => Ok(Publication::HostOnly),
        }
    }

    /// Publishes the host method `name` of a derived class as a new foreign
    /// method with the given signature.
    ///
    /// The signature is checked before anything is registered.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTypeEncoding`] for an unknown type token or a
    ///   malformed encoding.
    /// - [`Error::InvalidArgumentCount`] if the signature's argument count
    ///   differs from the method's arity.
    /// - [`Error::NoMethod`] if `class` has no host method `name`.
    ///
    /// # Example
    ///
    /// ```
    /// use objbridge::bridge::registrar::ExportSignature;
    /// use objbridge::foreign::ForeignRuntime;
    /// use objbridge::runtime::LocalRuntime;
    /// use objbridge::{Bridge, Value};
    ///
    /// let rt = LocalRuntime::new();
    /// let bridge = Bridge::new(rt.clone());
    /// let base = bridge.import_class("NSObject").unwrap();
    /// let calc = bridge.define_subclass(&base, "Calc").unwrap();
    /// bridge
    ///     .define_method(&calc, "double", 1, |_, _, args| Ok(Value::Int(args[0].as_int().unwrap_or(0) * 2)))
    ///     .unwrap();
    /// bridge.export_method(&calc, "double", ExportSignature::Tokens(&["int", "int"])).unwrap();
    ///
    /// let obj = bridge.alloc_init(&calc, "init", vec![]).unwrap();
    /// assert_eq!(rt.invoke(obj.object(), "double:", &[Value::Int(21)]).unwrap(), Value::Int(42));
    /// ```
    pub fn export_method(
        &self,
        class: &MirrorClass,
        name: &str,
        signature: ExportSignature<'_>,
    ) -> Result<Publication> {
        let parsed = match signature {
            ExportSignature::Tokens(tokens) => Signature::from_tokens(tokens),
            ExportSignature::Encoding(encoding) => Signature::parse(encoding),
        };
        let signature = parsed.map_err(|e| Error::InvalidTypeEncoding {
            method: name.to_string(),
            token: e.0,
        })?;
        let method = class.find_method(name).ok_or_else(|| Error::NoMethod {
            class: class.name().to_string(),
            name: name.to_string(),
            tried: vec!["host method"],
        })?;
        if method.arity() != signature.arg_count() {
            return Err(Error::InvalidArgumentCount {
                receiver: class.name().to_string(),
                operation: name.to_string(),
                expected: method.arity().to_string(),
                got: signature.arg_count(),
            });
        }
        let selector = selector_for_export(name, signature.arg_count() > 0);
        self.publish_method(class, &selector, &signature, method)?;
        Ok(Publication::Exported(selector))
    }

    /// Publishes host methods of a derived class that override foreign
    /// methods, for methods defined before the override could be detected.
    ///
    /// # Errors
    ///
    /// [`Error::NoMethod`] if a name has no host method, or its selector is
    /// not in the foreign superclass chain.
    pub fn declare_overrides(&self, class: &MirrorClass, names: &[&str]) -> Result<Vec<Publication>> {
        let mut published = Vec::with_capacity(names.len());
        for name in names {
            let method = class.find_method(name).ok_or_else(|| Error::NoMethod {
                class: class.name().to_string(),
                name: name.to_string(),
                tried: vec!["host method"],
            })?;
            let selector = selector_for_call(name, method.arity());
            let signature = self
                .inherited_signature(class, &selector, false)
                .ok_or_else(|| Error::NoMethod {
                    class: class.name().to_string(),
                    name: selector.clone(),
                    tried: vec!["foreign superclass"],
                })?;
            self.publish_method(class, &selector, &signature, method)?;
            published.push(Publication::Override(selector));
        }
        Ok(published)
    }
}

fn derived_handle(class: &MirrorClass) -> Result<ClassHandle> {
    class
        .foreign()
        .filter(|_| class.is_derived())
        .ok_or_else(|| Error::InvalidArgument {
            receiver: class.name().to_string(),
            operation: "export".to_string(),
            reason: "only classes defined by subclassing can publish methods".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForeignResult;
    use crate::foreign::ForeignRuntime;
    use crate::runtime::{LocalRuntime, Phase};
    use crate::value::ObjectRef;

    fn base_area(_: &LocalRuntime, _: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
        Ok(Value::Int(1))
    }

    fn setup() -> (Arc<LocalRuntime>, Bridge, MirrorClass) {
        let rt = LocalRuntime::new();
        let root = rt.class_by_name("NSObject").unwrap();
        let shape = rt.define_class("Shape", Some(root)).unwrap();
        rt.add_method(shape, "area", "q@:", base_area).unwrap();
        let bridge = Bridge::new(rt.clone());
        let shape = bridge.import_class("Shape").unwrap();
        (rt, bridge, shape)
    }

    #[test]
    fn test_subclass_registers_foreign_class() {
        let (rt, bridge, shape) = setup();
        let square = bridge.define_subclass(&shape, "Square").unwrap();

        let handle = square.foreign().unwrap();
        assert_eq!(rt.class_name(handle).unwrap(), "Square");
        assert_eq!(rt.superclass_of(handle), shape.foreign());
        assert!(square.is_derived());
        assert_eq!(square.superclass(), Some(&shape));
        assert_eq!(bridge.import_class("Square").unwrap(), square);
    }

    #[test]
    fn test_duplicate_subclass_name() {
        let (_rt, bridge, shape) = setup();
        bridge.define_subclass(&shape, "Square").unwrap();
        assert_eq!(
            bridge.define_subclass(&shape, "Square").unwrap_err(),
            Error::ClassAlreadyDefined { name: "Square".into() }
        );
        assert!(matches!(
            bridge.define_subclass(&shape, "NSString"),
            Err(Error::ClassAlreadyDefined { .. })
        ));
        assert!(matches!(
            bridge.define_subclass(&bridge.root(), "Orphan"),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_override_reaches_foreign_callers() {
        let (rt, bridge, shape) = setup();
        let square = bridge.define_subclass(&shape, "Square").unwrap();
        let publication = bridge
            .define_method(&square, "area", 0, |bridge, inst, _| {
                let base = bridge.send_super(inst, inst.class(), "area", vec![])?;
                Ok(Value::Int(base.as_int().unwrap_or(0) + 15))
            })
            .unwrap();
        assert_eq!(publication, Publication::Override("area".into()));

        let obj = bridge.alloc_init(&square, "init", vec![]).unwrap();
        assert_eq!(rt.invoke(obj.object(), "area", &[]).unwrap(), Value::Int(16));

        let plain = bridge.alloc_init(&shape, "init", vec![]).unwrap();
        assert_eq!(rt.invoke(plain.object(), "area", &[]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_plain_methods_stay_host_side() {
        let (rt, bridge, shape) = setup();
        let square = bridge.define_subclass(&shape, "Square").unwrap();
        let publication = bridge
            .define_method(&square, "side", 0, |_, _, _| Ok(Value::Int(4)))
            .unwrap();
        assert_eq!(publication, Publication::HostOnly);

        let obj = bridge.alloc_init(&square, "init", vec![]).unwrap();
        assert_eq!(bridge.send(&obj, "side", vec![]).unwrap(), Value::Int(4));
        assert!(matches!(
            rt.invoke(obj.object(), "side", &[]),
            Err(ForeignError::UnrecognizedSelector { .. })
        ));
    }

    #[test]
    fn test_methods_on_imported_classes_are_host_only() {
        let (_rt, bridge, shape) = setup();
        let publication = bridge
            .define_method(&shape, "area", 0, |_, _, _| Ok(Value::Int(9)))
            .unwrap();
        assert_eq!(publication, Publication::HostOnly);
    }

    #[test]
    fn test_host_arity_is_checked() {
        let (_rt, bridge, shape) = setup();
        let square = bridge.define_subclass(&shape, "Square").unwrap();
        bridge
            .define_method(&square, "scale", 1, |_, _, args| Ok(args[0].clone()))
            .unwrap();
        let obj = bridge.alloc_init(&square, "init", vec![]).unwrap();
        assert!(matches!(
            bridge.send(&obj, "scale", vec![]),
            Err(Error::InvalidArgumentCount { got: 0, .. })
        ));
    }

    #[test]
    fn test_invalid_export_registers_nothing() {
        let (rt, bridge, shape) = setup();
        let square = bridge.define_subclass(&shape, "Square").unwrap();
        bridge
            .define_method(&square, "resize", 1, |_, _, _| Ok(Value::Nil))
            .unwrap();

        let err = bridge
            .export_method(&square, "resize", ExportSignature::Tokens(&["void", "quaternion"]))
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidTypeEncoding {
                method: "resize".into(),
                token: "quaternion".into()
            }
        );
        assert!(matches!(
            bridge.export_method(&square, "resize", ExportSignature::Encoding("v@:!")),
            Err(Error::InvalidTypeEncoding { .. })
        ));
        assert!(rt.method_signature(square.foreign().unwrap(), "resize:", false).is_none());
    }

    #[test]
    fn test_export_with_encoding_checks_foreign_arguments() {
        let (rt, bridge, shape) = setup();
        let square = bridge.define_subclass(&shape, "Square").unwrap();
        bridge
            .define_method(&square, "label", 1, |_, _, args| Ok(args[0].clone()))
            .unwrap();
        let publication = bridge
            .export_method(&square, "label", ExportSignature::Encoding("i@:i"))
            .unwrap();
        assert_eq!(publication.selector(), Some("label:"));

        let obj = bridge.alloc_init(&square, "init", vec![]).unwrap();
        assert_eq!(rt.invoke(obj.object(), "label:", &[Value::Int(3)]).unwrap(), Value::Int(3));
        assert!(matches!(
            rt.invoke(obj.object(), "label:", &[Value::from("x")]),
            Err(ForeignError::InvalidArgument { .. })
        ));
        assert!(matches!(
            bridge.export_method(&square, "missing", ExportSignature::Tokens(&["void"])),
            Err(Error::NoMethod { .. })
        ));
    }

    #[test]
    fn test_class_method_override() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let array = bridge.import_class("NSMutableArray").unwrap();
        let list = bridge.define_subclass(&array, "TodoList").unwrap();

        let publication = bridge
            .define_class_method(&list, "array", 0, |_, class, _| Ok(Value::from(class.name())))
            .unwrap();
        assert_eq!(publication, Publication::Override("array".into()));
        assert_eq!(
            rt.invoke_class(list.foreign().unwrap(), "array", &[]).unwrap(),
            Value::from("TodoList")
        );
        assert_eq!(bridge.send_class(&list, "array", vec![]).unwrap(), Value::from("TodoList"));
    }

    #[test]
    fn test_foreign_key_value_coding_reaches_host_accessors() {
        let (rt, bridge, shape) = setup();
        let square = bridge.define_subclass(&shape, "Square").unwrap();
        bridge.declare_accessor(&square, "side", true).unwrap();
        let obj = bridge.alloc_init(&square, "init", vec![]).unwrap();
        rt.take_notifications();

        rt.invoke(obj.object(), "setValue:forKey:", &[Value::Int(3), Value::from("side")])
            .unwrap();
        assert_eq!(
            rt.invoke(obj.object(), "valueForKey:", &[Value::from("side")]).unwrap(),
            Value::Int(3)
        );
        let phases: Vec<_> = rt.take_notifications().into_iter().map(|n| n.phase).collect();
        assert_eq!(phases, vec![Phase::Will, Phase::Did]);

        let err = rt
            .invoke(obj.object(), "valueForKey:", &[Value::from("color")])
            .unwrap_err();
        assert!(matches!(err, ForeignError::Exception { ref name, .. } if name == "NSUnknownKeyException"));
    }

    #[test]
    fn test_declare_overrides_requires_foreign_selector() {
        let (rt, bridge, shape) = setup();
        let square = bridge.define_subclass(&shape, "Square").unwrap();
        bridge
            .define_method(&square, "side", 0, |_, _, _| Ok(Value::Int(4)))
            .unwrap();
        assert!(matches!(
            bridge.declare_overrides(&square, &["side"]),
            Err(Error::NoMethod { .. })
        ));

        let sub = bridge.define_subclass(&square, "Cube").unwrap();
        bridge
            .define_method(&square, "area", 0, |_, _, _| Ok(Value::Int(16)))
            .unwrap();
        let published = bridge.declare_overrides(&sub, &["area"]).unwrap();
        assert_eq!(published, vec![Publication::Override("area".into())]);
        let obj = bridge.alloc_init(&sub, "init", vec![]).unwrap();
        assert_eq!(rt.invoke(obj.object(), "area", &[]).unwrap(), Value::Int(16));
    }

    #[test]
    fn test_released_bridge_fails_foreign_calls() {
        let (rt, bridge, shape) = setup();
        let square = bridge.define_subclass(&shape, "Square").unwrap();
        bridge
            .define_method(&square, "area", 0, |_, _, _| Ok(Value::Int(2)))
            .unwrap();
        let obj = bridge.alloc_init(&square, "init", vec![]).unwrap();
        let object = obj.object().clone();
        drop(obj);
        drop(square);
        drop(shape);
        drop(bridge);

        let err = rt.invoke(&object, "area", &[]).unwrap_err();
        assert!(matches!(err, ForeignError::Exception { ref name, .. } if name == "HostError"));
    }
}
