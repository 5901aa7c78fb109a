//! Message sends.
//!
//! A send looks the selector up from the starting class, checks the
//! arguments against the method's signature, then runs the implementation.
//! Argument problems are reported before the implementation is entered.

use super::LocalRuntime;
use super::class::{Imp, Method};
use crate::error::{ForeignError, ForeignResult};
use crate::foreign::{ClassHandle, Receiver};
use crate::value::{ObjectRef, Value};

fn check_args(method: &Method, selector: &str, args: &[Value]) -> ForeignResult<()> {
    let expected = method.signature.arg_count();
    if args.len() != expected {
        return Err(ForeignError::ArgumentCount {
            selector: selector.to_string(),
            expected,
            got: args.len(),
        });
    }
    if let Some((index, code)) = method.signature.first_mismatch(args) {
        return Err(ForeignError::InvalidArgument {
            selector: selector.to_string(),
            reason: format!(
                "argument {index} is {}, expected type '{}'",
                args[index].type_name(),
                code.as_char()
            ),
        });
    }
    Ok(())
}

impl LocalRuntime {
    pub(crate) fn send(
        &self,
        receiver: &ObjectRef,
        start: ClassHandle,
        selector: &str,
        args: &[Value],
    ) -> ForeignResult<Value> {
        let method = self.lookup_method(start, selector, false).ok_or_else(|| {
            ForeignError::UnrecognizedSelector {
                class: self.receiver_class_name(receiver),
                selector: selector.to_string(),
            }
        })?;
        check_args(&method, selector, args)?;

        match &method.imp {
            Imp::Native(f) => f(self, receiver, args),
            Imp::Bound(imp) => imp(Receiver::Instance(receiver), args),
            Imp::ClassNative(_) => Err(ForeignError::Exception {
                name: "NSInternalInconsistencyException".to_string(),
                reason: format!("class method '{selector}' found in an instance method table"),
            }),
        }
    }

    pub(crate) fn send_class(&self, class: ClassHandle, selector: &str, args: &[Value]) -> ForeignResult<Value> {
        let method = self
            .lookup_method(class, selector, true)
            .ok_or_else(|| ForeignError::UnrecognizedSelector {
                class: self.class_name_of(class),
                selector: selector.to_string(),
            })?;
        check_args(&method, selector, args)?;

        match &method.imp {
            Imp::ClassNative(f) => f(self, class, args),
            Imp::Bound(imp) => imp(Receiver::Class(class), args),
            Imp::Native(_) => Err(ForeignError::Exception {
                name: "NSInternalInconsistencyException".to_string(),
                reason: format!("instance method '{selector}' found in a class method table"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::LocalRuntime;
    use crate::error::ForeignError;
    use crate::foreign::ForeignRuntime;
    use crate::value::{ObjectRef, Value};

    fn answer(_: &LocalRuntime, _: &ObjectRef, args: &[Value]) -> crate::error::ForeignResult<Value> {
        Ok(Value::Int(args[0].as_int().unwrap_or(0) * 2))
    }

    #[test]
    fn test_send_checks_count_and_types() {
        let rt = LocalRuntime::new();
        let root = rt.class_by_name("NSObject").unwrap();
        let class = rt.define_class("Doubler", Some(root)).unwrap();
        rt.add_method(class, "double:", "i@:i", answer).unwrap();
        let obj = rt.create_instance(class).unwrap();

        assert_eq!(rt.invoke(&obj, "double:", &[Value::Int(21)]).unwrap(), Value::Int(42));
        assert!(matches!(
            rt.invoke(&obj, "double:", &[]),
            Err(ForeignError::ArgumentCount { expected: 1, got: 0, .. })
        ));
        assert!(matches!(
            rt.invoke(&obj, "double:", &[Value::from("x")]),
            Err(ForeignError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_unknown_selector_names_class() {
        let rt = LocalRuntime::new();
        let root = rt.class_by_name("NSObject").unwrap();
        let obj = rt.create_instance(root).unwrap();
        let err = rt.invoke(&obj, "frobnicate", &[]).unwrap_err();
        assert_eq!(
            err,
            ForeignError::UnrecognizedSelector {
                class: "NSObject".into(),
                selector: "frobnicate".into(),
            }
        );
    }

    #[test]
    fn test_inherited_lookup_and_cache_flush() {
        let rt = LocalRuntime::new();
        let root = rt.class_by_name("NSObject").unwrap();
        let parent = rt.define_class("Parent", Some(root)).unwrap();
        let child = rt.define_class("Child", Some(parent)).unwrap();
        rt.add_method(parent, "double:", "i@:i", answer).unwrap();
        let obj = rt.create_instance(child).unwrap();

        assert_eq!(rt.invoke(&obj, "double:", &[Value::Int(1)]).unwrap(), Value::Int(2));

        fn triple(_: &LocalRuntime, _: &ObjectRef, args: &[Value]) -> crate::error::ForeignResult<Value> {
            Ok(Value::Int(args[0].as_int().unwrap_or(0) * 3))
        }
        rt.add_method(child, "double:", "i@:i", triple).unwrap();
        assert_eq!(rt.invoke(&obj, "double:", &[Value::Int(1)]).unwrap(), Value::Int(3));
    }
}
