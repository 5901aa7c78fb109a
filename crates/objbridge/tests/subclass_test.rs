//! Integration tests for host subclassing.
//!
//! A host subclass of an imported foreign class is registered with the
//! foreign runtime; its overrides must be what foreign code runs, even when
//! the call starts inside a native method of the superclass.

mod common;

use common::{drain, pair, with_controls};
use objbridge::bridge::registrar::{ExportSignature, Publication};
use objbridge::error::ForeignError;
use objbridge::foreign::ForeignRuntime;
use objbridge::{Error, Value};

// ============================================================================
// Overrides
// ============================================================================

#[test]
fn test_override_is_reached_from_foreign_code() {
    let (rt, bridge) = with_controls();
    let widget = bridge.import_class("Widget").unwrap();
    let fancy = bridge.define_subclass(&widget, "FancyWidget").unwrap();

    let publication = bridge
        .define_method(&fancy, "draw", 0, |_, _, _| Ok(Value::from("fancy")))
        .unwrap();
    assert_eq!(publication, Publication::Override("draw".into()));

    let obj = bridge.alloc_init(&fancy, "init", vec![]).unwrap();
    // `render` is native Control code that sends `draw` to itself.
    assert_eq!(rt.invoke(obj.object(), "render", &[]).unwrap(), Value::from("<fancy>"));
    assert_eq!(bridge.send(&obj, "render", vec![]).unwrap(), Value::from("<fancy>"));

    let plain = bridge.alloc_init(&widget, "init", vec![]).unwrap();
    assert_eq!(rt.invoke(plain.object(), "render", &[]).unwrap(), Value::from("<control>"));
}

#[test]
fn test_override_can_call_super() {
    let (rt, bridge) = with_controls();
    let widget = bridge.import_class("Widget").unwrap();
    let framed = bridge.define_subclass(&widget, "FramedWidget").unwrap();
    bridge
        .define_method(&framed, "draw", 0, |bridge, inst, _| {
            let base = bridge.send_super(inst, inst.class(), "draw", vec![])?;
            Ok(Value::Str(format!("[{}]", base.as_str().unwrap_or_default())))
        })
        .unwrap();

    let obj = bridge.alloc_init(&framed, "init", vec![]).unwrap();
    assert_eq!(rt.invoke(obj.object(), "render", &[]).unwrap(), Value::from("<[control]>"));
}

#[test]
fn test_subclass_of_subclass_inherits_override() {
    let (rt, bridge) = with_controls();
    let widget = bridge.import_class("Widget").unwrap();
    let fancy = bridge.define_subclass(&widget, "FancyWidget").unwrap();
    bridge
        .define_method(&fancy, "draw", 0, |_, _, _| Ok(Value::from("fancy")))
        .unwrap();
    let fancier = bridge.define_subclass(&fancy, "FancierWidget").unwrap();

    let obj = bridge.alloc_init(&fancier, "init", vec![]).unwrap();
    assert_eq!(rt.invoke(obj.object(), "render", &[]).unwrap(), Value::from("<fancy>"));
    assert_eq!(
        fancier.ancestors().iter().map(|c| c.name()).collect::<Vec<_>>(),
        vec!["FancyWidget", "Widget", "Control", "ObjcID"]
    );
}

#[test]
fn test_host_errors_reach_foreign_callers_as_exceptions() {
    let (rt, bridge) = with_controls();
    let widget = bridge.import_class("Widget").unwrap();
    let broken = bridge.define_subclass(&widget, "BrokenWidget").unwrap();
    bridge
        .define_method(&broken, "draw", 0, |_, inst, _| {
            Err(Error::InvalidArgument {
                receiver: inst.class().name().to_string(),
                operation: "draw".to_string(),
                reason: "out of ink".to_string(),
            })
        })
        .unwrap();

    let obj = bridge.alloc_init(&broken, "init", vec![]).unwrap();
    let err = rt.invoke(obj.object(), "render", &[]).unwrap_err();
    assert!(matches!(err, ForeignError::Exception { ref name, .. } if name == "HostError"));
}

// ============================================================================
// Exports
// ============================================================================

#[test]
fn test_exported_method_is_callable_from_foreign_side() {
    let (rt, bridge) = with_controls();
    let widget = bridge.import_class("Widget").unwrap();
    let sized = bridge.define_subclass(&widget, "SizedWidget").unwrap();
    let obj = bridge.alloc_init(&sized, "init", vec![]).unwrap();
    assert!(rt.invoke(obj.object(), "area:with:", &[Value::Int(2), Value::Int(3)]).is_err());

    assert!(matches!(
        bridge.export_method(&sized, "area_with", ExportSignature::Tokens(&["int", "int", "int"])),
        Err(Error::NoMethod { .. })
    ));

    bridge
        .define_method(&sized, "area_with", 2, |_, _, args| {
            Ok(Value::Int(args[0].as_int().unwrap_or(0) * args[1].as_int().unwrap_or(0)))
        })
        .unwrap();
    let publication = bridge
        .export_method(&sized, "area_with", ExportSignature::Tokens(&["int", "int", "int"]))
        .unwrap();
    assert_eq!(publication.selector(), Some("area:with:"));
    assert_eq!(
        rt.invoke(obj.object(), "area:with:", &[Value::Int(2), Value::Int(3)]).unwrap(),
        Value::Int(6)
    );
}

#[test]
fn test_invalid_export_registers_nothing() {
    let (rt, bridge) = with_controls();
    let widget = bridge.import_class("Widget").unwrap();
    let sized = bridge.define_subclass(&widget, "SizedWidget").unwrap();
    bridge
        .define_method(&sized, "grow", 1, |_, _, args| Ok(args[0].clone()))
        .unwrap();

    assert!(matches!(
        bridge.export_method(&sized, "grow", ExportSignature::Encoding("v@:!")),
        Err(Error::InvalidTypeEncoding { .. })
    ));
    let handle = sized.foreign().unwrap();
    assert!(rt.method_signature(handle, "grow:", false).is_none());
}

// ============================================================================
// Accessors on Subclasses
// ============================================================================

#[test]
fn test_foreign_array_accessor_calls_notify_by_index() {
    let (rt, bridge) = with_controls();
    let widget = bridge.import_class("Widget").unwrap();
    let panel = bridge.define_subclass(&widget, "Panel").unwrap();
    bridge.declare_array_accessor(&panel, "children").unwrap();
    let obj = bridge.alloc_init(&panel, "init", vec![]).unwrap();
    drain(&rt);

    rt.invoke(obj.object(), "insertObject:inChildrenAtIndex:", &[Value::from("a"), Value::Int(0)])
        .unwrap();
    assert_eq!(rt.invoke(obj.object(), "countOfChildren", &[]).unwrap(), Value::Int(1));
    assert_eq!(drain(&rt), pair("children"));
    assert_eq!(bridge.send(&obj, "children", vec![]).unwrap(), objbridge::values!["a"]);
}

#[test]
fn test_redefining_a_subclass_name_fails() {
    let (_rt, bridge) = with_controls();
    let widget = bridge.import_class("Widget").unwrap();
    bridge.define_subclass(&widget, "Panel").unwrap();
    assert_eq!(
        bridge.define_subclass(&widget, "Panel").unwrap_err(),
        Error::ClassAlreadyDefined { name: "Panel".into() }
    );
    assert!(matches!(
        bridge.define_subclass(&widget, "Control"),
        Err(Error::ClassAlreadyDefined { .. })
    ));
}
