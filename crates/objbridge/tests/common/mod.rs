// Common test utilities for integration tests
//
// This module provides a fresh runtime and bridge per test, plus a small
// foreign class hierarchy (Control < Widget) defined natively in the
// runtime, for tests that need classes the bridge did not create.

#![allow(dead_code)]

use objbridge::error::ForeignResult;
use objbridge::foreign::ForeignRuntime;
use objbridge::runtime::{LocalRuntime, Notification, Phase};
use objbridge::{Bridge, Instance, MirrorClass, ObjectRef, Value};
use std::sync::Arc;

fn control_init(_: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Object(this.clone()))
}

fn control_draw(_: &LocalRuntime, _: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::from("control"))
}

/// Calls `draw` through the foreign dispatcher, so an override published
/// by a host subclass is what runs.
fn control_render(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    let drawn = rt.invoke(this, "draw", &[])?;
    Ok(Value::Str(format!("<{}>", drawn.as_str().unwrap_or("?"))))
}

fn widget_scale(_: &LocalRuntime, _: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Int(args[0].as_int().unwrap_or(0) * 2))
}

/// Creates a runtime with the Foundation classes and a bridge over it.
pub fn fresh() -> (Arc<LocalRuntime>, Bridge) {
    let rt = LocalRuntime::new();
    let bridge = Bridge::new(rt.clone());
    (rt, bridge)
}

/// Creates a runtime with the Control < Widget hierarchy installed.
///
/// Control is a foreign root class: it has no foreign superclass.
pub fn with_controls() -> (Arc<LocalRuntime>, Bridge) {
    let rt = LocalRuntime::new();
    let control = rt.define_class("Control", None).unwrap();
    rt.add_method(control, "init", "@@:", control_init).unwrap();
    rt.add_method(control, "draw", "@@:", control_draw).unwrap();
    rt.add_method(control, "render", "@@:", control_render).unwrap();

    let widget = rt.define_class("Widget", Some(control)).unwrap();
    rt.add_method(widget, "scale:", "q@:q", widget_scale).unwrap();

    let bridge = Bridge::new(rt.clone());
    (rt, bridge)
}

/// Imports `name` and allocates an instance with `init`.
pub fn make(bridge: &Bridge, name: &str) -> (MirrorClass, Instance) {
    let class = bridge.import_class(name).unwrap();
    let inst = bridge.alloc_init(&class, "init", vec![]).unwrap();
    (class, inst)
}

/// A wrapped mutable foreign array of integers.
pub fn int_array(rt: &Arc<LocalRuntime>, bridge: &Bridge, items: &[i64], mutable: bool) -> Instance {
    let items = items.iter().copied().map(Value::Int).collect();
    bridge.wrap(&rt.new_array(items, mutable)).unwrap()
}

/// A wrapped foreign array of host strings.
pub fn str_array(rt: &Arc<LocalRuntime>, bridge: &Bridge, items: &[&str], mutable: bool) -> Instance {
    let items = items.iter().map(|s| Value::from(*s)).collect();
    bridge.wrap(&rt.new_array(items, mutable)).unwrap()
}

/// Drains the notification log as (key, phase) pairs.
pub fn drain(rt: &LocalRuntime) -> Vec<(String, Phase)> {
    rt.take_notifications()
        .into_iter()
        .map(|n: Notification| (n.key, n.phase))
        .collect()
}

/// The (key, phase) pairs of one will/did bracket around `key`.
pub fn pair(key: &str) -> Vec<(String, Phase)> {
    vec![(key.to_string(), Phase::Will), (key.to_string(), Phase::Did)]
}
