//! Concurrency tests for the bridge.
//!
//! These tests validate behaviour when many threads share one bridge:
//! - Concurrent first imports of the same name
//! - Concurrent subclass definitions
//! - Concurrent adapter use on one foreign object
//!
//! Run with: `cargo test --test concurrency_test -- --nocapture`

mod common;

use common::{fresh, int_array, with_controls};
use objbridge::{MirrorClass, Value};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;

// ============================================================================
// Imports
// ============================================================================

#[test]
fn test_concurrent_imports_share_one_mirror() {
    let (_rt, bridge) = with_controls();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let bridge = bridge.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                bridge.import_class("Widget").unwrap()
            })
        })
        .collect();
    let mirrors: Vec<MirrorClass> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for mirror in &mirrors[1..] {
        assert_eq!(mirror, &mirrors[0]);
    }
    // Every thread sees the same superclass mirror as well.
    assert_eq!(mirrors[0].superclass(), bridge.mirror("Control").as_ref());
}

#[test]
fn test_concurrent_imports_of_different_names() {
    let (_rt, bridge) = fresh();
    let names = ["NSString", "NSMutableString", "NSArray", "NSMutableArray", "NSDictionary", "NSMutableDictionary"];

    let handles: Vec<_> = names
        .iter()
        .map(|name| {
            let bridge = bridge.clone();
            let name = name.to_string();
            thread::spawn(move || bridge.import_class(&name).unwrap())
        })
        .collect();
    for handle in handles {
        let mirror = handle.join().unwrap();
        assert_eq!(bridge.mirror(mirror.name()), Some(mirror.clone()));
    }
    let object = bridge.mirror("NSObject").unwrap();
    for name in names {
        assert!(bridge.mirror(name).unwrap().is_subclass_of(&object));
    }
}

// ============================================================================
// Subclassing
// ============================================================================

#[test]
fn test_racing_subclass_definitions_register_once() {
    let (_rt, bridge) = with_controls();
    let widget = bridge.import_class("Widget").unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let bridge = bridge.clone();
            let widget = widget.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                bridge.define_subclass(&widget, "Contested").is_ok()
            })
        })
        .collect();
    let wins = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
    assert_eq!(wins, 1);
    assert!(bridge.mirror("Contested").unwrap().is_derived());
}

// ============================================================================
// Adapters
// ============================================================================

#[test]
fn test_concurrent_pushes_are_all_kept() {
    let (rt, bridge) = fresh();
    let list = int_array(&rt, &bridge, &[], true);
    let per_thread = 50;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let bridge = bridge.clone();
            let list = list.clone();
            thread::spawn(move || {
                for i in 0..per_thread {
                    bridge
                        .send(&list, "push", vec![Value::Int((t * per_thread + i) as i64)])
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        bridge.send(&list, "count", vec![]).unwrap(),
        Value::from(THREADS * per_thread)
    );
    let sorted = bridge.send(&list, "sort", vec![]).unwrap();
    let expected: Vec<Value> = (0..(THREADS * per_thread) as i64).map(Value::Int).collect();
    assert_eq!(sorted, Value::Array(expected));
}
