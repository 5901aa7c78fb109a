//! Integration tests for declared accessors and change notifications.
//!
//! Notifications are read back from the runtime's log. Every assertion
//! checks the exact sequence, so a stray or doubled pair fails the test.

mod common;

use common::{drain, fresh, make, pair};
use objbridge::adapters::{MapLike, SequenceLike, TextLike};
use objbridge::foreign::{ChangeKind, ForeignRuntime, IndexChange};
use objbridge::runtime::Phase;
use objbridge::{Error, Value, values};

// ============================================================================
// Setters
// ============================================================================

#[test]
fn test_every_notifying_write_is_bracketed_once() {
    let (rt, bridge) = fresh();
    let (class, obj) = make(&bridge, "NSObject");
    bridge.declare_accessor(&class, "title", true).unwrap();
    drain(&rt);

    for i in 0..5 {
        bridge.send(&obj, "title=", vec![Value::Int(i)]).unwrap();
    }
    let log = drain(&rt);
    assert_eq!(log.len(), 10);
    for chunk in log.chunks(2) {
        assert_eq!(chunk, pair("title").as_slice());
    }
    assert_eq!(bridge.send(&obj, "title", vec![]).unwrap(), Value::Int(4));
}

#[test]
fn test_objective_c_style_setter_name() {
    let (rt, bridge) = fresh();
    let (class, obj) = make(&bridge, "NSObject");
    bridge.declare_accessor(&class, "title", true).unwrap();
    drain(&rt);

    bridge.send(&obj, "setTitle", vec![Value::from("x")]).unwrap();
    assert_eq!(drain(&rt), pair("title"));
    assert_eq!(bridge.value_for_key(&obj, "title").unwrap(), Value::from("x"));
}

#[test]
fn test_validator_rejection_leaves_value_and_log_alone() {
    let (rt, bridge) = fresh();
    let (class, obj) = make(&bridge, "NSObject");
    bridge.declare_accessor(&class, "age", true).unwrap();
    bridge
        .set_validator(&class, "age", |inst, value| match value.as_int() {
            Some(n) if n >= 0 => Ok(Value::Int(n)),
            _ => Err(Error::InvalidArgument {
                receiver: inst.class().name().to_string(),
                operation: "age=".to_string(),
                reason: "must be a non-negative integer".to_string(),
            }),
        })
        .unwrap();
    bridge.set_value_for_key(&obj, "age", Value::Int(3)).unwrap();
    drain(&rt);

    assert!(bridge.set_value_for_key(&obj, "age", Value::Int(-1)).is_err());
    assert!(drain(&rt).is_empty());
    assert_eq!(bridge.value_for_key(&obj, "age").unwrap(), Value::Int(3));
}

#[test]
fn test_setter_override_runs_inside_one_pair() {
    let (rt, bridge) = fresh();
    let (class, obj) = make(&bridge, "NSObject");
    bridge.declare_accessor(&class, "name", true).unwrap();
    bridge
        .override_setter(&class, "name", |_, inst, value| {
            let upper = value.as_str().unwrap_or_default().to_uppercase();
            inst.state().set_slot("name", Value::Str(upper));
            Ok(())
        })
        .unwrap();
    drain(&rt);

    bridge.send(&obj, "name=", vec![Value::from("ada")]).unwrap();
    assert_eq!(drain(&rt), pair("name"));
    assert_eq!(bridge.send(&obj, "name", vec![]).unwrap(), Value::from("ADA"));
}

#[test]
fn test_dependent_keys_are_announced_together() {
    let (rt, bridge) = fresh();
    let (class, obj) = make(&bridge, "NSObject");
    bridge.declare_accessor(&class, "first", true).unwrap();
    bridge.declare_accessor(&class, "last", true).unwrap();
    bridge.depends_on(&class, "full_name", &["first", "last"]).unwrap();
    drain(&rt);

    bridge.send(&obj, "last=", vec![Value::from("Lovelace")]).unwrap();
    assert_eq!(
        drain(&rt),
        vec![
            ("last".to_string(), Phase::Will),
            ("full_name".to_string(), Phase::Will),
            ("last".to_string(), Phase::Did),
            ("full_name".to_string(), Phase::Did),
        ]
    );
}

#[test]
fn test_outlet_is_write_only_and_silent() {
    let (rt, bridge) = fresh();
    let (class, obj) = make(&bridge, "NSObject");
    bridge.declare_outlet(&class, "delegate").unwrap();
    drain(&rt);

    bridge.send(&obj, "delegate=", vec![Value::Int(1)]).unwrap();
    assert!(drain(&rt).is_empty());
    assert!(matches!(
        bridge.value_for_key(&obj, "delegate"),
        Err(Error::AccessorNotFound { .. })
    ));
}

// ============================================================================
// Indexed Properties
// ============================================================================

#[test]
fn test_indexed_changes_name_their_index() {
    let (rt, bridge) = fresh();
    let (class, obj) = make(&bridge, "NSObject");
    bridge.declare_array_accessor(&class, "rows").unwrap();
    drain(&rt);

    for (i, row) in ["a", "b", "c"].into_iter().enumerate() {
        bridge
            .send(&obj, "insertObject_inRowsAtIndex", vec![Value::from(row), Value::from(i)])
            .unwrap();
    }
    bridge
        .send(&obj, "removeObjectFromRowsAtIndex", vec![Value::Int(1)])
        .unwrap();

    let wills: Vec<IndexChange> = rt
        .take_notifications()
        .into_iter()
        .filter(|n| n.phase == Phase::Will)
        .filter_map(|n| n.change)
        .collect();
    assert_eq!(
        wills,
        vec![
            IndexChange::at(ChangeKind::Insertion, 0),
            IndexChange::at(ChangeKind::Insertion, 1),
            IndexChange::at(ChangeKind::Insertion, 2),
            IndexChange::at(ChangeKind::Removal, 1),
        ]
    );
    assert_eq!(bridge.send(&obj, "rows", vec![]).unwrap(), values!["a", "c"]);
}

// ============================================================================
// Observed Collections
// ============================================================================

#[test]
fn test_observed_sequence_mutation_sends_one_pair() {
    let (rt, bridge) = fresh();
    let (class, obj) = make(&bridge, "NSObject");
    bridge.declare_accessor(&class, "tags", true).unwrap();
    bridge
        .set_value_for_key(&obj, "tags", Value::Object(rt.new_array(vec![], true)))
        .unwrap();
    drain(&rt);

    bridge
        .mutate_observed_sequence(&obj, "tags", |tags| {
            tags.push([Value::from("a"), Value::from("b")])?;
            tags.unshift(vec![Value::from("z")])?;
            tags.pop()
        })
        .unwrap();
    assert_eq!(drain(&rt), pair("tags"));

    let count = bridge
        .mutate_observed_sequence(&obj, "tags", |tags| tags.count())
        .unwrap();
    assert_eq!(count, 2);
    assert!(drain(&rt).is_empty());
}

#[test]
fn test_observed_map_and_text() {
    let (rt, bridge) = fresh();
    let (class, obj) = make(&bridge, "NSObject");
    bridge.declare_accessor(&class, "meta", true).unwrap();
    bridge.declare_accessor(&class, "note", true).unwrap();
    bridge
        .set_value_for_key(&obj, "meta", Value::Object(rt.new_dictionary(vec![], true)))
        .unwrap();
    bridge
        .set_value_for_key(&obj, "note", Value::Object(rt.new_string("hi", true)))
        .unwrap();
    drain(&rt);

    bridge
        .mutate_observed_map(&obj, "meta", |meta| {
            meta.set(Value::from("k"), Value::Int(1))?;
            meta.set(Value::from("j"), Value::Int(2))
        })
        .unwrap();
    bridge
        .mutate_observed_text(&obj, "note", |note| note.append(" there"))
        .unwrap();

    let mut expected = pair("meta");
    expected.extend(pair("note"));
    assert_eq!(drain(&rt), expected);

    let note = bridge.value_for_key(&obj, "note").unwrap();
    assert_eq!(rt.contents(note.as_object().unwrap()).unwrap(), Value::from("hi there"));
}

#[test]
fn test_observed_failure_on_immutable_text() {
    let (rt, bridge) = fresh();
    let (class, obj) = make(&bridge, "NSObject");
    bridge.declare_accessor(&class, "label", true).unwrap();
    bridge
        .set_value_for_key(&obj, "label", Value::Object(rt.new_string("fixed", false)))
        .unwrap();
    drain(&rt);

    let err = bridge
        .mutate_observed_text(&obj, "label", |label| label.append("!"))
        .unwrap_err();
    assert!(matches!(err, Error::ImmutableReceiver { .. }));
    assert!(drain(&rt).is_empty());
}

// ============================================================================
// Foreign Key-Value Coding
// ============================================================================

#[test]
fn test_foreign_callers_see_host_accessors() {
    let (rt, bridge) = fresh();
    let object = bridge.import_class("NSObject").unwrap();
    let doc = bridge.define_subclass(&object, "Document").unwrap();
    bridge.declare_accessor(&doc, "title", true).unwrap();
    let obj = bridge.alloc_init(&doc, "init", vec![]).unwrap();
    drain(&rt);

    rt.invoke(obj.object(), "setValue:forKey:", &[Value::from("Draft"), Value::from("title")])
        .unwrap();
    assert_eq!(drain(&rt), pair("title"));
    assert_eq!(
        rt.invoke(obj.object(), "valueForKey:", &[Value::from("title")]).unwrap(),
        Value::from("Draft")
    );
    assert_eq!(bridge.send(&obj, "title", vec![]).unwrap(), Value::from("Draft"));
}
