//! Integration tests for name resolution, framework loading and the
//! process-wide bridge.

use objbridge::runtime::{LocalRuntime, MemoryBundles, MemorySignatures};
use objbridge::{Bridge, BridgeConfig, Error, Namespace, Resolved, Value};
use std::sync::Arc;

fn app_bridge() -> (Arc<MemorySignatures>, Bridge) {
    let sigs = Arc::new(
        MemorySignatures::new()
            .with_bundle("/Frameworks/Foundation", [("NSNotFound", Value::Int(i64::MAX))])
            .with_bundle("/Frameworks/AppKit", [("NSOKButton", Value::Int(1))]),
    );
    let bundles = Arc::new(
        MemoryBundles::new()
            .with_framework("Foundation", "/Frameworks/Foundation")
            .with_framework("AppKit", "/Frameworks/AppKit"),
    );
    let bridge = Bridge::builder(LocalRuntime::new())
        .config(BridgeConfig::default().with_preload(["Foundation"]))
        .signatures(sigs.clone())
        .bundles(bundles)
        .build();
    (sigs, bridge)
}

// ============================================================================
// Frameworks
// ============================================================================

#[test]
fn test_constants_appear_after_require() {
    let (_sigs, bridge) = app_bridge();

    assert_eq!(
        bridge.resolve("NSNotFound").unwrap(),
        Resolved::Constant(Value::Int(i64::MAX))
    );
    assert!(matches!(bridge.resolve("NSOKButton"), Err(Error::NameNotFound { .. })));

    assert!(bridge.require_framework("AppKit").unwrap());
    assert_eq!(bridge.resolve("NSOKButton").unwrap().as_constant(), Some(&Value::Int(1)));
    assert!(!bridge.require_framework("AppKit").unwrap());
}

#[test]
fn test_missing_framework() {
    let (_sigs, bridge) = app_bridge();
    assert_eq!(
        bridge.require_framework("WebKit").unwrap_err(),
        Error::FrameworkNotFound { name: "WebKit".into() }
    );
    assert!(!bridge.framework_loaded("WebKit"));
}

// ============================================================================
// Namespaces
// ============================================================================

#[test]
fn test_namespace_falls_back_to_bridge_then_previous() {
    let (_sigs, bridge) = app_bridge();
    let ns = Namespace::new("App", bridge.clone()).with_previous(|name| match name {
        "Version" => Ok(Resolved::Constant(Value::from("2.1"))),
        _ => Err(Error::NameNotFound { name: name.to_string() }),
    });
    ns.define("MaxItems", Resolved::Constant(Value::Int(100)));

    assert_eq!(ns.lookup("MaxItems").unwrap(), Resolved::Constant(Value::Int(100)));
    assert_eq!(ns.lookup("Version").unwrap(), Resolved::Constant(Value::from("2.1")));
    assert_eq!(ns.class("NSArray").unwrap(), bridge.import_class("NSArray").unwrap());
    assert!(matches!(ns.lookup("Nothing"), Err(Error::NameNotFound { .. })));
}

#[test]
fn test_namespace_shadows_foreign_names() {
    let (_sigs, bridge) = app_bridge();
    let ns = Namespace::new("App", bridge.clone());
    let object = bridge.import_class("NSObject").unwrap();
    let doc = bridge.define_subclass(&object, "Document").unwrap();
    ns.define("NSNotFound", Resolved::Class(doc.clone()));

    assert_eq!(ns.class("NSNotFound").unwrap(), doc);
    assert_eq!(ns.class("Document").unwrap(), doc);
    assert!(ns.defines("NSNotFound"));
    assert!(!ns.defines("Document"));
}

// ============================================================================
// Process-wide Bridge
// ============================================================================

#[test]
fn test_install_once() {
    let (_sigs, bridge) = app_bridge();
    assert!(objbridge::bridge().is_none());

    let first = objbridge::install(bridge.clone());
    let second = objbridge::install(bridge.clone());
    assert!(first.is_ok());
    assert_eq!(second.unwrap_err(), Error::AlreadyInstalled);
    assert!(objbridge::bridge().unwrap().ptr_eq(&bridge));
}
