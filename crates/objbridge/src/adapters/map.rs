//! Associative-map behaviour over foreign dictionaries.

use super::{Family, Observer, SequenceLike, block_truthy, int_result, touch, wrong_type};
use crate::bridge::Bridge;
use crate::bridge::forward::Call;
use crate::bridge::instance::DefaultProc;
use crate::error::{Error, Result};
use crate::value::{ObjectRef, Value};
use std::fmt;
use std::sync::Arc;

/// Host map behaviour over lookup, store, remove and key listing.
pub trait MapLike {
    // ------------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------------

    fn receiver(&self) -> String;
    fn count(&self) -> Result<usize>;
    /// The stored value, `None` if the key is absent.
    fn lookup(&self, key: &Value) -> Result<Option<Value>>;
    fn store(&self, key: Value, value: Value) -> Result<()>;
    fn remove(&self, key: &Value) -> Result<()>;
    fn keys(&self) -> Result<Vec<Value>>;
    fn remove_all(&self) -> Result<()>;
    fn replace_pairs(&self, pairs: Vec<(Value, Value)>) -> Result<()>;
    fn same(&self, a: &Value, b: &Value) -> Result<bool>;
    /// The pairs of `value` if it is a map of the same family.
    fn pairs_in(&self, value: &Value) -> Result<Option<Vec<(Value, Value)>>>;
    fn default_value(&self) -> Option<Value>;
    fn set_default_value(&self, value: Option<Value>);
    fn default_proc(&self) -> Option<DefaultProc>;
    fn set_default_proc(&self, proc_: Option<DefaultProc>);
    fn to_value(&self) -> Value;

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    fn len(&self) -> Result<usize> {
        self.count()
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }

    /// `self[key]`. A missing key yields the computed default if one is
    /// set, else the constant default, else `Value::Nil`.
    fn get(&self, key: &Value) -> Result<Value> {
        match self.lookup(key)? {
            Some(value) => Ok(value),
            None => self.default_for(key),
        }
    }

    /// The default a missing `key` would produce.
    fn default_for(&self, key: &Value) -> Result<Value> {
        match self.default_proc() {
            Some(proc_) => proc_(&self.to_value(), key),
            None => Ok(self.default_value().unwrap_or_default()),
        }
    }

    /// Like [`get`](Self::get) but ignores defaults.
    ///
    /// # Errors
    ///
    /// [`Error::KeyNotFound`] for a missing key.
    fn fetch(&self, key: &Value) -> Result<Value> {
        self.lookup(key)?.ok_or_else(|| Error::KeyNotFound {
            receiver: self.receiver(),
            key: key.to_string(),
        })
    }

    fn fetch_or(&self, key: &Value, default: Value) -> Result<Value> {
        Ok(self.lookup(key)?.unwrap_or(default))
    }

    fn fetch_or_else(&self, key: &Value, fallback: impl FnOnce(&Value) -> Result<Value>) -> Result<Value> {
        match self.lookup(key)? {
            Some(value) => Ok(value),
            None => fallback(key),
        }
    }

    fn values(&self) -> Result<Vec<Value>> {
        Ok(self.pairs()?.into_iter().map(|(_, v)| v).collect())
    }

    /// Key/value pairs in the foreign key order.
    fn pairs(&self) -> Result<Vec<(Value, Value)>> {
        let mut pairs = Vec::new();
        for key in self.keys()? {
            let value = self.lookup(&key)?.unwrap_or_default();
            pairs.push((key, value));
        }
        Ok(pairs)
    }

    fn has_key(&self, key: &Value) -> Result<bool> {
        Ok(self.lookup(key)?.is_some())
    }

    fn has_value(&self, value: &Value) -> Result<bool> {
        Ok(self.key_for(value)?.is_some())
    }

    /// The first key mapped to `value`.
    fn key_for(&self, value: &Value) -> Result<Option<Value>> {
        for (k, v) in self.pairs()? {
            if self.same(&v, value)? {
                return Ok(Some(k));
            }
        }
        Ok(None)
    }

    /// Values mapped back to their keys. Later pairs win on duplicate values.
    fn invert(&self) -> Result<Vec<(Value, Value)>> {
        let mut out: Vec<(Value, Value)> = Vec::new();
        for (k, v) in self.pairs()? {
            let mut existing = None;
            for (i, (seen, _)) in out.iter().enumerate() {
                if self.same(seen, &v)? {
                    existing = Some(i);
                    break;
                }
            }
            match existing {
                Some(i) => out[i].1 = k,
                None => out.push((v, k)),
            }
        }
        Ok(out)
    }

    fn select(&self, mut pred: impl FnMut(&Value, &Value) -> Result<bool>) -> Result<Vec<(Value, Value)>> {
        let mut out = Vec::new();
        for (k, v) in self.pairs()? {
            if pred(&k, &v)? {
                out.push((k, v));
            }
        }
        Ok(out)
    }

    fn reject(&self, mut pred: impl FnMut(&Value, &Value) -> Result<bool>) -> Result<Vec<(Value, Value)>> {
        self.select(|k, v| Ok(!pred(k, v)?))
    }

    /// Pairs of this map overlaid with `other`.
    fn merge(&self, other: &[(Value, Value)]) -> Result<Vec<(Value, Value)>> {
        merge_pairs(self, self.pairs()?, other)
    }

    fn each(&self, mut f: impl FnMut(&Value, &Value) -> Result<()>) -> Result<()> {
        for (k, v) in self.pairs()? {
            f(&k, &v)?;
        }
        Ok(())
    }

    /// Same keys mapped to foreign-equal values.
    fn eq_pairs(&self, other: &[(Value, Value)]) -> Result<bool> {
        if self.count()? != other.len() {
            return Ok(false);
        }
        for (k, v) in other {
            match self.lookup(k)? {
                Some(mine) if self.same(&mine, v)? => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// `self[key] = value`.
    fn set(&self, key: Value, value: Value) -> Result<()> {
        self.store(key, value)
    }

    /// Removes a key and returns its value.
    fn delete(&self, key: &Value) -> Result<Option<Value>> {
        let Some(value) = self.lookup(key)? else {
            return Ok(None);
        };
        self.remove(key)?;
        Ok(Some(value))
    }

    fn delete_or_else(&self, key: &Value, fallback: impl FnOnce(&Value) -> Result<Value>) -> Result<Value> {
        match self.delete(key)? {
            Some(value) => Ok(value),
            None => fallback(key),
        }
    }

    /// Removes every pair matching `pred`; `true` if anything was removed.
    fn delete_if(&self, mut pred: impl FnMut(&Value, &Value) -> Result<bool>) -> Result<bool> {
        let mut removed = false;
        for (k, v) in self.pairs()? {
            if pred(&k, &v)? {
                self.remove(&k)?;
                removed = true;
            }
        }
        Ok(removed)
    }

    fn keep_if(&self, mut pred: impl FnMut(&Value, &Value) -> Result<bool>) -> Result<bool> {
        self.delete_if(|k, v| Ok(!pred(k, v)?))
    }

    /// Stores every pair of `other`.
    fn update(&self, other: &[(Value, Value)]) -> Result<()> {
        for (k, v) in other {
            self.store(k.clone(), v.clone())?;
        }
        Ok(())
    }

    fn replace(&self, pairs: Vec<(Value, Value)>) -> Result<()> {
        self.replace_pairs(pairs)
    }

    fn clear(&self) -> Result<()> {
        if self.count()? == 0 {
            return Ok(());
        }
        self.remove_all()
    }
}

// ============================================================================
// Foreign dictionaries
// ============================================================================

/// [`MapLike`] over an `NSDictionary`-family object.
///
/// Defaults live in the object's host companion, so every view of the same
/// dictionary sees them.
pub struct DictionaryAdapter<'b> {
    bridge: &'b Bridge,
    object: ObjectRef,
    observer: Option<Observer>,
}

impl fmt::Debug for DictionaryAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictionaryAdapter")
            .field("object", &self.object)
            .field("observer", &self.observer)
            .finish()
    }
}

impl<'b> DictionaryAdapter<'b> {
    pub(crate) fn new(bridge: &'b Bridge, object: ObjectRef) -> Self {
        DictionaryAdapter {
            bridge,
            object,
            observer: None,
        }
    }

    pub(crate) fn observed(bridge: &'b Bridge, object: ObjectRef, observer: Observer) -> Self {
        DictionaryAdapter {
            bridge,
            object,
            observer: Some(observer),
        }
    }

    pub(crate) fn observer(&self) -> Option<&Observer> {
        self.observer.as_ref()
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    fn send(&self, selector: &str, args: &[Value]) -> Result<Value> {
        self.bridge.invoke(&self.object, selector, args)
    }

    fn mutate(&self, selector: &str, args: &[Value]) -> Result<()> {
        touch(self.bridge, self.observer.as_ref());
        self.send(selector, args).map(drop)
    }
}

impl MapLike for DictionaryAdapter<'_> {
    fn receiver(&self) -> String {
        self.bridge.class_name_of(&self.object)
    }

    fn count(&self) -> Result<usize> {
        let n = int_result(&self.receiver(), "count", self.send("count", &[])?)?;
        Ok(n.max(0) as usize)
    }

    fn lookup(&self, key: &Value) -> Result<Option<Value>> {
        match self.send("objectForKey:", std::slice::from_ref(key))? {
            Value::Nil => Ok(None),
            value => Ok(Some(value)),
        }
    }

    fn store(&self, key: Value, value: Value) -> Result<()> {
        self.mutate("setObject:forKey:", &[value, key])
    }

    fn remove(&self, key: &Value) -> Result<()> {
        self.mutate("removeObjectForKey:", std::slice::from_ref(key))
    }

    fn keys(&self) -> Result<Vec<Value>> {
        match self.send("allKeys", &[])? {
            Value::Array(keys) => Ok(keys),
            Value::Object(list) => super::ArrayAdapter::new(self.bridge, list).to_vec(),
            Value::Nil => Ok(Vec::new()),
            other => Err(Error::InvalidArgument {
                receiver: self.receiver(),
                operation: "allKeys".to_string(),
                reason: format!("expected an array result, got {}", other.type_name()),
            }),
        }
    }

    fn remove_all(&self) -> Result<()> {
        self.mutate("removeAllObjects", &[])
    }

    fn replace_pairs(&self, pairs: Vec<(Value, Value)>) -> Result<()> {
        self.mutate("setDictionary:", &[Value::Map(pairs)])
    }

    fn same(&self, a: &Value, b: &Value) -> Result<bool> {
        self.bridge.values_equal(a, b)
    }

    fn pairs_in(&self, value: &Value) -> Result<Option<Vec<(Value, Value)>>> {
        match value {
            Value::Map(pairs) => Ok(Some(pairs.clone())),
            Value::Object(object) if self.bridge.family_of(object)? == Some(Family::Map) => {
                DictionaryAdapter::new(self.bridge, object.clone()).pairs().map(Some)
            }
            _ => Ok(None),
        }
    }

    fn default_value(&self) -> Option<Value> {
        self.bridge.companion(self.object.id()).default_value()
    }

    fn set_default_value(&self, value: Option<Value>) {
        self.bridge.companion(self.object.id()).set_default_value(value);
    }

    fn default_proc(&self) -> Option<DefaultProc> {
        self.bridge.companion(self.object.id()).default_proc()
    }

    fn set_default_proc(&self, proc_: Option<DefaultProc>) {
        self.bridge.companion(self.object.id()).set_default_proc(proc_);
    }

    fn to_value(&self) -> Value {
        Value::Object(self.object.clone())
    }
}

// ============================================================================
// Dynamic dispatch
// ============================================================================

/// Host names answered by [`dispatch`].
pub const CONTRACT: &[&str] = &[
    "[]", "[]=", "store", "fetch", "key?", "has_key?", "include?", "member?", "value?",
    "has_value?", "key", "keys", "values", "values_at", "to_a", "to_h", "delete", "delete_if",
    "reject!", "reject", "select", "filter", "keep_if", "select!", "each", "each_pair",
    "each_key", "each_value", "merge", "merge!", "update", "replace", "clear", "invert", "size",
    "length", "empty?", "==", "default", "default=", "default_proc=",
];

fn map_value(pairs: Vec<(Value, Value)>) -> Value {
    Value::Map(pairs)
}

fn pairs_arg<M: MapLike + ?Sized>(map: &M, value: &Value) -> Result<Vec<(Value, Value)>> {
    map.pairs_in(value)?
        .ok_or_else(|| wrong_type(&map.receiver(), "map", value))
}

/// Runs one contract call against a map.
pub fn dispatch<M: MapLike>(map: &M, call: &Call) -> Result<Value> {
    let receiver = map.receiver();
    let args = call.args.as_slice();
    let this = || map.to_value();
    let pair_block = |k: &Value, v: &Value| block_truthy(call, &receiver, &[k.clone(), v.clone()]);

    match call.name.as_str() {
        "[]" => {
            call.expect_args(&receiver, 1, 1)?;
            map.get(&args[0])
        }
        "[]=" | "store" => {
            call.expect_args(&receiver, 2, 2)?;
            map.set(args[0].clone(), args[1].clone())?;
            Ok(args[1].clone())
        }
        "fetch" => {
            call.expect_args(&receiver, 1, 2)?;
            if let Some(default) = args.get(1) {
                map.fetch_or(&args[0], default.clone())
            } else if let Some(block) = &call.block {
                map.fetch_or_else(&args[0], |k| block(std::slice::from_ref(k)))
            } else {
                map.fetch(&args[0])
            }
        }
        "key?" | "has_key?" | "include?" | "member?" => {
            call.expect_args(&receiver, 1, 1)?;
            Ok(Value::Bool(map.has_key(&args[0])?))
        }
        "value?" | "has_value?" => {
            call.expect_args(&receiver, 1, 1)?;
            Ok(Value::Bool(map.has_value(&args[0])?))
        }
        "key" => {
            call.expect_args(&receiver, 1, 1)?;
            Ok(map.key_for(&args[0])?.unwrap_or_default())
        }
        "keys" => Ok(Value::Array(map.keys()?)),
        "values" => Ok(Value::Array(map.values()?)),
        "values_at" => {
            let mut out = Vec::with_capacity(args.len());
            for key in args {
                out.push(map.get(key)?);
            }
            Ok(Value::Array(out))
        }
        "to_a" => Ok(Value::Array(
            map.pairs()?
                .into_iter()
                .map(|(k, v)| Value::Array(vec![k, v]))
                .collect(),
        )),
        "to_h" => Ok(map_value(map.pairs()?)),
        "delete" => {
            call.expect_args(&receiver, 1, 1)?;
            match &call.block {
                Some(block) => map.delete_or_else(&args[0], |k| block(std::slice::from_ref(k))),
                None => Ok(map.delete(&args[0])?.unwrap_or_default()),
            }
        }
        "delete_if" | "reject!" => {
            call.require_block(&receiver)?;
            Ok(if map.delete_if(pair_block)? { this() } else { Value::Nil })
        }
        "keep_if" => {
            call.require_block(&receiver)?;
            map.keep_if(pair_block)?;
            Ok(this())
        }
        "select!" => {
            call.require_block(&receiver)?;
            Ok(if map.keep_if(pair_block)? { this() } else { Value::Nil })
        }
        "reject" => Ok(map_value(map.reject(pair_block)?)),
        "select" | "filter" => Ok(map_value(map.select(pair_block)?)),
        "each" | "each_pair" => {
            let block = call.require_block(&receiver)?;
            map.each(|k, v| block(&[k.clone(), v.clone()]).map(drop))?;
            Ok(this())
        }
        "each_key" => {
            let block = call.require_block(&receiver)?;
            map.each(|k, _| block(std::slice::from_ref(k)).map(drop))?;
            Ok(this())
        }
        "each_value" => {
            let block = call.require_block(&receiver)?;
            map.each(|_, v| block(std::slice::from_ref(v)).map(drop))?;
            Ok(this())
        }
        "merge" => {
            let mut merged = map.pairs()?;
            for arg in args {
                let overlay = pairs_arg(map, arg)?;
                merged = merge_pairs(map, merged, &overlay)?;
            }
            Ok(map_value(merged))
        }
        "merge!" | "update" => {
            for arg in args {
                map.update(&pairs_arg(map, arg)?)?;
            }
            Ok(this())
        }
        "replace" => {
            call.expect_args(&receiver, 1, 1)?;
            map.replace(pairs_arg(map, &args[0])?)?;
            Ok(this())
        }
        "clear" => {
            map.clear()?;
            Ok(this())
        }
        "invert" => Ok(map_value(map.invert()?)),
        "size" | "length" => Ok(Value::from(map.len()?)),
        "empty?" => Ok(Value::Bool(map.is_empty()?)),
        "==" => {
            call.expect_args(&receiver, 1, 1)?;
            match map.pairs_in(&args[0])? {
                Some(pairs) => Ok(Value::Bool(map.eq_pairs(&pairs)?)),
                None => Ok(Value::Bool(false)),
            }
        }
        "default" => match args.first() {
            Some(key) if map.default_proc().is_some() => map.default_for(key),
            _ => Ok(map.default_value().unwrap_or_default()),
        },
        "default=" => {
            call.expect_args(&receiver, 1, 1)?;
            let value = match &args[0] {
                Value::Nil => None,
                other => Some(other.clone()),
            };
            map.set_default_value(value);
            Ok(args[0].clone())
        }
        "default_proc=" => {
            call.expect_args(&receiver, 0, 1)?;
            let proc_: Option<DefaultProc> = match (&call.block, args.first()) {
                (Some(block), _) => {
                    let block = Arc::clone(block);
                    let proc_: DefaultProc =
                        Arc::new(move |container: &Value, key: &Value| block(&[container.clone(), key.clone()]));
                    Some(proc_)
                }
                (None, None | Some(Value::Nil)) => None,
                (None, Some(other)) => return Err(wrong_type(&receiver, "block", other)),
            };
            map.set_default_proc(proc_);
            Ok(Value::Nil)
        }
        other => Err(Error::NoMethod {
            class: receiver,
            name: other.to_string(),
            tried: vec!["collection adapter"],
        }),
    }
}

fn merge_pairs<M: MapLike + ?Sized>(
    map: &M,
    mut base: Vec<(Value, Value)>,
    overlay: &[(Value, Value)],
) -> Result<Vec<(Value, Value)>> {
    for (k, v) in overlay {
        let mut replaced = false;
        for pair in base.iter_mut() {
            if map.same(&pair.0, k)? {
                pair.1 = v.clone();
                replaced = true;
                break;
            }
        }
        if !replaced {
            base.push((k.clone(), v.clone()));
        }
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::LocalRuntime;
    use crate::values;

    fn pairs(items: &[(&str, i64)]) -> Vec<(Value, Value)> {
        items.iter().map(|&(k, v)| (Value::from(k), Value::Int(v))).collect()
    }

    #[test]
    fn test_defaults_computed_wins() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let map = DictionaryAdapter::new(&bridge, rt.new_dictionary(pairs(&[("a", 1)]), true));
        let missing = Value::from("zz");

        assert_eq!(map.get(&missing).unwrap(), Value::Nil);
        map.set_default_value(Some(Value::Int(99)));
        assert_eq!(map.get(&missing).unwrap(), Value::Int(99));

        let proc_: DefaultProc = Arc::new(|_: &Value, key: &Value| Ok(Value::Str(format!("<{key}>"))));
        map.set_default_proc(Some(proc_));
        assert_eq!(map.get(&missing).unwrap(), Value::from("<zz>"));
        assert_eq!(map.get(&Value::from("a")).unwrap(), Value::Int(1));
        // Defaults are read-only lookups.
        assert_eq!(map.count().unwrap(), 1);
    }

    #[test]
    fn test_defaults_are_shared_between_views() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let obj = rt.new_dictionary(Vec::new(), true);
        DictionaryAdapter::new(&bridge, obj.clone()).set_default_value(Some(Value::Int(5)));
        assert_eq!(DictionaryAdapter::new(&bridge, obj).get(&Value::from("x")).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_fetch_ignores_defaults() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let map = DictionaryAdapter::new(&bridge, rt.new_dictionary(Vec::new(), true));
        map.set_default_value(Some(Value::Int(99)));
        assert_eq!(
            map.fetch(&Value::from("k")).unwrap_err(),
            Error::KeyNotFound {
                receiver: "NSMutableDictionary".into(),
                key: "k".into()
            }
        );
        assert_eq!(map.fetch_or(&Value::from("k"), Value::Int(0)).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_key_lookup_uses_foreign_equality() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let map = DictionaryAdapter::new(&bridge, rt.new_dictionary(pairs(&[("a", 1), ("b", 2)]), true));
        let key = Value::Object(rt.new_string("a", false));
        assert!(map.has_key(&key).unwrap());
        assert_eq!(map.key_for(&Value::Int(2)).unwrap(), Some(Value::from("b")));
        assert_eq!(map.delete(&key).unwrap(), Some(Value::Int(1)));
        assert_eq!(map.keys().unwrap(), vec![Value::from("b")]);
    }

    #[test]
    fn test_invert_and_reject() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let map = DictionaryAdapter::new(&bridge, rt.new_dictionary(pairs(&[("a", 1), ("b", 2), ("c", 1)]), false));
        assert_eq!(
            map.invert().unwrap(),
            vec![(Value::Int(1), Value::from("c")), (Value::Int(2), Value::from("b"))]
        );
        let kept = map.reject(|_, v| Ok(v.as_int() == Some(1))).unwrap();
        assert_eq!(kept, pairs(&[("b", 2)]));
    }

    #[test]
    fn test_immutable_dictionary_rejects_store() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let map = DictionaryAdapter::new(&bridge, rt.new_dictionary(pairs(&[("a", 1)]), false));
        let err = map.set(Value::from("b"), Value::Int(2)).unwrap_err();
        assert!(matches!(
            err.foreign_source(),
            Some(crate::error::ForeignError::Immutable { .. })
        ));
        assert_eq!(map.count().unwrap(), 1);
    }

    #[test]
    fn test_dispatch_default_and_delete_if() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let obj = rt.new_dictionary(pairs(&[("a", 1), ("b", 2)]), true);
        let map = DictionaryAdapter::new(&bridge, obj.clone());

        dispatch(&map, &Call::new("default=", vec![Value::Int(0)])).unwrap();
        let with_proc = Call::new("default_proc=", vec![]).with_block(|args| Ok(args[1].clone()));
        dispatch(&map, &with_proc).unwrap();
        assert_eq!(dispatch(&map, &Call::new("[]", vec!["q".into()])).unwrap(), Value::from("q"));

        let odd = Call::new("delete_if", vec![]).with_block(|args| Ok(Value::Bool(args[1].as_int() == Some(1))));
        assert_eq!(dispatch(&map, &odd).unwrap(), Value::Object(obj));
        assert_eq!(dispatch(&map, &Call::new("keys", vec![])).unwrap(), values!["b"]);
        assert_eq!(dispatch(&map, &Call::new("size", vec![])).unwrap(), Value::Int(1));

        let none = Call::new("delete_if", vec![]).with_block(|_| Ok(Value::Bool(false)));
        assert_eq!(dispatch(&map, &none).unwrap(), Value::Nil);
        assert_eq!(dispatch(&map, &Call::new("size", vec![])).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_dispatch_merge_keeps_receiver() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let map = DictionaryAdapter::new(&bridge, rt.new_dictionary(pairs(&[("a", 1)]), true));
        let merged = dispatch(&map, &Call::new("merge", vec![Value::Map(pairs(&[("a", 3), ("b", 2)]))])).unwrap();
        assert_eq!(merged, Value::Map(pairs(&[("a", 3), ("b", 2)])));
        assert_eq!(map.pairs().unwrap(), pairs(&[("a", 1)]));
    }
}
