//! `NSObject` and the Foundation collection classes.
//!
//! Immutable and mutable variants share one implementation; mutators check
//! the receiver's class and fail with [`ForeignError::Immutable`] on an
//! immutable instance, the way class clusters behave.

use super::object::Payload;
use super::{FoundationNames, LocalRuntime};
use crate::error::{ForeignError, ForeignResult};
use crate::foreign::{ClassHandle, ForeignRuntime};
use crate::selector::setter_selector;
use crate::value::{ObjectRef, Value};

/// `NSNotFound`.
pub const NOT_FOUND: i64 = i64::MAX;

pub(super) fn install(rt: &LocalRuntime) {
    let names = FoundationNames {
        root: "NSObject".to_string(),
        text: "NSString".to_string(),
        mutable_text: "NSMutableString".to_string(),
        array: "NSArray".to_string(),
        mutable_array: "NSMutableArray".to_string(),
        dictionary: "NSDictionary".to_string(),
        mutable_dictionary: "NSMutableDictionary".to_string(),
    };
    if let Err(e) = install_classes(rt, &names) {
        objbridge_log::error!("failed to install Foundation classes: {e}");
        return;
    }
    let _ = rt.foundation.set(names);
}

fn install_classes(rt: &LocalRuntime, names: &FoundationNames) -> ForeignResult<()> {
    let root = rt.define_class(&names.root, None)?;
    rt.add_method(root, "init", "@@:", init)?;
    rt.add_method(root, "isEqual:", "B@:@", is_equal)?;
    rt.add_method(root, "hash", "Q@:", hash)?;
    rt.add_method(root, "description", "@@:", describe)?;
    rt.add_method(root, "className", "@@:", class_name)?;
    rt.add_method(root, "respondsToSelector:", "B@:@", responds_to_selector)?;
    rt.add_method(root, "isKindOfClass:", "B@:@", is_kind_of_class)?;
    rt.add_method(root, "retainCount", "Q@:", retain_count)?;
    rt.add_method(root, "valueForKey:", "@@:@", value_for_key)?;
    rt.add_method(root, "setValue:forKey:", "v@:@@", set_value_for_key)?;
    rt.add_method(root, "valueForUndefinedKey:", "@@:@", value_for_undefined_key)?;
    rt.add_method(root, "setValue:forUndefinedKey:", "v@:@@", set_value_for_undefined_key)?;
    rt.add_method(root, "willChangeValueForKey:", "v@:@", will_change_value)?;
    rt.add_method(root, "didChangeValueForKey:", "v@:@", did_change_value)?;

    let text = rt.define_class(&names.text, Some(root))?;
    rt.define_class(&names.mutable_text, Some(text))?;
    rt.add_method(text, "length", "Q@:", text_length)?;
    rt.add_method(text, "UTF8String", "*@:", text_utf8)?;
    rt.add_method(text, "description", "@@:", text_utf8)?;
    rt.add_method(text, "isEqualToString:", "B@:@", is_equal)?;
    rt.add_method(text, "stringByAppendingString:", "@@:@", text_appending)?;
    rt.add_method(text, "setString:", "v@:@", text_set)?;
    rt.add_method(text, "appendString:", "v@:@", text_append)?;
    rt.add_method(text, "copy", "@@:", text_copy)?;
    rt.add_method(text, "mutableCopy", "@@:", text_mutable_copy)?;
    rt.add_class_method(text, "string", "@@:", text_new_empty)?;
    rt.add_class_method(text, "stringWithString:", "@@:@", text_new)?;

    let array = rt.define_class(&names.array, Some(root))?;
    rt.define_class(&names.mutable_array, Some(array))?;
    rt.add_method(array, "count", "Q@:", array_count)?;
    rt.add_method(array, "objectAtIndex:", "@@:Q", array_object_at)?;
    rt.add_method(array, "lastObject", "@@:", array_last)?;
    rt.add_method(array, "containsObject:", "B@:@", array_contains)?;
    rt.add_method(array, "indexOfObject:", "q@:@", array_index_of)?;
    rt.add_method(array, "isEqualToArray:", "B@:@", is_equal)?;
    rt.add_method(array, "description", "@@:", array_describe)?;
    rt.add_method(array, "copy", "@@:", array_copy)?;
    rt.add_method(array, "mutableCopy", "@@:", array_mutable_copy)?;
    rt.add_method(array, "addObject:", "v@:@", array_add)?;
    rt.add_method(array, "insertObject:atIndex:", "v@:@Q", array_insert)?;
    rt.add_method(array, "removeObjectAtIndex:", "v@:Q", array_remove_at)?;
    rt.add_method(array, "replaceObjectAtIndex:withObject:", "v@:Q@", array_replace_at)?;
    rt.add_method(array, "removeAllObjects", "v@:", array_clear)?;
    rt.add_method(array, "removeLastObject", "v@:", array_remove_last)?;
    rt.add_method(array, "setArray:", "v@:@", array_set)?;
    rt.add_method(array, "addObjectsFromArray:", "v@:@", array_add_all)?;
    rt.add_class_method(array, "array", "@@:", array_new_empty)?;
    rt.add_class_method(array, "arrayWithArray:", "@@:@", array_new)?;

    let dict = rt.define_class(&names.dictionary, Some(root))?;
    rt.define_class(&names.mutable_dictionary, Some(dict))?;
    rt.add_method(dict, "count", "Q@:", dict_count)?;
    rt.add_method(dict, "objectForKey:", "@@:@", dict_object_for_key)?;
    rt.add_method(dict, "allKeys", "@@:", dict_keys)?;
    rt.add_method(dict, "allValues", "@@:", dict_values)?;
    rt.add_method(dict, "isEqualToDictionary:", "B@:@", is_equal)?;
    rt.add_method(dict, "copy", "@@:", dict_copy)?;
    rt.add_method(dict, "mutableCopy", "@@:", dict_mutable_copy)?;
    rt.add_method(dict, "setObject:forKey:", "v@:@@", dict_set)?;
    rt.add_method(dict, "removeObjectForKey:", "v@:@", dict_remove)?;
    rt.add_method(dict, "removeAllObjects", "v@:", dict_clear)?;
    rt.add_method(dict, "setDictionary:", "v@:@", dict_set_all)?;
    rt.add_class_method(dict, "dictionary", "@@:", dict_new_empty)?;
    rt.add_class_method(dict, "dictionaryWithDictionary:", "@@:@", dict_new)?;
    Ok(())
}

impl LocalRuntime {
    /// Foreign equality: identity, then value equality for strings, arrays
    /// and dictionaries, with integers and floats comparing numerically.
    pub fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Object(x), Value::Object(y)) if x == y => true,
            (Value::Object(x), other) | (other, Value::Object(x)) => match self.snapshot(x) {
                Ok(Payload::Text(s)) => match other {
                    Value::Str(t) => s == *t,
                    Value::Object(y) => matches!(self.snapshot(y), Ok(Payload::Text(t)) if t == s),
                    _ => false,
                },
                Ok(Payload::Array(items)) => match other {
                    Value::Array(o) => self.sequences_equal(&items, o),
                    Value::Object(y) => match self.snapshot(y) {
                        Ok(Payload::Array(o)) => self.sequences_equal(&items, &o),
                        _ => false,
                    },
                    _ => false,
                },
                Ok(Payload::Dict(pairs)) => match other {
                    Value::Map(o) => self.pairs_equal(&pairs, o),
                    Value::Object(y) => match self.snapshot(y) {
                        Ok(Payload::Dict(o)) => self.pairs_equal(&pairs, &o),
                        _ => false,
                    },
                    _ => false,
                },
                _ => false,
            },
            (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => (*i as f64) == *f,
            (Value::Array(x), Value::Array(y)) => self.sequences_equal(x, y),
            (Value::Map(x), Value::Map(y)) => self.pairs_equal(x, y),
            _ => a == b,
        }
    }

    fn sequences_equal(&self, a: &[Value], b: &[Value]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.values_equal(x, y))
    }

    fn pairs_equal(&self, a: &[(Value, Value)], b: &[(Value, Value)]) -> bool {
        a.len() == b.len()
            && a.iter().all(|(k, v)| {
                b.iter()
                    .find(|(k2, _)| self.values_equal(k, k2))
                    .is_some_and(|(_, v2)| self.values_equal(v, v2))
            })
    }

    /// Creates an `NSString` or `NSMutableString`.
    pub fn new_string(&self, text: &str, mutable: bool) -> ObjectRef {
        let class = self.foundation_class(|n| if mutable { &n.mutable_text } else { &n.text });
        self.allocate(class, Payload::Text(text.to_string()))
    }

    /// Creates an `NSArray` or `NSMutableArray`.
    pub fn new_array(&self, items: Vec<Value>, mutable: bool) -> ObjectRef {
        let class = self.foundation_class(|n| if mutable { &n.mutable_array } else { &n.array });
        self.allocate(class, Payload::Array(items))
    }

    /// Creates an `NSDictionary` or `NSMutableDictionary`.
    pub fn new_dictionary(&self, pairs: Vec<(Value, Value)>, mutable: bool) -> ObjectRef {
        let class = self.foundation_class(|n| {
            if mutable { &n.mutable_dictionary } else { &n.dictionary }
        });
        self.allocate(class, Payload::Dict(pairs))
    }

    fn foundation_class(&self, pick: impl Fn(&FoundationNames) -> &String) -> ClassHandle {
        self.foundation
            .get()
            .and_then(|n| self.class_by_name(pick(n)))
            .unwrap_or(ClassHandle(0))
    }
}

fn text_arg(rt: &LocalRuntime, selector: &str, value: &Value) -> ForeignResult<String> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        Value::Object(o) => match rt.snapshot(o)? {
            Payload::Text(s) => Ok(s),
            _ => Err(invalid(selector, "expected a string")),
        },
        other => Err(invalid(selector, &format!("expected a string, got {}", other.type_name()))),
    }
}

fn items_arg(rt: &LocalRuntime, selector: &str, value: &Value) -> ForeignResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(o) => match rt.snapshot(o)? {
            Payload::Array(items) => Ok(items),
            _ => Err(invalid(selector, "expected an array")),
        },
        other => Err(invalid(selector, &format!("expected an array, got {}", other.type_name()))),
    }
}

fn pairs_arg(rt: &LocalRuntime, selector: &str, value: &Value) -> ForeignResult<Vec<(Value, Value)>> {
    match value {
        Value::Map(pairs) => Ok(pairs.clone()),
        Value::Object(o) => match rt.snapshot(o)? {
            Payload::Dict(pairs) => Ok(pairs),
            _ => Err(invalid(selector, "expected a dictionary")),
        },
        other => Err(invalid(selector, &format!("expected a dictionary, got {}", other.type_name()))),
    }
}

fn index_arg(value: &Value) -> usize {
    value.as_int().map_or(0, |i| i.max(0) as usize)
}

fn invalid(selector: &str, reason: &str) -> ForeignError {
    ForeignError::InvalidArgument {
        selector: selector.to_string(),
        reason: reason.to_string(),
    }
}

fn not_nil(selector: &str, value: &Value) -> ForeignResult<()> {
    if value.is_nil() {
        Err(invalid(selector, "attempt to insert nil object"))
    } else {
        Ok(())
    }
}

fn require_mutable(
    rt: &LocalRuntime,
    this: &ObjectRef,
    selector: &str,
    pick: impl Fn(&FoundationNames) -> &String,
) -> ForeignResult<()> {
    let names = rt.names()?;
    if rt.object_is_kind_of(this, pick(names)) {
        Ok(())
    } else {
        Err(ForeignError::Immutable {
            class: rt.receiver_class_name(this),
            selector: selector.to_string(),
        })
    }
}

fn wrong_payload(rt: &LocalRuntime, this: &ObjectRef, selector: &str) -> ForeignError {
    ForeignError::UnrecognizedSelector {
        class: rt.receiver_class_name(this),
        selector: selector.to_string(),
    }
}

// ============================================================================
// NSObject
// ============================================================================

fn init(_: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Object(this.clone()))
}

fn is_equal(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Bool(rt.values_equal(&Value::Object(this.clone()), &args[0])))
}

fn hash(_: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Int(this.id().0 as i64))
}

fn describe(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Str(format!("<{}: {}>", rt.receiver_class_name(this), this.id())))
}

fn class_name(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Str(rt.receiver_class_name(this)))
}

fn responds_to_selector(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let selector = text_arg(rt, "respondsToSelector:", &args[0])?;
    let class = rt.class_of(this)?;
    Ok(Value::Bool(rt.lookup_method(class, &selector, false).is_some()))
}

fn is_kind_of_class(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let name = text_arg(rt, "isKindOfClass:", &args[0])?;
    Ok(Value::Bool(rt.object_is_kind_of(this, &name)))
}

fn retain_count(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Int(i64::from(rt.refcount(this.id()).unwrap_or(0))))
}

fn value_for_key(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let key = text_arg(rt, "valueForKey:", &args[0])?;
    let class = rt.class_of(this)?;
    if rt.lookup_method(class, &key, false).is_some() {
        rt.invoke(this, &key, &[])
    } else {
        rt.invoke(this, "valueForUndefinedKey:", &[Value::Str(key)])
    }
}

fn set_value_for_key(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let key = text_arg(rt, "setValue:forKey:", &args[1])?;
    let setter = setter_selector(&key);
    let class = rt.class_of(this)?;
    if rt.lookup_method(class, &setter, false).is_some() {
        rt.will_change(this, &key, None);
        let result = rt.invoke(this, &setter, &args[..1]);
        rt.did_change(this, &key, None);
        result.map(|_| Value::Nil)
    } else {
        rt.invoke(this, "setValue:forUndefinedKey:", &[args[0].clone(), Value::Str(key)])
    }
}

fn unknown_key(rt: &LocalRuntime, this: &ObjectRef, selector: &str, key: &str) -> ForeignError {
    ForeignError::Exception {
        name: "NSUnknownKeyException".to_string(),
        reason: format!(
            "[<{} {}> {selector}]: this class is not key value coding-compliant for the key {key}.",
            rt.receiver_class_name(this),
            this.id()
        ),
    }
}

fn value_for_undefined_key(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let key = text_arg(rt, "valueForUndefinedKey:", &args[0])?;
    Err(unknown_key(rt, this, "valueForUndefinedKey:", &key))
}

fn set_value_for_undefined_key(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let key = text_arg(rt, "setValue:forUndefinedKey:", &args[1])?;
    Err(unknown_key(rt, this, "setValue:forUndefinedKey:", &key))
}

fn will_change_value(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let key = text_arg(rt, "willChangeValueForKey:", &args[0])?;
    rt.will_change(this, &key, None);
    Ok(Value::Nil)
}

fn did_change_value(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let key = text_arg(rt, "didChangeValueForKey:", &args[0])?;
    rt.did_change(this, &key, None);
    Ok(Value::Nil)
}

// ============================================================================
// NSString
// ============================================================================

fn text_of(rt: &LocalRuntime, this: &ObjectRef, selector: &str) -> ForeignResult<String> {
    match rt.snapshot(this)? {
        Payload::Text(s) => Ok(s),
        _ => Err(wrong_payload(rt, this, selector)),
    }
}

fn text_length(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Int(text_of(rt, this, "length")?.chars().count() as i64))
}

fn text_utf8(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Str(text_of(rt, this, "UTF8String")?))
}

fn text_appending(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let mut text = text_of(rt, this, "stringByAppendingString:")?;
    text.push_str(&text_arg(rt, "stringByAppendingString:", &args[0])?);
    Ok(Value::Object(rt.new_string(&text, false)))
}

fn text_set(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    require_mutable(rt, this, "setString:", |n| &n.mutable_text)?;
    let text = text_arg(rt, "setString:", &args[0])?;
    rt.with_payload(this, |p| *p = Payload::Text(text))?;
    Ok(Value::Nil)
}

fn text_append(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    require_mutable(rt, this, "appendString:", |n| &n.mutable_text)?;
    let suffix = text_arg(rt, "appendString:", &args[0])?;
    rt.with_payload(this, |p| {
        if let Payload::Text(s) = p {
            s.push_str(&suffix);
        }
    })?;
    Ok(Value::Nil)
}

fn text_copy(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Object(rt.new_string(&text_of(rt, this, "copy")?, false)))
}

fn text_mutable_copy(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Object(rt.new_string(&text_of(rt, this, "mutableCopy")?, true)))
}

fn text_new_empty(rt: &LocalRuntime, class: ClassHandle, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Object(rt.allocate(class, Payload::Text(String::new()))))
}

fn text_new(rt: &LocalRuntime, class: ClassHandle, args: &[Value]) -> ForeignResult<Value> {
    let text = text_arg(rt, "stringWithString:", &args[0])?;
    Ok(Value::Object(rt.allocate(class, Payload::Text(text))))
}

// ============================================================================
// NSArray
// ============================================================================

fn items_of(rt: &LocalRuntime, this: &ObjectRef, selector: &str) -> ForeignResult<Vec<Value>> {
    match rt.snapshot(this)? {
        Payload::Array(items) => Ok(items),
        _ => Err(wrong_payload(rt, this, selector)),
    }
}

/// Mutates the array payload; returns what `f` hands back so removed
/// elements are dropped after the payload lock is released.
fn mutate_items<R>(
    rt: &LocalRuntime,
    this: &ObjectRef,
    selector: &str,
    f: impl FnOnce(&mut Vec<Value>) -> ForeignResult<R>,
) -> ForeignResult<R> {
    require_mutable(rt, this, selector, |n| &n.mutable_array)?;
    rt.with_payload(this, |p| match p {
        Payload::Array(items) => f(items),
        _ => Err(invalid(selector, "receiver is not an array")),
    })?
}

fn beyond(selector: &str, index: usize, count: usize) -> ForeignError {
    ForeignError::IndexBeyondBounds {
        selector: selector.to_string(),
        index,
        count,
    }
}

fn array_count(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Int(items_of(rt, this, "count")?.len() as i64))
}

fn array_object_at(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let index = index_arg(&args[0]);
    let items = items_of(rt, this, "objectAtIndex:")?;
    items
        .get(index)
        .cloned()
        .ok_or_else(|| beyond("objectAtIndex:", index, items.len()))
}

fn array_last(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(items_of(rt, this, "lastObject")?.pop().unwrap_or_default())
}

fn array_contains(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let items = items_of(rt, this, "containsObject:")?;
    Ok(Value::Bool(items.iter().any(|v| rt.values_equal(v, &args[0]))))
}

fn array_index_of(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let items = items_of(rt, this, "indexOfObject:")?;
    Ok(Value::Int(
        items
            .iter()
            .position(|v| rt.values_equal(v, &args[0]))
            .map_or(NOT_FOUND, |i| i as i64),
    ))
}

fn array_describe(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Str(Value::Array(items_of(rt, this, "description")?).to_string()))
}

fn array_copy(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Object(rt.new_array(items_of(rt, this, "copy")?, false)))
}

fn array_mutable_copy(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Object(rt.new_array(items_of(rt, this, "mutableCopy")?, true)))
}

fn array_add(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    not_nil("addObject:", &args[0])?;
    let value = args[0].clone();
    mutate_items(rt, this, "addObject:", |items| {
        items.push(value);
        Ok(())
    })?;
    Ok(Value::Nil)
}

fn array_insert(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    not_nil("insertObject:atIndex:", &args[0])?;
    let value = args[0].clone();
    let index = index_arg(&args[1]);
    mutate_items(rt, this, "insertObject:atIndex:", |items| {
        if index > items.len() {
            return Err(beyond("insertObject:atIndex:", index, items.len()));
        }
        items.insert(index, value);
        Ok(())
    })?;
    Ok(Value::Nil)
}

fn array_remove_at(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let index = index_arg(&args[0]);
    let removed = mutate_items(rt, this, "removeObjectAtIndex:", |items| {
        if index >= items.len() {
            return Err(beyond("removeObjectAtIndex:", index, items.len()));
        }
        Ok(items.remove(index))
    })?;
    drop(removed);
    Ok(Value::Nil)
}

fn array_replace_at(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    not_nil("replaceObjectAtIndex:withObject:", &args[1])?;
    let index = index_arg(&args[0]);
    let value = args[1].clone();
    let old = mutate_items(rt, this, "replaceObjectAtIndex:withObject:", |items| {
        let count = items.len();
        let slot = items
            .get_mut(index)
            .ok_or_else(|| beyond("replaceObjectAtIndex:withObject:", index, count))?;
        Ok(std::mem::replace(slot, value))
    })?;
    drop(old);
    Ok(Value::Nil)
}

fn array_clear(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    let old = mutate_items(rt, this, "removeAllObjects", |items| Ok(std::mem::take(items)))?;
    drop(old);
    Ok(Value::Nil)
}

fn array_remove_last(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    let old = mutate_items(rt, this, "removeLastObject", |items| Ok(items.pop()))?;
    drop(old);
    Ok(Value::Nil)
}

fn array_set(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let new_items = items_arg(rt, "setArray:", &args[0])?;
    let old = mutate_items(rt, this, "setArray:", |items| Ok(std::mem::replace(items, new_items)))?;
    drop(old);
    Ok(Value::Nil)
}

fn array_add_all(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let extra = items_arg(rt, "addObjectsFromArray:", &args[0])?;
    mutate_items(rt, this, "addObjectsFromArray:", |items| {
        items.extend(extra);
        Ok(())
    })?;
    Ok(Value::Nil)
}

fn array_new_empty(rt: &LocalRuntime, class: ClassHandle, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Object(rt.allocate(class, Payload::Array(Vec::new()))))
}

fn array_new(rt: &LocalRuntime, class: ClassHandle, args: &[Value]) -> ForeignResult<Value> {
    let items = items_arg(rt, "arrayWithArray:", &args[0])?;
    Ok(Value::Object(rt.allocate(class, Payload::Array(items))))
}

// ============================================================================
// NSDictionary
// ============================================================================

fn pairs_of(rt: &LocalRuntime, this: &ObjectRef, selector: &str) -> ForeignResult<Vec<(Value, Value)>> {
    match rt.snapshot(this)? {
        Payload::Dict(pairs) => Ok(pairs),
        _ => Err(wrong_payload(rt, this, selector)),
    }
}

fn dict_count(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Int(pairs_of(rt, this, "count")?.len() as i64))
}

fn dict_object_for_key(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let pairs = pairs_of(rt, this, "objectForKey:")?;
    Ok(pairs
        .into_iter()
        .find(|(k, _)| rt.values_equal(k, &args[0]))
        .map(|(_, v)| v)
        .unwrap_or_default())
}

fn dict_keys(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    let pairs = pairs_of(rt, this, "allKeys")?;
    Ok(Value::Array(pairs.into_iter().map(|(k, _)| k).collect()))
}

fn dict_values(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    let pairs = pairs_of(rt, this, "allValues")?;
    Ok(Value::Array(pairs.into_iter().map(|(_, v)| v).collect()))
}

fn dict_copy(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Object(rt.new_dictionary(pairs_of(rt, this, "copy")?, false)))
}

fn dict_mutable_copy(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Object(rt.new_dictionary(pairs_of(rt, this, "mutableCopy")?, true)))
}

fn mutate_pairs<R>(
    rt: &LocalRuntime,
    this: &ObjectRef,
    selector: &str,
    f: impl FnOnce(&mut Vec<(Value, Value)>) -> R,
) -> ForeignResult<R> {
    require_mutable(rt, this, selector, |n| &n.mutable_dictionary)?;
    rt.with_payload(this, |p| match p {
        Payload::Dict(pairs) => Ok(f(pairs)),
        _ => Err(invalid(selector, "receiver is not a dictionary")),
    })?
}

fn dict_set(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    not_nil("setObject:forKey:", &args[0])?;
    if args[1].is_nil() {
        return Err(invalid("setObject:forKey:", "key cannot be nil"));
    }
    // Find the slot before locking; key comparison may read other objects.
    let position = pairs_of(rt, this, "setObject:forKey:")?
        .iter()
        .position(|(k, _)| rt.values_equal(k, &args[1]));
    let (value, key) = (args[0].clone(), args[1].clone());
    let old = mutate_pairs(rt, this, "setObject:forKey:", |pairs| match position {
        Some(i) if i < pairs.len() => Some(std::mem::replace(&mut pairs[i].1, value)),
        _ => {
            pairs.push((key, value));
            None
        }
    })?;
    drop(old);
    Ok(Value::Nil)
}

fn dict_remove(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let position = pairs_of(rt, this, "removeObjectForKey:")?
        .iter()
        .position(|(k, _)| rt.values_equal(k, &args[0]));
    let old = mutate_pairs(rt, this, "removeObjectForKey:", |pairs| match position {
        Some(i) if i < pairs.len() => Some(pairs.remove(i)),
        _ => None,
    })?;
    drop(old);
    Ok(Value::Nil)
}

fn dict_clear(rt: &LocalRuntime, this: &ObjectRef, _: &[Value]) -> ForeignResult<Value> {
    let old = mutate_pairs(rt, this, "removeAllObjects", std::mem::take)?;
    drop(old);
    Ok(Value::Nil)
}

fn dict_set_all(rt: &LocalRuntime, this: &ObjectRef, args: &[Value]) -> ForeignResult<Value> {
    let new_pairs = pairs_arg(rt, "setDictionary:", &args[0])?;
    let old = mutate_pairs(rt, this, "setDictionary:", |pairs| std::mem::replace(pairs, new_pairs))?;
    drop(old);
    Ok(Value::Nil)
}

fn dict_new_empty(rt: &LocalRuntime, class: ClassHandle, _: &[Value]) -> ForeignResult<Value> {
    Ok(Value::Object(rt.allocate(class, Payload::Dict(Vec::new()))))
}

fn dict_new(rt: &LocalRuntime, class: ClassHandle, args: &[Value]) -> ForeignResult<Value> {
    let pairs = pairs_arg(rt, "dictionaryWithDictionary:", &args[0])?;
    Ok(Value::Object(rt.allocate(class, Payload::Dict(pairs))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immutable_string_rejects_set_string() {
        let rt = LocalRuntime::new();
        let s = rt.new_string("abc", false);
        let err = rt.invoke(&s, "setString:", &[Value::from("x")]).unwrap_err();
        assert!(matches!(err, ForeignError::Immutable { .. }));
        assert_eq!(rt.contents(&s).unwrap(), Value::from("abc"));
    }

    #[test]
    fn test_mutable_array_primitives() {
        let rt = LocalRuntime::new();
        let a = rt.new_array(vec![Value::Int(1)], true);
        rt.invoke(&a, "addObject:", &[Value::Int(3)]).unwrap();
        rt.invoke(&a, "insertObject:atIndex:", &[Value::Int(2), Value::Int(1)]).unwrap();
        assert_eq!(rt.contents(&a).unwrap(), crate::values![1, 2, 3]);

        rt.invoke(&a, "removeObjectAtIndex:", &[Value::Int(0)]).unwrap();
        assert_eq!(rt.invoke(&a, "count", &[]).unwrap(), Value::Int(2));
        assert!(matches!(
            rt.invoke(&a, "objectAtIndex:", &[Value::Int(5)]),
            Err(ForeignError::IndexBeyondBounds { index: 5, count: 2, .. })
        ));
        assert!(matches!(
            rt.invoke(&a, "addObject:", &[Value::Nil]),
            Err(ForeignError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_dictionary_keys_use_foreign_equality() {
        let rt = LocalRuntime::new();
        let d = rt.new_dictionary(vec![(Value::from("a"), Value::Int(1))], true);
        let key = rt.new_string("a", false);
        assert_eq!(rt.invoke(&d, "objectForKey:", &[Value::Object(key.clone())]).unwrap(), Value::Int(1));

        rt.invoke(&d, "setObject:forKey:", &[Value::Int(2), Value::Object(key)]).unwrap();
        assert_eq!(rt.invoke(&d, "count", &[]).unwrap(), Value::Int(1));
        assert_eq!(rt.invoke(&d, "objectForKey:", &[Value::from("a")]).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_class_constructors_use_receiving_class() {
        let rt = LocalRuntime::new();
        let mutable = rt.class_by_name("NSMutableString").unwrap();
        let s = rt.invoke_class(mutable, "stringWithString:", &[Value::from("x")]).unwrap();
        let s = s.as_object().unwrap();
        rt.invoke(s, "appendString:", &[Value::from("y")]).unwrap();
        assert_eq!(rt.contents(s).unwrap(), Value::from("xy"));
    }

    #[test]
    fn test_value_for_undefined_key_raises() {
        let rt = LocalRuntime::new();
        let root = rt.class_by_name("NSObject").unwrap();
        let obj = rt.create_instance(root).unwrap();
        let err = rt.invoke(&obj, "valueForKey:", &[Value::from("missing")]).unwrap_err();
        assert!(matches!(err, ForeignError::Exception { ref name, .. } if name == "NSUnknownKeyException"));
    }

    #[test]
    fn test_numeric_cross_equality() {
        let rt = LocalRuntime::new();
        assert!(rt.values_equal(&Value::Int(1), &Value::Float(1.0)));
        assert!(!rt.values_equal(&Value::Int(1), &Value::from("1")));
    }
}
