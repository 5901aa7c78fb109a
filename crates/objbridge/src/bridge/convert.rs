//! Conversion of foreign collections into host values.

use super::Bridge;
use crate::adapters::{ArrayAdapter, DictionaryAdapter, Family, MapLike, SequenceLike, StringAdapter, TextLike};
use crate::error::{Error, Result};
use crate::foreign::ObjectId;
use crate::value::{ObjectRef, Value};

impl Bridge {
    /// Deep-converts foreign strings, arrays and dictionaries into host
    /// values. Other foreign objects are kept as references.
    ///
    /// # Errors
    ///
    /// [`Error::CyclicStructure`] if a container holds itself.
    ///
    /// # Example
    ///
    /// ```
    /// use objbridge::runtime::LocalRuntime;
    /// use objbridge::{values, Bridge, Value};
    ///
    /// let rt = LocalRuntime::new();
    /// let bridge = Bridge::new(rt.clone());
    /// let inner = rt.new_string("b", false);
    /// let list = rt.new_array(vec![Value::from("a"), inner.into()], false);
    ///
    /// assert_eq!(bridge.to_host(&list.into()).unwrap(), values!["a", "b"]);
    /// ```
    pub fn to_host(&self, value: &Value) -> Result<Value> {
        let mut open = Vec::new();
        self.convert(value, &mut open)
    }

    fn convert(&self, value: &Value, open: &mut Vec<ObjectId>) -> Result<Value> {
        match value {
            Value::Array(items) => Ok(Value::Array(self.convert_all(items, open)?)),
            Value::Map(pairs) => Ok(Value::Map(self.convert_pairs(pairs, open)?)),
            Value::Object(object) => self.convert_object(object, open),
            other => Ok(other.clone()),
        }
    }

    fn convert_all(&self, items: &[Value], open: &mut Vec<ObjectId>) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.convert(item, open)?);
        }
        Ok(out)
    }

    fn convert_pairs(&self, pairs: &[(Value, Value)], open: &mut Vec<ObjectId>) -> Result<Vec<(Value, Value)>> {
        let mut out = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            out.push((self.convert(k, open)?, self.convert(v, open)?));
        }
        Ok(out)
    }

    fn convert_object(&self, object: &ObjectRef, open: &mut Vec<ObjectId>) -> Result<Value> {
        let family = match self.family_of(object)? {
            Some(Family::Text) => return Ok(Value::Str(StringAdapter::new(self, object.clone()).read()?)),
            Some(family) => family,
            None => return Ok(Value::Object(object.clone())),
        };
        if open.contains(&object.id()) {
            return Err(Error::CyclicStructure {
                receiver: self.class_name_of(object),
            });
        }

        open.push(object.id());
        let converted = match family {
            Family::Map => DictionaryAdapter::new(self, object.clone())
                .pairs()
                .and_then(|pairs| self.convert_pairs(&pairs, open))
                .map(Value::Map),
            _ => ArrayAdapter::new(self, object.clone())
                .to_vec()
                .and_then(|items| self.convert_all(&items, open))
                .map(Value::Array),
        };
        open.pop();
        converted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign::ForeignRuntime;
    use crate::runtime::LocalRuntime;

    #[test]
    fn test_nested_collections_convert() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let tags = rt.new_array(vec![Value::Object(rt.new_string("x", true))], false);
        let dict = rt.new_dictionary(
            vec![(Value::Object(rt.new_string("tags", false)), Value::Object(tags))],
            false,
        );

        assert_eq!(
            bridge.to_host(&Value::Object(dict)).unwrap(),
            Value::Map(vec![(Value::from("tags"), crate::values!["x"])])
        );
    }

    #[test]
    fn test_plain_objects_stay_references() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let obj = rt.create_instance(rt.class_by_name("NSObject").unwrap()).unwrap();
        let value = Value::Array(vec![Value::Object(obj.clone()), Value::Int(1)]);
        assert_eq!(bridge.to_host(&value).unwrap(), value);
    }

    #[test]
    fn test_self_containing_array_fails() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let list = rt.new_array(vec![Value::Int(1)], true);
        rt.invoke(&list, "addObject:", &[Value::Object(list.clone())]).unwrap();

        assert_eq!(
            bridge.to_host(&Value::Object(list)).unwrap_err(),
            Error::CyclicStructure {
                receiver: "NSMutableArray".into()
            }
        );
    }

    #[test]
    fn test_shared_children_are_not_cycles() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let child = Value::Object(rt.new_array(vec![Value::Int(1)], false));
        let parent = rt.new_array(vec![child.clone(), child], false);
        assert_eq!(
            bridge.to_host(&Value::Object(parent)).unwrap(),
            Value::Array(vec![crate::values![1], crate::values![1]])
        );
    }
}
