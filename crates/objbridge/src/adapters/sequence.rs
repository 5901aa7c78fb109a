//! Ordered-sequence behaviour over foreign arrays.
//!
//! [`SequenceLike`] needs six primitives (count, get-at, replace-at,
//! insert-at, remove-at and replace-all) plus foreign equality; everything
//! else is built on top of them. [`ArrayAdapter`] maps the primitives onto
//! `NSArray`/`NSMutableArray` selectors.

use super::index::{SeqIndex, normalize, resolve, resolve_span};
use super::{Observer, block_truthy, count_arg, int_result, touch, wrong_type};
use crate::bridge::Bridge;
use crate::bridge::forward::Call;
use crate::error::{Error, Result};
use crate::foreign::ObjectId;
use crate::value::{ObjectRef, Value};
use std::cmp::Ordering;
use std::fmt;

/// A nested sequence found inside another one.
#[derive(Debug, Clone, PartialEq)]
pub struct Nested {
    /// Foreign identity, for cycle detection. `None` for host arrays.
    pub id: Option<ObjectId>,
    pub items: Vec<Value>,
}

/// Host ordered-sequence behaviour over a minimal primitive surface.
///
/// Reads never cache: every call goes to the primitives again, so results
/// always reflect the current foreign state.
pub trait SequenceLike {
    // ------------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------------

    /// Receiver description used in error messages.
    fn receiver(&self) -> String;
    fn count(&self) -> Result<usize>;
    fn item(&self, index: usize) -> Result<Value>;
    fn replace_item(&self, index: usize, value: Value) -> Result<()>;
    fn insert_item(&self, index: usize, value: Value) -> Result<()>;
    fn remove_item(&self, index: usize) -> Result<()>;
    fn replace_items(&self, items: Vec<Value>) -> Result<()>;
    /// Element equality as the foreign side defines it.
    fn same(&self, a: &Value, b: &Value) -> Result<bool>;
    /// The items of `value` if it is a sequence of the same family.
    fn nested(&self, value: &Value) -> Result<Option<Nested>>;
    /// Text form of a non-sequence element.
    fn describe(&self, value: &Value) -> Result<String>;
    fn identity(&self) -> Option<ObjectId>;
    /// The receiver itself as a value.
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

    fn to_vec(&self) -> Result<Vec<Value>> {
        let count = self.count()?;
        (0..count).map(|i| self.item(i)).collect()
    }

    /// Elements `loc..loc + len`.
    fn items_in(&self, loc: usize, len: usize) -> Result<Vec<Value>> {
        (loc..loc + len).map(|i| self.item(i)).collect()
    }

    /// One element, `None` when out of range.
    fn at(&self, index: i64) -> Result<Option<Value>> {
        match normalize(index, self.count()?) {
            Some(i) => self.item(i).map(Some),
            None => Ok(None),
        }
    }

    /// `self[index]`: an element for an integer, a fresh array for a range or
    /// span, `None` when out of range.
    fn get(&self, index: impl Into<SeqIndex>) -> Result<Option<Value>> {
        let count = self.count()?;
        match index.into() {
            SeqIndex::At(i) => self.at(i),
            other => match resolve(other, count) {
                Some((loc, len)) => Ok(Some(Value::Array(self.items_in(loc, len)?))),
                None => Ok(None),
            },
        }
    }

    /// Like [`at`](Self::at) but fails when out of range.
    fn fetch(&self, index: i64) -> Result<Value> {
        match self.at(index)? {
            Some(value) => Ok(value),
            None => Err(Error::IndexOutOfRange {
                receiver: self.receiver(),
                index,
                len: self.count()?,
            }),
        }
    }

    fn fetch_or(&self, index: i64, default: Value) -> Result<Value> {
        Ok(self.at(index)?.unwrap_or(default))
    }

    fn fetch_or_else(&self, index: i64, fallback: impl FnOnce(i64) -> Result<Value>) -> Result<Value> {
        match self.at(index)? {
            Some(value) => Ok(value),
            None => fallback(index),
        }
    }

    fn first(&self) -> Result<Option<Value>> {
        self.at(0)
    }

    fn first_n(&self, n: usize) -> Result<Vec<Value>> {
        let count = self.count()?;
        self.items_in(0, n.min(count))
    }

    fn last(&self) -> Result<Option<Value>> {
        self.at(-1)
    }

    fn last_n(&self, n: usize) -> Result<Vec<Value>> {
        let count = self.count()?;
        let n = n.min(count);
        self.items_in(count - n, n)
    }

    /// Elements at each index, with `Value::Nil` for missing ones.
    fn values_at(&self, indexes: &[i64]) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(indexes.len());
        for &i in indexes {
            out.push(self.at(i)?.unwrap_or_default());
        }
        Ok(out)
    }

    fn includes(&self, value: &Value) -> Result<bool> {
        Ok(self.index_of(value)?.is_some())
    }

    fn index_of(&self, value: &Value) -> Result<Option<usize>> {
        let count = self.count()?;
        for i in 0..count {
            if self.same(&self.item(i)?, value)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    fn rindex(&self, value: &Value) -> Result<Option<usize>> {
        let count = self.count()?;
        for i in (0..count).rev() {
            if self.same(&self.item(i)?, value)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Visits elements in order, re-reading the count at every step.
    fn each(&self, mut f: impl FnMut(usize, &Value) -> Result<()>) -> Result<()> {
        let mut i = 0;
        while i < self.count()? {
            f(i, &self.item(i)?)?;
            i += 1;
        }
        Ok(())
    }

    fn map(&self, mut f: impl FnMut(&Value) -> Result<Value>) -> Result<Vec<Value>> {
        self.to_vec()?.iter().map(|v| f(v)).collect()
    }

    /// Element-wise foreign equality with `other`.
    fn eq_items(&self, other: &[Value]) -> Result<bool> {
        if self.count()? != other.len() {
            return Ok(false);
        }
        for (i, value) in other.iter().enumerate() {
            if !self.same(&self.item(i)?, value)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The first element that is itself a sequence whose first item equals
    /// `key`.
    fn assoc(&self, key: &Value) -> Result<Option<Value>> {
        self.find_pair(key, 0)
    }

    /// Like [`assoc`](Self::assoc), matching the second item.
    fn rassoc(&self, value: &Value) -> Result<Option<Value>> {
        self.find_pair(value, 1)
    }

    #[doc(hidden)]
    fn find_pair(&self, wanted: &Value, position: usize) -> Result<Option<Value>> {
        for element in self.to_vec()? {
            if let Some(nested) = self.nested(&element)? {
                if let Some(item) = nested.items.get(position) {
                    if self.same(item, wanted)? {
                        return Ok(Some(element));
                    }
                }
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------------
    // Derived sequences
    // ------------------------------------------------------------------------

    /// Elements present in both, in this sequence's order, without
    /// duplicates.
    fn intersection(&self, other: &[Value]) -> Result<Vec<Value>> {
        let mut out: Vec<Value> = Vec::new();
        for value in self.to_vec()? {
            if self.contains_in(other, &value)? && !self.contains_in(&out, &value)? {
                out.push(value);
            }
        }
        Ok(out)
    }

    /// Elements of either, first-seen order, without duplicates.
    fn union(&self, other: &[Value]) -> Result<Vec<Value>> {
        let mut out: Vec<Value> = Vec::new();
        for value in self.to_vec()?.into_iter().chain(other.iter().cloned()) {
            if !self.contains_in(&out, &value)? {
                out.push(value);
            }
        }
        Ok(out)
    }

    /// Elements not present in `other`.
    fn difference(&self, other: &[Value]) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        for value in self.to_vec()? {
            if !self.contains_in(other, &value)? {
                out.push(value);
            }
        }
        Ok(out)
    }

    #[doc(hidden)]
    fn contains_in(&self, haystack: &[Value], value: &Value) -> Result<bool> {
        for candidate in haystack {
            if self.same(value, candidate)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn plus(&self, other: &[Value]) -> Result<Vec<Value>> {
        let mut out = self.to_vec()?;
        out.extend_from_slice(other);
        Ok(out)
    }

    fn repeat(&self, times: usize) -> Result<Vec<Value>> {
        let items = self.to_vec()?;
        let total = items.len().checked_mul(times).ok_or_else(|| Error::InvalidArgument {
            receiver: self.receiver(),
            operation: "*".to_string(),
            reason: format!("argument too big: {times}"),
        })?;
        Ok(items.iter().cloned().cycle().take(total).collect())
    }

    fn compact(&self) -> Result<Vec<Value>> {
        Ok(self.to_vec()?.into_iter().filter(|v| !v.is_nil()).collect())
    }

    fn reverse(&self) -> Result<Vec<Value>> {
        let mut items = self.to_vec()?;
        items.reverse();
        Ok(items)
    }

    fn uniq(&self) -> Result<Vec<Value>> {
        let mut out: Vec<Value> = Vec::new();
        for value in self.to_vec()? {
            if !self.contains_in(&out, &value)? {
                out.push(value);
            }
        }
        Ok(out)
    }

    fn sort(&self) -> Result<Vec<Value>> {
        let mut keyed = Vec::new();
        for value in self.to_vec()? {
            let key = match &value {
                Value::Object(_) => Value::Str(self.describe(&value)?),
                other => other.clone(),
            };
            keyed.push((key, value));
        }
        let mut failure = None;
        keyed.sort_by(|(a, _), (b, _)| {
            compare_scalars(a, b).unwrap_or_else(|| {
                failure.get_or_insert((a.type_name(), b.type_name()));
                Ordering::Equal
            })
        });
        if let Some((a, b)) = failure {
            return Err(Error::InvalidArgument {
                receiver: self.receiver(),
                operation: "sort".to_string(),
                reason: format!("comparison of {a} with {b} failed"),
            });
        }
        Ok(keyed.into_iter().map(|(_, v)| v).collect())
    }

    /// Sorts with a fallible comparator.
    fn sort_by(&self, mut cmp: impl FnMut(&Value, &Value) -> Result<Ordering>) -> Result<Vec<Value>> {
        let mut items = self.to_vec()?;
        let mut failure = None;
        items.sort_by(|a, b| match cmp(a, b) {
            Ok(order) => order,
            Err(e) => {
                failure.get_or_insert(e);
                Ordering::Equal
            }
        });
        match failure {
            Some(e) => Err(e),
            None => Ok(items),
        }
    }

    /// Nested sequences expanded in place, up to `depth` levels (all levels
    /// when `None`).
    ///
    /// # Errors
    ///
    /// [`Error::CyclicStructure`] if a sequence contains itself.
    fn flatten(&self, depth: Option<usize>) -> Result<Vec<Value>> {
        let mut stack: Vec<ObjectId> = self.identity().into_iter().collect();
        let mut out = Vec::new();
        flatten_into(self, &self.to_vec()?, depth, &mut stack, &mut out)?;
        Ok(out)
    }

    /// Elements joined with `separator`. Nested sequences are joined
    /// recursively; a sequence already being joined renders as `[...]`.
    fn join(&self, separator: &str) -> Result<String> {
        let mut stack: Vec<ObjectId> = self.identity().into_iter().collect();
        let mut out = String::new();
        join_into(self, &self.to_vec()?, separator, &mut stack, &mut out)?;
        Ok(out)
    }

    /// Rows and columns swapped.
    fn transpose(&self) -> Result<Vec<Value>> {
        let mut rows = Vec::new();
        for element in self.to_vec()? {
            match self.nested(&element)? {
                Some(nested) => rows.push(nested.items),
                None => return Err(wrong_type(&self.receiver(), "array", &element)),
            }
        }
        let width = rows.first().map_or(0, Vec::len);
        if let Some(row) = rows.iter().find(|r| r.len() != width) {
            return Err(Error::InvalidArgument {
                receiver: self.receiver(),
                operation: "transpose".to_string(),
                reason: format!("element size differs ({} should be {width})", row.len()),
            });
        }
        Ok((0..width)
            .map(|col| Value::Array(rows.iter().map(|r| r[col].clone()).collect()))
            .collect())
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// `self[index] = value`.
    ///
    /// An index equal to the length appends, an index in range replaces.
    /// A range or span is replaced by the elements of `value` (or by `value`
    /// itself when it is not a sequence).
    ///
    /// # Errors
    ///
    /// [`Error::IndexOutOfRange`] past the end, [`Error::NegativeLength`] for
    /// a span with a negative length. Nothing is sent to the foreign side in
    /// either case.
    fn set(&self, index: impl Into<SeqIndex>, value: Value) -> Result<()> {
        let count = self.count()?;
        let out_of_range = |index: i64| Error::IndexOutOfRange {
            receiver: self.receiver(),
            index,
            len: count,
        };
        match index.into() {
            SeqIndex::At(i) => {
                let pos = if i < 0 { i + count as i64 } else { i };
                if pos < 0 || pos > count as i64 {
                    return Err(out_of_range(i));
                }
                let pos = pos as usize;
                if pos == count {
                    self.insert_item(count, value)
                } else {
                    self.replace_item(pos, value)
                }
            }
            SeqIndex::Range(r) => {
                let (loc, len) = r.resolve(count).ok_or_else(|| out_of_range(r.start))?;
                let items = self.splat(value)?;
                self.splice(loc, len, items)
            }
            SeqIndex::Span { start, len } => {
                if len < 0 {
                    return Err(Error::NegativeLength {
                        receiver: self.receiver(),
                        length: len,
                    });
                }
                let (loc, len) = resolve_span(start, len, count).ok_or_else(|| out_of_range(start))?;
                let items = self.splat(value)?;
                self.splice(loc, len, items)
            }
        }
    }

    #[doc(hidden)]
    fn splat(&self, value: Value) -> Result<Vec<Value>> {
        Ok(match self.nested(&value)? {
            Some(nested) => nested.items,
            None => vec![value],
        })
    }

    /// Replaces `len` elements at `loc` with `items`.
    fn splice(&self, loc: usize, len: usize, items: Vec<Value>) -> Result<()> {
        let overlap = len.min(items.len());
        let mut items = items.into_iter();
        for i in 0..overlap {
            if let Some(value) = items.next() {
                self.replace_item(loc + i, value)?;
            }
        }
        for _ in overlap..len {
            self.remove_item(loc + overlap)?;
        }
        for (j, value) in items.enumerate() {
            self.insert_item(loc + overlap + j, value)?;
        }
        Ok(())
    }

    fn push(&self, values: impl IntoIterator<Item = Value>) -> Result<()> {
        for value in values {
            let count = self.count()?;
            self.insert_item(count, value)?;
        }
        Ok(())
    }

    fn concat(&self, values: &[Value]) -> Result<()> {
        self.push(values.iter().cloned())
    }

    fn pop(&self) -> Result<Option<Value>> {
        let count = self.count()?;
        if count == 0 {
            return Ok(None);
        }
        let value = self.item(count - 1)?;
        self.remove_item(count - 1)?;
        Ok(Some(value))
    }

    fn pop_n(&self, n: usize) -> Result<Vec<Value>> {
        let count = self.count()?;
        let n = n.min(count);
        let taken = self.items_in(count - n, n)?;
        for i in (count - n..count).rev() {
            self.remove_item(i)?;
        }
        Ok(taken)
    }

    fn shift(&self) -> Result<Option<Value>> {
        if self.count()? == 0 {
            return Ok(None);
        }
        let value = self.item(0)?;
        self.remove_item(0)?;
        Ok(Some(value))
    }

    fn shift_n(&self, n: usize) -> Result<Vec<Value>> {
        let n = n.min(self.count()?);
        let taken = self.items_in(0, n)?;
        for _ in 0..n {
            self.remove_item(0)?;
        }
        Ok(taken)
    }

    fn unshift(&self, values: Vec<Value>) -> Result<()> {
        for (i, value) in values.into_iter().enumerate() {
            self.insert_item(i, value)?;
        }
        Ok(())
    }

    /// Inserts `values` before `index`; a negative index counts from the end
    /// and inserts after that element.
    fn insert(&self, index: i64, values: Vec<Value>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let count = self.count()?;
        let pos = if index < 0 { index + count as i64 + 1 } else { index };
        if pos < 0 || pos > count as i64 {
            return Err(Error::IndexOutOfRange {
                receiver: self.receiver(),
                index,
                len: count,
            });
        }
        for (j, value) in values.into_iter().enumerate() {
            self.insert_item(pos as usize + j, value)?;
        }
        Ok(())
    }

    /// Removes and returns what `get(index)` would return.
    fn slice_bang(&self, index: impl Into<SeqIndex>) -> Result<Option<Value>> {
        let count = self.count()?;
        match index.into() {
            SeqIndex::At(i) => match normalize(i, count) {
                Some(pos) => {
                    let value = self.item(pos)?;
                    self.remove_item(pos)?;
                    Ok(Some(value))
                }
                None => Ok(None),
            },
            other => match resolve(other, count) {
                Some((loc, len)) => {
                    let removed = self.items_in(loc, len)?;
                    for _ in 0..len {
                        self.remove_item(loc)?;
                    }
                    Ok(Some(Value::Array(removed)))
                }
                None => Ok(None),
            },
        }
    }

    fn delete_at(&self, index: i64) -> Result<Option<Value>> {
        self.slice_bang(SeqIndex::At(index))
    }

    /// Removes every element equal to `value`; returns the last one removed.
    fn delete(&self, value: &Value) -> Result<Option<Value>> {
        let mut found = None;
        let mut i = self.count()?;
        while i > 0 {
            i -= 1;
            let item = self.item(i)?;
            if self.same(&item, value)? {
                self.remove_item(i)?;
                found.get_or_insert(item);
            }
        }
        Ok(found)
    }

    /// Removes every element matching `pred`. Returns `true` if anything was
    /// removed.
    fn delete_if(&self, mut pred: impl FnMut(&Value) -> Result<bool>) -> Result<bool> {
        let mut removed = false;
        let mut i = 0;
        while i < self.count()? {
            if pred(&self.item(i)?)? {
                self.remove_item(i)?;
                removed = true;
            } else {
                i += 1;
            }
        }
        Ok(removed)
    }

    /// Keeps only elements matching `pred`. Returns `true` if anything was
    /// removed.
    fn keep_if(&self, mut pred: impl FnMut(&Value) -> Result<bool>) -> Result<bool> {
        self.delete_if(|v| Ok(!pred(v)?))
    }

    fn clear(&self) -> Result<()> {
        if self.count()? == 0 {
            return Ok(());
        }
        self.replace_items(Vec::new())
    }

    fn replace(&self, items: Vec<Value>) -> Result<()> {
        self.replace_items(items)
    }

    fn compact_bang(&self) -> Result<bool> {
        self.delete_if(|v| Ok(v.is_nil()))
    }

    /// Replaces each element with `f(element)`.
    fn map_bang(&self, mut f: impl FnMut(&Value) -> Result<Value>) -> Result<()> {
        let mut i = 0;
        while i < self.count()? {
            let old = self.item(i)?;
            let new = f(&old)?;
            if new != old {
                self.replace_item(i, new)?;
            }
            i += 1;
        }
        Ok(())
    }

    fn reverse_bang(&self) -> Result<()> {
        if self.count()? > 1 {
            self.replace_items(self.reverse()?)?;
        }
        Ok(())
    }

    fn sort_bang(&self) -> Result<()> {
        let sorted = self.sort()?;
        if sorted != self.to_vec()? {
            self.replace_items(sorted)?;
        }
        Ok(())
    }

    /// Removes duplicates; `true` if anything was removed.
    fn uniq_bang(&self) -> Result<bool> {
        let unique = self.uniq()?;
        if unique.len() == self.count()? {
            return Ok(false);
        }
        self.replace_items(unique)?;
        Ok(true)
    }

    /// Flattens in place; `true` if anything was expanded.
    fn flatten_bang(&self, depth: Option<usize>) -> Result<bool> {
        let flat = self.flatten(depth)?;
        let mut nested = false;
        for value in self.to_vec()? {
            if self.nested(&value)?.is_some() {
                nested = true;
                break;
            }
        }
        if !nested || depth == Some(0) {
            return Ok(false);
        }
        self.replace_items(flat)?;
        Ok(true)
    }

    /// Overwrites the addressed elements with `value`, growing the sequence
    /// when the region extends past the end. `None` fills everything.
    ///
    /// A region that starts past the end pads the gap with `Value::Nil`. A
    /// bare start fills up to the current end only.
    fn fill(&self, value: Value, region: Option<SeqIndex>) -> Result<()> {
        let count = self.count()? as i64;
        let from = |start: i64| if start < 0 { start.saturating_add(count) } else { start };
        let (loc, end) = match region {
            None => (0, count),
            Some(SeqIndex::At(start)) => (from(start).max(0), count),
            Some(SeqIndex::Span { start, len }) => {
                let loc = from(start).max(0);
                (loc, loc.saturating_add(len.max(0)))
            }
            Some(SeqIndex::Range(r)) => {
                let loc = from(r.start);
                if loc < 0 {
                    return Err(Error::IndexOutOfRange {
                        receiver: self.receiver(),
                        index: r.start,
                        len: count as usize,
                    });
                }
                let end = match r.end {
                    None => count,
                    Some(end) if r.exclusive => from(end),
                    Some(end) => from(end).saturating_add(1),
                };
                (loc, end)
            }
        };
        if end <= loc {
            return Ok(());
        }
        if end as u64 > MAX_LEN as u64 {
            return Err(Error::InvalidArgument {
                receiver: self.receiver(),
                operation: "fill".to_string(),
                reason: format!("argument too big: {end}"),
            });
        }
        let (loc, end) = (loc as usize, end as usize);
        for i in self.count()?..loc {
            self.insert_item(i, Value::Nil)?;
        }
        for i in loc..end {
            if i < self.count()? {
                self.replace_item(i, value.clone())?;
            } else {
                self.insert_item(i, value.clone())?;
            }
        }
        Ok(())
    }
}

/// Largest length a sequence may be grown to.
const MAX_LEN: usize = isize::MAX as usize / std::mem::size_of::<Value>();

fn compare_scalars(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn flatten_into<S: SequenceLike + ?Sized>(
    seq: &S,
    items: &[Value],
    depth: Option<usize>,
    stack: &mut Vec<ObjectId>,
    out: &mut Vec<Value>,
) -> Result<()> {
    for item in items {
        let nested = match depth {
            Some(0) => None,
            _ => seq.nested(item)?,
        };
        let Some(nested) = nested else {
            out.push(item.clone());
            continue;
        };
        if let Some(id) = nested.id {
            if stack.contains(&id) {
                return Err(Error::CyclicStructure {
                    receiver: seq.receiver(),
                });
            }
            stack.push(id);
        }
        flatten_into(seq, &nested.items, depth.map(|d| d - 1), stack, out)?;
        if nested.id.is_some() {
            stack.pop();
        }
    }
    Ok(())
}

fn join_into<S: SequenceLike + ?Sized>(
    seq: &S,
    items: &[Value],
    separator: &str,
    stack: &mut Vec<ObjectId>,
    out: &mut String,
) -> Result<()> {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        match seq.nested(item)? {
            Some(nested) => {
                if nested.id.is_some_and(|id| stack.contains(&id)) {
                    out.push_str("[...]");
                    continue;
                }
                if let Some(id) = nested.id {
                    stack.push(id);
                }
                join_into(seq, &nested.items, separator, stack, out)?;
                if nested.id.is_some() {
                    stack.pop();
                }
            }
            None => out.push_str(&seq.describe(item)?),
        }
    }
    Ok(())
}

// ============================================================================
// Foreign arrays
// ============================================================================

/// [`SequenceLike`] over an `NSArray`-family object.
pub struct ArrayAdapter<'b> {
    bridge: &'b Bridge,
    object: ObjectRef,
    observer: Option<Observer>,
}

impl fmt::Debug for ArrayAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayAdapter")
            .field("object", &self.object)
            .field("observer", &self.observer)
            .finish()
    }
}

impl<'b> ArrayAdapter<'b> {
    pub(crate) fn new(bridge: &'b Bridge, object: ObjectRef) -> Self {
        ArrayAdapter {
            bridge,
            object,
            observer: None,
        }
    }

    pub(crate) fn observed(bridge: &'b Bridge, object: ObjectRef, observer: Observer) -> Self {
        ArrayAdapter {
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

impl SequenceLike for ArrayAdapter<'_> {
    fn receiver(&self) -> String {
        self.bridge.class_name_of(&self.object)
    }

    fn count(&self) -> Result<usize> {
        let n = int_result(&self.receiver(), "count", self.send("count", &[])?)?;
        Ok(n.max(0) as usize)
    }

    fn item(&self, index: usize) -> Result<Value> {
        self.send("objectAtIndex:", &[Value::from(index)])
    }

    fn replace_item(&self, index: usize, value: Value) -> Result<()> {
        self.mutate("replaceObjectAtIndex:withObject:", &[Value::from(index), value])
    }

    fn insert_item(&self, index: usize, value: Value) -> Result<()> {
        self.mutate("insertObject:atIndex:", &[value, Value::from(index)])
    }

    fn remove_item(&self, index: usize) -> Result<()> {
        self.mutate("removeObjectAtIndex:", &[Value::from(index)])
    }

    fn replace_items(&self, items: Vec<Value>) -> Result<()> {
        self.mutate("setArray:", &[Value::Array(items)])
    }

    fn same(&self, a: &Value, b: &Value) -> Result<bool> {
        self.bridge.values_equal(a, b)
    }

    fn nested(&self, value: &Value) -> Result<Option<Nested>> {
        match value {
            Value::Array(items) => Ok(Some(Nested {
                id: None,
                items: items.clone(),
            })),
            Value::Object(object) if self.bridge.family_of(object)? == Some(super::Family::Sequence) => {
                Ok(Some(Nested {
                    id: Some(object.id()),
                    items: ArrayAdapter::new(self.bridge, object.clone()).to_vec()?,
                }))
            }
            _ => Ok(None),
        }
    }

    fn describe(&self, value: &Value) -> Result<String> {
        match value {
            Value::Object(object) => match self.bridge.family_of(object)? {
                Some(super::Family::Text) => Ok(self.bridge.invoke(object, "UTF8String", &[])?.to_string()),
                _ => Ok(self.bridge.invoke(object, "description", &[])?.to_string()),
            },
            other => Ok(other.to_string()),
        }
    }

    fn identity(&self) -> Option<ObjectId> {
        Some(self.object.id())
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
    "[]", "slice", "[]=", "at", "fetch", "first", "last", "push", "<<", "append", "pop", "shift",
    "unshift", "prepend", "insert", "slice!", "delete", "delete_at", "delete_if", "reject!",
    "keep_if", "select!", "clear", "concat", "compact", "compact!", "include?", "index", "rindex",
    "each", "each_with_index", "map", "collect", "map!", "collect!", "join", "flatten",
    "flatten!", "&", "|", "-", "+", "*", "reverse", "reverse!", "sort", "sort!", "uniq", "uniq!",
    "values_at", "assoc", "rassoc", "transpose", "fill", "replace", "size", "length", "empty?",
    "to_a", "==",
];

fn items_arg<S: SequenceLike + ?Sized>(seq: &S, value: &Value) -> Result<Vec<Value>> {
    match seq.nested(value)? {
        Some(nested) => Ok(nested.items),
        None => Err(wrong_type(&seq.receiver(), "array", value)),
    }
}

fn opt(value: Option<Value>) -> Value {
    value.unwrap_or_default()
}

fn depth_arg(receiver: &str, args: &[Value]) -> Result<Option<usize>> {
    match args.first() {
        None => Ok(None),
        Some(Value::Int(n)) if *n < 0 => Ok(None),
        Some(value) => count_arg(receiver, value).map(Some),
    }
}

/// Runs one contract call against a sequence.
pub fn dispatch<S: SequenceLike>(seq: &S, call: &Call) -> Result<Value> {
    let receiver = seq.receiver();
    let args = call.args.as_slice();
    let this = || seq.to_value();
    let nil_unless = |changed: bool| if changed { seq.to_value() } else { Value::Nil };

    match call.name.as_str() {
        "[]" | "slice" => Ok(opt(seq.get(SeqIndex::from_args(&receiver, &call.name, args)?)?)),
        "[]=" => {
            call.expect_args(&receiver, 2, 3)?;
            let (value, index_args) = args.split_last().unwrap_or((&Value::Nil, &[]));
            seq.set(SeqIndex::from_args(&receiver, &call.name, index_args)?, value.clone())?;
            Ok(value.clone())
        }
        "at" => {
            call.expect_args(&receiver, 1, 1)?;
            let index = args[0].as_int().ok_or_else(|| wrong_type(&receiver, "integer", &args[0]))?;
            Ok(opt(seq.at(index)?))
        }
        "fetch" => {
            call.expect_args(&receiver, 1, 2)?;
            let index = args[0].as_int().ok_or_else(|| wrong_type(&receiver, "integer", &args[0]))?;
            if let Some(default) = args.get(1) {
                seq.fetch_or(index, default.clone())
            } else if let Some(block) = &call.block {
                seq.fetch_or_else(index, |i| block(&[Value::Int(i)]))
            } else {
                seq.fetch(index)
            }
        }
        "first" | "last" => {
            call.expect_args(&receiver, 0, 1)?;
            let first = call.name == "first";
            match args.first() {
                None => Ok(opt(if first { seq.first()? } else { seq.last()? })),
                Some(n) => {
                    let n = count_arg(&receiver, n)?;
                    Ok(Value::Array(if first { seq.first_n(n)? } else { seq.last_n(n)? }))
                }
            }
        }
        "push" | "append" => {
            seq.push(args.iter().cloned())?;
            Ok(this())
        }
        "<<" => {
            call.expect_args(&receiver, 1, 1)?;
            seq.push([args[0].clone()])?;
            Ok(this())
        }
        "pop" | "shift" => {
            call.expect_args(&receiver, 0, 1)?;
            let pop = call.name == "pop";
            match args.first() {
                None => Ok(opt(if pop { seq.pop()? } else { seq.shift()? })),
                Some(n) => {
                    let n = count_arg(&receiver, n)?;
                    Ok(Value::Array(if pop { seq.pop_n(n)? } else { seq.shift_n(n)? }))
                }
            }
        }
        "unshift" | "prepend" => {
            seq.unshift(args.to_vec())?;
            Ok(this())
        }
        "insert" => {
            call.expect_args(&receiver, 1, usize::MAX)?;
            let index = args[0].as_int().ok_or_else(|| wrong_type(&receiver, "integer", &args[0]))?;
            seq.insert(index, args[1..].to_vec())?;
            Ok(this())
        }
        "slice!" => Ok(opt(seq.slice_bang(SeqIndex::from_args(&receiver, &call.name, args)?)?)),
        "delete" => {
            call.expect_args(&receiver, 1, 1)?;
            match seq.delete(&args[0])? {
                Some(found) => Ok(found),
                None => match &call.block {
                    Some(block) => block(&args[..1]),
                    None => Ok(Value::Nil),
                },
            }
        }
        "delete_at" => {
            call.expect_args(&receiver, 1, 1)?;
            let index = args[0].as_int().ok_or_else(|| wrong_type(&receiver, "integer", &args[0]))?;
            Ok(opt(seq.delete_at(index)?))
        }
        "delete_if" | "reject!" => {
            call.expect_args(&receiver, 0, 0)?;
            call.require_block(&receiver)?;
            let removed = seq.delete_if(|v| block_truthy(call, &receiver, std::slice::from_ref(v)))?;
            Ok(nil_unless(removed))
        }
        "keep_if" | "select!" => {
            call.expect_args(&receiver, 0, 0)?;
            call.require_block(&receiver)?;
            let removed = seq.keep_if(|v| block_truthy(call, &receiver, std::slice::from_ref(v)))?;
            Ok(nil_unless(removed))
        }
        "clear" => {
            call.expect_args(&receiver, 0, 0)?;
            seq.clear()?;
            Ok(this())
        }
        "concat" => {
            for arg in args {
                seq.concat(&items_arg(seq, arg)?)?;
            }
            Ok(this())
        }
        "compact" => Ok(Value::Array(seq.compact()?)),
        "compact!" => Ok(nil_unless(seq.compact_bang()?)),
        "include?" => {
            call.expect_args(&receiver, 1, 1)?;
            Ok(Value::Bool(seq.includes(&args[0])?))
        }
        "index" | "rindex" => {
            call.expect_args(&receiver, 0, 1)?;
            let forward = call.name == "index";
            let found = match args.first() {
                Some(value) if forward => seq.index_of(value)?,
                Some(value) => seq.rindex(value)?,
                None => {
                    let items = seq.to_vec()?;
                    let mut hit = None;
                    let order: Box<dyn Iterator<Item = usize>> = if forward {
                        Box::new(0..items.len())
                    } else {
                        Box::new((0..items.len()).rev())
                    };
                    for i in order {
                        if block_truthy(call, &receiver, std::slice::from_ref(&items[i]))? {
                            hit = Some(i);
                            break;
                        }
                    }
                    hit
                }
            };
            Ok(found.map_or(Value::Nil, Value::from))
        }
        "each" | "each_with_index" => {
            call.expect_args(&receiver, 0, 0)?;
            let block = call.require_block(&receiver)?;
            let with_index = call.name == "each_with_index";
            seq.each(|i, v| {
                if with_index {
                    block(&[v.clone(), Value::from(i)])?;
                } else {
                    block(std::slice::from_ref(v))?;
                }
                Ok(())
            })?;
            Ok(this())
        }
        "map" | "collect" => {
            let block = call.require_block(&receiver)?;
            Ok(Value::Array(seq.map(|v| block(std::slice::from_ref(v)))?))
        }
        "map!" | "collect!" => {
            let block = call.require_block(&receiver)?;
            seq.map_bang(|v| block(std::slice::from_ref(v)))?;
            Ok(this())
        }
        "join" => {
            call.expect_args(&receiver, 0, 1)?;
            let separator = match args.first() {
                None | Some(Value::Nil) => String::new(),
                Some(Value::Str(s)) => s.clone(),
                Some(other) => return Err(wrong_type(&receiver, "string", other)),
            };
            Ok(Value::Str(seq.join(&separator)?))
        }
        "flatten" => Ok(Value::Array(seq.flatten(depth_arg(&receiver, args)?)?)),
        "flatten!" => Ok(nil_unless(seq.flatten_bang(depth_arg(&receiver, args)?)?)),
        "&" | "|" | "-" | "+" => {
            call.expect_args(&receiver, 1, 1)?;
            let other = items_arg(seq, &args[0])?;
            Ok(Value::Array(match call.name.as_str() {
                "&" => seq.intersection(&other)?,
                "|" => seq.union(&other)?,
                "-" => seq.difference(&other)?,
                _ => seq.plus(&other)?,
            }))
        }
        "*" => {
            call.expect_args(&receiver, 1, 1)?;
            match &args[0] {
                Value::Str(separator) => Ok(Value::Str(seq.join(separator)?)),
                other => Ok(Value::Array(seq.repeat(count_arg(&receiver, other)?)?)),
            }
        }
        "reverse" => Ok(Value::Array(seq.reverse()?)),
        "reverse!" => {
            seq.reverse_bang()?;
            Ok(this())
        }
        "sort" | "sort!" => {
            let sorted = match &call.block {
                Some(block) => seq.sort_by(|a, b| {
                    let order = block(&[a.clone(), b.clone()])?;
                    let n = order.as_int().ok_or_else(|| wrong_type(&receiver, "integer", &order))?;
                    Ok(n.cmp(&0))
                })?,
                None => seq.sort()?,
            };
            if call.name == "sort" {
                return Ok(Value::Array(sorted));
            }
            if sorted != seq.to_vec()? {
                seq.replace(sorted)?;
            }
            Ok(this())
        }
        "uniq" => Ok(Value::Array(seq.uniq()?)),
        "uniq!" => Ok(nil_unless(seq.uniq_bang()?)),
        "values_at" => {
            let mut indexes = Vec::with_capacity(args.len());
            for arg in args {
                indexes.push(arg.as_int().ok_or_else(|| wrong_type(&receiver, "integer", arg))?);
            }
            Ok(Value::Array(seq.values_at(&indexes)?))
        }
        "assoc" | "rassoc" => {
            call.expect_args(&receiver, 1, 1)?;
            let found = if call.name == "assoc" {
                seq.assoc(&args[0])?
            } else {
                seq.rassoc(&args[0])?
            };
            Ok(opt(found))
        }
        "transpose" => Ok(Value::Array(seq.transpose()?)),
        "fill" => {
            call.expect_args(&receiver, 1, 3)?;
            let region = match &args[1..] {
                [] => None,
                [Value::Nil] => None,
                rest => Some(SeqIndex::from_args(&receiver, &call.name, rest)?),
            };
            seq.fill(args[0].clone(), region)?;
            Ok(this())
        }
        "replace" => {
            call.expect_args(&receiver, 1, 1)?;
            seq.replace(items_arg(seq, &args[0])?)?;
            Ok(this())
        }
        "size" | "length" => Ok(Value::from(seq.len()?)),
        "empty?" => Ok(Value::Bool(seq.is_empty()?)),
        "to_a" => Ok(Value::Array(seq.to_vec()?)),
        "==" => {
            call.expect_args(&receiver, 1, 1)?;
            match seq.nested(&args[0])? {
                Some(other) => Ok(Value::Bool(seq.eq_items(&other.items)?)),
                None => Ok(Value::Bool(false)),
            }
        }
        other => Err(Error::NoMethod {
            class: receiver,
            name: other.to_string(),
            tried: vec!["collection adapter"],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::LocalRuntime;
    use crate::values;
    use std::sync::Arc;

    fn ints(items: &[i64]) -> Vec<Value> {
        items.iter().map(|&i| Value::Int(i)).collect()
    }

    fn setup(items: &[i64]) -> (Arc<LocalRuntime>, Bridge, ObjectRef) {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let obj = rt.new_array(ints(items), true);
        (rt, bridge, obj)
    }

    #[test]
    fn test_negative_and_range_reads() {
        let (_rt, bridge, obj) = setup(&[10, 20, 30, 40, 50]);
        let seq = ArrayAdapter::new(&bridge, obj);
        assert_eq!(seq.get(-1).unwrap(), Some(Value::Int(50)));
        assert_eq!(seq.get(5).unwrap(), None);
        assert_eq!(seq.get(1..=2).unwrap(), Some(values![20, 30]));
        assert_eq!(seq.get((3, 10)).unwrap(), Some(values![40, 50]));
        assert_eq!(seq.get((6, 1)).unwrap(), None);
    }

    #[test]
    fn test_extreme_range_reads() {
        let (_rt, bridge, obj) = setup(&[10, 20, 30]);
        let seq = ArrayAdapter::new(&bridge, obj);
        assert_eq!(seq.get(0..=i64::MAX).unwrap(), Some(values![10, 20, 30]));
        assert_eq!(seq.get(1..i64::MAX).unwrap(), Some(values![20, 30]));
        assert_eq!(seq.get(0..i64::MIN).unwrap(), Some(Value::Array(vec![])));
        assert_eq!(seq.get(i64::MIN..=0).unwrap(), None);
        assert_eq!(seq.get(4..=5).unwrap(), None);
    }

    #[test]
    fn test_repeat() {
        let (_rt, bridge, obj) = setup(&[1, 2]);
        let seq = ArrayAdapter::new(&bridge, obj);
        assert_eq!(seq.repeat(3).unwrap(), ints(&[1, 2, 1, 2, 1, 2]));
        assert!(seq.repeat(0).unwrap().is_empty());
        assert!(matches!(seq.repeat(usize::MAX), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_fetch_fails_without_default() {
        let (_rt, bridge, obj) = setup(&[1]);
        let seq = ArrayAdapter::new(&bridge, obj);
        assert_eq!(
            seq.fetch(3).unwrap_err(),
            Error::IndexOutOfRange {
                receiver: "NSMutableArray".into(),
                index: 3,
                len: 1
            }
        );
        assert_eq!(seq.fetch_or(3, Value::Int(0)).unwrap(), Value::Int(0));
        assert_eq!(seq.fetch_or_else(3, |i| Ok(Value::Int(i * 2))).unwrap(), Value::Int(6));
    }

    #[test]
    fn test_assignment_grows_replaces_or_fails() {
        let (_rt, bridge, obj) = setup(&[1, 2, 3]);
        let seq = ArrayAdapter::new(&bridge, obj);
        seq.set(3, Value::Int(4)).unwrap();
        seq.set(-4, Value::Int(0)).unwrap();
        assert_eq!(seq.to_vec().unwrap(), ints(&[0, 2, 3, 4]));
        assert!(matches!(seq.set(6, Value::Int(9)), Err(Error::IndexOutOfRange { index: 6, .. })));
        assert!(matches!(seq.set(-5, Value::Int(9)), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_range_assignment_splices() {
        let (_rt, bridge, obj) = setup(&[1, 2, 3, 4, 5]);
        let seq = ArrayAdapter::new(&bridge, obj);
        seq.set(1..=2, values![7, 8, 9]).unwrap();
        assert_eq!(seq.to_vec().unwrap(), ints(&[1, 7, 8, 9, 4, 5]));
        seq.set((0, 3), Value::Int(0)).unwrap();
        assert_eq!(seq.to_vec().unwrap(), ints(&[0, 9, 4, 5]));
        assert_eq!(
            seq.set((0, -1), Value::Int(0)).unwrap_err(),
            Error::NegativeLength {
                receiver: "NSMutableArray".into(),
                length: -1
            }
        );
    }

    #[test]
    fn test_slice_bang_span() {
        let (_rt, bridge, obj) = setup(&[10, 20, 30, 40, 50]);
        let seq = ArrayAdapter::new(&bridge, obj);
        assert_eq!(seq.slice_bang((1, 2)).unwrap(), Some(values![20, 30]));
        assert_eq!(seq.to_vec().unwrap(), ints(&[10, 40, 50]));
        assert_eq!(seq.slice_bang(7).unwrap(), None);
    }

    #[test]
    fn test_set_operations_use_foreign_equality() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let a = Value::Object(rt.new_string("a", false));
        let obj = rt.new_array(vec![a, "b".into(), "a".into()], true);
        let seq = ArrayAdapter::new(&bridge, obj);

        let other = vec![Value::from("a"), Value::from("c")];
        let both = seq.intersection(&other).unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(seq.union(&other).unwrap().len(), 3);
        assert_eq!(seq.difference(&other).unwrap(), vec![Value::from("b")]);
    }

    #[test]
    fn test_flatten_detects_cycles() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let inner = rt.new_array(ints(&[2, 3]), true);
        let outer = rt.new_array(vec![Value::Int(1), Value::Object(inner.clone())], true);
        let seq = ArrayAdapter::new(&bridge, outer.clone());
        assert_eq!(seq.flatten(None).unwrap(), ints(&[1, 2, 3]));

        ArrayAdapter::new(&bridge, inner.clone()).push([Value::Object(outer.clone())]).unwrap();
        assert!(matches!(seq.flatten(None), Err(Error::CyclicStructure { .. })));
        assert_eq!(seq.join(",").unwrap(), "1,2,3,[...]");

        // Break the cycle so both arrays can be freed.
        ArrayAdapter::new(&bridge, inner).pop().unwrap();
    }

    #[test]
    fn test_delete_if_reports_removal() {
        let (_rt, bridge, obj) = setup(&[1, 2, 3, 4, 5]);
        let seq = ArrayAdapter::new(&bridge, obj);
        assert!(seq.delete_if(|v| Ok(v.as_int() > Some(3))).unwrap());
        assert!(!seq.delete_if(|v| Ok(v.as_int() > Some(3))).unwrap());
        assert_eq!(seq.to_vec().unwrap(), ints(&[1, 2, 3]));
    }

    #[test]
    fn test_sort_and_uniq() {
        let (rt, bridge, obj) = setup(&[3, 1, 2, 3, 1]);
        let seq = ArrayAdapter::new(&bridge, obj);
        assert_eq!(seq.sort().unwrap(), ints(&[1, 1, 2, 3, 3]));
        assert!(seq.uniq_bang().unwrap());
        assert_eq!(seq.to_vec().unwrap(), ints(&[3, 1, 2]));
        assert!(!seq.uniq_bang().unwrap());

        let mixed = ArrayAdapter::new(&bridge, rt.new_array(vec![1.into(), "a".into()], false));
        assert!(matches!(mixed.sort(), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn test_insert_fill_and_transpose() {
        let (rt, bridge, obj) = setup(&[1, 2]);
        let seq = ArrayAdapter::new(&bridge, obj);
        seq.insert(-1, ints(&[3])).unwrap();
        seq.insert(0, ints(&[0])).unwrap();
        assert_eq!(seq.to_vec().unwrap(), ints(&[0, 1, 2, 3]));
        seq.fill(Value::Int(9), Some(SeqIndex::Span { start: 2, len: 3 })).unwrap();
        assert_eq!(seq.to_vec().unwrap(), ints(&[0, 1, 9, 9, 9]));

        seq.fill(Value::Int(7), Some(SeqIndex::At(1))).unwrap();
        assert_eq!(seq.to_vec().unwrap(), ints(&[0, 7, 7, 7, 7]));
        seq.fill(Value::Int(5), Some(SeqIndex::At(8))).unwrap();
        assert_eq!(seq.count().unwrap(), 5);

        let grid = ArrayAdapter::new(&bridge, rt.new_array(vec![values![1, 2], values![3, 4]], false));
        assert_eq!(grid.transpose().unwrap(), vec![values![1, 3], values![2, 4]]);
    }

    #[test]
    fn test_fill_past_the_end_pads_with_nil() {
        let (_rt, bridge, obj) = setup(&[1, 2]);
        let seq = ArrayAdapter::new(&bridge, obj);
        seq.fill(Value::Int(0), Some(SeqIndex::Span { start: 4, len: 2 })).unwrap();
        assert_eq!(
            seq.to_vec().unwrap(),
            vec![Value::Int(1), Value::Int(2), Value::Nil, Value::Nil, Value::Int(0), Value::Int(0)]
        );

        let (_rt, bridge, obj) = setup(&[1]);
        let seq = ArrayAdapter::new(&bridge, obj);
        seq.fill(Value::Int(3), Some(SeqIndex::Range((2..4).into()))).unwrap();
        assert_eq!(seq.to_vec().unwrap(), vec![Value::Int(1), Value::Nil, Value::Int(3), Value::Int(3)]);

        assert!(matches!(
            seq.fill(Value::Nil, Some(SeqIndex::Span { start: 0, len: i64::MAX })),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            seq.fill(Value::Nil, Some(SeqIndex::Range((-9..=0).into()))),
            Err(Error::IndexOutOfRange { .. })
        ));
        assert_eq!(seq.count().unwrap(), 4);
    }

    #[test]
    fn test_immutable_array_surfaces_foreign_failure() {
        let rt = LocalRuntime::new();
        let bridge = Bridge::new(rt.clone());
        let seq = ArrayAdapter::new(&bridge, rt.new_array(ints(&[1]), false));
        let err = seq.push([Value::Int(2)]).unwrap_err();
        assert!(matches!(
            err.foreign_source(),
            Some(crate::error::ForeignError::Immutable { .. })
        ));
        assert_eq!(seq.to_vec().unwrap(), ints(&[1]));
    }

    #[test]
    fn test_dispatch_validates_before_calling() {
        let (_rt, bridge, obj) = setup(&[1, 2]);
        let seq = ArrayAdapter::new(&bridge, obj);
        let err = dispatch(&seq, &Call::new("[]", vec!["x".into()])).unwrap_err();
        assert!(matches!(err, Error::InvalidIndexType { .. }));
        let err = dispatch(&seq, &Call::new("at", vec![])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentCount { got: 0, .. }));
        assert_eq!(
            dispatch(&seq, &Call::new("[]", vec![Value::Range((0..1).into())])).unwrap(),
            values![1]
        );
    }

    #[test]
    fn test_dispatch_with_blocks() {
        let (_rt, bridge, obj) = setup(&[1, 2, 3, 4]);
        let seq = ArrayAdapter::new(&bridge, obj.clone());
        let evens = Call::new("delete_if", vec![]).with_block(|args| Ok(Value::Bool(args[0].as_int().unwrap() % 2 == 0)));
        assert_eq!(dispatch(&seq, &evens).unwrap(), Value::Object(obj));
        assert_eq!(dispatch(&seq, &evens).unwrap(), Value::Nil);

        let doubled = Call::new("map", vec![]).with_block(|args| Ok(Value::Int(args[0].as_int().unwrap() * 2)));
        assert_eq!(dispatch(&seq, &doubled).unwrap(), values![2, 6]);
    }
}
