//! Text behaviour over foreign strings.
//!
//! Reads take a fresh snapshot of the foreign contents; writes go back
//! through a single `setString:` and only when the text actually changed.
//! Mutating operations on an immutable string fail up front with
//! [`Error::ImmutableReceiver`], so the foreign side never sees them.

use super::index::{SeqIndex, normalize, resolve};
use super::{Observer, touch, wrong_type};
use crate::bridge::Bridge;
use crate::bridge::forward::Call;
use crate::error::{Error, Result};
use crate::value::{ObjectRef, Value};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

/// Host text behaviour over read, write and a mutability check.
pub trait TextLike {
    fn receiver(&self) -> String;
    /// The current contents.
    fn read(&self) -> Result<String>;
    /// Replaces the contents.
    fn write(&self, text: &str) -> Result<()>;
    fn is_mutable(&self) -> Result<bool>;
    /// Text of a string-like argument, `None` for anything else.
    fn text_in(&self, value: &Value) -> Result<Option<String>>;
    fn to_value(&self) -> Value;

    /// Length in characters.
    fn length(&self) -> Result<usize> {
        Ok(self.read()?.chars().count())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Applies `f` to a snapshot and writes the result back if it differs.
    /// Returns `true` if the text changed.
    ///
    /// # Errors
    ///
    /// [`Error::ImmutableReceiver`] before anything is read or written.
    fn mutate(&self, operation: &str, f: impl FnOnce(&str) -> Result<String>) -> Result<bool> {
        if !self.is_mutable()? {
            return Err(Error::ImmutableReceiver {
                receiver: self.receiver(),
                operation: operation.to_string(),
            });
        }
        let before = self.read()?;
        let after = f(&before)?;
        if after == before {
            return Ok(false);
        }
        self.write(&after)?;
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Transformations
    // ------------------------------------------------------------------------

    fn upcase(&self) -> Result<String> {
        Ok(self.read()?.to_uppercase())
    }

    fn downcase(&self) -> Result<String> {
        Ok(self.read()?.to_lowercase())
    }

    /// First character upper-cased, the rest lower-cased.
    fn capitalize(&self) -> Result<String> {
        Ok(capitalize(&self.read()?))
    }

    fn swapcase(&self) -> Result<String> {
        Ok(swapcase(&self.read()?))
    }

    fn reverse(&self) -> Result<String> {
        Ok(self.read()?.chars().rev().collect())
    }

    fn strip(&self) -> Result<String> {
        Ok(self.read()?.trim().to_string())
    }

    fn lstrip(&self) -> Result<String> {
        Ok(self.read()?.trim_start().to_string())
    }

    fn rstrip(&self) -> Result<String> {
        Ok(self.read()?.trim_end().to_string())
    }

    /// The first match of `pattern` replaced. `\1`-style group references
    /// in `replacement` are expanded.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for a pattern that doesn't compile.
    fn sub(&self, pattern: &str, replacement: &str) -> Result<String> {
        let re = compile(&self.receiver(), "sub", pattern)?;
        Ok(re.replacen(&self.read()?, 1, expand(replacement).as_str()).into_owned())
    }

    /// Every match of `pattern` replaced.
    fn gsub(&self, pattern: &str, replacement: &str) -> Result<String> {
        let re = compile(&self.receiver(), "gsub", pattern)?;
        Ok(re.replace_all(&self.read()?, expand(replacement).as_str()).into_owned())
    }

    /// Every match replaced by the result of `f`.
    fn gsub_with(&self, pattern: &str, mut f: impl FnMut(&str) -> Result<String>) -> Result<String> {
        let re = compile(&self.receiver(), "gsub", pattern)?;
        let text = self.read()?;
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in re.find_iter(&text) {
            out.push_str(&text[last..m.start()]);
            out.push_str(&f(m.as_str())?);
            last = m.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    fn plus(&self, other: &str) -> Result<String> {
        let mut text = self.read()?;
        text.push_str(other);
        Ok(text)
    }

    fn repeat(&self, times: usize) -> Result<String> {
        let text = self.read()?;
        if text.len().checked_mul(times).is_none() {
            return Err(Error::InvalidArgument {
                receiver: self.receiver(),
                operation: "*".to_string(),
                reason: format!("argument too big: {times}"),
            });
        }
        Ok(text.repeat(times))
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    fn includes(&self, needle: &str) -> Result<bool> {
        Ok(self.read()?.contains(needle))
    }

    fn starts_with(&self, prefix: &str) -> Result<bool> {
        Ok(self.read()?.starts_with(prefix))
    }

    fn ends_with(&self, suffix: &str) -> Result<bool> {
        Ok(self.read()?.ends_with(suffix))
    }

    /// Character index of the first occurrence of `needle` at or after the
    /// character offset `from`.
    fn index_of(&self, needle: &str, from: i64) -> Result<Option<usize>> {
        let text = self.read()?;
        let count = text.chars().count();
        let Some(start) = normalize(from, count + 1) else {
            return Ok(None);
        };
        let byte_start = byte_offset(&text, start);
        Ok(text[byte_start..]
            .find(needle)
            .map(|b| start + text[byte_start..byte_start + b].chars().count()))
    }

    /// Pieces separated by `separator`, or by runs of whitespace when `None`.
    fn split(&self, separator: Option<&str>) -> Result<Vec<String>> {
        let text = self.read()?;
        Ok(match separator {
            None | Some(" ") => text.split_whitespace().map(str::to_string).collect(),
            Some("") => text.chars().map(String::from).collect(),
            Some(sep) => {
                let mut parts: Vec<String> = text.split(sep).map(str::to_string).collect();
                while parts.last().is_some_and(String::is_empty) {
                    parts.pop();
                }
                parts
            }
        })
    }

    fn chars(&self) -> Result<Vec<String>> {
        Ok(self.read()?.chars().map(String::from).collect())
    }

    /// Characters addressed by `index`; `None` when out of range.
    fn get(&self, index: impl Into<SeqIndex>) -> Result<Option<String>> {
        let chars: Vec<char> = self.read()?.chars().collect();
        Ok(resolve(index.into(), chars.len()).map(|(loc, len)| chars[loc..loc + len].iter().collect()))
    }

    /// Byte-wise comparison of the contents with `other`.
    fn compare(&self, other: &str) -> Result<Ordering> {
        Ok(self.read()?.as_str().cmp(other))
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    fn replace(&self, text: &str) -> Result<()> {
        self.mutate("replace", |_| Ok(text.to_string())).map(drop)
    }

    fn clear(&self) -> Result<()> {
        self.mutate("clear", |_| Ok(String::new())).map(drop)
    }

    fn append(&self, suffix: &str) -> Result<()> {
        self.mutate("append", |t| Ok(format!("{t}{suffix}"))).map(drop)
    }

    /// Inserts before the character at `index`; a negative index inserts
    /// after the character counted from the end.
    fn insert(&self, index: i64, piece: &str) -> Result<()> {
        let receiver = self.receiver();
        self.mutate("insert", |t| {
            let count = t.chars().count() as i64;
            let pos = if index < 0 { index + count + 1 } else { index };
            if pos < 0 || pos > count {
                return Err(Error::IndexOutOfRange {
                    receiver,
                    index,
                    len: count as usize,
                });
            }
            let at = byte_offset(t, pos as usize);
            Ok(format!("{}{piece}{}", &t[..at], &t[at..]))
        })
        .map(drop)
    }

    /// Replaces the characters addressed by `index` with `piece`.
    fn set(&self, index: impl Into<SeqIndex>, piece: &str) -> Result<()> {
        let receiver = self.receiver();
        let index = index.into();
        self.mutate("[]=", |t| {
            let chars: Vec<char> = t.chars().collect();
            let out_of_range = |i: i64| Error::IndexOutOfRange {
                receiver: receiver.clone(),
                index: i,
                len: chars.len(),
            };
            let (loc, len) = match index {
                SeqIndex::Span { len, .. } if len < 0 => {
                    return Err(Error::NegativeLength {
                        receiver: receiver.clone(),
                        length: len,
                    });
                }
                SeqIndex::At(i) => normalize(i, chars.len()).map(|p| (p, 1)).ok_or_else(|| out_of_range(i))?,
                SeqIndex::Range(r) => resolve(index, chars.len()).ok_or_else(|| out_of_range(r.start))?,
                SeqIndex::Span { start, .. } => resolve(index, chars.len()).ok_or_else(|| out_of_range(start))?,
            };
            let mut out: String = chars[..loc].iter().collect();
            out.push_str(piece);
            out.extend(&chars[loc + len..]);
            Ok(out)
        })
        .map(drop)
    }

    /// Removes and returns the characters addressed by `index`.
    fn slice_bang(&self, index: impl Into<SeqIndex>) -> Result<Option<String>> {
        let index = index.into();
        let mut taken = None;
        self.mutate("slice!", |t| {
            let chars: Vec<char> = t.chars().collect();
            let Some((loc, len)) = resolve(index, chars.len()) else {
                return Ok(t.to_string());
            };
            taken = Some(chars[loc..loc + len].iter().collect::<String>());
            let mut out: String = chars[..loc].iter().collect();
            out.extend(&chars[loc + len..]);
            Ok(out)
        })?;
        Ok(taken)
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

fn swapcase(text: &str) -> String {
    text.chars()
        .flat_map(|c| {
            if c.is_uppercase() {
                c.to_lowercase().collect::<Vec<_>>()
            } else {
                c.to_uppercase().collect::<Vec<_>>()
            }
        })
        .collect()
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map_or(text.len(), |(b, _)| b)
}

fn compile(receiver: &str, operation: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidArgument {
        receiver: receiver.to_string(),
        operation: operation.to_string(),
        reason: e.to_string(),
    })
}

/// Converts `\0`..`\9` group references to the regex crate's `${n}` form
/// and escapes literal `$`.
fn expand(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '$' => out.push_str("$$"),
            '\\' => match chars.peek() {
                Some(d) if d.is_ascii_digit() => {
                    out.push_str(&format!("${{{d}}}"));
                    chars.next();
                }
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                }
                _ => out.push('\\'),
            },
            other => out.push(other),
        }
    }
    out
}

// ============================================================================
// Foreign strings
// ============================================================================

/// [`TextLike`] over an `NSString`-family object.
pub struct StringAdapter<'b> {
    bridge: &'b Bridge,
    object: ObjectRef,
    observer: Option<Observer>,
}

impl fmt::Debug for StringAdapter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringAdapter")
            .field("object", &self.object)
            .field("observer", &self.observer)
            .finish()
    }
}

impl<'b> StringAdapter<'b> {
    pub(crate) fn new(bridge: &'b Bridge, object: ObjectRef) -> Self {
        StringAdapter {
            bridge,
            object,
            observer: None,
        }
    }

    pub(crate) fn observed(bridge: &'b Bridge, object: ObjectRef, observer: Observer) -> Self {
        StringAdapter {
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
}

impl TextLike for StringAdapter<'_> {
    fn receiver(&self) -> String {
        self.bridge.class_name_of(&self.object)
    }

    fn read(&self) -> Result<String> {
        match self.bridge.invoke(&self.object, "UTF8String", &[])? {
            Value::Str(s) => Ok(s),
            Value::Nil => Ok(String::new()),
            other => Err(Error::InvalidArgument {
                receiver: self.receiver(),
                operation: "UTF8String".to_string(),
                reason: format!("expected a string result, got {}", other.type_name()),
            }),
        }
    }

    fn write(&self, text: &str) -> Result<()> {
        touch(self.bridge, self.observer.as_ref());
        self.bridge
            .invoke(&self.object, "setString:", &[Value::from(text)])
            .map(drop)
    }

    fn is_mutable(&self) -> Result<bool> {
        self.bridge.is_mutable(&self.object)
    }

    fn text_in(&self, value: &Value) -> Result<Option<String>> {
        match value {
            Value::Str(s) => Ok(Some(s.clone())),
            Value::Object(object) if self.bridge.family_of(object)? == Some(super::Family::Text) => {
                StringAdapter::new(self.bridge, object.clone()).read().map(Some)
            }
            _ => Ok(None),
        }
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
    "to_s", "to_str", "length", "size", "empty?", "upcase", "upcase!", "downcase", "downcase!",
    "capitalize", "capitalize!", "swapcase", "swapcase!", "reverse", "reverse!", "strip",
    "strip!", "lstrip", "lstrip!", "rstrip", "rstrip!", "sub", "sub!", "gsub", "gsub!",
    "include?", "start_with?", "end_with?", "index", "split", "chars", "[]", "slice", "[]=",
    "slice!", "insert", "replace", "clear", "concat", "<<", "+", "*", "==", "<=>",
];

fn text_arg<T: TextLike + ?Sized>(text: &T, value: &Value) -> Result<String> {
    text.text_in(value)?
        .ok_or_else(|| wrong_type(&text.receiver(), "string", value))
}

/// Runs one contract call against a text.
pub fn dispatch<T: TextLike>(text: &T, call: &Call) -> Result<Value> {
    let receiver = text.receiver();
    let args = call.args.as_slice();
    let this = || text.to_value();
    let bang = |operation: &str, f: fn(&T) -> Result<String>| -> Result<Value> {
        let next = f(text)?;
        let changed = text.mutate(operation, |_| Ok(next))?;
        Ok(if changed { text.to_value() } else { Value::Nil })
    };
    let str_value = |s: String| -> Result<Value> { Ok(Value::Str(s)) };

    match call.name.as_str() {
        "to_s" | "to_str" => str_value(text.read()?),
        "length" | "size" => Ok(Value::from(text.length()?)),
        "empty?" => Ok(Value::Bool(text.is_empty()?)),
        "upcase" => str_value(text.upcase()?),
        "downcase" => str_value(text.downcase()?),
        "capitalize" => str_value(text.capitalize()?),
        "swapcase" => str_value(text.swapcase()?),
        "reverse" => str_value(text.reverse()?),
        "strip" => str_value(text.strip()?),
        "lstrip" => str_value(text.lstrip()?),
        "rstrip" => str_value(text.rstrip()?),
        "upcase!" => bang("upcase!", T::upcase),
        "downcase!" => bang("downcase!", T::downcase),
        "capitalize!" => bang("capitalize!", T::capitalize),
        "swapcase!" => bang("swapcase!", T::swapcase),
        "reverse!" => bang("reverse!", T::reverse),
        "strip!" => bang("strip!", T::strip),
        "lstrip!" => bang("lstrip!", T::lstrip),
        "rstrip!" => bang("rstrip!", T::rstrip),
        "sub" | "sub!" | "gsub" | "gsub!" => {
            let global = call.name.starts_with('g');
            let in_place = call.name.ends_with('!');
            call.expect_args(&receiver, 1, 2)?;
            let pattern = text_arg(text, &args[0])?;
            let result = match (args.get(1), &call.block) {
                (Some(replacement), _) => {
                    let replacement = text_arg(text, replacement)?;
                    if global {
                        text.gsub(&pattern, &replacement)?
                    } else {
                        text.sub(&pattern, &replacement)?
                    }
                }
                (None, Some(block)) => {
                    let mut remaining = if global { usize::MAX } else { 1 };
                    text.gsub_with(&pattern, |m| {
                        if remaining == 0 {
                            return Ok(m.to_string());
                        }
                        remaining -= 1;
                        Ok(block(&[Value::from(m)])?.to_string())
                    })?
                }
                (None, None) => return Err(missing(&receiver, &call.name)),
            };
            if !in_place {
                return str_value(result);
            }
            let changed = text.mutate(&call.name, |_| Ok(result))?;
            Ok(if changed { this() } else { Value::Nil })
        }
        "include?" | "start_with?" | "end_with?" => {
            call.expect_args(&receiver, 1, 1)?;
            let needle = text_arg(text, &args[0])?;
            Ok(Value::Bool(match call.name.as_str() {
                "include?" => text.includes(&needle)?,
                "start_with?" => text.starts_with(&needle)?,
                _ => text.ends_with(&needle)?,
            }))
        }
        "index" => {
            call.expect_args(&receiver, 1, 2)?;
            let needle = text_arg(text, &args[0])?;
            let from = match args.get(1) {
                None => 0,
                Some(value) => value.as_int().ok_or_else(|| wrong_type(&receiver, "integer", value))?,
            };
            Ok(text.index_of(&needle, from)?.map_or(Value::Nil, Value::from))
        }
        "split" => {
            call.expect_args(&receiver, 0, 1)?;
            let separator = match args.first() {
                None | Some(Value::Nil) => None,
                Some(value) => Some(text_arg(text, value)?),
            };
            let parts = text.split(separator.as_deref())?;
            Ok(Value::Array(parts.into_iter().map(Value::Str).collect()))
        }
        "chars" => Ok(Value::Array(text.chars()?.into_iter().map(Value::Str).collect())),
        "[]" | "slice" => {
            let index = SeqIndex::from_args(&receiver, &call.name, args)?;
            Ok(text.get(index)?.map_or(Value::Nil, Value::Str))
        }
        "[]=" => {
            call.expect_args(&receiver, 2, 3)?;
            let (index_args, value) = args.split_at(args.len() - 1);
            let piece = text_arg(text, &value[0])?;
            text.set(SeqIndex::from_args(&receiver, &call.name, index_args)?, &piece)?;
            Ok(value[0].clone())
        }
        "slice!" => {
            let index = SeqIndex::from_args(&receiver, &call.name, args)?;
            Ok(text.slice_bang(index)?.map_or(Value::Nil, Value::Str))
        }
        "insert" => {
            call.expect_args(&receiver, 2, 2)?;
            let index = args[0].as_int().ok_or_else(|| wrong_type(&receiver, "integer", &args[0]))?;
            text.insert(index, &text_arg(text, &args[1])?)?;
            Ok(this())
        }
        "replace" => {
            call.expect_args(&receiver, 1, 1)?;
            text.replace(&text_arg(text, &args[0])?)?;
            Ok(this())
        }
        "clear" => {
            call.expect_args(&receiver, 0, 0)?;
            text.clear()?;
            Ok(this())
        }
        "concat" | "<<" => {
            let mut suffix = String::new();
            for arg in args {
                suffix.push_str(&text_arg(text, arg)?);
            }
            text.append(&suffix)?;
            Ok(this())
        }
        "+" => {
            call.expect_args(&receiver, 1, 1)?;
            str_value(text.plus(&text_arg(text, &args[0])?)?)
        }
        "*" => {
            call.expect_args(&receiver, 1, 1)?;
            str_value(text.repeat(super::count_arg(&receiver, &args[0])?)?)
        }
        "==" => {
            call.expect_args(&receiver, 1, 1)?;
            match text.text_in(&args[0])? {
                Some(other) => Ok(Value::Bool(text.read()? == other)),
                None => Ok(Value::Bool(false)),
            }
        }
        "<=>" => {
            call.expect_args(&receiver, 1, 1)?;
            match text.text_in(&args[0])? {
                Some(other) => Ok(Value::Int(match text.compare(&other)? {
                    Ordering::Less => -1,
                    Ordering::Equal => 0,
                    Ordering::Greater => 1,
                })),
                None => Ok(Value::Nil),
            }
        }
        other => Err(Error::NoMethod {
            class: receiver,
            name: other.to_string(),
            tried: vec!["collection adapter"],
        }),
    }
}

fn missing(receiver: &str, operation: &str) -> Error {
    Error::InvalidArgument {
        receiver: receiver.to_string(),
        operation: operation.to_string(),
        reason: "a replacement or a block is required".to_string(),
    }
}
