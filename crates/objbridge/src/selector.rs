//! Selector interning and host-name conversion.
//!
//! Foreign method names use colon-separated keywords (`setObject:forKey:`),
//! host method names cannot contain colons and use underscores instead
//! (`setObject_forKey`). The functions here translate between the two.

use fxhash::FxHashSet;
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

static REGISTRY: OnceLock<RwLock<FxHashSet<Arc<str>>>> = OnceLock::new();

/// An interned selector name.
///
/// Interning the same name twice yields selectors that share storage, so
/// equality is a pointer comparison.
#[derive(Clone)]
pub struct Selector {
    name: Arc<str>,
}

impl Selector {
    /// Returns the interned selector for `name`.
    ///
    /// # Example
    ///
    /// ```
    /// use objbridge::Selector;
    ///
    /// let a = Selector::intern("objectAtIndex:");
    /// let b = Selector::intern("objectAtIndex:");
    /// assert_eq!(a, b);
    /// assert_eq!(a.arg_count(), 1);
    /// ```
    pub fn intern(name: &str) -> Selector {
        let registry = REGISTRY.get_or_init(|| RwLock::new(FxHashSet::default()));

        if let Some(existing) = registry.read().get(name) {
            return Selector {
                name: Arc::clone(existing),
            };
        }

        let mut set = registry.write();
        // Another thread may have won the race for the write lock.
        if let Some(existing) = set.get(name) {
            return Selector {
                name: Arc::clone(existing),
            };
        }
        let name: Arc<str> = Arc::from(name);
        set.insert(Arc::clone(&name));
        Selector { name }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of arguments implied by the name (one per colon).
    pub fn arg_count(&self) -> usize {
        self.name.matches(':').count()
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.name, &other.name)
    }
}

impl Eq for Selector {}

impl Hash for Selector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Borrow<str> for Selector {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl FromStr for Selector {
    type Err = Infallible;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(Selector::intern(name))
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::intern(name)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({})", self.name)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Converts a host call name into the selector it forwards to.
///
/// An underscore that follows another character becomes a colon, a trailing
/// `?` is dropped, and a colon is appended when the call passes arguments.
///
/// ```
/// use objbridge::selector::selector_for_call;
///
/// assert_eq!(selector_for_call("setObject_forKey", 2), "setObject:forKey:");
/// assert_eq!(selector_for_call("initWithFrame", 1), "initWithFrame:");
/// assert_eq!(selector_for_call("isEqualToString?", 1), "isEqualToString:");
/// assert_eq!(selector_for_call("__private", 0), "__private");
/// ```
pub fn selector_for_call(name: &str, argc: usize) -> String {
    let name = name.strip_suffix('?').unwrap_or(name);
    let mut out = String::with_capacity(name.len() + 1);
    let mut prev: Option<char> = None;
    for ch in name.chars() {
        if ch == '_' && prev.is_some_and(|p| p != '_') {
            out.push(':');
        } else {
            out.push(ch);
        }
        prev = Some(ch);
    }
    if argc > 0 && !out.ends_with(':') {
        out.push(':');
    }
    out
}

/// Converts the name of an explicitly exported method into its selector.
///
/// Every underscore after the first character becomes a colon.
pub fn selector_for_export(name: &str, takes_args: bool) -> String {
    let mut chars = name.chars();
    let mut out = String::with_capacity(name.len() + 1);
    if let Some(first) = chars.next() {
        out.push(first);
    }
    out.extend(chars.map(|c| if c == '_' { ':' } else { c }));
    if takes_args && !out.ends_with(':') {
        out.push(':');
    }
    out
}

/// Upper-cases the first character of a property key.
pub fn capitalize_key(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `setFoo:` for key `foo`.
pub fn setter_selector(key: &str) -> String {
    format!("set{}:", capitalize_key(key))
}

/// Builds a key-embedded selector such as `objectInItemsAtIndex:`.
pub fn keyed_selector(prefix: &str, key: &str, suffix: &str) -> String {
    format!("{prefix}{}{suffix}", capitalize_key(key))
}
