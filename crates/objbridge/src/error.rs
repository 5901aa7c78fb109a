//! Error types for the bridge.
//!
//! [`ForeignError`] is what a foreign runtime reports about one of its own
//! calls. [`Error`] is what the bridge reports to host code; foreign failures
//! reach it wrapped in [`Error::ForeignDispatchFailure`] and are otherwise
//! passed through untouched.

use thiserror::Error;

/// Failures reported by a foreign runtime.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForeignError {
    /// The receiver's class chain has no method for the selector.
    #[error("-[{class} {selector}]: unrecognized selector sent to instance")]
    UnrecognizedSelector { class: String, selector: String },

    /// Wrong number of arguments for the selector's signature.
    #[error("'{selector}' expects {expected} argument(s), got {got}")]
    ArgumentCount {
        selector: String,
        expected: usize,
        got: usize,
    },

    /// An argument does not fit the selector's declared type.
    #[error("invalid argument for '{selector}': {reason}")]
    InvalidArgument { selector: String, reason: String },

    /// A mutator was sent to an immutable instance.
    #[error("attempt to mutate immutable {class} with '{selector}'")]
    Immutable { class: String, selector: String },

    /// An index past the end of a foreign container.
    #[error("'{selector}': index {index} beyond bounds [0 .. {count})")]
    IndexBeyondBounds {
        selector: String,
        index: usize,
        count: usize,
    },

    /// A class with this name is already registered.
    #[error("class '{name}' already exists")]
    ClassExists { name: String },

    /// A class handle that the runtime never issued.
    #[error("unknown class handle #{handle}")]
    UnknownClass { handle: u64 },

    /// An object id with no live instance behind it.
    #[error("object #{id} is not alive")]
    InvalidObject { id: u64 },

    /// A named exception raised inside a method implementation.
    #[error("{name}: {reason}")]
    Exception { name: String, reason: String },
}

/// Failures reported by the bridge.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// No foreign class exists under this name.
    #[error("no foreign class named '{name}'")]
    ClassNotFound { name: String },

    /// Neither a foreign constant nor a foreign class answered to the name.
    #[error("uninitialized constant {name}")]
    NameNotFound { name: String },

    /// A mutating operation on an immutable receiver.
    #[error("can't modify immutable {receiver} with '{operation}'")]
    ImmutableReceiver { receiver: String, operation: String },

    /// An index outside the receiver's bounds.
    #[error("index {index} out of range for {receiver} of length {len}")]
    IndexOutOfRange {
        receiver: String,
        index: i64,
        len: usize,
    },

    /// A start/length pair with a negative length.
    #[error("negative length ({length}) for {receiver}")]
    NegativeLength { receiver: String, length: i64 },

    /// A `fetch` of a missing key with no default or fallback.
    #[error("key not found: {key} in {receiver}")]
    KeyNotFound { receiver: String, key: String },

    /// An index or key of the wrong kind.
    #[error("no implicit conversion of {got} into {expected} for {receiver}")]
    InvalidIndexType {
        receiver: String,
        expected: &'static str,
        got: String,
    },

    /// An operation called with the wrong number of arguments.
    #[error("wrong number of arguments for {receiver}#{operation} (given {got}, expected {expected})")]
    InvalidArgumentCount {
        receiver: String,
        operation: String,
        expected: String,
        got: usize,
    },

    /// An argument that can't be used by the operation.
    #[error("invalid argument for {receiver}#{operation}: {reason}")]
    InvalidArgument {
        receiver: String,
        operation: String,
        reason: String,
    },

    /// The foreign call itself failed.
    #[error("foreign call {receiver}#{selector} failed: {source}")]
    ForeignDispatchFailure {
        receiver: String,
        selector: String,
        #[source]
        source: ForeignError,
    },

    /// No accessor is bound for the key.
    #[error("this class ({class}) is not key value coding-compliant for the key {key}")]
    AccessorNotFound { class: String, key: String },

    /// A class reappeared while its own import was still in progress.
    #[error("import cycle while resolving '{name}': {}", chain.join(" -> "))]
    ImportCycle { name: String, chain: Vec<String> },

    /// A container that (transitively) contains itself.
    #[error("tried to flatten recursive {receiver}")]
    CyclicStructure { receiver: String },

    /// A mirror class was constructed with a bare host constructor.
    #[error("use 'alloc' with an initializer to instantiate {class}")]
    UseForeignInitializer { class: String },

    /// A type token or encoding that can't be published to the foreign side.
    #[error("invalid type '{token}' in signature for '{method}'")]
    InvalidTypeEncoding { method: String, token: String },

    /// A derived class name that is already taken.
    #[error("class '{name}' is already defined")]
    ClassAlreadyDefined { name: String },

    /// The bundle loader could not locate or load a framework.
    #[error("can't locate framework '{name}'")]
    FrameworkNotFound { name: String },

    /// Nothing in the fallback chain handled the call.
    #[error("undefined method '{name}' for {class} (tried {})", tried.join(", "))]
    NoMethod {
        class: String,
        name: String,
        tried: Vec<&'static str>,
    },

    /// A process-wide bridge was already installed.
    #[error("a bridge is already installed for this process")]
    AlreadyInstalled,

    /// The bridge behind a published method has been dropped.
    #[error("the bridge owning this class has been released")]
    BridgeReleased,
}

impl Error {
    /// Returns the foreign failure behind a dispatch error, if any.
    pub fn foreign_source(&self) -> Option<&ForeignError> {
        match self {
            Error::ForeignDispatchFailure { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns `true` for failures raised by local validation, which never
    /// reach the foreign runtime.
    pub fn is_local_validation(&self) -> bool {
        matches!(
            self,
            Error::IndexOutOfRange { .. }
                | Error::NegativeLength { .. }
                | Error::KeyNotFound { .. }
                | Error::InvalidIndexType { .. }
                | Error::InvalidArgumentCount { .. }
                | Error::InvalidArgument { .. }
                | Error::ImmutableReceiver { .. }
        )
    }
}

impl From<Error> for ForeignError {
    fn from(err: Error) -> Self {
        match err {
            Error::ForeignDispatchFailure { source, .. } => source,
            other => ForeignError::Exception {
                name: "HostError".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Bridge result.
pub type Result<T> = std::result::Result<T, Error>;

/// Foreign runtime result.
pub type ForeignResult<T> = std::result::Result<T, ForeignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessor_not_found_message() {
        let err = Error::AccessorNotFound {
            class: "Person".into(),
            key: "age".into(),
        };
        assert_eq!(
            err.to_string(),
            "this class (Person) is not key value coding-compliant for the key age"
        );
    }

    #[test]
    fn test_foreign_failure_keeps_source() {
        let err = Error::ForeignDispatchFailure {
            receiver: "NSString".into(),
            selector: "setString:".into(),
            source: ForeignError::Immutable {
                class: "NSString".into(),
                selector: "setString:".into(),
            },
        };
        assert!(matches!(err.foreign_source(), Some(ForeignError::Immutable { .. })));
        assert!(!err.is_local_validation());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_host_error_crosses_as_exception() {
        let foreign: ForeignError = Error::NameNotFound { name: "Foo".into() }.into();
        assert_eq!(
            foreign,
            ForeignError::Exception {
                name: "HostError".into(),
                reason: "uninitialized constant Foo".into(),
            }
        );
    }

    #[test]
    fn test_import_cycle_lists_chain() {
        let err = Error::ImportCycle {
            name: "A".into(),
            chain: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "import cycle while resolving 'A': A -> B -> A");
    }
}
