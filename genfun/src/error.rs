//! Dispatch error types
//!
//! Every failure is local to the current call: nothing is retried and
//! nothing is recovered internally. Method bodies may catch these errors
//! themselves when they want to supply a fallback value.

use thiserror::Error;

/// Error raised while defining or invoking a generic function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// No method's specializers all match the argument tuple.
    #[error("no applicable method for generic function {name} with arguments ({args})")]
    NoApplicableMethod {
        /// Generic function name
        name: String,
        /// Rendered argument tuple
        args: String,
    },

    /// Applicable methods exist but none of them is a primary method.
    #[error("no primary method for generic function {name}")]
    NoPrimaryMethod {
        /// Generic function name
        name: String,
    },

    /// `call_next` was invoked with no less specific method left in the chain.
    #[error("no next method for generic function {name}")]
    NoNextMethod {
        /// Generic function name
        name: String,
    },

    /// The argument's representation is not one the engine can classify.
    #[error("unhandled argument kind: {kind}")]
    UnhandledArgumentKind {
        /// Description of the offending value
        kind: String,
    },

    /// Wrong number of specializers or arguments.
    #[error("generic function {name} takes {expected} arguments, got {got}")]
    ArityMismatch {
        /// Generic function name
        name: String,
        /// Declared arity
        expected: usize,
        /// Supplied count
        got: usize,
    },

    /// A type with this name is already declared in the registry.
    #[error("type {0} is already declared")]
    DuplicateType(String),

    /// Dispatch options could not be parsed.
    #[error("invalid dispatch options: {0}")]
    InvalidOptions(String),

    /// Error raised by a method body
    #[error("{0}")]
    Custom(String),
}

impl DispatchError {
    /// Create a no-applicable-method error
    pub fn no_applicable<S: Into<String>, A: Into<String>>(name: S, args: A) -> Self {
        DispatchError::NoApplicableMethod {
            name: name.into(),
            args: args.into(),
        }
    }

    /// Create a no-primary-method error
    pub fn no_primary<S: Into<String>>(name: S) -> Self {
        DispatchError::NoPrimaryMethod { name: name.into() }
    }

    /// Create a no-next-method error
    pub fn no_next<S: Into<String>>(name: S) -> Self {
        DispatchError::NoNextMethod { name: name.into() }
    }

    /// Create an unhandled-argument-kind error
    pub fn unhandled_kind<S: Into<String>>(kind: S) -> Self {
        DispatchError::UnhandledArgumentKind { kind: kind.into() }
    }

    /// Create an error to be raised from a method body
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        DispatchError::Custom(msg.into())
    }

    /// True for the failures produced by dispatch itself rather than by
    /// method bodies or configuration.
    pub fn is_dispatch_failure(&self) -> bool {
        matches!(
            self,
            DispatchError::NoApplicableMethod { .. }
                | DispatchError::NoPrimaryMethod { .. }
                | DispatchError::NoNextMethod { .. }
                | DispatchError::UnhandledArgumentKind { .. }
        )
    }
}

/// Result type alias for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;
