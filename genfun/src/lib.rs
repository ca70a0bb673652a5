//! Multiple-dispatch generic functions
//!
//! A generic function is a named operation with a fixed arity that owns
//! independently registered methods. Each method is guarded by one
//! specializer per parameter:
//!
//! - nominal type (`Type`), matching a type and its descendants
//! - structural shape (`Shape`), matching records exposing given keys
//! - exact value (`Eql`)
//! - host-defined predicates (`CustomSpecializer`)
//!
//! Calls select the applicable methods, order them most specific first and
//! run them with the standard method combination (before, after, around and
//! primary methods with `call_next`). Compositions are memoized per class of
//! dispatch-equivalent arguments.
//!
//! ```
//! use genfun::prelude::*;
//!
//! let describe = defgeneric("describe", &["x"]);
//! describe
//!     .primary([Type::any()], |_, _| Ok(Value::from("thing")))?
//!     .primary([Type::number()], |ctx, args| {
//!         let rest = ctx.call_next()?;
//!         Ok(Value::from(format!("number {} ({})", args[0], rest.as_str().unwrap_or(""))))
//!     })?;
//!
//! assert_eq!(describe.call(&[Value::I64(2)])?, Value::from("number 2 (thing)"));
//! assert_eq!(describe.call(&[Value::Null])?, Value::from("thing"));
//! # Ok::<(), DispatchError>(())
//! ```

// Library code reports through tracing, never stderr.
#![deny(clippy::print_stderr)]

pub mod combination;
pub mod dispatch_cache;
pub mod error;
pub mod generic;
pub mod method_table;
pub mod options;
pub mod specializer;
pub mod specificity;
pub mod types;
pub mod value;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use genfun::prelude::*;
/// ```
pub mod prelude {
    pub use super::combination::CallContext;
    pub use super::dispatch_cache::CacheStats;
    pub use super::error::{DispatchError, DispatchResult};
    pub use super::generic::{defgeneric, Callable, GenericFunction};
    pub use super::method_table::Qualifier;
    pub use super::options::DispatchOptions;
    pub use super::shape;
    pub use super::specializer::{CustomSpecializer, DispatchKey, Shape, Specializer};
    pub use super::types::{Type, TypeRegistry};
    pub use super::value::{Record, Symbol, Value};
}

pub use prelude::*;
