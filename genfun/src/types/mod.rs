//! Nominal type hierarchy used by type specializers.
//!
//! Every value has exactly one canonical type. Scalars are mapped to a
//! builtin type regardless of their Rust representation (`I64` and `F64`
//! are both `Number`), records carry the type they were built with.
//!
//! ```text
//! Any
//!  ├── Null, Absent
//!  ├── Boolean, Number, String, Symbol, BigInt
//!  ├── Array
//!  └── Object
//!       └── declared record types (default parent)
//! ```
//!
//! # Module Organization
//!
//! - `mod.rs`: `Type` handles, ancestor chains, builtin types
//! - `registry.rs`: `TypeRegistry` for declaring record types by name

mod registry;


pub use registry::TypeRegistry;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Unique identifier of a type. Stable for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> u32 {
        self.0
    }
}

static NEXT_TYPE_ID: AtomicU32 = AtomicU32::new(0);

fn fresh_type_id() -> TypeId {
    TypeId(NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Definition behind a [`Type`] handle.
#[derive(Debug)]
pub struct TypeDef {
    id: TypeId,
    name: String,
    parent: Option<Type>,
    /// Ids of this type and all its supertypes, self first, `Any` last.
    ancestry: Vec<TypeId>,
}

/// Shared handle to a type definition. Equality and hashing use the type id.
#[derive(Clone)]
pub struct Type(Arc<TypeDef>);

impl Type {
    fn root(name: &str) -> Self {
        let id = fresh_type_id();
        Type(Arc::new(TypeDef {
            id,
            name: name.to_string(),
            parent: None,
            ancestry: vec![id],
        }))
    }

    /// Create a new type directly below `parent`.
    pub(crate) fn child_of(name: &str, parent: &Type) -> Self {
        let id = fresh_type_id();
        let mut ancestry = Vec::with_capacity(parent.0.ancestry.len() + 1);
        ancestry.push(id);
        ancestry.extend_from_slice(&parent.0.ancestry);
        Type(Arc::new(TypeDef {
            id,
            name: name.to_string(),
            parent: Some(parent.clone()),
            ancestry,
        }))
    }

    pub fn id(&self) -> TypeId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The declared direct supertype. `None` only for `Any`.
    pub fn parent(&self) -> Option<&Type> {
        self.0.parent.as_ref()
    }

    /// Number of edges between this type and `Any`.
    pub fn depth(&self) -> usize {
        self.0.ancestry.len() - 1
    }

    /// Iterate over this type and its supertypes, most specific first.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// Check if `self` is `other` or a descendant of `other` (`self <: other`).
    pub fn is_subtype_of(&self, other: &Type) -> bool {
        self.0.ancestry.contains(&other.0.id)
    }

    /// `self <: other` and `self != other`.
    pub fn is_strict_subtype_of(&self, other: &Type) -> bool {
        self != other && self.is_subtype_of(other)
    }

    /// True for the types that act as the universal record supertype
    /// (`Any` and `Object`).
    pub fn is_record_root(&self) -> bool {
        *self == BUILTINS.any || *self == BUILTINS.object
    }

    pub fn any() -> Type {
        BUILTINS.any.clone()
    }

    pub fn null() -> Type {
        BUILTINS.null.clone()
    }

    pub fn absent() -> Type {
        BUILTINS.absent.clone()
    }

    pub fn boolean() -> Type {
        BUILTINS.boolean.clone()
    }

    pub fn number() -> Type {
        BUILTINS.number.clone()
    }

    pub fn string() -> Type {
        BUILTINS.string.clone()
    }

    pub fn symbol() -> Type {
        BUILTINS.symbol.clone()
    }

    pub fn bigint() -> Type {
        BUILTINS.bigint.clone()
    }

    pub fn array() -> Type {
        BUILTINS.array.clone()
    }

    /// Type of plain records and default parent of declared record types.
    ///
    /// Only records descend from `Object`. Scalars, arrays, `Null` and
    /// `Absent` do not; [`Type::any`] is the fallback that matches every
    /// value.
    pub fn object() -> Type {
        BUILTINS.object.clone()
    }

    /// All builtin types, `Any` first.
    pub fn builtins() -> Vec<Type> {
        let b = &*BUILTINS;
        vec![
            b.any.clone(),
            b.null.clone(),
            b.absent.clone(),
            b.boolean.clone(),
            b.number.clone(),
            b.string.clone(),
            b.symbol.clone(),
            b.bigint.clone(),
            b.array.clone(),
            b.object.clone(),
        ]
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.0.name)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Iterator over a type's ancestor chain.
#[derive(Debug)]
pub struct Ancestors<'a> {
    next: Option<&'a Type>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Type;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

struct Builtins {
    any: Type,
    null: Type,
    absent: Type,
    boolean: Type,
    number: Type,
    string: Type,
    symbol: Type,
    bigint: Type,
    array: Type,
    object: Type,
}

static BUILTINS: Lazy<Builtins> = Lazy::new(|| {
    let any = Type::root("Any");
    Builtins {
        null: Type::child_of("Null", &any),
        absent: Type::child_of("Absent", &any),
        boolean: Type::child_of("Boolean", &any),
        number: Type::child_of("Number", &any),
        string: Type::child_of("String", &any),
        symbol: Type::child_of("Symbol", &any),
        bigint: Type::child_of("BigInt", &any),
        array: Type::child_of("Array", &any),
        object: Type::child_of("Object", &any),
        any,
    }
});
