//! Per-parameter predicates guarding a method.
//!
//! A specializer answers three questions about a single argument position:
//! does a value belong to it, is it more specific than another specializer,
//! and which cache key classifies a value for it. The closed set of builtin
//! kinds is nominal type, structural shape and exact value; hosts can plug
//! their own predicates in through [`CustomSpecializer`].

use std::fmt;
use std::rc::Rc;

use crate::error::DispatchResult;
use crate::types::{Type, TypeId};
use crate::value::{Record, Value, ValueKey};

/// Predicate over a single argument.
#[derive(Debug, Clone)]
pub enum Specializer {
    /// Nominal type: matches values whose type is `T` or a descendant.
    Type(Type),
    /// Structural shape: matches records exposing the listed keys.
    Shape(Shape),
    /// Exact value: matches values identical to this one.
    Eql(Value),
    /// Host-defined predicate
    Custom(Rc<dyn CustomSpecializer>),
}

impl Specializer {
    /// Nominal type specializer
    pub fn of(ty: Type) -> Self {
        Specializer::Type(ty)
    }

    /// Specializer matching anything (`Any`)
    pub fn any() -> Self {
        Specializer::Type(Type::any())
    }

    /// Exact value specializer
    pub fn eql<V: Into<Value>>(value: V) -> Self {
        Specializer::Eql(value.into())
    }

    pub fn custom<C: CustomSpecializer + 'static>(custom: C) -> Self {
        Specializer::Custom(Rc::new(custom))
    }

    /// Check whether `value` satisfies this specializer.
    ///
    /// Fails only for values the type hierarchy cannot classify.
    pub fn matches(&self, value: &Value) -> DispatchResult<bool> {
        match self {
            Specializer::Type(ty) => Ok(value.type_of()?.is_subtype_of(ty)),
            Specializer::Shape(shape) => Ok(shape.matches(value)),
            Specializer::Eql(target) => Ok(value.identical(target)),
            Specializer::Custom(custom) => custom.matches(value),
        }
    }

    /// Relative specificity at one parameter position.
    ///
    /// `Some(true)` when `self` is strictly more specific than `other`,
    /// `Some(false)` when it definitely is not, `None` when the two are
    /// unordered.
    pub fn is_more_specific_than(&self, other: &Specializer) -> Option<bool> {
        match (self, other) {
            (Specializer::Custom(custom), _) => custom.is_more_specific_than(other),
            (_, Specializer::Custom(custom)) => match custom.is_more_specific_than(self) {
                Some(true) => Some(false),
                _ => None,
            },
            (Specializer::Eql(_), Specializer::Eql(_)) => None,
            (Specializer::Eql(_), _) => Some(true),
            (_, Specializer::Eql(_)) => Some(false),
            (Specializer::Type(a), Specializer::Type(b)) => {
                if a.is_subtype_of(b) || b.is_subtype_of(a) {
                    Some(a.is_strict_subtype_of(b))
                } else {
                    None
                }
            }
            (Specializer::Shape(a), Specializer::Shape(b)) => a.is_more_specific_than(b),
            // Every record satisfies Any and Object, so a shape refines them.
            (Specializer::Shape(_), Specializer::Type(ty)) => ty.is_record_root().then_some(true),
            (Specializer::Type(ty), Specializer::Shape(_)) => {
                ty.is_record_root().then_some(false)
            }
        }
    }

    /// Key classifying `value` for this specializer alone. `None` when this
    /// specializer cannot derive one for the value.
    pub fn cache_key(&self, value: &Value) -> Option<DispatchKey> {
        match self {
            Specializer::Type(_) => DispatchKey::type_tag(value),
            Specializer::Eql(_) => Some(DispatchKey::identity(value)),
            Specializer::Shape(shape) => {
                if shape.is_value_free() {
                    DispatchKey::property_names(value)
                } else if shape.is_fully_constrained() {
                    DispatchKey::property_values(value, &shape.names())
                } else {
                    None
                }
            }
            Specializer::Custom(custom) => custom.cache_key(value),
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(self, Specializer::Type(_))
    }
}

impl PartialEq for Specializer {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Specializer::Type(a), Specializer::Type(b)) => a == b,
            (Specializer::Shape(a), Specializer::Shape(b)) => a == b,
            (Specializer::Eql(a), Specializer::Eql(b)) => a.identical(b),
            (Specializer::Custom(a), Specializer::Custom(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Type> for Specializer {
    fn from(ty: Type) -> Self {
        Specializer::Type(ty)
    }
}

impl From<&Type> for Specializer {
    fn from(ty: &Type) -> Self {
        Specializer::Type(ty.clone())
    }
}

impl From<Shape> for Specializer {
    fn from(shape: Shape) -> Self {
        Specializer::Shape(shape)
    }
}

impl fmt::Display for Specializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Specializer::Type(ty) => write!(f, "{}", ty),
            Specializer::Shape(shape) => write!(f, "{}", shape),
            Specializer::Eql(value) => write!(f, "(eql {})", value),
            Specializer::Custom(custom) => f.write_str(&custom.describe()),
        }
    }
}

// ========== Custom specializers ==========

/// Host-defined specializer.
///
/// Only `matches` is required. Custom specializers are unordered against
/// everything unless `is_more_specific_than` says otherwise, and a generic
/// function using one is uncacheable unless `has_cache_key` returns true.
pub trait CustomSpecializer: fmt::Debug {
    fn matches(&self, value: &Value) -> DispatchResult<bool>;

    fn is_more_specific_than(&self, _other: &Specializer) -> Option<bool> {
        None
    }

    /// Whether this specializer derives cache keys at all.
    fn has_cache_key(&self) -> bool {
        false
    }

    /// Key such that equal keys imply equal `matches` results.
    fn cache_key(&self, _value: &Value) -> Option<DispatchKey> {
        None
    }

    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}

// ========== Shapes ==========

/// One key of a [`Shape`]: a property name, optionally with a required value.
#[derive(Debug, Clone)]
pub struct ShapeKey {
    name: Rc<str>,
    required: Option<Value>,
}

impl ShapeKey {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> Option<&Value> {
        self.required.as_ref()
    }

    fn accepts(&self, record: &Record) -> bool {
        match (record.get(&self.name), &self.required) {
            (None, _) | (Some(Value::Absent), _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(required)) => actual.identical(required),
        }
    }
}

/// Structural specializer over record keys.
///
/// ```
/// use genfun::specializer::Shape;
///
/// let point = Shape::new().key("x").key("y");
/// let origin = Shape::new().key_eq("x", 0).key_eq("y", 0);
/// assert_eq!(origin.is_more_specific_than(&point), Some(true));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Shape {
    keys: Vec<ShapeKey>,
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `name` to be present with any value.
    pub fn key<N: Into<Rc<str>>>(self, name: N) -> Self {
        self.push(name.into(), None)
    }

    /// Require `name` to hold a value identical to `value`. An `Absent`
    /// value only requires presence.
    pub fn key_eq<N: Into<Rc<str>>, V: Into<Value>>(self, name: N, value: V) -> Self {
        let value = value.into();
        let required = if value.is_absent() { None } else { Some(value) };
        self.push(name.into(), required)
    }

    fn push(mut self, name: Rc<str>, required: Option<Value>) -> Self {
        match self.keys.iter_mut().find(|k| k.name == name) {
            Some(existing) => existing.required = required,
            None => self.keys.push(ShapeKey { name, required }),
        }
        self
    }

    pub fn keys(&self) -> &[ShapeKey] {
        &self.keys
    }

    /// Key names, sorted.
    pub fn names(&self) -> Vec<Rc<str>> {
        let mut names: Vec<Rc<str>> = self.keys.iter().map(|k| k.name.clone()).collect();
        names.sort();
        names
    }

    fn constrained_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .keys
            .iter()
            .filter(|k| k.required.is_some())
            .map(|k| &*k.name)
            .collect();
        names.sort_unstable();
        names
    }

    /// No key carries a value constraint.
    pub fn is_value_free(&self) -> bool {
        self.keys.iter().all(|k| k.required.is_none())
    }

    /// Every key carries a value constraint.
    pub fn is_fully_constrained(&self) -> bool {
        self.keys.iter().all(|k| k.required.is_some())
    }

    pub fn matches(&self, value: &Value) -> bool {
        match value.as_record() {
            Some(record) => self.keys.iter().all(|k| k.accepts(record)),
            None => false,
        }
    }

    /// More required keys win. With equal key names, more value
    /// constraints win. Anything else is unordered.
    pub fn is_more_specific_than(&self, other: &Shape) -> Option<bool> {
        let mine = self.names();
        let theirs = other.names();
        if mine == theirs {
            let mine = self.constrained_names();
            let theirs = other.constrained_names();
            return compare_sets(&mine, &theirs);
        }
        compare_sets(&mine, &theirs)
    }
}

/// Strict-superset test over two sorted sets. `None` when neither contains
/// the other.
fn compare_sets<T: Ord>(a: &[T], b: &[T]) -> Option<bool> {
    let a_has_b = b.iter().all(|x| a.binary_search(x).is_ok());
    let b_has_a = a.iter().all(|x| b.binary_search(x).is_ok());
    match (a_has_b, b_has_a) {
        (true, true) => Some(false),
        (true, false) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.keys.len() == other.keys.len()
            && self.keys.iter().all(|k| {
                other.keys.iter().any(|o| {
                    o.name == k.name
                        && match (&o.required, &k.required) {
                            (None, None) => true,
                            (Some(a), Some(b)) => a.identical(b),
                            _ => false,
                        }
                })
            })
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            match &key.required {
                Some(value) => write!(f, " {}: {}", key.name, value)?,
                None => write!(f, " {}", key.name)?,
            }
        }
        write!(f, " }}")
    }
}

/// Build a [`Shape`] from bare key names and `(name, value)` pairs.
///
/// ```
/// use genfun::shape;
///
/// let s = shape!["kind", ("version", 2)];
/// assert_eq!(s.keys().len(), 2);
/// ```
#[macro_export]
macro_rules! shape {
    (@key $shape:expr, ($name:expr, $value:expr)) => {
        $shape.key_eq($name, $value)
    };
    (@key $shape:expr, $name:expr) => {
        $shape.key($name)
    };
    ($($key:tt),* $(,)?) => {{
        let shape = $crate::specializer::Shape::new();
        $( let shape = $crate::shape!(@key shape, $key); )*
        shape
    }};
}

// ========== Dispatch keys ==========

/// Classification of one argument used as one level of the dispatch cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DispatchKey {
    /// Canonical type of the value
    Type(TypeId),
    /// Identity of the value
    Value(ValueKey),
    /// Sorted names of a record's present properties
    Names(Vec<Rc<str>>),
    /// Values of a fixed list of record properties (`None` when missing)
    Values(Vec<Option<ValueKey>>),
    /// Several keys combined
    Composite(Vec<DispatchKey>),
    /// Any value outside a position's distinguished set
    Other,
}

impl DispatchKey {
    /// Type tag of a value. `None` for values without a type.
    pub fn type_tag(value: &Value) -> Option<DispatchKey> {
        value.type_of().ok().map(|ty| DispatchKey::Type(ty.id()))
    }

    pub fn identity(value: &Value) -> DispatchKey {
        DispatchKey::Value(value.identity_key())
    }

    /// Present property names of a record. `None` for non-records.
    pub fn property_names(value: &Value) -> Option<DispatchKey> {
        let record = value.as_record()?;
        let mut names: Vec<Rc<str>> = record.present_names().map(Rc::from).collect();
        names.sort();
        names.dedup();
        Some(DispatchKey::Names(names))
    }

    /// Values of `names` in a record. `None` for non-records.
    pub fn property_values(value: &Value, names: &[Rc<str>]) -> Option<DispatchKey> {
        let record = value.as_record()?;
        let values = names
            .iter()
            .map(|name| match record.get(name) {
                None | Some(Value::Absent) => None,
                Some(v) => Some(v.identity_key()),
            })
            .collect();
        Some(DispatchKey::Values(values))
    }
}
