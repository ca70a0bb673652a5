//! Dynamic Value type for generic function arguments
//!
//! Arguments and results of generic functions are `Value`s. The set of
//! recognized kinds is closed: null, absent, boolean, number (two Rust
//! representations of one logical kind), big integer, string, symbol, array
//! and record. Anything else is carried as an `Opaque` host value, which
//! dispatch refuses to classify.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};

use crate::error::{DispatchError, DispatchResult};
use crate::types::Type;

/// Dynamic value passed to and returned from generic functions.
#[derive(Debug, Clone)]
pub enum Value {
    // ========== Sentinels ==========
    /// "No value"
    Null,
    /// "Absent value" (undefined). A record field holding `Absent` counts
    /// as missing.
    Absent,

    // ========== Scalars ==========
    /// Boolean
    Bool(bool),
    /// Integral number
    I64(i64),
    /// Floating point number. Same logical kind as `I64`.
    F64(f64),
    /// Arbitrary precision integer
    BigInt(BigInt),
    /// Immutable string
    Str(Rc<str>),
    /// Unique symbol
    Symbol(Symbol),

    // ========== Reference Types ==========
    /// Array (shared, compared by reference)
    Array(Rc<RefCell<Vec<Value>>>),
    /// Object-like value with named fields (compared by reference)
    Record(Rc<Record>),
    /// Host value of a representation dispatch does not recognize
    Opaque(Opaque),
}

impl Value {
    /// Build a plain record (type `Object`) from name/value pairs.
    pub fn object<N, I>(fields: I) -> Value
    where
        N: Into<Rc<str>>,
        I: IntoIterator<Item = (N, Value)>,
    {
        Value::instance(Type::object(), fields)
    }

    /// Build a record of the given type from name/value pairs.
    pub fn instance<N, I>(ty: Type, fields: I) -> Value
    where
        N: Into<Rc<str>>,
        I: IntoIterator<Item = (N, Value)>,
    {
        let mut record = Record::new(ty);
        for (name, value) in fields {
            record.set(name, value);
        }
        Value::Record(Rc::new(record))
    }

    /// Wrap an arbitrary host value.
    pub fn opaque<T: Any>(value: T) -> Value {
        Value::Opaque(Opaque::new(value))
    }

    /// Name of this value's kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Absent => "absent",
            Value::Bool(_) => "boolean",
            Value::I64(_) | Value::F64(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            Value::Opaque(_) => "opaque",
        }
    }

    /// Canonical type of this value.
    ///
    /// Both numeric representations map to `Number`. Opaque host values
    /// have no type and raise `UnhandledArgumentKind`.
    pub fn type_of(&self) -> DispatchResult<Type> {
        Ok(match self {
            Value::Null => Type::null(),
            Value::Absent => Type::absent(),
            Value::Bool(_) => Type::boolean(),
            Value::I64(_) | Value::F64(_) => Type::number(),
            Value::BigInt(_) => Type::bigint(),
            Value::Str(_) => Type::string(),
            Value::Symbol(_) => Type::symbol(),
            Value::Array(_) => Type::array(),
            Value::Record(record) => record.type_().clone(),
            Value::Opaque(opaque) => {
                return Err(DispatchError::unhandled_kind(format!(
                    "opaque host value of type {}",
                    opaque.type_name()
                )))
            }
        })
    }

    /// Identity comparison used by exact-value specializers.
    ///
    /// Scalars compare by value (numbers numerically across both
    /// representations, `NaN` is never identical to anything); arrays,
    /// records and opaque values compare by reference.
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Absent, Value::Absent) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::I64(i), Value::F64(f)) | (Value::F64(f), Value::I64(i)) => {
                float_as_exact_i64(*f) == Some(*i)
            }
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Hashable key such that `a.identical(b)` implies equal keys.
    pub fn identity_key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Absent => ValueKey::Absent,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::I64(i) => ValueKey::Int(*i),
            Value::F64(f) => match float_as_exact_i64(*f) {
                Some(i) => ValueKey::Int(i),
                None => ValueKey::Float(f.to_bits()),
            },
            Value::BigInt(b) => ValueKey::BigInt(b.clone()),
            Value::Str(s) => ValueKey::Str(s.clone()),
            Value::Symbol(s) => ValueKey::Symbol(s.id),
            Value::Array(a) => ValueKey::Ref(Rc::as_ptr(a) as *const () as usize),
            Value::Record(r) => ValueKey::Ref(Rc::as_ptr(r) as *const () as usize),
            Value::Opaque(o) => ValueKey::Ref(o.addr()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// Check if this is a number in either representation
    pub fn is_number(&self) -> bool {
        matches!(self, Value::I64(_) | Value::F64(_))
    }

    /// Try to extract as i64 (integral floats included)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            Value::F64(f) => float_as_exact_i64(*f),
            Value::BigInt(b) => b.to_i64(),
            _ => None,
        }
    }

    /// Try to extract as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            Value::I64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Field of a record value. `None` for non-records and missing fields.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_record().and_then(|r| r.get(name))
    }
}

fn float_as_exact_i64(f: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or above it overflows i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_finite() && f.fract() == 0.0 && f >= -LIMIT && f < LIMIT {
        Some(f as i64)
    } else {
        None
    }
}

// ========== Records ==========

/// Object-like value: a nominal type plus ordered named fields.
#[derive(Debug, Clone)]
pub struct Record {
    ty: Type,
    fields: Vec<(Rc<str>, Value)>,
}

impl Record {
    pub fn new(ty: Type) -> Self {
        Self {
            ty,
            fields: Vec::new(),
        }
    }

    /// Set a field, replacing an existing field of the same name in place.
    pub fn set<N: Into<Rc<str>>>(&mut self, name: N, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder-style `set`.
    pub fn with<N: Into<Rc<str>>>(mut self, name: N, value: Value) -> Self {
        self.set(name, value);
        self
    }

    pub fn type_(&self) -> &Type {
        &self.ty
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, v)| v)
    }

    /// A field is present when it exists and does not hold `Absent`.
    pub fn has(&self, name: &str) -> bool {
        matches!(self.get(name), Some(v) if !v.is_absent())
    }

    /// Names of present fields, in definition order.
    pub fn present_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, v)| !v.is_absent())
            .map(|(n, _)| &**n)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (&**n, v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(Rc::new(r))
    }
}

// ========== Symbols ==========

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static SYMBOL_REGISTRY: RefCell<HashMap<String, Symbol>> = RefCell::new(HashMap::new());
}

/// Symbol compared by identity. Two symbols with the same description are
/// different unless both come from [`Symbol::for_name`].
#[derive(Debug, Clone)]
pub struct Symbol {
    id: u64,
    description: Rc<str>,
}

impl Symbol {
    /// Create a fresh, unique symbol.
    pub fn new(description: &str) -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: Rc::from(description),
        }
    }

    /// Symbol registered under `name` on this thread, created on first use.
    pub fn for_name(name: &str) -> Self {
        SYMBOL_REGISTRY.with(|registry| {
            registry
                .borrow_mut()
                .entry(name.to_string())
                .or_insert_with(|| Symbol::new(name))
                .clone()
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

// ========== Opaque host values ==========

/// Host value wrapped without interpretation.
#[derive(Clone)]
pub struct Opaque {
    inner: Rc<dyn Any>,
    type_name: &'static str,
}

impl Opaque {
    pub fn new<T: Any>(value: T) -> Self {
        Self {
            inner: Rc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    fn ptr_eq(&self, other: &Opaque) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.type_name)
    }
}

// ========== Identity keys ==========

/// Hashable projection of a value's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Absent,
    Bool(bool),
    Int(i64),
    /// Bit pattern of a non-integral float
    Float(u64),
    BigInt(BigInt),
    Str(Rc<str>),
    Symbol(u64),
    /// Address of a reference value
    Ref(usize),
}

// ========== From implementations ==========

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I64(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Rc::from(v))
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::BigInt(v)
    }
}

impl From<Symbol> for Value {
    fn from(v: Symbol) -> Self {
        Value::Symbol(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        let values: Vec<Value> = v.into_iter().map(|x| x.into()).collect();
        Value::Array(Rc::new(RefCell::new(values)))
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::I64(i),
                None => Value::F64(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::from(items.into_iter().map(Value::from).collect::<Vec<_>>())
            }
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

// ========== Serialize implementation ==========

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Absent => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::I64(i) => serializer.serialize_i64(*i),
            Value::F64(f) => serializer.serialize_f64(*f),
            Value::BigInt(b) => serializer.serialize_str(&b.to_string()),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Symbol(s) => serializer.serialize_str(s.description()),
            Value::Array(items) => {
                let items = items.borrow();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Record(record) => {
                let mut map = serializer.serialize_map(Some(record.len()))?;
                for (name, value) in record.fields() {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            Value::Opaque(o) => Err(S::Error::custom(format!(
                "cannot serialize opaque host value of type {}",
                o.type_name()
            ))),
        }
    }
}

// ========== Display implementation ==========

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Absent => write!(f, "absent"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::F64(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{}.0", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            Value::BigInt(v) => write!(f, "{}n", v),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Symbol(s) => write!(f, "Symbol({})", s.description()),
            Value::Array(arr) => {
                let arr = arr.borrow();
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Record(record) => {
                if *record.type_() != Type::object() {
                    write!(f, "{} ", record.type_())?;
                }
                write!(f, "{{")?;
                for (i, (name, value)) in record.fields().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", name, value)?;
                }
                if record.is_empty() {
                    write!(f, "}}")
                } else {
                    write!(f, " }}")
                }
            }
            Value::Opaque(o) => write!(f, "#<opaque {}>", o.type_name()),
        }
    }
}

// ========== PartialEq implementation ==========

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.identical(other)
    }
}

/// Render an argument tuple for diagnostics.
pub(crate) fn render_args(args: &[Value]) -> String {
    args.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
