//! Methods and the per-generic-function method table.
//!
//! A method is immutable once registered and shared through `Rc`, so an
//! effective method built from a snapshot of the table stays valid while
//! the table keeps growing.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::combination::CallContext;
use crate::error::{DispatchError, DispatchResult};
use crate::specializer::Specializer;
use crate::value::Value;

/// Role of a method in the standard method combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Qualifier {
    /// Computes the result; may call the next less specific primary.
    Primary,
    /// Runs before the primaries for side effects, most specific first.
    Before,
    /// Runs after the primaries for side effects, least specific first.
    After,
    /// Wraps everything else and decides whether to proceed.
    Around,
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Qualifier::Primary => "primary",
            Qualifier::Before => "before",
            Qualifier::After => "after",
            Qualifier::Around => "around",
        };
        f.write_str(name)
    }
}

/// Implementation of a method.
///
/// Receives the call context (for `call_next`) and the argument tuple.
pub type MethodBody = Rc<dyn Fn(&CallContext<'_>, &[Value]) -> DispatchResult<Value>>;

/// A registered method: qualifier, one specializer per parameter, body.
pub struct Method {
    qualifier: Qualifier,
    specializers: Vec<Specializer>,
    body: MethodBody,
    /// Registration position inside the owning table.
    index: usize,
}

impl Method {
    pub fn qualifier(&self) -> Qualifier {
        self.qualifier
    }

    pub fn specializers(&self) -> &[Specializer] {
        &self.specializers
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Check whether every specializer matches its argument.
    pub fn is_applicable(&self, args: &[Value]) -> DispatchResult<bool> {
        if args.len() != self.specializers.len() {
            return Ok(false);
        }
        for (spec, arg) in self.specializers.iter().zip(args) {
            if !spec.matches(arg)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub(crate) fn invoke(&self, ctx: &CallContext<'_>, args: &[Value]) -> DispatchResult<Value> {
        (self.body)(ctx, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("qualifier", &self.qualifier)
            .field("specializers", &self.specializers)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.qualifier)?;
        for (i, spec) in self.specializers.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", spec)?;
        }
        write!(f, ")")
    }
}

/// Method table for one generic function.
#[derive(Debug, Clone)]
pub struct MethodTable {
    name: String,
    arity: usize,
    methods: Vec<Rc<Method>>,
}

impl MethodTable {
    pub fn new(name: String, arity: usize) -> Self {
        Self {
            name,
            arity,
            methods: Vec::new(),
        }
    }

    /// Add a method to this table.
    ///
    /// Methods are appended; an earlier method with the same specializers
    /// stays in the table and wins ties by registration order.
    pub fn add_method(
        &mut self,
        qualifier: Qualifier,
        specializers: Vec<Specializer>,
        body: MethodBody,
    ) -> DispatchResult<Rc<Method>> {
        if specializers.len() != self.arity {
            return Err(DispatchError::ArityMismatch {
                name: self.name.clone(),
                expected: self.arity,
                got: specializers.len(),
            });
        }
        let method = Rc::new(Method {
            qualifier,
            specializers,
            body,
            index: self.methods.len(),
        });
        self.methods.push(method.clone());
        Ok(method)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// All methods in registration order.
    pub fn methods(&self) -> &[Rc<Method>] {
        &self.methods
    }

    /// Specializers at one parameter position, in registration order.
    pub fn specializers_at(&self, position: usize) -> impl Iterator<Item = &Specializer> {
        self.methods
            .iter()
            .filter_map(move |m| m.specializers.get(position))
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
