//! Generic function facade.
//!
//! A [`GenericFunction`] binds a method table, its dispatch cache and the
//! combination machinery behind one cloneable handle. Calling it goes
//! through the cache first and falls back to full dispatch:
//!
//! 1. check the argument count
//! 2. classify the arguments and look them up in the dispatch cache
//! 3. on a miss, filter and order the applicable methods
//! 4. compose them into an effective method and remember it
//! 5. run the effective method
//!
//! No `RefCell` borrow is held while a method body runs, so bodies may call
//! their own generic function, add methods to it or clear its cache.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::combination::{CallContext, EffectiveMethod};
use crate::dispatch_cache::{CacheLeaf, CacheStats, DispatchCache, Lookup};
use crate::error::{DispatchError, DispatchResult};
use crate::method_table::{Method, MethodTable, Qualifier};
use crate::options::DispatchOptions;
use crate::specializer::Specializer;
use crate::specificity::applicable_methods;
use crate::value::{render_args, Value};

/// Create a generic function with the given parameter names.
pub fn defgeneric(name: &str, parameters: &[&str]) -> GenericFunction {
    GenericFunction::new(name, parameters)
}

#[derive(Debug)]
struct State {
    table: MethodTable,
    cache: DispatchCache,
}

#[derive(Debug)]
struct Inner {
    name: Rc<str>,
    parameters: Vec<String>,
    options: DispatchOptions,
    state: RefCell<State>,
}

/// Named operation with a fixed arity and a growing set of methods.
#[derive(Clone)]
pub struct GenericFunction {
    inner: Rc<Inner>,
}

impl GenericFunction {
    pub fn new(name: &str, parameters: &[&str]) -> Self {
        Self::with_options(name, parameters, DispatchOptions::default())
    }

    pub fn with_options(name: &str, parameters: &[&str], options: DispatchOptions) -> Self {
        let table = MethodTable::new(name.to_string(), parameters.len());
        Self {
            inner: Rc::new(Inner {
                name: Rc::from(name),
                parameters: parameters.iter().map(|p| p.to_string()).collect(),
                options,
                state: RefCell::new(State {
                    table,
                    cache: DispatchCache::new(),
                }),
            }),
        }
    }

    /// Register a method. Invalidates the dispatch cache.
    ///
    /// Fails with `ArityMismatch` unless there is exactly one specializer
    /// per parameter.
    pub fn add_method<I, F>(&self, qualifier: Qualifier, specializers: I, body: F) -> DispatchResult<&Self>
    where
        I: IntoIterator,
        I::Item: Into<Specializer>,
        F: Fn(&CallContext<'_>, &[Value]) -> DispatchResult<Value> + 'static,
    {
        let specializers: Vec<Specializer> = specializers.into_iter().map(Into::into).collect();
        let mut state = self.inner.state.borrow_mut();
        let method = state.table.add_method(qualifier, specializers, Rc::new(body))?;
        debug!(generic = %self.inner.name, method = %method, "added method");
        state.cache.invalidate(&self.inner.name);
        Ok(self)
    }

    pub fn primary<I, F>(&self, specializers: I, body: F) -> DispatchResult<&Self>
    where
        I: IntoIterator,
        I::Item: Into<Specializer>,
        F: Fn(&CallContext<'_>, &[Value]) -> DispatchResult<Value> + 'static,
    {
        self.add_method(Qualifier::Primary, specializers, body)
    }

    pub fn before<I, F>(&self, specializers: I, body: F) -> DispatchResult<&Self>
    where
        I: IntoIterator,
        I::Item: Into<Specializer>,
        F: Fn(&CallContext<'_>, &[Value]) -> DispatchResult<Value> + 'static,
    {
        self.add_method(Qualifier::Before, specializers, body)
    }

    pub fn after<I, F>(&self, specializers: I, body: F) -> DispatchResult<&Self>
    where
        I: IntoIterator,
        I::Item: Into<Specializer>,
        F: Fn(&CallContext<'_>, &[Value]) -> DispatchResult<Value> + 'static,
    {
        self.add_method(Qualifier::After, specializers, body)
    }

    pub fn around<I, F>(&self, specializers: I, body: F) -> DispatchResult<&Self>
    where
        I: IntoIterator,
        I::Item: Into<Specializer>,
        F: Fn(&CallContext<'_>, &[Value]) -> DispatchResult<Value> + 'static,
    {
        self.add_method(Qualifier::Around, specializers, body)
    }

    /// Stable invocation handle. Every handle of one generic function is
    /// [`Callable::same`] as every other.
    pub fn callable(&self) -> Callable {
        Callable {
            inner: self.inner.clone(),
        }
    }

    /// Invoke the generic function.
    pub fn call(&self, args: &[Value]) -> DispatchResult<Value> {
        invoke(&self.inner, args)
    }

    /// Discard the dispatch cache and key plan without touching methods.
    pub fn clear_dispatch_cache(&self) {
        self.inner
            .state
            .borrow_mut()
            .cache
            .invalidate(&self.inner.name);
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.inner.parameters
    }

    pub fn arity(&self) -> usize {
        self.inner.parameters.len()
    }

    pub fn options(&self) -> DispatchOptions {
        self.inner.options
    }

    pub fn method_count(&self) -> usize {
        self.inner.state.borrow().table.len()
    }

    /// Snapshot of the registered methods in registration order.
    pub fn methods(&self) -> Vec<Rc<Method>> {
        self.inner.state.borrow().table.methods().to_vec()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.state.borrow().cache.stats()
    }

    /// Whether calls can be served from the dispatch cache at all with the
    /// current methods.
    pub fn is_cacheable(&self) -> bool {
        if !self.inner.options.cache {
            return false;
        }
        let mut state = self.inner.state.borrow_mut();
        let State { table, cache } = &mut *state;
        cache.is_cacheable(table)
    }
}

impl fmt::Debug for GenericFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericFunction")
            .field("name", &self.inner.name)
            .field("parameters", &self.inner.parameters)
            .field("methods", &self.method_count())
            .finish()
    }
}

/// Invocation handle of a generic function.
#[derive(Clone)]
pub struct Callable {
    inner: Rc<Inner>,
}

impl Callable {
    pub fn call(&self, args: &[Value]) -> DispatchResult<Value> {
        invoke(&self.inner, args)
    }

    /// True when both handles invoke the same generic function.
    pub fn same(a: &Callable, b: &Callable) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The generic function behind this handle.
    pub fn generic(&self) -> GenericFunction {
        GenericFunction {
            inner: self.inner.clone(),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({})", self.inner.name)
    }
}

fn invoke(inner: &Inner, args: &[Value]) -> DispatchResult<Value> {
    if args.len() != inner.parameters.len() {
        return Err(DispatchError::ArityMismatch {
            name: inner.name.to_string(),
            expected: inner.parameters.len(),
            got: args.len(),
        });
    }

    if !inner.options.cache {
        let methods = inner.state.borrow().table.methods().to_vec();
        let leaf = dispatch(inner, &methods, args)?;
        return run_leaf(inner, &leaf, args);
    }

    let (lookup, methods, generation) = {
        let mut state = inner.state.borrow_mut();
        let State { table, cache } = &mut *state;
        let lookup = cache.lookup(table, args);
        let methods = match lookup {
            Lookup::Hit(_) => Vec::new(),
            _ => table.methods().to_vec(),
        };
        (lookup, methods, cache.generation())
    };

    let leaf = match lookup {
        Lookup::Hit(leaf) => leaf,
        Lookup::Bypass => dispatch(inner, &methods, args)?,
        Lookup::Miss(keys) => {
            let leaf = dispatch(inner, &methods, args)?;
            inner
                .state
                .borrow_mut()
                .cache
                .insert(generation, &keys, leaf.clone());
            leaf
        }
    };
    run_leaf(inner, &leaf, args)
}

/// Full dispatch over a snapshot of the method table.
fn dispatch(inner: &Inner, methods: &[Rc<Method>], args: &[Value]) -> DispatchResult<CacheLeaf> {
    let applicable = applicable_methods(methods, args)?;
    if applicable.is_empty() {
        return Ok(CacheLeaf::NoApplicable);
    }
    match EffectiveMethod::build(inner.name.clone(), &applicable, inner.options.tiered) {
        Ok(emf) => Ok(CacheLeaf::Method(Rc::new(emf))),
        Err(DispatchError::NoPrimaryMethod { .. }) => Ok(CacheLeaf::NoPrimary),
        Err(err) => Err(err),
    }
}

fn run_leaf(inner: &Inner, leaf: &CacheLeaf, args: &[Value]) -> DispatchResult<Value> {
    match leaf {
        CacheLeaf::Method(emf) => emf.call(args),
        CacheLeaf::NoApplicable => Err(DispatchError::no_applicable(
            &*inner.name,
            render_args(args),
        )),
        CacheLeaf::NoPrimary => Err(DispatchError::no_primary(&*inner.name)),
    }
}
