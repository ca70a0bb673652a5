//! Standard method combination.
//!
//! The sorted applicable methods are partitioned by qualifier and composed
//! into an [`EffectiveMethod`]. Composition picks the cheapest tier that
//! still has the full semantics:
//!
//! | Tier       | Methods                                  |
//! |------------|------------------------------------------|
//! | `Single`   | one primary                              |
//! | `Chain`    | several primaries                        |
//! | `Standard` | primaries with befores and/or afters     |
//! | `Wrapped`  | at least one around                      |
//!
//! All tiers share the same stage runner, so they only differ in how much
//! work is skipped. Continuations are plain borrows into the effective
//! method and are rebuilt for every call, which keeps re-entrant calls
//! independent of each other.

use std::rc::Rc;

use tracing::debug;

use crate::error::{DispatchError, DispatchResult};
use crate::method_table::{Method, Qualifier};
use crate::value::{render_args, Value};

/// Qualifier partition of a sorted applicable method list.
#[derive(Debug, Clone, Default)]
pub struct Stage {
    /// Most specific first
    befores: Vec<Rc<Method>>,
    /// Most specific first
    primaries: Vec<Rc<Method>>,
    /// Least specific first
    afters: Vec<Rc<Method>>,
}

impl Stage {
    fn run(&self, name: &str, args: &[Value]) -> DispatchResult<Value> {
        if self.primaries.is_empty() {
            return Err(DispatchError::no_primary(name));
        }
        for before in &self.befores {
            before.invoke(&CallContext::terminal(name, args), args)?;
        }
        let result = run_primaries(name, &self.primaries, args);
        self.run_afters(name, args, result)
    }

    /// After methods run whether or not the primaries succeeded. A failing
    /// primary's error wins over anything the afters raise.
    fn run_afters(
        &self,
        name: &str,
        args: &[Value],
        result: DispatchResult<Value>,
    ) -> DispatchResult<Value> {
        match result {
            Ok(value) => {
                for after in &self.afters {
                    after.invoke(&CallContext::terminal(name, args), args)?;
                }
                Ok(value)
            }
            Err(err) => {
                for after in &self.afters {
                    if let Err(after_err) = after.invoke(&CallContext::terminal(name, args), args) {
                        debug!(generic = name, error = %after_err, "after method failed during error exit");
                    }
                }
                Err(err)
            }
        }
    }
}

/// Invoke the first primary with the rest as its continuation.
fn run_primaries(name: &str, primaries: &[Rc<Method>], args: &[Value]) -> DispatchResult<Value> {
    match primaries.split_first() {
        Some((first, rest)) => {
            let ctx = CallContext {
                name,
                args,
                next: Next::Primary(rest),
            };
            first.invoke(&ctx, args)
        }
        None => Err(DispatchError::no_next(name)),
    }
}

/// Invoke the first around, or the inner stage once the arounds run out.
fn run_arounds(
    name: &str,
    arounds: &[Rc<Method>],
    inner: &Stage,
    args: &[Value],
    entry_args: &[Value],
) -> DispatchResult<Value> {
    match arounds.split_first() {
        Some((first, rest)) => {
            let ctx = CallContext {
                name,
                args,
                next: Next::Around {
                    rest,
                    inner,
                    entry_args,
                },
            };
            first.invoke(&ctx, args)
        }
        None => inner.run(name, entry_args),
    }
}

#[derive(Debug, Clone)]
enum Tier {
    Single(Rc<Method>),
    Chain(Vec<Rc<Method>>),
    Standard(Stage),
    Wrapped { arounds: Vec<Rc<Method>>, inner: Stage },
}

/// Callable composition of the applicable methods for one class of
/// argument tuples. Holds no per-call state and is safe to cache.
#[derive(Debug, Clone)]
pub struct EffectiveMethod {
    name: Rc<str>,
    tier: Tier,
}

impl EffectiveMethod {
    /// Compose methods sorted most specific first.
    ///
    /// Fails with `NoPrimaryMethod` when there is neither a primary nor an
    /// around method. With `tiered` off every composition uses the general
    /// wrapped form.
    pub fn build(name: Rc<str>, sorted: &[Rc<Method>], tiered: bool) -> DispatchResult<Self> {
        let mut stage = Stage::default();
        let mut arounds = Vec::new();
        for method in sorted {
            match method.qualifier() {
                Qualifier::Primary => stage.primaries.push(method.clone()),
                Qualifier::Before => stage.befores.push(method.clone()),
                Qualifier::After => stage.afters.push(method.clone()),
                Qualifier::Around => arounds.push(method.clone()),
            }
        }
        stage.afters.reverse();

        if stage.primaries.is_empty() && arounds.is_empty() {
            return Err(DispatchError::no_primary(&*name));
        }

        let tier = if !arounds.is_empty() || !tiered {
            Tier::Wrapped {
                arounds,
                inner: stage,
            }
        } else if !stage.befores.is_empty() || !stage.afters.is_empty() {
            Tier::Standard(stage)
        } else if stage.primaries.len() == 1 {
            let mut primaries = stage.primaries;
            Tier::Single(primaries.remove(0))
        } else {
            Tier::Chain(stage.primaries)
        };

        let built = Self { name, tier };
        debug!(generic = %built.name, tier = built.tier_name(), methods = sorted.len(), "built effective method");
        Ok(built)
    }

    /// Run the composition on `args`.
    pub fn call(&self, args: &[Value]) -> DispatchResult<Value> {
        let name = &*self.name;
        match &self.tier {
            Tier::Single(method) => method.invoke(&CallContext::terminal(name, args), args),
            Tier::Chain(primaries) => run_primaries(name, primaries, args),
            Tier::Standard(stage) => stage.run(name, args),
            Tier::Wrapped { arounds, inner } => run_arounds(name, arounds, inner, args, args),
        }
    }

    /// Name of the composition tier, for diagnostics.
    pub fn tier_name(&self) -> &'static str {
        match self.tier {
            Tier::Single(_) => "single",
            Tier::Chain(_) => "chain",
            Tier::Standard(_) => "standard",
            Tier::Wrapped { .. } => "wrapped",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Next<'a> {
    None,
    /// Less specific primaries still to run
    Primary(&'a [Rc<Method>]),
    /// Less specific arounds, then the inner stage on the entry arguments
    Around {
        rest: &'a [Rc<Method>],
        inner: &'a Stage,
        entry_args: &'a [Value],
    },
}

/// Continuation handed to a running method body.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    name: &'a str,
    args: &'a [Value],
    next: Next<'a>,
}

impl<'a> CallContext<'a> {
    fn terminal(name: &'a str, args: &'a [Value]) -> Self {
        Self {
            name,
            args,
            next: Next::None,
        }
    }

    /// Name of the generic function being called.
    pub fn generic_name(&self) -> &str {
        self.name
    }

    /// Arguments the running method was invoked with.
    pub fn args(&self) -> &[Value] {
        self.args
    }

    /// Whether `call_next` has somewhere to go.
    pub fn has_next(&self) -> bool {
        match self.next {
            Next::None => false,
            Next::Primary(rest) => !rest.is_empty(),
            Next::Around { .. } => true,
        }
    }

    /// Call the next method with the current arguments.
    pub fn call_next(&self) -> DispatchResult<Value> {
        match self.next {
            Next::None => Err(DispatchError::no_next(self.name)),
            Next::Primary(rest) => run_primaries(self.name, rest, self.args),
            Next::Around {
                rest,
                inner,
                entry_args,
            } => run_arounds(self.name, rest, inner, self.args, entry_args),
        }
    }

    /// Call the next method with replacement arguments.
    ///
    /// For primaries, the remaining less specific primaries are filtered
    /// again against `args`. For arounds, `args` reach the next around only;
    /// the inner stage still receives the arguments the call started with.
    ///
    /// `args` must have as many values as the generic function has
    /// parameters.
    pub fn call_next_with(&self, args: &[Value]) -> DispatchResult<Value> {
        if args.len() != self.args.len() {
            return Err(DispatchError::ArityMismatch {
                name: self.name.to_string(),
                expected: self.args.len(),
                got: args.len(),
            });
        }
        match self.next {
            Next::None => Err(DispatchError::no_next(self.name)),
            Next::Primary([]) => Err(DispatchError::no_next(self.name)),
            Next::Primary(rest) => {
                let mut applicable = Vec::with_capacity(rest.len());
                for method in rest {
                    if method.is_applicable(args)? {
                        applicable.push(method.clone());
                    }
                }
                if applicable.is_empty() {
                    return Err(DispatchError::no_applicable(self.name, render_args(args)));
                }
                run_primaries(self.name, &applicable, args)
            }
            Next::Around {
                rest,
                inner,
                entry_args,
            } => run_arounds(self.name, rest, inner, args, entry_args),
        }
    }
}
