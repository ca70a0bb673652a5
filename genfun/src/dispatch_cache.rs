//! Per-generic-function dispatch cache.
//!
//! A key extractor is planned for every parameter position from the
//! specializers registered there. Arguments that produce the same key tuple
//! are dispatch-equivalent, so the effective method built for one of them
//! serves all of them. The cache is derived state: adding a method or
//! clearing the cache throws away both the plan and every entry.
//!
//! ```text
//!  Unplanned ──plan──> Planned(extractors) ──invalidate──> Unplanned
//!      │
//!      └──────plan──> Uncacheable ─────────invalidate──> Unplanned
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, trace};

use crate::combination::EffectiveMethod;
use crate::method_table::MethodTable;
use crate::specializer::{CustomSpecializer, DispatchKey, Specializer};
use crate::value::Value;

/// Derives the cache key of one argument position.
#[derive(Debug, Clone)]
pub enum KeyExtractor {
    /// Canonical type of the argument
    TypeTag,
    /// Which of the exact-value targets the argument is identical to.
    /// Every other value shares one key.
    Identity(Vec<Value>),
    /// Sorted present property names of a record argument
    ShapeKeys {
        /// Non-records (and the record's own type) are keyed by type tag
        /// because nominal specializers share the position.
        type_fallback: bool,
    },
    /// Values of a fixed set of record properties
    ShapeValues {
        names: Vec<Rc<str>>,
        type_fallback: bool,
    },
    /// Keys of every custom specializer at the position
    Custom(Vec<Rc<dyn CustomSpecializer>>),
}

impl KeyExtractor {
    /// Key for `value`, or `None` when this value cannot be keyed.
    pub fn extract(&self, value: &Value) -> Option<DispatchKey> {
        match self {
            KeyExtractor::TypeTag => DispatchKey::type_tag(value),
            KeyExtractor::Identity(targets) => Some(
                targets
                    .iter()
                    .find(|target| target.identical(value))
                    .map_or(DispatchKey::Other, DispatchKey::identity),
            ),
            KeyExtractor::ShapeKeys { type_fallback } => {
                with_type_fallback(value, *type_fallback, DispatchKey::property_names(value))
            }
            KeyExtractor::ShapeValues {
                names,
                type_fallback,
            } => with_type_fallback(
                value,
                *type_fallback,
                DispatchKey::property_values(value, names),
            ),
            KeyExtractor::Custom(customs) => customs
                .iter()
                .map(|c| c.cache_key(value))
                .collect::<Option<Vec<_>>>()
                .map(DispatchKey::Composite),
        }
    }

    /// Plan the extractor for one position. `None` when the specializers
    /// mix kinds in a way no single key can classify.
    fn plan<'a>(specializers: impl Iterator<Item = &'a Specializer>) -> Option<KeyExtractor> {
        let mut types = 0usize;
        let mut eqls: Vec<Value> = Vec::new();
        let mut shapes = Vec::new();
        let mut customs: Vec<Rc<dyn CustomSpecializer>> = Vec::new();
        for spec in specializers {
            match spec {
                Specializer::Type(_) => types += 1,
                Specializer::Eql(target) => {
                    if !eqls.iter().any(|t| t.identical(target)) {
                        eqls.push(target.clone());
                    }
                }
                Specializer::Shape(shape) => shapes.push(shape),
                Specializer::Custom(custom) => {
                    if !customs.iter().any(|c| Rc::ptr_eq(c, custom)) {
                        customs.push(custom.clone());
                    }
                }
            }
        }

        if !customs.is_empty() {
            let all_keyed = customs.iter().all(|c| c.has_cache_key());
            return (all_keyed && types == 0 && eqls.is_empty() && shapes.is_empty())
                .then_some(KeyExtractor::Custom(customs));
        }
        if !eqls.is_empty() {
            return (types == 0 && shapes.is_empty()).then_some(KeyExtractor::Identity(eqls));
        }
        if shapes.is_empty() {
            return Some(KeyExtractor::TypeTag);
        }

        let type_fallback = types > 0;
        if shapes.iter().all(|s| s.is_value_free()) {
            return Some(KeyExtractor::ShapeKeys { type_fallback });
        }
        let names = shapes[0].names();
        if shapes
            .iter()
            .all(|s| s.is_fully_constrained() && s.names() == names)
        {
            return Some(KeyExtractor::ShapeValues {
                names,
                type_fallback,
            });
        }
        None
    }
}

fn with_type_fallback(
    value: &Value,
    type_fallback: bool,
    record_key: Option<DispatchKey>,
) -> Option<DispatchKey> {
    match (record_key, type_fallback) {
        (Some(key), true) => Some(DispatchKey::Composite(vec![
            DispatchKey::type_tag(value)?,
            key,
        ])),
        (Some(key), false) => Some(key),
        (None, true) => DispatchKey::type_tag(value),
        (None, false) => None,
    }
}

/// Planning state of a generic function.
#[derive(Debug, Clone)]
pub enum Plan {
    Unplanned,
    Uncacheable,
    Planned(Vec<KeyExtractor>),
}

/// Outcome of a dispatch that is worth remembering.
#[derive(Debug, Clone)]
pub enum CacheLeaf {
    Method(Rc<EffectiveMethod>),
    /// No method is applicable to these arguments.
    NoApplicable,
    /// Methods apply but none of them is a primary or around method.
    NoPrimary,
}

#[derive(Debug)]
enum CacheNode {
    Empty,
    Branch(HashMap<DispatchKey, CacheNode>),
    Leaf(CacheLeaf),
}

impl CacheNode {
    fn get(&self, keys: &[DispatchKey]) -> Option<&CacheLeaf> {
        match (self, keys.split_first()) {
            (CacheNode::Leaf(leaf), None) => Some(leaf),
            (CacheNode::Branch(children), Some((key, rest))) => children.get(key)?.get(rest),
            _ => None,
        }
    }

    /// Returns true when a new entry was created.
    fn insert(&mut self, keys: &[DispatchKey], leaf: CacheLeaf) -> bool {
        match keys.split_first() {
            None => {
                let created = !matches!(self, CacheNode::Leaf(_));
                *self = CacheNode::Leaf(leaf);
                created
            }
            Some((key, rest)) => {
                if !matches!(self, CacheNode::Branch(_)) {
                    *self = CacheNode::Branch(HashMap::new());
                }
                match self {
                    CacheNode::Branch(children) => children
                        .entry(key.clone())
                        .or_insert(CacheNode::Empty)
                        .insert(rest, leaf),
                    _ => false,
                }
            }
        }
    }
}

/// Counters describing how calls were served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls served from the cache
    pub hits: u64,
    /// Calls that populated the cache
    pub misses: u64,
    /// Calls that skipped the cache (uncacheable function or unkeyable argument)
    pub bypasses: u64,
    /// Cached argument classes
    pub entries: usize,
}

/// Result of classifying an argument tuple.
#[derive(Debug, Clone)]
pub enum Lookup {
    Hit(CacheLeaf),
    /// Not cached yet; store the outcome under these keys.
    Miss(Vec<DispatchKey>),
    /// Dispatch without the cache for this call.
    Bypass,
}

/// Dispatch cache of one generic function.
#[derive(Debug)]
pub struct DispatchCache {
    plan: Plan,
    root: CacheNode,
    stats: CacheStats,
    /// Bumped on every invalidation so stale insertions can be detected.
    generation: u64,
}

impl DispatchCache {
    pub fn new() -> Self {
        Self {
            plan: Plan::Unplanned,
            root: CacheNode::Empty,
            stats: CacheStats::default(),
            generation: 0,
        }
    }

    /// Drop the plan and every cached entry.
    pub fn invalidate(&mut self, name: &str) {
        debug!(generic = name, entries = self.stats.entries, "invalidating dispatch cache");
        self.plan = Plan::Unplanned;
        self.root = CacheNode::Empty;
        self.stats.entries = 0;
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Current plan, computing it from `table` first if needed.
    pub fn plan(&mut self, table: &MethodTable) -> &Plan {
        if matches!(self.plan, Plan::Unplanned) {
            let extractors: Option<Vec<_>> = (0..table.arity())
                .map(|pos| KeyExtractor::plan(table.specializers_at(pos)))
                .collect();
            self.plan = match extractors {
                Some(extractors) => {
                    debug!(generic = table.name(), extractors = ?extractors, "planned dispatch keys");
                    Plan::Planned(extractors)
                }
                None => {
                    debug!(generic = table.name(), "mixed specializers, dispatch is uncacheable");
                    Plan::Uncacheable
                }
            };
        }
        &self.plan
    }

    /// Classify `args` and look them up.
    pub fn lookup(&mut self, table: &MethodTable, args: &[Value]) -> Lookup {
        let keys = match self.plan(table) {
            Plan::Planned(extractors) => extractors
                .iter()
                .zip(args)
                .map(|(extractor, arg)| extractor.extract(arg))
                .collect::<Option<Vec<_>>>(),
            _ => None,
        };
        let Some(keys) = keys else {
            self.stats.bypasses += 1;
            trace!(generic = table.name(), "dispatch cache bypass");
            return Lookup::Bypass;
        };
        match self.root.get(&keys) {
            Some(leaf) => {
                self.stats.hits += 1;
                trace!(generic = table.name(), "dispatch cache hit");
                Lookup::Hit(leaf.clone())
            }
            None => {
                self.stats.misses += 1;
                trace!(generic = table.name(), "dispatch cache miss");
                Lookup::Miss(keys)
            }
        }
    }

    /// Store a dispatch outcome computed during `generation`. Ignored when
    /// the cache was invalidated in the meantime.
    pub fn insert(&mut self, generation: u64, keys: &[DispatchKey], leaf: CacheLeaf) {
        if generation != self.generation {
            return;
        }
        if self.root.insert(keys, leaf) {
            self.stats.entries += 1;
        }
    }

    pub fn is_cacheable(&mut self, table: &MethodTable) -> bool {
        matches!(self.plan(table), Plan::Planned(_))
    }
}

impl Default for DispatchCache {
    fn default() -> Self {
        Self::new()
    }
}
