//! Applicability filtering and most-specific-first ordering.
//!
//! Two methods are compared position by position, left to right. Positions
//! holding equal specializers are skipped and the first position whose
//! specializers are ordered decides. Methods that never get a verdict are
//! tied, and ties keep registration order.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::error::DispatchResult;
use crate::method_table::Method;
use crate::specializer::Specializer;
use crate::value::Value;

/// Order two specializers at one position. `Less` means `a` goes first.
fn compare_specializers(a: &Specializer, b: &Specializer) -> Option<Ordering> {
    if a == b {
        return None;
    }
    if a.is_more_specific_than(b) == Some(true) {
        Some(Ordering::Less)
    } else if b.is_more_specific_than(a) == Some(true) {
        Some(Ordering::Greater)
    } else {
        None
    }
}

/// Order two methods of equal arity. `None` when they are tied.
pub fn compare_methods(a: &Method, b: &Method) -> Option<Ordering> {
    a.specializers()
        .iter()
        .zip(b.specializers())
        .find_map(|(sa, sb)| compare_specializers(sa, sb))
}

/// Check if `a` must run before `b`.
pub fn is_more_specific(a: &Method, b: &Method) -> bool {
    compare_methods(a, b) == Some(Ordering::Less)
}

/// Order methods most specific first.
///
/// Repeatedly takes the earliest method no remaining method is more
/// specific than. This is stable for ties and terminates even when a custom
/// specializer reports an inconsistent order (the earliest method is taken).
pub fn sort_most_specific_first(mut remaining: Vec<Rc<Method>>) -> Vec<Rc<Method>> {
    let mut sorted = Vec::with_capacity(remaining.len());
    while !remaining.is_empty() {
        let pick = (0..remaining.len())
            .find(|&i| {
                !remaining
                    .iter()
                    .enumerate()
                    .any(|(j, other)| j != i && is_more_specific(other, &remaining[i]))
            })
            .unwrap_or(0);
        sorted.push(remaining.remove(pick));
    }
    sorted
}

/// Methods applicable to `args`, most specific first.
pub fn applicable_methods(methods: &[Rc<Method>], args: &[Value]) -> DispatchResult<Vec<Rc<Method>>> {
    let mut applicable = Vec::new();
    for method in methods {
        if method.is_applicable(args)? {
            applicable.push(method.clone());
        }
    }
    Ok(sort_most_specific_first(applicable))
}
