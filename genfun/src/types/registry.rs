//! Name-indexed registry of declared types.
//!
//! The registry is the only place where record types come into existence.
//! A declared type records its supertype chain once, at declaration time,
//! so subtype queries during dispatch never consult the registry again.

use std::collections::HashMap;

use super::Type;
use crate::error::{DispatchError, DispatchResult};

/// Registry mapping type names to their declared supertype chain.
///
/// Seeded with the builtin hierarchy. Registries are independent: the same
/// name declared in two registries yields two distinct types.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    by_name: HashMap<String, Type>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let by_name = Type::builtins()
            .into_iter()
            .map(|ty| (ty.name().to_string(), ty))
            .collect();
        Self { by_name }
    }

    /// Declare a record type. The parent defaults to `Object`.
    pub fn declare(&mut self, name: &str, parent: Option<&Type>) -> DispatchResult<Type> {
        if self.by_name.contains_key(name) {
            return Err(DispatchError::DuplicateType(name.to_string()));
        }
        let parent = parent.cloned().unwrap_or_else(Type::object);
        let ty = Type::child_of(name, &parent);
        self.by_name.insert(name.to_string(), ty.clone());
        Ok(ty)
    }

    /// Declare a type by the name of an already registered parent.
    pub fn declare_under(&mut self, name: &str, parent: &str) -> DispatchResult<Type> {
        let parent = self
            .get(parent)
            .ok_or_else(|| DispatchError::custom(format!("unknown parent type {}", parent)))?;
        self.declare(name, Some(&parent))
    }

    pub fn get(&self, name: &str) -> Option<Type> {
        self.by_name.get(name).cloned()
    }

    /// Supertype chain of a registered type, most specific first.
    pub fn supertypes(&self, name: &str) -> Option<Vec<Type>> {
        self.by_name
            .get(name)
            .map(|ty| ty.ancestors().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
