//! Shared helpers for integration tests
// Not every test target uses every helper.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use genfun::prelude::*;

/// Execution log shared between method bodies and the test.
#[derive(Debug, Clone, Default)]
pub struct Trace(Rc<RefCell<Vec<String>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    /// Drain the log as one `a > b > c` line.
    pub fn take_joined(&self) -> String {
        self.take().join(" > ")
    }
}

/// Plain record from name/value pairs.
pub fn obj<const N: usize>(fields: [(&str, Value); N]) -> Value {
    Value::object(fields)
}

pub fn int(v: i64) -> Value {
    Value::I64(v)
}

pub fn text(s: &str) -> Value {
    Value::from(s)
}

/// Integer field of a record argument.
pub fn field_i64(value: &Value, name: &str) -> DispatchResult<i64> {
    value
        .field(name)
        .and_then(Value::as_i64)
        .ok_or_else(|| DispatchError::custom(format!("missing integer field {}", name)))
}

/// String result of a call, or a panic describing what came back.
pub fn as_string(result: DispatchResult<Value>) -> String {
    match result {
        Ok(Value::Str(s)) => s.to_string(),
        other => panic!("Expected string result, got {:?}", other),
    }
}
