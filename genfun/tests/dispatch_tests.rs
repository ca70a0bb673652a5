//! Tests for method selection: applicability and specificity ordering.

mod common;

use common::{as_string, field_i64, int, obj, text};
use genfun::prelude::*;
use pretty_assertions::assert_eq;

// ==================== Nominal Types ====================

#[test]
fn test_any_methods_get_called() {
    let gf = defgeneric("testing1", &["a", "b"]);
    gf.primary([Type::any(), Type::any()], |_, _| Ok(int(1)))
        .unwrap();
    assert_eq!(gf.call(&[int(1), int(2)]).unwrap(), int(1));
}

#[test]
fn test_no_applicable_method() {
    let gf = defgeneric("foobar", &["a"]);
    gf.primary([Type::string()], |_, _| Ok(Value::Null)).unwrap();
    let err = gf.call(&[obj([])]).unwrap_err();
    assert_eq!(
        err,
        DispatchError::NoApplicableMethod {
            name: "foobar".to_string(),
            args: "{}".to_string()
        }
    );
    insta::assert_snapshot!(
        err.to_string(),
        @"no applicable method for generic function foobar with arguments ({})"
    );
}

#[test]
fn test_selects_by_argument_types() {
    let gf = defgeneric("testing1", &["a", "b"]);
    gf.primary([Type::number(), Type::number()], |_, _| Ok(int(2)))
        .unwrap()
        .primary([Type::string(), Type::string()], |_, _| Ok(int(1)))
        .unwrap();
    assert_eq!(gf.call(&[text("1"), text("2")]).unwrap(), int(1));
    assert_eq!(gf.call(&[int(1), Value::F64(2.5)]).unwrap(), int(2));
}

#[test]
fn test_subtype_wins_over_supertype() {
    let gf = defgeneric("foobar", &["a"]);
    gf.primary([Type::any()], |_, _| Ok(int(1)))
        .unwrap()
        .primary([Type::string()], |_, _| Ok(int(2)))
        .unwrap();
    assert_eq!(gf.call(&[text("foobar")]).unwrap(), int(2));
    assert_eq!(gf.call(&[int(3)]).unwrap(), int(1));
}

#[test]
fn test_declared_record_types() {
    let mut registry = TypeRegistry::new();
    let shape = registry.declare("Shape", None).unwrap();
    let circle = registry.declare("Circle", Some(&shape)).unwrap();
    let square = registry.declare("Square", Some(&shape)).unwrap();

    let area = defgeneric("area", &["s"]);
    area.primary([shape.clone()], |_, _| Ok(text("unknown shape")))
        .unwrap()
        .primary([circle.clone()], |_, args| {
            let r = field_i64(&args[0], "r")?;
            Ok(int(3 * r * r))
        })
        .unwrap();

    let c = Value::instance(circle, [("r", int(2))]);
    let s = Value::instance(square, [("side", int(2))]);
    assert_eq!(area.call(&[c]).unwrap(), int(12));
    assert_eq!(area.call(&[s]).unwrap(), text("unknown shape"));
    assert!(area.call(&[obj([("r", int(2))])]).is_err());
}

#[test]
fn test_any_matches_null_and_absent() {
    let marker = Symbol::new("4");
    let expected = Value::from(marker.clone());
    let gf = defgeneric("foobar", &["a", "b"]);
    gf.primary([Type::any(), Type::any()], move |_, _| Ok(Value::from(marker.clone())))
        .unwrap();
    assert_eq!(gf.call(&[Value::Null, Value::Null]).unwrap(), expected);
    assert_eq!(gf.call(&[Value::Absent, Value::Null]).unwrap(), expected);
}

#[test]
fn test_scalar_kinds_match_their_types() {
    let gf = defgeneric("kind", &["x"]);
    for (ty, name) in [
        (Type::boolean(), "boolean"),
        (Type::number(), "number"),
        (Type::string(), "string"),
        (Type::symbol(), "symbol"),
        (Type::bigint(), "bigint"),
        (Type::array(), "array"),
        (Type::null(), "null"),
    ] {
        gf.primary([ty], move |_, _| Ok(text(name))).unwrap();
    }

    let cases = [
        (Value::Bool(false), "boolean"),
        (int(1), "number"),
        (Value::F64(1.5), "number"),
        (text("s"), "string"),
        (Value::from(Symbol::for_name("iterator")), "symbol"),
        (Value::from(num_bigint::BigInt::from(4)), "bigint"),
        (Value::from(vec![1i64, 2]), "array"),
        (Value::Null, "null"),
    ];
    for (arg, expected) in cases {
        assert_eq!(as_string(gf.call(&[arg])), expected);
    }
}

#[test]
fn test_opaque_argument_is_unhandled() {
    let gf = defgeneric("f", &["x"]);
    gf.primary([Type::any()], |_, _| Ok(Value::Null)).unwrap();
    for _ in 0..2 {
        let err = gf.call(&[Value::opaque(std::time::Duration::from_secs(1))]).unwrap_err();
        assert!(matches!(err, DispatchError::UnhandledArgumentKind { .. }), "{:?}", err);
    }
}

// ==================== Shapes ====================

fn sum_ab(args: &[Value]) -> DispatchResult<Value> {
    Ok(int(field_i64(&args[0], "a")? + field_i64(&args[0], "b")?))
}

#[test]
fn test_shape_with_fallback() {
    let gf = defgeneric("foobar", &["a"]);
    gf.primary([shape!["a", "b"]], |_, args| sum_ab(args))
        .unwrap()
        .primary([Type::any()], |_, _| Ok(Value::Null))
        .unwrap();

    assert_eq!(gf.call(&[obj([("a", int(1)), ("b", int(2))])]).unwrap(), int(3));
    assert_eq!(
        gf.call(&[obj([("a", int(1)), ("b", int(2)), ("c", int(3))])]).unwrap(),
        int(3)
    );
    assert_eq!(gf.call(&[obj([("a", int(1))])]).unwrap(), Value::Null);
}

#[test]
fn test_object_fallback_covers_records_only() {
    let gf = defgeneric("kind", &["x"]);
    gf.primary([shape![("type", "a")]], |_, _| Ok(text("a")))
        .unwrap()
        .primary([Type::object()], |_, _| Ok(text("record")))
        .unwrap();

    assert_eq!(as_string(gf.call(&[obj([("type", text("a"))])])), "a");
    assert_eq!(as_string(gf.call(&[obj([("type", text("b"))])])), "record");
    for arg in [int(42), text("a"), Value::Null, Value::from(vec![1, 2])] {
        let err = gf.call(&[arg]).unwrap_err();
        assert!(matches!(err, DispatchError::NoApplicableMethod { .. }), "{:?}", err);
    }

    gf.primary([Type::any()], |_, _| Ok(text("anything"))).unwrap();
    assert_eq!(as_string(gf.call(&[int(42)])), "anything");
    assert_eq!(as_string(gf.call(&[obj([("type", text("b"))])])), "record");
}

#[test]
fn test_shape_value_constraints() {
    let gf = defgeneric("foobar", &["a"]);
    gf.primary([shape![("a", 1), "b"]], |_, args| sum_ab(args))
        .unwrap()
        .primary([Type::any()], |_, _| Ok(Value::Null))
        .unwrap();

    assert_eq!(gf.call(&[obj([("a", int(1)), ("b", int(3))])]).unwrap(), int(4));
    assert_eq!(gf.call(&[obj([("a", int(2)), ("b", int(3))])]).unwrap(), Value::Null);
}

#[test]
fn test_shape_null_requirement() {
    let gf = defgeneric("foobar", &["a"]);
    gf.primary([shape![("a", Value::Null), "b"]], |_, args| {
        Ok(args[0].field("b").cloned().unwrap_or(Value::Null))
    })
    .unwrap()
    .primary([Type::any()], |_, _| Ok(Value::Null))
    .unwrap();

    assert_eq!(gf.call(&[obj([("a", Value::Null), ("b", int(3))])]).unwrap(), int(3));
}

#[test]
fn test_shape_absent_requirement_means_present() {
    let gf = defgeneric("foobar", &["a"]);
    gf.primary([shape![("a", Value::Absent), "b"]], |_, args| {
        Ok(args[0].field("b").cloned().unwrap_or(Value::Null))
    })
    .unwrap()
    .primary([Type::any()], |_, _| Ok(Value::Null))
    .unwrap();

    assert_eq!(gf.call(&[obj([("b", int(5))])]).unwrap(), Value::Null);
    assert_eq!(gf.call(&[obj([("a", Value::Absent), ("b", int(5))])]).unwrap(), Value::Null);
    assert_eq!(gf.call(&[obj([("a", int(0)), ("b", int(5))])]).unwrap(), int(5));
}

#[test]
fn test_shape_precedence() {
    let gf = defgeneric("foobar4", &["a"]);
    gf.primary([shape!["a"]], |_, args| Ok(int(field_i64(&args[0], "a")?)))
        .unwrap()
        .primary([shape!["a", "b"]], |_, args| sum_ab(args))
        .unwrap()
        .primary([Type::any()], |_, _| Ok(Value::Null))
        .unwrap();
    assert_eq!(gf.call(&[obj([("a", int(1)), ("b", int(3))])]).unwrap(), int(4));

    let gf = defgeneric("foobar", &["a"]);
    gf.primary([shape!["a", "b"]], |_, args| sum_ab(args))
        .unwrap()
        .primary([shape!["b"]], |_, args| Ok(int(field_i64(&args[0], "b")?)))
        .unwrap();
    assert_eq!(gf.call(&[obj([("a", int(1)), ("b", int(2))])]).unwrap(), int(3));
}

#[test]
fn test_shape_chain_through_call_next() {
    let gf = defgeneric("foobar", &["a"]);
    let prefixed = |prefix: &'static str| {
        move |ctx: &CallContext<'_>, _: &[Value]| -> DispatchResult<Value> {
            let rest = as_string(ctx.call_next());
            Ok(Value::from(format!("{}{}", prefix, rest)))
        }
    };
    gf.primary([shape!["a"]], prefixed("a"))
        .unwrap()
        .primary([shape!["a", "b", "c"]], prefixed("c"))
        .unwrap()
        .primary([shape!["a", "b"]], prefixed("b"))
        .unwrap()
        .primary([Type::any()], |_, _| Ok(text("d")))
        .unwrap();

    let arg = obj([("a", Value::Bool(true)), ("b", Value::Null), ("c", int(3))]);
    assert_eq!(as_string(gf.call(&[arg])), "cbad");
}

// ==================== Exact Values ====================

#[test]
fn test_eql_basics() {
    let gf = defgeneric("foobar", &["a"]);
    gf.primary([Specializer::eql("foo")], |_, _| Ok(int(3))).unwrap();
    assert_eq!(gf.call(&[text("foo")]).unwrap(), int(3));

    let gf = defgeneric("foobar", &["a"]);
    gf.primary([Specializer::eql(5)], |_, _| Ok(int(3))).unwrap();
    assert_eq!(gf.call(&[int(5)]).unwrap(), int(3));
    assert_eq!(gf.call(&[Value::F64(5.0)]).unwrap(), int(3));
}

#[test]
fn test_eql_beats_its_type() {
    let cases: Vec<(Type, Value)> = vec![
        (Type::symbol(), Value::from(Symbol::for_name("iterator"))),
        (Type::boolean(), Value::Bool(false)),
        (Type::boolean(), Value::Bool(true)),
        (Type::string(), text("5")),
        (Type::number(), int(5)),
    ];
    for (ty, value) in cases {
        let gf = defgeneric("foobar", &["a"]);
        gf.primary([Specializer::of(ty)], |_, _| Ok(int(2)))
            .unwrap()
            .primary([Specializer::Eql(value.clone())], |_, _| Ok(int(3)))
            .unwrap();
        assert_eq!(gf.call(&[value]).unwrap(), int(3));
    }
}

#[test]
fn test_eql_on_records_uses_identity() {
    let origin = obj([("x", int(0)), ("y", int(0))]);
    let gf = defgeneric("describe", &["p"]);
    gf.primary([Specializer::Eql(origin.clone())], |_, _| Ok(text("origin")))
        .unwrap()
        .primary([Type::object()], |_, _| Ok(text("point")))
        .unwrap();

    assert_eq!(as_string(gf.call(&[origin])), "origin");
    assert_eq!(as_string(gf.call(&[obj([("x", int(0)), ("y", int(0))])])), "point");
}

// ==================== Custom Specializers ====================

/// Matches one string exactly and ranks above every nominal type.
#[derive(Debug)]
struct StrEql(&'static str);

impl CustomSpecializer for StrEql {
    fn matches(&self, value: &Value) -> DispatchResult<bool> {
        Ok(value.as_str() == Some(self.0))
    }

    fn is_more_specific_than(&self, other: &Specializer) -> Option<bool> {
        match other {
            Specializer::Type(_) => Some(true),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        format!("StrEql({})", self.0)
    }
}

#[test]
fn test_custom_specializer() {
    let gf = defgeneric("foobar", &["a"]);
    gf.primary([Specializer::custom(StrEql("foo"))], |_, _| Ok(int(3)))
        .unwrap();
    assert_eq!(gf.call(&[text("foo")]).unwrap(), int(3));
    assert_eq!(Specializer::custom(StrEql("foo")).to_string(), "StrEql(foo)");
}

#[test]
fn test_custom_specializer_ranked_against_types() {
    let gf = defgeneric("foobar", &["a"]);
    gf.primary([Type::any()], |_, _| Ok(int(1)))
        .unwrap()
        .primary([Type::string()], |_, _| Ok(int(2)))
        .unwrap()
        .primary([Specializer::custom(StrEql("foo"))], |_, _| Ok(int(3)))
        .unwrap();

    assert_eq!(gf.call(&[text("foobar")]).unwrap(), int(2));
    assert_eq!(gf.call(&[text("foo")]).unwrap(), int(3));
    assert_eq!(gf.call(&[int(1)]).unwrap(), int(1));
}

// ==================== Multiple Positions ====================

#[test]
fn test_leftmost_position_decides() {
    let gf = defgeneric("collide", &["a", "b"]);
    gf.primary([Type::string(), Type::any()], |_, _| Ok(text("string-left")))
        .unwrap()
        .primary([Type::any(), Type::string()], |_, _| Ok(text("string-right")))
        .unwrap();
    assert_eq!(as_string(gf.call(&[text("x"), text("y")])), "string-left");
    assert_eq!(as_string(gf.call(&[int(1), text("y")])), "string-right");
}

#[test]
fn test_ties_keep_registration_order() {
    let gf = defgeneric("tie", &["a"]);
    gf.primary([shape!["a"]], |_, _| Ok(text("first")))
        .unwrap()
        .primary([shape!["b"]], |_, _| Ok(text("second")))
        .unwrap();
    let both = obj([("a", int(1)), ("b", int(2))]);
    assert_eq!(as_string(gf.call(&[both])), "first");
}
