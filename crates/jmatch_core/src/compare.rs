//! Type-coercing comparisons for filter operators
//!
//! Numbers of any backing (integer or float) coerce to floats before
//! comparison. Strings and bools keep their kind. Null and containers are not
//! comparable. Every function returns `None` for a bad comparison (mixed or
//! uncomparable kinds); filters treat that as a non-match, never as an error.

use crate::canonical::float_from_value;
use serde_json::Value;

/// An operand reduced to the kinds the comparison operators understand
enum Comparable<'a> {
    Number(f64),
    Str(&'a str),
    Bool(bool),
}

fn comparable(value: &Value) -> Option<Comparable<'_>> {
    match value {
        Value::Number(_) => float_from_value(value).map(Comparable::Number),
        Value::String(s) => Some(Comparable::Str(s)),
        Value::Bool(b) => Some(Comparable::Bool(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Structural equality for primitives of the same kind
pub fn equal(left: &Value, right: &Value) -> Option<bool> {
    match (comparable(left)?, comparable(right)?) {
        (Comparable::Number(a), Comparable::Number(b)) => Some(a == b),
        (Comparable::Str(a), Comparable::Str(b)) => Some(a == b),
        (Comparable::Bool(a), Comparable::Bool(b)) => Some(a == b),
        _ => None,
    }
}

pub fn not_equal(left: &Value, right: &Value) -> Option<bool> {
    equal(left, right).map(|eq| !eq)
}

/// Ordering is defined for two numbers or two strings; anything else is a bad
/// comparison
pub fn less(left: &Value, right: &Value) -> Option<bool> {
    match (comparable(left)?, comparable(right)?) {
        (Comparable::Number(a), Comparable::Number(b)) => Some(a < b),
        (Comparable::Str(a), Comparable::Str(b)) => Some(a < b),
        _ => None,
    }
}

pub fn less_equal(left: &Value, right: &Value) -> Option<bool> {
    match (comparable(left)?, comparable(right)?) {
        (Comparable::Number(a), Comparable::Number(b)) => Some(a <= b),
        (Comparable::Str(a), Comparable::Str(b)) => Some(a <= b),
        _ => None,
    }
}

pub fn greater(left: &Value, right: &Value) -> Option<bool> {
    less_equal(left, right).map(|le| !le)
}

pub fn greater_equal(left: &Value, right: &Value) -> Option<bool> {
    less(left, right).map(|lt| !lt)
}
