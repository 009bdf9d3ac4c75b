//! Dynamic value semantics for the evaluator.
//!
//! Values are `serde_json::Value`s. A missing field reads as `null`, and
//! `null` is the identity of every accumulating update.

use std::borrow::Cow;
use std::cmp::Ordering;

use rhyme_ir::BinaryOp;
use serde_json::Value;

use crate::EvalError;

/// Converts `f` to a JSON number, preferring an integer representation.
pub fn number(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

/// The string form of an object key or loop variable.
pub fn key_string(key: &Value) -> Result<Cow<'_, str>, EvalError> {
    match key {
        Value::String(s) => Ok(Cow::Borrowed(s)),
        Value::Number(n) => Ok(Cow::Owned(n.to_string())),
        Value::Bool(b) => Ok(Cow::Owned(b.to_string())),
        other => Err(EvalError::InvalidKey(other.to_string())),
    }
}

/// `base[key]`, or `null` when absent.
pub fn index<'v>(base: &'v Value, key: &Value) -> Result<Option<&'v Value>, EvalError> {
    Ok(match base {
        Value::Object(map) => map.get(key_string(key)?.as_ref()),
        Value::Array(items) => key_string(key)?
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i)),
        _ => None,
    })
}

/// The keys a loop over `source` visits, in document order.
pub fn keys(source: &Value) -> Result<Vec<Value>, EvalError> {
    match source {
        Value::Object(map) => Ok(map.keys().map(|k| Value::String(k.clone())).collect()),
        Value::Array(items) => Ok((0..items.len())
            .map(|i| Value::String(i.to_string()))
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(EvalError::NotIterable(other.to_string())),
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Err(EvalError::Type {
            op: op.symbol(),
            lhs: lhs.to_string(),
            rhs: rhs.to_string(),
        });
    };
    Ok(number(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        _ => a / b,
    }))
}

/// Applies a binary operator.
///
/// `+` treats `null` as its identity and concatenates strings. The other
/// arithmetic operators propagate `null`.
pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Null, v) | (v, Value::Null) => Ok(v.clone()),
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            _ => arithmetic(op, lhs, rhs),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            if lhs.is_null() || rhs.is_null() {
                Ok(Value::Null)
            } else {
                arithmetic(op, lhs, rhs)
            }
        }
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Lt => Ok(Value::Bool(compare(lhs, rhs) == Some(Ordering::Less))),
        BinaryOp::And => Ok(if truthy(lhs) { rhs.clone() } else { lhs.clone() }),
        BinaryOp::Or => Ok(if truthy(lhs) { lhs.clone() } else { rhs.clone() }),
    }
}

/// Keeps the larger (`keep == Greater`) or smaller of `acc` and `v`.
pub fn extremum(acc: &mut Value, v: Value, keep: Ordering) {
    if v.is_null() {
        return;
    }
    if acc.is_null() || compare(&v, acc) == Some(keep) {
        *acc = v;
    }
}
