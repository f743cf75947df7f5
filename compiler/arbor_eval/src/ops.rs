//! Operator implementations.
//!
//! Direct pattern matching over the fixed set of value kinds. Numbers are
//! `f64` throughout; bitwise operators work on the truncated integer value.

use arbor_ir::{BinaryOp, CastKind, UnaryOp};

use crate::value::Value;
use crate::{EvalError, EvalResult};

fn mismatch(expected: &'static str, found: &Value) -> EvalError {
    EvalError::TypeMismatch {
        expected,
        found: found.type_name(),
    }
}

fn both_nums(lhs: &Value, rhs: &Value) -> EvalResult<(f64, f64)> {
    match (lhs, rhs) {
        (Value::Num(a), Value::Num(b)) => Ok((*a, *b)),
        (Value::Num(_), other) | (other, _) => Err(mismatch("number", other)),
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "bitwise operators act on the integral part"
)]
fn as_bits(n: f64) -> i64 {
    n as i64
}

#[expect(
    clippy::cast_precision_loss,
    reason = "results of bitwise operators on script integers fit in f64"
)]
fn from_bits(n: i64) -> f64 {
    n as f64
}

/// Identity for heap handles, value equality for primitives.
pub fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Num(a), Value::Num(b)) => a == b,
        _ => lhs == rhs,
    }
}

pub fn evaluate_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(a);
                joined.push_str(b);
                Ok(Value::str(&joined))
            }
            _ => both_nums(lhs, rhs).map(|(a, b)| Value::Num(a + b)),
        },
        BinaryOp::Sub => both_nums(lhs, rhs).map(|(a, b)| Value::Num(a - b)),
        BinaryOp::Mul => both_nums(lhs, rhs).map(|(a, b)| Value::Num(a * b)),
        BinaryOp::Div => both_nums(lhs, rhs).map(|(a, b)| Value::Num(a / b)),
        BinaryOp::Mod => both_nums(lhs, rhs).map(|(a, b)| Value::Num(a % b)),
        BinaryOp::Eq => Ok(Value::Bool(values_equal(lhs, rhs))),
        BinaryOp::NotEq => Ok(Value::Bool(!values_equal(lhs, rhs))),
        BinaryOp::Lt => both_nums(lhs, rhs).map(|(a, b)| Value::Bool(a < b)),
        BinaryOp::LtEq => both_nums(lhs, rhs).map(|(a, b)| Value::Bool(a <= b)),
        BinaryOp::Gt => both_nums(lhs, rhs).map(|(a, b)| Value::Bool(a > b)),
        BinaryOp::GtEq => both_nums(lhs, rhs).map(|(a, b)| Value::Bool(a >= b)),
        BinaryOp::BitAnd => {
            both_nums(lhs, rhs).map(|(a, b)| Value::Num(from_bits(as_bits(a) & as_bits(b))))
        }
        BinaryOp::BitOr => {
            both_nums(lhs, rhs).map(|(a, b)| Value::Num(from_bits(as_bits(a) | as_bits(b))))
        }
    }
}

pub fn evaluate_unary(op: UnaryOp, operand: &Value) -> EvalResult<Value> {
    match op {
        UnaryOp::Neg => operand
            .as_num()
            .map(|n| Value::Num(-n))
            .ok_or_else(|| mismatch("number", operand)),
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
    }
}

pub fn evaluate_cast(to: CastKind, operand: &Value) -> EvalResult<Value> {
    match to {
        CastKind::Int => operand
            .as_num()
            .map(|n| Value::Num(n.trunc()))
            .ok_or_else(|| mismatch("number", operand)),
        CastKind::Str => Ok(match operand {
            Value::Str(_) => operand.clone(),
            other => Value::str(&other.to_string()),
        }),
        CastKind::Bool => Ok(Value::Bool(operand.is_truthy())),
        // The hierarchy needs the class bindings; only the value kind is
        // checked here.
        CastKind::Class(_) => match operand {
            Value::Object(_) => Ok(operand.clone()),
            _ => Err(mismatch("object", operand)),
        },
    }
}
