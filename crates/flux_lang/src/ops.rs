//! Operator semantics shared by the rule kernel and the render evaluator
//!
//! `and`/`or` are short-circuited by the evaluators themselves; the
//! functions here only see fully evaluated operands.

use thiserror::Error;

use crate::ast::{BinaryOp, UnaryOp};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OpError {
    #[error("Type error: cannot apply '{op}' to {left} and {right}")]
    Binary {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("Type error: cannot apply '{op}' to {operand}")]
    Unary { op: &'static str, operand: &'static str },

    #[error("Division by zero")]
    DivisionByZero,
}

pub fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, OpError> {
    let mismatch = || OpError::Binary {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    };

    match op {
        BinaryOp::Add => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(a.checked_add(*b)
                .map(Value::Int)
                .unwrap_or(Value::Float(*a as f64 + *b as f64))),
            (Value::List(a), Value::List(b)) => Ok(Value::List(a.iter().chain(b).cloned().collect())),
            (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::String(format!(
                "{}{}",
                left.to_display_string(),
                right.to_display_string()
            ))),
            _ => numeric(left, right).map(|(a, b)| Value::Float(a + b)).ok_or_else(mismatch),
        },
        BinaryOp::Sub => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(a.checked_sub(*b)
                .map(Value::Int)
                .unwrap_or(Value::Float(*a as f64 - *b as f64))),
            _ => numeric(left, right).map(|(a, b)| Value::Float(a - b)).ok_or_else(mismatch),
        },
        BinaryOp::Mul => match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(a.checked_mul(*b)
                .map(Value::Int)
                .unwrap_or(Value::Float(*a as f64 * *b as f64))),
            _ => numeric(left, right).map(|(a, b)| Value::Float(a * b)).ok_or_else(mismatch),
        },
        BinaryOp::Div => {
            let (a, b) = numeric(left, right).ok_or_else(mismatch)?;
            if b == 0.0 {
                return Err(OpError::DivisionByZero);
            }
            match (left, right) {
                (Value::Int(x), Value::Int(y)) if x.checked_rem(*y) == Some(0) => Ok(x.checked_div(*y)
                    .map(Value::Int)
                    .unwrap_or(Value::Float(a / b))),
                _ => Ok(Value::Float(a / b)),
            }
        }
        BinaryOp::Mod => match (left, right) {
            (Value::Int(_), Value::Int(0)) => Err(OpError::DivisionByZero),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_rem(*b))),
            _ => {
                let (a, b) = numeric(left, right).ok_or_else(mismatch)?;
                if b == 0.0 {
                    return Err(OpError::DivisionByZero);
                }
                Ok(Value::Float(a % b))
            }
        },
        BinaryOp::Eq | BinaryOp::StrictEq => Ok(Value::Bool(left == right)),
        BinaryOp::Ne | BinaryOp::StrictNe => Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                _ => {
                    let (a, b) = numeric(left, right).ok_or_else(mismatch)?;
                    a.partial_cmp(&b)
                }
            };
            // NaN compares false against everything
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::And => Ok(Value::Bool(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Bool(left.is_truthy() || right.is_truthy())),
    }
}

pub fn eval_unary(op: UnaryOp, operand: &Value) -> Result<Value, OpError> {
    match (op, operand) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(n)) => Ok(n.checked_neg().map(Value::Int).unwrap_or(Value::Float(-(*n as f64)))),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, v) => Err(OpError::Unary {
            op: "-",
            operand: v.type_name(),
        }),
    }
}

fn numeric(left: &Value, right: &Value) -> Option<(f64, f64)> {
    match (left, right) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => Some((left.as_f64()?, right.as_f64()?)),
        _ => None,
    }
}
