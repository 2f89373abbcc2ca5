use std::cmp::Ordering;

use regex::Regex;
use serde_json::{Map, Number, Value};

use super::parser::{BinaryOp, Node, UnaryOp};
use super::EvalError;

pub(crate) fn evaluate(node: &Node, fields: &Map<String, Value>) -> Result<Value, EvalError> {
    match node {
        Node::Literal(value) => Ok(value.clone()),
        Node::Variable(name) => fields
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownVariable(name.clone())),
        Node::Index(target, key) => {
            let target = evaluate(target, fields)?;
            let key = evaluate(key, fields)?;
            index(target, key)
        }
        Node::Array(items) => items
            .iter()
            .map(|item| evaluate(item, fields))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Node::Object(entries) => {
            let mut object = Map::new();
            for (key, value) in entries {
                object.insert(key.clone(), evaluate(value, fields)?);
            }
            Ok(Value::Object(object))
        }
        Node::Unary(op, operand) => {
            let operand = evaluate(operand, fields)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!expect_bool(&operand)?)),
                UnaryOp::Neg => number(-expect_number("-", &operand)?),
            }
        }
        Node::Binary(BinaryOp::And, lhs, rhs) => {
            if !expect_bool(&evaluate(lhs, fields)?)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(expect_bool(&evaluate(rhs, fields)?)?))
        }
        Node::Binary(BinaryOp::Or, lhs, rhs) => {
            if expect_bool(&evaluate(lhs, fields)?)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(expect_bool(&evaluate(rhs, fields)?)?))
        }
        Node::Binary(op, lhs, rhs) => {
            let lhs = evaluate(lhs, fields)?;
            let rhs = evaluate(rhs, fields)?;
            binary(*op, &lhs, &rhs)
        }
        Node::Regex(op, lhs, pattern) => match_regex(*op, &evaluate(lhs, fields)?, pattern.regex()),
        Node::Ternary(cond, then, otherwise) => {
            if expect_bool(&evaluate(cond, fields)?)? {
                evaluate(then, fields)
            } else {
                evaluate(otherwise, fields)
            }
        }
    }
}

fn index(target: Value, key: Value) -> Result<Value, EvalError> {
    match (target, key) {
        (Value::Object(mut map), Value::String(key)) => {
            map.remove(&key).ok_or(EvalError::MissingKey(key))
        }
        (Value::Array(mut items), Value::Number(n)) => {
            let idx = n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as usize)
                .filter(|i| *i < items.len())
                .ok_or_else(|| EvalError::IndexOutOfRange(n.to_string()))?;
            Ok(items.swap_remove(idx))
        }
        (target, key) => Err(EvalError::TypeMismatch {
            op: "[]",
            left: kind(&target),
            right: kind(&key),
        }),
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    let mismatch = || EvalError::TypeMismatch {
        op: op.symbol(),
        left: kind(lhs),
        right: kind(rhs),
    };

    match op {
        BinaryOp::Eq => Ok(Value::Bool(loosely_equal(lhs, rhs))),
        BinaryOp::NotEq => Ok(Value::Bool(!loosely_equal(lhs, rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (numeric(lhs), numeric(rhs), lhs, rhs) {
                (Some(a), Some(b), _, _) => a.partial_cmp(&b),
                (_, _, Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => return Err(mismatch()),
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Match | BinaryOp::NotMatch => {
            let Value::String(pattern) = rhs else {
                return Err(mismatch());
            };
            let re = Regex::new(pattern).map_err(|e| EvalError::InvalidRegex(e.to_string()))?;
            match_regex(op, lhs, &re)
        }
        BinaryOp::In => {
            let Value::Array(items) = rhs else {
                return Err(EvalError::ExpectedSequence { found: kind(rhs) });
            };
            Ok(Value::Bool(items.iter().any(|item| values_equal(lhs, item))))
        }
        BinaryOp::Add => match (numeric(lhs), numeric(rhs), lhs, rhs) {
            (Some(a), Some(b), _, _) => number(a + b),
            (_, _, Value::String(_), _) | (_, _, _, Value::String(_)) => {
                Ok(Value::String(display_value(lhs) + &display_value(rhs)))
            }
            _ => Err(mismatch()),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem | BinaryOp::Pow => {
            let (Some(a), Some(b)) = (numeric(lhs), numeric(rhs)) else {
                return Err(mismatch());
            };
            number(match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                _ => a.powf(b),
            })
        }
        // short-circuited in `evaluate`
        BinaryOp::And | BinaryOp::Or => Err(mismatch()),
    }
}

/// `=~` and `!~` against an already compiled pattern.
pub(crate) fn match_regex(op: BinaryOp, text: &Value, re: &Regex) -> Result<Value, EvalError> {
    let Value::String(text) = text else {
        return Err(EvalError::TypeMismatch {
            op: op.symbol(),
            left: kind(text),
            right: "string",
        });
    };
    let matched = re.is_match(text);
    Ok(Value::Bool(if op == BinaryOp::Match { matched } else { !matched }))
}

/// Numbers, and strings that parse as a finite number. Label values are
/// always strings, so `labels.replicas > 2` has to see a number.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(as_f64(n)),
        Value::String(s) => s.parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// `==` semantics: numeric when both sides read as numbers, structural otherwise.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x == y,
        _ => values_equal(a, b),
    }
}

/// Deep structural equality; numbers compare by value regardless of representation.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => as_f64(x) == as_f64(y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Renders a value the way it should appear inside a string: strings verbatim,
/// integral numbers without a fraction, composites as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            let f = as_f64(n);
            if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", f as i64)
            } else {
                n.to_string()
            }
        }
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

pub(crate) fn expect_bool(value: &Value) -> Result<bool, EvalError> {
    value
        .as_bool()
        .ok_or(EvalError::ExpectedBool { found: kind(value) })
}

fn expect_number(op: &'static str, value: &Value) -> Result<f64, EvalError> {
    numeric(value).ok_or(EvalError::TypeMismatch {
        op,
        left: kind(value),
        right: "none",
    })
}

fn number(f: f64) -> Result<Value, EvalError> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or(EvalError::NonFiniteNumber)
}

fn as_f64(n: &Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
