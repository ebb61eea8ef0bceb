//! Constant evaluation with Python semantics.
//!
//! Used for two things: resolving the right-hand side of assignment
//! statements into the translation environment, and folding operator trees
//! built only from literals. Calls are never evaluated.

use std::collections::HashMap;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::ast::{BinOperator, CmpOperator, ExprNode, UnaryOperator};
use crate::value::{Number, Value};

/// Evaluation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("name '{0}' is not bound")]
    Unbound(String),

    #[error("{0} cannot be evaluated as a constant")]
    NotConstant(String),

    #[error("unsupported operand types for {op}: '{left}' and '{right}'")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("bad operand type for unary {op}: '{operand}'")]
    BadOperand {
        op: &'static str,
        operand: &'static str,
    },

    #[error("division by zero")]
    ZeroDivision,

    #[error("result of {0} is too large")]
    Overflow(&'static str),

    #[error("index {index} out of range for {container}")]
    IndexOutOfRange {
        index: i64,
        container: &'static str,
    },

    #[error("key not found in dict")]
    KeyNotFound,
}

/// Identifier bindings known at translation time.
///
/// Populated only by assignment statements whose right-hand side evaluated
/// completely.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind (or rebind) a name.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Look a name up.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Drop every binding.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}

/// Evaluate an expression to a concrete value.
pub fn evaluate(node: &ExprNode, env: &Environment) -> Result<Value, EvalError> {
    match node {
        ExprNode::Constant(value) => Ok(value.clone()),
        ExprNode::Identifier(name) => env
            .lookup(name)
            .cloned()
            .ok_or_else(|| EvalError::Unbound(name.clone())),
        ExprNode::ListLit(items) => Ok(Value::List(evaluate_all(items, env)?)),
        ExprNode::TupleLit(items) => Ok(Value::Tuple(evaluate_all(items, env)?)),
        ExprNode::MapLit(entries) => {
            let mut evaluated = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                evaluated.push((evaluate(key, env)?, evaluate(value, env)?));
            }
            Ok(Value::dict(evaluated))
        }
        ExprNode::BinOp { left, op, right } => match op {
            BinOperator::And => {
                let l = evaluate(left, env)?;
                if l.is_truthy() {
                    evaluate(right, env)
                } else {
                    Ok(l)
                }
            }
            BinOperator::Or => {
                let l = evaluate(left, env)?;
                if l.is_truthy() {
                    Ok(l)
                } else {
                    evaluate(right, env)
                }
            }
            _ => binary_op(*op, &evaluate(left, env)?, &evaluate(right, env)?),
        },
        ExprNode::UnaryOp { op, operand } => unary_op(*op, &evaluate(operand, env)?),
        ExprNode::Compare { left, comparisons } => {
            let mut current = evaluate(left, env)?;
            for (op, right) in comparisons {
                let next = evaluate(right, env)?;
                if !compare(*op, &current, &next)? {
                    return Ok(Value::Bool(false));
                }
                current = next;
            }
            Ok(Value::Bool(true))
        }
        ExprNode::Subscript { value, index } => {
            subscript(&evaluate(value, env)?, &evaluate(index, env)?)
        }
        ExprNode::Call { func, .. } => {
            let name = match func.as_ref() {
                ExprNode::Identifier(name) => format!("call to '{}'", name),
                _ => "call".to_string(),
            };
            Err(EvalError::NotConstant(name))
        }
        ExprNode::Attribute { attr, .. } => {
            Err(EvalError::NotConstant(format!("attribute '{}'", attr)))
        }
        ExprNode::SetLit(_) => Err(EvalError::NotConstant("set display".to_string())),
    }
}

fn evaluate_all(items: &[ExprNode], env: &Environment) -> Result<Vec<Value>, EvalError> {
    items.iter().map(|item| evaluate(item, env)).collect()
}

/// Largest integer result, in bits, that folding will produce.
pub const MAX_INT_BITS: u64 = 1 << 16;

/// Longest sequence that repetition will produce.
pub const MAX_SEQUENCE_LEN: usize = 1 << 20;

/// Apply a non-short-circuit binary operator.
pub fn binary_op(op: BinOperator, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let mismatch = || EvalError::TypeMismatch {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    };

    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return numeric_op(op, a, b).and_then(|v| v.ok_or_else(mismatch));
    }

    match (op, left, right) {
        (BinOperator::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (BinOperator::Add, Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinOperator::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::Tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinOperator::Mult, seq, count) | (BinOperator::Mult, count, seq)
            if matches!(count, Value::Int(_) | Value::Bool(_))
                && matches!(seq, Value::Str(_) | Value::List(_) | Value::Tuple(_)) =>
        {
            let times = match count.as_number() {
                Some(Number::Int(n)) if n.is_negative() => 0,
                Some(Number::Int(n)) => n.to_usize().ok_or(EvalError::Overflow("*"))?,
                _ => 0,
            };
            repeat(seq, times)
        }
        _ => Err(mismatch()),
    }
}

/// Sequence repetition, refusing results longer than [`MAX_SEQUENCE_LEN`].
fn repeat(seq: &Value, times: usize) -> Result<Value, EvalError> {
    let len = match seq {
        Value::Str(s) => s.len(),
        Value::List(items) | Value::Tuple(items) => items.len(),
        other => return Ok(other.clone()),
    };
    len.checked_mul(times)
        .filter(|total| *total <= MAX_SEQUENCE_LEN)
        .ok_or(EvalError::Overflow("*"))?;

    Ok(match seq {
        Value::Str(s) => Value::Str(s.repeat(times)),
        Value::List(items) => Value::List(repeat_items(items, times)),
        Value::Tuple(items) => Value::Tuple(repeat_items(items, times)),
        other => other.clone(),
    })
}

fn repeat_items(items: &[Value], times: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend(items.iter().cloned());
    }
    out
}

/// Numeric operators; `Ok(None)` means the operator does not apply to numbers.
fn numeric_op(op: BinOperator, a: Number, b: Number) -> Result<Option<Value>, EvalError> {
    use Number::{Float, Int};

    let value = match (op, a, b) {
        (BinOperator::Add, Int(x), Int(y)) => Value::Int(x + y),
        (BinOperator::Sub, Int(x), Int(y)) => Value::Int(x - y),
        (BinOperator::Mult, Int(x), Int(y)) => {
            check_bits(x.bits().saturating_add(y.bits()), "*")?;
            Value::Int(x * y)
        }
        (BinOperator::Add, x, y) => Value::Float(x.as_f64() + y.as_f64()),
        (BinOperator::Sub, x, y) => Value::Float(x.as_f64() - y.as_f64()),
        (BinOperator::Mult, x, y) => Value::Float(x.as_f64() * y.as_f64()),
        (BinOperator::Div, x, y) => {
            if y.as_f64() == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            Value::Float(x.as_f64() / y.as_f64())
        }
        (BinOperator::FloorDiv, Int(x), Int(y)) => {
            if y.is_zero() {
                return Err(EvalError::ZeroDivision);
            }
            Value::Int(x.div_floor(&y))
        }
        (BinOperator::FloorDiv, x, y) => {
            if y.as_f64() == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            Value::Float((x.as_f64() / y.as_f64()).floor())
        }
        (BinOperator::Mod, Int(x), Int(y)) => {
            if y.is_zero() {
                return Err(EvalError::ZeroDivision);
            }
            Value::Int(x.mod_floor(&y))
        }
        (BinOperator::Mod, x, y) => {
            let (x, y) = (x.as_f64(), y.as_f64());
            if y == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            Value::Float(x - y * (x / y).floor())
        }
        (BinOperator::Pow, Int(x), Int(y)) if !y.is_negative() => Value::Int(int_pow(&x, &y)?),
        (BinOperator::Pow, x, y) => {
            if x.as_f64() == 0.0 && y.as_f64() < 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            Value::Float(x.as_f64().powf(y.as_f64()))
        }
        (BinOperator::BitAnd, Int(x), Int(y)) => Value::Int(x & y),
        (BinOperator::BitOr, Int(x), Int(y)) => Value::Int(x | y),
        (BinOperator::BitXor, Int(x), Int(y)) => Value::Int(x ^ y),
        (BinOperator::LShift, Int(x), Int(y)) => {
            let shift = y.to_usize().ok_or(EvalError::Overflow("<<"))?;
            check_bits(x.bits().saturating_add(shift as u64), "<<")?;
            Value::Int(x << shift)
        }
        (BinOperator::RShift, Int(x), Int(y)) => {
            if y.is_negative() {
                return Err(EvalError::Overflow(">>"));
            }
            match y.to_usize() {
                Some(shift) => Value::Int(x >> shift),
                None if x.is_negative() => Value::int(-1),
                None => Value::int(0),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn check_bits(bits: u64, op: &'static str) -> Result<(), EvalError> {
    if bits > MAX_INT_BITS {
        Err(EvalError::Overflow(op))
    } else {
        Ok(())
    }
}

/// Non-negative integer power, bounded by [`MAX_INT_BITS`].
fn int_pow(base: &BigInt, exp: &BigInt) -> Result<BigInt, EvalError> {
    if base.is_zero() {
        return Ok(if exp.is_zero() { BigInt::one() } else { BigInt::zero() });
    }
    if base.is_one() {
        return Ok(BigInt::one());
    }
    if *base == -BigInt::one() {
        return Ok(if exp.is_even() { BigInt::one() } else { -BigInt::one() });
    }
    let exp = exp.to_u32().ok_or(EvalError::Overflow("**"))?;
    check_bits(base.bits().saturating_mul(u64::from(exp)), "**")?;
    Ok(base.pow(exp))
}

/// Apply a prefix operator.
pub fn unary_op(op: UnaryOperator, operand: &Value) -> Result<Value, EvalError> {
    let bad = || EvalError::BadOperand {
        op: op.symbol(),
        operand: operand.type_name(),
    };
    match (op, operand.as_number()) {
        (UnaryOperator::Not, _) => Ok(Value::Bool(!operand.is_truthy())),
        (UnaryOperator::Neg, Some(Number::Int(i))) => Ok(Value::Int(-i)),
        (UnaryOperator::Neg, Some(Number::Float(f))) => Ok(Value::Float(-f)),
        (UnaryOperator::Pos, Some(Number::Int(i))) => Ok(Value::Int(i)),
        (UnaryOperator::Pos, Some(Number::Float(f))) => Ok(Value::Float(f)),
        (UnaryOperator::Invert, Some(Number::Int(i))) => Ok(Value::Int(-(i + BigInt::one()))),
        _ => Err(bad()),
    }
}

/// Apply one link of a comparison chain.
pub fn compare(op: CmpOperator, left: &Value, right: &Value) -> Result<bool, EvalError> {
    let unorderable = || EvalError::TypeMismatch {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    };
    match op {
        CmpOperator::Eq | CmpOperator::Is => Ok(left == right),
        CmpOperator::NotEq | CmpOperator::IsNot => Ok(left != right),
        CmpOperator::Lt => Ok(left.partial_cmp_py(right).ok_or_else(unorderable)?.is_lt()),
        CmpOperator::LtE => Ok(left.partial_cmp_py(right).ok_or_else(unorderable)?.is_le()),
        CmpOperator::Gt => Ok(left.partial_cmp_py(right).ok_or_else(unorderable)?.is_gt()),
        CmpOperator::GtE => Ok(left.partial_cmp_py(right).ok_or_else(unorderable)?.is_ge()),
        CmpOperator::In => contains(right, left).ok_or_else(unorderable),
        CmpOperator::NotIn => contains(right, left).map(|b| !b).ok_or_else(unorderable),
    }
}

fn contains(container: &Value, item: &Value) -> Option<bool> {
    match (container, item) {
        (Value::Str(haystack), Value::Str(needle)) => Some(haystack.contains(needle.as_str())),
        (Value::List(items), _) | (Value::Tuple(items), _) => Some(items.contains(item)),
        (Value::Dict(entries), _) => Some(entries.iter().any(|(k, _)| k == item)),
        _ => None,
    }
}

fn subscript(container: &Value, index: &Value) -> Result<Value, EvalError> {
    let position = |len: usize| -> Result<usize, EvalError> {
        let i = match index.as_number() {
            Some(Number::Int(i)) => i.to_i64().ok_or(EvalError::Overflow("[]"))?,
            _ => {
                return Err(EvalError::TypeMismatch {
                    op: "[]",
                    left: container.type_name(),
                    right: index.type_name(),
                })
            }
        };
        let len_i = i64::try_from(len).map_err(|_| EvalError::Overflow("[]"))?;
        let resolved = if i < 0 { i + len_i } else { i };
        if resolved < 0 || resolved >= len_i {
            return Err(EvalError::IndexOutOfRange {
                index: i,
                container: container.type_name(),
            });
        }
        Ok(resolved as usize)
    };

    match container {
        Value::List(items) | Value::Tuple(items) => Ok(items[position(items.len())?].clone()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[position(chars.len())?].to_string()))
        }
        Value::Dict(entries) => entries
            .iter()
            .find(|(k, _)| k == index)
            .map(|(_, v)| v.clone())
            .ok_or(EvalError::KeyNotFound),
        other => Err(EvalError::TypeMismatch {
            op: "[]",
            left: other.type_name(),
            right: index.type_name(),
        }),
    }
}
