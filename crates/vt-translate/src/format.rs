//! Literal and operator rendering.

use vt_core::{BinOperator, CmpOperator, Operator, UnaryOperator, Value};

use crate::TranslateError;

/// Fractional digits used for every real literal.
pub const FLOAT_PRECISION: usize = 8;

/// Render a concrete value as a target-language literal.
pub fn format_literal(value: &Value) -> String {
    match value {
        Value::None => "None".to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        Value::Str(s) => format_string(s),
        Value::List(items) => format!("[{}]", join(items)),
        Value::Tuple(items) => format!("({})", join(items)),
        Value::Dict(entries) => {
            let body = entries
                .iter()
                .map(|(k, v)| format!("{} := {}", format_literal(k), format_literal(v)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("map[{}]", body)
        }
    }
}

fn join(items: &[Value]) -> String {
    items
        .iter()
        .map(format_literal)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fixed-precision real literal, never in scientific notation.
pub fn format_float(value: f64) -> String {
    format!("{:.*}", FLOAT_PRECISION, value)
}

/// Double-quoted string literal.
pub fn format_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Map a source operator to its target token.
///
/// Floor division, power, bitwise operators and `~` have no direct target
/// token; they only survive translation inside folded constant subtrees.
pub fn format_operator(op: Operator) -> Result<&'static str, TranslateError> {
    let token = match op {
        Operator::Binary(op) => match op {
            BinOperator::Add => "+",
            BinOperator::Sub => "-",
            BinOperator::Mult => "*",
            BinOperator::Div => "/",
            BinOperator::Mod => "%",
            BinOperator::And => "&&",
            BinOperator::Or => "||",
            _ => return Err(TranslateError::UnsupportedOperator(op.into())),
        },
        Operator::Unary(op) => match op {
            UnaryOperator::Neg => "-",
            UnaryOperator::Pos => "+",
            UnaryOperator::Not => "!",
            UnaryOperator::Invert => return Err(TranslateError::UnsupportedOperator(op.into())),
        },
        Operator::Compare(op) => match op {
            CmpOperator::Eq | CmpOperator::Is => "==",
            CmpOperator::NotEq | CmpOperator::IsNot => "!=",
            CmpOperator::Lt => "<",
            CmpOperator::LtE => "<=",
            CmpOperator::Gt => ">",
            CmpOperator::GtE => ">=",
            CmpOperator::In => "in",
            CmpOperator::NotIn => "!in",
        },
    };
    Ok(token)
}
