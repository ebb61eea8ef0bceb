//! Expression lowering.
//!
//! [`translate`] turns one [`ExprNode`] into the imports it needs, the calls
//! that must be hoisted ahead of it, and the inline text that remains.
//! Hoisted statements appear in source evaluation order: arguments before
//! the call that consumes them, left operands before right operands.

use std::collections::BTreeSet;
use std::fmt;

use vt_core::{evaluate, BinOperator, CmpOperator, Environment, ExprNode, Operator, Value};

use crate::format::{format_literal, format_operator};
use crate::TranslateError;

/// Library helpers a test may call, and the module each one lives in.
pub const LIBRARY_HELPERS: &[(&str, &str)] = &[
    ("Pow", "Std.Arithmetic.Power"),
    ("Min", "Std.Math"),
    ("Max", "Std.Math"),
    ("Split", "Std.Collections.Seq"),
    ("Join", "Std.Collections.Seq"),
    ("Reverse", "Std.Collections.Seq"),
    ("MergeSortBy", "Std.Collections.Seq"),
    ("OfInt", "Std.Strings"),
    ("ToInt", "Std.Strings"),
];

/// A call lifted out of expression position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoistedStatement {
    pub name: String,
    pub value: String,
}

impl fmt::Display for HoistedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var {} := {};", self.name, self.value)
    }
}

/// Result of lowering one expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translation {
    /// Library modules referenced by hoisted calls.
    pub imports: BTreeSet<String>,
    /// Statements that must precede any use of `inline`.
    pub hoisted: Vec<HoistedStatement>,
    /// Call-free expression text.
    pub inline: String,
}

/// Allocates hoisted temporary names, unique within one test procedure.
#[derive(Debug, Clone, Default)]
pub struct CallCounter {
    next: usize,
}

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unused `callN` name.
    pub fn fresh(&mut self) -> String {
        let name = format!("call{}", self.next);
        self.next += 1;
        name
    }

    /// Number of names handed out so far.
    pub fn issued(&self) -> usize {
        self.next
    }
}

/// Per-synthesis state threaded through every translation.
#[derive(Debug, Clone, Default)]
pub struct TranslationContext {
    pub env: Environment,
    pub counter: CallCounter,
}

impl TranslationContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Lower an expression.
///
/// Fails on any node shape or operator without a target equivalent, and on
/// identifiers not bound in `ctx.env`.
pub fn translate(
    node: &ExprNode,
    ctx: &mut TranslationContext,
) -> Result<Translation, TranslateError> {
    let mut out = Translation::default();
    let inline = lower(node, ctx, &mut out)?;
    out.inline = inline;
    Ok(out)
}

fn lower(
    node: &ExprNode,
    ctx: &mut TranslationContext,
    out: &mut Translation,
) -> Result<String, TranslateError> {
    match node {
        ExprNode::Call { func, args, keywords } => {
            let callee = match func.as_ref() {
                ExprNode::Identifier(name) => name,
                _ => return Err(TranslateError::UnsupportedCallee),
            };
            if let Some((keyword, _)) = keywords.first() {
                return Err(TranslateError::KeywordArgument {
                    callee: callee.clone(),
                    keyword: keyword.clone(),
                });
            }

            let rendered = lower_all(args, ctx, out)?;
            if let Some((_, module)) = LIBRARY_HELPERS.iter().find(|(name, _)| name == callee) {
                out.imports.insert((*module).to_string());
            }

            let name = ctx.counter.fresh();
            out.hoisted.push(HoistedStatement {
                name: name.clone(),
                value: format!("{}({})", callee, rendered.join(", ")),
            });
            Ok(name)
        }
        ExprNode::Compare { left, comparisons } => {
            let mut text = operand(left, COMPARE, Side::Left, ctx, out)?;
            let mut lhs = left.as_ref();
            for (op, right) in comparisons {
                if matches!(op, CmpOperator::In | CmpOperator::NotIn) {
                    check_membership_needle(lhs, &ctx.env)?;
                }
                lhs = right;
                let token = format_operator(Operator::Compare(*op))?;
                let rhs = operand(right, COMPARE, Side::Right, ctx, out)?;
                text = format!("{} {} {}", text, token, rhs);
            }
            Ok(text)
        }
        ExprNode::Constant(value) => literal(value),
        ExprNode::ListLit(items) => Ok(format!("[{}]", lower_all(items, ctx, out)?.join(", "))),
        ExprNode::TupleLit(items) => Ok(format!("({})", lower_all(items, ctx, out)?.join(", "))),
        ExprNode::MapLit(entries) => {
            let mut rendered = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let key = lower(key, ctx, out)?;
                let value = lower(value, ctx, out)?;
                rendered.push(format!("{} := {}", key, value));
            }
            Ok(format!("map[{}]", rendered.join(", ")))
        }
        ExprNode::BinOp { left, op, right } => {
            if node.is_constant_tree() {
                return fold(node, &ctx.env);
            }
            let token = format_operator(Operator::Binary(*op))?;
            let parent = precedence(node);
            let lhs = operand(left, parent, Side::Left, ctx, out)?;
            let rhs = operand(right, parent, Side::Right, ctx, out)?;
            Ok(format!("{} {} {}", lhs, token, rhs))
        }
        ExprNode::UnaryOp { op, operand: inner } => {
            if node.is_constant_tree() {
                return fold(node, &ctx.env);
            }
            let token = format_operator(Operator::Unary(*op))?;
            Ok(format!("{}{}", token, operand(inner, UNARY, Side::Right, ctx, out)?))
        }
        ExprNode::Identifier(name) => match ctx.env.lookup(name) {
            Some(value) => literal(value),
            None => Err(TranslateError::UnboundIdentifier(name.clone())),
        },
        ExprNode::Attribute { .. } | ExprNode::Subscript { .. } | ExprNode::SetLit(_) => {
            Err(TranslateError::UnsupportedNode(node.kind()))
        }
    }
}

fn lower_all(
    items: &[ExprNode],
    ctx: &mut TranslationContext,
    out: &mut Translation,
) -> Result<Vec<String>, TranslateError> {
    items.iter().map(|item| lower(item, ctx, out)).collect()
}

const OR: u8 = 1;
const AND: u8 = 2;
const COMPARE: u8 = 3;
const UNARY: u8 = 6;
const ATOM: u8 = 7;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Binding strength of a node once rendered in the target language.
///
/// Prefix operators bind tighter than any binary operator there, unlike
/// `not` in the source.
fn precedence(node: &ExprNode) -> u8 {
    if node.is_constant_tree() {
        return ATOM;
    }
    match node {
        ExprNode::BinOp { op, .. } => match op {
            BinOperator::Or => OR,
            BinOperator::And => AND,
            BinOperator::Add | BinOperator::Sub => 4,
            _ => 5,
        },
        ExprNode::Compare { .. } => COMPARE,
        ExprNode::UnaryOp { .. } => UNARY,
        _ => ATOM,
    }
}

/// Lower a subexpression that sits next to an operator.
///
/// Mixed `&&`/`||` are always parenthesized, as are nested comparisons,
/// since the target reads `a < b == c` as a chain.
fn operand(
    node: &ExprNode,
    parent: u8,
    side: Side,
    ctx: &mut TranslationContext,
    out: &mut Translation,
) -> Result<String, TranslateError> {
    let text = lower(node, ctx, out)?;
    let child = precedence(node);
    let mixed_boolean = parent <= AND && child <= AND && child != parent;
    let wrap = child < parent
        || (child == parent && (side == Side::Right || parent == COMPARE))
        || mixed_boolean
        || (child == ATOM && text.starts_with('-'));
    if wrap {
        Ok(format!("({})", text))
    } else {
        Ok(text)
    }
}

/// Evaluate a constant-only operator tree and render the result.
fn fold(node: &ExprNode, env: &Environment) -> Result<String, TranslateError> {
    literal(&evaluate(node, env)?)
}

/// Render a value, refusing infinities and NaN anywhere inside it.
fn literal(value: &Value) -> Result<String, TranslateError> {
    if let Some(f) = non_finite(value) {
        return Err(TranslateError::NonFiniteFloat(f));
    }
    Ok(format_literal(value))
}

fn non_finite(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) if !f.is_finite() => Some(*f),
        Value::List(items) | Value::Tuple(items) => items.iter().find_map(non_finite),
        Value::Dict(entries) => entries
            .iter()
            .find_map(|(k, v)| non_finite(k).or_else(|| non_finite(v))),
        _ => None,
    }
}

/// Sequence membership matches single elements only, so a string needle
/// must be one character; the source's substring test has no equivalent.
fn check_membership_needle(needle: &ExprNode, env: &Environment) -> Result<(), TranslateError> {
    let text = match needle {
        ExprNode::Constant(Value::Str(s)) => s,
        ExprNode::Identifier(name) => match env.lookup(name) {
            Some(Value::Str(s)) => s,
            _ => return Ok(()),
        },
        _ => return Ok(()),
    };
    if text.chars().count() == 1 {
        Ok(())
    } else {
        Err(TranslateError::SubstringMembership(text.clone()))
    }
}
