//! Syntax tree for assertion bodies.
//!
//! Trees are owned by the statement that introduces them. Nothing is shared
//! between statements and there are no back-references.

use std::fmt;

use crate::value::Value;

/// Binary arithmetic, bitwise and boolean operators.
///
/// `and`/`or` are represented here as well so that boolean connectives share
/// the binary-operator path through evaluation and translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOperator {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
    And,
    Or,
}

impl BinOperator {
    /// Source spelling.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOperator::Add => "+",
            BinOperator::Sub => "-",
            BinOperator::Mult => "*",
            BinOperator::Div => "/",
            BinOperator::FloorDiv => "//",
            BinOperator::Mod => "%",
            BinOperator::Pow => "**",
            BinOperator::BitAnd => "&",
            BinOperator::BitOr => "|",
            BinOperator::BitXor => "^",
            BinOperator::LShift => "<<",
            BinOperator::RShift => ">>",
            BinOperator::And => "and",
            BinOperator::Or => "or",
        }
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    Neg,
    Pos,
    Invert,
}

impl UnaryOperator {
    /// Source spelling.
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOperator::Not => "not",
            UnaryOperator::Neg => "-",
            UnaryOperator::Pos => "+",
            UnaryOperator::Invert => "~",
        }
    }
}

/// Comparison operators, chainable as in `a < b <= c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

impl CmpOperator {
    /// Source spelling.
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOperator::Eq => "==",
            CmpOperator::NotEq => "!=",
            CmpOperator::Lt => "<",
            CmpOperator::LtE => "<=",
            CmpOperator::Gt => ">",
            CmpOperator::GtE => ">=",
            CmpOperator::In => "in",
            CmpOperator::NotIn => "not in",
            CmpOperator::Is => "is",
            CmpOperator::IsNot => "is not",
        }
    }
}

/// Any operator that can appear in an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Binary(BinOperator),
    Unary(UnaryOperator),
    Compare(CmpOperator),
}

impl From<BinOperator> for Operator {
    fn from(op: BinOperator) -> Self {
        Operator::Binary(op)
    }
}

impl From<UnaryOperator> for Operator {
    fn from(op: UnaryOperator) -> Self {
        Operator::Unary(op)
    }
}

impl From<CmpOperator> for Operator {
    fn from(op: CmpOperator) -> Self {
        Operator::Compare(op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Binary(op) => op.symbol(),
            Operator::Unary(op) => op.symbol(),
            Operator::Compare(op) => op.symbol(),
        };
        f.write_str(symbol)
    }
}

/// Expression node.
///
/// The first nine variants are the translatable grammar. `Attribute`,
/// `Subscript` and `SetLit` are recognized by the parser so that the
/// translator can reject them by name instead of failing to parse.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Call {
        func: Box<ExprNode>,
        args: Vec<ExprNode>,
        keywords: Vec<(String, ExprNode)>,
    },
    Compare {
        left: Box<ExprNode>,
        comparisons: Vec<(CmpOperator, ExprNode)>,
    },
    Constant(Value),
    ListLit(Vec<ExprNode>),
    TupleLit(Vec<ExprNode>),
    MapLit(Vec<(ExprNode, ExprNode)>),
    BinOp {
        left: Box<ExprNode>,
        op: BinOperator,
        right: Box<ExprNode>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<ExprNode>,
    },
    Identifier(String),
    Attribute {
        value: Box<ExprNode>,
        attr: String,
    },
    Subscript {
        value: Box<ExprNode>,
        index: Box<ExprNode>,
    },
    SetLit(Vec<ExprNode>),
}

impl ExprNode {
    /// Short variant name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ExprNode::Call { .. } => "call",
            ExprNode::Compare { .. } => "comparison",
            ExprNode::Constant(_) => "constant",
            ExprNode::ListLit(_) => "list",
            ExprNode::TupleLit(_) => "tuple",
            ExprNode::MapLit(_) => "dict",
            ExprNode::BinOp { .. } => "binary operation",
            ExprNode::UnaryOp { .. } => "unary operation",
            ExprNode::Identifier(_) => "identifier",
            ExprNode::Attribute { .. } => "attribute access",
            ExprNode::Subscript { .. } => "subscript",
            ExprNode::SetLit(_) => "set",
        }
    }

    /// True when the tree contains only constants combined by operators.
    ///
    /// Such trees are folded at translation time.
    pub fn is_constant_tree(&self) -> bool {
        match self {
            ExprNode::Constant(_) => true,
            ExprNode::BinOp { left, right, .. } => {
                left.is_constant_tree() && right.is_constant_tree()
            }
            ExprNode::UnaryOp { operand, .. } => operand.is_constant_tree(),
            _ => false,
        }
    }

    /// Callee name of a call whose function is a plain identifier.
    pub fn callee_name(&self) -> Option<&str> {
        match self {
            ExprNode::Call { func, .. } => match func.as_ref() {
                ExprNode::Identifier(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Top-level statement of an assertion body.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `assert test[, msg]`
    Assert {
        test: ExprNode,
        msg: Option<ExprNode>,
    },
    /// `a = b = value`
    Assign {
        targets: Vec<ExprNode>,
        value: ExprNode,
    },
    /// Bare expression, usually a call.
    Expr(ExprNode),
    /// Control flow, definitions, augmented assignment and the like.
    ///
    /// The body of a compound statement is consumed with its header.
    Unsupported { keyword: String, line: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> ExprNode {
        ExprNode::Constant(Value::int(v))
    }

    #[test]
    fn test_constant_tree_detection() {
        let folded = ExprNode::BinOp {
            left: Box::new(int(1)),
            op: BinOperator::Add,
            right: Box::new(ExprNode::UnaryOp {
                op: UnaryOperator::Neg,
                operand: Box::new(int(2)),
            }),
        };
        assert!(folded.is_constant_tree());

        let with_name = ExprNode::BinOp {
            left: Box::new(int(1)),
            op: BinOperator::Add,
            right: Box::new(ExprNode::Identifier("x".to_string())),
        };
        assert!(!with_name.is_constant_tree());
    }

    #[test]
    fn test_callee_name() {
        let call = ExprNode::Call {
            func: Box::new(ExprNode::Identifier("f".to_string())),
            args: vec![],
            keywords: vec![],
        };
        assert_eq!(call.callee_name(), Some("f"));
        assert_eq!(int(1).callee_name(), None);
    }

    #[test]
    fn test_operator_display() {
        assert_eq!(Operator::from(CmpOperator::NotIn).to_string(), "not in");
        assert_eq!(Operator::from(BinOperator::FloorDiv).to_string(), "//");
    }
}
