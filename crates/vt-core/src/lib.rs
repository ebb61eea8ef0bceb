//! # vt-core
//!
//! Source-language front end for assertion translation.
//!
//! The source language is the assertion subset of Python that test bodies are
//! written in: `assert` statements, simple `name = expr` bindings and bare
//! output calls, over calls, comparisons, literals, collections and
//! arithmetic/boolean operators.
//!
//! ## Pipeline position
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Assertion  │ ──> │   vt-core   │ ──> │vt-translate │
//! │    text     │     │ parse/eval  │     │ lower/synth │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! - [`parse_program`] turns text into [`Stmt`]s holding [`ExprNode`] trees.
//! - [`evaluate`] folds an expression to a [`Value`] with Python semantics,
//!   which is how assignment right-hand sides and constant subtrees are
//!   resolved before translation.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{BinOperator, CmpOperator, ExprNode, Operator, Stmt, UnaryOperator};
pub use eval::{evaluate, Environment, EvalError};
pub use lexer::{Token, TokenKind};
pub use parser::{parse_expression, parse_program, ParseError};
pub use value::{Number, Value};

pub use num_bigint::BigInt;
