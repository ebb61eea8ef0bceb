//! # vt-translate
//!
//! Lowers flat assertion bodies into a target-language test procedure.
//!
//! The target grammar forbids calls inside expressions, so every call is
//! hoisted into a preceding `var callN := f(args);` binding and the
//! expression refers to the binding instead.
//!
//! ```text
//! assert f(g(1), 2) == [3]
//!
//!     var call0 := g(1);
//!     var call1 := f(call0, 2);
//!     expect call1 == [3];
//! ```
//!
//! Layers, leaf first:
//!
//! - [`format`]: literal and operator rendering
//! - [`translate`]: expression lowering with hoisting and constant folding
//! - [`synth`]: statement sequences to an annotated test method

pub mod format;
pub mod synth;
pub mod translate;

use vt_core::{EvalError, Operator, ParseError};

pub use format::{format_float, format_literal, format_operator, format_string};
pub use synth::{
    library_preamble, synthesize, synthesize_source, TestProcedure, LIBRARY_IMPORTS,
    OUTPUT_FUNCTIONS,
};
pub use translate::{
    translate, CallCounter, HoistedStatement, Translation, TranslationContext, LIBRARY_HELPERS,
};

/// Translation failures.
///
/// Every variant means the assertion body has a shape the translator does
/// not handle; callers treat the whole test case as absent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("failed to parse assertions: {0}")]
    Parse(#[from] ParseError),

    #[error("constant evaluation failed: {0}")]
    Eval(#[from] EvalError),

    #[error("operator '{0}' has no target-language equivalent")]
    UnsupportedOperator(Operator),

    #[error("{0} expressions cannot be translated")]
    UnsupportedNode(&'static str),

    #[error("identifier '{0}' is used before assignment")]
    UnboundIdentifier(String),

    #[error("only calls to plain function names can be hoisted")]
    UnsupportedCallee,

    #[error("keyword argument '{keyword}' in call to '{callee}'")]
    KeywordArgument { callee: String, keyword: String },

    #[error("assignment target must be a plain name, found {0}")]
    UnsupportedAssignTarget(&'static str),

    #[error("unsupported statement '{keyword}' at line {line}")]
    UnsupportedStatement { keyword: String, line: usize },

    #[error("bare {0} statement is not an output call")]
    UnsupportedExpressionStatement(&'static str),

    #[error("real value {0} has no finite literal")]
    NonFiniteFloat(f64),

    #[error("membership test of multi-character string {0:?}")]
    SubstringMembership(String),
}
