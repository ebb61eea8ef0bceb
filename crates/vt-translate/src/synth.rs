//! Assertion-block synthesis.
//!
//! Walks a flat statement list once. Assignments feed the translation
//! environment, asserts become `expect` lines preceded by their hoisted
//! calls, and output calls are dropped. Anything else rejects the whole
//! block.

use std::collections::BTreeSet;

use vt_core::{evaluate, parse_program, ExprNode, Stmt};

use crate::translate::{translate, TranslationContext};
use crate::TranslateError;

/// Modules imported ahead of every candidate program.
pub const LIBRARY_IMPORTS: &[&str] = &[
    "Std.Collections.Seq",
    "Std.Strings",
    "Std.Math",
    "Std.Arithmetic.Power",
];

/// Functions whose bare calls are dropped from the block.
///
/// Any other expression statement, a bare call to a different function
/// included, rejects the whole block with
/// [`TranslateError::UnsupportedExpressionStatement`].
pub const OUTPUT_FUNCTIONS: &[&str] = &["print"];

const TEST_METHOD: &str = "check";

/// A synthesized test method and the imports it relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestProcedure {
    /// Modules required beyond [`LIBRARY_IMPORTS`].
    pub imports: BTreeSet<String>,
    /// `method {:test} check() { ... }` text.
    pub method: String,
}

impl TestProcedure {
    /// Import declarations: the fixed library set, then any extras.
    pub fn preamble(&self) -> String {
        let extras = self
            .imports
            .iter()
            .map(String::as_str)
            .filter(|module| !LIBRARY_IMPORTS.contains(module));
        render_imports(LIBRARY_IMPORTS.iter().copied().chain(extras))
    }

    /// Preamble followed by the method.
    pub fn render(&self) -> String {
        format!("{}\n{}", self.preamble(), self.method)
    }
}

/// Import declarations for the fixed library set alone.
pub fn library_preamble() -> String {
    render_imports(LIBRARY_IMPORTS.iter().copied())
}

fn render_imports<'a>(modules: impl Iterator<Item = &'a str>) -> String {
    modules
        .map(|module| format!("import opened {}", module))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build a test procedure from parsed statements.
///
/// The translation environment and call counter start fresh for every call.
pub fn synthesize(statements: &[Stmt]) -> Result<TestProcedure, TranslateError> {
    let mut ctx = TranslationContext::new();
    let mut imports = BTreeSet::new();
    let mut hoisted = Vec::new();
    let mut expects = Vec::new();

    for statement in statements {
        match statement {
            Stmt::Assign { targets, value } => {
                let result = evaluate(value, &ctx.env)?;
                for target in targets {
                    match target {
                        ExprNode::Identifier(name) => ctx.env.bind(name.clone(), result.clone()),
                        other => return Err(TranslateError::UnsupportedAssignTarget(other.kind())),
                    }
                }
            }
            Stmt::Assert { test, .. } => {
                let translation = translate(test, &mut ctx)?;
                imports.extend(translation.imports);
                hoisted.extend(translation.hoisted);
                expects.push(format!("expect {};", translation.inline));
            }
            Stmt::Expr(expr) => match expr.callee_name() {
                Some(name) if OUTPUT_FUNCTIONS.contains(&name) => {}
                _ => return Err(TranslateError::UnsupportedExpressionStatement(expr.kind())),
            },
            Stmt::Unsupported { keyword, line } => {
                return Err(TranslateError::UnsupportedStatement {
                    keyword: keyword.clone(),
                    line: *line,
                });
            }
        }
    }

    let mut method = format!("method {{:test}} {}() {{\n", TEST_METHOD);
    for statement in &hoisted {
        method.push_str(&format!("  {}\n", statement));
    }
    for expect in &expects {
        method.push_str(&format!("  {}\n", expect));
    }
    method.push_str("}\n");

    Ok(TestProcedure { imports, method })
}

/// Parse assertion text and synthesize it.
pub fn synthesize_source(source: &str) -> Result<TestProcedure, TranslateError> {
    let statements = parse_program(source)?;
    synthesize(&statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vt_core::EvalError;

    #[test]
    fn test_hoisted_calls_precede_expects() {
        let proc = synthesize_source("assert f(1) == 2\nassert g(f(3)) > 0\n").unwrap();
        assert_eq!(
            proc.method,
            "method {:test} check() {\n\
             \x20 var call0 := f(1);\n\
             \x20 var call1 := f(3);\n\
             \x20 var call2 := g(call1);\n\
             \x20 expect call0 == 2;\n\
             \x20 expect call2 > 0;\n\
             }\n"
        );
    }

    #[test]
    fn test_assignments_bind_without_emitting() {
        let source = "xs = [1, 2, 3]\nn = len_of = 3\nassert count(xs) == n\n";
        let proc = synthesize_source(source).unwrap();
        assert!(proc.method.contains("var call0 := count([1, 2, 3]);"));
        assert!(proc.method.contains("expect call0 == 3;"));
        assert!(!proc.method.contains("xs"));
    }

    #[test]
    fn test_assignment_sees_earlier_bindings() {
        let proc = synthesize_source("a = 2\nb = a * 10\nassert f(b) == 1\n").unwrap();
        assert!(proc.method.contains("f(20)"));
    }

    #[test]
    fn test_assignment_from_call_fails() {
        let err = synthesize_source("x = f(1)\nassert x == 1\n").unwrap_err();
        assert!(matches!(err, TranslateError::Eval(_)));
    }

    #[test]
    fn test_output_calls_are_ignored() {
        let proc = synthesize_source("print('start')\nassert f() == 1\n").unwrap();
        assert!(!proc.method.contains("print"));
        assert!(proc.method.contains("expect call0 == 1;"));
    }

    #[test]
    fn test_control_flow_rejects_whole_block() {
        let source = "assert f(1) == 1\nfor i in range(3):\n    assert f(i) == i\n";
        let err = synthesize_source(source).unwrap_err();
        assert_eq!(
            err,
            TranslateError::UnsupportedStatement {
                keyword: "for".to_string(),
                line: 2,
            }
        );
    }

    #[test]
    fn test_other_bare_expressions_reject_block() {
        assert!(synthesize_source("f(1)\nassert g() == 1\n").is_err());
        assert!(synthesize_source("assert f() == 1\n3 + 4\n").is_err());
    }

    #[test]
    fn test_only_listed_output_functions_are_dropped() {
        let proc = synthesize_source("print(f(1), 'x')\nassert g() == 1\n").unwrap();
        assert!(!proc.method.contains("f(1)"));

        for source in ["log('x')\nassert g() == 1\n", "obj.print('x')\nassert g() == 1\n"] {
            assert!(
                matches!(
                    synthesize_source(source),
                    Err(TranslateError::UnsupportedExpressionStatement(_))
                ),
                "{} should be rejected",
                source
            );
        }
    }

    #[test]
    fn test_integer_results_keep_every_digit() {
        let proc = synthesize_source("assert factorial(25) == 15511210043330985984000000\n").unwrap();
        assert!(proc.method.contains("expect call0 == 15511210043330985984000000;"));

        let proc = synthesize_source("n = 2 ** 70\nassert f(n) == 1\n").unwrap();
        assert!(proc.method.contains("var call0 := f(1180591620717411303424);"));
    }

    #[test]
    fn test_oversized_assignment_is_an_error() {
        let err = synthesize_source("xs = [0] * 10 ** 18\nassert f(xs) == 1\n").unwrap_err();
        assert_eq!(err, TranslateError::Eval(EvalError::Overflow("*")));
    }

    #[test]
    fn test_infinite_assignment_is_refused_at_use() {
        let err = synthesize_source("x = 1e308 * 10\nassert f(x) == 1\n").unwrap_err();
        assert!(matches!(err, TranslateError::NonFiniteFloat(_)));
    }

    #[test]
    fn test_counter_resets_between_blocks() {
        let first = synthesize_source("assert f() == 1\n").unwrap();
        let second = synthesize_source("assert g() == 2\n").unwrap();
        assert!(first.method.contains("var call0 := f();"));
        assert!(second.method.contains("var call0 := g();"));
    }

    #[test]
    fn test_preamble_lists_fixed_imports_once() {
        let proc = synthesize_source("assert Max(1, f()) == 2\n").unwrap();
        assert!(proc.imports.contains("Std.Math"));
        assert_eq!(proc.preamble(), library_preamble());
        assert_eq!(proc.preamble().matches("import opened").count(), LIBRARY_IMPORTS.len());
        assert!(proc.render().starts_with("import opened Std.Collections.Seq\n"));
    }

    #[test]
    fn test_parse_errors_surface() {
        assert!(matches!(
            synthesize_source("assert f(1 == 2\n"),
            Err(TranslateError::Parse(_))
        ));
    }
}
