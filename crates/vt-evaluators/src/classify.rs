//! Diagnostic classification.
//!
//! Maps a verifier exit onto an [`AttemptState`] and recovers structured
//! [`DiagnosticRecord`]s from its standard output. Recovery never fails: if
//! the output cannot be read, the diagnostics are simply empty.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::result::{AttemptState, DiagnosticRecord, VerifierExit};

/// Exit code for a candidate that resolved and passed every test.
pub const EXIT_PASSED: i32 = 0;
/// Exit code for parse or resolution errors.
pub const EXIT_SYNTAX_ERROR: i32 = 2;
/// Exit code for a failing `expect`.
pub const EXIT_SEMANTIC_ERROR: i32 = 3;

/// Message rewrites, first substring match wins.
pub const HUMANIZE_TABLE: &[(&str, &str)] = &[
    (
        "invalid UnaryExpression",
        "The body of a Dafny function must be an expression, loops are not allowed; \
         use recursions or methods instead",
    ),
    (
        "Expected 'to' or 'downto'",
        "The for-loop format in Dafny is ```for i:= a to b```",
    ),
];

lazy_static! {
    /// `file.dfy(line,col): message`
    static ref RE_POSITION: Regex =
        Regex::new(r"(?:\.dfy)?\((\d+),(\d+)\): (.+)").expect("RE_POSITION regex is valid");

    /// Hoisted temporaries, `call0`, `call1`, ...
    static ref RE_CALL_IDENT: Regex =
        Regex::new(r"\bcall\d+\b").expect("RE_CALL_IDENT regex is valid");

    /// `var callN := value;`
    static ref RE_HOISTED: Regex =
        Regex::new(r"^\s*var\s+(call\d+)\s*:=\s*(.*?)\s*;\s*$").expect("RE_HOISTED regex is valid");
}

/// Classified state plus the diagnostics for the next prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub state: AttemptState,
    pub diagnostics: Vec<DiagnosticRecord>,
}

impl Classification {
    fn bare(state: AttemptState) -> Self {
        Self {
            state,
            diagnostics: Vec::new(),
        }
    }
}

/// Rewrite a verifier message using [`HUMANIZE_TABLE`].
pub fn humanize(message: &str) -> String {
    HUMANIZE_TABLE
        .iter()
        .find(|(pattern, _)| message.contains(pattern))
        .map(|(_, replacement)| (*replacement).to_string())
        .unwrap_or_else(|| message.to_string())
}

/// Classify one verifier run.
///
/// `candidate_source` is the exact text that was verified, test procedure
/// included, so that position markers index into it.
pub fn classify(exit: VerifierExit, raw_output: &str, candidate_source: &str) -> Classification {
    match exit {
        VerifierExit::Code(EXIT_PASSED) => Classification::bare(AttemptState::Passed),
        VerifierExit::Code(EXIT_SYNTAX_ERROR) => Classification {
            state: AttemptState::SyntaxError,
            diagnostics: syntax_diagnostics(raw_output, candidate_source).unwrap_or_default(),
        },
        VerifierExit::Code(EXIT_SEMANTIC_ERROR) => Classification {
            state: AttemptState::SemanticError,
            diagnostics: semantic_diagnostic(raw_output, candidate_source)
                .map(|d| vec![d])
                .unwrap_or_default(),
        },
        VerifierExit::TimedOut => Classification::bare(AttemptState::Timeout),
        VerifierExit::Code(_) | VerifierExit::Terminated => {
            Classification::bare(AttemptState::SyntaxError)
        }
    }
}

struct Marker {
    line: usize,
    column: usize,
    message: String,
}

fn markers(raw_output: &str) -> Vec<Marker> {
    raw_output
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(|line| {
            let caps = RE_POSITION.captures(line)?;
            Some(Marker {
                line: caps[1].parse().ok()?,
                column: caps[2].parse().ok()?,
                message: caps[3].trim().to_string(),
            })
        })
        .collect()
}

/// Line `number` (1-based) of `source`.
fn source_line(source: &str, number: usize) -> Option<&str> {
    source.lines().nth(number.checked_sub(1)?)
}

/// Every marker, or `None` if any of them points outside the source.
fn syntax_diagnostics(raw_output: &str, source: &str) -> Option<Vec<DiagnosticRecord>> {
    markers(raw_output)
        .into_iter()
        .map(|marker| {
            let excerpt = source_line(source, marker.line)?;
            Some(DiagnosticRecord {
                line: marker.line,
                column: marker.column,
                message: humanize(&marker.message),
                excerpt: excerpt.to_string(),
            })
        })
        .collect()
}

/// Rebuild the failing expectation with hoisted calls substituted back in.
///
/// The first marker usually lands on an `expect` line; if it lands on a
/// hoisted binding instead, the `expect` that consumes that binding is used.
fn semantic_diagnostic(raw_output: &str, source: &str) -> Option<DiagnosticRecord> {
    let marker = markers(raw_output).into_iter().next()?;
    let failing = source_line(source, marker.line)?;

    let expect_line = if failing.trim_start().starts_with("expect") {
        failing
    } else {
        let ident = RE_CALL_IDENT.find(failing)?.as_str();
        source.lines().skip(marker.line).find(|line| {
            line.trim_start().starts_with("expect")
                && RE_CALL_IDENT.find_iter(line).any(|m| m.as_str() == ident)
        })?
    };

    let body = expect_line
        .trim()
        .strip_prefix("expect")?
        .trim()
        .strip_suffix(';')?
        .trim();

    let bindings: HashMap<&str, &str> = source
        .lines()
        .filter_map(|line| {
            let caps = RE_HOISTED.captures(line)?;
            Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
        })
        .collect();

    Some(DiagnosticRecord {
        line: marker.line,
        column: marker.column,
        message: humanize(&marker.message),
        excerpt: format!("expect {};", substitute(body, &bindings)),
    })
}

/// Replace hoisted identifiers by their call text until none remain.
fn substitute(body: &str, bindings: &HashMap<&str, &str>) -> String {
    let mut text = body.to_string();
    // Nesting depth is bounded by the number of bindings.
    for _ in 0..=bindings.len() {
        let next = RE_CALL_IDENT
            .replace_all(&text, |caps: &regex::Captures| {
                let ident = &caps[0];
                bindings.get(ident).copied().unwrap_or(ident).to_string()
            })
            .into_owned();
        if next == text {
            break;
        }
        text = next;
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANDIDATE: &str = "method Inc(y: int) returns (r: int) {\n\
                             \x20 r := y + 1;\n\
                             x := f(y);\n\
                             }\n";

    #[test]
    fn test_passed() {
        let result = classify(VerifierExit::Code(0), "ok", CANDIDATE);
        assert_eq!(result.state, AttemptState::Passed);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_syntax_error_recovers_line_and_humanizes() {
        let result = classify(VerifierExit::Code(2), "(3,5): invalid UnaryExpression\n", CANDIDATE);
        assert_eq!(result.state, AttemptState::SyntaxError);
        assert_eq!(result.diagnostics.len(), 1);
        let d = &result.diagnostics[0];
        assert_eq!(d.excerpt, "x := f(y);");
        assert_eq!((d.line, d.column), (3, 5));
        assert!(d.message.contains("recursions or methods"));
    }

    #[test]
    fn test_syntax_error_with_file_prefix_and_crlf() {
        let output = "Dafny program verifier\r\n\
                      task_7.dfy(2,4): Error: Expected 'to' or 'downto'\r\n\
                      task_7.dfy(1,0): Error: unresolved identifier: q\r\n\
                      2 resolution/type errors detected in task_7.dfy\r\n";
        let result = classify(VerifierExit::Code(2), output, CANDIDATE);
        assert_eq!(result.diagnostics.len(), 2);
        assert_eq!(result.diagnostics[0].message, "The for-loop format in Dafny is ```for i:= a to b```");
        assert_eq!(result.diagnostics[1].message, "Error: unresolved identifier: q");
        assert_eq!(result.diagnostics[1].excerpt, "method Inc(y: int) returns (r: int) {");
    }

    #[test]
    fn test_out_of_range_marker_yields_no_diagnostics() {
        let result = classify(VerifierExit::Code(2), "x.dfy(99,1): Error: boom\n", CANDIDATE);
        assert_eq!(result.state, AttemptState::SyntaxError);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_semantic_error_reconstructs_expectation() {
        let source = "function f(x: int): int { x }\n\
                      method {:test} check() {\n\
                      \x20 var call0 := g(1);\n\
                      \x20 var call1 := f(call0);\n\
                      \x20 expect call1 == [1, 2];\n\
                      }\n";
        let output = "t.dfy(5,2): expectation violation\n";
        let result = classify(VerifierExit::Code(3), output, source);
        assert_eq!(result.state, AttemptState::SemanticError);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].excerpt, "expect f(g(1)) == [1, 2];");
    }

    #[test]
    fn test_semantic_error_on_hoisted_line_finds_consumer() {
        let source = "method {:test} check() {\n\
                      \x20 var call0 := f(1);\n\
                      \x20 expect call0 == 2;\n\
                      }\n";
        let result = classify(VerifierExit::Code(3), "t.dfy(2,2): failure\n", source);
        assert_eq!(result.diagnostics[0].excerpt, "expect f(1) == 2;");
    }

    #[test]
    fn test_semantic_reconstruction_failure_is_empty() {
        let result = classify(VerifierExit::Code(3), "no markers here\n", CANDIDATE);
        assert_eq!(result.state, AttemptState::SemanticError);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_timeout_and_unknown_exits() {
        assert_eq!(
            classify(VerifierExit::TimedOut, "", CANDIDATE).state,
            AttemptState::Timeout
        );
        let other = classify(VerifierExit::Code(4), "(1,1): weird", CANDIDATE);
        assert_eq!(other.state, AttemptState::SyntaxError);
        assert!(other.diagnostics.is_empty());
        assert_eq!(
            classify(VerifierExit::Terminated, "", CANDIDATE).state,
            AttemptState::SyntaxError
        );
    }

    #[test]
    fn test_humanize_passthrough() {
        assert_eq!(humanize("something else"), "something else");
    }
}
