//! Prompt templates, one per repair state.
//!
//! Every template ends by asking for a single fenced `dafny` block, which is
//! the only response shape [`extract_code_block`] accepts.

use vt_evaluators::{AttemptState, DiagnosticRecord};

/// A worked source/target pair shown with translation prompts.
pub struct TranslationExample {
    pub topic: &'static str,
    pub python: &'static str,
    pub dafny: &'static str,
}

/// Translation examples, each covering one recurring pitfall.
pub const EXAMPLES: &[TranslationExample] = &[
    TranslationExample {
        topic: "sequences and loops in methods",
        python: "def abs_sum(s):\n    total = 0\n    for x in s:\n        total += abs(x)\n    return total",
        dafny: "function abs(x: real): real { if x >= 0.0 then x else -x }\n\
                method abs_sum(s: seq<real>) returns (res: real) {\n  res := 0.0;\n  for i := 0 to |s| { res := res + abs(s[i]); }\n}\n\
                // Prefer seq over array. Define helpers that Dafny lacks before using them.",
    },
    TranslationExample {
        topic: "calls are statements",
        python: "def check():\n    return abs_sum([1, -1, 1]) == 3",
        dafny: "method check() returns (ok: bool) {\n  var total := abs_sum([1.0, -1.0, 1.0]);\n  ok := total == 3.0;\n}\n\
                // Method calls cannot appear inside expressions; bind the result to a variable first.",
    },
    TranslationExample {
        topic: "library min/max",
        python: "def clamp_all(s, lo, hi):\n    return [min(hi, max(x, lo)) for x in s]",
        dafny: "method clamp_all(s: seq<int>, lo: int, hi: int) returns (res: seq<int>) {\n  res := s;\n  for i := 0 to |s| { res := res[i := Min(hi, Max(s[i], lo))]; }\n}\n\
                // Min/Max come from the Math library. Rewrite comprehensions as loops.",
    },
    TranslationExample {
        topic: "recursion in functions",
        python: "def total(s):\n    return sum(s)",
        dafny: "function total(s: seq<int>): int { if |s| == 0 then 0 else s[0] + total(s[1..]) }\n\
                // Function bodies are expressions: no for/while, use recursion.",
    },
    TranslationExample {
        topic: "exponentiation",
        python: "def calc(a, b):\n    return a ** b if a > 0 else a * b",
        dafny: "function calc(a: int, b: nat): int { if a > 0 then Pow(a, b) else a * b }\n\
                // Use Pow(a, b); Dafny has no ** operator.",
    },
    TranslationExample {
        topic: "mixed numeric types",
        python: "def div(a: float, b: int):\n    return floor(a / b)",
        dafny: "function div(a: real, b: int): int requires b != 0 { (a / (b as real)).Floor }\n\
                // Operand types must match; convert with `as real`. Floor is a member of real.",
    },
    TranslationExample {
        topic: "boolean precedence",
        python: "def logical(a, b, c, d):\n    return a and b or c and d",
        dafny: "function logical(a: bool, b: bool, c: bool, d: bool): bool { (a && b) || (c && d) }\n\
                // Parenthesize when mixing && and ||.",
    },
    TranslationExample {
        topic: "maps",
        python: "def update(a, b):\n    m = {1: 2, 3: 4}\n    m[a] = b\n    return m[a]",
        dafny: "function update(a: int, b: int): int { var m := map[1 := 2, 3 := 4][a := b]; m[a] }",
    },
    TranslationExample {
        topic: "strings",
        python: "def reverse_words(s):\n    return \",\".join(w[::-1] for w in s.split(\",\"))",
        dafny: "method reverse_words(s: string) returns (res: string) {\n  var parts := Split(s, ',');\n  for i := 0 to |parts| { parts := parts[i := Reverse(parts[i])]; }\n  res := Join(parts, \",\");\n}\n\
                // Split/Join/Reverse already exist. Characters use '', strings use \"\".",
    },
    TranslationExample {
        topic: "int/string conversion",
        python: "def roundtrip(x):\n    return int(str(x))",
        dafny: "function roundtrip(x: int): int { ToInt(OfInt(x)) }\n\
                // OfInt and ToInt come from the Strings library.",
    },
];

/// Builds prompts for the collaborator.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Prompt for `state`, embedding `code` and, where relevant, `diagnostics`.
    ///
    /// `code` is the source program for [`AttemptState::Translate`] and the
    /// current candidate for every other state.
    pub fn build(state: AttemptState, code: &str, diagnostics: &[DiagnosticRecord]) -> String {
        match state {
            AttemptState::Translate | AttemptState::Passed => Self::build_translate_prompt(code),
            AttemptState::SyntaxError => Self::build_syntax_prompt(code, diagnostics),
            AttemptState::Timeout => Self::build_timeout_prompt(code),
            AttemptState::SemanticError => Self::build_semantic_prompt(code, diagnostics),
        }
    }

    pub fn build_translate_prompt(source: &str) -> String {
        let examples = EXAMPLES
            .iter()
            .enumerate()
            .map(|(i, ex)| {
                format!(
                    "Example {n} ({topic}):\n```python\n{python}\n```\n```dafny\n{dafny}\n```",
                    n = i + 1,
                    topic = ex.topic,
                    python = ex.python,
                    dafny = ex.dafny,
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            r#"You are an expert Dafny programmer who translates Python into Dafny.

Translate the following Python function into Dafny. Keep the function name and
parameter order unchanged so existing tests can call it.

```python
{source}
```

Return the translation as a single block:
```dafny
// Dafny code
```

Examples:

{examples}"#,
        )
    }

    pub fn build_syntax_prompt(code: &str, diagnostics: &[DiagnosticRecord]) -> String {
        let errors = if diagnostics.is_empty() {
            "(the resolver reported no usable positions)".to_string()
        } else {
            diagnostics
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    format!(
                        "Error {n}: line {line}, column {column}\n  code: {excerpt}\n  problem: {message}",
                        n = i + 1,
                        line = d.line,
                        column = d.column,
                        excerpt = d.excerpt.trim(),
                        message = d.message,
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r#"You are an expert Dafny programmer who fixes syntax and resolution errors.

Fix the errors in this Dafny code:

```dafny
{code}
```

Errors reported by the Dafny resolver:
{errors}

Return the fixed code as a single block:
```dafny
// Dafny code
```"#,
        )
    }

    pub fn build_timeout_prompt(code: &str) -> String {
        format!(
            r#"You are an expert Dafny programmer who fixes non-terminating code.

Running the tests of this Dafny code timed out. Fix the loop or recursion that
fails to terminate:

```dafny
{code}
```

Return the fixed code as a single block:
```dafny
// Dafny code
```"#,
        )
    }

    pub fn build_semantic_prompt(code: &str, diagnostics: &[DiagnosticRecord]) -> String {
        let failing = diagnostics
            .first()
            .map(|d| d.excerpt.as_str())
            .unwrap_or("(the failing expectation could not be recovered)");

        format!(
            r#"You are an expert Dafny programmer who fixes logic errors.

This Dafny code compiles but computes the wrong result:

```dafny
{code}
```

This expectation failed:
{failing}

Return the fixed code as a single block:
```dafny
// Dafny code
```"#,
        )
    }

    /// Ask for `count` argument tuples for a Python function.
    pub fn build_test_inputs_prompt(source: &str, count: usize) -> String {
        format!(
            r#"You are an expert Python programmer who writes test inputs.

Generate {count} different, valid argument tuples for this Python function:

```python
{source}
```

Return exactly these assignments and nothing else:
```python
input1 = (argument1, argument2, ...)
input2 = (argument1, argument2, ...)
...
input{count} = (argument1, argument2, ...)
```"#,
        )
    }
}

/// Body of the first ```` ```lang ```` fenced block in `response`.
pub fn extract_code_block(response: &str, lang: &str) -> Option<String> {
    let fence = format!("```{}", lang);
    let start = response.find(&fence)? + fence.len();
    let after = &response[start..];
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    let code = body[..end].trim_end();
    if code.trim().is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(line: usize, message: &str, excerpt: &str) -> DiagnosticRecord {
        DiagnosticRecord {
            line,
            column: 1,
            message: message.to_string(),
            excerpt: excerpt.to_string(),
        }
    }

    #[test]
    fn test_extract_dafny_block() {
        let response = "Here you go:\n```dafny\nmethod M() {}\n```\nDone.";
        assert_eq!(
            extract_code_block(response, "dafny").as_deref(),
            Some("method M() {}")
        );
    }

    #[test]
    fn test_extract_requires_matching_language() {
        let response = "```python\nx = 1\n```";
        assert_eq!(extract_code_block(response, "dafny"), None);
        assert_eq!(extract_code_block(response, "python").as_deref(), Some("x = 1"));
    }

    #[test]
    fn test_extract_rejects_unterminated_or_empty() {
        assert_eq!(extract_code_block("```dafny\nmethod M() {}", "dafny"), None);
        assert_eq!(extract_code_block("```dafny\n\n```", "dafny"), None);
        assert_eq!(extract_code_block("no code", "dafny"), None);
    }

    #[test]
    fn test_translate_prompt_contains_source_and_examples() {
        let prompt = PromptBuilder::build(AttemptState::Translate, "def f(x): return x", &[]);
        assert!(prompt.contains("def f(x): return x"));
        assert!(prompt.contains(&format!("Example {}", EXAMPLES.len())));
        assert!(prompt.contains("```dafny\n// Dafny code\n```"));
    }

    #[test]
    fn test_syntax_prompt_lists_diagnostics() {
        let diagnostics = vec![
            diag(3, "use recursion", "  for i := 0 to n {"),
            diag(7, "unresolved identifier", "x := y;"),
        ];
        let prompt = PromptBuilder::build(AttemptState::SyntaxError, "CODE", &diagnostics);
        assert!(prompt.contains("Error 1: line 3"));
        assert!(prompt.contains("code: for i := 0 to n {"));
        assert!(prompt.contains("Error 2: line 7"));
        assert!(prompt.contains("problem: unresolved identifier"));
    }

    #[test]
    fn test_semantic_prompt_shows_failing_expectation() {
        let diagnostics = vec![diag(9, "expectation violation", "expect f(1) == 2;")];
        let prompt = PromptBuilder::build(AttemptState::SemanticError, "CODE", &diagnostics);
        assert!(prompt.contains("This expectation failed:\nexpect f(1) == 2;"));

        let empty = PromptBuilder::build(AttemptState::SemanticError, "CODE", &[]);
        assert!(empty.contains("could not be recovered"));
    }

    #[test]
    fn test_timeout_prompt() {
        let prompt = PromptBuilder::build(AttemptState::Timeout, "CODE", &[]);
        assert!(prompt.contains("timed out"));
        assert!(prompt.contains("```dafny\nCODE\n```"));
    }

    #[test]
    fn test_inputs_prompt() {
        let prompt = PromptBuilder::build_test_inputs_prompt("def f(a): pass", 10);
        assert!(prompt.contains("input10 = "));
        assert!(prompt.contains("Generate 10 different"));
    }
}
