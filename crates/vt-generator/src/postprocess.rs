//! Candidate post-processing.
//!
//! Verification runs with `--no-verify`, but proof annotations the model
//! writes can still fail to resolve. Specification clauses are therefore
//! commented out before the candidate is written to the surface.

/// First words that open a specification clause.
pub const ANNOTATION_KEYWORDS: &[&str] = &[
    "requires",
    "ensures",
    "decreases",
    "invariant",
    "reads",
    "modifies",
];

/// First word that opens a body and ends any clause run.
const BLOCK_OPEN: &str = "{";

/// Whether the scanner is inside a run of specification clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationState {
    NotInAnnotation,
    InAnnotation,
}

impl AnnotationState {
    /// State for a line starting with `first_word`.
    ///
    /// A clause keyword enters the annotation run; a line opening a block
    /// leaves it. Any other line keeps the current state, so clauses that
    /// wrap onto several lines stay commented.
    pub fn next(self, first_word: Option<&str>) -> Self {
        match first_word {
            Some(word) if ANNOTATION_KEYWORDS.contains(&word) => AnnotationState::InAnnotation,
            Some(word) if word.starts_with(BLOCK_OPEN) => AnnotationState::NotInAnnotation,
            _ => self,
        }
    }
}

/// Comment out every line inside an annotation run.
pub fn comment_out_annotations(code: &str) -> String {
    let mut state = AnnotationState::NotInAnnotation;
    code.lines()
        .map(|line| {
            state = state.next(line.split_whitespace().next());
            match state {
                AnnotationState::InAnnotation => format!("//{}", line),
                AnnotationState::NotInAnnotation => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop module import lines; the preamble re-adds them on every write.
pub fn strip_imports(code: &str) -> String {
    code.lines()
        .filter(|line| !line.trim_start().starts_with("import"))
        .collect::<Vec<_>>()
        .join("\n")
}
