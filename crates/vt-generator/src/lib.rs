//! # vt-generator
//!
//! Closed-loop translation of Python functions into Dafny, repaired with
//! verifier feedback.
//!
//! Every task starts in `Translate`. Each attempt asks the collaborator for a
//! candidate with a state-specific prompt, runs the candidate plus the
//! synthesized test through the verifier, and classifies the result into the
//! state that picks the next prompt.
//!
//! # Usage
//!
//! ```bash
//! # Generate test cases, then repair every task
//! OPENAI_API_KEY=sk-... cargo run -p vt-generator --bin vt-repair -- \
//!     generate-tests --tasks mbpp_code.json --output generated_test.json
//! OPENAI_API_KEY=sk-... cargo run -p vt-generator --bin vt-repair -- \
//!     repair --tasks mbpp_code.json --tests generated_test.json --out mbpp_code_gen
//!
//! # Re-check existing translations without regenerating
//! cargo run -p vt-generator --bin vt-repair -- \
//!     evaluate --tasks mbpp_code.json --tests mbpp_test.json --out mbpp_code_gen
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Python    │ ──> │   State     │ ──> │    Chat     │
//! │   Source    │     │   Prompt    │     │     API     │
//! └─────────────┘     └──────▲──────┘     └──────┬──────┘
//!                            │                   │
//!                            │                   ▼
//!                     ┌──────┴──────┐     ┌─────────────┐
//!                     │ Diagnostic  │     │  Candidate  │
//!                     │ Classifier  │     │ + test proc │
//!                     └──────▲──────┘     └──────┬──────┘
//!                            │                   │
//!                            │            ┌──────▼──────┐
//!                            └─────────── │   dafny     │
//!                                         │   test      │
//!                                         └─────────────┘
//! ```

pub mod client;
pub mod generator;
pub mod postprocess;
pub mod prompt;
pub mod runner;
pub mod task;
pub mod testgen;

pub use client::{ChatClient, ClientConfig, ClientError, Generator};
pub use generator::{
    AttemptRecord, CodeGenerator, GeneratorError, RepairConfig, RepairOutcome, RepairResult,
};
pub use postprocess::{comment_out_annotations, strip_imports, AnnotationState};
pub use prompt::{extract_code_block, PromptBuilder};
pub use runner::{LogSummary, TaskLog, TaskLogEntry, TaskRunner};
pub use task::{load_tasks, CodePaths, Task, TaskFileError, TestSet};
pub use testgen::{TestCaseGenerator, TestGenConfig, TestGenError};
