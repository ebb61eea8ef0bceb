//! CLI for translating Python tasks into Dafny with verifier-driven repair.
//!
//! # Usage
//!
//! ```bash
//! # Repair every task, writing candidates under mbpp_code_gen/
//! cargo run -p vt-generator --bin vt-repair -- repair \
//!     --tasks mbpp_code.json --tests mbpp_test.json --out mbpp_code_gen
//!
//! # Quick mode (fewer attempts, shorter verifier timeout)
//! cargo run -p vt-generator --bin vt-repair -- repair --quick \
//!     --tasks mbpp_code.json --out mbpp_code_gen
//!
//! # Verify existing candidates once
//! cargo run -p vt-generator --bin vt-repair -- evaluate \
//!     --tasks mbpp_code.json --tests mbpp_test.json --out mbpp_code_gen
//!
//! # ... reading candidates from a per-task `CodePath` map
//! cargo run -p vt-generator --bin vt-repair -- evaluate \
//!     --tasks mbpp_code.json --tests mbpp_test.json --out mbpp_code_gen \
//!     --paths mbpp_paths.json
//!
//! # Generate test cases
//! cargo run -p vt-generator --bin vt-repair -- generate-tests \
//!     --tasks mbpp_code.json --output generated_test.json
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Level};

use vt_evaluators::{DafnyVerifier, VerifierConfig};
use vt_generator::{
    load_tasks, ChatClient, CodeGenerator, CodePaths, RepairConfig, TaskLog, TaskRunner,
    TestCaseGenerator, TestGenConfig, TestSet,
};

#[derive(Parser)]
#[command(name = "vt-repair", about = "Verifier-driven Python to Dafny translation")]
struct Cli {
    /// Log at DEBUG level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate and repair every task
    Repair {
        #[command(flatten)]
        run: RunArgs,

        /// Generation attempts per task
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Concurrent collaborator calls
        #[arg(long)]
        generator_slots: Option<usize>,

        /// Fewer attempts, shorter verifier timeout
        #[arg(long, conflicts_with = "thorough")]
        quick: bool,

        /// More attempts and collaborator retries
        #[arg(long)]
        thorough: bool,
    },
    /// Verify existing candidates once, without regenerating
    Evaluate {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Generate Python test cases for every task
    GenerateTests {
        /// Task file (JSON)
        #[arg(long)]
        tasks: PathBuf,

        /// Where to write the test set (JSON)
        #[arg(long)]
        output: PathBuf,

        /// Input tuples per task
        #[arg(long, default_value_t = 10)]
        inputs: usize,

        /// Generation rounds per task
        #[arg(long, default_value_t = 10)]
        max_attempts: u32,

        /// Concurrent collaborator calls
        #[arg(long, default_value_t = 5)]
        generator_slots: usize,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Task file (JSON)
    #[arg(long)]
    tasks: PathBuf,

    /// Test-set file (JSON); tasks without tests skip the semantic check
    #[arg(long)]
    tests: Option<PathBuf>,

    /// Directory holding one candidate file per task
    #[arg(long)]
    out: PathBuf,

    /// JSON map of task id to candidate path; listed tasks ignore <out>
    #[arg(long)]
    paths: Option<PathBuf>,

    /// Task log path [default: <out>/log.json]
    #[arg(long)]
    log: Option<PathBuf>,

    /// Concurrent verifier runs [default: number of CPUs]
    #[arg(long)]
    verifier_slots: Option<usize>,

    /// Verifier wall-clock limit in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Verifier executable
    #[arg(long, default_value = "dafny")]
    dafny: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let max_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_target(false)
        .init();

    let result = match cli.command {
        Command::Repair {
            run,
            max_attempts,
            generator_slots,
            quick,
            thorough,
        } => {
            let mut config = if quick {
                RepairConfig::quick()
            } else if thorough {
                RepairConfig::thorough()
            } else {
                RepairConfig::default()
            };
            if let Some(max) = max_attempts {
                config.max_attempts = max;
            }
            if let Some(slots) = generator_slots {
                config.generator_slots = slots;
            }
            let verifier = if quick {
                VerifierConfig::quick()
            } else {
                VerifierConfig::default()
            };
            run_tasks(run, config, verifier, true).await
        }
        Command::Evaluate { run } => {
            run_tasks(run, RepairConfig::default(), VerifierConfig::default(), false).await
        }
        Command::GenerateTests {
            tasks,
            output,
            inputs,
            max_attempts,
            generator_slots,
        } => {
            let config = TestGenConfig {
                inputs_per_task: inputs,
                max_attempts,
                ..Default::default()
            };
            generate_tests(&tasks, &output, config, generator_slots).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{}", message);
            ExitCode::FAILURE
        }
    }
}

async fn run_tasks(
    args: RunArgs,
    mut config: RepairConfig,
    mut verifier: VerifierConfig,
    regenerate: bool,
) -> Result<(), String> {
    if let Some(slots) = args.verifier_slots {
        config.verifier_slots = slots;
    }
    if let Some(secs) = args.timeout {
        verifier = verifier.with_timeout(Duration::from_secs(secs));
    }
    verifier.program = args.dafny;

    let tasks = load_tasks(&args.tasks).await.map_err(|e| e.to_string())?;
    let tests = match &args.tests {
        Some(path) => TestSet::load(path).await.map_err(|e| e.to_string())?,
        None => TestSet::new(),
    };
    let paths = match &args.paths {
        Some(path) => CodePaths::load(path).await.map_err(|e| e.to_string())?,
        None => CodePaths::new(),
    };
    info!(
        tasks = tasks.len(),
        tests = tests.populated(),
        explicit_paths = paths.len(),
        verifier = %verifier.program,
        verifier_slots = config.verifier_slots,
        "loaded tasks"
    );

    // Evaluation never calls the collaborator, so it runs without credentials.
    let client: Arc<dyn vt_generator::Generator> = if regenerate {
        Arc::new(ChatClient::from_env().map_err(|e| {
            format!("{}; set OPENAI_API_KEY (and optionally OPENAI_BASE_URL, VT_MODEL)", e)
        })?)
    } else {
        Arc::new(Offline)
    };

    let generator = CodeGenerator::new(client, Arc::new(DafnyVerifier::new(verifier)), config);
    let runner = TaskRunner::new(generator, &args.out).with_paths(paths);
    let log = if regenerate {
        runner.repair_all(tasks, &tests).await
    } else {
        runner.evaluate_all(tasks, &tests).await
    };

    let log_path = args.log.unwrap_or_else(|| args.out.join("log.json"));
    save_log(&log, &log_path).await
}

async fn save_log(log: &TaskLog, path: &Path) -> Result<(), String> {
    log.save(path).await.map_err(|e| e.to_string())?;
    println!("{}", log.summary());
    info!(path = %path.display(), "task log written");
    Ok(())
}

async fn generate_tests(
    tasks: &Path,
    output: &Path,
    config: TestGenConfig,
    generator_slots: usize,
) -> Result<(), String> {
    let tasks = load_tasks(tasks).await.map_err(|e| e.to_string())?;
    let client = ChatClient::from_env().map_err(|e| e.to_string())?;
    info!(tasks = tasks.len(), model = client.model(), "generating test cases");

    let slots = Arc::new(tokio::sync::Semaphore::new(generator_slots.max(1)));
    let generator = TestCaseGenerator::new(Arc::new(client), slots, config);
    let tests = generator.generate_all(tasks).await;
    tests.save(output).await.map_err(|e| e.to_string())?;

    let pct = if tests.is_empty() {
        0.0
    } else {
        tests.populated() as f64 * 100.0 / tests.len() as f64
    };
    println!(
        "{}/{} ({:.2}%) test cases successfully generated",
        tests.populated(),
        tests.len(),
        pct
    );
    Ok(())
}

/// Stand-in collaborator for evaluate mode.
struct Offline;

#[async_trait::async_trait]
impl vt_generator::Generator for Offline {
    async fn complete(&self, _prompt: &str) -> Result<String, vt_generator::ClientError> {
        Err(vt_generator::ClientError::MissingApiKey)
    }
}
