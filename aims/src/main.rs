//! Command-line front end for FHI-aims jobs.
//!
//! Runs a job file against the configured FHI-aims binary, parses existing
//! `aims.out` files and, with the `test-support` feature, replays or checks
//! jobs against recorded reference directories.

use std::fs;
use std::path::{Path, PathBuf};

use aims::core::output::parse_aims_output;
use aims::exit_codes;
use aims::io::config::{AimsConfig, CONFIG_FILE_NAME, load_config, write_config};
use aims::io::executor::FhiAimsExecutor;
use aims::job::{AimsJob, run_job};
use aims::logging;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "aims", version, about = "Run and replay FHI-aims calculations")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Write inputs for a job, run FHI-aims and print the summary as JSON.
    Run {
        /// Job description (TOML).
        job: PathBuf,
        /// Calculation directory; defaults to the job name.
        #[arg(long)]
        workdir: Option<PathBuf>,
    },
    /// Parse an `aims.out` file and print the summary as JSON.
    Parse { output: PathBuf },
    /// Run a job against recorded reference outputs instead of FHI-aims.
    #[cfg(feature = "test-support")]
    Replay {
        job: PathBuf,
        /// Reference directory (`inputs/`, `outputs/`) for the job.
        #[arg(long)]
        reference: PathBuf,
        #[arg(long)]
        workdir: Option<PathBuf>,
        /// Inputs compared against the reference before replaying.
        #[arg(long = "check", value_name = "FILE")]
        check: Vec<aims::core::types::InputFile>,
    },
    /// Compare the inputs in a calculation directory against a reference.
    #[cfg(feature = "test-support")]
    Check {
        reference: PathBuf,
        #[arg(long, default_value = ".")]
        workdir: PathBuf,
        /// Inputs to compare; all of them when omitted.
        #[arg(long = "check", value_name = "FILE")]
        check: Vec<aims::core::types::InputFile>,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{err:#}");
            exit_code(&err)
        }
    };
    std::process::exit(code);
}

#[cfg(feature = "test-support")]
fn exit_code(err: &anyhow::Error) -> i32 {
    if err.chain().any(|cause| cause.is::<aims::testing::InputMismatch>()) {
        exit_codes::MISMATCH
    } else {
        exit_codes::INVALID
    }
}

#[cfg(not(feature = "test-support"))]
fn exit_code(_err: &anyhow::Error) -> i32 {
    exit_codes::INVALID
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Run { job, workdir } => cmd_run(&cli.config, &job, workdir),
        Command::Parse { output } => cmd_parse(&output),
        #[cfg(feature = "test-support")]
        Command::Replay {
            job,
            reference,
            workdir,
            check,
        } => cmd_replay(&cli.config, &job, &reference, workdir, check),
        #[cfg(feature = "test-support")]
        Command::Check {
            reference,
            workdir,
            check,
        } => {
            let files = if check.is_empty() {
                aims::core::types::InputFile::ALL.to_vec()
            } else {
                check
            };
            aims::testing::check_inputs(&reference, &workdir, &files)
        }
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if !force && config_path.exists() {
        bail!(
            "{} already exists; pass --force to overwrite",
            config_path.display()
        );
    }
    write_config(config_path, &AimsConfig::default())
}

fn cmd_run(config_path: &Path, job_path: &Path, workdir: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let job = AimsJob::load(job_path)?;
    let workdir = workdir.unwrap_or_else(|| PathBuf::from(&job.name));
    let executor = FhiAimsExecutor::from_config(&config);
    let outcome = run_job(&executor, &job, &workdir, &config)?;
    print_json(&outcome.summary)
}

fn cmd_parse(output: &Path) -> Result<()> {
    let contents =
        fs::read_to_string(output).with_context(|| format!("read {}", output.display()))?;
    print_json(&parse_aims_output(&contents))
}

#[cfg(feature = "test-support")]
fn cmd_replay(
    config_path: &Path,
    job_path: &Path,
    reference: &Path,
    workdir: Option<PathBuf>,
    check: Vec<aims::core::types::InputFile>,
) -> Result<()> {
    use std::collections::BTreeMap;

    use aims::testing::{FakeRunOptions, ReferenceExecutor};

    let config = load_config(config_path)?;
    let job = AimsJob::load(job_path)?;
    let workdir = workdir.unwrap_or_else(|| PathBuf::from(&job.name));
    let executor = ReferenceExecutor::new(
        PathBuf::new(),
        BTreeMap::from([(job.name.clone(), reference.to_path_buf())]),
        BTreeMap::from([(
            job.name.clone(),
            FakeRunOptions {
                check_inputs: check,
                clear_inputs: false,
            },
        )]),
    );
    let outcome = run_job(&executor, &job, &workdir, &config)?;
    print_json(&outcome.summary)
}

/// Print `value` as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}
