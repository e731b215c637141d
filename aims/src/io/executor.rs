//! Executor abstraction for FHI-aims invocation.
//!
//! The [`AimsExecutor`] trait decouples job orchestration from the actual
//! FHI-aims binary. Tests and tutorials use a reference executor that replays
//! recorded outputs into the working directory without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::output::{AimsSummary, parse_aims_output};
use crate::core::types::InputFile;
use crate::io::config::AimsConfig;
use crate::io::process::{CommandOutput, run_command_with_stream};

/// Main output file written by FHI-aims (its stdout).
pub const OUTPUT_FILE: &str = "aims.out";
/// Stderr log written next to `aims.out`.
pub const ERROR_LOG_FILE: &str = "aims.err";

/// Parameters for an executor invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Name of the job being run; reference executors key recorded data on it.
    pub job_name: String,
    /// Calculation directory holding the inputs; outputs are written here.
    pub workdir: PathBuf,
    /// Maximum time to wait for the run to complete.
    pub timeout: Duration,
    /// Bound for stdout/stderr kept in memory.
    pub output_limit_bytes: usize,
}

impl ExecRequest {
    pub fn new(job_name: impl Into<String>, workdir: impl Into<PathBuf>, config: &AimsConfig) -> Self {
        Self {
            job_name: job_name.into(),
            workdir: workdir.into(),
            timeout: config.timeout(),
            output_limit_bytes: config.output_limit_bytes,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.workdir.join(OUTPUT_FILE)
    }
}

/// Abstraction over FHI-aims execution backends.
pub trait AimsExecutor {
    /// Run FHI-aims for `request`. Must leave `aims.out` in `request.workdir`.
    fn exec(&self, request: &ExecRequest) -> Result<()>;
}

/// Executor that spawns the configured FHI-aims command.
#[derive(Debug, Clone)]
pub struct FhiAimsExecutor {
    command: Vec<String>,
}

impl FhiAimsExecutor {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    pub fn from_config(config: &AimsConfig) -> Self {
        Self::new(config.command.clone())
    }
}

impl AimsExecutor for FhiAimsExecutor {
    #[instrument(skip_all, fields(job = %request.job_name, timeout_secs = request.timeout.as_secs()))]
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        info!(workdir = %request.workdir.display(), "starting FHI-aims");

        for input in [InputFile::Control, InputFile::Geometry] {
            let path = request.workdir.join(input.file_name());
            if !path.exists() {
                return Err(anyhow!("missing FHI-aims input {}", path.display()));
            }
        }
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("FHI-aims command is empty"))?;

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&request.workdir);

        let output = run_command_with_stream(
            cmd,
            request.timeout,
            request.output_limit_bytes,
            &request.output_path(),
        )
        .with_context(|| format!("run {}", self.command.join(" ")))?;

        write_error_log(&request.workdir.join(ERROR_LOG_FILE), &output)?;

        if output.timed_out {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "FHI-aims timed out"
            );
            return Err(anyhow!("FHI-aims timed out after {:?}", request.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "FHI-aims failed");
            return Err(anyhow!(
                "FHI-aims failed with status {:?}",
                output.status.code()
            ));
        }

        debug!("FHI-aims completed successfully");
        Ok(())
    }
}

/// Execute FHI-aims and parse the resulting `aims.out`.
#[instrument(skip_all, fields(job = %request.job_name))]
pub fn execute_and_parse<E: AimsExecutor + ?Sized>(
    executor: &E,
    request: &ExecRequest,
) -> Result<AimsSummary> {
    executor.exec(request)?;
    let output_path = request.output_path();
    ensure_output_exists(&output_path)?;
    let contents = fs::read_to_string(&output_path)
        .with_context(|| format!("read FHI-aims output {}", output_path.display()))?;
    let summary = parse_aims_output(&contents);
    debug!(
        completed = summary.completed,
        total_energy_ev = ?summary.total_energy_ev,
        "parsed FHI-aims output"
    );
    Ok(summary)
}

fn ensure_output_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(anyhow!("missing FHI-aims output {}", path.display()));
    }
    Ok(())
}

fn write_error_log(path: &Path, output: &CommandOutput) -> Result<()> {
    let mut buf = String::from_utf8_lossy(&output.stderr).into_owned();
    buf.push_str(&output.stderr_truncated_notice());
    if output.timed_out {
        buf.push_str("\n[FHI-aims timed out]\n");
    }
    fs::write(path, buf).with_context(|| format!("write error log {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETED_OUTPUT: &str = "\
  | Total energy of the DFT / Hartree-Fock s.c.f. calculation      :         -15800.089218005 eV
          Have a nice day.
";

    struct FakeExecutor {
        output: Option<&'static str>,
    }

    impl AimsExecutor for FakeExecutor {
        fn exec(&self, request: &ExecRequest) -> Result<()> {
            if let Some(output) = self.output {
                fs::write(request.output_path(), output)?;
            }
            Ok(())
        }
    }

    fn request(workdir: &Path) -> ExecRequest {
        ExecRequest::new("si_single_point", workdir, &AimsConfig::default())
    }

    fn write_inputs(workdir: &Path) {
        fs::write(workdir.join("control.in"), "xc pbe\n").expect("control.in");
        fs::write(workdir.join("geometry.in"), "atom 0 0 0 Si\n").expect("geometry.in");
    }

    /// Verifies execute_and_parse reads the output the executor wrote.
    #[test]
    fn execute_and_parse_reads_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        let fake = FakeExecutor {
            output: Some(COMPLETED_OUTPUT),
        };

        let summary = execute_and_parse(&fake, &request(temp.path())).expect("parse");
        assert!(summary.completed);
        assert_eq!(summary.total_energy_ev, Some(-15800.089218005));
    }

    /// Verifies execute_and_parse fails when the executor left no aims.out.
    #[test]
    fn execute_and_parse_errors_on_missing_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        let fake = FakeExecutor { output: None };

        let err = execute_and_parse(&fake, &request(temp.path())).unwrap_err();
        assert!(err.to_string().contains("missing FHI-aims output"));
    }

    #[test]
    fn real_executor_requires_inputs_before_spawning() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = FhiAimsExecutor::new(vec!["definitely-not-aims".to_string()]);

        let err = executor.exec(&request(temp.path())).unwrap_err();
        assert!(err.to_string().contains("missing FHI-aims input"));
        assert!(!temp.path().join(OUTPUT_FILE).exists());
    }

    #[cfg(unix)]
    #[test]
    fn real_executor_streams_stdout_to_aims_out() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_inputs(temp.path());
        let executor = FhiAimsExecutor::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "cat control.in; echo '          Have a nice day.'".to_string(),
        ]);

        executor.exec(&request(temp.path())).expect("exec");

        let out = fs::read_to_string(temp.path().join(OUTPUT_FILE)).expect("aims.out");
        assert_eq!(out, "xc pbe\n          Have a nice day.\n");
        assert!(temp.path().join(ERROR_LOG_FILE).exists());
    }

    #[cfg(unix)]
    #[test]
    fn real_executor_reports_failed_status() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_inputs(temp.path());
        let executor = FhiAimsExecutor::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo 'SCF failed' >&2; exit 3".to_string(),
        ]);

        let err = executor.exec(&request(temp.path())).unwrap_err();
        assert!(err.to_string().contains("failed with status Some(3)"));
        let log = fs::read_to_string(temp.path().join(ERROR_LOG_FILE)).expect("aims.err");
        assert!(log.contains("SCF failed"));
    }
}
