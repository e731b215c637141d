//! Orchestration for a single FHI-aims job.
//!
//! A job writes its inputs into a calculation directory, hands the directory
//! to an [`AimsExecutor`], and parses `aims.out`. The executor is the only
//! seam between a workflow and the FHI-aims binary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::output::AimsSummary;
use crate::core::types::{Parameters, Structure};
use crate::io::config::AimsConfig;
use crate::io::executor::{AimsExecutor, ExecRequest, execute_and_parse};
use crate::io::inputs::{resolve_species_dir, write_inputs};

/// A job description, loadable from TOML.
///
/// ```toml
/// name = "si_single_point"
///
/// [structure]
/// lattice = [[0.0, 2.715, 2.715], [2.715, 0.0, 2.715], [2.715, 2.715, 0.0]]
/// atoms = [
///     { species = "Si", position = [0.0, 0.0, 0.0] },
///     { species = "Si", position = [1.3575, 1.3575, 1.3575] },
/// ]
///
/// [parameters]
/// xc = "pbe"
/// k_grid = [2, 2, 2]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AimsJob {
    /// Job name (slug format: `[a-z0-9_-]+`); reference data is keyed on it.
    pub name: String,
    pub structure: Structure,
    #[serde(default)]
    pub parameters: Parameters,
}

impl AimsJob {
    pub fn new(name: impl Into<String>, structure: Structure, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            structure,
            parameters,
        }
    }

    /// Load and validate a job file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read job {}", path.display()))?;
        let job: AimsJob =
            toml::from_str(&contents).with_context(|| format!("parse job {}", path.display()))?;
        job.validate()?;
        Ok(job)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("job name must not be empty");
        }
        if !self
            .name
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-')
        {
            bail!("job name {:?} must match [a-z0-9_-]+", self.name);
        }
        Ok(())
    }
}

/// Result of a finished job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub name: String,
    /// Calculation directory holding inputs and outputs.
    pub workdir: PathBuf,
    pub summary: AimsSummary,
}

/// Run a job end-to-end in `workdir`: write inputs, execute, parse, and
/// require a completed run.
#[instrument(skip_all, fields(job = %job.name, workdir = %workdir.display()))]
pub fn run_job<E: AimsExecutor + ?Sized>(
    executor: &E,
    job: &AimsJob,
    workdir: &Path,
    config: &AimsConfig,
) -> Result<JobOutcome> {
    info!("job started");
    job.validate()?;

    let species_dir = resolve_species_dir(&job.parameters, config.species_dir.as_deref());
    debug!(species_dir = ?species_dir, "writing inputs");
    write_inputs(
        workdir,
        &job.parameters,
        &job.structure,
        species_dir.as_deref(),
    )
    .with_context(|| format!("write inputs for job {}", job.name))?;

    let request = ExecRequest::new(&job.name, workdir, config);
    let summary = execute_and_parse(executor, &request)
        .with_context(|| format!("execute job {}", job.name))?;
    summary
        .ensure_completed()
        .with_context(|| format!("job {}", job.name))?;

    info!(total_energy_ev = ?summary.total_energy_ev, "job finished");
    Ok(JobOutcome {
        name: job.name.clone(),
        workdir: workdir.to_path_buf(),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Atom;
    use crate::testing::fixtures::parameters;
    use serde_json::json;
    use std::cell::RefCell;

    /// Executor that records request names and writes a canned `aims.out`.
    struct CannedExecutor {
        output: &'static str,
        calls: RefCell<Vec<String>>,
    }

    impl AimsExecutor for CannedExecutor {
        fn exec(&self, request: &ExecRequest) -> Result<()> {
            assert!(request.workdir.join("control.in").exists());
            self.calls.borrow_mut().push(request.job_name.clone());
            fs::write(request.output_path(), self.output)?;
            Ok(())
        }
    }

    fn h2_job() -> AimsJob {
        AimsJob::new(
            "h2_relax",
            Structure {
                lattice: None,
                atoms: vec![
                    Atom::new("H", [0.0, 0.0, 0.0]),
                    Atom::new("H", [0.0, 0.0, 0.74]),
                ],
            },
            parameters(json!({"xc": "pbe"})),
        )
    }

    #[test]
    fn run_job_writes_inputs_and_parses_output() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = CannedExecutor {
            output: "  | Total energy of the DFT / Hartree-Fock s.c.f. calculation :  -31.7 eV\n  Have a nice day.\n",
            calls: RefCell::new(Vec::new()),
        };

        let outcome =
            run_job(&executor, &h2_job(), temp.path(), &AimsConfig::default()).expect("job");

        assert_eq!(outcome.name, "h2_relax");
        assert_eq!(outcome.summary.total_energy_ev, Some(-31.7));
        assert_eq!(*executor.calls.borrow(), vec!["h2_relax".to_string()]);
        assert!(temp.path().join("geometry.in").exists());
        assert!(temp.path().join("parameters.json").exists());
    }

    #[test]
    fn run_job_rejects_incomplete_runs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let executor = CannedExecutor {
            output: "  SCF cycle not converged\n",
            calls: RefCell::new(Vec::new()),
        };

        let err =
            run_job(&executor, &h2_job(), temp.path(), &AimsConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("did not complete"));
    }

    #[test]
    fn rejects_invalid_job_names() {
        let mut job = h2_job();
        job.name = "H2 relax".to_string();
        let err = job.validate().unwrap_err();
        assert!(err.to_string().contains("must match"));
    }

    #[test]
    fn loads_job_from_toml() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("job.toml");
        fs::write(
            &path,
            r#"name = "si_single_point"

[structure]
lattice = [[0.0, 2.715, 2.715], [2.715, 0.0, 2.715], [2.715, 2.715, 0.0]]
atoms = [
    { species = "Si", position = [0, 0, 0] },
    { species = "Si", position = [1.3575, 1.3575, 1.3575] },
]

[parameters]
xc = "pbe"
k_grid = [2, 2, 2]
"#,
        )
        .expect("write job");

        let job = AimsJob::load(&path).expect("load");
        assert_eq!(job.name, "si_single_point");
        assert!(job.structure.is_periodic());
        assert_eq!(job.structure.atoms.len(), 2);
        assert_eq!(job.parameters["k_grid"], json!([2, 2, 2]));
    }
}
