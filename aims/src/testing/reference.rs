//! Reference-output executor that stands in for FHI-aims.
//!
//! Each job name maps to a recorded reference directory:
//!
//! ```text
//! <ref_root>/<ref_path>/
//! ├── inputs/    control.in, geometry.in, parameters.json
//! └── outputs/   aims.out (optionally gzipped), other output files
//! ```
//!
//! A fake run optionally compares the inputs the workflow wrote against
//! `inputs/`, then copies `outputs/` into the calculation directory.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result, anyhow, bail};
use flate2::read::GzDecoder;
use tracing::{debug, info, instrument};

use crate::core::types::InputFile;
use crate::io::executor::{AimsExecutor, ExecRequest};
use crate::testing::checks::check_inputs;

/// Per-job behaviour of a fake run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRunOptions {
    /// Inputs compared against the reference before outputs are copied.
    pub check_inputs: Vec<InputFile>,
    /// Delete the written inputs before copying outputs.
    pub clear_inputs: bool,
}

impl Default for FakeRunOptions {
    fn default() -> Self {
        Self {
            check_inputs: InputFile::ALL.to_vec(),
            clear_inputs: false,
        }
    }
}

impl FakeRunOptions {
    /// Copy outputs without comparing any inputs.
    pub fn unchecked() -> Self {
        Self {
            check_inputs: Vec::new(),
            clear_inputs: false,
        }
    }
}

/// One fake FHI-aims invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRecord {
    pub job_name: String,
    /// Reference directory the outputs came from.
    pub reference: PathBuf,
    pub workdir: PathBuf,
    /// Files written into `workdir`, sorted.
    pub copied: Vec<PathBuf>,
}

/// [`AimsExecutor`] that replays recorded reference outputs.
#[derive(Debug)]
pub struct ReferenceExecutor {
    ref_root: PathBuf,
    ref_paths: BTreeMap<String, PathBuf>,
    run_options: BTreeMap<String, FakeRunOptions>,
    calls: Mutex<Vec<ExecRecord>>,
}

impl ReferenceExecutor {
    /// `ref_paths` are resolved against `ref_root`. Jobs without an entry in
    /// `run_options` use [`FakeRunOptions::default`].
    pub fn new(
        ref_root: impl Into<PathBuf>,
        ref_paths: BTreeMap<String, PathBuf>,
        run_options: BTreeMap<String, FakeRunOptions>,
    ) -> Self {
        Self {
            ref_root: ref_root.into(),
            ref_paths,
            run_options,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reference directory recorded for `job_name`.
    pub fn reference_dir(&self, job_name: &str) -> Result<PathBuf> {
        let ref_path = self.ref_paths.get(job_name).ok_or_else(|| {
            let known = self.ref_paths.keys().cloned().collect::<Vec<_>>();
            anyhow!(
                "no reference directory for job {job_name:?}; known jobs: [{}]",
                known.join(", ")
            )
        })?;
        Ok(self.ref_root.join(ref_path))
    }

    pub fn run_options(&self, job_name: &str) -> FakeRunOptions {
        self.run_options
            .get(job_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Invocations so far, oldest first.
    pub fn calls(&self) -> Vec<ExecRecord> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Error unless every job in `job_names` ran, in that order.
    pub fn assert_called(&self, job_names: &[&str]) -> Result<()> {
        let called = self
            .calls()
            .into_iter()
            .map(|record| record.job_name)
            .collect::<Vec<_>>();
        if called != job_names {
            bail!("expected fake runs {job_names:?}, got {called:?}");
        }
        Ok(())
    }
}

impl AimsExecutor for ReferenceExecutor {
    #[instrument(skip_all, fields(job = %request.job_name))]
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        let reference = self.reference_dir(&request.job_name)?;
        let options = self.run_options(&request.job_name);
        let copied = fake_run_aims(&reference, &request.workdir, &options)
            .with_context(|| format!("fake FHI-aims run for job {}", request.job_name))?;
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ExecRecord {
                job_name: request.job_name.clone(),
                reference,
                workdir: request.workdir.clone(),
                copied,
            });
        Ok(())
    }
}

/// Pretend to run FHI-aims in `workdir` using the recorded `reference`.
///
/// Returns the output files written into `workdir`.
pub fn fake_run_aims(reference: &Path, workdir: &Path, options: &FakeRunOptions) -> Result<Vec<PathBuf>> {
    info!(reference = %reference.display(), "running fake FHI-aims");
    check_inputs(reference, workdir, &options.check_inputs)?;
    if options.clear_inputs {
        clear_inputs(workdir)?;
    }
    let copied = copy_outputs(reference, workdir)?;
    info!(files = copied.len(), "generated fake FHI-aims outputs");
    Ok(copied)
}

/// Remove the FHI-aims input files from `workdir`, ignoring absent ones.
pub fn clear_inputs(workdir: &Path) -> Result<()> {
    for file in InputFile::ALL {
        let path = workdir.join(file.file_name());
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
            debug!(path = %path.display(), "cleared input");
        }
    }
    Ok(())
}

/// Copy every regular file in `<reference>/outputs` into `workdir`.
///
/// `.gz` files are decompressed under their name without the suffix.
pub fn copy_outputs(reference: &Path, workdir: &Path) -> Result<Vec<PathBuf>> {
    let outputs = reference.join("outputs");
    if !outputs.is_dir() {
        bail!("missing reference outputs {}", outputs.display());
    }
    fs::create_dir_all(workdir).with_context(|| format!("create {}", workdir.display()))?;

    let mut copied = Vec::new();
    for entry in fs::read_dir(&outputs).with_context(|| format!("read {}", outputs.display()))? {
        let entry = entry.context("read reference entry")?;
        if !entry.file_type().context("read file type")?.is_file() {
            continue;
        }
        let source = entry.path();
        let gzipped = source.extension().is_some_and(|ext| ext == "gz");
        let target = match source.file_stem() {
            Some(stem) if gzipped => {
                let target = workdir.join(stem);
                gunzip(&source, &target)?;
                target
            }
            _ => {
                let target = workdir.join(entry.file_name());
                fs::copy(&source, &target).with_context(|| {
                    format!("copy {} to {}", source.display(), target.display())
                })?;
                target
            }
        };
        debug!(target = %target.display(), "copied reference output");
        copied.push(target);
    }
    copied.sort();
    Ok(copied)
}

fn gunzip(source: &Path, target: &Path) -> Result<()> {
    let input = File::open(source).with_context(|| format!("open {}", source.display()))?;
    let mut decoder = GzDecoder::new(input);
    let mut output = File::create(target).with_context(|| format!("create {}", target.display()))?;
    io::copy(&mut decoder, &mut output)
        .with_context(|| format!("decompress {}", source.display()))?;
    Ok(())
}
