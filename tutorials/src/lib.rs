//! Run FHI-aims tutorials without FHI-aims.
//!
//! [`mock_aims`] opens a scope in which calculations are served from recorded
//! reference outputs under `tests/test_data/aims`. The scope owns a fresh
//! temporary calculation directory and, by default, makes it the process's
//! working directory. Dropping the scope restores the previous working
//! directory and then deletes the temporary directory, on every exit path
//! including early `?` returns and panics.
//!
//! ```no_run
//! use tutorials::mock_aims;
//!
//! # fn main() -> anyhow::Result<()> {
//! let scope = mock_aims([("si_single_point", "si_single_point")])?;
//! let record = scope.run("si_single_point")?;
//! assert!(record.workdir.join("aims.out").exists());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use aims::core::types::InputFile;
use aims::io::config::AimsConfig;
use aims::io::executor::{AimsExecutor, ExecRequest};
use aims::testing::{CwdGuard, ExecRecord, FakeRunOptions, ReferenceExecutor};
use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Root of the recorded FHI-aims reference data.
pub fn test_data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("tests")
        .join("test_data")
        .join("aims")
}

/// Knobs for [`MockAims::with_options`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockOptions {
    /// Make the temporary directory the process working directory for the
    /// lifetime of the scope.
    pub change_dir: bool,
    /// Inputs compared against the reference before each fake run.
    pub check_inputs: Vec<InputFile>,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            change_dir: true,
            check_inputs: Vec::new(),
        }
    }
}

/// A mock-execution scope. See the crate docs.
#[derive(Debug)]
pub struct MockAims {
    executor: ReferenceExecutor,
    workdir: PathBuf,
    // Released in this order by `Drop`: working directory, then the directory.
    cwd: Option<CwdGuard>,
    tempdir: Option<TempDir>,
}

impl MockAims {
    /// Open a scope over `ref_paths` (case name to directory below `ref_root`).
    ///
    /// A relative `ref_root` is resolved against the working directory at the
    /// time the scope opens.
    pub fn with_options<I, K, P>(ref_root: &Path, ref_paths: I, options: MockOptions) -> Result<Self>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: Into<PathBuf>,
    {
        let ref_paths = ref_paths
            .into_iter()
            .map(|(name, path)| (name.into(), path.into()))
            .collect::<BTreeMap<String, PathBuf>>();
        let run_options = ref_paths
            .keys()
            .map(|name| {
                let run = FakeRunOptions {
                    check_inputs: options.check_inputs.clone(),
                    clear_inputs: false,
                };
                (name.clone(), run)
            })
            .collect();
        let cases = ref_paths.keys().cloned().collect::<Vec<_>>();

        let tempdir = TempDir::with_prefix("mock-aims-").context("create mock FHI-aims directory")?;
        let workdir = tempdir
            .path()
            .canonicalize()
            .with_context(|| format!("resolve {}", tempdir.path().display()))?;
        let cwd = if options.change_dir {
            Some(CwdGuard::enter(&workdir)?)
        } else {
            None
        };
        // Relative roots name a directory below the caller's working
        // directory, not below the scope's.
        let ref_root = match &cwd {
            Some(guard) => guard.original().join(ref_root),
            None => std::path::absolute(ref_root)
                .with_context(|| format!("resolve reference root {}", ref_root.display()))?,
        };
        let executor = ReferenceExecutor::new(ref_root, ref_paths, run_options);

        info!(workdir = %workdir.display(), cases = ?cases, "mock FHI-aims scope opened");
        Ok(Self {
            executor,
            workdir,
            cwd,
            tempdir: Some(tempdir),
        })
    }

    /// Temporary calculation directory owned by the scope.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Working directory that was current when the scope was opened, if the
    /// scope changed it.
    pub fn original_dir(&self) -> Option<&Path> {
        self.cwd.as_ref().map(CwdGuard::original)
    }

    /// The fake FHI-aims executor, for workflow code that takes an
    /// [`AimsExecutor`].
    pub fn executor(&self) -> &ReferenceExecutor {
        &self.executor
    }

    /// Fake-run `case` in the scope's directory and return its record.
    pub fn run(&self, case: &str) -> Result<ExecRecord> {
        let request = ExecRequest::new(case, &self.workdir, &AimsConfig::default());
        self.executor.exec(&request)?;
        self.executor
            .calls()
            .pop()
            .with_context(|| format!("fake run of {case} left no record"))
    }

    /// Every fake run so far, oldest first.
    pub fn calls(&self) -> Vec<ExecRecord> {
        self.executor.calls()
    }
}

impl Drop for MockAims {
    fn drop(&mut self) {
        drop(self.cwd.take());
        if let Some(tempdir) = self.tempdir.take() {
            let path = tempdir.path().to_path_buf();
            match tempdir.close() {
                Ok(()) => debug!(path = %path.display(), "removed mock FHI-aims directory"),
                Err(err) => {
                    warn!(err = %err, path = %path.display(), "failed to remove mock FHI-aims directory");
                }
            }
        }
    }
}

/// Open a scope replaying `ref_paths` from [`test_data_dir`], without input
/// checks.
pub fn mock_aims<I, K, P>(ref_paths: I) -> Result<MockAims>
where
    I: IntoIterator<Item = (K, P)>,
    K: Into<String>,
    P: Into<PathBuf>,
{
    MockAims::with_options(&test_data_dir(), ref_paths, MockOptions::default())
}

/// Run `body` inside a [`mock_aims`] scope.
///
/// The scope is released before this returns; an error from `body` is
/// returned unchanged.
pub fn with_mock_aims<I, K, P, T, F>(ref_paths: I, body: F) -> Result<T>
where
    I: IntoIterator<Item = (K, P)>,
    K: Into<String>,
    P: Into<PathBuf>,
    F: FnOnce(&MockAims) -> Result<T>,
{
    let scope = mock_aims(ref_paths)?;
    let result = body(&scope);
    drop(scope);
    result
}
