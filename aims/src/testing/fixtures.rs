//! Deterministic structures, parameters and reference layouts for tests.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::Value;
use tempfile::TempDir;

use crate::core::types::{Atom, InputFile, Parameters, Structure};

/// Scratch directory removed on drop.
pub fn scratch_dir() -> Result<TempDir> {
    TempDir::with_prefix("aims-test-").context("create scratch directory")
}

/// Two-atom primitive cell of diamond silicon (a = 5.43 Å).
pub fn silicon() -> Structure {
    Structure {
        lattice: Some([[0.0, 2.715, 2.715], [2.715, 0.0, 2.715], [2.715, 2.715, 0.0]]),
        atoms: vec![
            Atom::new("Si", [0.0, 0.0, 0.0]),
            Atom::new("Si", [1.3575, 1.3575, 1.3575]),
        ],
    }
}

/// Isolated water molecule.
pub fn water() -> Structure {
    Structure {
        lattice: None,
        atoms: vec![
            Atom::new("O", [0.0, 0.0, 0.0]),
            Atom::new("H", [0.757, 0.586, 0.0]),
            Atom::new("H", [-0.757, 0.586, 0.0]),
        ],
    }
}

/// Convert a `json!` object literal into [`Parameters`].
///
/// Panics when `value` is not an object.
pub fn parameters(value: Value) -> Parameters {
    match value {
        Value::Object(map) => map,
        other => panic!("parameters must be a JSON object, got {other}"),
    }
}

/// Minimal `aims.out` of a completed, converged run.
pub fn completed_output(total_energy_ev: f64) -> String {
    format!(
        "          FHI-aims version      : 240507\n\
  Self-consistency cycle converged.\n\
  | Number of self-consistency cycles          :           10\n\
  | Total energy of the DFT / Hartree-Fock s.c.f. calculation      :  {total_energy_ev:.9} eV\n\
          Have a nice day.\n"
    )
}

/// Builder for an on-disk reference case (`<name>/inputs`, `<name>/outputs`).
#[derive(Debug, Clone, Default)]
pub struct ReferenceCase {
    name: String,
    inputs: Vec<(InputFile, String)>,
    outputs: Vec<(String, Vec<u8>)>,
    gzipped: Vec<(String, Vec<u8>)>,
}

impl ReferenceCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn input(mut self, file: InputFile, contents: impl Into<String>) -> Self {
        self.inputs.push((file, contents.into()));
        self
    }

    pub fn output(mut self, name: impl Into<String>, contents: impl AsRef<[u8]>) -> Self {
        self.outputs
            .push((name.into(), contents.as_ref().to_vec()));
        self
    }

    /// Store `contents` gzip-compressed as `<name>.gz`.
    pub fn gzipped_output(mut self, name: impl Into<String>, contents: impl AsRef<[u8]>) -> Self {
        self.gzipped
            .push((name.into(), contents.as_ref().to_vec()));
        self
    }

    /// Write the case below `root`; returns the case directory.
    pub fn write(&self, root: &Path) -> Result<PathBuf> {
        let case_dir = root.join(&self.name);
        let inputs_dir = case_dir.join("inputs");
        let outputs_dir = case_dir.join("outputs");
        fs::create_dir_all(&inputs_dir)
            .with_context(|| format!("create {}", inputs_dir.display()))?;
        fs::create_dir_all(&outputs_dir)
            .with_context(|| format!("create {}", outputs_dir.display()))?;

        for (file, contents) in &self.inputs {
            let path = inputs_dir.join(file.file_name());
            fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        }
        for (name, contents) in &self.outputs {
            let path = outputs_dir.join(name);
            fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        }
        for (name, contents) in &self.gzipped {
            let path = outputs_dir.join(format!("{name}.gz"));
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(contents).context("gzip output")?;
            let compressed = encoder.finish().context("finish gzip output")?;
            fs::write(&path, compressed).with_context(|| format!("write {}", path.display()))?;
        }
        Ok(case_dir)
    }
}
