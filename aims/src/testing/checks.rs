//! Comparisons between the inputs a workflow wrote and recorded reference inputs.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::core::control::control_differences;
use crate::core::geometry::{POSITION_TOLERANCE, parse_geometry, structure_differences};
use crate::core::types::InputFile;

/// Parameters that legitimately differ between machines.
const IGNORED_PARAMETERS: [&str; 1] = ["species_dir"];

/// A written input file does not match its reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("input mismatch in {file}: {}", .differences.join("; "))]
pub struct InputMismatch {
    pub file: InputFile,
    pub differences: Vec<String>,
}

/// Compare each requested input in `workdir` against `ref_dir/inputs/`.
pub fn check_inputs(ref_dir: &Path, workdir: &Path, files: &[InputFile]) -> Result<()> {
    for file in files {
        let differences = match file {
            InputFile::Control => {
                let (reference, actual) = read_pair(ref_dir, workdir, *file)?;
                control_differences(&reference, &actual)
            }
            InputFile::Geometry => {
                let (reference, actual) = read_pair(ref_dir, workdir, *file)?;
                let reference = parse_geometry(&reference).context("parse reference geometry.in")?;
                let actual = parse_geometry(&actual).context("parse geometry.in")?;
                structure_differences(&reference, &actual, POSITION_TOLERANCE)
            }
            InputFile::Parameters => {
                let (reference, actual) = read_pair(ref_dir, workdir, *file)?;
                let reference: Value =
                    serde_json::from_str(&reference).context("parse reference parameters.json")?;
                let actual: Value =
                    serde_json::from_str(&actual).context("parse parameters.json")?;
                parameter_differences(&reference, &actual)
            }
        };
        if !differences.is_empty() {
            return Err(InputMismatch {
                file: *file,
                differences,
            }
            .into());
        }
        debug!(%file, "input matches reference");
    }
    Ok(())
}

fn read_pair(ref_dir: &Path, workdir: &Path, file: InputFile) -> Result<(String, String)> {
    let reference_path = ref_dir.join("inputs").join(file.file_name());
    let actual_path = workdir.join(file.file_name());
    let reference = fs::read_to_string(&reference_path)
        .with_context(|| format!("read reference input {}", reference_path.display()))?;
    let actual = fs::read_to_string(&actual_path)
        .with_context(|| format!("read input {}", actual_path.display()))?;
    Ok((reference, actual))
}

fn parameter_differences(reference: &Value, actual: &Value) -> Vec<String> {
    let (Some(reference), Some(actual)) = (reference.as_object(), actual.as_object()) else {
        return vec!["parameters.json must hold a JSON object".to_string()];
    };

    let mut errors = Vec::new();
    for (key, expected) in reference {
        if IGNORED_PARAMETERS.contains(&key.as_str()) {
            continue;
        }
        match actual.get(key) {
            None => errors.push(format!("missing parameter {key}")),
            Some(found) if found != expected => {
                errors.push(format!("parameter {key}: expected {expected}, found {found}"));
            }
            Some(_) => {}
        }
    }
    for key in actual.keys() {
        if !reference.contains_key(key) && !IGNORED_PARAMETERS.contains(&key.as_str()) {
            errors.push(format!("unexpected parameter {key}"));
        }
    }
    errors
}
