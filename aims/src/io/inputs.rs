//! Input writer for a calculation directory.
//!
//! Writes `control.in` (rendered through minijinja), `geometry.in`, and
//! `parameters.json`. Parameters are validated against an embedded JSON Schema
//! before anything touches the filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::validator_for;
use minijinja::{Environment, context};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::core::control::control_lines;
use crate::core::elements::species_file_name;
use crate::core::geometry::render_geometry;
use crate::core::types::{InputFile, Parameters, Structure};

const PARAMETERS_SCHEMA: &str = include_str!("../../schemas/parameters.schema.json");
const CONTROL_TEMPLATE: &str = include_str!("templates/control.in.j2");

/// Paths of the input files written for one calculation.
#[derive(Debug, Clone)]
pub struct InputPaths {
    pub control: PathBuf,
    pub geometry: PathBuf,
    pub parameters: PathBuf,
}

impl InputPaths {
    pub fn new(workdir: &Path) -> Self {
        Self {
            control: workdir.join(InputFile::Control.file_name()),
            geometry: workdir.join(InputFile::Geometry.file_name()),
            parameters: workdir.join(InputFile::Parameters.file_name()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ControlLine {
    keyword: String,
    value: String,
}

/// Validate parameters against the embedded schema.
pub fn validate_parameters(parameters: &Parameters) -> Result<()> {
    let schema: Value = serde_json::from_str(PARAMETERS_SCHEMA).context("parse parameters schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    let instance = Value::Object(parameters.clone());
    if !compiled.is_valid(&instance) {
        let messages = compiled
            .iter_errors(&instance)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "parameters schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

/// Resolve the species directory: `species_dir` in the parameters wins over
/// the configured default.
pub fn resolve_species_dir(parameters: &Parameters, configured: Option<&Path>) -> Option<PathBuf> {
    parameters
        .get("species_dir")
        .and_then(Value::as_str)
        .map(PathBuf::from)
        .or_else(|| configured.map(Path::to_path_buf))
}

/// Render `control.in`, appending species defaults when `species_dir` is set.
pub fn render_control(
    parameters: &Parameters,
    structure: &Structure,
    species_dir: Option<&Path>,
) -> Result<String> {
    let lines = control_lines(parameters)?
        .into_iter()
        .map(|(keyword, value)| ControlLine { keyword, value })
        .collect::<Vec<_>>();

    let mut species_blocks = Vec::new();
    if let Some(dir) = species_dir {
        for species in structure.species() {
            species_blocks.push(read_species_defaults(dir, species)?);
        }
    }

    let mut env = Environment::new();
    env.add_template("control.in", CONTROL_TEMPLATE)?;
    let template = env.get_template("control.in")?;
    let mut rendered = template.render(context! {
        lines => lines,
        species_blocks => species_blocks,
    })?;
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    Ok(rendered)
}

/// Validate parameters and write all three input files into `workdir`.
pub fn write_inputs(
    workdir: &Path,
    parameters: &Parameters,
    structure: &Structure,
    species_dir: Option<&Path>,
) -> Result<InputPaths> {
    validate_parameters(parameters)?;
    if structure.atoms.is_empty() {
        bail!("structure has no atoms");
    }
    if parameters.contains_key("k_grid") && !structure.is_periodic() {
        bail!("k_grid requires a periodic structure (no lattice vectors given)");
    }

    let control = render_control(parameters, structure, species_dir)?;
    let paths = InputPaths::new(workdir);
    fs::create_dir_all(workdir)
        .with_context(|| format!("create calculation dir {}", workdir.display()))?;
    write_file(&paths.control, &control)?;
    write_file(&paths.geometry, &render_geometry(structure))?;
    let mut json = serde_json::to_string_pretty(parameters).context("serialize parameters")?;
    json.push('\n');
    write_file(&paths.parameters, &json)?;

    debug!(
        workdir = %workdir.display(),
        atoms = structure.atoms.len(),
        with_species = species_dir.is_some(),
        "wrote FHI-aims inputs"
    );
    Ok(paths)
}

fn read_species_defaults(dir: &Path, species: &str) -> Result<String> {
    let file_name =
        species_file_name(species).ok_or_else(|| anyhow!("unknown element symbol {species:?}"))?;
    let path = dir.join(file_name);
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("read species defaults {}", path.display()))?;
    Ok(contents.trim_end().to_string())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{parameters as params, silicon, water};
    use serde_json::json;

    #[test]
    fn schema_accepts_typical_parameters() {
        let parameters = params(json!({"xc": "pbe", "k_grid": [4, 4, 4], "relativistic": "atomic_zora scalar"}));
        validate_parameters(&parameters).expect("valid");
    }

    #[test]
    fn schema_requires_xc_and_three_k_points() {
        let err = validate_parameters(&params(json!({"k_grid": [4, 4]}))).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("parameters schema validation failed"));
        assert!(message.contains("xc"));
    }

    #[test]
    fn renders_control_with_species_blocks() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("08_O_default"), "  species O\n  nucleus 8\n").expect("O");
        fs::write(temp.path().join("01_H_default"), "  species H\n  nucleus 1\n").expect("H");

        let control = render_control(&params(json!({"xc": "pbe"})), &water(), Some(temp.path()))
            .expect("render");

        assert!(control.starts_with("#====="));
        assert!(control.contains("\nxc pbe\n"));
        let o = control.find("species O").expect("O block");
        let h = control.find("species H").expect("H block");
        assert!(o < h, "species follow first appearance order");
        assert!(control.ends_with("nucleus 1\n"));
    }

    #[test]
    fn missing_species_file_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = render_control(&params(json!({"xc": "pbe"})), &water(), Some(temp.path()))
            .unwrap_err();
        assert!(format!("{err:#}").contains("08_O_default"));
    }

    #[test]
    fn writes_all_inputs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workdir = temp.path().join("calc");
        let parameters = params(json!({"xc": "pbe", "k_grid": [2, 2, 2]}));

        let paths = write_inputs(&workdir, &parameters, &silicon(), None).expect("write");

        let control = fs::read_to_string(&paths.control).expect("control.in");
        assert!(control.contains("k_grid 2 2 2\nxc pbe\n"));
        let geometry = fs::read_to_string(&paths.geometry).expect("geometry.in");
        assert_eq!(geometry.lines().filter(|l| l.starts_with("atom ")).count(), 2);
        let written: Value =
            serde_json::from_str(&fs::read_to_string(&paths.parameters).expect("json"))
                .expect("parse");
        assert_eq!(written, Value::Object(parameters));
    }

    #[test]
    fn k_grid_requires_periodic_structure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let parameters = params(json!({"xc": "pbe", "k_grid": [2, 2, 2]}));
        let err = write_inputs(temp.path(), &parameters, &water(), None).unwrap_err();
        assert!(err.to_string().contains("k_grid requires a periodic structure"));
        assert!(!temp.path().join("control.in").exists());
    }

    #[test]
    fn parameter_species_dir_overrides_config() {
        let parameters = params(json!({"xc": "pbe", "species_dir": "/from/params"}));
        let resolved = resolve_species_dir(&parameters, Some(Path::new("/from/config")));
        assert_eq!(resolved, Some(PathBuf::from("/from/params")));
        let resolved = resolve_species_dir(&params(json!({"xc": "pbe"})), Some(Path::new("/c")));
        assert_eq!(resolved, Some(PathBuf::from("/c")));
    }
}
