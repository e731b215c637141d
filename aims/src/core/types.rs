//! Shared deterministic types for FHI-aims inputs.
//!
//! These types describe what gets written into a calculation directory. They
//! carry no I/O and serialize to stable JSON so reference data stays diffable.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// FHI-aims control keywords as written to `parameters.json`.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// A single atom in Cartesian coordinates (Å).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub species: String,
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(species: impl Into<String>, position: [f64; 3]) -> Self {
        Self {
            species: species.into(),
            position,
        }
    }
}

/// Atomic structure for `geometry.in`.
///
/// `lattice` is `None` for molecules and holds three lattice vectors (rows)
/// for periodic systems.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lattice: Option<[[f64; 3]; 3]>,
    pub atoms: Vec<Atom>,
}

impl Structure {
    pub fn is_periodic(&self) -> bool {
        self.lattice.is_some()
    }

    /// Distinct species in order of first appearance.
    pub fn species(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for atom in &self.atoms {
            if !seen.contains(&atom.species.as_str()) {
                seen.push(atom.species.as_str());
            }
        }
        seen
    }
}

/// Input files a calculation directory holds before FHI-aims runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InputFile {
    #[serde(rename = "control.in")]
    Control,
    #[serde(rename = "geometry.in")]
    Geometry,
    #[serde(rename = "parameters.json")]
    Parameters,
}

impl InputFile {
    pub const ALL: [InputFile; 3] = [
        InputFile::Control,
        InputFile::Geometry,
        InputFile::Parameters,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            InputFile::Control => "control.in",
            InputFile::Geometry => "geometry.in",
            InputFile::Parameters => "parameters.json",
        }
    }
}

impl fmt::Display for InputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

impl FromStr for InputFile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        InputFile::ALL
            .into_iter()
            .find(|file| file.file_name() == s)
            .ok_or_else(|| anyhow!("unknown input file {s:?} (expected control.in, geometry.in or parameters.json)"))
    }
}
