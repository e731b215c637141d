//! Parsing of the FHI-aims main output (`aims.out`).

use std::sync::LazyLock;

use anyhow::{Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

const COMPLETION_MARKER: &str = "Have a nice day.";
const SCF_CONVERGED_MARKER: &str = "Self-consistency cycle converged.";

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FHI-aims version\s*:\s*(\S+)").expect("version regex"));
static SCF_CYCLES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\|\s*Number of self-consistency cycles\s*:\s*(\d+)").expect("scf cycles regex")
});
static TOTAL_ENERGY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\|\s*Total energy of the DFT / Hartree-Fock s\.c\.f\. calculation\s*:\s*(\S+)\s*eV",
    )
    .expect("total energy regex")
});
static CORRECTED_ENERGY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\|\s*Total energy corrected\s*:\s*(\S+)\s*eV").expect("corrected energy regex")
});

/// Summary of a finished (or aborted) FHI-aims run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AimsSummary {
    pub version: Option<String>,
    /// The run printed its closing `Have a nice day.` line.
    pub completed: bool,
    pub scf_converged: bool,
    pub scf_iterations: Option<u32>,
    /// Last reported total energy of the s.c.f. calculation (eV).
    pub total_energy_ev: Option<f64>,
    /// Last reported total energy corrected for finite smearing (eV).
    pub corrected_energy_ev: Option<f64>,
}

impl AimsSummary {
    /// Error unless the run completed and reported a total energy.
    pub fn ensure_completed(&self) -> Result<()> {
        if !self.completed {
            bail!("FHI-aims run did not complete (no {COMPLETION_MARKER:?} line)");
        }
        if self.total_energy_ev.is_none() {
            bail!("FHI-aims run completed without reporting a total energy");
        }
        Ok(())
    }
}

/// Parse `aims.out` contents. Missing fields stay `None`; for repeated values
/// (relaxation steps) the last occurrence wins.
pub fn parse_aims_output(contents: &str) -> AimsSummary {
    AimsSummary {
        version: VERSION_RE
            .captures(contents)
            .map(|caps| caps[1].to_string()),
        completed: contents.contains(COMPLETION_MARKER),
        scf_converged: contents.contains(SCF_CONVERGED_MARKER),
        scf_iterations: last_capture(&SCF_CYCLES_RE, contents).and_then(|v| v.parse().ok()),
        total_energy_ev: last_capture(&TOTAL_ENERGY_RE, contents).and_then(parse_fortran_float),
        corrected_energy_ev: last_capture(&CORRECTED_ENERGY_RE, contents)
            .and_then(parse_fortran_float),
    }
}

fn last_capture<'a>(re: &Regex, contents: &'a str) -> Option<&'a str> {
    re.captures_iter(contents)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Parse a float that may use Fortran `D` exponents (`-0.15D+05`).
fn parse_fortran_float(raw: &str) -> Option<f64> {
    raw.replace(['D', 'd'], "E").parse().ok()
}
