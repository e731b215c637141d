//! Tutorial: a PBE single point of bulk silicon.
//!
//! Writes the inputs for a two-atom diamond cell and "runs" FHI-aims inside a
//! mock scope, so the tutorial works on machines without the binary.

use aims::core::types::InputFile;
use aims::io::config::AimsConfig;
use aims::job::{AimsJob, run_job};
use aims::logging;
use aims::testing::fixtures::{parameters, silicon};
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;
use tutorials::{MockAims, MockOptions, test_data_dir};

const CASE: &str = "si_single_point";

#[derive(Parser)]
#[command(
    name = "si-single-point",
    version,
    about = "Silicon single point against recorded FHI-aims outputs"
)]
struct Cli {
    /// Compare the written inputs with the recorded ones before replaying.
    #[arg(long)]
    check_inputs: bool,
    /// Print the written control.in.
    #[arg(long)]
    show_inputs: bool,
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let options = MockOptions {
        check_inputs: if cli.check_inputs {
            InputFile::ALL.to_vec()
        } else {
            Vec::new()
        },
        ..MockOptions::default()
    };
    let scope = MockAims::with_options(&test_data_dir(), [(CASE, CASE)], options)?;

    let job = tutorial_job();
    let outcome = run_job(scope.executor(), &job, scope.workdir(), &AimsConfig::default())?;
    info!(workdir = %outcome.workdir.display(), "tutorial job finished");

    if cli.show_inputs {
        let control = std::fs::read_to_string(outcome.workdir.join(InputFile::Control.file_name()))
            .context("read control.in")?;
        print!("{control}");
    }
    let summary = &outcome.summary;
    println!(
        "si-single-point: version={} scf_converged={} scf_iterations={}",
        summary.version.as_deref().unwrap_or("unknown"),
        summary.scf_converged,
        summary
            .scf_iterations
            .map_or_else(|| "unknown".to_string(), |n| n.to_string())
    );
    if let Some(energy) = summary.total_energy_ev {
        println!("si-single-point: total_energy_ev={energy:.6}");
        println!("si-single-point: energy_per_atom_ev={:.6}", energy / job.structure.atoms.len() as f64);
    }
    Ok(())
}

/// Diamond silicon with PBE, matching the recorded reference inputs.
fn tutorial_job() -> AimsJob {
    AimsJob::new(
        CASE,
        silicon(),
        parameters(json!({
            "xc": "pbe",
            "relativistic": "atomic_zora scalar",
            "k_grid": [2, 2, 2],
        })),
    )
}
