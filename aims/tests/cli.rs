//! CLI tests for the `aims` binary.
//!
//! Spawns the binary and checks exit codes and JSON output. The "FHI-aims"
//! command in these tests is a shell one-liner that prints a canned
//! `aims.out`.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use aims::core::output::AimsSummary;
use aims::exit_codes;
use aims::testing::fixtures::{completed_output, scratch_dir};

const JOB: &str = r#"name = "h2"

[structure]
atoms = [
    { species = "H", position = [0.0, 0.0, 0.0] },
    { species = "H", position = [0.0, 0.0, 0.74] },
]

[parameters]
xc = "pbe"
"#;

fn aims(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_aims"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("spawn aims")
}

#[cfg(unix)]
fn write_config_with_command(dir: &Path, script: &str) {
    let config = format!("command = [\"sh\", \"-c\", {script:?}]\ntimeout_secs = 30\n");
    fs::write(dir.join("aims.toml"), config).expect("config");
}

#[test]
fn parse_prints_summary_json() {
    let scratch = scratch_dir().expect("scratch");
    fs::write(scratch.path().join("aims.out"), completed_output(-31.7)).expect("aims.out");

    let output = aims(scratch.path(), &["parse", "aims.out"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let summary: AimsSummary = serde_json::from_slice(&output.stdout).expect("summary json");
    assert_eq!(summary.total_energy_ev, Some(-31.7));
    assert!(summary.completed);
}

#[test]
fn parse_missing_file_is_invalid() {
    let scratch = scratch_dir().expect("scratch");
    let output = aims(scratch.path(), &["parse", "missing.out"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.out"));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let scratch = scratch_dir().expect("scratch");

    let first = aims(scratch.path(), &["init"]);
    assert_eq!(first.status.code(), Some(exit_codes::OK));
    let written = fs::read_to_string(scratch.path().join("aims.toml")).expect("aims.toml");
    assert!(written.contains("aims.x"));

    let second = aims(scratch.path(), &["init"]);
    assert_eq!(second.status.code(), Some(exit_codes::INVALID));

    let forced = aims(scratch.path(), &["init", "--force"]);
    assert_eq!(forced.status.code(), Some(exit_codes::OK));
}

#[cfg(unix)]
#[test]
fn run_streams_command_output_into_workdir() {
    let scratch = scratch_dir().expect("scratch");
    let canned = scratch.path().join("canned.out");
    fs::write(&canned, completed_output(-31.7)).expect("canned");
    write_config_with_command(scratch.path(), &format!("cat {}", canned.display()));
    fs::write(scratch.path().join("job.toml"), JOB).expect("job");

    let output = aims(scratch.path(), &["run", "job.toml", "--workdir", "calc"]);

    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let summary: AimsSummary = serde_json::from_slice(&output.stdout).expect("summary json");
    assert_eq!(summary.total_energy_ev, Some(-31.7));
    let calc = scratch.path().join("calc");
    assert!(calc.join("control.in").exists());
    assert!(calc.join("geometry.in").exists());
    assert_eq!(
        fs::read_to_string(calc.join("aims.out")).expect("aims.out"),
        completed_output(-31.7)
    );
}

#[cfg(unix)]
#[test]
fn failing_command_is_invalid() {
    let scratch = scratch_dir().expect("scratch");
    write_config_with_command(scratch.path(), "echo broken >&2; exit 3");
    fs::write(scratch.path().join("job.toml"), JOB).expect("job");

    let output = aims(scratch.path(), &["run", "job.toml"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("FHI-aims failed"));
    let log = fs::read_to_string(scratch.path().join("h2").join("aims.err")).expect("aims.err");
    assert!(log.contains("broken"));
}

#[cfg(feature = "test-support")]
#[test]
fn check_mismatch_exits_with_mismatch_code() {
    use aims::core::types::InputFile;
    use aims::testing::fixtures::ReferenceCase;

    let scratch = scratch_dir().expect("scratch");
    ReferenceCase::new("ref")
        .input(InputFile::Control, "xc pbe\n")
        .write(scratch.path())
        .expect("reference");
    fs::write(scratch.path().join("control.in"), "xc pbe0\n").expect("control");

    let output = aims(scratch.path(), &["check", "ref", "--check", "control.in"]);

    assert_eq!(output.status.code(), Some(exit_codes::MISMATCH));
    assert!(String::from_utf8_lossy(&output.stderr).contains("input mismatch in control.in"));
}
