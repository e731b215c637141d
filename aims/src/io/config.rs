//! Execution configuration stored in `aims.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "aims.toml";

/// FHI-aims execution configuration (TOML).
///
/// Missing fields default to a serial `aims.x` run with a 24 hour budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AimsConfig {
    /// Command used to launch FHI-aims (e.g. `["mpirun", "-n", "4", "aims.x"]`).
    pub command: Vec<String>,

    /// Wall-clock budget for a single run in seconds.
    pub timeout_secs: u64,

    /// Truncate stdout kept in memory and stderr logs beyond this many bytes.
    /// `aims.out` itself is always streamed in full.
    pub output_limit_bytes: usize,

    /// Species defaults directory for one basis flavour
    /// (e.g. `species_defaults/defaults_2020/light`).
    pub species_dir: Option<PathBuf>,
}

impl Default for AimsConfig {
    fn default() -> Self {
        Self {
            command: vec!["aims.x".to_string()],
            timeout_secs: 24 * 60 * 60,
            output_limit_bytes: 1_000_000,
            species_dir: None,
        }
    }
}

impl AimsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.command.is_empty() || self.command[0].trim().is_empty() {
            return Err(anyhow!("command must be a non-empty array"));
        }
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AimsConfig::default()`.
pub fn load_config(path: &Path) -> Result<AimsConfig> {
    if !path.exists() {
        let cfg = AimsConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AimsConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AimsConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AimsConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        let cfg = AimsConfig {
            command: vec!["mpirun".into(), "-n".into(), "4".into(), "aims.x".into()],
            species_dir: Some(PathBuf::from("/opt/aims/species_defaults/defaults_2020/light")),
            ..AimsConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "timeout_secs = 60\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.timeout(), Duration::from_secs(60));
        assert_eq!(cfg.command, vec!["aims.x".to_string()]);
    }

    #[test]
    fn rejects_empty_command() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "command = []\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("command must be a non-empty array"));
    }
}
