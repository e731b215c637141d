//! `control.in` keyword formatting and comparison.

use anyhow::{Result, bail};
use serde_json::Value;

use crate::core::geometry::strip_comment;
use crate::core::types::Parameters;

/// Parameters that configure the calculation setup but are not control keywords.
pub const NON_CONTROL_KEYS: [&str; 1] = ["species_dir"];

/// Format parameters as `(keyword, value)` control lines, sorted by keyword.
///
/// Booleans become `.true.`/`.false.`, arrays of scalars are space-joined on one
/// line, and arrays of strings or arrays repeat the keyword once per element
/// (e.g. several `output` lines). `null` values are skipped.
pub fn control_lines(parameters: &Parameters) -> Result<Vec<(String, String)>> {
    let mut keys: Vec<&String> = parameters
        .keys()
        .filter(|key| !NON_CONTROL_KEYS.contains(&key.as_str()))
        .collect();
    keys.sort();

    let mut lines = Vec::new();
    for key in keys {
        let value = &parameters[key.as_str()];
        match value {
            Value::Null => {}
            Value::Array(items) if items.iter().all(|item| item.is_string() || item.is_array()) => {
                for item in items {
                    lines.push((key.clone(), format_value(key, item)?));
                }
            }
            _ => lines.push((key.clone(), format_value(key, value)?)),
        }
    }
    Ok(lines)
}

fn format_value(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::Bool(true) => Ok(".true.".to_string()),
        Value::Bool(false) => Ok(".false.".to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::String(text) => Ok(text.clone()),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(|item| format_value(key, item))
                .collect::<Result<Vec<_>>>()?;
            Ok(parts.join(" "))
        }
        Value::Null | Value::Object(_) => bail!("unsupported value for control keyword {key}: {value}"),
    }
}

/// Normalize `control.in` for comparison: drop comments and blank lines and
/// collapse runs of whitespace.
pub fn normalize_control(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(strip_comment)
        .filter(|line| !line.is_empty())
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect()
}

/// Differences between a reference and an actual `control.in`.
pub fn control_differences(reference: &str, actual: &str) -> Vec<String> {
    let expected = normalize_control(reference);
    let found = normalize_control(actual);

    let mut errors = Vec::new();
    for (index, (e, f)) in expected.iter().zip(&found).enumerate() {
        if e != f {
            errors.push(format!(
                "line {}: expected `{}`, found `{}`",
                index + 1,
                e,
                f
            ));
        }
    }
    if expected.len() != found.len() {
        errors.push(format!(
            "expected {} significant lines, found {}",
            expected.len(),
            found.len()
        ));
    }
    errors
}
