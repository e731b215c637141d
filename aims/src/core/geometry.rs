//! `geometry.in` rendering, parsing, and comparison.

use anyhow::{Context, Result, anyhow, bail};

use crate::core::types::{Atom, Structure};

/// Absolute tolerance (Å) when comparing lattice vectors and atom positions.
pub const POSITION_TOLERANCE: f64 = 1e-3;

/// Render a structure as `geometry.in` (Cartesian `atom` lines, 8 decimals).
pub fn render_geometry(structure: &Structure) -> String {
    let mut lines = Vec::new();
    if let Some(lattice) = &structure.lattice {
        for vector in lattice {
            lines.push(format!("lattice_vector {}", format_vector(vector)));
        }
    }
    for atom in &structure.atoms {
        lines.push(format!(
            "atom {} {}",
            format_vector(&atom.position),
            atom.species
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}

/// Parse `geometry.in` contents.
///
/// `atom_frac` positions are converted to Cartesian coordinates. Keywords other
/// than `lattice_vector`, `atom` and `atom_frac` (initial moments, constraints)
/// are ignored.
pub fn parse_geometry(contents: &str) -> Result<Structure> {
    let mut lattice = Vec::new();
    let mut atoms = Vec::new();
    let mut fractional = Vec::new();

    for (index, raw) in contents.lines().enumerate() {
        let line_no = index + 1;
        let line = strip_comment(raw);
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };
        match keyword {
            "lattice_vector" => lattice.push(parse_vector(&mut tokens, line_no)?),
            "atom" | "atom_frac" => {
                let position = parse_vector(&mut tokens, line_no)?;
                let species = tokens
                    .next()
                    .ok_or_else(|| anyhow!("line {line_no}: {keyword} is missing a species"))?;
                if keyword == "atom_frac" {
                    fractional.push(atoms.len());
                }
                atoms.push(Atom::new(species, position));
            }
            _ => {}
        }
    }

    let lattice = match lattice.as_slice() {
        [] => None,
        [a, b, c] => Some([*a, *b, *c]),
        other => bail!("expected 0 or 3 lattice vectors, found {}", other.len()),
    };
    if !fractional.is_empty() {
        let cell = lattice.ok_or_else(|| anyhow!("atom_frac requires lattice vectors"))?;
        for index in fractional {
            atoms[index].position = fractional_to_cartesian(&cell, atoms[index].position);
        }
    }

    Ok(Structure { lattice, atoms })
}

/// Differences between a reference and an actual structure.
///
/// An empty list means the structures match within `tolerance`.
pub fn structure_differences(
    reference: &Structure,
    actual: &Structure,
    tolerance: f64,
) -> Vec<String> {
    let mut errors = Vec::new();

    match (&reference.lattice, &actual.lattice) {
        (None, None) => {}
        (Some(_), None) => errors.push("expected lattice vectors, found none".to_string()),
        (None, Some(_)) => errors.push("expected no lattice vectors".to_string()),
        (Some(expected), Some(found)) => {
            for (index, (e, f)) in expected.iter().zip(found).enumerate() {
                if !vectors_close(e, f, tolerance) {
                    errors.push(format!(
                        "lattice_vector {}: expected {}, found {}",
                        index + 1,
                        format_vector(e),
                        format_vector(f)
                    ));
                }
            }
        }
    }

    if reference.atoms.len() != actual.atoms.len() {
        errors.push(format!(
            "expected {} atoms, found {}",
            reference.atoms.len(),
            actual.atoms.len()
        ));
        return errors;
    }

    for (index, (expected, found)) in reference.atoms.iter().zip(&actual.atoms).enumerate() {
        if expected.species != found.species {
            errors.push(format!(
                "atom {}: expected species {}, found {}",
                index + 1,
                expected.species,
                found.species
            ));
        }
        if !vectors_close(&expected.position, &found.position, tolerance) {
            errors.push(format!(
                "atom {}: expected position {}, found {}",
                index + 1,
                format_vector(&expected.position),
                format_vector(&found.position)
            ));
        }
    }

    errors
}

/// Drop a trailing `#` comment and surrounding whitespace.
pub(crate) fn strip_comment(line: &str) -> &str {
    match line.split_once('#') {
        Some((before, _)) => before.trim(),
        None => line.trim(),
    }
}

fn parse_vector<'a>(tokens: &mut impl Iterator<Item = &'a str>, line_no: usize) -> Result<[f64; 3]> {
    let mut vector = [0.0; 3];
    for component in &mut vector {
        let token = tokens
            .next()
            .ok_or_else(|| anyhow!("line {line_no}: expected three coordinates"))?;
        *component = token
            .parse()
            .with_context(|| format!("line {line_no}: invalid coordinate {token:?}"))?;
    }
    Ok(vector)
}

fn fractional_to_cartesian(cell: &[[f64; 3]; 3], frac: [f64; 3]) -> [f64; 3] {
    let mut cartesian = [0.0; 3];
    for (axis, value) in cartesian.iter_mut().enumerate() {
        *value = (0..3).map(|i| frac[i] * cell[i][axis]).sum();
    }
    cartesian
}

fn vectors_close(a: &[f64; 3], b: &[f64; 3], tolerance: f64) -> bool {
    a.iter().zip(b).all(|(x, y)| (x - y).abs() <= tolerance)
}

fn format_vector(vector: &[f64; 3]) -> String {
    format!("{:.8} {:.8} {:.8}", vector[0], vector[1], vector[2])
}
