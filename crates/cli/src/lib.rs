//! Shared helpers for the slot-sentinel CLI.

pub mod commands;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Canonicalize the home path if possible, falling back to the given string
/// relative to the current working directory.
pub fn canonicalize_or_current(home: &str) -> Result<PathBuf> {
    let path = Path::new(home);
    if path == Path::new(".") {
        Ok(env::current_dir().context("Failed to get current directory")?)
    } else {
        // Try to canonicalize; if it fails (e.g., path does not yet exist),
        // join it with the current dir to get an absolute path.
        match path.canonicalize() {
            Ok(p) => Ok(p),
            Err(_) => {
                let cwd = env::current_dir().context("Failed to get current directory")?;
                Ok(cwd.join(path))
            }
        }
    }
}

/// Strip whitespace and uppercase a fiscal code, accepting only the
/// canonical 16-character alphanumeric shape.
///
/// This is a format gate, not the registry's checksum validation; the
/// portal itself is the authority on whether a code exists.
pub fn normalize_fiscal_code(input: &str) -> Option<String> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    let well_formed = cleaned.len() == 16 && cleaned.chars().all(|c| c.is_ascii_alphanumeric());
    well_formed.then_some(cleaned)
}

/// The portal wants the last six digits of the health-insurance card;
/// accept them with or without stray spacing.
pub fn normalize_health_insurance_number(input: &str) -> Option<String> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let well_formed = cleaned.len() == 6 && cleaned.chars().all(|c| c.is_ascii_digit());
    well_formed.then_some(cleaned)
}
