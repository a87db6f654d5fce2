//! `ocrbench check`: configuration diagnosis.

use anyhow::{bail, Result};

use ocrbench_config::Settings;

use crate::output::{dim, fail, ok, warn};

/// Print the validation report and the effective (redacted) settings.
pub fn run(settings: &Settings) -> Result<()> {
    println!("\nChecking configuration...\n");

    let report = settings.validate();
    for error in &report.errors {
        println!("  {} {}: {}", fail("✗"), error.path, error.message);
    }
    for warning in &report.warnings {
        println!("  {} {}: {}", warn("!"), warning.path, warning.message);
    }
    if report.errors.is_empty() && report.warnings.is_empty() {
        println!("  {} No issues found", ok("✓"));
    }

    println!("\n{}", dim("Effective settings:"));
    println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
    let masked = settings.secret_paths();
    if !masked.is_empty() {
        println!("{}", dim(&format!("Masked: {}", masked.join(", "))));
    }
    println!();

    if !report.is_valid() {
        bail!("{} configuration error(s)", report.errors.len());
    }
    println!("{}", ok("Configuration looks good."));
    Ok(())
}
