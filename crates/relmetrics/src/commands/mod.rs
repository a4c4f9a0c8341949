//! Command implementations

pub mod analyze;

pub mod doctor;

pub mod info;

pub mod plot;

pub mod preflight;

pub mod releases;

use owo_colors::OwoColorize;

/// Print a preflight-style check line.
pub fn print_check(passed: bool, name: &str, message: &str) {
    let icon = if passed {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    };
    println!("  {icon} {}: {}", name.bold(), message);
}
