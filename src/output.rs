//! CLI output formatting for the `scan` and `cleanup` commands.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Photos (2)
//! 001 beach.jpg
//!     Source: 2023/beach.jpg
//!     optimised: 2023/beach.optimised.jpg
//!     preview: 2023/beach.preview.jpg
//! 002 dog.png
//!     Source: dog.png
//!     optimised: (original)
//!     preview: (original)
//!
//! 1 of 2 photos optimised
//! ```
//!
//! ## Cleanup
//!
//! ```text
//! Removed
//!     2023/beach.optimised.jpg
//!     2023/beach.preview.jpg
//! Failed
//!     locked.preview.jpg: Permission denied (os error 13)
//!
//! Removed 2 derivatives, 1 failed
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::scan::PurgeReport;
use crate::types::ImageIndex;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Display `path` relative to `root` when possible.
fn relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn variant_line(label: &str, path: Option<&Path>, root: &Path) -> String {
    match path {
        Some(p) => format!("{}{}: {}", indent(1), label, relative(p, root)),
        None => format!("{}{}: (original)", indent(1), label),
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Scan
// ============================================================================

/// Inventory of an index, sorted by name.
pub fn format_scan_output(index: &ImageIndex, root: &Path) -> Vec<String> {
    let mut entries: Vec<_> = index.values().collect();
    entries.sort_by(|a, b| a.name().cmp(b.name()));

    let mut lines = vec![format!("Photos ({})", entries.len())];
    for (pos, entry) in entries.iter().enumerate() {
        lines.push(format!("{} {}", format_index(pos + 1), entry.name()));
        lines.push(format!("{}Source: {}", indent(1), relative(entry.original(), root)));
        lines.push(variant_line("optimised", entry.optimised(), root));
        lines.push(variant_line("preview", entry.preview_variant(), root));
    }

    let optimised = entries.iter().filter(|e| e.is_optimised()).count();
    lines.push(String::new());
    lines.push(format!(
        "{} of {} optimised",
        optimised,
        plural(entries.len(), "photo")
    ));
    lines
}

pub fn print_scan_output(index: &ImageIndex, root: &Path) {
    for line in format_scan_output(index, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Cleanup
// ============================================================================

pub fn format_purge_output(report: &PurgeReport, root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    if !report.removed.is_empty() {
        lines.push("Removed".to_string());
        for path in &report.removed {
            lines.push(format!("{}{}", indent(1), relative(path, root)));
        }
    }
    if !report.failed.is_empty() {
        lines.push("Failed".to_string());
        for (path, err) in &report.failed {
            lines.push(format!("{}{}: {}", indent(1), relative(path, root), err));
        }
    }
    if !lines.is_empty() {
        lines.push(String::new());
    }

    let mut summary = format!("Removed {}", plural(report.removed.len(), "derivative"));
    if !report.failed.is_empty() {
        summary.push_str(&format!(", {} failed", report.failed.len()));
    }
    lines.push(summary);
    lines
}

pub fn print_purge_output(report: &PurgeReport, root: &Path) {
    for line in format_purge_output(report, root) {
        println!("{}", line);
    }
}
