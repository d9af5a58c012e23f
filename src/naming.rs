//! Filename conventions for derivative images.
//!
//! Every derivative fotodeck writes lives next to its source and carries a
//! marker tag as a pseudo-extension:
//!
//! ```text
//! holiday/beach.jpg                 original
//! holiday/beach.optimised.jpg       full-size derivative
//! holiday/beach.preview.jpg         thumbnail derivative
//! ```
//!
//! The marker is the only thing that distinguishes a derivative from an
//! original, so the same rules drive three decisions: the scanner skipping
//! its own output, the variant generator refusing to derive from a
//! derivative, and the watcher ignoring change events caused by its own
//! writes.
//!
//! ## Two detection strengths
//!
//! - [`Markers::name_contains_marker`] is the plain substring test applied by
//!   the scanner to a bare file name. It is deliberately broad: a file called
//!   `preview-of-summer.jpg` is skipped too.
//! - [`Markers::is_derivative`] looks for the dotted form `.<marker>.` in the
//!   file name of a path, which is exactly what [`derivative_path`] produces.
//!   Directory components are never inspected, so `trip.preview.2024/cat.jpg`
//!   is an original.

use std::path::{Path, PathBuf};

/// Extensions treated as photographs when no list is configured.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["png", "jpeg", "jpg", "svg", "gif"];

/// The pair of marker tags identifying optimised and preview derivatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub optimised: String,
    pub preview: String,
}

impl Markers {
    pub fn new(optimised: impl Into<String>, preview: impl Into<String>) -> Self {
        Self {
            optimised: optimised.into(),
            preview: preview.into(),
        }
    }

    /// True if either tag is empty. An empty tag matches every file name.
    pub fn has_empty(&self) -> bool {
        self.optimised.is_empty() || self.preview.is_empty()
    }

    /// Substring test on a bare file name, used when scanning.
    pub fn name_contains_marker(&self, file_name: &str) -> bool {
        file_name.contains(self.optimised.as_str()) || file_name.contains(self.preview.as_str())
    }

    /// Dotted-tag test (`.<marker>.`) on the file name of `path`.
    pub fn is_derivative(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy();
        [&self.optimised, &self.preview]
            .iter()
            .any(|tag| name.contains(&format!(".{tag}.")))
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::new("optimised", "preview")
    }
}

/// Compute the derivative path for `input` by inserting `marker` before the
/// true extension.
///
/// - `photo.jpg` → `photo.<marker>.jpg`
/// - `a.b.png` → `a.b.<marker>.png`
/// - `README` → `README.<marker>`
///
/// Only the file name changes; directories containing dots are untouched.
pub fn derivative_path(input: &Path, marker: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match input.extension() {
        Some(ext) => format!("{stem}.{marker}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{marker}"),
    };
    input.with_file_name(file_name)
}

/// Check a file name against the allowed extension list.
///
/// The extension is everything after the last `.` (the whole name when there
/// is no dot), compared case-insensitively.
pub fn extension_allowed<S: AsRef<str>>(file_name: &str, allowed: &[S]) -> bool {
    let ext = file_name.rsplit('.').next().unwrap_or(file_name);
    allowed
        .iter()
        .any(|candidate| candidate.as_ref().eq_ignore_ascii_case(ext))
}

/// Logical name for a source file: its file name.
pub fn logical_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
