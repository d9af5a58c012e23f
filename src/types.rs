//! The index entry type shared by every stage.
//!
//! An [`ImageEntry`] is created by the scanner with only its original path,
//! gains derivative paths in the optimisation stage, and loses its
//! derivative files only through an explicit [`ImageEntry::cleanup`].
//! Accessors always return a servable path: before optimisation (or after a
//! failed resize) they fall back to the original.

use rayon::prelude::*;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

/// Logical name → entry. Keys are unique; iteration order carries no meaning.
pub type ImageIndex = HashMap<String, ImageEntry>;

/// One or both derivative files of an entry could not be removed.
#[derive(Error, Debug)]
#[error("failed to remove {} derivative file(s) of {name}", .failures.len())]
pub struct CleanupError {
    pub name: String,
    pub failures: Vec<(PathBuf, io::Error)>,
}

/// A single logical photograph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    name: String,
    original: PathBuf,
    optimised: Option<PathBuf>,
    preview: Option<PathBuf>,
}

impl ImageEntry {
    /// A freshly scanned entry with no derivatives.
    pub fn new(name: impl Into<String>, original: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            original: original.into(),
            optimised: None,
            preview: None,
        }
    }

    /// The same photograph with the given derivative paths.
    pub fn with_variants(self, optimised: Option<PathBuf>, preview: Option<PathBuf>) -> Self {
        Self {
            optimised,
            preview,
            ..self
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn original(&self) -> &Path {
        &self.original
    }

    pub fn optimised(&self) -> Option<&Path> {
        self.optimised.as_deref()
    }

    pub fn preview_variant(&self) -> Option<&Path> {
        self.preview.as_deref()
    }

    /// Thumbnail path, or the original when no preview exists yet.
    pub fn preview(&self) -> &Path {
        self.preview.as_deref().unwrap_or(&self.original)
    }

    /// Full-size path, or the original when no optimised variant exists yet.
    pub fn full_size(&self) -> &Path {
        self.optimised.as_deref().unwrap_or(&self.original)
    }

    pub fn is_optimised(&self) -> bool {
        self.optimised.is_some()
    }

    /// Delete both derivative files.
    ///
    /// Both deletions are attempted even if the first fails. A derivative that
    /// is already gone counts as removed. Succeeds trivially when nothing was
    /// ever generated.
    pub fn cleanup(&self) -> Result<(), CleanupError> {
        let mut failures = Vec::new();
        for path in [&self.optimised, &self.preview].into_iter().flatten() {
            info!(path = %path.display(), "removing derivative");
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "derivative already removed");
                }
                Err(e) => failures.push((path.clone(), e)),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CleanupError {
                name: self.name.clone(),
                failures,
            })
        }
    }
}

/// Remove the derivatives of every entry in parallel.
///
/// Best-effort: failures are logged and counted, never propagated. Returns
/// the number of entries whose cleanup failed.
pub fn cleanup_all(index: &ImageIndex) -> usize {
    index
        .par_iter()
        .filter(|(_, entry)| match entry.cleanup() {
            Ok(()) => false,
            Err(e) => {
                for (path, cause) in &e.failures {
                    error!(file = %e.name, path = %path.display(), error = %cause, "cleanup failed");
                }
                true
            }
        })
        .count()
}
