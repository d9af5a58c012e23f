//! Filesystem scanning.
//!
//! Walks the home directory and builds a fresh [`ImageIndex`]: one entry per
//! photograph, keyed by file name, with no derivative paths filled in yet.
//!
//! ## What counts as a photograph
//!
//! ```text
//! photos/
//! ├── beach.jpg                    ✓ entry "beach.jpg"
//! ├── beach.optimised.jpg          ✗ derivative (contains a marker tag)
//! ├── beach.preview.jpg            ✗ derivative
//! ├── notes.txt                    ✗ extension not allowed
//! ├── latest.jpg -> beach.jpg      ✗ symlink, not a regular file
//! └── 2023/
//!     ├── dog.PNG                  ✓ entry "dog.PNG" (extension match ignores case)
//!     └── beach.jpg                ✓ replaces the earlier "beach.jpg" (warning)
//! ```
//!
//! Directories are always descended into. The walk visits entries sorted by
//! file name, so which path wins a name collision is deterministic: the one
//! visited last.
//!
//! ## Failure policy
//!
//! Any walk error (unreadable root, permission denied mid-walk) aborts the
//! scan; no partial index is returned. Empty marker tags are rejected before
//! touching the filesystem, since an empty tag matches every file name.

use crate::naming::{self, Markers};
use crate::types::{ImageEntry, ImageIndex};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Optimised or preview marker is empty (optimised='{optimised}', preview='{preview}')")]
    EmptyMarker { optimised: String, preview: String },
    #[error("Walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn check_markers(markers: &Markers) -> Result<(), ScanError> {
    if markers.has_empty() {
        return Err(ScanError::EmptyMarker {
            optimised: markers.optimised.clone(),
            preview: markers.preview.clone(),
        });
    }
    Ok(())
}

/// Walk `root` and index every photograph under it.
pub fn scan<S: AsRef<str>>(
    root: &Path,
    allowed_extensions: &[S],
    markers: &Markers,
) -> Result<ImageIndex, ScanError> {
    check_markers(markers)?;

    info!(path = %root.display(), "scanning for original images");
    let mut index = ImageIndex::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = naming::logical_name(entry.path()) else {
            continue;
        };
        if markers.name_contains_marker(&name) {
            debug!(path = %entry.path().display(), "skipping derivative");
            continue;
        }
        if !naming::extension_allowed(&name, allowed_extensions) {
            debug!(path = %entry.path().display(), "skipping non-image file");
            continue;
        }

        let path = entry.into_path();
        if let Some(existing) = index.get(&name) {
            warn!(
                name = %name,
                path = %path.display(),
                existing = %existing.original().display(),
                "duplicate file name, later path replaces earlier"
            );
        }
        index.insert(name.clone(), ImageEntry::new(name, path));
    }

    info!(path = %root.display(), count = index.len(), "scan complete");
    Ok(index)
}

/// Outcome of [`purge_derivatives`].
#[derive(Debug, Default)]
pub struct PurgeReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
}

/// Delete every derivative file under `root`, whether or not an index knows
/// about it.
///
/// Used by the `cleanup` maintenance command. Walk errors abort; individual
/// delete failures are logged and collected in the report.
pub fn purge_derivatives(root: &Path, markers: &Markers) -> Result<PurgeReport, ScanError> {
    check_markers(markers)?;

    let mut report = PurgeReport::default();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || !markers.is_derivative(entry.path()) {
            continue;
        }
        let path = entry.into_path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "removed derivative");
                report.removed.push(path);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove derivative");
                report.failed.push((path, e));
            }
        }
    }
    Ok(report)
}
