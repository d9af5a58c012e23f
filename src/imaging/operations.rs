//! High-level image operations.
//!
//! [`derive_variant`] is the single entry point the optimisation stage uses:
//! given a source photo and a target box, it returns the path of a resized
//! derivative, creating it only when it is not already on disk.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{choose_resampling, fit_within};
use super::params::ResizeParams;
use crate::naming::{Markers, derivative_path};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// One kind of derivative: the marker tag it carries and its bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSpec<'a> {
    pub marker: &'a str,
    pub max: Dimensions,
}

/// Plan a resize without executing it.
///
/// Useful for testing parameter generation.
pub fn plan_resize(
    source: &Path,
    output: &Path,
    source_dims: Dimensions,
    max: Dimensions,
) -> ResizeParams {
    let target = fit_within(source_dims, max);
    ResizeParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        width: target.width,
        height: target.height,
        resampling: choose_resampling(target),
    }
}

/// Produce (or reuse) the derivative of `source` described by `spec`.
///
/// - A source that is itself a derivative is returned unchanged.
/// - An existing file at the computed path is reused as-is; its age is never
///   compared with the source.
///
/// Errors are reported but not the common case; most callers want
/// [`derive_variant`].
pub fn try_derive_variant(
    backend: &impl ImageBackend,
    source: &Path,
    markers: &Markers,
    spec: VariantSpec<'_>,
) -> Result<PathBuf> {
    if markers.is_derivative(source) {
        debug!(path = %source.display(), "source is already a derivative");
        return Ok(source.to_path_buf());
    }

    let output = derivative_path(source, spec.marker);
    if output.exists() {
        debug!(path = %output.display(), "derivative exists, reusing");
        return Ok(output);
    }

    info!(marker = spec.marker, path = %output.display(), "resizing image");
    let dims = backend.identify(source)?;
    backend.resize(&plan_resize(source, &output, dims, spec.max))?;
    Ok(output)
}

/// Produce (or reuse) a derivative, degrading to `source` on any failure.
///
/// A failed resize is logged and never propagated, so the caller can always
/// keep serving the original.
pub fn derive_variant(
    backend: &impl ImageBackend,
    source: &Path,
    markers: &Markers,
    spec: VariantSpec<'_>,
) -> PathBuf {
    match try_derive_variant(backend, source, markers, spec) {
        Ok(path) => path,
        Err(e) => {
            error!(path = %source.display(), marker = spec.marker, error = %e, "resize failed");
            source.to_path_buf()
        }
    }
}
