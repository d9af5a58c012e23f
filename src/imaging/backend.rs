//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the black-box pixel layer: identify an
//! image's size, and resize one file into another. The production
//! implementation is [`RustBackend`](super::rust_backend::RustBackend).

use super::params::ResizeParams;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Width/height in pixels. A zero component means "unconstrained" when used
/// as a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can be shared by every optimisation worker.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode, resample and encode in one step.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}
