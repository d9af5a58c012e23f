//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between [`operations`](super::operations) (which decides what a
//! derivative should look like) and the [`backend`](super::backend) (which
//! does the pixel work), so tests can swap in a recording mock.

use image::imageops::FilterType;
use std::path::PathBuf;

/// Resampling quality for a resize.
///
/// `Fast` is nearest-neighbour: cheap, but visibly blocky once the output is
/// small. `Quality` is Catmull-Rom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resampling {
    Fast,
    Quality,
}

impl Resampling {
    pub fn filter(self) -> FilterType {
        match self {
            Resampling::Fast => FilterType::Nearest,
            Resampling::Quality => FilterType::CatmullRom,
        }
    }
}

/// Parameters for a resize: decode `source`, resample to exactly
/// `width`×`height`, encode to `output` (format from its extension).
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub resampling: Resampling,
}
