//! Pure calculation functions for derivative dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;
use super::params::Resampling;

/// Outputs at least this large on both axes may use the fast filter.
pub const FAST_FILTER_MIN_EDGE: u32 = 1000;

/// Scale `source` down to fit inside `max`, preserving aspect ratio.
///
/// A zero component of `max` leaves that axis unconstrained (the source's own
/// value is used). The ratio is the smaller of the two per-axis ratios so the
/// result fits both bounds, and is never above 1: sources already inside
/// the box keep their size. Each result axis is floored, then clamped to at
/// least 1px.
///
/// # Examples
/// ```
/// # use fotodeck::imaging::{Dimensions, fit_within};
/// let fitted = fit_within(Dimensions::new(4000, 3000), Dimensions::new(200, 200));
/// assert_eq!(fitted, Dimensions::new(200, 150));
/// ```
pub fn fit_within(source: Dimensions, max: Dimensions) -> Dimensions {
    let clamped = Dimensions::new(source.width.max(1), source.height.max(1));
    if source.width == 0 || source.height == 0 {
        return clamped;
    }

    let (src_w, src_h) = (u64::from(source.width), u64::from(source.height));
    let max_w = if max.width == 0 { src_w } else { u64::from(max.width) };
    let max_h = if max.height == 0 { src_h } else { u64::from(max.height) };
    if src_w <= max_w && src_h <= max_h {
        return clamped;
    }

    // Integer cross-multiplication: max_w/src_w <= max_h/src_h, floored exactly.
    let (width, height) = if max_w * src_h <= max_h * src_w {
        (max_w, src_h * max_w / src_w)
    } else {
        (src_w * max_h / src_h, max_h)
    };
    Dimensions {
        width: (width as u32).max(1),
        height: (height as u32).max(1),
    }
}

/// Pick the resampling filter for an output size.
///
/// Nearest-neighbour only while the result stays large on both axes; small
/// outputs (thumbnails) get the higher-quality filter.
pub fn choose_resampling(output: Dimensions) -> Resampling {
    if output.width < FAST_FILTER_MIN_EDGE || output.height < FAST_FILTER_MIN_EDGE {
        Resampling::Quality
    } else {
        Resampling::Fast
    }
}
