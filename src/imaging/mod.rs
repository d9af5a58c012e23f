//! Image processing in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Resize** | `resize_exact` with nearest-neighbour or Catmull-Rom |
//! | **Encode** | `image` encoders, format chosen by output extension |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for fit-to-box math and filter choice (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: [`derive_variant`], combining naming, calculations and backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{FAST_FILTER_MIN_EDGE, choose_resampling, fit_within};
pub use operations::{VariantSpec, derive_variant, plan_resize, try_derive_variant};
pub use params::{ResizeParams, Resampling};
pub use rust_backend::RustBackend;
