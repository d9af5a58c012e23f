//! Shared test utilities for the fotodeck test suite.
//!
//! Provides fixture builders (synthetic JPEGs, placeholder files) and
//! extractors that work with [`ImageIndex`].
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_photos(&["a.jpg", "sub/b.jpg"], 640, 480);
//! let index = scan(tmp.path(), DEFAULT_ALLOWED_EXTENSIONS, &markers).unwrap();
//! assert_eq!(entry_names(&index), vec!["a.jpg", "b.jpg"]);
//! ```

use image::{ImageEncoder, RgbImage};
use std::path::Path;
use tempfile::TempDir;

use crate::types::ImageIndex;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write a real, decodable JPEG with a gradient pattern.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Create placeholder files (not decodable images) at the given relative paths.
pub fn write_files(root: &Path, relative: &[&str]) {
    for rel in relative {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"placeholder").unwrap();
    }
}

/// A temp directory holding one synthetic JPEG per relative path.
pub fn setup_photos(relative: &[&str], width: u32, height: u32) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for rel in relative {
        create_test_jpeg(&tmp.path().join(rel), width, height);
    }
    tmp
}

// =========================================================================
// Extractors
// =========================================================================

/// Sorted entry names of an index.
pub fn entry_names(index: &ImageIndex) -> Vec<String> {
    let mut names: Vec<String> = index.keys().cloned().collect();
    names.sort();
    names
}

/// Count files anywhere under `dir` whose name ends with `suffix`.
pub fn count_files_with_suffix(dir: &Path, suffix: &str) -> usize {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name().to_string_lossy().ends_with(suffix))
        .count()
}
