//! Derivative generation for a whole index.
//!
//! Takes the index produced by the scan stage and gives every entry an
//! optimised (full-size) and a preview derivative, in parallel.
//!
//! ## Worker pool
//!
//! ```text
//!            ┌─────────── job queue (bounded, len = entries) ───────────┐
//! caller ──► │ Job{name, entry} Job{..} Job{..} ...                     │
//!            └──────────────────────────────────────────────────────────┘
//!                 │            │            │
//!            optimise-0   optimise-1   optimise-N      (N = workers)
//!                 │            │            │
//!            ┌────▼────────────▼────────────▼─── result queue ──────────┐
//! caller ◄── │ Optimised{name, entry} ...   (bounded, len = entries)    │
//!            └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every job is enqueued before any worker starts, and the result queue can
//! hold every result, so neither side can block the other. The caller waits
//! for exactly one result per job and only then merges them into the index:
//! from the caller's view the batch is all-or-nothing.
//!
//! Both derivatives are always derived from the entry's *original* path. A
//! failed resize leaves that derivative unset, so its accessor keeps serving
//! the original; it never fails the batch. A panic while optimising one
//! entry is caught in the worker and treated the same way.

use crate::config::{self, Config};
use crate::imaging::{Dimensions, ImageBackend, VariantSpec, derive_variant};
use crate::naming::{DEFAULT_ALLOWED_EXTENSIONS, Markers};
use crate::scan::{self, ScanError};
use crate::types::{ImageEntry, ImageIndex};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Failed to start optimisation worker: {0}")]
    Spawn(std::io::Error),
    #[error("Optimisation workers exited with {missing} result(s) outstanding")]
    WorkerLost { missing: usize },
}

/// Everything the scan and optimisation stages need to know.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub markers: Markers,
    pub allowed_extensions: Vec<String>,
    /// Bounding box of the full-size derivative.
    pub optimised_max: Dimensions,
    /// Bounding box of the thumbnail derivative.
    pub preview_max: Dimensions,
    /// Worker thread count (at least one is always used).
    pub workers: usize,
}

impl ProcessConfig {
    /// Build a ProcessConfig from application config values.
    pub fn from_config(config: &Config) -> Self {
        let resizing = &config.image_resizing;
        Self {
            markers: config.markers(),
            allowed_extensions: resizing.allowed_extensions.clone(),
            optimised_max: resizing.resized_box(),
            preview_max: resizing.preview_box(),
            workers: config::effective_threads(&config.processing),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            markers: Markers::default(),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            optimised_max: Dimensions::new(1920, 1920),
            preview_max: Dimensions::new(400, 400),
            workers: config::effective_threads(&config::ProcessingConfig::default()),
        }
    }
}

/// A unit of work: one entry to optimise.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub entry: ImageEntry,
}

/// A finished unit of work: the entry with its derivative paths.
#[derive(Debug, Clone)]
pub struct Optimised {
    pub name: String,
    pub entry: ImageEntry,
}

/// Keep a derived path only if it really is a new file.
fn variant_or_none(original: &Path, derived: PathBuf) -> Option<PathBuf> {
    (derived != original).then_some(derived)
}

/// Derive both variants for a single entry.
pub fn optimise_entry(
    backend: &impl ImageBackend,
    entry: ImageEntry,
    config: &ProcessConfig,
) -> ImageEntry {
    let original = entry.original().to_path_buf();
    let markers = &config.markers;

    let optimised = derive_variant(
        backend,
        &original,
        markers,
        VariantSpec {
            marker: &markers.optimised,
            max: config.optimised_max,
        },
    );
    let preview = derive_variant(
        backend,
        &original,
        markers,
        VariantSpec {
            marker: &markers.preview,
            max: config.preview_max,
        },
    );

    entry.with_variants(
        variant_or_none(&original, optimised),
        variant_or_none(&original, preview),
    )
}

fn worker(
    backend: &impl ImageBackend,
    config: &ProcessConfig,
    jobs: Receiver<Job>,
    results: Sender<Optimised>,
) {
    for Job { name, entry } in jobs.iter() {
        debug!(name = %name, "optimising");
        let attempt = entry.clone();
        let entry = match panic::catch_unwind(AssertUnwindSafe(|| {
            optimise_entry(backend, attempt, config)
        })) {
            Ok(entry) => entry,
            Err(payload) => {
                error!(
                    name = %name,
                    reason = panic_reason(&*payload),
                    "optimisation panicked, serving original"
                );
                entry
            }
        };
        if results.send(Optimised { name, entry }).is_err() {
            break;
        }
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Optimise every entry of `index` in parallel.
///
/// On success every entry has been replaced by its optimised version. On
/// error `index` is left untouched.
pub fn optimise_all(
    backend: &impl ImageBackend,
    index: &mut ImageIndex,
    config: &ProcessConfig,
) -> Result<(), ProcessError> {
    let count = index.len();
    if count == 0 {
        return Ok(());
    }
    let workers = config.workers.clamp(1, count);
    info!(images = count, workers, "optimising images");

    let (job_tx, job_rx) = bounded::<Job>(count);
    let (result_tx, result_rx) = bounded::<Optimised>(count);

    for (name, entry) in index.iter() {
        // Capacity equals the job count and `job_rx` is alive, so this cannot block or fail.
        let _ = job_tx.send(Job {
            name: name.clone(),
            entry: entry.clone(),
        });
    }
    drop(job_tx);

    let results = thread::scope(|s| -> Result<Vec<Optimised>, ProcessError> {
        for i in 0..workers {
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            thread::Builder::new()
                .name(format!("optimise-{i}"))
                .spawn_scoped(s, move || worker(backend, config, jobs, results))
                .map_err(ProcessError::Spawn)?;
        }
        drop(result_tx);

        let mut collected = Vec::with_capacity(count);
        for received in 0..count {
            match result_rx.recv() {
                Ok(result) => collected.push(result),
                Err(_) => {
                    return Err(ProcessError::WorkerLost {
                        missing: count - received,
                    });
                }
            }
        }
        Ok(collected)
    })?;

    let optimised = results.iter().filter(|r| r.entry.is_optimised()).count();
    for Optimised { name, entry } in results {
        index.insert(name, entry);
    }
    info!(images = count, optimised, "optimisation complete");
    Ok(())
}

/// Scan `root` and optimise the result: one complete generation.
pub fn reload(
    backend: &impl ImageBackend,
    root: &Path,
    config: &ProcessConfig,
) -> Result<ImageIndex, ProcessError> {
    let mut index = scan::scan(root, &config.allowed_extensions, &config.markers)?;
    optimise_all(backend, &mut index, config)?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{BackendError, ResizeParams, RustBackend};
    use crate::test_helpers::{count_files_with_suffix, setup_photos, write_files};
    use tempfile::TempDir;

    fn test_config(workers: usize) -> ProcessConfig {
        ProcessConfig {
            markers: Markers::new("opt", "prev"),
            optimised_max: Dimensions::new(2000, 2000),
            preview_max: Dimensions::new(200, 200),
            workers,
            ..Default::default()
        }
    }

    #[test]
    fn process_config_default_values() {
        let config = ProcessConfig::default();

        assert_eq!(config.markers, Markers::new("optimised", "preview"));
        assert_eq!(config.optimised_max, Dimensions::new(1920, 1920));
        assert_eq!(config.preview_max, Dimensions::new(400, 400));
        assert!(config.workers >= 1);
        assert!(config.allowed_extensions.contains(&"jpg".to_string()));
    }

    #[test]
    fn process_config_from_app_config() {
        let mut app = Config::default();
        app.image_resizing.resized_width = 1000;
        app.image_resizing.resized_height = 0;
        app.image_resizing.preview_file_extension = "thumb".into();
        app.processing.max_processes = Some(1);

        let config = ProcessConfig::from_config(&app);

        assert_eq!(config.optimised_max, Dimensions::new(1000, 0));
        assert_eq!(config.markers.preview, "thumb");
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn optimise_entry_derives_both_from_original() {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &["cat.jpg"]);
        let backend = MockBackend::new();
        let entry = ImageEntry::new("cat.jpg", tmp.path().join("cat.jpg"));

        let entry = optimise_entry(&backend, entry, &test_config(1));

        assert_eq!(entry.full_size(), tmp.path().join("cat.opt.jpg"));
        assert_eq!(entry.preview(), tmp.path().join("cat.prev.jpg"));
        let original = tmp.path().join("cat.jpg").to_string_lossy().to_string();
        for op in backend.get_operations() {
            match op {
                RecordedOp::Identify(source) => assert_eq!(source, original),
                RecordedOp::Resize { source, .. } => assert_eq!(source, original),
            }
        }
    }

    #[test]
    fn optimise_entry_uses_each_box() {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &["cat.jpg"]);
        let backend = MockBackend::with_default(Dimensions::new(4000, 3000));
        let entry = ImageEntry::new("cat.jpg", tmp.path().join("cat.jpg"));

        optimise_entry(&backend, entry, &test_config(1));

        let sizes: Vec<(u32, u32)> = backend
            .get_operations()
            .into_iter()
            .filter_map(|op| match op {
                RecordedOp::Resize { width, height, .. } => Some((width, height)),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![(2000, 1500), (200, 150)]);
    }

    #[test]
    fn optimise_all_fills_every_entry() {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &["a.jpg", "b.jpg", "c.png", "sub/d.gif"]);
        let config = test_config(3);
        let mut index = scan::scan(tmp.path(), &config.allowed_extensions, &config.markers).unwrap();
        let backend = MockBackend::new();

        optimise_all(&backend, &mut index, &config).unwrap();

        assert_eq!(index.len(), 4);
        for entry in index.values() {
            assert!(entry.is_optimised(), "{} not optimised", entry.name());
            assert_ne!(entry.preview(), entry.full_size());
            assert!(entry.full_size().exists());
            assert!(entry.preview().exists());
        }
        assert_eq!(backend.resize_count(), 8);
    }

    #[test]
    fn optimise_all_more_workers_than_jobs() {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &["only.jpg"]);
        let config = test_config(64);
        let mut index = scan::scan(tmp.path(), &config.allowed_extensions, &config.markers).unwrap();

        optimise_all(&MockBackend::new(), &mut index, &config).unwrap();

        assert!(index["only.jpg"].is_optimised());
    }

    #[test]
    fn optimise_all_empty_index_is_noop() {
        let mut index = ImageIndex::new();
        let backend = MockBackend::new();
        optimise_all(&backend, &mut index, &test_config(4)).unwrap();
        assert!(index.is_empty());
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn failed_entry_keeps_original_and_batch_succeeds() {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &["good.jpg", "bad.jpg"]);
        let config = test_config(2);
        let mut index = scan::scan(tmp.path(), &config.allowed_extensions, &config.markers).unwrap();
        let backend = MockBackend::new();
        backend.fail_on(&tmp.path().join("bad.jpg"));

        optimise_all(&backend, &mut index, &config).unwrap();

        let bad = &index["bad.jpg"];
        assert!(!bad.is_optimised());
        assert_eq!(bad.full_size(), tmp.path().join("bad.jpg"));
        assert_eq!(bad.preview(), tmp.path().join("bad.jpg"));
        assert!(index["good.jpg"].is_optimised());
    }

    /// Panics while identifying any file named `bad.jpg`.
    struct PanickingBackend(MockBackend);

    impl ImageBackend for PanickingBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            if path.ends_with("bad.jpg") {
                panic!("decoder blew up on {}", path.display());
            }
            self.0.identify(path)
        }

        fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
            self.0.resize(params)
        }
    }

    #[test]
    fn panicking_entry_keeps_original_and_batch_succeeds() {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &["good.jpg", "bad.jpg", "other.jpg"]);
        let backend = PanickingBackend(MockBackend::new());

        let index = reload(&backend, tmp.path(), &test_config(2)).unwrap();

        assert_eq!(index.len(), 3);
        let bad = &index["bad.jpg"];
        assert!(!bad.is_optimised());
        assert_eq!(bad.full_size(), tmp.path().join("bad.jpg"));
        assert!(index["good.jpg"].is_optimised());
        assert!(index["other.jpg"].is_optimised());
    }

    #[test]
    fn panic_reason_reads_str_and_string_payloads() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_reason(&*payload), "static");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_reason(&*payload), "owned");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_reason(&*payload), "unknown panic");
    }

    #[test]
    fn second_run_reuses_derivatives() {
        let tmp = TempDir::new().unwrap();
        write_files(tmp.path(), &["a.jpg", "b.jpg"]);
        let config = test_config(2);
        let backend = MockBackend::new();

        let first = reload(&backend, tmp.path(), &config).unwrap();
        let resizes = backend.resize_count();
        let second = reload(&backend, tmp.path(), &config).unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.resize_count(), resizes, "no new resizes on reload");
        assert_eq!(count_files_with_suffix(tmp.path(), "opt.jpg"), 2);
        assert_eq!(count_files_with_suffix(tmp.path(), "prev.jpg"), 2);
    }

    #[test]
    fn reload_propagates_scan_failure() {
        let tmp = TempDir::new().unwrap();
        let result = reload(&MockBackend::new(), &tmp.path().join("gone"), &test_config(1));
        assert!(matches!(result, Err(ProcessError::Scan(_))));
    }

    #[test]
    fn real_backend_two_photos() {
        let tmp = setup_photos(&["one.jpg", "nested/two.jpg"], 640, 480);
        let config = test_config(2);

        let index = reload(&RustBackend::new(), tmp.path(), &config).unwrap();

        assert_eq!(index.len(), 2);
        for entry in index.values() {
            assert_eq!(image::image_dimensions(entry.preview()).unwrap(), (200, 150));
            // box larger than the source: no upscaling
            assert_eq!(image::image_dimensions(entry.full_size()).unwrap(), (640, 480));
        }
        assert_eq!(count_files_with_suffix(tmp.path(), ".jpg"), 6);

        let rescanned = scan::scan(tmp.path(), &config.allowed_extensions, &config.markers).unwrap();
        assert_eq!(rescanned.len(), 2, "derivatives never become entries");
    }
}
