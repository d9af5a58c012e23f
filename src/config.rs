//! Server configuration module.
//!
//! Handles loading and validating the `config.toml` passed to `serve` and
//! `scan`.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [home]
//! path = "photos"               # Directory holding the original photos
//! min_refresh_interval = 5      # Seconds between two rescans, at most one per interval
//!
//! [server]
//! listen_addr = "127.0.0.1:8080"
//! public_dir = "web/static"     # Served under /public/
//! title = "My Album"            # Index page title
//! shuffle = true                # Shuffle photo order on every index page load
//!
//! [image_resizing]
//! cleanup_on_shutdown = false   # Delete all derivatives when the server stops
//! preview_width = 400           # Preview bounding box (0 = unconstrained axis)
//! preview_height = 400
//! resized_width = 1920          # Optimised bounding box (0 = unconstrained axis)
//! resized_height = 1920
//! resized_file_extension = "optimised"  # Marker tag: photo.optimised.jpg
//! preview_file_extension = "preview"    # Marker tag: photo.preview.jpg
//! allowed_extensions = ["png", "jpeg", "jpg", "svg", "gif"]
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Relative paths are taken relative to the working directory.
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::Dimensions;
use crate::naming::{DEFAULT_ALLOWED_EXTENSIONS, Markers};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Home directory does not exist: {0}")]
    HomeMissing(PathBuf),
    #[error("Home path is not a directory: {0}")]
    HomeNotDirectory(PathBuf),
}

/// Server configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Photo directory and rescan throttle.
    pub home: HomeConfig,
    /// HTTP listener and page settings.
    pub server: ServerConfig,
    /// Derivative sizes and naming.
    pub image_resizing: ImageResizingConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let resizing = &self.image_resizing;
        for (key, tag) in [
            ("resized_file_extension", &resizing.resized_file_extension),
            ("preview_file_extension", &resizing.preview_file_extension),
        ] {
            if tag.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "image_resizing.{key} must not be empty"
                )));
            }
            if tag.contains(['.', '/', '\\']) {
                return Err(ConfigError::Validation(format!(
                    "image_resizing.{key} must not contain '.' or path separators"
                )));
            }
        }
        if resizing.resized_file_extension == resizing.preview_file_extension {
            return Err(ConfigError::Validation(
                "image_resizing.resized_file_extension and preview_file_extension must differ"
                    .into(),
            ));
        }
        if resizing.allowed_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "image_resizing.allowed_extensions must not be empty".into(),
            ));
        }
        if self.home.min_refresh_interval == 0 {
            return Err(ConfigError::Validation(
                "home.min_refresh_interval must be at least 1 second".into(),
            ));
        }
        if self.server.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "server.listen_addr '{}' is not a socket address",
                self.server.listen_addr
            )));
        }
        Ok(())
    }

    /// Check that the home path exists and is a directory.
    pub fn validate_home(&self) -> Result<&Path, ConfigError> {
        let path = self.home.path.as_path();
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(path),
            Ok(_) => Err(ConfigError::HomeNotDirectory(path.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConfigError::HomeMissing(path.to_path_buf()))
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    pub fn markers(&self) -> Markers {
        Markers::new(
            self.image_resizing.resized_file_extension.clone(),
            self.image_resizing.preview_file_extension.clone(),
        )
    }

    /// Minimum time between two rescans.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.home.min_refresh_interval)
    }
}

/// Photo directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HomeConfig {
    pub path: PathBuf,
    /// Seconds; change events are coalesced into one rescan per interval.
    pub min_refresh_interval: u64,
}

impl Default for HomeConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("photos"),
            min_refresh_interval: 5,
        }
    }
}

/// HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Static assets served under `/public/`.
    pub public_dir: PathBuf,
    pub title: String,
    pub shuffle: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            public_dir: PathBuf::from("web/static"),
            title: "My Album".to_string(),
            shuffle: true,
        }
    }
}

/// Derivative generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageResizingConfig {
    pub cleanup_on_shutdown: bool,
    pub preview_width: u32,
    pub preview_height: u32,
    pub resized_width: u32,
    pub resized_height: u32,
    /// Marker tag for the full-size derivative.
    pub resized_file_extension: String,
    /// Marker tag for the thumbnail derivative.
    pub preview_file_extension: String,
    /// Extensions (case-insensitive, without the dot) the scanner picks up.
    pub allowed_extensions: Vec<String>,
}

impl ImageResizingConfig {
    pub fn preview_box(&self) -> Dimensions {
        Dimensions::new(self.preview_width, self.preview_height)
    }

    pub fn resized_box(&self) -> Dimensions {
        Dimensions::new(self.resized_width, self.resized_height)
    }
}

impl Default for ImageResizingConfig {
    fn default() -> Self {
        Self {
            cleanup_on_shutdown: false,
            preview_width: 400,
            preview_height: 400,
            resized_width: 1920,
            resized_height: 1920,
            resized_file_extension: "optimised".to_string(),
            preview_file_extension: "preview".to_string(),
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel optimisation workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading and validation
// =============================================================================

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given `config.toml` file.
///
/// Missing keys take their defaults, unknown keys are rejected, and the
/// result is validated. The home directory is not checked here; see
/// [`Config::validate_home`].
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Fotodeck Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Photo directory
# ---------------------------------------------------------------------------
[home]
# Directory holding the original photos. Searched recursively.
path = "photos"
# Seconds. Filesystem changes are coalesced and trigger at most one rescan
# per interval.
min_refresh_interval = 5

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
listen_addr = "127.0.0.1:8080"
# Static assets, served under /public/.
public_dir = "web/static"
# Title of the index page.
title = "My Album"
# Shuffle the photo order on every index page load.
shuffle = true

# ---------------------------------------------------------------------------
# Derivatives
# ---------------------------------------------------------------------------
# Every photo gets two resized copies next to it:
#   beach.jpg -> beach.optimised.jpg (full size) and beach.preview.jpg (thumbnail)
# A zero width or height leaves that axis unconstrained.
# Photos are never upscaled.
[image_resizing]
# Delete all derivatives when the server stops.
cleanup_on_shutdown = false
preview_width = 400
preview_height = 400
resized_width = 1920
resized_height = 1920
# Marker tags inserted before the real extension. Any file whose name
# contains one of these is treated as a derivative and never scanned.
resized_file_extension = "optimised"
preview_file_extension = "preview"
# File extensions picked up by the scanner (case-insensitive).
allowed_extensions = ["png", "jpeg", "jpg", "svg", "gif"]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel optimisation workers. Omit to auto-detect (= CPU cores).
# Values above the core count are clamped down.
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.home.path, PathBuf::from("photos"));
        assert_eq!(config.home.min_refresh_interval, 5);
        assert_eq!(config.server.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.server.title, "My Album");
        assert!(config.server.shuffle);
        assert!(!config.image_resizing.cleanup_on_shutdown);
        assert_eq!(config.image_resizing.preview_box(), Dimensions::new(400, 400));
        assert_eq!(config.image_resizing.resized_box(), Dimensions::new(1920, 1920));
        assert_eq!(config.markers(), Markers::new("optimised", "preview"));
    }

    #[test]
    fn validate_default_config_passes() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_config() {
        let config = parse_config(
            r#"
[home]
path = "/srv/photos"

[image_resizing]
preview_width = 200
preview_height = 0
"#,
        )
        .unwrap();

        assert_eq!(config.home.path, PathBuf::from("/srv/photos"));
        assert_eq!(config.home.min_refresh_interval, 5);
        assert_eq!(config.image_resizing.preview_box(), Dimensions::new(200, 0));
        assert_eq!(config.image_resizing.resized_width, 1920);
    }

    #[test]
    fn refresh_interval_is_seconds() {
        let config = parse_config("[home]\nmin_refresh_interval = 30\n").unwrap();
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[server]
listen_addr = "0.0.0.0:9000"
title = "Holidays"
shuffle = false
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();

        assert_eq!(config.server.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.server.title, "Holidays");
        assert!(!config.server.shuffle);
    }

    #[test]
    fn load_config_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(&tmp.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "this is not [valid toml").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Unknown keys
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result = parse_config("[home]\npaht = \"/typo\"\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_section_rejected() {
        let result = parse_config("[resizing]\npreview_width = 10\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn with_resizing(edit: impl FnOnce(&mut ImageResizingConfig)) -> Config {
        let mut config = Config::default();
        edit(&mut config.image_resizing);
        config
    }

    #[test]
    fn validate_empty_marker() {
        let config = with_resizing(|r| r.preview_file_extension.clear());
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_marker_with_dot_or_separator() {
        for bad in ["pre.view", "pre/view", "pre\\view"] {
            let config = with_resizing(|r| r.resized_file_extension = bad.into());
            assert!(config.validate().is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn validate_identical_markers() {
        let config = with_resizing(|r| r.resized_file_extension = "preview".into());
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_no_extensions() {
        let config = with_resizing(|r| r.allowed_extensions.clear());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_refresh_interval() {
        let result = parse_config("[home]\nmin_refresh_interval = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_bad_listen_addr() {
        let result = parse_config("[server]\nlisten_addr = \":8080\"\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_home_accepts_directory() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.home.path = tmp.path().to_path_buf();
        assert_eq!(config.validate_home().unwrap(), tmp.path());
    }

    #[test]
    fn validate_home_missing() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.home.path = tmp.path().join("gone");
        assert!(matches!(
            config.validate_home(),
            Err(ConfigError::HomeMissing(_))
        ));
    }

    #[test]
    fn validate_home_file_is_not_directory() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("photo.jpg");
        fs::write(&file, b"x").unwrap();
        let mut config = Config::default();
        config.home.path = file;
        assert!(matches!(
            config.validate_home(),
            Err(ConfigError::HomeNotDirectory(_))
        ));
    }

    // =========================================================================
    // Processing config
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let threads = effective_threads(&ProcessingConfig::default());
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(threads, cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // stock_config_toml
    // =========================================================================

    #[test]
    fn stock_config_toml_is_valid_config() {
        parse_config(stock_config_toml()).expect("stock config must be valid");
    }

    #[test]
    fn stock_config_toml_matches_defaults() {
        let stock = parse_config(stock_config_toml()).unwrap();
        let defaults = Config::default();
        assert_eq!(stock.home.path, defaults.home.path);
        assert_eq!(stock.server.listen_addr, defaults.server.listen_addr);
        assert_eq!(
            stock.image_resizing.allowed_extensions,
            defaults.image_resizing.allowed_extensions
        );
        assert_eq!(stock.markers(), defaults.markers());
        assert_eq!(stock.processing.max_processes, None);
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in ["[home]", "[server]", "[image_resizing]", "[processing]"] {
            assert!(content.contains(section), "missing {section}");
        }
    }
}
