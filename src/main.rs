use clap::{Parser, Subcommand};
use fotodeck::config::{self, Config};
use fotodeck::imaging::RustBackend;
use fotodeck::naming::Markers;
use fotodeck::process::{self, ProcessConfig};
use fotodeck::server::{self, AppState};
use fotodeck::shared::SharedIndex;
use fotodeck::watch::{ChangeWatcher, WatchSettings};
use fotodeck::{output, scan, types};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long in-flight requests get to finish once shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "fotodeck")]
#[command(about = "Serve a directory of photographs over HTTP")]
#[command(long_about = "\
Serve a directory of photographs over HTTP

Every photo in the home directory gets two resized copies written next to it:

  photos/
  ├── beach.jpg                  # original
  ├── beach.optimised.jpg        # full-size derivative, served at /img/beach.jpg
  └── beach.preview.jpg          # thumbnail, served at /img/preview/beach.jpg

Files carrying a marker tag are never treated as originals. Photos added,
removed or replaced while the server runs are picked up automatically.

Logging is controlled by RUST_LOG (default: fotodeck=info).

Run 'fotodeck gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Optimise the home directory, then serve it and follow changes
    Serve {
        /// Path to config.toml
        #[arg(default_value = "config.toml")]
        config: PathBuf,
    },
    /// Optimise the home directory once and print the resulting index
    Scan {
        /// Path to config.toml
        #[arg(default_value = "config.toml")]
        config: PathBuf,
    },
    /// Delete every derivative under a directory
    Cleanup {
        /// Directory to clean
        home: PathBuf,
        /// Marker tag of optimised derivatives
        #[arg(long, default_value = "optimised")]
        optimised_ext: String,
        /// Marker tag of preview derivatives
        #[arg(long, default_value = "preview")]
        preview_ext: String,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Command::Serve { config } => serve(&config)?,
        Command::Scan { config } => {
            let config = config::load_config(&config)?;
            let home = config.validate_home()?;
            let process_config = ProcessConfig::from_config(&config);
            let index = process::reload(&RustBackend::new(), home, &process_config)?;
            output::print_scan_output(&index, home);
        }
        Command::Cleanup {
            home,
            optimised_ext,
            preview_ext,
        } => {
            let markers = Markers::new(optimised_ext, preview_ext);
            let report = scan::purge_derivatives(&home, &markers)?;
            output::print_purge_output(&report, &home);
            if !report.failed.is_empty() {
                let failed = report.failed.len();
                return Err(format!("{failed} derivative(s) could not be removed").into());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Structured logs to stderr; stdout stays free for command output.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fotodeck=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
    {
        warn!(error = %e, threads, "could not size the global thread pool");
    }
}

fn serve(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(config_path)?;
    let home = config.validate_home()?.to_path_buf();
    init_thread_pool(&config.processing);
    let process_config = ProcessConfig::from_config(&config);

    let initial = process::reload(&RustBackend::new(), &home, &process_config)?;
    let shared = Arc::new(SharedIndex::new(initial));

    let settings = WatchSettings {
        root: home,
        throttle: config.refresh_interval(),
        process: process_config,
    };
    let watcher = match ChangeWatcher::spawn(RustBackend::new(), settings, Arc::clone(&shared)) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!(error = %e, "file watching disabled, serving the initial index only");
            None
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_server(&config, shared, watcher))
}

async fn run_server(
    config: &Config,
    shared: Arc<SharedIndex>,
    watcher: Option<ChangeWatcher>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr).await?;
    info!(addr = %listener.local_addr()?, images = shared.len(), "listening");

    let state = AppState::new(
        Arc::clone(&shared),
        config.server.title.as_str(),
        config.server.shuffle,
    );
    let app = server::router(state, &config.server.public_dir);
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    info!("shutting down");

    // Watcher first, so no reload can write derivatives after cleanup.
    let cleanup = config.image_resizing.cleanup_on_shutdown;
    tokio::task::spawn_blocking(move || {
        if let Some(watcher) = watcher {
            watcher.close();
        }
        if cleanup {
            let failures = types::cleanup_all(&shared.snapshot());
            if failures > 0 {
                warn!(failures, "some derivatives could not be removed");
            }
        }
    })
    .await?;

    let _ = stop_tx.send(());
    match tokio::time::timeout(SHUTDOWN_GRACE, server).await {
        Ok(joined) => joined??,
        Err(_) => warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "in-flight requests did not finish in time"
        ),
    }
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
