//! # civitai-dl
//!
//! Mirrors models from the Civitai REST API onto local storage: metadata
//! snapshots, preview images and model files, with the heavy transfers
//! delegated to aria2.
//!
//! ## Design Philosophy
//!
//! civitai-dl is designed to be:
//! - **Idempotent** - A file on disk is never fetched twice, so re-running is the resume story
//! - **Failure-isolating** - A broken version or model is logged and the run moves on
//! - **Backend-agnostic** - aria2 over JSON-RPC or as a subprocess, chosen by configuration
//! - **Sequential** - One model, one version, one file at a time
//!
//! ## Quick Start
//!
//! ```no_run
//! use civitai_dl::{Config, ModelDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.storage.download_dir = "/data/civitai".into();
//!
//!     let downloader = ModelDownloader::from_config(&config).await?;
//!     if let Some(report) = downloader.download_model(4201).await? {
//!         println!("{} files downloaded", report.files_downloaded);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// File transfer backends (aria2 RPC and aria2c process)
pub mod backend;
/// Civitai metadata client
pub mod civitai;
/// Configuration types
pub mod config;
/// Download orchestration (single model and batch)
pub mod downloader;
/// Error types
pub mod error;
/// File variant selection
pub mod filter;
/// Retry logic for transient API failures
pub mod retry;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use backend::{FileDownloader, ProcessDownloader, RpcDownloader};
pub use civitai::CivitaiClient;
pub use config::{BackendConfig, BatchConfig, Config, DownloadOptions};
pub use downloader::{BatchDownloader, ModelDownloader};
pub use error::{DownloadError, Error, Result};
pub use types::{BatchReport, ModelInfo, ModelReport, ModelType};

/// Run a future until it completes or a termination signal arrives
///
/// Returns `None` when interrupted. Dropping the future abandons whatever it
/// was doing; a transfer already handed to an aria2 daemon keeps running
/// there, and a partial file only ever lives in the temp directory.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use civitai_dl::{Config, ModelDownloader, run_until_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = ModelDownloader::from_config(&Config::default()).await?;
///
///     match run_until_signal(downloader.download_model(4201)).await {
///         Some(result) => println!("{:?}", result?),
///         None => eprintln!("interrupted"),
///     }
///     Ok(())
/// }
/// ```
pub async fn run_until_signal<F: std::future::Future>(work: F) -> Option<F::Output> {
    tokio::select! {
        output = work => Some(output),
        _ = wait_for_signal() => None,
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
