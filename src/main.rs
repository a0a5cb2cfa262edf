//! civitai-dl command line entry point.
//!
//! Startup order:
//! 1. Parse arguments and initialise tracing (`RUST_LOG`, default `info`).
//! 2. Load the optional JSON config file and apply flag overrides.
//! 3. Build the metadata client and the aria2 backend.
//! 4. Run the `download` or `batch` command until it finishes or a signal arrives.

use std::path::PathBuf;
use std::process::ExitCode;

use civitai_dl::{BackendConfig, BatchDownloader, Config, ModelDownloader, ModelType, run_until_signal};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Exit status after SIGINT, as shells report it
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "civitai-dl", version, about = "Download Civitai models with aria2")]
struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Transfer backend
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendKind>,

    /// aria2 JSON-RPC endpoint
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// aria2 RPC secret
    #[arg(long, global = true)]
    rpc_token: Option<String>,

    /// Path to the aria2c binary (implies the process backend)
    #[arg(long, global = true)]
    aria2c: Option<PathBuf>,

    /// Civitai API token
    #[arg(long, global = true, env = "CIVITAI_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// Long-running aria2 daemon over JSON-RPC
    Rpc,
    /// One aria2c process per file
    Process,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Storage root
    #[arg(long)]
    dir: PathBuf,

    /// HTTP(S) proxy for API requests
    #[arg(long)]
    proxy: Option<String>,

    /// Only process the newest version of each model
    #[arg(long)]
    latest_only: bool,

    /// Only write metadata and preview images
    #[arg(long)]
    data_only: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a single model
    Download {
        #[command(flatten)]
        common: CommonArgs,

        /// Model id
        #[arg(long)]
        id: u64,
    },
    /// Download every model of a listing
    Batch {
        #[command(flatten)]
        common: CommonArgs,

        /// Model type filter (Checkpoint, LORA, ...)
        #[arg(long = "type")]
        model_type: String,

        /// First listing page
        #[arg(long)]
        min_page: Option<u32>,

        /// Last listing page
        #[arg(long)]
        max_page: Option<u32>,

        /// Model id to skip; may be repeated
        #[arg(long = "exclude")]
        exclude: Vec<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "civitai-dl starting");

    match run_until_signal(run(cli)).await {
        Some(Ok(())) => ExitCode::SUCCESS,
        Some(Err(e)) => {
            tracing::error!(error = %e, "civitai-dl failed");
            ExitCode::FAILURE
        }
        None => {
            tracing::warn!("Interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

async fn run(cli: Cli) -> civitai_dl::Result<()> {
    let config = build_config(&cli)?;
    let engine = ModelDownloader::from_config(&config).await?;

    match cli.command {
        Command::Download { id, .. } => match engine.download_model(id).await? {
            Some(report) => tracing::info!(
                model_id = report.model_id,
                versions = report.versions_processed,
                failed_versions = report.versions_failed,
                files = report.files_downloaded,
                images = report.images_downloaded,
                "Done"
            ),
            None => tracing::warn!(model_id = id, "Model not available"),
        },
        Command::Batch { .. } => {
            let report = BatchDownloader::new(engine, config.batch.clone()).run().await?;
            tracing::info!(
                pages = report.pages_fetched,
                finished = report.models_finished,
                failed = report.models_failed,
                "Done"
            );
        }
    }
    Ok(())
}

/// Config file (or defaults) with command-line overrides applied
fn build_config(cli: &Cli) -> civitai_dl::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(token) = &cli.api_token {
        config.api.token = Some(token.clone());
    }
    apply_backend_flags(cli, &mut config);

    let common = match &cli.command {
        Command::Download { common, .. } => common,
        Command::Batch {
            common,
            model_type,
            min_page,
            max_page,
            exclude,
        } => {
            config.batch.model_type = Some(ModelType::from(model_type.clone()));
            if let Some(page) = min_page {
                config.batch.min_page = *page;
            }
            if let Some(page) = max_page {
                config.batch.max_page = *page;
            }
            config.batch.excluded_ids.extend(exclude.iter().copied());
            common
        }
    };

    config.storage.download_dir = common.dir.clone();
    if let Some(proxy) = &common.proxy {
        config.api.proxy = Some(proxy.clone());
    }
    config.options.latest_only |= common.latest_only;
    config.options.data_only |= common.data_only;

    config.validate()?;
    Ok(config)
}

fn apply_backend_flags(cli: &Cli, config: &mut Config) {
    let kind = cli.backend.or(cli.aria2c.as_ref().map(|_| BackendKind::Process));

    let configured_rpc = matches!(config.backend, BackendConfig::Rpc { .. });
    match kind {
        Some(BackendKind::Process) if configured_rpc => {
            config.backend = BackendConfig::Process { binary: None };
        }
        Some(BackendKind::Rpc) if !configured_rpc => {
            config.backend = BackendConfig::default();
        }
        _ => {}
    }

    match &mut config.backend {
        BackendConfig::Rpc { url, token, .. } => {
            if let Some(rpc_url) = &cli.rpc_url {
                *url = rpc_url.clone();
            }
            if let Some(rpc_token) = &cli.rpc_token {
                *token = Some(rpc_token.clone());
            }
            if cli.aria2c.is_some() {
                tracing::warn!("--aria2c ignored with the rpc backend");
            }
        }
        BackendConfig::Process { binary } => {
            if let Some(path) = &cli.aria2c {
                *binary = Some(path.clone());
            }
        }
    }
}
