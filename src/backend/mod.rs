//! File transfer backends
//!
//! Large files are never streamed by this crate itself. They are handed to
//! aria2, either a long-running daemon driven over JSON-RPC
//! ([`RpcDownloader`]) or one `aria2c` process per file
//! ([`ProcessDownloader`]). Both implement [`FileDownloader`]; which one is
//! used is decided by [`BackendConfig`].

mod process;
mod rpc;
mod traits;

pub use process::ProcessDownloader;
pub use rpc::{Aria2RpcClient, Aria2Status, RpcDownloader};
pub use traits::FileDownloader;

use crate::config::{BackendConfig, Config};
use crate::error::{Error, Result};
use std::path::PathBuf;

/// Build the backend selected by the configuration
///
/// For the RPC backend the daemon is probed once with `aria2.getVersion`; an
/// unreachable daemon is logged but not fatal, since a run may not need to
/// download any file at all.
pub async fn from_config(config: &Config) -> Result<Box<dyn FileDownloader>> {
    let temp_dir = absolute_temp_dir(config)?;

    match &config.backend {
        BackendConfig::Rpc {
            url,
            token,
            poll_interval,
        } => {
            let client = Aria2RpcClient::new(url, token.clone())?;
            match client.get_version().await {
                Ok(version) => tracing::info!(rpc_url = %url, version = %version, "Connected to aria2"),
                Err(e) => tracing::warn!(rpc_url = %url, error = %e, "aria2 RPC endpoint not reachable"),
            }
            Ok(Box::new(RpcDownloader::new(client, temp_dir, *poll_interval)))
        }
        BackendConfig::Process { binary } => {
            let backend = match binary {
                Some(path) => ProcessDownloader::new(path.clone(), temp_dir),
                None => ProcessDownloader::from_path(&temp_dir).ok_or_else(|| {
                    Error::ExternalTool("aria2c not found in PATH".to_string())
                })?,
            };
            Ok(Box::new(backend))
        }
    }
}

/// The RPC daemon resolves relative paths against its own working directory
fn absolute_temp_dir(config: &Config) -> Result<PathBuf> {
    Ok(std::path::absolute(config.storage.temp_dir())?)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    #[tokio::test]
    async fn explicit_process_binary_is_used_without_path_lookup() {
        let config = Config {
            backend: BackendConfig::Process {
                binary: Some(PathBuf::from("/opt/aria2/bin/aria2c")),
            },
            ..Default::default()
        };

        let backend = from_config(&config).await.unwrap();
        assert_eq!(backend.name(), "aria2c-process");
    }

    #[tokio::test]
    async fn unreachable_rpc_daemon_still_builds_backend() {
        let config = Config {
            backend: BackendConfig::Rpc {
                url: "http://127.0.0.1:9/jsonrpc".to_string(),
                token: None,
                poll_interval: std::time::Duration::from_secs(5),
            },
            ..Default::default()
        };

        let backend = from_config(&config).await.unwrap();
        assert_eq!(backend.name(), "aria2-rpc");
    }

    #[test]
    fn temp_dir_is_made_absolute() {
        let config = Config {
            storage: StorageConfig {
                download_dir: PathBuf::from("relative/models"),
                temp_dir: None,
            },
            ..Default::default()
        };

        let temp = absolute_temp_dir(&config).unwrap();
        assert!(temp.is_absolute());
        assert!(temp.ends_with("relative/models/.temp"));
    }
}
