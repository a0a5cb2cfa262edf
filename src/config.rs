//! Configuration types for civitai-dl

use crate::error::{Error, Result};
use crate::types::ModelType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Storage layout configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the model tree (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Directory the download backend writes into before the final move
    /// (default: `<download_dir>/.temp`)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            temp_dir: None,
        }
    }
}

impl StorageConfig {
    /// Effective temp directory
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| self.download_dir.join(DEFAULT_TEMP_DIR_NAME))
    }
}

/// Civitai metadata API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URI of the REST API, with trailing slash
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// HTTP(S) proxy applied to every API request
    #[serde(default)]
    pub proxy: Option<String>,

    /// API token sent as a bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// User-Agent header (default: "CivitaiLink:Automatic1111")
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout (default: 60 seconds)
    #[serde(default = "default_api_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            proxy: None,
            token: None,
            user_agent: default_user_agent(),
            timeout: default_api_timeout(),
        }
    }
}

/// Which download backend performs file transfers
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Long-running aria2 daemon reached over JSON-RPC
    Rpc {
        /// JSON-RPC endpoint (default: "http://localhost:6800/jsonrpc")
        #[serde(default = "default_rpc_url")]
        url: String,
        /// Secret configured with `--rpc-secret`
        #[serde(default)]
        token: Option<String>,
        /// Interval between status polls (default: 5 seconds)
        #[serde(default = "default_poll_interval", with = "duration_serde")]
        poll_interval: Duration,
    },
    /// One `aria2c` process per file
    Process {
        /// Path to aria2c (searched on PATH if None)
        #[serde(default)]
        binary: Option<PathBuf>,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Rpc {
            url: default_rpc_url(),
            token: None,
            poll_interval: default_poll_interval(),
        }
    }
}

/// Retry configuration for transient API failures
///
/// The defaults retry rate-limited requests on a fixed one second delay with a
/// ceiling high enough to ride out long throttling windows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 99999)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each retry (default: 1.0, fixed delay)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Per-model download behaviour
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Only process the newest version of each model
    #[serde(default)]
    pub latest_only: bool,

    /// Save metadata and images but skip model files
    #[serde(default)]
    pub data_only: bool,
}

/// Listing iteration for batch downloads
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Artifact type filter sent as `types`
    #[serde(default)]
    pub model_type: Option<ModelType>,

    /// First page to fetch, 1-based (default: 1)
    #[serde(default = "default_page")]
    pub min_page: u32,

    /// Last page to fetch, inclusive (default: 1)
    #[serde(default = "default_page")]
    pub max_page: u32,

    /// Sort key sent as `sort` (default: "Highest Rated")
    #[serde(default = "default_sort")]
    pub sort: String,

    /// Model ids that are never downloaded
    #[serde(default)]
    pub excluded_ids: Vec<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            model_type: None,
            min_page: default_page(),
            max_page: default_page(),
            sort: default_sort(),
            excluded_ids: Vec::new(),
        }
    }
}

/// Main configuration
///
/// Every field has a default, so an empty JSON object is a valid config file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage layout
    #[serde(default)]
    pub storage: StorageConfig,

    /// Metadata API client
    #[serde(default)]
    pub api: ApiConfig,

    /// File transfer backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// Retry policy for API calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Per-model download behaviour
    #[serde(default)]
    pub options: DownloadOptions,

    /// Batch listing settings
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Config {
    /// Load a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.batch.min_page == 0 {
            return Err(Error::config("batch.min_page", "pages are 1-based"));
        }
        if self.batch.min_page > self.batch.max_page {
            return Err(Error::config(
                "batch.max_page",
                format!(
                    "max_page ({}) is lower than min_page ({})",
                    self.batch.max_page, self.batch.min_page
                ),
            ));
        }
        if let BackendConfig::Rpc { poll_interval, .. } = &self.backend
            && poll_interval.is_zero()
        {
            return Err(Error::config(
                "backend.poll_interval",
                "poll interval must be positive",
            ));
        }
        url::Url::parse(&self.api.base_url)
            .map_err(|e| Error::config("api.base_url", e.to_string()))?;
        Ok(())
    }
}

const DEFAULT_TEMP_DIR_NAME: &str = ".temp";

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_api_base_url() -> String {
    "https://civitai.com/api/v1/".to_string()
}

fn default_user_agent() -> String {
    "CivitaiLink:Automatic1111".to_string()
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_rpc_url() -> String {
    "http://localhost:6800/jsonrpc".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_attempts() -> u32 {
    99_999
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_page() -> u32 {
    1
}

fn default_sort() -> String {
    "Highest Rated".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").expect("empty config must parse");

        assert_eq!(config.storage.download_dir, PathBuf::from("./downloads"));
        assert_eq!(config.api.base_url, "https://civitai.com/api/v1/");
        assert_eq!(config.api.user_agent, "CivitaiLink:Automatic1111");
        assert_eq!(config.retry.max_attempts, 99_999);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
        assert!(!config.retry.jitter);
        assert_eq!(config.batch.sort, "Highest Rated");
        assert!(config.batch.excluded_ids.is_empty());
        match config.backend {
            BackendConfig::Rpc {
                url, poll_interval, ..
            } => {
                assert_eq!(url, "http://localhost:6800/jsonrpc");
                assert_eq!(poll_interval, Duration::from_secs(5));
            }
            other => panic!("default backend must be rpc, got {other:?}"),
        }
    }

    #[test]
    fn temp_dir_defaults_inside_download_dir() {
        let storage = StorageConfig {
            download_dir: PathBuf::from("/data/civitai"),
            temp_dir: None,
        };
        assert_eq!(storage.temp_dir(), PathBuf::from("/data/civitai/.temp"));

        let explicit = StorageConfig {
            download_dir: PathBuf::from("/data/civitai"),
            temp_dir: Some(PathBuf::from("/scratch")),
        };
        assert_eq!(explicit.temp_dir(), PathBuf::from("/scratch"));
    }

    #[test]
    fn process_backend_deserializes_from_tag() {
        let json = r#"{"backend": {"kind": "process", "binary": "/opt/aria2/aria2c"}}"#;
        let config: Config = serde_json::from_str(json).expect("deserialize failed");

        match config.backend {
            BackendConfig::Process { binary } => {
                assert_eq!(binary, Some(PathBuf::from("/opt/aria2/aria2c")));
            }
            other => panic!("expected process backend, got {other:?}"),
        }
    }

    #[test]
    fn batch_section_parses_type_and_exclusions() {
        let json = r#"{"batch": {"model_type": "LORA", "min_page": 2, "max_page": 7, "excluded_ids": [10, 20]}}"#;
        let config: Config = serde_json::from_str(json).expect("deserialize failed");

        assert_eq!(config.batch.model_type, Some(ModelType::Lora));
        assert_eq!(config.batch.min_page, 2);
        assert_eq!(config.batch.max_page, 7);
        assert_eq!(config.batch.excluded_ids, vec![10, 20]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_page_range() {
        let mut config = Config::default();
        config.batch.min_page = 5;
        config.batch.max_page = 2;

        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("batch.max_page")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_page_zero() {
        let mut config = Config::default();
        config.batch.min_page = 0;
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let config = Config {
            backend: BackendConfig::Rpc {
                url: default_rpc_url(),
                token: None,
                poll_interval: Duration::ZERO,
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn duration_serde_serializes_as_seconds() {
        let retry = RetryConfig {
            initial_delay: Duration::from_secs(3),
            ..RetryConfig::default()
        };
        let json = serde_json::to_value(&retry).expect("serialize failed");
        assert_eq!(json["initial_delay"], 3);
        assert_eq!(json["max_delay"], 60);
    }

    #[test]
    fn from_file_reports_missing_file_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::from_file(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn from_file_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("civitai-dl.json");
        std::fs::write(
            &path,
            r#"{"storage": {"download_dir": "/models"}, "options": {"latest_only": true}}"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.storage.download_dir, PathBuf::from("/models"));
        assert!(config.options.latest_only);
        assert!(!config.options.data_only);
    }
}
