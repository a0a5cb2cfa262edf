//! Download orchestration
//!
//! [`ModelDownloader`] walks one model's metadata tree and persists it:
//! - [`layout`] - Directory and file naming
//! - [`version`] - Per-version image and file handling
//! - [`batch`] - Paginated listing driver ([`BatchDownloader`])
//!
//! Everything runs sequentially. A destination that already exists is taken
//! as proof of a finished download, so re-running a command only fetches
//! what is missing.

mod batch;
mod layout;
mod version;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use batch::BatchDownloader;

use crate::backend::FileDownloader;
use crate::civitai::CivitaiClient;
use crate::config::{Config, DownloadOptions};
use crate::error::Result;
use crate::utils::write_atomic;
use crate::types::{ModelInfo, ModelReport, VersionRecord};
use std::path::{Path, PathBuf};

/// Downloads models, their preview images and their files
pub struct ModelDownloader {
    pub(crate) client: CivitaiClient,
    backend: Box<dyn FileDownloader>,
    storage_dir: PathBuf,
    options: DownloadOptions,
}

impl ModelDownloader {
    /// Create an engine writing below `storage_dir`
    pub fn new(
        client: CivitaiClient,
        backend: Box<dyn FileDownloader>,
        storage_dir: PathBuf,
        options: DownloadOptions,
    ) -> Self {
        Self {
            client,
            backend,
            storage_dir,
            options,
        }
    }

    /// Build the metadata client and the configured backend
    pub async fn from_config(config: &Config) -> Result<Self> {
        let client = CivitaiClient::new(&config.api, config.retry.clone())?;
        let backend = crate::backend::from_config(config).await?;
        tracing::info!(
            backend = backend.name(),
            storage = %config.storage.download_dir.display(),
            "Downloader ready"
        );
        Ok(Self::new(
            client,
            backend,
            config.storage.download_dir.clone(),
            config.options,
        ))
    }

    /// Download everything a model offers that is not on disk yet
    ///
    /// Returns `Ok(None)` when the API does not serve the model (404/403).
    ///
    /// # Errors
    ///
    /// Failures fetching the model's metadata, creating its directory or
    /// writing its snapshot are returned. Failures inside one version are
    /// logged, counted in the report, and do not stop the other versions.
    pub async fn download_model(&self, model_id: u64) -> Result<Option<ModelReport>> {
        let Some(info) = self.client.get_model(model_id).await? else {
            tracing::warn!(model_id = model_id, "Model not found, skipping");
            return Ok(None);
        };
        let model = &info.record;

        let dir = layout::model_dir(&self.storage_dir, model);
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!(
            model_id = model.id,
            name = %model.name,
            model_type = %model.model_type,
            versions = model.versions.len(),
            "Processing model"
        );

        let mut report = ModelReport {
            model_id: model.id,
            name: model.name.clone(),
            metadata_written: self.write_metadata(&dir, &info).await?,
            ..ModelReport::default()
        };

        let take = if self.options.latest_only {
            report.versions_skipped = model.versions.len().saturating_sub(1);
            if report.versions_skipped > 0 {
                tracing::info!(
                    model_id = model.id,
                    skipped = report.versions_skipped,
                    "latest_only set, skipping older versions"
                );
            }
            1
        } else {
            model.versions.len()
        };

        for raw in model.versions.iter().take(take) {
            let result = match VersionRecord::from_value(raw) {
                Ok(version) => self.process_version(&dir, model, &version, &mut report).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => report.versions_processed += 1,
                Err(e) => {
                    report.versions_failed += 1;
                    tracing::error!(
                        model_id = model.id,
                        version_id = ?raw.get("id").and_then(serde_json::Value::as_u64),
                        error = %e,
                        "Version failed, continuing with the next one"
                    );
                }
            }
        }

        tracing::info!(
            model_id = model.id,
            processed = report.versions_processed,
            failed = report.versions_failed,
            files = report.files_downloaded,
            images = report.images_downloaded,
            "Model finished"
        );
        Ok(Some(report))
    }

    /// Write the YAML snapshot unless it already exists
    async fn write_metadata(&self, dir: &Path, info: &ModelInfo) -> Result<bool> {
        let path = layout::metadata_path(dir, &info.record);
        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(path = %path.display(), "Metadata snapshot present");
            return Ok(false);
        }

        let yaml = serde_yaml::to_string(&info.raw)?;
        write_atomic(&path, yaml.as_bytes()).await?;
        tracing::info!(path = %path.display(), "Wrote metadata snapshot");
        Ok(true)
    }
}
