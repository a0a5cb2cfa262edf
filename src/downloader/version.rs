//! Per-version processing: preview images first, then files

use super::{ModelDownloader, layout};
use crate::error::Result;
use crate::filter::filter_files;
use crate::types::{ModelRecord, ModelReport, VersionRecord};
use crate::utils::{human_readable_size, write_atomic};
use std::path::Path;

impl ModelDownloader {
    /// Fetch the images and files of one version
    ///
    /// The first error aborts the rest of this version only.
    pub(super) async fn process_version(
        &self,
        dir: &Path,
        model: &ModelRecord,
        version: &VersionRecord,
        report: &mut ModelReport,
    ) -> Result<()> {
        tracing::info!(
            model_id = model.id,
            version_id = version.id,
            version = %version.name,
            images = version.images.len(),
            files = version.files.len(),
            "Processing version"
        );

        self.download_images(dir, model.id, version, report).await?;

        if self.options.data_only {
            tracing::debug!(version_id = version.id, "data_only set, skipping files");
            return Ok(());
        }
        self.download_files(dir, model.id, version, report).await
    }

    async fn download_images(
        &self,
        dir: &Path,
        model_id: u64,
        version: &VersionRecord,
        report: &mut ModelReport,
    ) -> Result<()> {
        for image in &version.images {
            let Some(path) = layout::image_path(dir, model_id, version.id, &image.url) else {
                tracing::warn!(url = %image.url, "Cannot derive image file name, skipping");
                report.images_skipped += 1;
                continue;
            };
            if tokio::fs::try_exists(&path).await? {
                report.images_skipped += 1;
                continue;
            }

            match self.client.get_bytes(&image.url).await? {
                Some(bytes) => {
                    write_atomic(&path, &bytes).await?;
                    tracing::debug!(path = %path.display(), "Saved image");
                    report.images_downloaded += 1;
                }
                None => {
                    tracing::warn!(url = %image.url, "Image unavailable, skipping");
                    report.images_skipped += 1;
                }
            }
        }
        Ok(())
    }

    async fn download_files(
        &self,
        dir: &Path,
        model_id: u64,
        version: &VersionRecord,
        report: &mut ModelReport,
    ) -> Result<()> {
        let files = filter_files(&version.files);
        let filtered = version.files.len() - files.len();
        if filtered > 0 {
            tracing::info!(
                version_id = version.id,
                dropped = filtered,
                "Dropped pickle-format duplicates"
            );
        }
        report.files_filtered += filtered;

        for file in &files {
            let path = layout::file_path(dir, model_id, version.id, file);
            if tokio::fs::try_exists(&path).await? {
                tracing::debug!(file_id = file.id, path = %path.display(), "File present, skipping");
                report.files_skipped += 1;
                continue;
            }

            let size = file
                .size_kb
                .map(|kb| human_readable_size((kb * 1024.0) as u64))
                .unwrap_or_else(|| "unknown size".to_string());
            tracing::info!(
                model_id = model_id,
                version_id = version.id,
                file_id = file.id,
                name = %file.name,
                size = %size,
                "Downloading file"
            );

            let url = self.client.resolve_url(&file.download_url).await?;
            self.backend.download(&url, &path).await?;
            report.files_downloaded += 1;
        }
        Ok(())
    }
}
