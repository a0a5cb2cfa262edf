//! Paginated listing driver

use super::ModelDownloader;
use crate::config::BatchConfig;
use crate::error::Result;
use crate::types::BatchReport;
use std::collections::HashSet;

/// Runs [`ModelDownloader`] over every model of a listing
///
/// Pages `min_page..=max_page` are fetched in order, stopping early once the
/// listing reports no further pages. One failing model never stops the batch.
pub struct BatchDownloader {
    engine: ModelDownloader,
    config: BatchConfig,
    excluded: HashSet<u64>,
}

impl BatchDownloader {
    /// Create a driver
    pub fn new(engine: ModelDownloader, config: BatchConfig) -> Self {
        let excluded = config.excluded_ids.iter().copied().collect();
        Self {
            engine,
            config,
            excluded,
        }
    }

    /// Walk the configured page range
    ///
    /// # Errors
    ///
    /// Only a failing listing request ends the run with an error. Errors of
    /// individual models are logged and counted.
    pub async fn run(&self) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        let sort = Some(self.config.sort.as_str()).filter(|s| !s.is_empty());

        for page in self.config.min_page..=self.config.max_page {
            let Some(listing) = self
                .engine
                .client
                .get_models(page, self.config.model_type.as_ref(), sort)
                .await?
            else {
                tracing::warn!(page = page, "Listing page not found, stopping");
                break;
            };
            report.pages_fetched += 1;
            tracing::info!(
                page = page,
                total_pages = ?listing.metadata.total_pages,
                items = listing.items.len(),
                "Fetched listing page"
            );

            for item in &listing.items {
                if self.excluded.contains(&item.id) {
                    tracing::warn!(
                        model_id = item.id,
                        name = %item.name,
                        model_type = ?item.model_type,
                        "Model excluded, skipping"
                    );
                    report.models_excluded += 1;
                    continue;
                }

                match self.engine.download_model(item.id).await {
                    Ok(Some(_)) => report.models_finished += 1,
                    Ok(None) => {
                        report.models_missing += 1;
                        tracing::warn!(
                            model_id = item.id,
                            model_type = ?item.model_type,
                            "Listed model unavailable, skipping"
                        );
                    }
                    Err(e) => {
                        report.models_failed += 1;
                        tracing::error!(
                            model_id = item.id,
                            model_type = ?item.model_type,
                            error = %e,
                            "Model failed"
                        );
                    }
                }
            }

            if listing.metadata.total_pages.is_some_and(|total| page >= total) {
                tracing::info!(page = page, "Reached last listing page");
                break;
            }
        }

        tracing::info!(
            pages = report.pages_fetched,
            finished = report.models_finished,
            failed = report.models_failed,
            excluded = report.models_excluded,
            missing = report.models_missing,
            "Batch finished"
        );
        Ok(report)
    }
}
