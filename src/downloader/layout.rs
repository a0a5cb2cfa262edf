//! On-disk naming of model directories and assets
//!
//! Every path is keyed by ids so that two models sharing a display name never
//! collide. The sanitized name only makes the tree readable.

use crate::types::{FileAsset, ModelRecord};
use crate::utils::{DEFAULT_IMAGE_EXTENSION, file_name_from_url, safe_filename};
use std::path::{Path, PathBuf};

/// `<storage>/<type>/<model_id>_<name>`
pub(crate) fn model_dir(storage: &Path, model: &ModelRecord) -> PathBuf {
    storage
        .join(safe_filename(model.model_type.as_str()))
        .join(format!("{}_{}", model.id, safe_filename(&model.name)))
}

/// `model_<model_id>_<name>.yaml`
pub(crate) fn metadata_path(dir: &Path, model: &ModelRecord) -> PathBuf {
    dir.join(format!(
        "model_{}_{}.yaml",
        model.id,
        safe_filename(&model.name)
    ))
}

/// `image_<model_id>_<version_id>_<basename>`
///
/// `None` when no base name can be derived from the URL.
pub(crate) fn image_path(dir: &Path, model_id: u64, version_id: u64, url: &str) -> Option<PathBuf> {
    let basename = file_name_from_url(url, DEFAULT_IMAGE_EXTENSION)?;
    Some(dir.join(format!("image_{}_{}_{}", model_id, version_id, basename)))
}

/// `file_<model_id>_<version_id>_<file_id>_<name>`
pub(crate) fn file_path(dir: &Path, model_id: u64, version_id: u64, file: &FileAsset) -> PathBuf {
    dir.join(format!(
        "file_{}_{}_{}_{}",
        model_id,
        version_id,
        file.id,
        safe_filename(&file.name)
    ))
}
