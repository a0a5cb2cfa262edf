//! Selection of which file variants of a version get downloaded
//!
//! Versions frequently publish the same weights twice, once as SafeTensor and
//! once in the legacy pickle format. Pickle files execute code on load, so
//! they are dropped whenever a version ships more than one model file.

use crate::types::FileAsset;

/// Format name of the legacy pickle-based tensor serialization
pub const PICKLE_TENSOR_FORMAT: &str = "PickleTensor";

/// Whether a file carries model weights ("Model" or "Pruned Model")
#[must_use]
pub fn is_model_artifact(file: &FileAsset) -> bool {
    let kind = file
        .kind
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    kind == "model" || kind == "prunedmodel"
}

/// Whether a file uses the pickle-based format
#[must_use]
pub fn is_pickle_tensor(file: &FileAsset) -> bool {
    file.format()
        .is_some_and(|f| f.eq_ignore_ascii_case(PICKLE_TENSOR_FORMAT))
}

/// Filter a version's files
///
/// With two or more model artifacts, every pickle-format model artifact is
/// removed. Non-model files and the relative order of the survivors are kept.
/// With zero or one model artifact the list is returned unchanged.
#[must_use]
pub fn filter_files(files: &[FileAsset]) -> Vec<FileAsset> {
    let model_count = files.iter().filter(|f| is_model_artifact(f)).count();
    if model_count <= 1 {
        return files.to_vec();
    }

    files
        .iter()
        .filter(|f| !(is_model_artifact(f) && is_pickle_tensor(f)))
        .cloned()
        .collect()
}
