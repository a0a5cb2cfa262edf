//! Core types for civitai-dl
//!
//! Metadata records mirror the subset of the Civitai REST API the engine needs.
//! Unknown JSON fields are ignored here; the untouched document is kept in
//! [`ModelInfo::raw`] for the metadata snapshot.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Artifact type of a model, as spelled by the API
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelType {
    /// Full diffusion checkpoint
    Checkpoint,
    /// Embedding
    TextualInversion,
    /// Hypernetwork
    Hypernetwork,
    /// Aesthetic gradient
    AestheticGradient,
    /// Low-rank adaptation
    Lora,
    /// LyCORIS / LoCon
    LoCon,
    /// ControlNet
    Controlnet,
    /// Pose packs
    Poses,
    /// Upscaler
    Upscaler,
    /// Motion module
    MotionModule,
    /// VAE
    Vae,
    /// Wildcards
    Wildcards,
    /// Workflows
    Workflows,
    /// Other
    Other,
    /// A type this crate does not know, kept verbatim
    Unknown(String),
}

impl ModelType {
    /// API spelling, also used as the top-level storage directory name
    pub fn as_str(&self) -> &str {
        match self {
            ModelType::Checkpoint => "Checkpoint",
            ModelType::TextualInversion => "TextualInversion",
            ModelType::Hypernetwork => "Hypernetwork",
            ModelType::AestheticGradient => "AestheticGradient",
            ModelType::Lora => "LORA",
            ModelType::LoCon => "LoCon",
            ModelType::Controlnet => "Controlnet",
            ModelType::Poses => "Poses",
            ModelType::Upscaler => "Upscaler",
            ModelType::MotionModule => "MotionModule",
            ModelType::Vae => "VAE",
            ModelType::Wildcards => "Wildcards",
            ModelType::Workflows => "Workflows",
            ModelType::Other => "Other",
            ModelType::Unknown(s) => s,
        }
    }
}

impl From<String> for ModelType {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "checkpoint" => ModelType::Checkpoint,
            "textualinversion" => ModelType::TextualInversion,
            "hypernetwork" => ModelType::Hypernetwork,
            "aestheticgradient" => ModelType::AestheticGradient,
            "lora" => ModelType::Lora,
            "locon" => ModelType::LoCon,
            "controlnet" => ModelType::Controlnet,
            "poses" => ModelType::Poses,
            "upscaler" => ModelType::Upscaler,
            "motionmodule" => ModelType::MotionModule,
            "vae" => ModelType::Vae,
            "wildcards" => ModelType::Wildcards,
            "workflows" => ModelType::Workflows,
            "other" => ModelType::Other,
            _ => ModelType::Unknown(value),
        }
    }
}

impl From<ModelType> for String {
    fn from(value: ModelType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ModelType::from(s.to_string()))
    }
}

/// A model as returned by `GET models/{id}`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Model id
    pub id: u64,
    /// Display name
    pub name: String,
    /// Artifact type
    #[serde(rename = "type")]
    pub model_type: ModelType,
    /// Versions, newest first, parsed one at a time with
    /// [`VersionRecord::from_value`] so a malformed entry only affects itself
    #[serde(rename = "modelVersions", default)]
    pub versions: Vec<serde_json::Value>,
}

/// One published version of a model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Version id
    pub id: u64,
    /// Version name
    pub name: String,
    /// Preview images
    #[serde(default)]
    pub images: Vec<ImageAsset>,
    /// Downloadable files
    #[serde(default)]
    pub files: Vec<FileAsset>,
}

impl VersionRecord {
    /// Parse one entry of `modelVersions`
    pub fn from_value(raw: &serde_json::Value) -> crate::Result<Self> {
        Ok(VersionRecord::deserialize(raw)?)
    }
}

/// A preview image; only its URL matters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Image URL
    pub url: String,
}

/// A downloadable file of a version
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileAsset {
    /// File id
    pub id: u64,
    /// Declared file name
    pub name: String,
    /// Declared kind ("Model", "Pruned Model", "VAE", "Config", ...)
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Download URL, usually answered with a redirect
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
    /// Declared size in KB
    #[serde(rename = "sizeKB", default)]
    pub size_kb: Option<f64>,
    /// Serialization details
    #[serde(default)]
    pub metadata: FileMetadata,
}

impl FileAsset {
    /// Declared serialization format ("SafeTensor", "PickleTensor", ...)
    pub fn format(&self) -> Option<&str> {
        self.metadata.format.as_deref()
    }
}

/// File metadata block
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Serialization format
    #[serde(default)]
    pub format: Option<String>,
    /// Floating point precision ("fp16", "fp32")
    #[serde(default)]
    pub fp: Option<String>,
    /// Size variant ("full", "pruned")
    #[serde(default)]
    pub size: Option<String>,
}

/// A model record together with the document it was parsed from
#[derive(Clone, Debug)]
pub struct ModelInfo {
    /// Typed view
    pub record: ModelRecord,
    /// Full API response, persisted as the metadata snapshot
    pub raw: serde_json::Value,
}

impl ModelInfo {
    /// Parse a raw `GET models/{id}` response
    pub fn from_value(raw: serde_json::Value) -> crate::Result<Self> {
        let record = ModelRecord::deserialize(&raw)?;
        Ok(Self { record, raw })
    }
}

/// Listing entry from `GET models`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Model id
    pub id: u64,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Artifact type, when the listing reports it
    #[serde(rename = "type", default)]
    pub model_type: Option<ModelType>,
}

/// Pagination block of a listing response
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    /// Total matching models
    #[serde(default)]
    pub total_items: Option<u64>,
    /// Page this response belongs to
    #[serde(default)]
    pub current_page: Option<u32>,
    /// Items per page
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Number of pages the listing has
    #[serde(default)]
    pub total_pages: Option<u32>,
}

/// One page of `GET models`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelPage {
    /// Models on this page
    #[serde(default)]
    pub items: Vec<ModelSummary>,
    /// Pagination
    #[serde(default)]
    pub metadata: PageMetadata,
}

/// State of a single backend transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Accepted but not started
    Pending,
    /// Transferring
    Active,
    /// Finished successfully
    Complete,
    /// Ended without completing
    Failed,
}

impl TaskState {
    /// Map an aria2 status string
    pub fn from_aria2(status: &str) -> Self {
        match status {
            "waiting" => TaskState::Pending,
            "active" => TaskState::Active,
            "complete" => TaskState::Complete,
            _ => TaskState::Failed,
        }
    }

    /// Whether the transfer is still in flight
    pub fn is_in_flight(self) -> bool {
        matches!(self, TaskState::Pending | TaskState::Active)
    }
}

/// A URL → file transfer owned by one backend call
#[derive(Clone, Debug)]
pub struct DownloadTask {
    /// Final path
    pub destination: PathBuf,
    /// Source URL
    pub url: String,
    /// Current state
    pub state: TaskState,
}

impl DownloadTask {
    /// New pending task
    pub fn new(url: &str, destination: &std::path::Path) -> Self {
        Self {
            destination: destination.to_path_buf(),
            url: url.to_string(),
            state: TaskState::Pending,
        }
    }

    /// Record a state change, logging transitions
    pub fn transition(&mut self, state: TaskState) {
        if self.state != state {
            tracing::debug!(
                url = %self.url,
                from = ?self.state,
                to = ?state,
                "Download task state changed"
            );
            self.state = state;
        }
    }
}

/// Outcome of one model run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelReport {
    /// Model id
    pub model_id: u64,
    /// Model name
    pub name: String,
    /// Versions handled without error
    pub versions_processed: usize,
    /// Versions aborted by an error
    pub versions_failed: usize,
    /// Versions left out by `latest_only`
    pub versions_skipped: usize,
    /// Whether the metadata snapshot was written by this run
    pub metadata_written: bool,
    /// Images fetched
    pub images_downloaded: usize,
    /// Images already on disk or unavailable
    pub images_skipped: usize,
    /// Files handed to the backend
    pub files_downloaded: usize,
    /// Files already on disk
    pub files_skipped: usize,
    /// Files removed by the file filter
    pub files_filtered: usize,
}

/// Outcome of a batch run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Listing pages fetched
    pub pages_fetched: u32,
    /// Models the engine finished
    pub models_finished: usize,
    /// Models whose processing failed
    pub models_failed: usize,
    /// Models skipped by the exclusion list
    pub models_excluded: usize,
    /// Models the API no longer serves
    pub models_missing: usize,
}
