//! The download backend abstraction

use async_trait::async_trait;
use std::path::Path;

/// Transfers one URL to one file, returning once the transfer has finished
///
/// Implementations hand the actual transfer to aria2. The destination must
/// exist after `Ok(())` and must not exist after an error; partially written
/// data only ever lives in the backend's temp directory.
///
/// # Examples
///
/// ```no_run
/// use civitai_dl::backend::{FileDownloader, ProcessDownloader};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = ProcessDownloader::from_path(Path::new("/tmp/civitai-temp"))
///     .expect("aria2c not found in PATH");
///
/// backend
///     .download(
///         "https://civitai.com/api/download/models/130072",
///         Path::new("downloads/model.safetensors"),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait FileDownloader: Send + Sync {
    /// Download `url` to `destination`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The backend cannot be reached or started
    /// - The transfer ends in any state other than complete
    /// - The finished file cannot be moved into place
    async fn download(&self, url: &str, destination: &Path) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
