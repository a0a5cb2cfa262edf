//! Backend that runs one `aria2c` process per file

use super::rpc::output_name;
use super::traits::FileDownloader;
use crate::error::{DownloadError, Error, Result};
use crate::utils::move_into_place;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// User agent aria2c presents to the file host
pub const ARIA2_USER_AGENT: &str = "CivitaiLink:Automatic1111";

/// Runs the `aria2c` binary for every download
///
/// The child inherits stdout and stderr so aria2c's own progress display
/// reaches the terminal. The transfer lands in the temp directory and is
/// moved to its destination once the process exits successfully.
///
/// # Examples
///
/// ```no_run
/// use civitai_dl::backend::{FileDownloader, ProcessDownloader};
/// use std::path::{Path, PathBuf};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = ProcessDownloader::new(
///     PathBuf::from("/usr/bin/aria2c"),
///     PathBuf::from("/data/models/.temp"),
/// );
/// backend
///     .download(
///         "https://civitai.com/api/download/models/130072",
///         Path::new("/data/models/file.safetensors"),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ProcessDownloader {
    binary_path: PathBuf,
    temp_dir: PathBuf,
}

impl ProcessDownloader {
    /// Create a backend with an explicit binary path
    pub fn new(binary_path: PathBuf, temp_dir: PathBuf) -> Self {
        Self {
            binary_path,
            temp_dir,
        }
    }

    /// Look up `aria2c` in PATH
    ///
    /// Returns `None` when the binary is not installed.
    pub fn from_path(temp_dir: &Path) -> Option<Self> {
        which::which("aria2c")
            .ok()
            .map(|binary| Self::new(binary, temp_dir.to_path_buf()))
    }

    /// Command-line arguments for one transfer
    fn args(&self, url: &str, out_name: &str) -> Vec<String> {
        vec![
            format!("--dir={}", self.temp_dir.display()),
            format!("--out={}", out_name),
            "--max-tries=10".to_string(),
            "--split=5".to_string(),
            "--lowest-speed-limit=1K".to_string(),
            format!("--user-agent={}", ARIA2_USER_AGENT),
            "--file-allocation=falloc".to_string(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl FileDownloader for ProcessDownloader {
    async fn download(&self, url: &str, destination: &Path) -> Result<()> {
        let out_name = output_name(destination)?;
        tokio::fs::create_dir_all(&self.temp_dir).await?;

        tracing::info!(
            binary = %self.binary_path.display(),
            file = %out_name,
            "Starting aria2c"
        );
        let status = Command::new(&self.binary_path)
            .args(self.args(url, &out_name))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute aria2c: {}", e)))?;

        if !status.success() {
            return Err(DownloadError::ProcessFailed {
                code: status.code(),
            }
            .into());
        }

        move_into_place(&self.temp_dir.join(&out_name), destination).await?;
        tracing::info!(path = %destination.display(), "Download complete");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "aria2c-process"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn args_follow_aria2c_conventions() {
        let backend = ProcessDownloader::new(PathBuf::from("aria2c"), PathBuf::from("/tmp/t"));
        assert_eq!(
            backend.args("https://x/y", "file_1_2_3_m.safetensors"),
            vec![
                "--dir=/tmp/t",
                "--out=file_1_2_3_m.safetensors",
                "--max-tries=10",
                "--split=5",
                "--lowest-speed-limit=1K",
                "--user-agent=CivitaiLink:Automatic1111",
                "--file-allocation=falloc",
                "https://x/y",
            ]
        );
    }

    #[test]
    fn from_path_matches_which() {
        let found = ProcessDownloader::from_path(Path::new("/tmp"));
        assert_eq!(found.is_some(), which::which("aria2c").is_ok());
    }

    #[tokio::test]
    async fn missing_binary_is_an_external_tool_error() {
        let dir = TempDir::new().unwrap();
        let backend = ProcessDownloader::new(
            dir.path().join("no-such-aria2c"),
            dir.path().join("temp"),
        );

        let result = backend
            .download("https://x/y", &dir.path().join("out.bin"))
            .await;
        assert!(matches!(result, Err(Error::ExternalTool(_))));
    }

    #[cfg(unix)]
    mod fake_binary {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Writes an executable shell script standing in for aria2c
        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-aria2c");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn successful_exit_moves_output() {
            let dir = TempDir::new().unwrap();
            let binary = script(
                dir.path(),
                r#"for arg in "$@"; do
  case "$arg" in
    --dir=*) d="${arg#--dir=}" ;;
    --out=*) o="${arg#--out=}" ;;
  esac
done
printf 'weights' > "$d/$o""#,
            );
            let temp = dir.path().join("temp");
            let dest = dir.path().join("Checkpoint").join("file_1_2_3_m.safetensors");

            ProcessDownloader::new(binary, temp.clone())
                .download("https://example.com/m", &dest)
                .await
                .unwrap();

            assert_eq!(std::fs::read(&dest).unwrap(), b"weights");
            assert!(!temp.join("file_1_2_3_m.safetensors").exists());
        }

        #[tokio::test]
        async fn non_zero_exit_reports_code() {
            let dir = TempDir::new().unwrap();
            let binary = script(dir.path(), "exit 3");
            let dest = dir.path().join("out.bin");

            let result = ProcessDownloader::new(binary, dir.path().join("temp"))
                .download("https://example.com/m", &dest)
                .await;

            match result {
                Err(Error::Download(DownloadError::ProcessFailed { code })) => {
                    assert_eq!(code, Some(3));
                }
                other => panic!("expected ProcessFailed, got {other:?}"),
            }
            assert!(!dest.exists());
        }

        #[tokio::test]
        async fn success_without_output_is_reported() {
            let dir = TempDir::new().unwrap();
            let binary = script(dir.path(), "exit 0");

            let result = ProcessDownloader::new(binary, dir.path().join("temp"))
                .download("https://example.com/m", &dir.path().join("out.bin"))
                .await;

            assert!(matches!(
                result,
                Err(Error::Download(DownloadError::OutputMissing { .. }))
            ));
        }
    }
}
