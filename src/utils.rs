//! Utility functions for file naming and file moves

use crate::error::{DownloadError, Error, Result};
use std::path::{Path, PathBuf};

/// Characters that are invalid in file names on at least one supported platform
const UNSAFE_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Extension appended to image names whose URL carries none
pub const DEFAULT_IMAGE_EXTENSION: &str = "jpeg";

/// Replace characters that cannot appear in a file name with `_` and trim
/// surrounding whitespace
///
/// # Examples
///
/// ```
/// use civitai_dl::utils::safe_filename;
///
/// assert_eq!(safe_filename(" Anime/Style: v2 "), "Anime_Style_ v2");
/// ```
#[must_use]
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if UNSAFE_FILENAME_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Derive a file name from the last path segment of a URL
///
/// The segment is percent-decoded and sanitized. When it has no extension,
/// `default_extension` is appended. Returns `None` when the URL cannot be
/// parsed or its path is empty.
///
/// # Examples
///
/// ```
/// use civitai_dl::utils::file_name_from_url;
///
/// let name = file_name_from_url("https://image.civitai.com/x/abc/width=450/preview.png", "jpeg");
/// assert_eq!(name.as_deref(), Some("preview.png"));
///
/// let bare = file_name_from_url("https://image.civitai.com/x/abc/width=450/7f3a", "jpeg");
/// assert_eq!(bare.as_deref(), Some("7f3a.jpeg"));
/// ```
#[must_use]
pub fn file_name_from_url(url: &str, default_extension: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last_segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())?;

    let decoded = urlencoding::decode(last_segment)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| last_segment.to_string());
    let name = safe_filename(&decoded);
    if name.is_empty() {
        return None;
    }

    if Path::new(&name).extension().is_some() {
        Some(name)
    } else {
        Some(format!("{}.{}", name, default_extension))
    }
}

/// Format a byte count with binary units
///
/// # Examples
///
/// ```
/// use civitai_dl::utils::human_readable_size;
///
/// assert_eq!(human_readable_size(512), "512 B");
/// assert_eq!(human_readable_size(1536), "1.5 KB");
/// ```
#[must_use]
pub fn human_readable_size(bytes: u64) -> String {
    const UNITS: &[(u32, &str)] = &[(4, "TB"), (3, "GB"), (2, "MB"), (1, "KB")];
    for &(power, unit) in UNITS {
        let step = 1024f64.powi(power as i32);
        if bytes as f64 >= step {
            let value = (bytes as f64 / step * 100.0).round() / 100.0;
            return format!("{} {}", value, unit);
        }
    }
    format!("{} B", bytes)
}

/// Move a finished backend output to its final destination
///
/// A plain rename is attempted first. When source and destination live on
/// different filesystems the file is copied next to the destination under a
/// `.part` name and then renamed, so `dest` only ever appears complete.
pub async fn move_into_place(src: &Path, dest: &Path) -> Result<()> {
    if !tokio::fs::try_exists(src).await.unwrap_or(false) {
        return Err(DownloadError::OutputMissing {
            path: src.to_path_buf(),
        }
        .into());
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    match tokio::fs::rename(src, dest).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            tracing::debug!(
                src = %src.display(),
                dest = %dest.display(),
                "Temp dir is on another filesystem, copying"
            );
            let staging = partial_path(dest);
            let copy_result = async {
                tokio::fs::copy(src, &staging).await?;
                tokio::fs::rename(&staging, dest).await
            }
            .await;
            if let Err(e) = copy_result {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(move_failed(src, dest, e));
            }
            tokio::fs::remove_file(src).await?;
            Ok(())
        }
        Err(e) => Err(move_failed(src, dest, e)),
    }
}

/// Write `contents` to `dest` through a `.part` sibling
///
/// A failed write removes the partial file and leaves `dest` untouched.
pub async fn write_atomic(dest: &Path, contents: &[u8]) -> Result<()> {
    let staging = partial_path(dest);
    let result = async {
        tokio::fs::write(&staging, contents).await?;
        tokio::fs::rename(&staging, dest).await
    }
    .await;
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(e.into());
    }
    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

fn move_failed(src: &Path, dest: &Path, e: std::io::Error) -> Error {
    Error::Download(DownloadError::MoveFailed {
        source_path: src.to_path_buf(),
        dest_path: dest.to_path_buf(),
        reason: e.to_string(),
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn safe_filename_replaces_every_reserved_character() {
        assert_eq!(safe_filename(r#"a\b/c:d*e?f"g<h>i|j"#), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn safe_filename_keeps_unicode_and_trims() {
        assert_eq!(safe_filename("  萌え Style  "), "萌え Style");
    }

    #[test]
    fn file_name_from_url_decodes_percent_escapes() {
        let name = file_name_from_url(
            "https://image.civitai.com/x/y/width=450/my%20image%3Afinal.png",
            DEFAULT_IMAGE_EXTENSION,
        );
        assert_eq!(name.as_deref(), Some("my image_final.png"));
    }

    #[test]
    fn file_name_from_url_ignores_query_string() {
        let name = file_name_from_url(
            "https://image.civitai.com/x/y/abc.webp?token=1",
            DEFAULT_IMAGE_EXTENSION,
        );
        assert_eq!(name.as_deref(), Some("abc.webp"));
    }

    #[test]
    fn file_name_from_url_rejects_empty_paths() {
        assert_eq!(
            file_name_from_url("https://image.civitai.com/", DEFAULT_IMAGE_EXTENSION),
            None
        );
        assert_eq!(file_name_from_url("not a url", DEFAULT_IMAGE_EXTENSION), None);
    }

    #[test]
    fn human_readable_size_uses_binary_units() {
        assert_eq!(human_readable_size(0), "0 B");
        assert_eq!(human_readable_size(1024), "1 KB");
        assert_eq!(human_readable_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(human_readable_size(2_147_483_648), "2 GB");
        assert_eq!(human_readable_size(1_099_511_627_776), "1 TB");
    }

    #[tokio::test]
    async fn move_into_place_renames_and_creates_parent() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("temp").join("file.bin");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, b"weights").unwrap();

        let dest = dir.path().join("models").join("file.bin");
        move_into_place(&src, &dest).await.unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"weights");
    }

    #[tokio::test]
    async fn move_into_place_reports_missing_source() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("file.bin");

        let result = move_into_place(&dir.path().join("missing.bin"), &dest).await;

        assert!(matches!(
            result,
            Err(Error::Download(DownloadError::OutputMissing { .. }))
        ));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn write_atomic_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("model_1_x.yaml");

        write_atomic(&dest, b"id: 1\n").await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"id: 1\n");
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn write_atomic_failure_leaves_no_destination() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("missing").join("image.png");

        assert!(write_atomic(&dest, b"png").await.is_err());

        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/m/file_1_2_3_x.safetensors")),
            PathBuf::from("/m/file_1_2_3_x.safetensors.part")
        );
    }
}
