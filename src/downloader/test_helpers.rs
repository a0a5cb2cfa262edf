//! Shared helpers for engine and batch tests.

use crate::backend::FileDownloader;
use crate::civitai::CivitaiClient;
use crate::config::{ApiConfig, DownloadOptions, RetryConfig};
use crate::downloader::ModelDownloader;
use crate::error::{DownloadError, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Backend that records every call and writes a stub file
///
/// URLs containing any of the `fail_on` fragments fail with
/// [`DownloadError::ProcessFailed`] and leave no file behind.
#[derive(Clone, Default)]
pub(crate) struct RecordingDownloader {
    pub(crate) calls: Arc<Mutex<Vec<(String, PathBuf)>>>,
    pub(crate) fail_on: Vec<String>,
}

impl RecordingDownloader {
    pub(crate) fn failing_on(fragment: &str) -> Self {
        Self {
            fail_on: vec![fragment.to_string()],
            ..Self::default()
        }
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }
}

#[async_trait]
impl FileDownloader for RecordingDownloader {
    async fn download(&self, url: &str, destination: &Path) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), destination.to_path_buf()));
        if self.fail_on.iter().any(|f| url.contains(f.as_str())) {
            return Err(DownloadError::ProcessFailed { code: Some(1) }.into());
        }
        tokio::fs::write(destination, url.as_bytes()).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Metadata client against a mock server with a short retry policy
pub(crate) fn test_client(server: &MockServer) -> CivitaiClient {
    let api = ApiConfig {
        base_url: format!("{}/api/v1/", server.uri()),
        ..ApiConfig::default()
    };
    let retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(5),
        ..RetryConfig::default()
    };
    CivitaiClient::new(&api, retry).unwrap()
}

/// Engine wired to the mock server and a recording backend
pub(crate) fn test_engine(
    server: &MockServer,
    storage: &Path,
    backend: RecordingDownloader,
    options: DownloadOptions,
) -> ModelDownloader {
    ModelDownloader::new(
        test_client(server),
        Box::new(backend),
        storage.to_path_buf(),
        options,
    )
}

/// A version whose single image and single file are served by `server`
pub(crate) fn version_json(server: &MockServer, version_id: u64) -> Value {
    json!({
        "id": version_id,
        "name": format!("v{version_id}"),
        "images": [{"url": format!("{}/img/{version_id}/preview.png", server.uri())}],
        "files": [{
            "id": version_id * 10,
            "name": format!("weights_{version_id}.safetensors"),
            "type": "Model",
            "sizeKB": 1024.0,
            "downloadUrl": format!("{}/api/download/models/{version_id}", server.uri()),
            "metadata": {"format": "SafeTensor"}
        }]
    })
}

pub(crate) fn model_json(id: u64, name: &str, model_type: &str, versions: Vec<Value>) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": model_type,
        "description": "<p>test</p>",
        "modelVersions": versions
    })
}

/// Serve `GET models/{id}` with the given document
pub(crate) async fn mount_model(server: &MockServer, model: &Value) {
    let id = model["id"].as_u64().unwrap();
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/models/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(model))
        .mount(server)
        .await;
}

/// Serve every image and download URL produced by [`version_json`]
pub(crate) async fn mount_assets(server: &MockServer) {
    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/img/.*"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(wiremock::matchers::path_regex(r"^/api/download/models/\d+$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}
