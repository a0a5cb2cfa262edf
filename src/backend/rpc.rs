//! aria2 JSON-RPC client and the polling backend built on it

use super::traits::FileDownloader;
use crate::error::{DownloadError, Error, Result};
use crate::types::{DownloadTask, TaskState};
use crate::utils::{human_readable_size, move_into_place};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Keys requested from `aria2.tellStatus`
const STATUS_KEYS: &[&str] = &[
    "gid",
    "status",
    "totalLength",
    "completedLength",
    "errorCode",
    "errorMessage",
];

/// Minimal aria2 JSON-RPC client
///
/// Every call carries a fresh request id. When a secret is configured it is
/// passed as the first positional parameter (`token:<secret>`), as aria2's
/// `--rpc-secret` expects.
#[derive(Clone)]
pub struct Aria2RpcClient {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

/// Subset of `aria2.tellStatus`
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aria2Status {
    /// Task id
    #[serde(default)]
    pub gid: String,
    /// "active", "waiting", "paused", "error", "complete" or "removed"
    pub status: String,
    /// Size in bytes, as a decimal string
    #[serde(default)]
    pub total_length: Option<String>,
    /// Downloaded bytes, as a decimal string
    #[serde(default)]
    pub completed_length: Option<String>,
    /// aria2 exit code of a failed task
    #[serde(default)]
    pub error_code: Option<String>,
    /// Message of a failed task
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Aria2Status {
    /// Mapped task state
    pub fn state(&self) -> TaskState {
        TaskState::from_aria2(&self.status)
    }

    fn completed_bytes(&self) -> u64 {
        parse_length(self.completed_length.as_deref())
    }

    fn total_bytes(&self) -> u64 {
        parse_length(self.total_length.as_deref())
    }
}

fn parse_length(value: Option<&str>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

impl Aria2RpcClient {
    /// Create a client for the given endpoint
    pub fn new(url: &str, token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            url: url.to_string(),
            token,
        })
    }

    fn request_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Invoke a method and return its `result`
    pub async fn invoke(&self, method: &str, mut params: Vec<Value>) -> Result<Value> {
        if let Some(token) = &self.token {
            params.insert(0, Value::String(format!("token:{}", token)));
        }
        let body = json!({
            "jsonrpc": "2.0",
            "id": Self::request_id(),
            "method": method,
            "params": params,
        });

        let response = self.http.post(&self.url).json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let reply: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(Error::Api {
                    status: status.as_u16(),
                    url: self.url.clone(),
                });
            }
        };

        if let Some(error) = reply.get("error") {
            let code = error
                .get("code")
                .and_then(|c| c.as_i64().or_else(|| c.as_str().and_then(|s| s.parse().ok())))
                .unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(Error::Rpc { code, message });
        }

        reply
            .get("result")
            .cloned()
            .ok_or_else(|| Error::Other(format!("{} reply has no result", method)))
    }

    /// `aria2.getVersion`, returning the version string
    pub async fn get_version(&self) -> Result<String> {
        let result = self.invoke("aria2.getVersion", vec![]).await?;
        Ok(result
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }

    /// `aria2.addUri`, returning the GID of the new task
    pub async fn add_uri(&self, uris: &[&str], options: Value) -> Result<String> {
        let mut params = vec![json!(uris)];
        if options.as_object().is_some_and(|o| !o.is_empty()) {
            params.push(options);
        }
        let result = self.invoke("aria2.addUri", params).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Other(format!("aria2.addUri returned {}", result)))
    }

    /// `aria2.tellStatus`
    pub async fn tell_status(&self, gid: &str) -> Result<Aria2Status> {
        let result = self
            .invoke("aria2.tellStatus", vec![json!(gid), json!(STATUS_KEYS)])
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// `aria2.removeDownloadResult`
    pub async fn remove_download_result(&self, gid: &str) -> Result<()> {
        self.invoke("aria2.removeDownloadResult", vec![json!(gid)])
            .await?;
        Ok(())
    }
}

/// Backend that submits tasks to an aria2 daemon and polls until they finish
pub struct RpcDownloader {
    client: Aria2RpcClient,
    temp_dir: PathBuf,
    poll_interval: Duration,
}

impl RpcDownloader {
    /// Create a backend
    ///
    /// `temp_dir` is passed to the daemon as the task directory, so it must be
    /// a path the daemon can see.
    pub fn new(client: Aria2RpcClient, temp_dir: PathBuf, poll_interval: Duration) -> Self {
        Self {
            client,
            temp_dir,
            poll_interval,
        }
    }

    async fn wait_for(&self, gid: &str, task: &mut DownloadTask) -> Result<Aria2Status> {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let status = self.client.tell_status(gid).await?;
            task.transition(status.state());
            if !task.state.is_in_flight() {
                return Ok(status);
            }
            tracing::debug!(
                gid = gid,
                completed = %human_readable_size(status.completed_bytes()),
                total = %human_readable_size(status.total_bytes()),
                "aria2 task in progress"
            );
        }
    }
}

#[async_trait]
impl FileDownloader for RpcDownloader {
    async fn download(&self, url: &str, destination: &Path) -> Result<()> {
        let out_name = output_name(destination)?;
        let temp_path = self.temp_dir.join(&out_name);
        tokio::fs::create_dir_all(&self.temp_dir).await?;

        let mut task = DownloadTask::new(url, destination);
        let options = json!({
            "dir": self.temp_dir.to_string_lossy(),
            "out": out_name,
        });
        let gid = self.client.add_uri(&[url], options).await?;
        tracing::info!(gid = %gid, file = %out_name, "Submitted to aria2");

        let status = self.wait_for(&gid, &mut task).await?;
        if task.state != TaskState::Complete {
            tracing::warn!(
                gid = %gid,
                status = %status.status,
                error_code = status.error_code.as_deref().unwrap_or("-"),
                error_message = status.error_message.as_deref().unwrap_or("-"),
                "aria2 task did not complete"
            );
            return Err(DownloadError::Incomplete {
                gid,
                url: url.to_string(),
                status: status.status,
            }
            .into());
        }

        move_into_place(&temp_path, destination).await?;
        self.client.remove_download_result(&gid).await?;
        tracing::info!(
            gid = %gid,
            size = %human_readable_size(status.total_bytes()),
            path = %destination.display(),
            "Download complete"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "aria2-rpc"
    }
}

/// File name the backend writes into the temp directory
pub(super) fn output_name(destination: &Path) -> Result<String> {
    destination
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Other(format!("invalid destination {}", destination.display())))
}
