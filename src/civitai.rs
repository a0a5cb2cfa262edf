//! Civitai REST API client
//!
//! Thin wrapper over `reqwest` covering the four calls the engine needs:
//! listing models, fetching one model, fetching raw bytes (images) and
//! resolving a download URL's redirect. Every call goes through
//! [`with_retry`], so throttling (429/514) is ridden out here and never
//! reaches the engine. 404 and 403 become `Ok(None)`.

use crate::config::{ApiConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::{ModelInfo, ModelPage, ModelType};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// Civitai metadata client
#[derive(Clone)]
pub struct CivitaiClient {
    base_url: url::Url,
    http: reqwest::Client,
    /// Same settings as `http` but never follows redirects
    no_redirect: reqwest::Client,
    retry: RetryConfig,
}

impl CivitaiClient {
    /// Build a client from API and retry settings
    ///
    /// # Errors
    /// Returns [`Error::Config`] for an unparsable base URL, proxy or token
    pub fn new(api: &ApiConfig, retry: RetryConfig) -> Result<Self> {
        let mut base_url =
            url::Url::parse(&api.base_url).map_err(|e| Error::config("api.base_url", e.to_string()))?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let http = Self::builder(api)?
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;
        let no_redirect = Self::builder(api)?
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http,
            no_redirect,
            retry,
        })
    }

    fn builder(api: &ApiConfig) -> Result<reqwest::ClientBuilder> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
        if let Some(token) = &api.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::config("api.token", e.to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(api.user_agent.clone())
            .default_headers(headers)
            .timeout(api.timeout);

        if let Some(proxy) = &api.proxy {
            let proxy =
                reqwest::Proxy::all(proxy).map_err(|e| Error::config("api.proxy", e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        Ok(builder)
    }

    /// `GET models` for one listing page
    pub async fn get_models(
        &self,
        page: u32,
        model_type: Option<&ModelType>,
        sort: Option<&str>,
    ) -> Result<Option<ModelPage>> {
        let mut query: Vec<(&str, String)> = vec![("page", page.to_string())];
        if let Some(t) = model_type {
            query.push(("types", t.to_string()));
        }
        if let Some(s) = sort {
            query.push(("sort", s.to_string()));
        }

        let url = self.endpoint("models")?;
        let Some(value) = self.get_json(&url, &query).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_value(value)?))
    }

    /// `GET models/{id}`
    pub async fn get_model(&self, model_id: u64) -> Result<Option<ModelInfo>> {
        let url = self.endpoint(&format!("models/{}", model_id))?;
        match self.get_json(&url, &[]).await? {
            Some(value) => Ok(Some(ModelInfo::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Download an arbitrary URL into memory
    pub async fn get_bytes(&self, url: &str) -> Result<Option<Vec<u8>>> {
        with_retry(&self.retry, || self.get_bytes_once(url)).await
    }

    /// Follow one redirect hop of a download URL
    ///
    /// Returns the `Location` target when the server redirects, otherwise the
    /// URL unchanged. The response body is never read.
    pub async fn resolve_url(&self, url: &str) -> Result<String> {
        with_retry(&self.retry, || self.resolve_url_once(url)).await
    }

    async fn get_bytes_once(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let response = self.http.get(url).send().await?;
        match check_status(response, url)? {
            Some(response) => Ok(Some(response.bytes().await?.to_vec())),
            None => Ok(None),
        }
    }

    async fn resolve_url_once(&self, url: &str) -> Result<String> {
        let response = self.no_redirect.get(url).send().await?;
        let status = response.status();

        if status.is_redirection() {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    Error::Other(format!("redirect from {} without Location header", url))
                })?;
            let base = url::Url::parse(url)
                .map_err(|e| Error::Other(format!("invalid download URL {}: {}", url, e)))?;
            let target = base.join(location).map_err(|e| {
                Error::Other(format!("invalid redirect target {}: {}", location, e))
            })?;
            tracing::debug!(from = url, to = %target, "Resolved download redirect");
            return Ok(target.to_string());
        }

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(url.to_string())
    }

    fn endpoint(&self, path: &str) -> Result<url::Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Other(format!("invalid API path {}: {}", path, e)))
    }

    async fn get_json(
        &self,
        url: &url::Url,
        query: &[(&str, String)],
    ) -> Result<Option<serde_json::Value>> {
        with_retry(&self.retry, || self.get_json_once(url, query)).await
    }

    async fn get_json_once(
        &self,
        url: &url::Url,
        query: &[(&str, String)],
    ) -> Result<Option<serde_json::Value>> {
        let response = self.http.get(url.clone()).query(query).send().await?;
        match check_status(response, url.as_str())? {
            Some(response) => Ok(Some(response.json::<serde_json::Value>().await?)),
            None => Ok(None),
        }
    }
}

/// Map a response status: success passes through, 404/403 become `None`,
/// everything else becomes [`Error::Api`]
fn check_status(response: reqwest::Response, url: &str) -> Result<Option<reqwest::Response>> {
    let status = response.status();
    if status.is_success() {
        return Ok(Some(response));
    }
    if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
        tracing::warn!(status = status.as_u16(), url = url, "Resource unavailable");
        return Ok(None);
    }
    Err(Error::Api {
        status: status.as_u16(),
        url: url.to_string(),
    })
}
