//! Raw file retrieval.
//!
//! [`RawFetcher`] is the only piece that touches the network. The
//! [`HttpFetcher`] implementation streams response bodies with a hard size
//! cap; tests substitute canned fetchers. [`ContentFetcher`] layers the
//! per-host endpoint rules, the fetch deadline and the single-flight cache on
//! top of it.

use async_trait::async_trait;
use futures::future::FutureExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::{FetchCache, FetchResult};
use crate::config::{Endpoints, ResolverConfig};
use crate::content::FetchedContent;
use crate::error::{LinkError, ResolverError};
use crate::link::{HostKind, SourceKey};

/// Bytes returned by a successful GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub bytes: Vec<u8>,
    /// `charset` parameter of the response `Content-Type`, if any.
    pub charset: Option<String>,
}

impl RawPayload {
    pub fn utf8(text: impl Into<String>) -> Self {
        Self {
            bytes: text.into().into_bytes(),
            charset: None,
        }
    }
}

/// Capability to GET a URL with a bounded body.
#[async_trait]
pub trait RawFetcher: Send + Sync {
    /// Fetch `url`. Bodies larger than `max_bytes` fail with
    /// [`LinkError::PayloadTooLarge`]; missing resources with
    /// [`LinkError::NotFound`].
    async fn get(&self, url: &str, max_bytes: usize) -> Result<RawPayload, LinkError>;
}

/// [`RawFetcher`] over a shared `reqwest` client.
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ResolverError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { http })
    }
}

fn transport_error(err: reqwest::Error) -> LinkError {
    if err.is_timeout() {
        LinkError::FetchTimeout
    } else {
        LinkError::NetworkFailure(err.to_string())
    }
}

/// Extract the `charset` parameter from a `Content-Type` value.
fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

#[async_trait]
impl RawFetcher for HttpFetcher {
    async fn get(&self, url: &str, max_bytes: usize) -> Result<RawPayload, LinkError> {
        let mut response = self
            .http
            .get(url)
            .header(ACCEPT, "*/*")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
            debug!(%url, %status, "Upstream file not found");
            return Err(LinkError::NotFound);
        }
        if !status.is_success() {
            warn!(%url, %status, "Upstream returned error status");
            return Err(LinkError::NetworkFailure(format!("status {status}")));
        }

        let too_large = LinkError::PayloadTooLarge { limit: max_bytes };
        if response
            .content_length()
            .is_some_and(|len| len > max_bytes as u64)
        {
            return Err(too_large);
        }

        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_param);

        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(too_large);
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(RawPayload { bytes, charset })
    }
}

/// The subset of the GitHub gist API response we read.
#[derive(Debug, Deserialize)]
struct GistInfo {
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    filename: String,
    raw_url: String,
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
}

/// Anchor slug GitHub derives from a gist file name: `Hello World.rb` ->
/// `hello-world-rb`.
pub fn gist_file_slug(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// Resolves parsed links to decoded file content, with caching.
pub struct ContentFetcher {
    raw: Arc<dyn RawFetcher>,
    cache: FetchCache,
    endpoints: Arc<Endpoints>,
    timeout: Duration,
    max_bytes: usize,
}

impl ContentFetcher {
    pub fn new(raw: Arc<dyn RawFetcher>, config: &ResolverConfig) -> Self {
        Self {
            raw,
            cache: FetchCache::new(config.cache_capacity, config.cache_ttl()),
            endpoints: Arc::new(config.endpoints.clone()),
            timeout: config.fetch_timeout(),
            max_bytes: config.max_file_bytes,
        }
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Fetch the file `key` names, at most once per TTL across callers.
    pub async fn fetch(&self, key: &SourceKey) -> FetchResult {
        let raw = self.raw.clone();
        let endpoints = self.endpoints.clone();
        let owned_key = key.clone();
        let timeout = self.timeout;
        let max_bytes = self.max_bytes;

        self.cache
            .get_or_fetch(key, move || {
                async move {
                    let load = load_source(raw.as_ref(), &endpoints, &owned_key, max_bytes);
                    match tokio::time::timeout(timeout, load).await {
                        Ok(result) => result,
                        Err(_) => {
                            debug!(source = %owned_key, "Fetch deadline elapsed");
                            Err(LinkError::FetchTimeout)
                        }
                    }
                }
                .boxed()
            })
            .await
    }
}

/// Raw-content URL for a repository file.
pub fn raw_file_url(endpoints: &Endpoints, key: &SourceKey) -> Option<String> {
    let SourceKey {
        owner,
        repo,
        ref_name,
        path,
        ..
    } = key;
    match key.host {
        HostKind::GitHub => Some(format!(
            "{}/{owner}/{repo}/{ref_name}/{path}",
            endpoints.github_raw.trim_end_matches('/')
        )),
        HostKind::GitLab => Some(format!(
            "{}/{owner}/{repo}/-/raw/{ref_name}/{path}",
            endpoints.gitlab.trim_end_matches('/')
        )),
        HostKind::Gist => None,
    }
}

async fn load_source(
    raw: &dyn RawFetcher,
    endpoints: &Endpoints,
    key: &SourceKey,
    max_bytes: usize,
) -> Result<FetchedContent, LinkError> {
    if key.host == HostKind::Gist {
        return load_gist(raw, endpoints, key, max_bytes).await;
    }

    let url = raw_file_url(endpoints, key)
        .ok_or_else(|| LinkError::malformed("host has no raw endpoint"))?;
    let payload = raw.get(&url, max_bytes).await?;
    FetchedContent::decode(key.path.as_str(), &payload.bytes, payload.charset.as_deref())
}

async fn load_gist(
    raw: &dyn RawFetcher,
    endpoints: &Endpoints,
    key: &SourceKey,
    max_bytes: usize,
) -> Result<FetchedContent, LinkError> {
    let mut url = format!(
        "{}/gists/{}",
        endpoints.github_api.trim_end_matches('/'),
        key.repo
    );
    if !key.ref_name.is_empty() {
        url.push('/');
        url.push_str(&key.ref_name);
    }

    let payload = raw.get(&url, max_bytes).await?;
    let info: GistInfo = serde_json::from_slice(&payload.bytes).map_err(|e| {
        warn!(%url, error = %e, "Failed to parse gist response");
        LinkError::NetworkFailure("invalid gist response".into())
    })?;

    let file = info
        .files
        .into_values()
        .find(|f| gist_file_slug(&f.filename) == key.path)
        .ok_or(LinkError::NotFound)?;

    match file.content {
        Some(content) if !file.truncated => {
            FetchedContent::decode(file.filename, content.as_bytes(), Some("utf-8"))
        }
        _ => {
            let payload = raw.get(&file.raw_url, max_bytes).await?;
            FetchedContent::decode(file.filename, &payload.bytes, payload.charset.as_deref())
        }
    }
}
