//! Test utilities for resolver tests.
//!
//! Provides a canned [`RawFetcher`] that never touches the network, with
//! optional per-URL delays and call counting.

#![allow(dead_code)]

use async_trait::async_trait;
use ghlines_core::{LinkError, RawFetcher, RawPayload, Resolver, ResolverConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Raw URL for a GitHub file under the default endpoints.
pub fn github_raw(owner: &str, repo: &str, ref_name: &str, path: &str) -> String {
    format!("https://raw.githubusercontent.com/{owner}/{repo}/{ref_name}/{path}")
}

/// `"line 1\nline 2\n...line N\n"`
pub fn numbered_lines(count: usize) -> String {
    (1..=count).map(|i| format!("line {i}\n")).collect()
}

#[derive(Clone)]
struct Canned {
    outcome: Result<RawPayload, LinkError>,
    delay: Duration,
}

/// Fake fetcher serving canned responses keyed by URL. Unknown URLs are
/// `NotFound`.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, Canned>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.file_delayed(url, body, Duration::ZERO)
    }

    pub fn file_delayed(
        mut self,
        url: impl Into<String>,
        body: impl Into<String>,
        delay: Duration,
    ) -> Self {
        self.responses.insert(
            url.into(),
            Canned {
                outcome: Ok(RawPayload::utf8(body)),
                delay,
            },
        );
        self
    }

    pub fn bytes(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.responses.insert(
            url.into(),
            Canned {
                outcome: Ok(RawPayload {
                    bytes,
                    charset: None,
                }),
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn failing(mut self, url: impl Into<String>, error: LinkError) -> Self {
        self.responses.insert(
            url.into(),
            Canned {
                outcome: Err(error),
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl RawFetcher for FakeFetcher {
    async fn get(&self, url: &str, max_bytes: usize) -> Result<RawPayload, LinkError> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;

        let Some(canned) = self.responses.get(url).cloned() else {
            return Err(LinkError::NotFound);
        };
        if !canned.delay.is_zero() {
            tokio::time::sleep(canned.delay).await;
        }
        let payload = canned.outcome?;
        if payload.bytes.len() > max_bytes {
            return Err(LinkError::PayloadTooLarge { limit: max_bytes });
        }
        Ok(payload)
    }
}

/// Resolver with default config over `fetcher`.
pub fn resolver(fetcher: &Arc<FakeFetcher>) -> Resolver {
    resolver_with(fetcher, ResolverConfig::default())
}

pub fn resolver_with(fetcher: &Arc<FakeFetcher>, config: ResolverConfig) -> Resolver {
    Resolver::with_fetcher(config, fetcher.clone())
}
