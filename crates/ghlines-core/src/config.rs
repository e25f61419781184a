//! Resolver tuning knobs.
//!
//! Every field has a default so a partial TOML table (or none at all) is a
//! valid configuration. `GHLINES_*` environment variables override file
//! values; see [`ResolverConfig::with_env_overrides`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Default per-fetch deadline (5 seconds).
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;

/// Default maximum size of a fetched file (1 MiB).
pub const DEFAULT_MAX_FILE_BYTES: usize = 1024 * 1024;

/// Default cache TTL (5 minutes). Refs may be branch names, so keep it short.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Raw-content endpoints. Overridable so tests can point at a mock server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Base for `/{owner}/{repo}/{ref}/{path}` on GitHub.
    pub github_raw: String,
    /// Base for `/{namespace}/{repo}/-/raw/{ref}/{path}` on GitLab.
    pub gitlab: String,
    /// Base for `/gists/{id}` on the GitHub API.
    pub github_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            github_raw: "https://raw.githubusercontent.com".into(),
            gitlab: "https://gitlab.com".into(),
            github_api: "https://api.github.com".into(),
        }
    }
}

/// Configuration for [`crate::Resolver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Deadline for one file fetch, in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Files larger than this are not displayed.
    pub max_file_bytes: usize,
    /// Simultaneous fetches per message.
    pub max_concurrent_fetches: usize,
    /// Parsed links resolved per message; the rest are ignored.
    pub max_links: usize,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    /// Strip indentation shared by all displayed lines.
    pub dedent: bool,
    /// Ignore links inside markdown code spans and fences.
    pub skip_code_spans: bool,
    pub user_agent: String,
    pub endpoints: Endpoints,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_concurrent_fetches: 8,
            max_links: 50,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_capacity: 256,
            dedent: false,
            skip_code_spans: false,
            user_agent: concat!("ghlines/", env!("CARGO_PKG_VERSION")).into(),
            endpoints: Endpoints::default(),
        }
    }
}

impl ResolverConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Apply `GHLINES_*` environment variables on top of this config.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup. Unparseable values
    /// are logged and ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn set<T: std::str::FromStr>(
            slot: &mut T,
            name: &str,
            lookup: &dyn Fn(&str) -> Option<String>,
        ) {
            let Some(raw) = lookup(name).filter(|v| !v.is_empty()) else {
                return;
            };
            match raw.parse() {
                Ok(value) => *slot = value,
                Err(_) => warn!(var = name, value = %raw, "Ignoring unparseable override"),
            }
        }

        set(&mut self.fetch_timeout_ms, "GHLINES_FETCH_TIMEOUT_MS", &lookup);
        set(&mut self.max_file_bytes, "GHLINES_MAX_FILE_BYTES", &lookup);
        set(&mut self.max_concurrent_fetches, "GHLINES_MAX_CONCURRENT_FETCHES", &lookup);
        set(&mut self.max_links, "GHLINES_MAX_LINKS", &lookup);
        set(&mut self.cache_ttl_secs, "GHLINES_CACHE_TTL_SECS", &lookup);
        set(&mut self.cache_capacity, "GHLINES_CACHE_CAPACITY", &lookup);
        set(&mut self.dedent, "GHLINES_DEDENT", &lookup);
        set(&mut self.skip_code_spans, "GHLINES_SKIP_CODE_SPANS", &lookup);
        set(&mut self.user_agent, "GHLINES_USER_AGENT", &lookup);
        self
    }
}
