//! Message-level orchestration.
//!
//! The resolver is designed to be shared: one instance per process, called
//! once per incoming message. Resolution is **fail-open** per link: a link
//! that cannot be parsed, fetched or extracted is left out of the result and
//! the remaining links are still resolved.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, Span};

use crate::config::ResolverConfig;
use crate::error::{LinkError, ResolverError};
use crate::extract::{extract_range, file_extension};
use crate::fetch::{ContentFetcher, HttpFetcher, RawFetcher};
use crate::link::{parse_link, ParsedLink};
use crate::scan::{scan, scan_outside_code};

/// One resolved link, ready to be rendered by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayEntry {
    /// Highlighting hint derived from the file name; empty when unknown.
    pub extension: String,
    /// The requested lines, joined with `\n`.
    pub to_display: String,
}

/// Everything the caller needs to answer one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResult {
    pub msg_list: Vec<DisplayEntry>,
    /// Displayed lines across all entries, for the caller's spam limit.
    pub total_lines: u64,
    /// More valid links than `max_links` were found; the rest were not
    /// resolved and `total_lines` undercounts the message.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl MessageResult {
    pub fn is_empty(&self) -> bool {
        self.msg_list.is_empty()
    }
}

/// Scans messages for line permalinks and resolves them.
pub struct Resolver {
    fetcher: ContentFetcher,
    config: ResolverConfig,
}

impl Resolver {
    /// Create a resolver that fetches over HTTPS.
    pub fn new(config: ResolverConfig) -> Result<Self, ResolverError> {
        let http = HttpFetcher::new(&config.user_agent, config.fetch_timeout())?;
        Ok(Self::with_fetcher(config, Arc::new(http)))
    }

    /// Create a resolver on top of any [`RawFetcher`].
    pub fn with_fetcher(config: ResolverConfig, raw: Arc<dyn RawFetcher>) -> Self {
        Self {
            fetcher: ContentFetcher::new(raw, &config),
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Find every line permalink in `text` and resolve it.
    ///
    /// Entries appear in the order their links appear in `text`, whatever
    /// order the fetches complete in. Failed links are omitted and count zero
    /// toward `total_lines`. Dropping the returned future abandons any
    /// in-flight fetches.
    #[instrument(
        skip_all,
        fields(
            links = tracing::field::Empty,
            resolved = tracing::field::Empty,
            total_lines = tracing::field::Empty,
        )
    )]
    pub async fn handle_message(&self, text: &str) -> MessageResult {
        let (links, truncated) = self.collect_links(text);
        if links.is_empty() {
            return MessageResult {
                truncated,
                ..MessageResult::default()
            };
        }

        let span = Span::current();
        span.record("links", links.len());
        let start = Instant::now();

        let outcomes: Vec<Result<(DisplayEntry, u32), LinkError>> = stream::iter(&links)
            .map(|link| self.resolve_link(link))
            .buffered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut result = MessageResult {
            truncated,
            ..MessageResult::default()
        };
        for (link, outcome) in links.iter().zip(outcomes) {
            match outcome {
                Ok((entry, lines)) => {
                    result.total_lines += u64::from(lines);
                    result.msg_list.push(entry);
                }
                Err(e) => debug!(
                    source = %link.source_key(),
                    reason = e.code(),
                    error = %e,
                    "Dropped link"
                ),
            }
        }

        span.record("resolved", result.msg_list.len());
        span.record("total_lines", result.total_lines);
        debug!(
            elapsed_ms = format!("{:.1}", start.elapsed().as_secs_f64() * 1000.0),
            "Message resolved"
        );
        result
    }

    /// Parse candidates in order, keeping at most `max_links` valid links.
    /// The flag is set when a further valid link was left out.
    fn collect_links(&self, text: &str) -> (Vec<ParsedLink>, bool) {
        let candidates = if self.config.skip_code_spans {
            scan_outside_code(text)
        } else {
            scan(text)
        };

        let mut links = Vec::new();
        for candidate in candidates {
            match parse_link(candidate.text) {
                Ok(link) if links.len() < self.config.max_links => links.push(link),
                Ok(_) => {
                    debug!(max_links = self.config.max_links, "Link cap reached");
                    return (links, true);
                }
                Err(e) => debug!(
                    offset = candidate.offset,
                    reason = e.code(),
                    "Ignored candidate"
                ),
            }
        }
        (links, false)
    }

    async fn resolve_link(&self, link: &ParsedLink) -> Result<(DisplayEntry, u32), LinkError> {
        let content = self.fetcher.fetch(&link.source_key()).await?;
        let extracted = extract_range(&content, link.start_line, link.end_line, self.config.dedent)?;
        let lines = extracted.line_count();
        let entry = DisplayEntry {
            extension: file_extension(&content.path),
            to_display: extracted.text,
        };
        Ok((entry, lines))
    }
}
