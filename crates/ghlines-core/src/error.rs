//! Per-link failure reasons.
//!
//! Every stage of the pipeline returns `Result<_, LinkError>`. None of these
//! are fatal for a message: the resolver drops the failing link and keeps
//! going with the rest.

/// Why a single candidate link did not produce a display entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("not a recognised line permalink: {0}")]
    MalformedLink(String),

    #[error("invalid line range: {0}")]
    InvalidRange(String),

    #[error("file not found upstream")]
    NotFound,

    #[error("line {start} is past the end of the file ({total} lines)")]
    OutOfRange { start: u32, total: usize },

    #[error("content is not displayable text: {0}")]
    UnsupportedContent(String),

    #[error("fetch timed out")]
    FetchTimeout,

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

/// Failure to set up a [`crate::Resolver`]. Per-message processing never
/// returns this.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl LinkError {
    /// Short stable code used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            LinkError::MalformedLink(_) => "malformed_link",
            LinkError::InvalidRange(_) => "invalid_range",
            LinkError::NotFound => "not_found",
            LinkError::OutOfRange { .. } => "out_of_range",
            LinkError::UnsupportedContent(_) => "unsupported_content",
            LinkError::FetchTimeout => "fetch_timeout",
            LinkError::NetworkFailure(_) => "network_failure",
            LinkError::PayloadTooLarge { .. } => "payload_too_large",
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        LinkError::MalformedLink(reason.into())
    }

    pub(crate) fn invalid_range(reason: impl Into<String>) -> Self {
        LinkError::InvalidRange(reason.into())
    }
}
