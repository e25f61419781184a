//! GitHub Lines core.
//!
//! Detects permalinks to source lines in chat message text, fetches the
//! referenced files from the code host and returns the requested lines,
//! ready for a chat client to display.
//!
//! ## Supported links
//!
//! - **GitHub**: `github.com/{owner}/{repo}/blob/{ref}/{path}#L10-L25`
//! - **GitLab**: `gitlab.com/{namespace}/{repo}/-/blob/{ref}/{path}#L10-25`
//! - **Gist**: `gist.github.com/{user}/{id}#file-{name}-L3-L5`
//!
//! ## Example
//!
//! ```no_run
//! use ghlines_core::{Resolver, ResolverConfig};
//!
//! # async fn run() -> Result<(), ghlines_core::ResolverError> {
//! let resolver = Resolver::new(ResolverConfig::default())?;
//! let result = resolver
//!     .handle_message("look: https://github.com/rust-lang/rust/blob/master/README.md#L1-L3")
//!     .await;
//! for entry in &result.msg_list {
//!     println!("```{}\n{}\n```", entry.extension, entry.to_display);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Enforcing a limit on `total_lines`, escaping and chat-platform size
//! limits are left to the caller.

pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod link;
pub mod resolve;
pub mod scan;

pub use config::{Endpoints, ResolverConfig};
pub use content::{FetchedContent, TextEncoding};
pub use error::{LinkError, ResolverError};
pub use fetch::{HttpFetcher, RawFetcher, RawPayload};
pub use link::{parse_link, HostKind, ParsedLink, SourceKey};
pub use resolve::{DisplayEntry, MessageResult, Resolver};
