//! Line permalink parsing.
//!
//! Each supported host has its own decomposition rule. A URL that does not
//! fit one of them exactly is rejected: a missed link is preferable to
//! posting an unrelated snippet.
//!
//! ## Accepted shapes
//!
//! - **GitHub**: `github.com/{owner}/{repo}/(blob|blame)/{ref}/{path}#L{a}[-L{b}]`,
//!   column suffixes (`#L3C5-L9C2`) are accepted and ignored
//! - **GitLab**: `gitlab.com/{namespace}/{repo}/-/(blob|blame)/{ref}/{path}#L{a}[-{b}]`,
//!   also without the `/-/` separator
//! - **Gist**: `gist.github.com/{user}/{id}[/{revision}]#file-{slug}-L{a}[-L{b}]`

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use url::Url;

use crate::error::LinkError;

/// Code hosts we know how to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    GitHub,
    GitLab,
    Gist,
}

impl HostKind {
    /// Match a URL authority (`host[:port]`, any case) against known hosts.
    pub fn from_host(authority: &str) -> Option<Self> {
        let host = authority.rsplit('@').next().unwrap_or(authority);
        let host = host.split(':').next().unwrap_or(host).to_ascii_lowercase();
        match host.as_str() {
            "github.com" | "www.github.com" => Some(HostKind::GitHub),
            "gitlab.com" | "www.gitlab.com" => Some(HostKind::GitLab),
            "gist.github.com" => Some(HostKind::Gist),
            _ => None,
        }
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostKind::GitHub => "github",
            HostKind::GitLab => "gitlab",
            HostKind::Gist => "gist",
        };
        f.write_str(name)
    }
}

/// A validated line permalink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLink {
    pub host: HostKind,
    /// Owner, or `group/subgroup` namespace on GitLab, or gist user.
    pub owner: String,
    /// Repository name, or gist id.
    pub repo: String,
    /// Commit SHA, branch or tag. Empty for a gist without a revision.
    pub ref_name: String,
    /// Repository-relative path (still percent-encoded), or gist file slug.
    pub path: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// Identity of the file a link points at, used as the fetch cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub host: HostKind,
    pub owner: String,
    pub repo: String,
    pub ref_name: String,
    pub path: String,
}

impl ParsedLink {
    /// Number of lines requested by the anchor.
    pub fn requested_lines(&self) -> u32 {
        self.end_line - self.start_line + 1
    }

    pub fn source_key(&self) -> SourceKey {
        SourceKey {
            host: self.host,
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            ref_name: self.ref_name.clone(),
            path: self.path.clone(),
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}@{}:{}",
            self.host, self.owner, self.repo, self.ref_name, self.path
        )
    }
}

/// Parse a candidate URL into a [`ParsedLink`].
pub fn parse_link(candidate: &str) -> Result<ParsedLink, LinkError> {
    reject_dot_segments(candidate)?;

    let url = Url::parse(candidate).map_err(|e| LinkError::malformed(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LinkError::malformed("unsupported scheme"));
    }

    let host = url
        .host_str()
        .and_then(HostKind::from_host)
        .ok_or_else(|| LinkError::malformed("unrecognised host"))?;

    let fragment = url
        .fragment()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| LinkError::malformed("no line anchor"))?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.collect())
        .unwrap_or_default();
    if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(LinkError::malformed("empty path segment"));
    }

    match host {
        HostKind::GitHub => parse_github(&segments, fragment),
        HostKind::GitLab => parse_gitlab(&segments, fragment),
        HostKind::Gist => parse_gist(&segments, fragment),
    }
}

/// The url crate silently resolves `.` and `..`, which would turn a bogus
/// link into a different valid-looking one. Refuse them before parsing.
fn reject_dot_segments(candidate: &str) -> Result<(), LinkError> {
    let path = candidate
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(candidate);
    let path = path.split(['#', '?']).next().unwrap_or(path);

    let has_dot_segment = path.split('/').skip(1).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    });
    if has_dot_segment {
        return Err(LinkError::malformed("dot segment in path"));
    }
    Ok(())
}

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("identifier regex is valid"))
}

fn hex_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-fA-F]+$").expect("hex regex is valid"))
}

fn gist_anchor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^file-(.+?)-L([^-]*)(?:-(.*))?$").expect("gist anchor regex is valid")
    })
}

fn check_identifier(value: &str, what: &str) -> Result<(), LinkError> {
    if identifier_regex().is_match(value) {
        Ok(())
    } else {
        Err(LinkError::malformed(format!("invalid {what}")))
    }
}

fn is_file_view(segment: &str) -> bool {
    matches!(segment, "blob" | "blame")
}

/// `{owner}/{repo}/(blob|blame)/{ref}/{path...}`
fn parse_github(segments: &[&str], fragment: &str) -> Result<ParsedLink, LinkError> {
    let [owner, repo, view, ref_name, path @ ..] = segments else {
        return Err(LinkError::malformed("not a file view"));
    };
    if !is_file_view(view) || path.is_empty() {
        return Err(LinkError::malformed("not a file view"));
    }
    check_identifier(owner, "owner")?;
    check_identifier(repo, "repository")?;

    let (start_line, end_line) = parse_anchor(fragment, RangeStyle::RepeatedL)?;

    Ok(ParsedLink {
        host: HostKind::GitHub,
        owner: owner.to_string(),
        repo: repo.to_string(),
        ref_name: ref_name.to_string(),
        path: path.join("/"),
        start_line,
        end_line,
    })
}

/// `{namespace...}/{repo}/-/(blob|blame)/{ref}/{path...}`, `/-/` optional.
fn parse_gitlab(segments: &[&str], fragment: &str) -> Result<ParsedLink, LinkError> {
    let (project_end, view_at) = match segments.iter().position(|s| *s == "-") {
        Some(dash) => (dash, dash + 1),
        None => {
            let view = segments
                .iter()
                .skip(2)
                .position(|s| is_file_view(s))
                .map(|i| i + 2)
                .ok_or_else(|| LinkError::malformed("not a file view"))?;
            (view, view)
        }
    };

    if project_end < 2 {
        return Err(LinkError::malformed("missing namespace"));
    }
    let project = &segments[..project_end];
    let rest = &segments[view_at..];
    let [view, ref_name, path @ ..] = rest else {
        return Err(LinkError::malformed("not a file view"));
    };
    if !is_file_view(view) || path.is_empty() {
        return Err(LinkError::malformed("not a file view"));
    }
    for segment in project {
        check_identifier(segment, "namespace")?;
    }

    let (start_line, end_line) = parse_anchor(fragment, RangeStyle::BareEnd)?;
    let (namespace, repo) = project.split_at(project.len() - 1);

    Ok(ParsedLink {
        host: HostKind::GitLab,
        owner: namespace.join("/"),
        repo: repo[0].to_string(),
        ref_name: ref_name.to_string(),
        path: path.join("/"),
        start_line,
        end_line,
    })
}

/// `{user}/{id}[/{revision}]#file-{slug}-L{a}[-L{b}]`
fn parse_gist(segments: &[&str], fragment: &str) -> Result<ParsedLink, LinkError> {
    let (user, id, revision) = match segments {
        [user, id] => (*user, *id, ""),
        [user, id, revision] => (*user, *id, *revision),
        _ => return Err(LinkError::malformed("not a gist")),
    };
    check_identifier(user, "gist user")?;
    if !hex_regex().is_match(id) || (!revision.is_empty() && !hex_regex().is_match(revision)) {
        return Err(LinkError::malformed("invalid gist id"));
    }

    let caps = gist_anchor_regex()
        .captures(fragment)
        .ok_or_else(|| LinkError::malformed("no line anchor"))?;
    let slug = &caps[1];
    let start = &caps[2];
    let end = caps.get(3).map(|m| m.as_str());
    let anchor = match end {
        Some(end) => format!("L{start}-{end}"),
        None => format!("L{start}"),
    };
    let (start_line, end_line) = parse_anchor(&anchor, RangeStyle::RepeatedL)?;

    Ok(ParsedLink {
        host: HostKind::Gist,
        owner: user.to_string(),
        repo: id.to_ascii_lowercase(),
        ref_name: revision.to_ascii_lowercase(),
        path: slug.to_string(),
        start_line,
        end_line,
    })
}

/// How the end of a range is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeStyle {
    /// `L10-L25`, with optional `C<col>` suffixes.
    RepeatedL,
    /// `L10-25`.
    BareEnd,
}

fn parse_anchor(fragment: &str, style: RangeStyle) -> Result<(u32, u32), LinkError> {
    let anchor = fragment
        .strip_prefix('L')
        .ok_or_else(|| LinkError::malformed("no line anchor"))?;

    let (start, end) = match anchor.split_once('-') {
        Some((start, end)) => (start, Some(end)),
        None => (anchor, None),
    };

    let start_line = parse_line_number(start, style)?;
    let end_line = match end {
        None => start_line,
        Some(end) => {
            let end = match style {
                RangeStyle::RepeatedL => end
                    .strip_prefix('L')
                    .ok_or_else(|| LinkError::invalid_range("end missing L prefix"))?,
                RangeStyle::BareEnd => end,
            };
            parse_line_number(end, style)?
        }
    };

    if end_line < start_line {
        return Err(LinkError::invalid_range(format!(
            "end {end_line} before start {start_line}"
        )));
    }
    Ok((start_line, end_line))
}

fn parse_line_number(raw: &str, style: RangeStyle) -> Result<u32, LinkError> {
    let digits = match style {
        RangeStyle::RepeatedL => strip_column(raw)?,
        RangeStyle::BareEnd => raw,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LinkError::invalid_range(format!("not a line number: {raw:?}")));
    }
    let line: u32 = digits
        .parse()
        .map_err(|_| LinkError::invalid_range(format!("line number too large: {raw}")))?;
    if line == 0 {
        return Err(LinkError::invalid_range("line numbers start at 1"));
    }
    Ok(line)
}

/// `12C4` -> `12`; the column must itself be numeric.
fn strip_column(raw: &str) -> Result<&str, LinkError> {
    match raw.split_once('C') {
        Some((line, col)) if !col.is_empty() && col.bytes().all(|b| b.is_ascii_digit()) => {
            Ok(line)
        }
        Some(_) => Err(LinkError::invalid_range(format!("bad column in {raw:?}"))),
        None => Ok(raw),
    }
}
