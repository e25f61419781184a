//! Candidate URL detection in message text.
//!
//! The scanner only answers "does this look like a URL on a code host we
//! know about". Whether it is a usable line permalink is decided by
//! [`crate::link::parse_link`].

use regex::{Match, Regex};
use std::ops::Range;
use std::sync::OnceLock;

use crate::link::HostKind;

/// A candidate URL and its byte offset in the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub text: &'a str,
    pub offset: usize,
}

fn scheme_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)https?://").expect("scheme regex is valid"))
}

/// Characters that can never be part of a candidate URL.
fn is_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '<' | '>' | '"' | '\'' | '`' | '|' | '\\' | '{' | '}' | '^')
}

/// Punctuation that commonly trails a URL in prose.
fn is_trailing_punct(c: char) -> bool {
    matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')' | ']' | '*' | '_' | '~')
}

/// Lazy iterator over candidate URLs, left to right.
///
/// Every byte of the text is examined a bounded number of times, however
/// the URLs in it are glued together.
pub struct Candidates<'a> {
    text: &'a str,
    /// Scheme match found while bounding the previous candidate. The outer
    /// `None` means no search has run yet.
    lookahead: Option<Option<Match<'a>>>,
    code_spans: Vec<Range<usize>>,
    /// First code span that can still contain a later candidate.
    span_idx: usize,
}

impl<'a> Candidates<'a> {
    fn new(text: &'a str, code_spans: Vec<Range<usize>>) -> Self {
        Self {
            text,
            lookahead: None,
            code_spans,
            span_idx: 0,
        }
    }

    /// Offsets are queried in increasing order, so spans wholly before
    /// `offset` are never needed again.
    fn in_code_span(&mut self, offset: usize) -> bool {
        while self
            .code_spans
            .get(self.span_idx)
            .is_some_and(|span| span.end <= offset)
        {
            self.span_idx += 1;
        }
        self.code_spans
            .get(self.span_idx)
            .is_some_and(|span| span.contains(&offset))
    }
}

impl<'a> Iterator for Candidates<'a> {
    type Item = Candidate<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let re = scheme_regex();
        loop {
            let scheme = match self.lookahead.take() {
                Some(found) => found?,
                None => re.find_at(self.text, 0)?,
            };
            let start = scheme.start();

            // Two URLs glued together without whitespace are two candidates,
            // so the boundary search never runs past the next scheme.
            let next = re.find_at(self.text, scheme.end());
            self.lookahead = Some(next);
            let window_end = next.map_or(self.text.len(), |m| m.start());
            let window = &self.text[scheme.end()..window_end];
            let end = scheme.end() + window.find(is_boundary).unwrap_or(window.len());

            if self.in_code_span(start) {
                continue;
            }

            let raw = self.text[start..end].trim_end_matches(is_trailing_punct);
            if has_known_host(raw, scheme.len()) {
                return Some(Candidate {
                    text: raw,
                    offset: start,
                });
            }
        }
    }
}

/// `raw` must carry a known host followed by a non-empty path.
fn has_known_host(raw: &str, scheme_len: usize) -> bool {
    let after_scheme = &raw[scheme_len..];
    let Some((authority, path)) = after_scheme.split_once('/') else {
        return false;
    };
    !path.is_empty() && HostKind::from_host(authority).is_some()
}

/// Scan `text` for candidate code-host URLs.
pub fn scan(text: &str) -> Candidates<'_> {
    Candidates::new(text, Vec::new())
}

/// Like [`scan`], but ignores URLs inside markdown code fences and inline
/// code spans.
pub fn scan_outside_code(text: &str) -> Candidates<'_> {
    Candidates::new(text, code_spans(text))
}

/// Byte ranges covered by fenced blocks (```` ``` ````) and inline code
/// (`` ` `` or ```` `` ````). An opener with no matching closer is literal.
fn code_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }

        let run = bytes[i..].iter().take_while(|&&b| b == b'`').count();
        let fence = if run >= 3 { "```" } else { &"``"[..run] };
        let body_start = i + fence.len();

        match find_closing(text, body_start, fence) {
            Some(close) => {
                let end = close + fence.len();
                spans.push(i..end);
                i = end;
            }
            None => i += run,
        }
    }

    spans
}

fn find_closing(text: &str, from: usize, fence: &str) -> Option<usize> {
    let mut search = from;
    while let Some(found) = text[search..].find(fence) {
        let at = search + found;
        // An inline single backtick must not match inside a longer run.
        let run_end = at + text[at..].bytes().take_while(|&b| b == b'`').count();
        if fence.len() >= 3 || run_end - at == fence.len() {
            return Some(at);
        }
        search = run_end;
    }
    None
}
