//! Line range extraction.

use crate::content::FetchedContent;
use crate::error::LinkError;

/// The lines actually displayed for one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub start_line: u32,
    /// Last displayed line, after clamping to the end of the file.
    pub end_line: u32,
}

impl Extracted {
    pub fn line_count(&self) -> u32 {
        self.end_line - self.start_line + 1
    }
}

/// Slice `[start, end]` (1-based, inclusive) out of `content`.
///
/// A start past the end of the file is an error; an end past it is clamped
/// to the last line. Lines are joined with `\n` and no trailing newline.
pub fn extract_range(
    content: &FetchedContent,
    start: u32,
    end: u32,
    dedent: bool,
) -> Result<Extracted, LinkError> {
    let total = content.total_lines;
    let start_idx = usize::try_from(start).unwrap_or(usize::MAX);
    if start == 0 || start_idx > total {
        return Err(LinkError::OutOfRange { start, total });
    }
    let end_idx = usize::try_from(end).unwrap_or(usize::MAX).min(total);

    let mut lines: Vec<&str> = content
        .text
        .lines()
        .skip(start_idx - 1)
        .take(end_idx - start_idx + 1)
        .collect();

    if dedent {
        strip_common_indent(&mut lines);
    }

    Ok(Extracted {
        text: lines.join("\n"),
        start_line: start,
        // end_idx <= end, which is a u32
        end_line: u32::try_from(end_idx).unwrap_or(end),
    })
}

/// Remove the leading whitespace shared by every non-blank line.
fn strip_common_indent(lines: &mut [&str]) {
    let mut common: Option<&str> = None;
    for line in lines.iter().copied().filter(|l| !l.trim().is_empty()) {
        let indent = &line[..line.len() - line.trim_start().len()];
        common = Some(match common {
            None => indent,
            Some(prev) => common_prefix(prev, indent),
        });
    }

    let Some(prefix) = common.filter(|p| !p.is_empty()) else {
        return;
    };
    for line in lines.iter_mut() {
        let current: &str = *line;
        *line = current
            .strip_prefix(prefix)
            .unwrap_or_else(|| current.trim_start());
    }
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map(|((i, c), _)| i + c.len_utf8())
        .unwrap_or(0);
    &a[..len]
}

/// Lower-cased final dot-segment of the file name, or empty.
pub fn file_extension(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}
