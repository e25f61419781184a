//! Decoding fetched bytes into displayable text.

use crate::error::LinkError;

/// How many leading bytes are inspected for NUL when sniffing binaries.
const BINARY_SNIFF_LEN: usize = 8000;

/// Text encoding a payload was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

/// A fetched file, decoded and ready for line extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    /// File path used for the extension hint.
    pub path: String,
    pub text: String,
    pub encoding: TextEncoding,
    pub total_lines: usize,
}

impl FetchedContent {
    /// Decode `bytes` using the server-declared `charset` when there is one,
    /// otherwise by sniffing a byte order mark. Payloads that look binary or
    /// fail to decode are rejected.
    pub fn decode(
        path: impl Into<String>,
        bytes: &[u8],
        charset: Option<&str>,
    ) -> Result<Self, LinkError> {
        let (text, encoding) = decode_text(bytes, charset)?;
        Ok(Self::from_text(path, text, encoding))
    }

    /// Wrap already-decoded text. `\r\n` and bare `\r` line endings become
    /// `\n`.
    pub fn from_text(path: impl Into<String>, text: String, encoding: TextEncoding) -> Self {
        let text = normalize_line_endings(text);
        let total_lines = text.lines().count();
        Self {
            path: path.into(),
            text,
            encoding,
            total_lines,
        }
    }
}

fn normalize_line_endings(text: String) -> String {
    if !text.contains('\r') {
        return text;
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn decode_text(bytes: &[u8], charset: Option<&str>) -> Result<(String, TextEncoding), LinkError> {
    if let Some(encoding) = sniff_bom(bytes) {
        return decode_as(bytes, encoding);
    }

    let declared = charset.map(|c| c.trim().trim_matches('"').to_ascii_lowercase());
    let encoding = match declared.as_deref() {
        Some("utf-16le") => TextEncoding::Utf16Le,
        Some("utf-16be" | "utf-16") => TextEncoding::Utf16Be,
        Some("iso-8859-1" | "latin1" | "latin-1") => TextEncoding::Latin1,
        _ => TextEncoding::Utf8,
    };

    if matches!(encoding, TextEncoding::Utf8 | TextEncoding::Latin1) && looks_binary(bytes) {
        return Err(LinkError::UnsupportedContent("binary payload".into()));
    }
    decode_as(bytes, encoding)
}

fn sniff_bom(bytes: &[u8]) -> Option<TextEncoding> {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => Some(TextEncoding::Utf8),
        [0xFF, 0xFE, ..] => Some(TextEncoding::Utf16Le),
        [0xFE, 0xFF, ..] => Some(TextEncoding::Utf16Be),
        _ => None,
    }
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

fn decode_as(bytes: &[u8], encoding: TextEncoding) -> Result<(String, TextEncoding), LinkError> {
    let text = match encoding {
        TextEncoding::Utf8 => {
            let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
            String::from_utf8(body.to_vec())
                .map_err(|_| LinkError::UnsupportedContent("invalid utf-8".into()))?
        }
        TextEncoding::Utf16Le | TextEncoding::Utf16Be => decode_utf16(bytes, encoding)?,
        TextEncoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
    };
    Ok((text, encoding))
}

fn decode_utf16(bytes: &[u8], encoding: TextEncoding) -> Result<String, LinkError> {
    let body = match (encoding, bytes) {
        (TextEncoding::Utf16Le, [0xFF, 0xFE, rest @ ..]) => rest,
        (TextEncoding::Utf16Be, [0xFE, 0xFF, rest @ ..]) => rest,
        _ => bytes,
    };
    if body.len() % 2 != 0 {
        return Err(LinkError::UnsupportedContent("truncated utf-16".into()));
    }
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| match encoding {
            TextEncoding::Utf16Le => u16::from_le_bytes([pair[0], pair[1]]),
            _ => u16::from_be_bytes([pair[0], pair[1]]),
        })
        .collect();
    String::from_utf16(&units).map_err(|_| LinkError::UnsupportedContent("invalid utf-16".into()))
}
