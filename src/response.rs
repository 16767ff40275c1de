//! Raw HTTP response normalization.
//!
//! A raw response (status line, CRLF-delimited headers, blank line, body) is
//! split into header and body, its charset is detected from the
//! `Content-Type` header or an HTML `<meta>` tag, and non-UTF-8 content is
//! re-encoded so every later stage works on UTF-8.

use crate::fingerprint::FingerprintSet;
use crate::utils::{encoding, text};
use crate::{ParseError, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;

/// Bytes of raw content used as a label when a page has no `<title>`
pub const TITLE_FALLBACK_LEN: usize = 13;

/// Default number of body bytes searched for a `<meta charset>` declaration
pub const DEFAULT_META_SNIFF_LEN: usize = 1024;

const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

static HEADER_CHARSET_RE: Lazy<BytesRegex> = Lazy::new(|| {
    BytesRegex::new(r#"(?im-u)^content-type:[^\r\n]*?charset\s*=\s*["']?([a-z0-9_.:\-]+)"#)
        .unwrap()
});

static META_CHARSET_RE: Lazy<BytesRegex> = Lazy::new(|| {
    BytesRegex::new(r#"(?i-u)<meta[^>]*?charset\s*=\s*["']?([a-z0-9_.:\-]+)"#)
        .unwrap()
});

static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>")
        .unwrap()
});

static SERVER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^Server:[ \t]*([\x20-\x7e]+)")
        .unwrap()
});

static POWERED_BY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^X-Powered-By:[ \t]*([\x20-\x7e]+)")
        .unwrap()
});

static SESSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(JSESSIONID|ASP\.NET_SessionId|PHPSESSID)=")
        .unwrap()
});

/// Split raw content at the first blank line into `(header, body)`
pub fn split_http_raw(content: &[u8]) -> Option<(&[u8], &[u8])> {
    let idx = content
        .windows(HEADER_SEPARATOR.len())
        .position(|w| w == HEADER_SEPARATOR)?;
    Some((&content[..idx], &content[idx + HEADER_SEPARATOR.len()..]))
}

/// Declared charset, header first, then `<meta>` within the first `sniff_len` body bytes
pub fn match_charset(header: &[u8], body: &[u8], sniff_len: usize) -> Option<String> {
    let capture = |re: &BytesRegex, hay: &[u8]| {
        re.captures(hay)
            .and_then(|c| c.get(1))
            .map(|m| String::from_utf8_lossy(m.as_bytes()).to_ascii_lowercase())
    };

    if let Some(charset) = capture(&HEADER_CHARSET_RE, header) {
        return Some(charset);
    }
    let window = &body[..body.len().min(sniff_len)];
    capture(&META_CHARSET_RE, window)
}

/// Re-encode `content` from `charset` to UTF-8.
///
/// Unknown labels, UTF-8 itself, and content the codec cannot decode
/// cleanly are all returned unchanged.
pub fn to_utf8<'a>(charset: &str, content: &'a [u8]) -> Cow<'a, [u8]> {
    let Some(enc) = encoding_rs::Encoding::for_label(charset.trim().as_bytes()) else {
        debug!("Unrecognized charset '{}', leaving content as-is", charset);
        return Cow::Borrowed(content);
    };
    if enc == encoding_rs::UTF_8 {
        return Cow::Borrowed(content);
    }

    let (decoded, had_errors) = enc.decode_without_bom_handling(content);
    if had_errors {
        let err = ParseError::CharsetConversion { charset: enc.name().to_string() };
        warn!("{}, passing {} bytes through unchanged", err, content.len());
        return Cow::Borrowed(content);
    }
    Cow::Owned(decoded.into_owned().into_bytes())
}

/// Whether `charset` keeps ASCII bytes as-is; header bytes are only
/// re-encoded under such charsets. Unknown labels count as compatible.
fn is_ascii_compatible(charset: &str) -> bool {
    encoding_rs::Encoding::for_label(charset.trim().as_bytes())
        .map_or(true, |enc| enc.is_ascii_compatible())
}

/// Header, body and raw bytes of one response, UTF-8 where the charset was known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedContent {
    body: Vec<u8>,
    header: Vec<u8>,
    raw: Vec<u8>,
    detected_charset: Option<String>,
}

impl NormalizedContent {
    pub fn normalize(raw: Vec<u8>) -> Result<Self> {
        Self::normalize_with(raw, DEFAULT_META_SNIFF_LEN)
    }

    pub fn normalize_with(raw: Vec<u8>, meta_sniff_len: usize) -> Result<Self> {
        Self::try_split(raw, meta_sniff_len).map_err(|_| ParseError::MissingHeaderSeparator)
    }

    /// Hands `raw` back untouched when it has no header/body separator
    fn try_split(raw: Vec<u8>, meta_sniff_len: usize) -> std::result::Result<Self, Vec<u8>> {
        let Some((header, body)) = split_http_raw(&raw) else {
            return Err(raw);
        };
        let detected_charset = match_charset(header, body, meta_sniff_len);

        let (header, body, converted) = match detected_charset.as_deref() {
            Some(charset) => {
                debug!("Detected charset {}", charset);
                let header = if is_ascii_compatible(charset) {
                    to_utf8(charset, header)
                } else {
                    Cow::Borrowed(header)
                };
                let body = to_utf8(charset, body);
                let converted = matches!(header, Cow::Owned(_)) || matches!(body, Cow::Owned(_));
                (header.into_owned(), body.into_owned(), converted)
            }
            None => (header.to_vec(), body.to_vec(), false),
        };

        let raw = if converted {
            [header.as_slice(), HEADER_SEPARATOR, body.as_slice()].concat()
        } else {
            raw
        };

        Ok(Self { body, header, raw, detected_charset })
    }

    /// Content that could not be split; only `raw` is populated
    pub fn opaque(raw: Vec<u8>) -> Self {
        Self {
            body: Vec::new(),
            header: Vec::new(),
            raw,
            detected_charset: None,
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn detected_charset(&self) -> Option<&str> {
        self.detected_charset.as_deref()
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn header_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.header)
    }

    pub fn raw_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }

    /// `(body, header, raw)`
    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        (self.body, self.header, self.raw)
    }
}

pub fn normalize(raw: Vec<u8>) -> Result<NormalizedContent> {
    NormalizedContent::normalize(raw)
}

/// Contents of the first `<title>` element, trimmed; `None` when absent or blank
pub fn match_title(content: &str) -> Option<String> {
    text::match_one(&TITLE_RE, content).filter(|t| !t.is_empty())
}

/// Short ASCII-safe label from the first bytes of a page without a title
pub fn fallback_label(raw: &[u8]) -> String {
    encoding::ascii_encode_bytes(&raw[..raw.len().min(TITLE_FALLBACK_LEN)])
}

/// Backend language from `X-Powered-By`, else from the session cookie name
pub fn match_language(header: &str) -> Option<String> {
    if let Some(powered) = text::match_one(&POWERED_BY_RE, header) {
        return Some(powered);
    }

    let session = text::match_one(&SESSION_RE, header)?;
    let language = match session.to_ascii_uppercase().as_str() {
        "JSESSIONID" => "JAVA",
        "ASP.NET_SESSIONID" => "ASP.NET",
        "PHPSESSID" => "PHP",
        _ => return None,
    };
    Some(language.to_string())
}

pub fn match_server(header: &str) -> Option<String> {
    text::match_one(&SERVER_RE, header).filter(|s| !s.is_empty())
}

/// A normalized response with the descriptive fields reporting layers show
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    #[serde(skip)]
    content: NormalizedContent,
    #[serde(skip)]
    opaque: bool,
    pub title: String,
    #[serde(skip)]
    pub has_title: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
}

impl Response {
    pub fn from_raw(raw: Vec<u8>) -> Self {
        Self::from_raw_with(raw, DEFAULT_META_SNIFF_LEN)
    }

    /// Build a response record; unsplittable input is kept as opaque content
    pub fn from_raw_with(raw: Vec<u8>, meta_sniff_len: usize) -> Self {
        let (content, opaque) = match NormalizedContent::try_split(raw, meta_sniff_len) {
            Ok(content) => (content, false),
            Err(raw) => {
                debug!("{}; treating {} bytes as opaque", ParseError::MissingHeaderSeparator, raw.len());
                (NormalizedContent::opaque(raw), true)
            }
        };

        let (title, has_title) = match match_title(&content.raw_text()) {
            Some(title) => (title, true),
            None => (fallback_label(content.raw()), false),
        };

        let (server, language) = {
            let header_text = content.header_text();
            (match_server(&header_text), match_language(&header_text))
        };
        let charset = content.detected_charset().map(str::to_string);

        Self {
            content,
            opaque,
            title,
            has_title,
            server,
            language,
            charset,
        }
    }

    pub fn content(&self) -> &NormalizedContent {
        &self.content
    }

    pub fn into_content(self) -> NormalizedContent {
        self.content
    }

    /// True when no header/body separator was found
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn fingerprints(&self) -> FingerprintSet {
        FingerprintSet::from_content(&self.content)
    }
}
