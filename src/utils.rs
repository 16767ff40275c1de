/// Encoding, hashing and ASCII-safe rendering helpers
pub mod encoding {
    use base64::{Engine as _, engine::general_purpose};

    /// Line width of the canonical base64 form hashed by `mmh3_hash32`
    const BASE64_LINE_WIDTH: usize = 76;

    /// Base64 encode
    pub fn base64_encode(data: &[u8]) -> String {
        general_purpose::STANDARD.encode(data)
    }

    /// Base64 decode
    pub fn base64_decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
        general_purpose::STANDARD.decode(data)
    }

    /// Hex encode
    pub fn hex_encode(data: &[u8]) -> String {
        hex::encode(data)
    }

    /// Hex decode
    pub fn hex_decode(data: &str) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(data)
    }

    /// Lowercase hex MD5 digest
    pub fn md5_hex(data: &[u8]) -> String {
        format!("{:x}", md5::compute(data))
    }

    /// Standard base64, wrapped every 76 characters, always newline-terminated.
    ///
    /// mmh3 signatures are computed over exactly this layout.
    pub fn standard_base64(data: &[u8]) -> Vec<u8> {
        let encoded = base64_encode(data);
        let mut out = Vec::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_WIDTH + 1);
        for (i, ch) in encoded.bytes().enumerate() {
            out.push(ch);
            if (i + 1) % BASE64_LINE_WIDTH == 0 {
                out.push(b'\n');
            }
        }
        out.push(b'\n');
        out
    }

    /// MurmurHash3 (32-bit, seed 0) of the canonical base64 form, as unsigned decimal
    pub fn mmh3_hash32(data: &[u8]) -> String {
        let canonical = standard_base64(data);
        let hash = murmur3::murmur3_32(&mut canonical.as_slice(), 0).unwrap_or(0);
        hash.to_string()
    }

    /// Render text with every non-printable or non-ASCII character escaped
    pub fn ascii_encode(s: &str) -> String {
        s.trim().escape_default().to_string()
    }

    /// Byte-level variant of `ascii_encode` for content that may not be UTF-8
    pub fn ascii_encode_bytes(data: &[u8]) -> String {
        data.iter()
            .flat_map(|b| std::ascii::escape_default(*b))
            .map(char::from)
            .collect()
    }
}

/// Small text helpers shared by the parsers
pub mod text {
    use regex::Regex;

    /// First match of `reg` in `s`.
    ///
    /// Returns the trimmed first capture group, or an empty string when the
    /// pattern has no groups.
    pub fn match_one(reg: &Regex, s: &str) -> Option<String> {
        let caps = reg.captures(s)?;
        Some(
            caps.get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        )
    }

    /// Longest prefix of `s` holding at most `max_chars` characters
    pub fn char_prefix(s: &str, max_chars: usize) -> &str {
        match s.char_indices().nth(max_chars) {
            Some((idx, _)) => &s[..idx],
            None => s,
        }
    }
}
