//! Transform language for obfuscated configuration values.
//!
//! A value is either a literal string or `operator|payload`, where the
//! operator is one of `b64de`, `b64en`, `unhex`, `hex` or `md5`. Only the
//! first `|` separates; the payload may contain further pipes.
//!
//! Two entry points:
//! - [`decode`] is strict: a malformed base64/hex payload is an error.
//! - [`decode_lenient`] never fails: anything it cannot transform comes back
//!   as the literal input. Regex sources in extractor definitions go through
//!   this path so obfuscated and plain patterns can be mixed freely.

use crate::utils::encoding;
use crate::Result;
use log::debug;
use std::fmt;

/// Operator of a transform expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOp {
    DecodeBase64,
    EncodeBase64,
    DecodeHex,
    EncodeHex,
    HashMd5,
    Identity,
}

impl TransformOp {
    /// Operator for a keyword, `None` if the keyword is not recognised
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "b64de" => Some(TransformOp::DecodeBase64),
            "b64en" => Some(TransformOp::EncodeBase64),
            "unhex" => Some(TransformOp::DecodeHex),
            "hex" => Some(TransformOp::EncodeHex),
            "md5" => Some(TransformOp::HashMd5),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            TransformOp::DecodeBase64 => "b64de",
            TransformOp::EncodeBase64 => "b64en",
            TransformOp::DecodeHex => "unhex",
            TransformOp::EncodeHex => "hex",
            TransformOp::HashMd5 => "md5",
            TransformOp::Identity => "",
        }
    }
}

/// A parsed `operator|payload` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformExpression {
    pub op: TransformOp,
    pub payload: String,
}

impl TransformExpression {
    /// Parse a single value.
    ///
    /// No `|`, a leading `|`, or an unknown operator all yield `Identity`
    /// with the whole input as payload.
    pub fn parse(input: &str) -> Self {
        if let Some(idx) = input.find('|') {
            if idx > 0 {
                if let Some(op) = TransformOp::from_keyword(&input[..idx]) {
                    return Self {
                        op,
                        payload: input[idx + 1..].to_string(),
                    };
                }
            }
        }

        Self {
            op: TransformOp::Identity,
            payload: input.to_string(),
        }
    }

    /// Whether evaluating this expression changes the input
    pub fn is_identity(&self) -> bool {
        self.op == TransformOp::Identity
    }

    /// Evaluate the expression, failing on malformed base64/hex payloads
    pub fn evaluate(&self) -> Result<Vec<u8>> {
        let bytes = match self.op {
            TransformOp::DecodeBase64 => encoding::base64_decode(&self.payload)?,
            TransformOp::EncodeBase64 => encoding::base64_encode(self.payload.as_bytes()).into_bytes(),
            TransformOp::DecodeHex => encoding::hex_decode(&self.payload)?,
            TransformOp::EncodeHex => encoding::hex_encode(self.payload.as_bytes()).into_bytes(),
            TransformOp::HashMd5 => encoding::md5_hex(self.payload.as_bytes()).into_bytes(),
            TransformOp::Identity => self.payload.as_bytes().to_vec(),
        };
        Ok(bytes)
    }
}

impl fmt::Display for TransformExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_identity() {
            write!(f, "{}", self.payload)
        } else {
            write!(f, "{}|{}", self.op.keyword(), self.payload)
        }
    }
}

/// Output of a transform together with whether an operator was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub bytes: Vec<u8>,
    pub applied: bool,
}

impl Decoded {
    fn literal(input: &str) -> Self {
        Self {
            bytes: input.as_bytes().to_vec(),
            applied: false,
        }
    }

    /// Lossy UTF-8 view of the output
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Strict decode: malformed payloads under a recognised operator are errors
pub fn decode(input: &str) -> Result<Decoded> {
    let expr = TransformExpression::parse(input);
    if expr.is_identity() {
        return Ok(Decoded::literal(input));
    }

    Ok(Decoded {
        bytes: expr.evaluate()?,
        applied: true,
    })
}

/// Best-effort decode: any failure falls back to the literal input
pub fn decode_lenient(input: &str) -> Decoded {
    match decode(input) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!("Treating '{}' literally: {}", input, e);
            Decoded::literal(input)
        }
    }
}

/// Strict decode rendered as a string
pub fn decode_to_string(input: &str) -> Result<String> {
    decode(input).map(|d| d.to_string_lossy())
}
