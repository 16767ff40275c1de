use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParseError>;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Pattern {index} of extractor '{extractor}' failed to compile ({pattern}): {reason}")]
    PatternCompile {
        extractor: String,
        index: usize,
        pattern: String,
        reason: String,
    },

    #[error("No header/body separator found in response")]
    MissingHeaderSeparator,

    #[error("Charset conversion failed for {charset}")]
    CharsetConversion { charset: String },

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
