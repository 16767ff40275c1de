//! Exact and near-duplicate fingerprints of normalized responses.
//!
//! Every response gets an MD5 digest and a 64-bit simhash for its body,
//! header and raw bytes, plus an mmh3 signature of the body. Simhashes are
//! compared by Hamming distance; what counts as "near" is the caller's call
//! through [`SimilarityThreshold`].

use crate::response::NormalizedContent;
use crate::utils::encoding;
use crate::{ParseError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Default maximum distance for two simhashes to be considered near-duplicates
pub const DEFAULT_SIMHASH_THRESHOLD: u32 = 8;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Word-level features of a document: token -> occurrence count
pub type FeatureSet<'a> = BTreeMap<&'a [u8], u64>;

/// 64-bit locality-sensitive fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Simhash(u64);

impl Simhash {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Number of differing bits, always within `0..=64`
    pub fn distance(&self, other: &Simhash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

impl fmt::Display for Simhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl FromStr for Simhash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        u64::from_str_radix(s.trim(), 16)
            .map(Simhash)
            .map_err(|e| ParseError::InvalidFingerprint(format!("'{}': {}", s, e)))
    }
}

impl Serialize for Simhash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Simhash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Split `data` into maximal runs of non-whitespace bytes and count them
pub fn word_features(data: &[u8]) -> FeatureSet<'_> {
    let mut features = FeatureSet::new();
    for token in data.split(|b| b.is_ascii_whitespace()).filter(|t| !t.is_empty()) {
        *features.entry(token).or_insert(0) += 1;
    }
    features
}

/// Simhash of an explicit feature multiset.
///
/// Bit `i` is set iff the summed weight of features whose hash has bit `i`
/// set exceeds the summed weight of those that do not.
pub fn simhash_features(features: &FeatureSet<'_>) -> Simhash {
    let mut votes = [0i64; 64];
    for (token, count) in features {
        let hash = fnv1a64(token);
        let weight = *count as i64;
        for (bit, vote) in votes.iter_mut().enumerate() {
            if (hash >> bit) & 1 == 1 {
                *vote += weight;
            } else {
                *vote -= weight;
            }
        }
    }

    let mut out = 0u64;
    for (bit, vote) in votes.iter().enumerate() {
        if *vote > 0 {
            out |= 1u64 << bit;
        }
    }
    Simhash(out)
}

pub fn simhash(data: &[u8]) -> Simhash {
    simhash_features(&word_features(data))
}

fn fnv1a64(input: &[u8]) -> u64 {
    let mut h = FNV_OFFSET_BASIS;
    for b in input {
        h ^= *b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Hamming distance between two simhashes
pub fn distance(a: Simhash, b: Simhash) -> u32 {
    a.distance(&b)
}

/// Hamming distance between two hex-encoded simhashes
pub fn distance_hex(a: &str, b: &str) -> Result<u32> {
    let a: Simhash = a.parse()?;
    let b: Simhash = b.parse()?;
    Ok(a.distance(&b))
}

/// Maximum distance at which two fingerprints are treated as the same page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityThreshold(pub u32);

impl SimilarityThreshold {
    pub fn is_near_duplicate(&self, distance: u32) -> bool {
        distance <= self.0
    }
}

impl Default for SimilarityThreshold {
    fn default() -> Self {
        SimilarityThreshold(DEFAULT_SIMHASH_THRESHOLD)
    }
}

/// Digests and simhashes of one response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FingerprintSet {
    pub body_md5: String,
    pub header_md5: String,
    pub raw_md5: String,
    pub body_simhash: Simhash,
    pub header_simhash: Simhash,
    pub raw_simhash: Simhash,
    pub body_mmh3: String,
}

impl FingerprintSet {
    pub fn from_content(content: &NormalizedContent) -> Self {
        Self::from_parts(content.body(), content.header(), content.raw())
    }

    fn from_parts(body: &[u8], header: &[u8], raw: &[u8]) -> Self {
        Self {
            body_md5: encoding::md5_hex(body),
            header_md5: encoding::md5_hex(header),
            raw_md5: encoding::md5_hex(raw),
            body_simhash: simhash(body),
            header_simhash: simhash(header),
            raw_simhash: simhash(raw),
            body_mmh3: encoding::mmh3_hash32(body),
        }
    }

    /// Simhash distances of body, header and raw against `other`
    pub fn compare(&self, other: &FingerprintSet) -> Distances {
        Distances {
            body: self.body_simhash.distance(&other.body_simhash),
            header: self.header_simhash.distance(&other.header_simhash),
            raw: self.raw_simhash.distance(&other.raw_simhash),
        }
    }

    /// Byte-identical bodies
    pub fn same_body(&self, other: &FingerprintSet) -> bool {
        self.body_md5 == other.body_md5
    }
}

pub fn fingerprint(content: &NormalizedContent) -> FingerprintSet {
    FingerprintSet::from_content(content)
}

/// Per-section simhash distances between two responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distances {
    pub body: u32,
    pub header: u32,
    pub raw: u32,
}

impl Distances {
    /// Body-based verdict; headers carry dates and cookies that always drift
    pub fn is_near_duplicate(&self, threshold: SimilarityThreshold) -> bool {
        threshold.is_near_duplicate(self.body)
    }
}
