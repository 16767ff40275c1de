//! Rparsers - response fingerprinting and extraction engine
//!
//! This library is the content-processing core shared by the Rscan family of
//! reconnaissance tools. For every scanned target it:
//!
//! - normalizes the raw HTTP response into header, body and raw bytes,
//!   re-encoding declared non-UTF-8 charsets ([`response`]);
//! - derives exact digests and 64-bit simhashes used to suppress soft-404
//!   and other look-alike pages during brute-forcing ([`fingerprint`]);
//! - pulls tokens, versions and secrets out of bodies with named regex sets
//!   whose sources may be obfuscated with a small transform language
//!   ([`extract`], [`dsl`]).
//!
//! All engine operations are synchronous and free of shared mutable state;
//! a compiled [`ExtractorSet`] can be shared by any number of workers.

pub mod cli;
pub mod config;
pub mod display;
pub mod dsl;
pub mod error;
pub mod extract;
pub mod fingerprint;
pub mod response;
pub mod utils;

pub use error::{ParseError, Result};
pub use extract::{Extracted, Extracteds, Extractor, ExtractorConfig, ExtractorSet};
pub use fingerprint::{Distances, FingerprintSet, SimilarityThreshold, Simhash};
pub use response::{NormalizedContent, Response};
