//! Regex-based artifact extraction from response bodies.
//!
//! Extractors are defined as [`ExtractorConfig`] (plain data, usually loaded
//! from configuration) and turned into an immutable [`Extractor`] by
//! [`ExtractorConfig::compile`]. Compiled extractors hold no interior
//! mutability and can be shared across worker threads behind an `Arc`.

use crate::dsl;
use crate::utils::{encoding, text};
use crate::ParseError;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

/// Longest single match rendered in full by [`Extracted::summary`]
pub const SUMMARY_MAX_CHARS: usize = 30;

/// Extractor definition as it appears in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub name: String,
    /// Regex sources, each optionally wrapped in `operator|payload` form
    #[serde(default, alias = "regex")]
    pub regexps: Vec<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl ExtractorConfig {
    pub fn new<S: Into<String>>(name: S, regexps: Vec<String>) -> Self {
        Self {
            name: name.into(),
            regexps,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Compile every pattern source.
    ///
    /// Sources go through the lenient transform decoder first. A pattern that
    /// fails to compile is logged and recorded in [`Extractor::failures`]; the
    /// rest of the extractor stays usable.
    pub fn compile(self) -> Extractor {
        let mut patterns = Vec::with_capacity(self.regexps.len());
        let mut failures = Vec::new();

        for (index, source) in self.regexps.iter().enumerate() {
            match compile_pattern(source) {
                Ok(re) => patterns.push(re),
                Err(reason) => {
                    let err = ParseError::PatternCompile {
                        extractor: self.name.clone(),
                        index,
                        pattern: source.clone(),
                        reason,
                    };
                    warn!("{}", err);
                    failures.push(err);
                }
            }
        }

        debug!(
            "Compiled extractor '{}': {} of {} patterns usable",
            self.name,
            patterns.len(),
            self.regexps.len()
        );

        Extractor {
            name: self.name,
            tags: self.tags,
            sources: self.regexps,
            patterns,
            failures,
        }
    }
}

fn compile_pattern(source: &str) -> std::result::Result<Regex, String> {
    let decoded = dsl::decode_lenient(source);
    let pattern: Cow<'_, str> = if decoded.applied {
        Cow::Owned(
            String::from_utf8(decoded.bytes)
                .map_err(|_| "decoded pattern is not valid UTF-8".to_string())?,
        )
    } else {
        Cow::Borrowed(source)
    };

    Regex::new(&pattern).map_err(|e| e.to_string())
}

/// A compiled, read-only extractor
#[derive(Debug)]
pub struct Extractor {
    name: String,
    tags: BTreeSet<String>,
    sources: Vec<String>,
    patterns: Vec<Regex>,
    failures: Vec<ParseError>,
}

impl Extractor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Pattern sources as configured, before decoding
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    /// Patterns that failed to compile
    pub fn failures(&self) -> &[ParseError] {
        &self.failures
    }

    /// Run every pattern over `body`.
    ///
    /// In ordinary mode matches are listed pattern by pattern, each in scan
    /// order. In unique mode repeated strings are kept once, at their first
    /// occurrence.
    pub fn extract(&self, body: &str, unique: bool) -> Extracted {
        let all = self
            .patterns
            .iter()
            .flat_map(|re| re.find_iter(body).map(|m| m.as_str()));

        let matches = if unique {
            let mut seen = HashSet::new();
            all.filter(|m| seen.insert(*m)).map(str::to_string).collect()
        } else {
            all.map(str::to_string).collect()
        };

        Extracted {
            name: self.name.clone(),
            matches,
        }
    }
}

/// Matches of one extractor against one body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extracted {
    pub name: String,
    #[serde(rename = "extract_result")]
    pub matches: Vec<String>,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// One-line rendering for console output.
    ///
    /// A single short match is shown escaped, a single long one is cut to
    /// its first 30 characters with the byte length appended, and several
    /// matches are only counted.
    pub fn summary(&self) -> String {
        match self.matches.as_slice() {
            [only] if only.chars().count() > SUMMARY_MAX_CHARS => format!(
                "{}:{} ... {} bytes",
                self.name,
                encoding::ascii_encode(text::char_prefix(only, SUMMARY_MAX_CHARS)),
                only.len()
            ),
            [only] => format!("{}:{}", self.name, encoding::ascii_encode(only)),
            many => format!("{}:{} items", self.name, many.len()),
        }
    }
}

impl fmt::Display for Extracted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Extraction results of one response, one entry per extractor name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extracteds(Vec<Extracted>);

impl Extracteds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Extracted> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Extracted> {
        self.0.iter().find(|e| e.name == name)
    }

    /// Add `other`, appending to an existing entry of the same name.
    ///
    /// With `unique` set, matches already present under that name are skipped.
    pub fn merge(&mut self, other: Extracted, unique: bool) {
        let Some(existing) = self.0.iter_mut().find(|e| e.name == other.name) else {
            self.0.push(other);
            return;
        };

        if unique {
            let mut seen: HashSet<String> = existing.matches.iter().cloned().collect();
            existing
                .matches
                .extend(other.matches.into_iter().filter(|m| seen.insert(m.clone())));
        } else {
            existing.matches.extend(other.matches);
        }
    }

    /// Drop entries without matches
    pub fn non_empty(self) -> Self {
        Self(self.0.into_iter().filter(|e| !e.is_empty()).collect())
    }

    pub fn into_vec(self) -> Vec<Extracted> {
        self.0
    }
}

impl From<Vec<Extracted>> for Extracteds {
    fn from(v: Vec<Extracted>) -> Self {
        Self(v)
    }
}

impl IntoIterator for Extracteds {
    type Item = Extracted;
    type IntoIter = std::vec::IntoIter<Extracted>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Extracteds {
    type Item = &'a Extracted;
    type IntoIter = std::slice::Iter<'a, Extracted>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Extracteds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in &self.0 {
            write!(f, "[ {} ]", e.summary())?;
        }
        f.write_str(" ")
    }
}

/// Compiled extractors of a scanning session, in configuration order
#[derive(Debug, Clone, Default)]
pub struct ExtractorSet {
    extractors: Vec<Arc<Extractor>>,
}

impl ExtractorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile<I>(configs: I) -> Self
    where
        I: IntoIterator<Item = ExtractorConfig>,
    {
        Self {
            extractors: configs.into_iter().map(|c| Arc::new(c.compile())).collect(),
        }
    }

    pub fn push(&mut self, extractor: Extractor) {
        self.extractors.push(Arc::new(extractor));
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extractor> {
        self.extractors.iter().map(|e| e.as_ref())
    }

    pub fn get(&self, name: &str) -> Option<&Extractor> {
        self.iter().find(|e| e.name() == name)
    }

    /// Subset of extractors carrying `tag`, sharing the compiled patterns
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            extractors: self
                .extractors
                .iter()
                .filter(|e| e.has_tag(tag))
                .cloned()
                .collect(),
        }
    }

    /// Every compile failure across the set
    pub fn failures(&self) -> impl Iterator<Item = &ParseError> {
        self.iter().flat_map(|e| e.failures().iter())
    }

    /// Apply every extractor to `body`; an empty body yields no results
    pub fn extract_all(&self, body: &str, unique: bool) -> Extracteds {
        if body.is_empty() {
            return Extracteds::new();
        }

        let mut out = Extracteds::new();
        for extractor in self.iter() {
            out.merge(extractor.extract(body, unique), unique);
        }
        out
    }
}

impl FromIterator<ExtractorConfig> for ExtractorSet {
    fn from_iter<T: IntoIterator<Item = ExtractorConfig>>(iter: T) -> Self {
        Self::compile(iter)
    }
}
