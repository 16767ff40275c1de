use crate::extract::{ExtractorConfig, ExtractorSet};
use crate::fingerprint::{SimilarityThreshold, DEFAULT_SIMHASH_THRESHOLD};
use crate::response::DEFAULT_META_SNIFF_LEN;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub extractors: Vec<ExtractorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub simhash_threshold: u32,
    pub unique_extract: bool,
    pub max_response_size: usize, // bytes, applied by the caller before normalizing
    pub meta_sniff_len: usize,    // bytes of body searched for <meta charset>
    pub workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            simhash_threshold: DEFAULT_SIMHASH_THRESHOLD,
            unique_extract: false,
            max_response_size: 4 * 1024 * 1024,
            meta_sniff_len: DEFAULT_META_SNIFF_LEN,
            workers: 16,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn save_to_file(&self, path: &str) -> crate::Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| crate::ParseError::InvalidInput(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn threshold(&self) -> SimilarityThreshold {
        SimilarityThreshold(self.engine.simhash_threshold)
    }

    /// Compile the configured extractors; bad patterns are logged, not fatal
    pub fn compile_extractors(&self) -> ExtractorSet {
        ExtractorSet::compile(self.extractors.iter().cloned())
    }
}
