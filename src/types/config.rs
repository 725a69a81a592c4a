//! Configuration types
//!
//! The structured form of a launch command. Every field is optional: a field
//! that was not present in the source tokens stays `None`, defaults belong to
//! whoever renders the record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A decoded flag value that may not have parsed.
///
/// `Invalid` keeps the raw text so a malformed value survives a decode and
/// re-encode unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parsed<T> {
    Valid(T),
    Invalid(String),
}

impl<T: FromStr> Parsed<T> {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<T>() {
            Ok(value) => Parsed::Valid(value),
            Err(_) => Parsed::Invalid(raw.to_string()),
        }
    }
}

impl<T> Parsed<T> {
    pub fn valid(&self) -> Option<&T> {
        match self {
            Parsed::Valid(value) => Some(value),
            Parsed::Invalid(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Parsed::Valid(_))
    }
}

impl<T: Copy> Parsed<T> {
    pub fn get(&self) -> Option<T> {
        self.valid().copied()
    }
}

impl<T> From<T> for Parsed<T> {
    fn from(value: T) -> Self {
        Parsed::Valid(value)
    }
}

impl<T: fmt::Display> fmt::Display for Parsed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parsed::Valid(value) => value.fmt(f),
            Parsed::Invalid(raw) => f.write_str(raw),
        }
    }
}

/// KV-cache element type accepted by `--cache-type-k` / `--cache-type-v`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    F16,
    F32,
    Q8_0,
    Q4_0,
}

impl CacheType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::F16 => "f16",
            CacheType::F32 => "f32",
            CacheType::Q8_0 => "q8_0",
            CacheType::Q4_0 => "q4_0",
        }
    }

    /// Storage cost of one cached element
    pub fn bytes_per_element(&self) -> f64 {
        match self {
            CacheType::F32 => 4.0,
            CacheType::F16 => 2.0,
            CacheType::Q8_0 => 1.0,
            CacheType::Q4_0 => 0.5,
        }
    }
}

impl FromStr for CacheType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "f16" => Ok(CacheType::F16),
            "f32" => Ok(CacheType::F32),
            "q8_0" => Ok(CacheType::Q8_0),
            "q4_0" => Ok(CacheType::Q4_0),
            other => Err(format!("unknown cache type: {}", other)),
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedding pooling strategy (`--pooling`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolingMode {
    None,
    Mean,
    Cls,
    Last,
    Rank,
}

impl PoolingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolingMode::None => "none",
            PoolingMode::Mean => "mean",
            PoolingMode::Cls => "cls",
            PoolingMode::Last => "last",
            PoolingMode::Rank => "rank",
        }
    }
}

impl FromStr for PoolingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(PoolingMode::None),
            "mean" => Ok(PoolingMode::Mean),
            "cls" => Ok(PoolingMode::Cls),
            "last" => Ok(PoolingMode::Last),
            "rank" => Ok(PoolingMode::Rank),
            other => Err(format!("unknown pooling mode: {}", other)),
        }
    }
}

impl fmt::Display for PoolingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured launch configuration for one model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Display name, unique within a model set
    pub name: String,
    /// Server binary (first token of the command, unquoted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_path: Option<String>,
    /// Path to the GGUF file (`--model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Parsed<u16>>,
    /// Layers offloaded to the GPU (`--n-gpu-layers`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_layers: Option<Parsed<u32>>,
    /// Estimated transformer layer count (never decoded from the command)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_layers: Option<u32>,
    /// Estimated model size in GB (never decoded from the command)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_size_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<Parsed<u32>>,
    /// Requested context window (`--ctx-size`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_size: Option<Parsed<u32>>,
    /// Context length read from model metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_context_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<Parsed<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ubatch_size: Option<Parsed<u32>>,
    /// Tokens kept from the initial prompt (`--keep`, -1 keeps all)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep: Option<Parsed<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defrag_threshold: Option<Parsed<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mlock: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<Parsed<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash_attention: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cont_batching: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_mmap: Option<bool>,
    /// Per-device split ratios, e.g. `3,1`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tensor_split: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_type_k: Option<Parsed<CacheType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_type_v: Option<Parsed<CacheType>>,
    /// Multimodal projector path (`--mmproj`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mmproj_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pooling: Option<Parsed<PoolingMode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<bool>,
    /// Chat template processing (`--jinja`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jinja: Option<bool>,
    /// Idle seconds before the proxy unloads the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Upstream URL the proxy forwards to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Derived: embeddings flag, pooling mode, or "embed" in the name
    #[serde(default)]
    pub is_embedding: bool,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Recompute fields that are derived from other fields
    pub fn refresh_derived(&mut self) {
        self.is_embedding = self.embeddings == Some(true)
            || self.pooling.is_some()
            || self.name.to_lowercase().contains("embed");
    }

    /// Names of fields whose value was present but could not be parsed
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        let checks: [(&'static str, bool); 11] = [
            ("port", self.port.as_ref().is_some_and(|v| !v.is_valid())),
            ("gpu_layers", self.gpu_layers.as_ref().is_some_and(|v| !v.is_valid())),
            ("threads", self.threads.as_ref().is_some_and(|v| !v.is_valid())),
            ("context_size", self.context_size.as_ref().is_some_and(|v| !v.is_valid())),
            ("batch_size", self.batch_size.as_ref().is_some_and(|v| !v.is_valid())),
            ("ubatch_size", self.ubatch_size.as_ref().is_some_and(|v| !v.is_valid())),
            ("keep", self.keep.as_ref().is_some_and(|v| !v.is_valid())),
            ("defrag_threshold", self.defrag_threshold.as_ref().is_some_and(|v| !v.is_valid())),
            ("parallel", self.parallel.as_ref().is_some_and(|v| !v.is_valid())),
            ("cache_type_k", self.cache_type_k.as_ref().is_some_and(|v| !v.is_valid())),
            ("cache_type_v", self.cache_type_v.as_ref().is_some_and(|v| !v.is_valid())),
        ];
        let mut invalid: Vec<&'static str> = checks
            .iter()
            .filter(|(_, bad)| *bad)
            .map(|(name, _)| *name)
            .collect();
        if self.pooling.as_ref().is_some_and(|v| !v.is_valid()) {
            invalid.push("pooling");
        }
        invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_empty() {
        let config = ModelConfig::new("llama");
        assert_eq!(config.name, "llama");
        assert!(config.port.is_none());
        assert!(config.context_size.is_none());
        assert!(config.mlock.is_none());
        assert!(!config.is_embedding);
    }

    #[test]
    fn test_parsed_keeps_raw_text() {
        let ok: Parsed<u32> = Parsed::parse("4096");
        assert_eq!(ok.get(), Some(4096));

        let bad: Parsed<u32> = Parsed::parse("abc");
        assert_eq!(bad, Parsed::Invalid("abc".to_string()));
        assert_eq!(bad.to_string(), "abc");
        assert!(bad.get().is_none());
    }

    #[test]
    fn test_cache_type_parsing() {
        assert_eq!("Q8_0".parse::<CacheType>(), Ok(CacheType::Q8_0));
        assert_eq!("f16".parse::<CacheType>(), Ok(CacheType::F16));
        assert!("q5_1".parse::<CacheType>().is_err());
        assert_eq!(CacheType::Q4_0.bytes_per_element(), 0.5);
    }

    #[test]
    fn test_embedding_derivation() {
        let mut config = ModelConfig::new("nomic-Embed-text");
        config.refresh_derived();
        assert!(config.is_embedding);

        let mut config = ModelConfig::new("qwen");
        config.pooling = Some(Parsed::Valid(PoolingMode::Cls));
        config.refresh_derived();
        assert!(config.is_embedding);

        let mut config = ModelConfig::new("qwen");
        config.embeddings = Some(false);
        config.refresh_derived();
        assert!(!config.is_embedding);
    }

    #[test]
    fn test_invalid_fields() {
        let mut config = ModelConfig::new("m");
        config.context_size = Some(Parsed::parse("abc"));
        config.port = Some(Parsed::parse("8080"));
        assert_eq!(config.invalid_fields(), vec!["context_size"]);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = ModelConfig::new("llama");
        config.context_size = Some(Parsed::Valid(8192));
        config.cache_type_k = Some(Parsed::Invalid("q9".to_string()));

        let json = serde_json::to_string(&config).expect("Failed to serialize");
        assert!(!json.contains("port"));
        let deserialized: ModelConfig = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(config, deserialized);
    }
}
