//! Field vocabulary
//!
//! The closed set of command fields this crate understands, the flags that
//! spell each of them, and the values a caller can assign.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::command::tokenizer::{tokenize, Token};
use crate::command::CommandError;
use crate::types::config::{CacheType, PoolingMode};

/// A launch-command field addressable by the updater
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigField {
    ModelPath,
    Port,
    GpuLayers,
    Threads,
    ContextSize,
    BatchSize,
    UBatchSize,
    Keep,
    DefragThreshold,
    Mlock,
    Parallel,
    FlashAttention,
    ContBatching,
    NoMmap,
    TensorSplit,
    CacheTypeK,
    CacheTypeV,
    MmprojPath,
    Pooling,
    Embeddings,
    Jinja,
}

impl ConfigField {
    pub const ALL: [ConfigField; 21] = [
        ConfigField::ModelPath,
        ConfigField::Port,
        ConfigField::GpuLayers,
        ConfigField::Threads,
        ConfigField::ContextSize,
        ConfigField::BatchSize,
        ConfigField::UBatchSize,
        ConfigField::Keep,
        ConfigField::DefragThreshold,
        ConfigField::Mlock,
        ConfigField::Parallel,
        ConfigField::FlashAttention,
        ConfigField::ContBatching,
        ConfigField::NoMmap,
        ConfigField::TensorSplit,
        ConfigField::CacheTypeK,
        ConfigField::CacheTypeV,
        ConfigField::MmprojPath,
        ConfigField::Pooling,
        ConfigField::Embeddings,
        ConfigField::Jinja,
    ];

    /// Every spelling of the flag; the first entry is the one emitted
    pub fn flags(self) -> &'static [&'static str] {
        match self {
            ConfigField::ModelPath => &["-m", "--model"],
            ConfigField::Port => &["--port"],
            ConfigField::GpuLayers => &["--n-gpu-layers", "-ngl", "--gpu-layers"],
            ConfigField::Threads => &["--threads", "-t"],
            ConfigField::ContextSize => &["--ctx-size", "-c"],
            ConfigField::BatchSize => &["--batch-size", "-b"],
            ConfigField::UBatchSize => &["--ubatch-size", "-ub"],
            ConfigField::Keep => &["--keep"],
            ConfigField::DefragThreshold => &["--defrag-thold", "-dt"],
            ConfigField::Mlock => &["--mlock"],
            ConfigField::Parallel => &["--parallel", "-np"],
            ConfigField::FlashAttention => &["--flash-attn", "-fa"],
            ConfigField::ContBatching => &["--cont-batching", "-cb"],
            ConfigField::NoMmap => &["--no-mmap"],
            ConfigField::TensorSplit => &["--tensor-split", "-ts"],
            ConfigField::CacheTypeK => &["--cache-type-k", "-ctk"],
            ConfigField::CacheTypeV => &["--cache-type-v", "-ctv"],
            ConfigField::MmprojPath => &["--mmproj"],
            ConfigField::Pooling => &["--pooling"],
            ConfigField::Embeddings => &["--embeddings", "--embedding"],
            ConfigField::Jinja => &["--jinja"],
        }
    }

    /// Canonical flag spelling
    pub fn flag(self) -> &'static str {
        self.flags()[0]
    }

    pub fn matches(self, token: &str) -> bool {
        self.flags().contains(&token)
    }

    /// Look up the field a flag token belongs to
    pub fn from_flag(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.matches(token))
    }

    /// Switches are bare flags; every other field is a flag followed by a value
    pub fn is_switch(self) -> bool {
        match self {
            ConfigField::Mlock
            | ConfigField::FlashAttention
            | ConfigField::ContBatching
            | ConfigField::NoMmap
            | ConfigField::Embeddings
            | ConfigField::Jinja => true,
            ConfigField::ModelPath
            | ConfigField::Port
            | ConfigField::GpuLayers
            | ConfigField::Threads
            | ConfigField::ContextSize
            | ConfigField::BatchSize
            | ConfigField::UBatchSize
            | ConfigField::Keep
            | ConfigField::DefragThreshold
            | ConfigField::Parallel
            | ConfigField::TensorSplit
            | ConfigField::CacheTypeK
            | ConfigField::CacheTypeV
            | ConfigField::MmprojPath
            | ConfigField::Pooling => false,
        }
    }

    /// Path values are always written in double quotes
    pub fn is_path(self) -> bool {
        matches!(self, ConfigField::ModelPath | ConfigField::MmprojPath)
    }

    pub fn name(self) -> &'static str {
        match self {
            ConfigField::ModelPath => "model_path",
            ConfigField::Port => "port",
            ConfigField::GpuLayers => "gpu_layers",
            ConfigField::Threads => "threads",
            ConfigField::ContextSize => "context_size",
            ConfigField::BatchSize => "batch_size",
            ConfigField::UBatchSize => "ubatch_size",
            ConfigField::Keep => "keep",
            ConfigField::DefragThreshold => "defrag_threshold",
            ConfigField::Mlock => "mlock",
            ConfigField::Parallel => "parallel",
            ConfigField::FlashAttention => "flash_attention",
            ConfigField::ContBatching => "cont_batching",
            ConfigField::NoMmap => "no_mmap",
            ConfigField::TensorSplit => "tensor_split",
            ConfigField::CacheTypeK => "cache_type_k",
            ConfigField::CacheTypeV => "cache_type_v",
            ConfigField::MmprojPath => "mmproj_path",
            ConfigField::Pooling => "pooling",
            ConfigField::Embeddings => "embeddings",
            ConfigField::Jinja => "jinja",
        }
    }

    /// Render `value` as the token written after this field's flag
    pub(crate) fn render_value(self, value: &FieldValue) -> Result<String, CommandError> {
        if self.is_switch() {
            return Err(CommandError::ExpectedSwitch { field: self });
        }

        let text = match value {
            FieldValue::Bool(_) => return Err(CommandError::ExpectedValue { field: self }),
            FieldValue::Int(n) => n.to_string(),
            FieldValue::Float(x) => x.to_string(),
            FieldValue::Text(s) => s.trim().to_string(),
        };

        let inner = strip_quotes(&text);
        if inner.is_empty() {
            return Err(CommandError::InvalidValue {
                field: self,
                value: text,
            });
        }

        // a bare value must not read as a flag or split into several tokens
        let needs_quotes = self.is_path()
            || inner.chars().any(char::is_whitespace)
            || Token::new(inner).is_flag();

        let mut candidates = Vec::with_capacity(3);
        if !needs_quotes {
            candidates.push(text.clone());
        }
        candidates.push(format!("\"{}\"", inner));
        candidates.push(format!("'{}'", inner));

        candidates
            .into_iter()
            .find(|candidate| is_single_token(candidate))
            .ok_or(CommandError::InvalidValue {
                field: self,
                value: text,
            })
    }
}

/// True when `text` re-tokenizes as exactly itself and leaves no quote open
fn is_single_token(text: &str) -> bool {
    let tokens = tokenize(&format!("{} -", text));
    tokens.len() == 2 && tokens[0].as_str() == text
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigField {
    type Err = CommandError;

    /// Accepts `context_size`, `contextSize` or `ContextSize`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.name().replace('_', "") == wanted)
            .ok_or_else(|| CommandError::UnknownField(s.to_string()))
    }
}

/// The value without one pair of matching outer quotes
pub(crate) fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}

/// Wrap a value in double quotes, dropping any quotes it already carries
pub(crate) fn quote(value: &str) -> String {
    format!("\"{}\"", strip_quotes(value))
}

/// A value assigned to a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<u16> for FieldValue {
    fn from(value: u16) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<CacheType> for FieldValue {
    fn from(value: CacheType) -> Self {
        FieldValue::Text(value.as_str().to_string())
    }
}

impl From<PoolingMode> for FieldValue {
    fn from(value: PoolingMode) -> Self {
        FieldValue::Text(value.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_lookup_covers_aliases() {
        assert_eq!(ConfigField::from_flag("-ngl"), Some(ConfigField::GpuLayers));
        assert_eq!(ConfigField::from_flag("--model"), Some(ConfigField::ModelPath));
        assert_eq!(ConfigField::from_flag("-c"), Some(ConfigField::ContextSize));
        assert_eq!(ConfigField::from_flag("--embedding"), Some(ConfigField::Embeddings));
        assert_eq!(ConfigField::from_flag("--rope-scaling"), None);
    }

    #[test]
    fn test_flags_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for field in ConfigField::ALL {
            for flag in field.flags() {
                assert!(seen.insert(*flag), "duplicate flag {}", flag);
            }
        }
    }

    #[test]
    fn test_field_names_parse() {
        assert_eq!("contextSize".parse::<ConfigField>().unwrap(), ConfigField::ContextSize);
        assert_eq!("ubatch_size".parse::<ConfigField>().unwrap(), ConfigField::UBatchSize);
        assert_eq!("CacheTypeK".parse::<ConfigField>().unwrap(), ConfigField::CacheTypeK);
        assert!("temperature".parse::<ConfigField>().is_err());
        for field in ConfigField::ALL {
            assert_eq!(field.name().parse::<ConfigField>().unwrap(), field);
        }
    }

    #[test]
    fn test_render_value() {
        assert_eq!(
            ConfigField::ContextSize.render_value(&16384u32.into()).unwrap(),
            "16384"
        );
        assert_eq!(
            ConfigField::DefragThreshold.render_value(&0.1.into()).unwrap(),
            "0.1"
        );
        assert_eq!(
            ConfigField::ModelPath.render_value(&"/m/a.gguf".into()).unwrap(),
            "\"/m/a.gguf\""
        );
        assert_eq!(
            ConfigField::ModelPath.render_value(&"\"/m/a b.gguf\"".into()).unwrap(),
            "\"/m/a b.gguf\""
        );
        assert_eq!(
            ConfigField::CacheTypeK.render_value(&CacheType::Q8_0.into()).unwrap(),
            "q8_0"
        );
    }

    #[test]
    fn test_render_value_stays_one_token() {
        assert_eq!(
            ConfigField::TensorSplit.render_value(&"a\"b".into()).unwrap(),
            "'a\"b'"
        );
        assert_eq!(
            ConfigField::TensorSplit.render_value(&"it's".into()).unwrap(),
            "\"it's\""
        );
        assert_eq!(
            ConfigField::ContextSize.render_value(&"-abc".into()).unwrap(),
            "\"-abc\""
        );
        assert_eq!(ConfigField::Keep.render_value(&(-1).into()).unwrap(), "-1");
        assert!(matches!(
            ConfigField::TensorSplit.render_value(&"a\"b'c d".into()),
            Err(CommandError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_render_value_rejects_mismatches() {
        assert!(matches!(
            ConfigField::Mlock.render_value(&true.into()),
            Err(CommandError::ExpectedSwitch { .. })
        ));
        assert!(matches!(
            ConfigField::Port.render_value(&true.into()),
            Err(CommandError::ExpectedValue { .. })
        ));
        assert!(matches!(
            ConfigField::ModelPath.render_value(&"  ".into()),
            Err(CommandError::InvalidValue { .. })
        ));
    }
}
