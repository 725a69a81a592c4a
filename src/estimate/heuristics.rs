//! Heuristic rule tables
//!
//! Name-based estimates used when model metadata is unavailable. Each table
//! is ordered and the first matching rule wins.

use once_cell::sync::Lazy;
use regex::Regex;

/// `7b`, `1.5B`, `70b-` ... but not `7bit`
static PARAMETER_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)b(?:[^a-z]|$)").expect("parameter count pattern is valid")
});

/// Upper bound in billions of parameters -> layer count
pub const PARAMETER_LAYER_BUCKETS: &[(f64, u32)] = &[
    (1.0, 22),
    (3.0, 26),
    (7.0, 32),
    (13.0, 40),
    (30.0, 60),
    (70.0, 80),
];
pub const LARGEST_MODEL_LAYERS: u32 = 100;

/// Name keywords used when no parameter count can be read
pub const LAYER_KEYWORDS: &[(&str, u32)] = &[
    ("30b", 60),
    ("27b", 60),
    ("7b", 32),
    ("8b", 32),
    ("3b", 26),
    ("4b", 26),
    ("1b", 22),
    ("nano", 22),
];
pub const DEFAULT_LAYERS: u32 = 32;

/// File size strictly below the bound (GB) caps the layer estimate
pub const SIZE_LAYER_CAPS: &[(f64, u32)] = &[(1.0, 22), (4.0, 32), (8.0, 40), (15.0, 60)];

/// Quantization tag -> typical file size in GB, when the name has no parameter count
pub const QUANT_SIZE_KEYWORDS: &[(&str, f64)] = &[
    ("f16", 8.0),
    ("q8", 8.0),
    ("q6", 7.0),
    ("q5", 6.0),
    ("q4", 5.0),
    ("q3", 4.0),
    ("q2", 3.0),
];
pub const DEFAULT_SIZE_GB: f64 = 4.0;

/// Quantization tag -> GB per billion parameters
pub const QUANT_MULTIPLIERS: &[(&str, f64)] = &[
    ("f32", 4.0),
    ("bf16", 2.0),
    ("f16", 2.0),
    ("q8", 1.0),
    ("q6", 0.75),
    ("q5", 0.625),
    ("iq4", 0.45),
    ("q4", 0.5),
    ("iq3", 0.3125),
    ("q3", 0.375),
    ("iq2", 0.25),
    ("q2", 0.25),
    ("iq1", 0.125),
];
pub const DEFAULT_QUANT_MULTIPLIER: f64 = 0.5;
/// File structure overhead on top of the raw weights
pub const SIZE_OVERHEAD: f64 = 1.1;

/// Lower bound in GB of model size -> hidden dimension
pub const HIDDEN_DIM_BRACKETS: &[(f64, u32)] = &[(25.0, 8192), (12.0, 5120), (6.0, 4096), (2.0, 2560)];
pub const SMALLEST_HIDDEN_DIM: u32 = 2048;

/// Lower bound in billions of parameters -> architectural context window
pub const PARAMETER_CONTEXT_BUCKETS: &[(f64, u32)] = &[
    (70.0, 131072),
    (30.0, 65536),
    (13.0, 65536),
    (7.0, 131072),
    (3.0, 32768),
];
pub const SMALL_MODEL_CONTEXT: u32 = 16384;

/// Explicit context tags in model names
pub const CONTEXT_TAGS: &[(&str, u32)] = &[
    ("128k", 131072),
    ("64k", 65536),
    ("32k", 32768),
    ("16k", 16384),
    ("8k", 8192),
    ("4k", 4096),
];

pub const LONG_CONTEXT_KEYWORDS: &[&str] = &["long", "yarn", "extended"];
pub const LONG_CONTEXT_MIN: u32 = 131072;

/// Parameter count in billions read from a model name
pub fn parameter_count_billions(name: &str) -> Option<f64> {
    PARAMETER_COUNT
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

pub fn layers_for_parameters(billions: f64) -> u32 {
    PARAMETER_LAYER_BUCKETS
        .iter()
        .find(|(bound, _)| billions <= *bound)
        .map(|(_, layers)| *layers)
        .unwrap_or(LARGEST_MODEL_LAYERS)
}

pub fn keyword_layers(name: &str) -> u32 {
    let lower = name.to_lowercase();
    LAYER_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, layers)| *layers)
        .unwrap_or(DEFAULT_LAYERS)
}

pub fn size_layer_cap(size_gb: f64) -> Option<u32> {
    SIZE_LAYER_CAPS
        .iter()
        .find(|(bound, _)| size_gb < *bound)
        .map(|(_, cap)| *cap)
}

pub fn quant_size_gb(name: &str) -> Option<f64> {
    let lower = name.to_lowercase();
    QUANT_SIZE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, size)| *size)
}

pub fn quant_multiplier(name: &str) -> f64 {
    let lower = name.to_lowercase();
    QUANT_MULTIPLIERS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, multiplier)| *multiplier)
        .unwrap_or(DEFAULT_QUANT_MULTIPLIER)
}

pub fn hidden_dim_for_size(model_size_gb: f64) -> u32 {
    HIDDEN_DIM_BRACKETS
        .iter()
        .find(|(bound, _)| model_size_gb >= *bound)
        .map(|(_, dim)| *dim)
        .unwrap_or(SMALLEST_HIDDEN_DIM)
}

/// `tag` appears as its own number: `32k` matches `-32k-` but not `132k`
fn has_context_tag(lower: &str, tag: &str) -> bool {
    lower.match_indices(tag).any(|(start, _)| {
        let before = lower[..start].chars().next_back();
        let after = lower[start + tag.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

/// Architectural context window guessed from a model name
pub fn model_max_context(name: &str) -> u32 {
    let lower = name.to_lowercase();

    let mut context = parameter_count_billions(&lower)
        .and_then(|billions| {
            PARAMETER_CONTEXT_BUCKETS
                .iter()
                .find(|(bound, _)| billions >= *bound)
                .map(|(_, context)| *context)
        })
        .unwrap_or(SMALL_MODEL_CONTEXT);

    if let Some((_, tagged)) = CONTEXT_TAGS.iter().find(|(tag, _)| has_context_tag(&lower, tag)) {
        context = *tagged;
    }

    if LONG_CONTEXT_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
        context = context.max(LONG_CONTEXT_MIN);
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_count_extraction() {
        assert_eq!(parameter_count_billions("llama-7b-instruct.Q4_K_M.gguf"), Some(7.0));
        assert_eq!(parameter_count_billions("Qwen2.5-Coder-1.5B"), Some(1.5));
        assert_eq!(parameter_count_billions("mistral_70B_q4"), Some(70.0));
        assert_eq!(parameter_count_billions("qwen3-30b-a3b"), Some(30.0));
        assert_eq!(parameter_count_billions("model-8bit"), None);
        assert_eq!(parameter_count_billions("nomic-embed-text"), None);
    }

    #[test]
    fn test_layer_buckets() {
        assert_eq!(layers_for_parameters(0.5), 22);
        assert_eq!(layers_for_parameters(1.0), 22);
        assert_eq!(layers_for_parameters(3.0), 26);
        assert_eq!(layers_for_parameters(8.0), 40);
        assert_eq!(layers_for_parameters(14.0), 60);
        assert_eq!(layers_for_parameters(70.0), 80);
        assert_eq!(layers_for_parameters(405.0), 100);
    }

    #[test]
    fn test_keyword_layers() {
        assert_eq!(keyword_layers("gemma-27bit"), 60);
        assert_eq!(keyword_layers("phi-nano"), 22);
        assert_eq!(keyword_layers("mystery-model"), DEFAULT_LAYERS);
    }

    #[test]
    fn test_size_caps() {
        assert_eq!(size_layer_cap(0.5), Some(22));
        assert_eq!(size_layer_cap(3.9), Some(32));
        assert_eq!(size_layer_cap(4.0), Some(40));
        assert_eq!(size_layer_cap(14.0), Some(60));
        assert_eq!(size_layer_cap(15.0), None);
    }

    #[test]
    fn test_quant_tables() {
        assert_eq!(quant_size_gb("model.Q4_K_M.gguf"), Some(5.0));
        assert_eq!(quant_size_gb("model-F16.gguf"), Some(8.0));
        assert_eq!(quant_size_gb("model.gguf"), None);
        assert_eq!(quant_multiplier("x.IQ4_XS.gguf"), 0.45);
        assert_eq!(quant_multiplier("x.Q8_0.gguf"), 1.0);
        assert_eq!(quant_multiplier("x.gguf"), DEFAULT_QUANT_MULTIPLIER);
    }

    #[test]
    fn test_hidden_dim_brackets() {
        assert_eq!(hidden_dim_for_size(40.0), 8192);
        assert_eq!(hidden_dim_for_size(12.0), 5120);
        assert_eq!(hidden_dim_for_size(7.0), 4096);
        assert_eq!(hidden_dim_for_size(2.0), 2560);
        assert_eq!(hidden_dim_for_size(0.4), 2048);
    }

    #[test]
    fn test_model_max_context() {
        assert_eq!(model_max_context("llama-3.3-70b"), 131072);
        assert_eq!(model_max_context("qwen3-32b"), 65536);
        assert_eq!(model_max_context("mistral-7b"), 131072);
        assert_eq!(model_max_context("phi-3.8b"), 32768);
        assert_eq!(model_max_context("gemma-2b"), 16384);
        assert_eq!(model_max_context("unknown"), 16384);
    }

    #[test]
    fn test_context_tags_and_keywords() {
        assert_eq!(model_max_context("phi-3-mini-4k-instruct"), 4096);
        assert_eq!(model_max_context("mistral-7b-32k"), 32768);
        assert_eq!(model_max_context("model-128k"), 131072);
        assert_eq!(model_max_context("model-132k"), 16384);
        assert_eq!(model_max_context("phi-3-mini-4k-long"), 131072);
        assert_eq!(model_max_context("qwen-1.5b-yarn"), 131072);
    }
}
