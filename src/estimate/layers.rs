//! Layer and size estimation
//!
//! Fallback estimates of transformer depth and file size for models whose
//! metadata has not been read.

use crate::estimate::heuristics::{
    keyword_layers, layers_for_parameters, parameter_count_billions, quant_multiplier,
    quant_size_gb, size_layer_cap, DEFAULT_SIZE_GB, SIZE_OVERHEAD,
};

/// Estimate the total layer count of a model from its name
///
/// A parameter count in the name (`7b`, `1.5B`) picks a bucket; otherwise a
/// keyword table is consulted. A known file size only ever lowers the result.
pub fn estimate_total_layers(name: &str, size_gb: Option<f64>) -> u32 {
    let layers = match parameter_count_billions(name) {
        Some(billions) => layers_for_parameters(billions),
        None => keyword_layers(name),
    };

    match size_gb.filter(|size| size.is_finite() && *size > 0.0).and_then(size_layer_cap) {
        Some(cap) => layers.min(cap),
        None => layers,
    }
}

/// Last path component, without quotes
fn file_name(path_or_name: &str) -> &str {
    let trimmed = path_or_name.trim().trim_matches(|c: char| c == '"' || c == '\'');
    trimmed
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(trimmed)
}

/// Estimate a model's file size in GB from its path or name
///
/// A parameter count wins over a bare quantization tag: `7b ... Q8_0` is
/// sized from 7 billion parameters at the Q8 width.
pub fn estimate_size_gb(path_or_name: &str) -> f64 {
    let name = file_name(path_or_name);

    if let Some(billions) = parameter_count_billions(name) {
        return billions * quant_multiplier(name) * SIZE_OVERHEAD;
    }

    quant_size_gb(name).unwrap_or(DEFAULT_SIZE_GB)
}
