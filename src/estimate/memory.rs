//! GPU memory model
//!
//! Closed-form estimates of the GPU memory taken by offloaded weights and by
//! the KV cache. Layers are assumed to cost the same, and the hidden
//! dimension comes from a size bracket rather than the model architecture.

use crate::estimate::heuristics::hidden_dim_for_size;
use crate::types::config::CacheType;

pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Share of the layers resident on the GPU
///
/// Counts above the total (`-ngl 99`) mean full offload.
pub fn offload_ratio(gpu_layers: u32, total_layers: u32) -> f64 {
    debug_assert!(total_layers > 0, "total layer count must be positive");
    let total = total_layers.max(1);
    f64::from(gpu_layers.min(total)) / f64::from(total)
}

/// GPU-resident KV cache in GB for f16 keys and values
pub fn kv_cache_memory_gb(
    context_size: u32,
    model_size_gb: f64,
    gpu_layers: u32,
    total_layers: u32,
) -> f64 {
    kv_cache_memory_gb_with(
        context_size,
        model_size_gb,
        gpu_layers,
        total_layers,
        CacheType::F16,
        CacheType::F16,
    )
}

/// GPU-resident KV cache in GB with explicit K and V cache types
pub fn kv_cache_memory_gb_with(
    context_size: u32,
    model_size_gb: f64,
    gpu_layers: u32,
    total_layers: u32,
    cache_type_k: CacheType,
    cache_type_v: CacheType,
) -> f64 {
    let hidden_dim = f64::from(hidden_dim_for_size(model_size_gb));
    let bytes_per_position = cache_type_k.bytes_per_element() + cache_type_v.bytes_per_element();
    let bytes = f64::from(context_size) * hidden_dim * bytes_per_position;

    bytes * offload_ratio(gpu_layers, total_layers) / BYTES_PER_GB
}

/// Weights of the offloaded layers in GB
pub fn model_memory_gb(model_size_gb: f64, gpu_layers: u32, total_layers: u32) -> f64 {
    debug_assert!(model_size_gb >= 0.0, "model size must not be negative");
    model_size_gb.max(0.0) * offload_ratio(gpu_layers, total_layers)
}
