//! Command decoder
//!
//! Single pass over the tokens of a launch command. Known flags fill the
//! matching `ModelConfig` field, unknown tokens are skipped, and a value that
//! fails to parse is kept as `Parsed::Invalid` instead of aborting the scan.

use std::str::FromStr;

use crate::command::fields::ConfigField;
use crate::command::tokenizer::Token;
use crate::types::config::{ModelConfig, Parsed};

/// Decode `tokens` into the configuration of the model called `name`
pub fn decode(name: &str, tokens: &[Token]) -> ModelConfig {
    let mut config = ModelConfig::new(name);
    let mut i = 0;

    if let Some(first) = tokens.first() {
        if !first.is_flag() {
            config.binary_path = Some(first.unquoted().to_string());
            i = 1;
        }
    }

    while i < tokens.len() {
        let token = &tokens[i];
        let Some(field) = ConfigField::from_flag(token.as_str()) else {
            i += 1;
            continue;
        };

        if let Some(slot) = switch_slot(&mut config, field) {
            let mut enabled = true;
            if field == ConfigField::FlashAttention {
                if let Some(state) = tokens.get(i + 1).and_then(|t| flash_attn_state(t.unquoted())) {
                    enabled = state;
                    i += 1;
                }
            }
            *slot = Some(enabled);
            i += 1;
            continue;
        }

        match tokens.get(i + 1).filter(|next| !next.is_flag()) {
            Some(value) => {
                apply_value(&mut config, field, value.unquoted());
                i += 2;
            }
            None => {
                tracing::warn!("Flag {} has no value, ignoring it", token);
                i += 1;
            }
        }
    }

    config.refresh_derived();
    config
}

/// `--flash-attn on|off|auto` on newer servers
pub(crate) fn flash_attn_state(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "auto" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

fn switch_slot(config: &mut ModelConfig, field: ConfigField) -> Option<&mut Option<bool>> {
    match field {
        ConfigField::Mlock => Some(&mut config.mlock),
        ConfigField::FlashAttention => Some(&mut config.flash_attention),
        ConfigField::ContBatching => Some(&mut config.cont_batching),
        ConfigField::NoMmap => Some(&mut config.no_mmap),
        ConfigField::Embeddings => Some(&mut config.embeddings),
        ConfigField::Jinja => Some(&mut config.jinja),
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
        | ConfigField::Pooling => None,
    }
}

fn parse_logged<T: FromStr>(field: ConfigField, raw: &str) -> Option<Parsed<T>> {
    let parsed = Parsed::parse(raw);
    if !parsed.is_valid() {
        tracing::warn!("Keeping malformed value {:?} for {}", raw, field);
    }
    Some(parsed)
}

fn apply_value(config: &mut ModelConfig, field: ConfigField, raw: &str) {
    match field {
        ConfigField::ModelPath => config.model_path = Some(raw.to_string()),
        ConfigField::Port => config.port = parse_logged(field, raw),
        ConfigField::GpuLayers => config.gpu_layers = parse_logged(field, raw),
        ConfigField::Threads => config.threads = parse_logged(field, raw),
        ConfigField::ContextSize => config.context_size = parse_logged(field, raw),
        ConfigField::BatchSize => config.batch_size = parse_logged(field, raw),
        ConfigField::UBatchSize => config.ubatch_size = parse_logged(field, raw),
        ConfigField::Keep => config.keep = parse_logged(field, raw),
        ConfigField::DefragThreshold => config.defrag_threshold = parse_logged(field, raw),
        ConfigField::Parallel => config.parallel = parse_logged(field, raw),
        ConfigField::TensorSplit => config.tensor_split = Some(raw.to_string()),
        ConfigField::CacheTypeK => config.cache_type_k = parse_logged(field, raw),
        ConfigField::CacheTypeV => config.cache_type_v = parse_logged(field, raw),
        ConfigField::MmprojPath => config.mmproj_path = Some(raw.to_string()),
        ConfigField::Pooling => config.pooling = parse_logged(field, raw),
        // switches never carry a value
        ConfigField::Mlock
        | ConfigField::FlashAttention
        | ConfigField::ContBatching
        | ConfigField::NoMmap
        | ConfigField::Embeddings
        | ConfigField::Jinja => {}
    }
}
