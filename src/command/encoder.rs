//! Command encoder
//!
//! Emits a canonical launch command from a `ModelConfig`. Flags come out in a
//! fixed order, absent fields are omitted, and path values are always double
//! quoted. Switches that are off are omitted too, except flash attention,
//! which has an explicit `off` form.

use std::fmt::Display;

use crate::command::fields::{quote, ConfigField, FieldValue};
use crate::types::config::ModelConfig;

struct CommandBuilder {
    args: Vec<String>,
}

impl CommandBuilder {
    fn new(binary_path: &str) -> Self {
        Self {
            args: vec![quote(binary_path)],
        }
    }

    fn value<T: Display>(&mut self, field: ConfigField, value: Option<&T>) {
        let Some(value) = value else {
            return;
        };
        match field.render_value(&FieldValue::Text(value.to_string())) {
            Ok(rendered) => {
                self.args.push(field.flag().to_string());
                self.args.push(rendered);
            }
            Err(e) => tracing::warn!("Skipping {} while encoding: {}", field, e),
        }
    }

    fn switch(&mut self, field: ConfigField, enabled: Option<bool>) {
        if enabled == Some(true) {
            self.args.push(field.flag().to_string());
        }
    }

    /// `--flash-attn off` keeps an explicit off across a round trip
    fn flash_attn(&mut self, state: Option<bool>) {
        match state {
            Some(true) => self.args.push(ConfigField::FlashAttention.flag().to_string()),
            Some(false) => {
                self.args.push(ConfigField::FlashAttention.flag().to_string());
                self.args.push("off".to_string());
            }
            None => {}
        }
    }

    fn finish(self) -> String {
        self.args.join(" ")
    }
}

/// Build the launch command for `config`, starting with `binary_path`
pub fn encode(config: &ModelConfig, binary_path: &str) -> String {
    let mut cmd = CommandBuilder::new(binary_path);

    cmd.value(ConfigField::ModelPath, config.model_path.as_ref());
    cmd.value(ConfigField::Port, config.port.as_ref());
    cmd.switch(ConfigField::Jinja, config.jinja);
    cmd.value(ConfigField::GpuLayers, config.gpu_layers.as_ref());
    cmd.value(ConfigField::Threads, config.threads.as_ref());
    cmd.value(ConfigField::ContextSize, config.context_size.as_ref());
    cmd.value(ConfigField::BatchSize, config.batch_size.as_ref());
    cmd.value(ConfigField::UBatchSize, config.ubatch_size.as_ref());
    cmd.value(ConfigField::Keep, config.keep.as_ref());
    cmd.value(ConfigField::DefragThreshold, config.defrag_threshold.as_ref());
    cmd.switch(ConfigField::Mlock, config.mlock);
    cmd.value(ConfigField::Parallel, config.parallel.as_ref());
    cmd.flash_attn(config.flash_attention);
    cmd.switch(ConfigField::ContBatching, config.cont_batching);
    cmd.switch(ConfigField::NoMmap, config.no_mmap);
    cmd.value(ConfigField::TensorSplit, config.tensor_split.as_ref());
    cmd.value(ConfigField::CacheTypeK, config.cache_type_k.as_ref());
    cmd.value(ConfigField::CacheTypeV, config.cache_type_v.as_ref());
    cmd.value(ConfigField::MmprojPath, config.mmproj_path.as_ref());

    if config.is_embedding {
        cmd.value(ConfigField::Pooling, config.pooling.as_ref());
        cmd.switch(ConfigField::Embeddings, Some(true));
    }

    cmd.finish()
}
