//! Launch Planner Library
//!
//! Decodes, edits and re-emits inference-server launch commands, and plans
//! context-window sizes that fit a GPU memory budget.

pub mod catalog;
pub mod command;
pub mod estimate;
pub mod types;

pub use catalog::{CatalogError, ConfigSet, ModelEntry, ModelGroup};
pub use command::{
    clean_command, decode, encode, parse_command, tokenize, update_field, CommandError,
    ConfigField, FieldValue, Token,
};
pub use estimate::layers::{estimate_size_gb, estimate_total_layers};
pub use estimate::memory::{kv_cache_memory_gb, model_memory_gb};
pub use estimate::planner::{plan_context, ModelProfile, PlannerConfig, SafetyPlanner};
pub use types::config::{CacheType, ModelConfig, Parsed, PoolingMode};
pub use types::plan::{ContextPlan, MemoryPlan, WarningLevel};

/// Route `tracing` output through the test harness.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
