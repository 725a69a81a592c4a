//! Context safety planner
//!
//! Finds the largest context windows that keep the KV cache within a share of
//! the GPU memory left after the model weights and a reserve, and classifies
//! a chosen context size against the budget.

use serde::{Deserialize, Serialize};

use crate::estimate::heuristics::model_max_context;
use crate::estimate::layers::{estimate_size_gb, estimate_total_layers};
use crate::estimate::memory::{kv_cache_memory_gb_with, model_memory_gb};
use crate::types::config::{CacheType, ModelConfig};
use crate::types::plan::{ContextPlan, MemoryPlan, WarningLevel};

/// Planner policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Share of available memory the KV cache may use at the safe context
    pub safe_ratio: f64,
    /// Share of available memory the KV cache may use at the max context
    pub max_ratio: f64,
    /// Smallest context ever recommended
    pub min_context: u32,
    /// Granularity of the context search
    pub context_step: u32,
    /// Minimum memory held back for the runtime, in GB
    pub reserve_floor_gb: f64,
    /// Share of the budget held back for the runtime
    pub reserve_fraction: f64,
    /// Max context reported when nothing fits
    pub floor_max_context: u32,
    /// Below this much free memory (GB) memory mapping is discouraged
    pub low_available_gb: f64,
    /// Budgets under this size (GB) count as small GPUs
    pub small_budget_gb: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            safe_ratio: 0.75,
            max_ratio: 0.90,
            min_context: 2048,
            context_step: 1024,
            reserve_floor_gb: 1.0,
            reserve_fraction: 0.15,
            floor_max_context: 4096,
            low_available_gb: 4.0,
            small_budget_gb: 12.0,
        }
    }
}

impl PlannerConfig {
    /// Bring every value back into a usable range
    pub fn validate(&mut self) {
        let defaults = Self::default();

        if !(self.safe_ratio > 0.0 && self.safe_ratio <= 1.0) {
            tracing::warn!("Invalid safe ratio {}, using {}", self.safe_ratio, defaults.safe_ratio);
            self.safe_ratio = defaults.safe_ratio;
        }
        if !(self.max_ratio >= self.safe_ratio && self.max_ratio <= 1.0) {
            let fixed = defaults.max_ratio.max(self.safe_ratio);
            tracing::warn!("Invalid max ratio {}, using {}", self.max_ratio, fixed);
            self.max_ratio = fixed;
        }

        if self.min_context == 0 {
            self.min_context = defaults.min_context;
        }
        if self.context_step == 0 {
            self.context_step = defaults.context_step;
        }
        if self.floor_max_context < self.min_context {
            self.floor_max_context = self.min_context;
        }

        if !self.reserve_floor_gb.is_finite() || self.reserve_floor_gb < 0.0 {
            self.reserve_floor_gb = defaults.reserve_floor_gb;
        }
        if !(0.0..=1.0).contains(&self.reserve_fraction) {
            self.reserve_fraction = defaults.reserve_fraction;
        }
        if !self.low_available_gb.is_finite() || self.low_available_gb < 0.0 {
            self.low_available_gb = defaults.low_available_gb;
        }
        if !self.small_budget_gb.is_finite() || self.small_budget_gb < 0.0 {
            self.small_budget_gb = defaults.small_budget_gb;
        }
    }
}

/// What the planner needs to know about a model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProfile {
    pub name: String,
    pub size_gb: f64,
    pub gpu_layers: u32,
    pub total_layers: u32,
    /// Context length from model metadata, when it was read
    pub native_context: Option<u32>,
    pub cache_type_k: CacheType,
    pub cache_type_v: CacheType,
}

impl ModelProfile {
    pub fn new(name: impl Into<String>, size_gb: f64, gpu_layers: u32, total_layers: u32) -> Self {
        Self {
            name: name.into(),
            size_gb,
            gpu_layers,
            total_layers,
            native_context: None,
            cache_type_k: CacheType::F16,
            cache_type_v: CacheType::F16,
        }
    }

    pub fn with_native_context(mut self, native_context: Option<u32>) -> Self {
        self.native_context = native_context;
        self
    }

    /// Build a profile from a decoded config, estimating what is missing
    ///
    /// Size comes from the model path (or name), layers from the name capped
    /// by a known size, and a missing GPU layer count means full offload.
    pub fn from_config(config: &ModelConfig) -> Self {
        let known_size = config.model_size_gb.filter(|size| size.is_finite() && *size > 0.0);
        let size_gb = known_size.unwrap_or_else(|| {
            estimate_size_gb(config.model_path.as_deref().unwrap_or(&config.name))
        });
        let total_layers = config
            .total_layers
            .filter(|layers| *layers > 0)
            .unwrap_or_else(|| estimate_total_layers(&config.name, known_size));
        let gpu_layers = config
            .gpu_layers
            .as_ref()
            .and_then(|layers| layers.get())
            .unwrap_or(total_layers);

        Self {
            name: config.name.clone(),
            size_gb,
            gpu_layers,
            total_layers,
            native_context: config.native_context_size,
            cache_type_k: config
                .cache_type_k
                .as_ref()
                .and_then(|t| t.get())
                .unwrap_or(CacheType::F16),
            cache_type_v: config
                .cache_type_v
                .as_ref()
                .and_then(|t| t.get())
                .unwrap_or(CacheType::F16),
        }
    }

    fn kv_cache_gb(&self, context_size: u32) -> f64 {
        kv_cache_memory_gb_with(
            context_size,
            self.size_gb,
            self.gpu_layers,
            self.total_layers,
            self.cache_type_k,
            self.cache_type_v,
        )
    }

    fn model_memory_gb(&self) -> f64 {
        model_memory_gb(self.size_gb, self.gpu_layers, self.total_layers)
    }
}

/// Context planner for a fixed policy
#[derive(Debug, Clone, Default)]
pub struct SafetyPlanner {
    config: PlannerConfig,
}

impl SafetyPlanner {
    pub fn new(mut config: PlannerConfig) -> Self {
        config.validate();
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Largest context the model architecture supports
    pub fn model_max_context(&self, profile: &ModelProfile) -> u32 {
        let context = match profile.native_context {
            Some(native) if native > 0 => native,
            _ => model_max_context(&profile.name),
        };
        context.max(self.config.min_context)
    }

    fn checked_budget(gpu_memory_gb: f64) -> f64 {
        debug_assert!(
            gpu_memory_gb.is_finite() && gpu_memory_gb >= 0.0,
            "GPU memory budget must be a non-negative number"
        );
        if gpu_memory_gb.is_finite() {
            gpu_memory_gb.max(0.0)
        } else {
            0.0
        }
    }

    /// Memory kept back for the model weights and the runtime
    fn reserved_gb(&self, profile: &ModelProfile, budget_gb: f64) -> f64 {
        let runtime = self
            .config
            .reserve_floor_gb
            .max(self.config.reserve_fraction * budget_gb);
        profile.model_memory_gb() + runtime
    }

    /// Largest `start + k * step` in `[start, end]` whose KV cache fits `limit_gb`
    ///
    /// Memory grows with context, so the predicate is monotonic and a binary
    /// search over `k` is enough. Returns `start` when nothing fits.
    fn largest_fitting(&self, profile: &ModelProfile, start: u32, end: u32, limit_gb: f64) -> u32 {
        if end <= start {
            return start;
        }
        let step = self.config.context_step;
        let fits = |context: u32| profile.kv_cache_gb(context) <= limit_gb;

        let steps = (end - start) / step;
        let mut best: Option<u32> = None;
        let (mut low, mut high) = (0u32, steps);
        while low <= high {
            let mid = low + (high - low) / 2;
            if fits(start + mid * step) {
                best = Some(mid);
                low = mid + 1;
            } else if mid == 0 {
                break;
            } else {
                high = mid - 1;
            }
        }

        match best {
            Some(k) if k == steps && fits(end) => end,
            Some(k) => start + k * step,
            None => start,
        }
    }

    /// Recommended safe and max context sizes
    pub fn plan_context(&self, profile: &ModelProfile, gpu_memory_gb: f64) -> ContextPlan {
        let budget = Self::checked_budget(gpu_memory_gb);
        let model_max = self.model_max_context(profile);
        let min_context = self.config.min_context;
        let reserved = self.reserved_gb(profile, budget);

        if reserved >= budget {
            tracing::debug!(
                "{}: {:.1} GB reserved of {:.1} GB, using floor context",
                profile.name,
                reserved,
                budget
            );
            return ContextPlan {
                safe_context: min_context,
                max_context: self.config.floor_max_context.min(model_max),
                model_max_context: model_max,
                recommend_no_mmap: true,
            };
        }

        let available = budget - reserved;
        let safe = self
            .largest_fitting(profile, min_context, model_max, self.config.safe_ratio * available)
            .clamp(min_context, model_max);
        let max = self
            .largest_fitting(profile, safe, model_max, self.config.max_ratio * available)
            .clamp(safe, model_max);

        let recommend_no_mmap =
            available < self.config.low_available_gb || budget < self.config.small_budget_gb;

        tracing::debug!(
            "{}: safe context {}, max context {} (model max {}, {:.1} GB available)",
            profile.name,
            safe,
            max,
            model_max,
            available
        );

        ContextPlan {
            safe_context: safe,
            max_context: max,
            model_max_context: model_max,
            recommend_no_mmap,
        }
    }

    fn level_for(&self, total_gb: f64, budget_gb: f64) -> WarningLevel {
        if total_gb > self.config.max_ratio * budget_gb {
            WarningLevel::Danger
        } else if total_gb > self.config.safe_ratio * budget_gb {
            WarningLevel::Warning
        } else {
            WarningLevel::Safe
        }
    }

    /// Warning level for running `profile` with `context_size`
    pub fn classify_context(
        &self,
        context_size: u32,
        profile: &ModelProfile,
        gpu_memory_gb: f64,
    ) -> WarningLevel {
        self.memory_plan(context_size, profile, gpu_memory_gb).warning
    }

    /// Full memory breakdown for running `profile` with `context_size`
    pub fn memory_plan(&self, context_size: u32, profile: &ModelProfile, gpu_memory_gb: f64) -> MemoryPlan {
        let budget = Self::checked_budget(gpu_memory_gb);
        let model_memory = profile.model_memory_gb();
        let kv_cache = profile.kv_cache_gb(context_size);
        let total = model_memory + kv_cache;
        let warning = self.level_for(total, budget);
        let recommend_no_mmap = warning == WarningLevel::Danger
            || (warning == WarningLevel::Warning && budget < self.config.small_budget_gb);

        MemoryPlan {
            context_size,
            model_memory_gb: model_memory,
            kv_cache_gb: kv_cache,
            total_gb: total,
            budget_gb: budget,
            warning,
            recommend_no_mmap,
        }
    }
}

/// Plan context bounds with the default policy
pub fn plan_context(
    name: &str,
    model_size_gb: f64,
    gpu_layers: u32,
    total_layers: u32,
    gpu_memory_gb: f64,
    native_max_context: Option<u32>,
) -> ContextPlan {
    let profile = ModelProfile::new(name, model_size_gb, gpu_layers, total_layers)
        .with_native_context(native_max_context);
    SafetyPlanner::default().plan_context(&profile, gpu_memory_gb)
}
