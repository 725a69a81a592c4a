//! Planning types
//!
//! Derived values produced by the memory model and safety planner. None of
//! these are persisted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// GPU memory pressure, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Safe,
    Warning,
    Danger,
}

impl WarningLevel {
    pub fn label(&self) -> &'static str {
        match self {
            WarningLevel::Safe => "safe",
            WarningLevel::Warning => "warning",
            WarningLevel::Danger => "danger",
        }
    }
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Estimated GPU memory use at one context size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPlan {
    pub context_size: u32,
    /// Weights of the offloaded layers
    pub model_memory_gb: f64,
    pub kv_cache_gb: f64,
    pub total_gb: f64,
    pub budget_gb: f64,
    pub warning: WarningLevel,
    pub recommend_no_mmap: bool,
}

impl MemoryPlan {
    /// Share of the budget in use, 0.0 when the budget is empty
    pub fn utilization(&self) -> f64 {
        if self.budget_gb > 0.0 {
            self.total_gb / self.budget_gb
        } else {
            0.0
        }
    }
}

/// Recommended context bounds for a model on a GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPlan {
    pub safe_context: u32,
    pub max_context: u32,
    pub model_max_context: u32,
    pub recommend_no_mmap: bool,
}
