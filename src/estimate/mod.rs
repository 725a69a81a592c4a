//! Resource estimation
//!
//! Heuristic model sizing, the GPU memory model, and the context safety
//! planner built on top of them.

pub mod heuristics;
pub mod layers;
pub mod memory;
pub mod planner;
