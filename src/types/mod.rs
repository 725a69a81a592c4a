//! Shared type definitions
//!
//! Decoded launch configuration and the planning records derived from it.

pub mod config;
pub mod plan;
