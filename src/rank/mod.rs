//! Job fault rank mapping
//!
//! Resolves per-node faults to the ranks of running jobs and classifies each
//! job's health.

mod health;
mod pod_map;
mod processor;

pub use health::*;
pub use pod_map::*;
pub use processor::*;
