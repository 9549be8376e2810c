//! Fault engine model layer
//!
//! Structure:
//! - `fault.rs` - fault levels, health states and pod strategies
//! - `records.rs` - canonical per-node device/node/switch records
//! - `job.rs` - job topology inputs and job fault outputs

pub mod fault;
pub mod job;
pub mod records;

pub use fault::*;
pub use job::*;
pub use records::*;
