//! Custom and L2 fault suppression
//!
//! Restart-request faults on a job that can recover by itself are withheld
//! for a short window. Two filters apply the same rule to different job
//! populations and keep separate caches of what they withheld.

mod cache;
mod policy;
mod processor;

pub use cache::*;
pub use policy::*;
pub use processor::*;

use std::fmt;

/// Which job population a filter serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppressionKind {
    /// Jobs declaring custom fault filtering, e.g. inference servers
    Custom,
    /// Jobs subscribed for L2 restart-request recovery
    L2,
}

impl fmt::Display for SuppressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuppressionKind::Custom => f.write_str("custom"),
            SuppressionKind::L2 => f.write_str("l2"),
        }
    }
}
