//! NPU cluster fault center library
//!
//! Aggregates device, node and switch fault records reported per node,
//! suppresses faults that may still heal on their own, and maps what
//! remains onto the ranks of running training jobs. The `faultcenter`
//! binary runs it as a daemon; `services::FaultSession` embeds it.

pub mod center;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod external;
pub mod filter;
pub mod kube;
pub mod models;
pub mod rank;
pub mod services;
pub mod store;
pub mod watcher;

// Re-export commonly used types for convenience
pub use center::{
    Collaborators, EngineSettings, FaultCategory, FaultCenter, FaultProcessCenter, ProcessWorker,
};
pub use error::{FaultError, FaultResult};
pub use rank::{JobFaultRankProcessor, get_health_state};
pub use services::{FaultSession, SessionCollaborators};
pub use store::{ConfigMapManager, FaultRecord};
