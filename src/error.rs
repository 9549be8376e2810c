//! Error types for the fault engine

use crate::center::FaultCategory;

/// Fault engine errors
#[derive(Debug, thiserror::Error)]
pub enum FaultError {
    #[error("Invalid job pod info: device number of pod is {0}")]
    InvalidPodInfo(i32),

    #[error("Invalid card rank '{rank}': {source}")]
    InvalidCardRank {
        rank: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("Card rank {0} has no pod rank")]
    PodRankNotFound(String),

    #[error("Configmap {name} has no data key {key}")]
    MissingDataKey { name: String, key: &'static str },

    #[error("Failed to decode configmap {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{category} store is full ({limit} nodes), refusing {name}")]
    StoreFull {
        category: FaultCategory,
        limit: usize,
        name: String,
    },

    #[error("Configmap {0} does not belong to any fault category")]
    UnknownCategory(String),

    #[error("{category} center already has {limit} subscribers")]
    SubscriberLimit {
        category: FaultCategory,
        limit: usize,
    },

    #[error("Fault center notify queue is closed")]
    NotifyClosed,
}

/// Result type for fault engine operations
pub type FaultResult<T> = Result<T, FaultError>;
