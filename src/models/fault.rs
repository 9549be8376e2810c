//! Fault level and health state definitions
//!
//! Levels and states travel as plain strings in the per-node payloads, so
//! both enums round-trip through `String` and keep unknown values intact.

use std::fmt;

/// Handling level attached to a single fault occurrence
///
/// `Unset` is the empty string the agents write when a record carries no
/// aggregate level. Anything the engine does not recognise is preserved in
/// `Other` so it still counts as a disruptive fault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FaultLevel {
    NotHandleFault,
    RestartRequest,
    RestartBusiness,
    RestartNPU,
    FreeRestartNPU,
    SeparateNPU,
    PreSeparateNPU,
    SubHealthFault,
    ManuallySeparateNPU,
    #[default]
    Unset,
    Other(String),
}

impl FaultLevel {
    pub fn as_str(&self) -> &str {
        match self {
            FaultLevel::NotHandleFault => "NotHandleFault",
            FaultLevel::RestartRequest => "RestartRequest",
            FaultLevel::RestartBusiness => "RestartBusiness",
            FaultLevel::RestartNPU => "RestartNPU",
            FaultLevel::FreeRestartNPU => "FreeRestartNPU",
            FaultLevel::SeparateNPU => "SeparateNPU",
            FaultLevel::PreSeparateNPU => "PreSeparateNPU",
            FaultLevel::SubHealthFault => "SubHealthFault",
            FaultLevel::ManuallySeparateNPU => "ManuallySeparateNPU",
            FaultLevel::Unset => "",
            FaultLevel::Other(s) => s,
        }
    }

    /// Whether this level leaves the job running (no restart, no isolation)
    pub fn is_tolerable(&self) -> bool {
        matches!(self, FaultLevel::SubHealthFault | FaultLevel::NotHandleFault)
    }
}

impl From<&str> for FaultLevel {
    fn from(s: &str) -> Self {
        match s {
            "NotHandleFault" => FaultLevel::NotHandleFault,
            "RestartRequest" => FaultLevel::RestartRequest,
            "RestartBusiness" => FaultLevel::RestartBusiness,
            "RestartNPU" => FaultLevel::RestartNPU,
            "FreeRestartNPU" => FaultLevel::FreeRestartNPU,
            "SeparateNPU" => FaultLevel::SeparateNPU,
            "PreSeparateNPU" => FaultLevel::PreSeparateNPU,
            "SubHealthFault" => FaultLevel::SubHealthFault,
            "ManuallySeparateNPU" => FaultLevel::ManuallySeparateNPU,
            "" => FaultLevel::Unset,
            other => FaultLevel::Other(other.to_string()),
        }
    }
}

impl From<String> for FaultLevel {
    fn from(s: String) -> Self {
        FaultLevel::from(s.as_str())
    }
}

impl From<FaultLevel> for String {
    fn from(level: FaultLevel) -> Self {
        match level {
            FaultLevel::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for FaultLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health classification of a node, switch or job
///
/// Agents spell the unhealthy state both `UnHealthy` and `Unhealthy`. Any
/// other status is kept in `Other` and weighs as unhealthy, so a record
/// with an unfamiliar status still has its faults ingested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HealthState {
    #[default]
    Healthy,
    SubHealthy,
    Unhealthy,
    Other(String),
}

impl HealthState {
    pub fn as_str(&self) -> &str {
        match self {
            HealthState::Healthy => "Healthy",
            HealthState::SubHealthy => "SubHealthy",
            HealthState::Unhealthy => "UnHealthy",
            HealthState::Other(s) => s,
        }
    }

    /// Unhealthy, or a status the engine cannot vouch for
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthState::Unhealthy | HealthState::Other(_))
    }
}

impl From<&str> for HealthState {
    fn from(s: &str) -> Self {
        match s {
            "Healthy" => HealthState::Healthy,
            "SubHealthy" => HealthState::SubHealthy,
            "UnHealthy" | "Unhealthy" => HealthState::Unhealthy,
            other => {
                tracing::warn!("Unknown node status {:?}, treating it as unhealthy", other);
                HealthState::Other(other.to_string())
            }
        }
    }
}

impl From<String> for HealthState {
    fn from(s: String) -> Self {
        HealthState::from(s.as_str())
    }
}

impl From<HealthState> for String {
    fn from(state: HealthState) -> Self {
        match state {
            HealthState::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pod-level strategy that isolates the pod's devices
pub const SEPARATE_FAULT_STRATEGY: &str = "Separate";

/// Pod-level strategy that marks the pod as degraded
pub const SUB_HEALTH_FAULT_STRATEGY: &str = "SubHealth";
