//! Job health aggregation

use std::collections::HashMap;

use crate::models::{
    FaultLevel, FaultRank, HealthState, SEPARATE_FAULT_STRATEGY, SUB_HEALTH_FAULT_STRATEGY,
};

/// Aggregate health of a job
///
/// Unhealthy wins over SubHealthy, which wins over Healthy.
pub fn get_health_state(
    fault_list: &[FaultRank],
    node_status_list: &[HealthState],
    pod_strategies: &HashMap<String, String>,
) -> HealthState {
    let mut sub_healthy = false;
    for fault in fault_list {
        if !fault.fault_level.is_tolerable() {
            return HealthState::Unhealthy;
        }
        if fault.fault_level == FaultLevel::SubHealthFault {
            sub_healthy = true;
        }
    }
    for status in node_status_list {
        match status {
            HealthState::Unhealthy | HealthState::Other(_) => return HealthState::Unhealthy,
            HealthState::SubHealthy => sub_healthy = true,
            HealthState::Healthy => {}
        }
    }
    for strategy in pod_strategies.values() {
        if strategy == SEPARATE_FAULT_STRATEGY {
            return HealthState::Unhealthy;
        }
        if strategy == SUB_HEALTH_FAULT_STRATEGY {
            sub_healthy = true;
        }
    }
    if sub_healthy {
        HealthState::SubHealthy
    } else {
        HealthState::Healthy
    }
}
