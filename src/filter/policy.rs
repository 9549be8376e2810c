//! Self-recovery suppression rule

use std::collections::HashSet;

use crate::constants::CONTROLLER_APP_TYPE;
use crate::external::FaultPublisher;
use crate::models::{FaultLevel, FaultTimeAndLevel, JobInfo};

/// Device the fault belongs to, with the devices the job uses on that node
#[derive(Debug, Clone, Copy)]
pub struct DeviceUsage<'a> {
    pub device_name: &'a str,
    pub used_devices: Option<&'a HashSet<String>>,
}

/// Decides whether a fault must reach the scheduler now
pub struct SuppressionPolicy<'a> {
    publisher: &'a dyn FaultPublisher,
    timeout_ms: i64,
}

impl<'a> SuppressionPolicy<'a> {
    pub fn new(publisher: &'a dyn FaultPublisher, timeout_ms: i64) -> Self {
        Self {
            publisher,
            timeout_ms,
        }
    }

    /// Returns false only for a restart-request fault that is still inside
    /// the self-recovery window of a job whose controller is subscribed and,
    /// for device faults, that actually uses the faulty device.
    pub fn should_report_fault(
        &self,
        entry: &FaultTimeAndLevel,
        job: &JobInfo,
        device: Option<DeviceUsage<'_>>,
        fault_code: &str,
        now_ms: i64,
    ) -> bool {
        if entry.fault_level != FaultLevel::RestartRequest {
            return true;
        }

        let elapsed_ms = now_ms.saturating_sub(entry.first_seen_ms());
        if elapsed_ms >= self.timeout_ms {
            tracing::debug!(
                "Fault {} lasted {}ms, past the {}ms recovery window, reporting",
                fault_code,
                elapsed_ms,
                self.timeout_ms
            );
            return true;
        }

        if job.key.is_empty() {
            tracing::debug!("Fault {} has no job to recover it, reporting", fault_code);
            return true;
        }

        if let Some(usage) = device {
            let used = usage
                .used_devices
                .is_some_and(|devices| devices.contains(usage.device_name));
            if !used {
                tracing::debug!(
                    "Job {} does not use faulty device {}, reporting {}",
                    job.key,
                    usage.device_name,
                    fault_code
                );
                return true;
            }
        }

        let topic = job.subscription_topic();
        if !self.publisher.is_subscribed(topic, CONTROLLER_APP_TYPE) {
            tracing::debug!(
                "Job {} has no recovery subscriber on {}, reporting {}",
                job.key,
                topic,
                fault_code
            );
            return true;
        }

        tracing::info!(
            "Suppressing fault {} for job {}: within {}s recovery window and subscribed",
            fault_code,
            job.key,
            self.timeout_ms / 1000
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::MockFaultPublisher;

    const TIMEOUT_MS: i64 = 60_000;
    const NOW: i64 = 1_700_000_000_000;

    fn entry(level: FaultLevel, age_ms: i64) -> FaultTimeAndLevel {
        FaultTimeAndLevel {
            fault_time: NOW - age_ms,
            fault_received_time: NOW - age_ms,
            fault_level: level,
        }
    }

    fn job(key: &str) -> JobInfo {
        JobInfo {
            key: key.to_string(),
            name: key.to_string(),
            multi_instance_job_id: String::new(),
        }
    }

    fn subscribed(value: bool) -> MockFaultPublisher {
        let mut publisher = MockFaultPublisher::new();
        publisher.expect_is_subscribed().return_const(value);
        publisher
    }

    #[test]
    fn test_non_restart_request_always_reported() {
        let mut publisher = MockFaultPublisher::new();
        publisher.expect_is_subscribed().times(0);
        let policy = SuppressionPolicy::new(&publisher, TIMEOUT_MS);
        for level in [
            FaultLevel::SubHealthFault,
            FaultLevel::NotHandleFault,
            FaultLevel::SeparateNPU,
        ] {
            assert!(policy.should_report_fault(&entry(level, 0), &job("J1"), None, "X", NOW));
        }
    }

    #[test]
    fn test_corrupt_fault_time_reported() {
        let publisher = subscribed(true);
        let policy = SuppressionPolicy::new(&publisher, TIMEOUT_MS);
        let corrupt = FaultTimeAndLevel {
            fault_time: i64::MIN,
            fault_received_time: 0,
            fault_level: FaultLevel::RestartRequest,
        };
        assert!(policy.should_report_fault(&corrupt, &job("J1"), None, "X", NOW));
    }

    #[test]
    fn test_window_boundary() {
        let publisher = subscribed(true);
        let policy = SuppressionPolicy::new(&publisher, TIMEOUT_MS);
        let j = job("J1");
        assert!(!policy.should_report_fault(
            &entry(FaultLevel::RestartRequest, 59_999),
            &j,
            None,
            "X",
            NOW
        ));
        assert!(policy.should_report_fault(
            &entry(FaultLevel::RestartRequest, 60_000),
            &j,
            None,
            "X",
            NOW
        ));
    }

    #[test]
    fn test_empty_job_key_reported() {
        let publisher = subscribed(true);
        let policy = SuppressionPolicy::new(&publisher, TIMEOUT_MS);
        assert!(policy.should_report_fault(
            &entry(FaultLevel::RestartRequest, 1000),
            &job(""),
            None,
            "X",
            NOW
        ));
    }

    #[test]
    fn test_unused_device_reported() {
        let publisher = subscribed(true);
        let policy = SuppressionPolicy::new(&publisher, TIMEOUT_MS);
        let used = HashSet::from(["Ascend910-1".to_string()]);
        let e = entry(FaultLevel::RestartRequest, 1000);
        let j = job("J1");

        let other = DeviceUsage {
            device_name: "Ascend910-0",
            used_devices: Some(&used),
        };
        assert!(policy.should_report_fault(&e, &j, Some(other), "X", NOW));

        let unknown = DeviceUsage {
            device_name: "Ascend910-1",
            used_devices: None,
        };
        assert!(policy.should_report_fault(&e, &j, Some(unknown), "X", NOW));

        let mine = DeviceUsage {
            device_name: "Ascend910-1",
            used_devices: Some(&used),
        };
        assert!(!policy.should_report_fault(&e, &j, Some(mine), "X", NOW));
    }

    #[test]
    fn test_unsubscribed_job_reported() {
        let publisher = subscribed(false);
        let policy = SuppressionPolicy::new(&publisher, TIMEOUT_MS);
        assert!(policy.should_report_fault(
            &entry(FaultLevel::RestartRequest, 1000),
            &job("J1"),
            None,
            "X",
            NOW
        ));
    }

    #[test]
    fn test_subscription_topic_uses_multi_instance_id() {
        let mut publisher = MockFaultPublisher::new();
        publisher
            .expect_is_subscribed()
            .withf(|topic, kind| topic == "mi-7" && kind == "controller")
            .return_const(true);
        let policy = SuppressionPolicy::new(&publisher, TIMEOUT_MS);
        let mut j = job("default/infer");
        j.multi_instance_job_id = "mi-7".to_string();
        assert!(!policy.should_report_fault(
            &entry(FaultLevel::RestartRequest, 1000),
            &j,
            None,
            "X",
            NOW
        ));
    }
}
