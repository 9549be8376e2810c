//! Shared constants
//!
//! Configmap naming, fault codes and the defaults the engine falls back to
//! when no configuration overrides them.

/// Prefix of the per-node device fault configmap
pub const DEVICE_INFO_PREFIX: &str = "mindx-dl-deviceinfo-";

/// Prefix of the per-node node fault configmap
pub const NODE_INFO_PREFIX: &str = "mindx-dl-nodeinfo-";

/// Prefix of the per-node switch fault configmap
pub const SWITCH_INFO_PREFIX: &str = "mindx-dl-switchinfo-";

/// Data key holding the device payload
pub const DEVICE_INFO_CFG_KEY: &str = "DeviceInfoCfg";

/// Data key holding the node payload
pub const NODE_INFO_KEY: &str = "NodeInfo";

/// Data key holding the switch payload
pub const SWITCH_INFO_CFG_KEY: &str = "SwitchInfoCfg";

/// Resource name prefix used inside device payload keys
pub const RESOURCE_NAME_PREFIX: &str = "huawei.com/";

/// Uncorrectable memory error marker in device fault codes
pub const UCE_FAULT_CODE: &str = "80E01801";

/// Subscriber kind of a job's recovery controller
pub const CONTROLLER_APP_TYPE: &str = "controller";

/// Fault device type for NPU faults
pub const FAULT_TYPE_NPU: &str = "NPU";

/// Fault device type for switch faults
pub const FAULT_TYPE_SWITCH: &str = "Switch";

/// Default orchestrator tick period in milliseconds
pub const DEFAULT_PROCESS_PERIOD_MS: u64 = 1000;

/// Default self-recovery window in seconds
pub const DEFAULT_SELF_RECOVER_TIMEOUT_SECS: u64 = 60;

/// Default upper bound of nodes per canonical store
pub const MAX_SUPPORT_NODE_NUM: usize = 10000;

/// Default upper bound of subscribers per category center
pub const MAX_FAULT_CENTER_SUBSCRIBER: usize = 10;

/// Default notify queue depth
pub const DEFAULT_NOTIFY_QUEUE_DEPTH: usize = 1;
