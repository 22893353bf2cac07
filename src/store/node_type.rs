//! Node type catalog
//!
//! Fixed, ordered list of resource kinds a node can represent. The numeric
//! value defines the ordering used by type-range queries and subscriptions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MemdbError, Result};

macro_rules! node_types {
    ($($variant:ident = $value:literal => $name:literal,)+) => {
        /// Kind of hardware/software resource represented by a node
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(u32)]
        pub enum NodeType {
            $($variant = $value,)+
        }

        impl NodeType {
            /// Every catalog entry in numeric order
            pub const ALL: &'static [NodeType] = &[$(NodeType::$variant,)+];

            /// Catalog name used on the wire
            pub fn as_str(self) -> &'static str {
                match self {
                    $(NodeType::$variant => $name,)+
                }
            }

            pub fn from_u32(value: u32) -> Result<Self> {
                match value {
                    $($value => Ok(NodeType::$variant),)+
                    other => Err(MemdbError::InvalidParams(format!(
                        "unknown node type {}",
                        other
                    ))),
                }
            }
        }

        impl FromStr for NodeType {
            type Err = MemdbError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(NodeType::$variant),)+
                    other => Err(MemdbError::InvalidParams(format!(
                        "unknown node type '{}'",
                        other
                    ))),
                }
            }
        }
    };
}

node_types! {
    Rmm = 0 => "RMM",
    Rack = 1 => "RACK",
    Pod = 2 => "POD",
    PodManager = 3 => "POD_MANAGER",
    Drawer = 4 => "DRAWER",
    Tray = 5 => "TRAY",
    Sled = 6 => "SLED",
    Bmc = 7 => "BMC",
    Mbp = 8 => "MBP",
    Cm = 9 => "CM",
    PowerZone = 10 => "POWER_ZONE",
    Psu = 11 => "PSU",
    ThermalZone = 12 => "THERMAL_ZONE",
    Fan = 13 => "FAN",
    Sensor = 14 => "SENSOR",
    ComputeModule = 15 => "COMPUTE_MODULE",
    Processor = 16 => "PROCESSOR",
    Memory = 17 => "MEMORY",
    StorageController = 18 => "STORAGE_CONTROLLER",
    Drive = 19 => "DRIVE",
    NetworkInterface = 20 => "NETWORK_INTERFACE",
    Switch = 21 => "SWITCH",
    SwitchPort = 22 => "SWITCH_PORT",
    Vlan = 23 => "VLAN",
    EventService = 24 => "EVENT_SERVICE",
    Subscription = 25 => "SUBSCRIPTION",
    Misc = 26 => "MISC",
}

impl NodeType {
    /// Lowest catalog entry
    pub fn min() -> NodeType {
        NodeType::ALL[0]
    }

    /// Highest catalog entry
    pub fn max() -> NodeType {
        NodeType::ALL[NodeType::ALL.len() - 1]
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
