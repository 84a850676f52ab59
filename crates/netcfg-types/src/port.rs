//! Switch port attributes: switchport mode and MTU.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Switchport mode of a physical port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchportMode {
    /// Single untagged VLAN.
    Access,
    /// Multiple tagged VLANs. Vendors that call this "hybrid" translate it
    /// in their driver.
    Trunk,
}

impl SwitchportMode {
    /// Returns the mode name as used in log output and CLI keywords.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SwitchportMode::Access => "access",
            SwitchportMode::Trunk => "trunk",
        }
    }
}

impl fmt::Display for SwitchportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwitchportMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "access" => Ok(SwitchportMode::Access),
            "trunk" => Ok(SwitchportMode::Trunk),
            _ => Err(ParseError::InvalidSwitchportMode(s.to_string())),
        }
    }
}

/// An explicit MTU override for a port or port-channel.
///
/// `Mtu::RESET` (0) is the sentinel used when deconfiguring: drivers treat
/// it as "remove the override" rather than as a literal MTU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mtu(u32);

impl Mtu {
    /// Sentinel requesting the switch default MTU.
    pub const RESET: Mtu = Mtu(0);

    pub const fn new(value: u32) -> Self {
        Mtu(value)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Returns true for the reset sentinel.
    pub const fn is_reset(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Mtu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Mtu {
    fn from(value: u32) -> Self {
        Mtu(value)
    }
}
