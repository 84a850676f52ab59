//! Common network types for data switch configuration.
//!
//! This crate provides type-safe representations of the network primitives
//! shared by the topology aggregator and the switch drivers:
//!
//! - [`VlanId`]: IEEE 802.1Q VLAN identifiers
//! - [`IpAddress`]: IPv4 and IPv6 addresses
//! - [`IpPrefix`]: an address with its prefix length (CIDR notation)
//! - [`SwitchportMode`]: access / trunk port modes
//! - [`Mtu`]: per-port MTU override, including the reset sentinel

mod ip;
mod port;
mod vlan;

pub use ip::{IpAddress, IpPrefix};
pub use port::{Mtu, SwitchportMode};
pub use vlan::VlanId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),

    #[error("invalid switchport mode: {0}")]
    InvalidSwitchportMode(String),
}
