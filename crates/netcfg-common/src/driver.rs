//! Switch driver trait and the data it is constructed from.
//!
//! A [`SwitchDriver`] is the capability set the reconciliation layer drives.
//! One instance exists per data switch for the duration of a configuration
//! pass; calls are issued strictly one at a time.

use async_trait::async_trait;
use netcfg_types::{IpAddress, IpPrefix, Mtu, SwitchportMode, VlanId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::SwitchResult;

/// How a driver delivers commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverMode {
    /// Commands are sent to the switch and verified where possible.
    #[default]
    Active,
    /// Commands are appended to a file; queries report "not configured".
    Passive,
}

impl DriverMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DriverMode::Active => "active",
            DriverMode::Passive => "passive",
        }
    }
}

impl fmt::Display for DriverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to construct a driver for one switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessInfo {
    /// Switch label as used throughout the cluster definition.
    pub label: String,
    /// Vendor class, the key into the driver registry.
    pub vendor: String,
    /// Management address or hostname.
    pub host: String,
    pub userid: Option<String>,
    pub password: Option<String>,
    pub mode: DriverMode,
    /// Passive-mode command file.
    pub outfile: Option<PathBuf>,
}

impl AccessInfo {
    /// Command file used in passive mode when none is configured.
    pub fn outfile_or_default(&self) -> PathBuf {
        self.outfile
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("switch_cmds_{}.txt", self.label)))
    }
}

/// Parameters for bringing up MLAG on one member of a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MlagParams {
    /// VLAN carrying the inter-peer link (IPL).
    pub vlan: VlanId,
    /// Port-channel number used for the IPL. Both members use the same
    /// number, derived from the master's IPL ports.
    pub port_channel: u32,
    /// This member's IPL address.
    pub ipl_cidr: IpPrefix,
    /// The partner's IPL address.
    pub peer_ip: IpAddress,
    /// MLAG virtual IP; only the non-master member carries one.
    pub vip: Option<IpPrefix>,
    /// Physical ports bundled into the IPL port-channel.
    pub ipl_ports: Vec<u32>,
}

/// Capability set of a data switch driver.
///
/// Port-channel numbers are plain integers; by convention they equal the
/// lowest physical port in the channel.
#[async_trait]
pub trait SwitchDriver: Send {
    /// Returns the vendor class this driver implements.
    fn vendor(&self) -> &str;

    async fn create_vlan(&mut self, vlan: VlanId) -> SwitchResult<()>;

    async fn delete_vlan(&mut self, vlan: VlanId) -> SwitchResult<()>;

    async fn set_switchport_mode(&mut self, port: u32, mode: SwitchportMode) -> SwitchResult<()>;

    /// Allows every VLAN in `vlans` on a trunk port.
    async fn add_vlans_to_port(&mut self, port: u32, vlans: &[VlanId]) -> SwitchResult<()>;

    async fn remove_vlans_from_port(&mut self, port: u32, vlans: &[VlanId]) -> SwitchResult<()>;

    /// Sets a port MTU. [`Mtu::RESET`] restores the switch default.
    async fn set_mtu_for_port(&mut self, port: u32, mtu: Mtu) -> SwitchResult<()>;

    /// Returns true if an MLAG inter-peer link is already configured.
    async fn is_mlag_configured(&mut self) -> SwitchResult<bool>;

    async fn configure_mlag(&mut self, params: &MlagParams) -> SwitchResult<()>;

    async fn enable_mlag(&mut self) -> SwitchResult<()>;

    /// Tears down the MLAG configuration. Stops all MLAG traffic.
    async fn deconfigure_mlag(&mut self) -> SwitchResult<()>;

    async fn create_lag_interface(&mut self, channel: u32) -> SwitchResult<()>;

    async fn remove_lag_interface(&mut self, channel: u32) -> SwitchResult<()>;

    /// Removes the channel-group binding from a physical port.
    async fn remove_channel_group(&mut self, port: u32) -> SwitchResult<()>;

    async fn bind_ports_to_lag_interface(&mut self, ports: &[u32], channel: u32)
        -> SwitchResult<()>;

    async fn add_vlans_to_lag_port_channel(
        &mut self,
        channel: u32,
        vlans: &[VlanId],
    ) -> SwitchResult<()>;

    async fn set_mtu_for_lag_port_channel(&mut self, channel: u32, mtu: Mtu) -> SwitchResult<()>;

    async fn create_mlag_interface(&mut self, channel: u32) -> SwitchResult<()>;

    async fn remove_mlag_interface(&mut self, channel: u32) -> SwitchResult<()>;

    async fn bind_port_to_mlag_interface(&mut self, port: u32, channel: u32) -> SwitchResult<()>;

    async fn add_vlans_to_mlag_port_channel(
        &mut self,
        channel: u32,
        vlans: &[VlanId],
    ) -> SwitchResult<()>;

    async fn set_mtu_for_mlag_port_channel(&mut self, channel: u32, mtu: Mtu)
        -> SwitchResult<()>;
}
