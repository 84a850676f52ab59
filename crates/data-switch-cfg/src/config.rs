//! Cluster definition model.
//!
//! A direct serde mapping of the parts of `config.yml` that describe data
//! switches, host interfaces and node templates. Interfaces may be written
//! with Debian keys (`iface`, `bond_mode`, `bond_master`, `vlan_raw_device`,
//! `mtu`) or RHEL keys (`DEVICE`, `BONDING_MASTER`, `MASTER`, `VLAN`, `MTU`).

use netcfg_common::{AccessInfo, DriverMode};
use netcfg_types::{IpAddress, Mtu, VlanId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// The cluster definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub deployer: Deployer,
    #[serde(default)]
    pub switches: Switches,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub node_templates: Vec<NodeTemplate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployer {
    #[serde(default)]
    pub networks: Networks,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Networks {
    #[serde(default)]
    pub mgmt: Vec<MgmtNetwork>,
}

/// Deployer management network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MgmtNetwork {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_ipaddr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Switches {
    #[serde(default)]
    pub data: Vec<SwitchRecord>,
}

/// One data switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchRecord {
    pub label: String,
    /// Vendor class, the driver registry key.
    #[serde(rename = "class")]
    pub vendor: String,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub mode: DriverMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outfile: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mlag_peer: Option<String>,
    #[serde(default)]
    pub mlag_master: bool,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Switch-to-switch link. The link to an MLAG peer carries the IPL settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub target: String,
    #[serde(default)]
    pub ports: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<VlanId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vip: Option<IpAddress>,
}

/// Host interface definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond_master: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_raw_device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,

    #[serde(rename = "DEVICE", default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Presence marks a bond; the value is not interpreted.
    #[serde(rename = "BONDING_MASTER", default, skip_serializing_if = "Option::is_none")]
    pub bonding_master: Option<serde_yaml::Value>,
    #[serde(rename = "MASTER", default, skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    /// Presence marks a VLAN device; the value is not interpreted.
    #[serde(rename = "VLAN", default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<serde_yaml::Value>,
    #[serde(rename = "MTU", default, skip_serializing_if = "Option::is_none")]
    pub rhel_mtu: Option<u32>,
}

/// A VLAN device resolved from an interface definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlanDevice {
    pub vlan: VlanId,
    pub raw_device: String,
}

impl Interface {
    /// Device name under either schema.
    pub fn device_name(&self) -> Option<&str> {
        self.iface.as_deref().or(self.device.as_deref())
    }

    pub fn is_bond(&self) -> bool {
        self.bond_mode.is_some() || self.bonding_master.is_some()
    }

    /// Device name of the bond this interface is enslaved to.
    pub fn master_device(&self) -> Option<&str> {
        self.bond_master.as_deref().or(self.master.as_deref())
    }

    /// Resolves the VLAN id and raw device of a VLAN interface.
    ///
    /// The id is the suffix after the last `.` of the device name. Debian
    /// definitions name the raw device explicitly; RHEL definitions use the
    /// device name prefix.
    pub fn vlan_device(&self) -> ConfigResult<Option<VlanDevice>> {
        if self.vlan_raw_device.is_none() && self.vlan.is_none() {
            return Ok(None);
        }
        let device = self.device_name().unwrap_or_default();
        let invalid = || ConfigError::InvalidVlanInterface {
            label: self.label.clone(),
            device: device.to_string(),
        };
        let (prefix, vlan) = VlanId::split_iface(device)
            .ok_or_else(invalid)?
            .map_err(|_| invalid())?;
        let raw_device = match &self.vlan_raw_device {
            Some(raw) => raw.clone(),
            None => prefix.to_string(),
        };
        Ok(Some(VlanDevice { vlan, raw_device }))
    }

    /// Explicit MTU, if any. Zero means no override.
    pub fn mtu(&self) -> Option<Mtu> {
        self.mtu
            .or(self.rhel_mtu)
            .filter(|mtu| *mtu != 0)
            .map(Mtu::new)
    }
}

/// A class of nodes sharing one wiring pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeTemplate {
    pub label: String,
    /// Interface labels configured on the nodes.
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub physical_interfaces: PhysicalInterfaces,
}

impl NodeTemplate {
    pub fn has_interface(&self, label: &str) -> bool {
        self.interfaces.iter().any(|ifc| ifc == label)
    }

    /// Data-switch bindings, in definition order.
    pub fn bindings(&self) -> &[PhysicalInterfaceBinding] {
        &self.physical_interfaces.data
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhysicalInterfaces {
    #[serde(default)]
    pub data: Vec<PhysicalInterfaceBinding>,
}

/// Node interface wired to a switch: one port per node of the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalInterfaceBinding {
    pub switch: String,
    pub interface: String,
    #[serde(default)]
    pub ports: Vec<u32>,
}

impl ClusterConfig {
    /// Loads and validates a config file.
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_yaml_str(&text)
    }

    /// Parses and validates a config document.
    pub fn from_yaml_str(text: &str) -> ConfigResult<Self> {
        let config: ClusterConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross references the aggregator relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut labels = BTreeSet::new();
        for sw in &self.switches.data {
            if !labels.insert(sw.label.as_str()) {
                return Err(ConfigError::DuplicateSwitch {
                    label: sw.label.clone(),
                });
            }
        }

        for sw in &self.switches.data {
            let Some(peer_label) = sw.mlag_peer.as_deref() else {
                continue;
            };
            let peer = self.data_switch(peer_label).ok_or_else(|| {
                ConfigError::unknown_switch(peer_label, format!("mlag_peer of {}", sw.label))
            })?;
            if peer.mlag_peer.as_deref() != Some(sw.label.as_str()) {
                return Err(ConfigError::AsymmetricMlagPeer {
                    switch: sw.label.clone(),
                    peer: peer.label.clone(),
                    peer_of_peer: peer.mlag_peer.clone(),
                });
            }
            if sw.mlag_master && peer.mlag_master {
                return Err(ConfigError::ConflictingMlagMaster {
                    switch: sw.label.clone(),
                    peer: peer.label.clone(),
                });
            }
        }

        for tmpl in &self.node_templates {
            for binding in tmpl.bindings() {
                if self.data_switch(&binding.switch).is_none() {
                    return Err(ConfigError::unknown_switch(
                        &binding.switch,
                        format!("node template {}", tmpl.label),
                    ));
                }
                if self.interface(&binding.interface).is_none() {
                    return Err(ConfigError::unknown_interface(
                        &binding.interface,
                        format!("node template {}", tmpl.label),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interface(&self, label: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|ifc| ifc.label == label)
    }

    pub fn node_templates(&self) -> &[NodeTemplate] {
        &self.node_templates
    }

    pub fn data_switches(&self) -> &[SwitchRecord] {
        &self.switches.data
    }

    pub fn data_switch(&self, label: &str) -> Option<&SwitchRecord> {
        self.switches.data.iter().find(|sw| sw.label == label)
    }

    /// MLAG peer label of a switch, if it has one.
    pub fn mlag_peer(&self, label: &str) -> Option<&str> {
        self.data_switch(label)?.mlag_peer.as_deref()
    }

    /// Elects the master of a switch and its (optional) MLAG peer.
    ///
    /// A switch without a peer is its own master. Otherwise the member
    /// flagged `mlag_master` wins, else the lexicographically smaller label.
    pub fn master_switch<'a>(&'a self, switch: &'a str, peer: Option<&'a str>) -> &'a str {
        let Some(peer) = peer else {
            return switch;
        };
        let flagged = |label: &str| self.data_switch(label).is_some_and(|sw| sw.mlag_master);
        if flagged(switch) {
            switch
        } else if flagged(peer) {
            peer
        } else {
            switch.min(peer)
        }
    }

    /// Prefix length of the first management network.
    pub fn mgmt_prefix(&self) -> ConfigResult<u8> {
        self.deployer
            .networks
            .mgmt
            .iter()
            .find_map(|net| net.prefix)
            .ok_or(ConfigError::MissingMgmtNetwork)
    }

    /// Driver construction data for every data switch, in config order.
    pub fn access_info(&self) -> Vec<AccessInfo> {
        self.switches
            .data
            .iter()
            .map(|sw| AccessInfo {
                label: sw.label.clone(),
                vendor: sw.vendor.clone(),
                host: sw.hostname.clone(),
                userid: sw.userid.clone(),
                password: sw.password.clone(),
                mode: sw.mode,
                outfile: sw.outfile.clone(),
            })
            .collect()
    }

    /// Bond label to slave labels, in interface order.
    pub fn bond_slaves(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut bonds = BTreeMap::new();
        for bond in self.interfaces.iter().filter(|ifc| ifc.is_bond()) {
            let Some(device) = bond.device_name() else {
                continue;
            };
            let slaves: Vec<&str> = self
                .interfaces
                .iter()
                .filter(|ifc| ifc.master_device() == Some(device))
                .map(|ifc| ifc.label.as_str())
                .collect();
            if !slaves.is_empty() {
                bonds.insert(bond.label.as_str(), slaves);
            }
        }
        bonds
    }
}
