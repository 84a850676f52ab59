//! Test fixtures for data switch scenarios
//!
//! Provides a builder for cluster definitions and reusable scenarios
//! covering plain VLAN trunking, LAG bonds and MLAG pairs.

use data_switch_cfg::config::{
    Link, MgmtNetwork, PhysicalInterfaceBinding, PhysicalInterfaces, SwitchRecord,
};
use data_switch_cfg::{ClusterConfig, ConfigResult, Interface, NodeTemplate};
use netcfg_common::DriverMode;
use netcfg_types::{IpAddress, VlanId};

/// IPL settings of one MLAG member.
#[derive(Debug, Clone)]
pub struct IplSide {
    pub ports: Vec<u32>,
    pub vlan: u16,
    pub ip: &'static str,
    pub prefix: u8,
    pub vip: Option<&'static str>,
}

impl IplSide {
    pub fn new(ports: &[u32], vlan: u16, ip: &'static str, prefix: u8) -> Self {
        Self {
            ports: ports.to_vec(),
            vlan,
            ip,
            prefix,
            vip: None,
        }
    }

    pub fn with_vip(mut self, vip: &'static str) -> Self {
        self.vip = Some(vip);
        self
    }

    fn link(&self, target: &str) -> Link {
        Link {
            target: target.to_string(),
            ports: self.ports.clone(),
            vlan: VlanId::new(self.vlan).ok(),
            ip: self.ip.parse::<IpAddress>().ok(),
            prefix: Some(self.prefix),
            vip: self.vip.and_then(|vip| vip.parse::<IpAddress>().ok()),
        }
    }
}

/// Builds cluster definitions for tests.
#[derive(Debug, Clone)]
pub struct ClusterBuilder {
    config: ClusterConfig,
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterBuilder {
    /// Empty cluster with a /24 management network.
    pub fn new() -> Self {
        let mut config = ClusterConfig::default();
        config.deployer.networks.mgmt.push(MgmtNetwork {
            device: Some("eth1".to_string()),
            interface_ipaddr: Some("192.168.5.2".to_string()),
            prefix: Some(24),
        });
        Self { config }
    }

    pub fn mgmt_prefix(mut self, prefix: u8) -> Self {
        if let Some(net) = self.config.deployer.networks.mgmt.first_mut() {
            net.prefix = Some(prefix);
        }
        self
    }

    /// Adds a passive-mode Mellanox switch.
    pub fn switch(mut self, label: &str) -> Self {
        let host = 20 + self.config.switches.data.len();
        self.config.switches.data.push(SwitchRecord {
            label: label.to_string(),
            vendor: "mellanox".to_string(),
            hostname: format!("192.168.5.{}", host),
            userid: Some("admin".to_string()),
            password: None,
            mode: DriverMode::Passive,
            outfile: None,
            mlag_peer: None,
            mlag_master: false,
            links: Vec::new(),
        });
        self
    }

    /// Pairs two existing switches; `master` is flagged `mlag_master`.
    pub fn mlag_pair(
        mut self,
        master: &str,
        master_ipl: IplSide,
        peer: &str,
        peer_ipl: IplSide,
    ) -> Self {
        for (label, partner, ipl, flagged) in [
            (master, peer, &master_ipl, true),
            (peer, master, &peer_ipl, false),
        ] {
            if let Some(sw) = self
                .config
                .switches
                .data
                .iter_mut()
                .find(|sw| sw.label == label)
            {
                sw.mlag_peer = Some(partner.to_string());
                sw.mlag_master = flagged;
                sw.links.push(ipl.link(partner));
            }
        }
        self
    }

    pub fn interface(mut self, interface: Interface) -> Self {
        self.config.interfaces.push(interface);
        self
    }

    /// Adds a node template wiring each interface to switch ports, one port
    /// per node.
    pub fn template(mut self, label: &str, bindings: &[(&str, &str, &[u32])]) -> Self {
        let mut interfaces: Vec<String> = Vec::new();
        let mut data = Vec::new();
        for (switch, interface, ports) in bindings {
            if !interfaces.iter().any(|ifc| ifc == interface) {
                interfaces.push(interface.to_string());
            }
            data.push(PhysicalInterfaceBinding {
                switch: switch.to_string(),
                interface: interface.to_string(),
                ports: ports.to_vec(),
            });
        }
        self.config.node_templates.push(NodeTemplate {
            label: label.to_string(),
            interfaces,
            physical_interfaces: PhysicalInterfaces { data },
        });
        self
    }

    /// Lists an interface on a template without wiring it to a switch.
    pub fn template_interface(mut self, template: &str, interface: &str) -> Self {
        if let Some(tmpl) = self
            .config
            .node_templates
            .iter_mut()
            .find(|tmpl| tmpl.label == template)
        {
            tmpl.interfaces.push(interface.to_string());
        }
        self
    }

    /// Validates and returns the cluster definition.
    pub fn build(self) -> ConfigResult<ClusterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the definition without validation.
    pub fn build_unchecked(self) -> ClusterConfig {
        self.config
    }
}

/// Physical interface.
pub fn physical(label: &str) -> Interface {
    Interface {
        label: label.to_string(),
        iface: Some(label.to_string()),
        ..Default::default()
    }
}

/// 802.3ad bond.
pub fn bond(label: &str) -> Interface {
    Interface {
        label: label.to_string(),
        iface: Some(label.to_string()),
        bond_mode: Some("802.3ad".to_string()),
        ..Default::default()
    }
}

/// Bond slave.
pub fn bond_slave(label: &str, master: &str) -> Interface {
    Interface {
        bond_master: Some(master.to_string()),
        ..physical(label)
    }
}

/// VLAN device named `<raw>.<vlan>`.
pub fn vlan_device(raw: &str, vlan: u16) -> Interface {
    let label = format!("{}.{}", raw, vlan);
    Interface {
        label: label.clone(),
        iface: Some(label),
        vlan_raw_device: Some(raw.to_string()),
        ..Default::default()
    }
}

/// Sets an explicit MTU.
pub fn with_mtu(interface: Interface, mtu: u32) -> Interface {
    Interface {
        mtu: Some(mtu),
        ..interface
    }
}

/// Reusable cluster scenarios
pub mod scenarios {
    use super::*;

    /// One switch; `eth0.100` trunked onto port 5.
    pub fn single_vlan() -> ClusterBuilder {
        ClusterBuilder::new()
            .switch("data_1")
            .interface(physical("eth0"))
            .interface(vlan_device("eth0", 100))
            .template("compute", &[("data_1", "eth0.100", &[5])])
    }

    /// Two VLANs on the same ports across two nodes, with the raw device
    /// carrying the MTU.
    pub fn shared_vlans() -> ClusterBuilder {
        ClusterBuilder::new()
            .switch("data_1")
            .interface(with_mtu(physical("eth0"), 9000))
            .interface(vlan_device("eth0", 20))
            .interface(vlan_device("eth0", 30))
            .template(
                "compute",
                &[
                    ("data_1", "eth0", &[5, 6]),
                    ("data_1", "eth0.20", &[5, 6]),
                    ("data_1", "eth0.30", &[5, 6]),
                ],
            )
    }

    /// One switch; `bond0` over `eth10`/`eth11` forms LAG [10, 11].
    pub fn single_lag() -> ClusterBuilder {
        ClusterBuilder::new()
            .switch("data_1")
            .interface(bond("bond0"))
            .interface(bond_slave("eth10", "bond0"))
            .interface(bond_slave("eth11", "bond0"))
            .interface(vlan_device("bond0", 20))
            .template(
                "compute",
                &[("data_1", "eth10", &[10]), ("data_1", "eth11", &[11])],
            )
            .template_interface("compute", "bond0")
            .template_interface("compute", "bond0.20")
    }

    /// MLAG pair `data_1` (master) / `data_2`, IPL on ports 29-30, with a
    /// bond split across both switches.
    pub fn mlag_pair() -> ClusterBuilder {
        ClusterBuilder::new()
            .switch("data_1")
            .switch("data_2")
            .mlag_pair(
                "data_1",
                IplSide::new(&[29, 30], 4000, "10.0.0.1", 30),
                "data_2",
                IplSide::new(&[29, 30], 4000, "10.0.0.2", 30).with_vip("192.168.5.254"),
            )
            .interface(bond("bond0"))
            .interface(with_mtu(bond_slave("eth10", "bond0"), 9000))
            .interface(with_mtu(bond_slave("eth11", "bond0"), 9000))
            .interface(vlan_device("bond0", 20))
            .template(
                "compute",
                &[("data_1", "eth10", &[7, 8]), ("data_2", "eth11", &[3, 4])],
            )
            .template_interface("compute", "bond0")
            .template_interface("compute", "bond0.20")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_switches() {
        let cfg = ClusterBuilder::new()
            .switch("data_1")
            .switch("data_2")
            .build()
            .unwrap();
        let hosts: Vec<&str> = cfg
            .data_switches()
            .iter()
            .map(|sw| sw.hostname.as_str())
            .collect();
        assert_eq!(hosts, vec!["192.168.5.20", "192.168.5.21"]);
        assert_eq!(cfg.mgmt_prefix().unwrap(), 24);
    }

    #[test]
    fn test_mlag_pair_fixture() {
        let cfg = scenarios::mlag_pair().build().unwrap();
        assert_eq!(cfg.mlag_peer("data_1"), Some("data_2"));
        assert_eq!(cfg.mlag_peer("data_2"), Some("data_1"));
        assert_eq!(cfg.master_switch("data_2", Some("data_1")), "data_1");
    }

    #[test]
    fn test_unknown_switch_rejected() {
        let result = ClusterBuilder::new()
            .switch("data_1")
            .interface(physical("eth0"))
            .template("compute", &[("data_9", "eth0", &[5])])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_vlan_device_helper() {
        let ifc = vlan_device("bond0", 20);
        assert_eq!(ifc.label, "bond0.20");
        let dev = ifc.vlan_device().unwrap().unwrap();
        assert_eq!(dev.vlan.as_u16(), 20);
        assert_eq!(dev.raw_device, "bond0");
    }
}
