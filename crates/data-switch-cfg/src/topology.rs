//! Topology aggregation.
//!
//! Derives the views reconciliation works from: VLANs per port, explicit
//! MTUs, LAG/MLAG port-channel groups, and MLAG pairs. Aggregation only
//! reads the cluster definition, so repeated calls give identical views.

use netcfg_types::{IpAddress, IpPrefix, VlanId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::config::{ClusterConfig, SwitchRecord};
use crate::error::{ConfigError, ConfigResult};
use crate::views::{
    ChannelGroup, ChannelGroups, MlagMember, MlagPair, MtuList, PortGroup, PortVlans, Topology,
    VlanList,
};

/// A bond and the labels of its slave interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bond {
    pub label: String,
    pub slaves: Vec<String>,
}

/// IPL settings read from a switch's link to its MLAG partner.
struct IplLink {
    vlan: VlanId,
    ports: PortGroup,
    cidr: IpPrefix,
    vip: Option<IpAddress>,
}

/// Builds topology views from a cluster definition.
pub struct TopologyAggregator<'a> {
    config: &'a ClusterConfig,
}

impl<'a> TopologyAggregator<'a> {
    pub fn new(config: &'a ClusterConfig) -> Self {
        Self { config }
    }

    /// Bonds with at least one slave, by label.
    pub fn bonds(&self) -> Vec<Bond> {
        let bonds: Vec<Bond> = self
            .config
            .bond_slaves()
            .into_iter()
            .map(|(label, slaves)| Bond {
                label: label.to_string(),
                slaves: slaves.into_iter().map(str::to_string).collect(),
            })
            .collect();
        debug!(?bonds, "Bonds");
        bonds
    }

    /// Groups bond slave ports into port-channels.
    ///
    /// Within a (bond, template), the port lists of the slaves bound to one
    /// switch are zipped: the i-th port of every slave forms the i-th group.
    /// Groups are then filed under the elected master of the switch and its
    /// MLAG peer, so an MLAG pair shares one entry.
    pub fn port_channel_groups(&self) -> ConfigResult<ChannelGroups> {
        let mut grouped: BTreeMap<(String, String, String), BTreeMap<String, Vec<PortGroup>>> =
            BTreeMap::new();

        for bond in self.bonds() {
            for tmpl in self.config.node_templates() {
                if !tmpl.has_interface(&bond.label) {
                    continue;
                }

                let mut slave_ports: BTreeMap<&str, Vec<&[u32]>> = BTreeMap::new();
                for binding in tmpl.bindings() {
                    if bond.slaves.contains(&binding.interface) {
                        slave_ports
                            .entry(binding.switch.as_str())
                            .or_default()
                            .push(&binding.ports);
                    }
                }

                for (switch, lists) in slave_ports {
                    let master = self
                        .config
                        .master_switch(switch, self.config.mlag_peer(switch));
                    grouped
                        .entry((bond.label.clone(), tmpl.label.clone(), master.to_string()))
                        .or_default()
                        .entry(switch.to_string())
                        .or_default()
                        .extend(transpose(&lists));
                }
            }
        }

        let mut groups = Vec::with_capacity(grouped.len());
        for ((bond, template, master_switch), members) in grouped {
            let group = ChannelGroup {
                bond,
                template,
                master_switch,
                members,
            };
            check_channel_group(&group)?;
            groups.push(group);
        }
        debug!(?groups, "Port channel groups");
        Ok(groups)
    }

    /// Ports carrying each VLAN, per switch.
    ///
    /// For every VLAN interface of a template, the ports bound to the VLAN
    /// interface itself or to any slave of its raw device carry the VLAN.
    /// Ports bound to the raw device alone do not.
    pub fn vlan_list(&self) -> ConfigResult<VlanList> {
        let mut vlan_list = VlanList::new();

        for tmpl in self.config.node_templates() {
            for label in &tmpl.interfaces {
                let Some(ifc) = self.config.interface(label) else {
                    debug!(interface = %label, template = %tmpl.label, "Interface not defined");
                    continue;
                };
                let Some(vlan_dev) = ifc.vlan_device()? else {
                    continue;
                };

                let mut members: BTreeSet<&str> = BTreeSet::from([ifc.label.as_str()]);
                members.extend(
                    self.config
                        .interfaces()
                        .iter()
                        .filter(|other| {
                            other.master_device() == Some(vlan_dev.raw_device.as_str())
                        })
                        .map(|other| other.label.as_str()),
                );

                for binding in tmpl.bindings() {
                    if members.contains(binding.interface.as_str()) {
                        vlan_list
                            .entry(binding.switch.clone())
                            .or_default()
                            .entry(vlan_dev.vlan)
                            .or_default()
                            .extend(&binding.ports);
                    }
                }
            }
        }
        debug!(?vlan_list, "VLAN list");
        Ok(vlan_list)
    }

    /// VLANs per port, each VLAN once per port.
    pub fn port_vlans(&self) -> ConfigResult<PortVlans> {
        let mut port_vlans = PortVlans::new();
        for (switch, vlans) in self.vlan_list()? {
            let ports = port_vlans.entry(switch).or_default();
            for (vlan, vlan_ports) in vlans {
                for port in vlan_ports {
                    let entry = ports.entry(port).or_default();
                    if !entry.contains(&vlan) {
                        entry.push(vlan);
                    }
                }
            }
        }
        debug!(?port_vlans, "Port VLANs");
        Ok(port_vlans)
    }

    /// Ports with an explicit MTU, per switch and MTU.
    pub fn mtu_list(&self) -> MtuList {
        let mut mtu_list = MtuList::new();
        for tmpl in self.config.node_templates() {
            for binding in tmpl.bindings() {
                let Some(mtu) = self
                    .config
                    .interface(&binding.interface)
                    .and_then(|ifc| ifc.mtu())
                else {
                    continue;
                };
                mtu_list
                    .entry(binding.switch.clone())
                    .or_default()
                    .entry(mtu)
                    .or_default()
                    .extend(&binding.ports);
            }
        }
        debug!(?mtu_list, "MTU list");
        mtu_list
    }

    /// MLAG pairs, in the config order of their masters.
    pub fn mlag_info(&self) -> ConfigResult<Vec<MlagPair>> {
        let mut pairs = Vec::new();

        for sw in self.config.data_switches() {
            let Some(peer_label) = sw.mlag_peer.as_deref() else {
                continue;
            };
            if self.config.master_switch(&sw.label, Some(peer_label)) != sw.label {
                continue;
            }
            let peer = self.config.data_switch(peer_label).ok_or_else(|| {
                ConfigError::unknown_switch(peer_label, format!("mlag_peer of {}", sw.label))
            })?;

            let master_link = ipl_link(sw, peer_label)?;
            let peer_link = ipl_link(peer, &sw.label)?;
            let peer_vip = match peer_link.vip {
                Some(vip) => Some(IpPrefix::new(vip, self.config.mgmt_prefix()?)?),
                None => None,
            };

            pairs.push(MlagPair {
                master: MlagMember {
                    switch: sw.label.clone(),
                    vlan: master_link.vlan,
                    vip: None,
                    peer_ip: *peer_link.cidr.address(),
                    ports: master_link.ports,
                    cidr: master_link.cidr,
                },
                peer: MlagMember {
                    switch: peer.label.clone(),
                    vlan: peer_link.vlan,
                    vip: peer_vip,
                    peer_ip: *master_link.cidr.address(),
                    ports: peer_link.ports,
                    cidr: peer_link.cidr,
                },
            });
        }
        debug!(?pairs, "MLAG pairs");
        Ok(pairs)
    }

    /// Builds all views.
    pub fn build(&self) -> ConfigResult<Topology> {
        Ok(Topology {
            port_vlans: self.port_vlans()?,
            mtu_list: self.mtu_list(),
            channel_groups: self.port_channel_groups()?,
            mlag_pairs: self.mlag_info()?,
        })
    }
}

/// Zips slave port lists into port groups, truncating to the shortest list.
fn transpose(lists: &[&[u32]]) -> Vec<PortGroup> {
    let len = lists.iter().map(|ports| ports.len()).min().unwrap_or(0);
    (0..len)
        .filter_map(|idx| PortGroup::new(lists.iter().map(|ports| ports[idx]).collect()))
        .collect()
}

fn check_channel_group(group: &ChannelGroup) -> ConfigResult<()> {
    match group.members.len() {
        0 | 1 => Ok(()),
        2 => {
            let master_groups = group.members.get(&group.master_switch);
            let peer = group
                .members
                .iter()
                .find(|(switch, _)| **switch != group.master_switch);
            match (master_groups, peer) {
                (Some(master_groups), Some((_, peer_groups)))
                    if master_groups.len() == peer_groups.len() =>
                {
                    Ok(())
                }
                (_, peer) => Err(ConfigError::MisalignedMlagGroups {
                    bond: group.bond.clone(),
                    template: group.template.clone(),
                    master: group.master_switch.clone(),
                    peer: peer.map(|(switch, _)| switch.clone()).unwrap_or_default(),
                }),
            }
        }
        count => Err(ConfigError::MlagMembership {
            bond: group.bond.clone(),
            template: group.template.clone(),
            master: group.master_switch.clone(),
            count,
        }),
    }
}

fn ipl_link(sw: &SwitchRecord, partner: &str) -> ConfigResult<IplLink> {
    let link = sw
        .links
        .iter()
        .find(|link| link.target == partner)
        .ok_or_else(|| ConfigError::MissingMlagLink {
            switch: sw.label.clone(),
            peer: partner.to_string(),
        })?;
    let incomplete = |field| ConfigError::IncompleteMlagLink {
        switch: sw.label.clone(),
        peer: partner.to_string(),
        field,
    };

    let vlan = link.vlan.ok_or_else(|| incomplete("vlan"))?;
    let ports = PortGroup::new(link.ports.clone()).ok_or_else(|| incomplete("ports"))?;
    let ip = link.ip.ok_or_else(|| incomplete("ip"))?;
    let prefix = link.prefix.ok_or_else(|| incomplete("prefix"))?;

    Ok(IplLink {
        vlan,
        ports,
        cidr: IpPrefix::new(ip, prefix)?,
        vip: link.vip,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicalInterfaceBinding;
    use netcfg_types::Mtu;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = r#"
deployer:
  networks:
    mgmt:
      - prefix: 24
switches:
  data:
    - label: data_1
      class: mellanox
      hostname: 10.0.0.5
      mlag_peer: data_2
      links:
        - target: data_2
          ports: [30, 29]
          vlan: 4000
          ip: 10.0.0.1
          prefix: 30
    - label: data_2
      class: mellanox
      hostname: 10.0.0.6
      mlag_peer: data_1
      links:
        - target: data_1
          ports: [31, 32]
          vlan: 4000
          ip: 10.0.0.2
          prefix: 30
          vip: 192.168.5.254
    - label: data_3
      class: mellanox
      hostname: 10.0.0.7
interfaces:
  - label: bond0
    iface: bond0
    bond_mode: 802.3ad
  - label: eth10
    iface: eth10
    bond_master: bond0
    mtu: 9000
  - label: eth11
    iface: eth11
    bond_master: bond0
    mtu: 9000
  - label: bond0.20
    iface: bond0.20
    vlan_raw_device: bond0
  - label: bond1
    DEVICE: bond1
    BONDING_MASTER: yes
  - label: eth20
    DEVICE: eth20
    MASTER: bond1
  - label: eth21
    DEVICE: eth21
    MASTER: bond1
  - label: eth0
    iface: eth0
  - label: eth0.100
    iface: eth0.100
    vlan_raw_device: eth0
node_templates:
  - label: compute
    interfaces: [bond0, bond0.20]
    physical_interfaces:
      data:
        - switch: data_1
          interface: eth10
          ports: [5, 6]
        - switch: data_2
          interface: eth11
          ports: [5, 6]
  - label: storage
    interfaces: [bond1, eth0.100]
    physical_interfaces:
      data:
        - switch: data_3
          interface: eth20
          ports: [10, 12]
        - switch: data_3
          interface: eth21
          ports: [11, 13, 15]
        - switch: data_3
          interface: eth0.100
          ports: [7]
"#;

    fn config() -> ClusterConfig {
        ClusterConfig::from_yaml_str(CONFIG).unwrap()
    }

    fn vlan(id: u16) -> VlanId {
        VlanId::new(id).unwrap()
    }

    fn ports(groups: &[PortGroup]) -> Vec<Vec<u32>> {
        groups.iter().map(|g| g.ports().to_vec()).collect()
    }

    #[test]
    fn test_bonds() {
        let cfg = config();
        let bonds = TopologyAggregator::new(&cfg).bonds();
        assert_eq!(bonds.len(), 2);
        assert_eq!(bonds[0].label, "bond0");
        assert_eq!(bonds[0].slaves, vec!["eth10", "eth11"]);
        assert_eq!(bonds[1].slaves, vec!["eth20", "eth21"]);
    }

    #[test]
    fn test_port_channel_groups() {
        let cfg = config();
        let groups = TopologyAggregator::new(&cfg).port_channel_groups().unwrap();
        assert_eq!(groups.len(), 2);

        let mlag = &groups[0];
        assert_eq!(mlag.bond, "bond0");
        assert_eq!(mlag.template, "compute");
        assert_eq!(mlag.master_switch, "data_1");
        assert!(mlag.is_mlag());
        assert_eq!(ports(&mlag.members["data_1"]), vec![vec![5], vec![6]]);
        assert_eq!(ports(&mlag.members["data_2"]), vec![vec![5], vec![6]]);

        // zip truncates to the shortest slave list
        let lag = &groups[1];
        assert_eq!(lag.master_switch, "data_3");
        assert!(!lag.is_mlag());
        assert_eq!(
            ports(&lag.members["data_3"]),
            vec![vec![10, 11], vec![12, 13]]
        );
    }

    #[test]
    fn test_port_channel_groups_stable() {
        let cfg = config();
        let agg = TopologyAggregator::new(&cfg);
        assert_eq!(
            agg.port_channel_groups().unwrap(),
            agg.port_channel_groups().unwrap()
        );
    }

    #[test]
    fn test_bond_without_bindings_skipped() {
        let mut cfg = config();
        cfg.node_templates[1].physical_interfaces.data.clear();
        let groups = TopologyAggregator::new(&cfg).port_channel_groups().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].bond, "bond0");
    }

    #[test]
    fn test_misaligned_mlag_groups() {
        let mut cfg = config();
        cfg.node_templates[0].physical_interfaces.data[1].ports = vec![5];
        let err = TopologyAggregator::new(&cfg)
            .port_channel_groups()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MisalignedMlagGroups { .. }));
    }

    #[test]
    fn test_mlag_membership_limit() {
        let mut cfg = config();
        // data_3 points at data_1 as its peer, so all three elect data_1
        cfg.switches.data[2].mlag_peer = Some("data_1".to_string());
        cfg.switches.data[0].mlag_master = true;
        cfg.node_templates[0]
            .physical_interfaces
            .data
            .push(PhysicalInterfaceBinding {
                switch: "data_3".to_string(),
                interface: "eth11".to_string(),
                ports: vec![20, 21],
            });
        let err = TopologyAggregator::new(&cfg)
            .port_channel_groups()
            .unwrap_err();
        match err {
            ConfigError::MlagMembership { master, count, .. } => {
                assert_eq!(master, "data_1");
                assert_eq!(count, 3);
            }
            other => panic!("Expected MlagMembership error, got {:?}", other),
        }
    }

    #[test]
    fn test_vlan_list() {
        let cfg = config();
        let agg = TopologyAggregator::new(&cfg);
        let vlan_list = agg.vlan_list().unwrap();
        assert_eq!(vlan_list["data_1"][&vlan(20)], vec![5, 6]);
        assert_eq!(vlan_list["data_2"][&vlan(20)], vec![5, 6]);
        assert_eq!(vlan_list["data_3"][&vlan(100)], vec![7]);

        let port_vlans = agg.port_vlans().unwrap();
        assert_eq!(port_vlans["data_3"][&7], vec![vlan(100)]);
        assert_eq!(port_vlans["data_1"][&5], vec![vlan(20)]);
    }

    #[test]
    fn test_raw_device_binding_carries_no_vlan() {
        let mut cfg = config();
        // eth0 bound instead of eth0.100
        cfg.node_templates[1].physical_interfaces.data[2].interface = "eth0".to_string();
        cfg.node_templates[1].interfaces.push("eth0".to_string());
        let agg = TopologyAggregator::new(&cfg);
        let vlan_list = agg.vlan_list().unwrap();
        assert!(!vlan_list.contains_key("data_3"));
        assert!(!agg.port_vlans().unwrap().contains_key("data_3"));
    }

    #[test]
    fn test_port_vlans_dedup() {
        let mut cfg = config();
        // bond0.20 listed twice puts VLAN 20 on each port twice in vlan_list
        cfg.node_templates[0].interfaces.push("bond0.20".to_string());
        let agg = TopologyAggregator::new(&cfg);
        assert_eq!(agg.vlan_list().unwrap()["data_1"][&vlan(20)], vec![5, 6, 5, 6]);
        assert_eq!(agg.port_vlans().unwrap()["data_1"][&5], vec![vlan(20)]);
    }

    #[test]
    fn test_zero_mtu_is_no_override() {
        let mut cfg = config();
        for ifc in cfg.interfaces.iter_mut().filter(|ifc| ifc.label == "eth10") {
            ifc.mtu = Some(0);
        }
        let mtu_list = TopologyAggregator::new(&cfg).mtu_list();
        assert!(!mtu_list.contains_key("data_1"));
        assert_eq!(mtu_list["data_2"][&Mtu::new(9000)], vec![5, 6]);
    }

    #[test]
    fn test_mtu_list() {
        let cfg = config();
        let mtu_list = TopologyAggregator::new(&cfg).mtu_list();
        assert_eq!(mtu_list["data_1"][&Mtu::new(9000)], vec![5, 6]);
        assert_eq!(mtu_list["data_2"][&Mtu::new(9000)], vec![5, 6]);
        assert!(!mtu_list.contains_key("data_3"));
    }

    #[test]
    fn test_mlag_info() {
        let cfg = config();
        let pairs = TopologyAggregator::new(&cfg).mlag_info().unwrap();
        assert_eq!(pairs.len(), 1);

        let pair = &pairs[0];
        assert_eq!(pair.master.switch, "data_1");
        assert_eq!(pair.peer.switch, "data_2");
        assert_eq!(pair.master.vip, None);
        assert_eq!(
            pair.peer.vip,
            Some("192.168.5.254/24".parse::<IpPrefix>().unwrap())
        );
        assert_eq!(pair.master.peer_ip, "10.0.0.2".parse::<IpAddress>().unwrap());
        assert_eq!(pair.peer.peer_ip, "10.0.0.1".parse::<IpAddress>().unwrap());
        assert_eq!(pair.ipl_port_channel(), 29);
        assert_eq!(pair.master.vlan, vlan(4000));
    }

    #[test]
    fn test_mlag_missing_link() {
        let mut cfg = config();
        cfg.switches.data[1].links.clear();
        let err = TopologyAggregator::new(&cfg).mlag_info().unwrap_err();
        match err {
            ConfigError::MissingMlagLink { switch, peer } => {
                assert_eq!(switch, "data_2");
                assert_eq!(peer, "data_1");
            }
            other => panic!("Expected MissingMlagLink error, got {:?}", other),
        }
    }

    #[test]
    fn test_mlag_incomplete_link() {
        let mut cfg = config();
        cfg.switches.data[0].links[0].prefix = None;
        let err = TopologyAggregator::new(&cfg).mlag_info().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::IncompleteMlagLink { field: "prefix", .. }
        ));
    }

    #[test]
    fn test_peer_vip_needs_mgmt_prefix() {
        let mut cfg = config();
        cfg.deployer.networks.mgmt.clear();
        let err = TopologyAggregator::new(&cfg).mlag_info().unwrap_err();
        assert!(matches!(err, ConfigError::MissingMgmtNetwork));
    }

    #[test]
    fn test_build() {
        let cfg = config();
        let topo = TopologyAggregator::new(&cfg).build().unwrap();
        assert_eq!(topo.channel_groups.len(), 2);
        assert_eq!(topo.mlag_pairs.len(), 1);
        assert_eq!(
            topo.switches().into_iter().collect::<Vec<_>>(),
            vec!["data_1", "data_2", "data_3"]
        );
    }
}
