//! Aggregated topology views.

use netcfg_common::MlagParams;
use netcfg_types::{IpAddress, IpPrefix, Mtu, VlanId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// switch -> port -> VLANs trunked onto the port (first-seen order, unique)
pub type PortVlans = BTreeMap<String, BTreeMap<u32, Vec<VlanId>>>;

/// switch -> VLAN -> ports carrying it (not de-duplicated)
pub type VlanList = BTreeMap<String, BTreeMap<VlanId, Vec<u32>>>;

/// switch -> MTU -> ports with that explicit MTU
pub type MtuList = BTreeMap<String, BTreeMap<Mtu, Vec<u32>>>;

/// Ports bundled into one port-channel. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PortGroup(Vec<u32>);

impl PortGroup {
    /// Returns `None` for an empty port list.
    pub fn new(ports: Vec<u32>) -> Option<Self> {
        if ports.is_empty() {
            None
        } else {
            Some(Self(ports))
        }
    }

    pub fn ports(&self) -> &[u32] {
        &self.0
    }

    /// Port-channel number: the lowest port in the group.
    pub fn channel_number(&self) -> u32 {
        self.0.iter().copied().min().unwrap_or_default()
    }
}

/// Port-channel groups of one bond in one node template, keyed by the
/// elected master of the switches involved.
///
/// One member means plain LAGs; two members mean MLAG port-channels whose
/// numbers come from the master's groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelGroup {
    pub bond: String,
    pub template: String,
    pub master_switch: String,
    pub members: BTreeMap<String, Vec<PortGroup>>,
}

impl ChannelGroup {
    pub fn is_mlag(&self) -> bool {
        self.members.len() == 2
    }

    /// Groups of the master switch.
    pub fn master_groups(&self) -> &[PortGroup] {
        self.members
            .get(&self.master_switch)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// MLAG channel number for the group at `idx`, taken from the master.
    pub fn mlag_channel(&self, idx: usize) -> Option<u32> {
        self.master_groups().get(idx).map(PortGroup::channel_number)
    }
}

pub type ChannelGroups = Vec<ChannelGroup>;

/// One member of an MLAG pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MlagMember {
    pub switch: String,
    /// IPL VLAN.
    pub vlan: VlanId,
    /// MLAG virtual IP with the management prefix; `None` on the master.
    pub vip: Option<IpPrefix>,
    /// IPL ports.
    pub ports: PortGroup,
    /// This member's IPL address.
    pub cidr: IpPrefix,
    /// The partner's IPL address.
    pub peer_ip: IpAddress,
}

impl MlagMember {
    /// Driver parameters, with the IPL port-channel number chosen by the pair.
    pub fn params(&self, port_channel: u32) -> MlagParams {
        MlagParams {
            vlan: self.vlan,
            port_channel,
            ipl_cidr: self.cidr,
            peer_ip: self.peer_ip,
            vip: self.vip,
            ipl_ports: self.ports.ports().to_vec(),
        }
    }
}

/// An MLAG pair with its elected master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MlagPair {
    pub master: MlagMember,
    pub peer: MlagMember,
}

impl MlagPair {
    /// Master first.
    pub fn members(&self) -> [&MlagMember; 2] {
        [&self.master, &self.peer]
    }

    /// IPL port-channel number used on both members: the master's lowest
    /// IPL port.
    pub fn ipl_port_channel(&self) -> u32 {
        self.master.ports.channel_number()
    }
}

/// Everything reconciliation needs, derived from the cluster definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Topology {
    pub port_vlans: PortVlans,
    pub mtu_list: MtuList,
    pub channel_groups: ChannelGroups,
    pub mlag_pairs: Vec<MlagPair>,
}

impl Topology {
    /// Every switch label the views reference.
    pub fn switches(&self) -> BTreeSet<&str> {
        let mut switches: BTreeSet<&str> = self
            .port_vlans
            .keys()
            .chain(self.mtu_list.keys())
            .map(String::as_str)
            .collect();
        for group in &self.channel_groups {
            switches.extend(group.members.keys().map(String::as_str));
        }
        for pair in &self.mlag_pairs {
            switches.extend(pair.members().iter().map(|m| m.switch.as_str()));
        }
        switches
    }

    /// VLANs trunked onto a port.
    pub fn port_vlans(&self, switch: &str, port: u32) -> &[VlanId] {
        self.port_vlans
            .get(switch)
            .and_then(|ports| ports.get(&port))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Explicit MTU of a port.
    pub fn port_mtu(&self, switch: &str, port: u32) -> Option<Mtu> {
        self.mtu_list.get(switch).and_then(|mtus| {
            mtus.iter()
                .find(|(_, ports)| ports.contains(&port))
                .map(|(mtu, _)| *mtu)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn group(ports: &[u32]) -> PortGroup {
        PortGroup::new(ports.to_vec()).unwrap()
    }

    #[test]
    fn test_channel_number_is_min_port() {
        assert_eq!(group(&[7, 3, 9]).channel_number(), 3);
        assert_eq!(group(&[3, 9, 7]).channel_number(), 3);
        assert_eq!(group(&[12]).channel_number(), 12);
        assert!(PortGroup::new(Vec::new()).is_none());
    }

    #[test]
    fn test_mlag_channel_from_master() {
        let cg = ChannelGroup {
            bond: "bond0".to_string(),
            template: "compute".to_string(),
            master_switch: "data_1".to_string(),
            members: BTreeMap::from([
                ("data_1".to_string(), vec![group(&[5, 6]), group(&[9, 8])]),
                ("data_2".to_string(), vec![group(&[1, 2]), group(&[3, 4])]),
            ]),
        };
        assert!(cg.is_mlag());
        assert_eq!(cg.mlag_channel(0), Some(5));
        assert_eq!(cg.mlag_channel(1), Some(8));
        assert_eq!(cg.mlag_channel(2), None);
    }

    #[test]
    fn test_topology_lookups() {
        let v20 = VlanId::new(20).unwrap();
        let mut topo = Topology::default();
        topo.port_vlans
            .entry("data_1".to_string())
            .or_default()
            .insert(5, vec![v20]);
        topo.mtu_list
            .entry("data_2".to_string())
            .or_default()
            .insert(Mtu::new(9000), vec![7, 8]);

        assert_eq!(topo.port_vlans("data_1", 5), &[v20]);
        assert!(topo.port_vlans("data_1", 6).is_empty());
        assert_eq!(topo.port_mtu("data_2", 8), Some(Mtu::new(9000)));
        assert_eq!(topo.port_mtu("data_1", 5), None);
        assert_eq!(
            topo.switches().into_iter().collect::<Vec<_>>(),
            vec!["data_1", "data_2"]
        );
    }
}
