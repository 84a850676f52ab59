//! Onyx CLI command builders and show-output parsers for Mellanox switches

use netcfg_common::MlagParams;
use netcfg_types::{Mtu, SwitchportMode, VlanId};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Physical ports live in slot 1 on the supported models
pub const ETHERNET_SLOT: u32 = 1;

/// IPL index used for the MLAG inter-peer link
pub const IPL_ID: u32 = 1;

/// MLAG VIP domain name
pub const MLAG_VIP_DOMAIN: &str = "mlag-vip-domain";

pub const SHOW_VLAN: &str = "show vlan";
pub const SHOW_SWITCHPORT: &str = "show interfaces switchport";
pub const SHOW_MLAG: &str = "show mlag";
pub const SHOW_LAG_SUMMARY: &str = "show interface port-channel summary";

/// Wrap a configuration command for execution through a remote login shell
pub fn build_remote_cmd(cmd: &str) -> String {
    format!(r#"cli enable "configure terminal" "{}""#, cmd)
}

fn ethernet(port: u32) -> String {
    format!("interface ethernet {}/{}", ETHERNET_SLOT, port)
}

fn port_channel(channel: u32) -> String {
    format!("interface port-channel {}", channel)
}

fn mlag_port_channel(channel: u32) -> String {
    format!("interface mlag-port-channel {}", channel)
}

pub fn build_create_vlan_cmd(vlan: VlanId) -> String {
    format!("vlan {}", vlan)
}

pub fn build_delete_vlan_cmd(vlan: VlanId) -> String {
    format!("no vlan {}", vlan)
}

/// Build switchport mode command
///
/// Onyx "hybrid" mode carries tagged VLANs alongside a native VLAN, which is
/// what other vendors call trunk mode.
pub fn build_switchport_mode_cmd(port: u32, mode: SwitchportMode) -> String {
    let onyx_mode = match mode {
        SwitchportMode::Trunk => "hybrid",
        SwitchportMode::Access => "access",
    };
    format!("{} switchport mode {}", ethernet(port), onyx_mode)
}

pub fn build_add_vlan_to_port_cmd(port: u32, vlan: VlanId) -> String {
    format!("{} switchport hybrid allowed-vlan add {}", ethernet(port), vlan)
}

pub fn build_remove_vlan_from_port_cmd(port: u32, vlan: VlanId) -> String {
    format!(
        "{} switchport hybrid allowed-vlan remove {}",
        ethernet(port),
        vlan
    )
}

/// Build port MTU commands
///
/// The port is shut down around the change; [`Mtu::RESET`] removes the
/// override.
pub fn build_port_mtu_cmds(port: u32, mtu: Mtu) -> Vec<String> {
    let set_mtu = if mtu.is_reset() {
        format!("{} no mtu", ethernet(port))
    } else {
        format!("{} mtu {}", ethernet(port), mtu)
    };
    vec![
        format!("{} shutdown", ethernet(port)),
        set_mtu,
        format!("{} no shutdown", ethernet(port)),
    ]
}

pub fn build_create_lag_cmd(channel: u32) -> String {
    port_channel(channel)
}

pub fn build_remove_lag_cmd(channel: u32) -> String {
    format!("no {}", port_channel(channel))
}

pub fn build_remove_channel_group_cmd(port: u32) -> String {
    format!("{} no channel-group", ethernet(port))
}

pub fn build_bind_port_to_lag_cmd(port: u32, channel: u32) -> String {
    format!("{} channel-group {} mode active", ethernet(port), channel)
}

/// Build commands allowing VLANs on a LAG or MLAG port-channel
pub fn build_port_channel_vlans_cmds(channel: u32, vlans: &[VlanId], mlag: bool) -> Vec<String> {
    let ifc = if mlag {
        mlag_port_channel(channel)
    } else {
        port_channel(channel)
    };
    let mut cmds = vec![format!("{} switchport mode hybrid", ifc)];
    cmds.extend(
        vlans
            .iter()
            .map(|vlan| format!("{} switchport hybrid allowed-vlan add {}", ifc, vlan)),
    );
    cmds
}

/// Build port-channel MTU command (LAG or MLAG)
pub fn build_port_channel_mtu_cmd(channel: u32, mtu: Mtu, mlag: bool) -> String {
    let ifc = if mlag {
        mlag_port_channel(channel)
    } else {
        port_channel(channel)
    };
    if mtu.is_reset() {
        format!("{} no mtu force", ifc)
    } else {
        format!("{} mtu {} force", ifc, mtu)
    }
}

/// Build MLAG port-channel creation commands
///
/// Host-facing MLAG channels are edge ports with BPDU filtering.
pub fn build_create_mlag_interface_cmds(channel: u32) -> Vec<String> {
    vec![
        mlag_port_channel(channel),
        format!("{} spanning-tree port type edge", mlag_port_channel(channel)),
        format!("{} spanning-tree bpdufilter enable", mlag_port_channel(channel)),
    ]
}

pub fn build_remove_mlag_interface_cmd(channel: u32) -> String {
    format!("no {}", mlag_port_channel(channel))
}

pub fn build_bind_port_to_mlag_cmds(port: u32, channel: u32) -> Vec<String> {
    vec![
        format!("{} mlag-channel-group {} mode active", ethernet(port), channel),
        format!("{} no shutdown", mlag_port_channel(channel)),
    ]
}

pub fn build_enable_mlag_cmd() -> String {
    "no mlag shutdown".to_string()
}

pub fn build_disable_mlag_cmd() -> String {
    "mlag shutdown".to_string()
}

/// Build the MLAG bring-up sequence for one member of a pair
///
/// Creates the IPL VLAN and port-channel, binds the IPL ports, addresses the
/// IPL VLAN interface and points it at the peer, then sets the VIP.
pub fn build_configure_mlag_cmds(params: &MlagParams) -> Vec<String> {
    let pc = params.port_channel;
    let vlan = params.vlan;
    let mut cmds = vec![
        "ip routing".to_string(),
        "dcb priority-flow-control enable force".to_string(),
        "protocol mlag".to_string(),
        build_create_vlan_cmd(vlan),
        port_channel(pc),
    ];
    cmds.extend(
        params
            .ipl_ports
            .iter()
            .map(|port| build_bind_port_to_lag_cmd(*port, pc)),
    );
    cmds.push(format!("{} ipl {}", port_channel(pc), IPL_ID));
    cmds.push(format!(
        "{} dcb priority-flow-control mode on force",
        port_channel(pc)
    ));
    cmds.push(format!("interface vlan {}", vlan));
    cmds.push(format!(
        "interface vlan {} ip address {} /{}",
        vlan,
        params.ipl_cidr.address(),
        params.ipl_cidr.prefix_len()
    ));
    cmds.push(format!(
        "interface vlan {} ipl {} peer-address {}",
        vlan, IPL_ID, params.peer_ip
    ));
    match &params.vip {
        Some(vip) => cmds.push(format!(
            "mlag-vip {} ip {} /{} force",
            MLAG_VIP_DOMAIN,
            vip.address(),
            vip.prefix_len()
        )),
        None => cmds.push(format!("mlag-vip {}", MLAG_VIP_DOMAIN)),
    }
    cmds
}

/// Build the MLAG teardown sequence for an IPL found on the switch
pub fn build_deconfigure_mlag_cmds(ipl: &IplInfo) -> Vec<String> {
    let pc = ipl.port_channel;
    let vlan = ipl.vlan;
    let mut cmds = vec![
        build_disable_mlag_cmd(),
        "no mlag-vip".to_string(),
        format!("interface vlan {} no ipl {} peer-address", vlan, IPL_ID),
        format!("interface vlan {} no ip address", vlan),
        format!("no interface vlan {}", vlan),
        format!("{} no dcb priority-flow-control mode force", port_channel(pc)),
        format!("{} no ipl {}", port_channel(pc), IPL_ID),
    ];
    cmds.extend(
        ipl.ports
            .iter()
            .map(|port| build_remove_channel_group_cmd(*port)),
    );
    cmds.push(build_remove_lag_cmd(pc));
    cmds.push(build_delete_vlan_cmd(vlan));
    cmds.push("no protocol mlag".to_string());
    cmds.push("no dcb priority-flow-control enable force".to_string());
    cmds
}

/// IPL port-channel, VLAN and member ports as reported by the switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IplInfo {
    pub port_channel: u32,
    pub vlan: VlanId,
    pub ports: Vec<u32>,
}

/// Port state from `show interfaces switchport`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortState {
    /// Onyx mode name: access, hybrid or trunk
    pub mode: String,
    pub native_vlan: u16,
    pub allowed_vlans: Vec<u16>,
}

impl PortState {
    /// Returns true if the Onyx mode satisfies the requested mode
    pub fn is_in_mode(&self, mode: SwitchportMode) -> bool {
        match mode {
            SwitchportMode::Trunk => self.mode == "hybrid" || self.mode == "trunk",
            SwitchportMode::Access => self.mode == "access",
        }
    }
}

static IPL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\s+Po(\d+)\s+(\d+)").expect("Invalid regex pattern"));

static SWITCHPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Eth1/(\d+)\s+(access|hybrid|trunk)\s+(\d+)\s*(.*)").expect("Invalid regex pattern")
});

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("Invalid regex pattern"));

/// Parse the IPL port-channel and VLAN out of `show mlag`
pub fn parse_ipl(show_mlag: &str) -> Option<(u32, VlanId)> {
    let caps = IPL_RE.captures(show_mlag)?;
    let port_channel = caps[1].parse().ok()?;
    let vlan = caps[2].parse().ok()?;
    Some((port_channel, vlan))
}

/// Parse the member ports of port-channel `channel` out of the LAG summary
pub fn parse_port_channel_members(summary: &str, channel: u32) -> Vec<u32> {
    let re = match Regex::new(&format!(r"\d+\s+Po{}\S*\s+\w+\s+(.*)", channel)) {
        Ok(re) => re,
        Err(_) => return Vec::new(),
    };
    let Some(caps) = re.captures(summary) else {
        return Vec::new();
    };
    caps[1]
        .split_whitespace()
        .filter_map(|member| member.strip_prefix("Eth1/"))
        .filter_map(|member| {
            member
                .trim_end_matches(|c: char| !c.is_ascii_digit())
                .parse()
                .ok()
        })
        .collect()
}

/// Parse `show interfaces switchport` into per-port state
pub fn parse_switchports(output: &str) -> HashMap<u32, PortState> {
    output
        .lines()
        .filter_map(|line| {
            let caps = SWITCHPORT_RE.captures(line)?;
            let port = caps[1].parse().ok()?;
            let state = PortState {
                mode: caps[2].to_string(),
                native_vlan: caps[3].parse().ok()?,
                allowed_vlans: NUMBER_RE
                    .find_iter(&caps[4])
                    .filter_map(|m| m.as_str().parse().ok())
                    .collect(),
            };
            Some((port, state))
        })
        .collect()
}

/// Check whether `show vlan` lists the VLAN
pub fn vlan_exists(show_vlan: &str, vlan: VlanId) -> bool {
    show_vlan
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|first| first == vlan.to_string())
}
