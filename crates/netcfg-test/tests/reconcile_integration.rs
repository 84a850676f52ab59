//! Reconciliation integration tests
//!
//! Aggregates fixture clusters and drives recording switches through full
//! configure and deconfigure passes.

use data_switch_cfg::{ClusterConfig, ReconcileError, Reconciler, Topology, TopologyAggregator};
use netcfg_common::MlagParams;
use netcfg_test::{
    bond, bond_slave, physical, recording_drivers, scenarios, vlan_device, CallLog, CallVerifier,
    ClusterBuilder, DriverCall, RecordingSwitch, ScriptedConfirm,
};
use netcfg_types::{IpAddress, IpPrefix, Mtu, SwitchportMode, VlanId};
use pretty_assertions::assert_eq;

fn vlan(id: u16) -> VlanId {
    VlanId::new(id).unwrap()
}

fn topology(cfg: &ClusterConfig) -> Topology {
    TopologyAggregator::new(cfg).build().unwrap()
}

fn reconciler(switches: Vec<RecordingSwitch>) -> Reconciler {
    Reconciler::new(recording_drivers(switches))
}

/// Scenario: two VLANs on one interface across two nodes
///
/// Each VLAN is created once per run, every port is trunked once with
/// both VLANs, and a second run issues the creates again.
#[tokio::test]
async fn test_vlan_creation_deduplicated_per_run() {
    let cfg = scenarios::shared_vlans().build().unwrap();
    let topo = topology(&cfg);
    let log = CallLog::new();
    let mut rec = reconciler(vec![RecordingSwitch::new("data_1", &log)]);

    rec.configure(&topo).await.unwrap();

    let verifier = CallVerifier::new(&log);
    verifier.assert_count("data_1", "create_vlan", 2).unwrap();
    verifier.assert_count("data_1", "add_vlans_to_port", 2).unwrap();
    verifier
        .assert_in_order(
            "data_1",
            &[
                DriverCall::CreateVlan(vlan(20)),
                DriverCall::CreateVlan(vlan(30)),
                DriverCall::SetSwitchportMode(5, SwitchportMode::Trunk),
                DriverCall::AddVlansToPort(5, vec![vlan(20), vlan(30)]),
                DriverCall::SetSwitchportMode(6, SwitchportMode::Trunk),
                DriverCall::AddVlansToPort(6, vec![vlan(20), vlan(30)]),
                DriverCall::SetMtuForPort(5, Mtu::new(9000)),
                DriverCall::SetMtuForPort(6, Mtu::new(9000)),
            ],
        )
        .unwrap();

    rec.configure(&topo).await.unwrap();
    CallVerifier::new(&log)
        .assert_count("data_1", "create_vlan", 4)
        .unwrap();
}

/// Scenario: `eth0.100` bound on port 5
#[tokio::test]
async fn test_vlan_interface_round_trip() {
    let cfg = scenarios::single_vlan().build().unwrap();
    let topo = topology(&cfg);
    assert_eq!(topo.port_vlans("data_1", 5), &[vlan(100)]);
    assert!(topo.mtu_list.is_empty());
    assert!(topo.channel_groups.is_empty());

    let log = CallLog::new();
    let mut rec = reconciler(vec![RecordingSwitch::new("data_1", &log)]);
    rec.configure(&topo).await.unwrap();

    let verifier = CallVerifier::new(&log);
    assert_eq!(
        verifier.calls_for("data_1"),
        vec![
            &DriverCall::CreateVlan(vlan(100)),
            &DriverCall::SetSwitchportMode(5, SwitchportMode::Trunk),
            &DriverCall::AddVlansToPort(5, vec![vlan(100)]),
        ]
    );
}

/// Scenario: only the raw device `eth0` is bound while `eth0.100` is
/// configured on the nodes
#[tokio::test]
async fn test_raw_device_binding_trunks_nothing() {
    let cfg = ClusterBuilder::new()
        .switch("data_1")
        .interface(physical("eth0"))
        .interface(vlan_device("eth0", 100))
        .template("compute", &[("data_1", "eth0", &[5])])
        .template_interface("compute", "eth0.100")
        .build()
        .unwrap();
    let topo = topology(&cfg);
    assert!(topo.port_vlans.is_empty());
    assert!(topo.port_vlans("data_1", 5).is_empty());

    let log = CallLog::new();
    let mut rec = reconciler(vec![RecordingSwitch::new("data_1", &log)]);
    rec.configure(&topo).await.unwrap();
    assert!(CallVerifier::new(&log).calls_for("data_1").is_empty());
}

/// Scenario: `bond0` over `eth10`/`eth11` on ports 10 and 11
#[tokio::test]
async fn test_single_lag() {
    let cfg = scenarios::single_lag().build().unwrap();
    let topo = topology(&cfg);
    assert_eq!(topo.channel_groups.len(), 1);
    assert!(!topo.channel_groups[0].is_mlag());

    let log = CallLog::new();
    let mut rec = reconciler(vec![RecordingSwitch::new("data_1", &log)]);
    rec.configure(&topo).await.unwrap();

    let verifier = CallVerifier::new(&log);
    verifier
        .assert_in_order(
            "data_1",
            &[
                DriverCall::RemoveChannelGroup(10),
                DriverCall::CreateLagInterface(10),
                DriverCall::AddVlansToLagPortChannel(10, vec![vlan(20)]),
                DriverCall::BindPortsToLagInterface(vec![10, 11], 10),
            ],
        )
        .unwrap();
    verifier
        .assert_not_called("data_1", "set_mtu_for_lag_port_channel")
        .unwrap();
    verifier
        .assert_not_called("data_1", "create_mlag_interface")
        .unwrap();
}

/// Scenario: three slaves on ports 7, 3 and 9 form one channel numbered 3
#[tokio::test]
async fn test_channel_number_is_lowest_port() {
    let cfg = ClusterBuilder::new()
        .switch("data_1")
        .interface(bond("bond0"))
        .interface(bond_slave("eth10", "bond0"))
        .interface(bond_slave("eth11", "bond0"))
        .interface(bond_slave("eth12", "bond0"))
        .template(
            "storage",
            &[
                ("data_1", "eth10", &[7]),
                ("data_1", "eth11", &[3]),
                ("data_1", "eth12", &[9]),
            ],
        )
        .template_interface("storage", "bond0")
        .build()
        .unwrap();
    let topo = topology(&cfg);

    let log = CallLog::new();
    let mut rec = reconciler(vec![RecordingSwitch::new("data_1", &log)]);
    rec.configure(&topo).await.unwrap();

    let verifier = CallVerifier::new(&log);
    verifier
        .assert_in_order(
            "data_1",
            &[
                DriverCall::RemoveChannelGroup(3),
                DriverCall::CreateLagInterface(3),
                DriverCall::BindPortsToLagInterface(vec![7, 3, 9], 3),
            ],
        )
        .unwrap();
    // No VLANs on the bond
    verifier
        .assert_not_called("data_1", "add_vlans_to_lag_port_channel")
        .unwrap();
}

#[test]
fn test_mlag_master_election() {
    let cfg = scenarios::mlag_pair().build().unwrap();
    let topo = topology(&cfg);
    assert_eq!(topo.mlag_pairs.len(), 1);

    let pair = &topo.mlag_pairs[0];
    assert_eq!(pair.master.switch, "data_1");
    assert_eq!(pair.master.vip, None);
    assert_eq!(pair.peer.switch, "data_2");
    assert_eq!(
        pair.peer.vip,
        Some("192.168.5.254/24".parse::<IpPrefix>().unwrap())
    );

    // Each member points at the other's IPL address
    assert_eq!(pair.master.cidr, "10.0.0.1/30".parse::<IpPrefix>().unwrap());
    assert_eq!(pair.master.peer_ip, "10.0.0.2".parse::<IpAddress>().unwrap());
    assert_eq!(pair.peer.cidr, "10.0.0.2/30".parse::<IpPrefix>().unwrap());
    assert_eq!(pair.peer.peer_ip, "10.0.0.1".parse::<IpAddress>().unwrap());
}

#[test]
fn test_mlag_master_without_flag_is_smaller_label() {
    let mut cfg = scenarios::mlag_pair().build_unchecked();
    for sw in &mut cfg.switches.data {
        sw.mlag_master = false;
    }
    cfg.validate().unwrap();
    let topo = topology(&cfg);
    assert_eq!(topo.mlag_pairs[0].master.switch, "data_1");
    assert_eq!(topo.channel_groups[0].master_switch, "data_1");
}

/// Scenario: MLAG pair with a bond split across both members
#[tokio::test]
async fn test_mlag_configure() {
    let cfg = scenarios::mlag_pair().build().unwrap();
    let topo = topology(&cfg);
    let log = CallLog::new();
    let mut rec = reconciler(vec![
        RecordingSwitch::new("data_1", &log),
        RecordingSwitch::new("data_2", &log),
    ]);
    rec.configure(&topo).await.unwrap();

    let verifier = CallVerifier::new(&log);
    verifier
        .assert_called(
            "data_1",
            &DriverCall::ConfigureMlag(MlagParams {
                vlan: vlan(4000),
                port_channel: 29,
                ipl_cidr: "10.0.0.1/30".parse().unwrap(),
                peer_ip: "10.0.0.2".parse().unwrap(),
                vip: None,
                ipl_ports: vec![29, 30],
            }),
        )
        .unwrap();
    verifier
        .assert_called(
            "data_2",
            &DriverCall::ConfigureMlag(MlagParams {
                vlan: vlan(4000),
                port_channel: 29,
                ipl_cidr: "10.0.0.2/30".parse().unwrap(),
                peer_ip: "10.0.0.1".parse().unwrap(),
                vip: Some("192.168.5.254/24".parse().unwrap()),
                ipl_ports: vec![29, 30],
            }),
        )
        .unwrap();

    // Both members are configured before either is enabled
    let calls = verifier.calls();
    let last_configure = calls
        .iter()
        .rposition(|rc| rc.call.name() == "configure_mlag")
        .unwrap();
    let first_enable = calls
        .iter()
        .position(|rc| rc.call.name() == "enable_mlag")
        .unwrap();
    assert!(last_configure < first_enable);
    verifier.assert_count("data_1", "enable_mlag", 1).unwrap();
    verifier.assert_count("data_2", "enable_mlag", 1).unwrap();

    // Channel numbers come from the master's port groups
    verifier
        .assert_in_order(
            "data_1",
            &[
                DriverCall::RemoveMlagInterface(7),
                DriverCall::CreateMlagInterface(7),
                DriverCall::AddVlansToMlagPortChannel(7, vec![vlan(20)]),
                DriverCall::SetMtuForMlagPortChannel(7, Mtu::new(9000)),
                DriverCall::BindPortToMlagInterface(7, 7),
                DriverCall::RemoveMlagInterface(8),
                DriverCall::CreateMlagInterface(8),
                DriverCall::BindPortToMlagInterface(8, 8),
            ],
        )
        .unwrap();
    verifier
        .assert_in_order(
            "data_2",
            &[
                DriverCall::RemoveMlagInterface(7),
                DriverCall::CreateMlagInterface(7),
                DriverCall::AddVlansToMlagPortChannel(7, vec![vlan(20)]),
                DriverCall::SetMtuForMlagPortChannel(7, Mtu::new(9000)),
                DriverCall::BindPortToMlagInterface(3, 7),
                DriverCall::BindPortToMlagInterface(4, 8),
            ],
        )
        .unwrap();
    verifier
        .assert_not_called("data_2", "create_lag_interface")
        .unwrap();
}

#[tokio::test]
async fn test_mlag_already_configured_is_only_enabled() {
    let cfg = scenarios::mlag_pair().build().unwrap();
    let topo = topology(&cfg);
    let log = CallLog::new();
    let mut rec = reconciler(vec![
        RecordingSwitch::new("data_1", &log).with_mlag_configured(true),
        RecordingSwitch::new("data_2", &log),
    ]);
    rec.configure(&topo).await.unwrap();

    let verifier = CallVerifier::new(&log);
    verifier.assert_not_called("data_1", "configure_mlag").unwrap();
    verifier.assert_count("data_2", "configure_mlag", 1).unwrap();
    verifier.assert_count("data_1", "enable_mlag", 1).unwrap();
    verifier.assert_count("data_2", "enable_mlag", 1).unwrap();
}

/// Scenario: operator declines both MLAG teardown prompts
#[tokio::test]
async fn test_declined_mlag_teardown() {
    let cfg = scenarios::mlag_pair().build().unwrap();
    let topo = topology(&cfg);
    let log = CallLog::new();
    let mut rec = reconciler(vec![
        RecordingSwitch::new("data_1", &log).with_mlag_configured(true),
        RecordingSwitch::new("data_2", &log).with_mlag_configured(true),
    ]);
    let mut confirm = ScriptedConfirm::new([false, false]);
    rec.deconfigure(&topo, &mut confirm).await.unwrap();

    assert_eq!(confirm.prompts().len(), 2);
    assert!(confirm.prompts()[0].contains("data_1"));
    assert!(confirm.prompts()[1].contains("data_2"));

    let verifier = CallVerifier::new(&log);
    verifier.assert_not_called("data_1", "deconfigure_mlag").unwrap();
    verifier.assert_not_called("data_2", "deconfigure_mlag").unwrap();
    verifier
        .assert_in_order(
            "data_1",
            &[
                DriverCall::RemoveMlagInterface(7),
                DriverCall::RemoveMlagInterface(8),
                DriverCall::RemoveVlansFromPort(7, vec![vlan(20)]),
                DriverCall::SetSwitchportMode(7, SwitchportMode::Access),
                DriverCall::RemoveVlansFromPort(8, vec![vlan(20)]),
                DriverCall::SetSwitchportMode(8, SwitchportMode::Access),
                DriverCall::DeleteVlan(vlan(20)),
                DriverCall::SetMtuForPort(7, Mtu::RESET),
                DriverCall::SetMtuForPort(8, Mtu::RESET),
            ],
        )
        .unwrap();
    verifier.assert_count("data_1", "delete_vlan", 1).unwrap();
    verifier
        .assert_called("data_2", &DriverCall::SetMtuForPort(3, Mtu::RESET))
        .unwrap();
}

#[tokio::test]
async fn test_accepted_mlag_teardown() {
    let cfg = scenarios::mlag_pair().build().unwrap();
    let topo = topology(&cfg);
    let log = CallLog::new();
    let mut rec = reconciler(vec![
        RecordingSwitch::new("data_1", &log).with_mlag_configured(true),
        RecordingSwitch::new("data_2", &log).with_mlag_configured(true),
    ]);
    let mut confirm = ScriptedConfirm::new([true, true]);
    rec.deconfigure(&topo, &mut confirm).await.unwrap();

    let verifier = CallVerifier::new(&log);
    verifier.assert_count("data_1", "deconfigure_mlag", 1).unwrap();
    verifier.assert_count("data_2", "deconfigure_mlag", 1).unwrap();
    verifier
        .assert_in_order(
            "data_2",
            &[
                DriverCall::RemoveMlagInterface(7),
                DriverCall::DeconfigureMlag,
                DriverCall::DeleteVlan(vlan(20)),
            ],
        )
        .unwrap();
}

#[tokio::test]
async fn test_teardown_without_mlag_skips_prompt() {
    let cfg = scenarios::mlag_pair().build().unwrap();
    let topo = topology(&cfg);
    let log = CallLog::new();
    let mut rec = reconciler(vec![
        RecordingSwitch::new("data_1", &log),
        RecordingSwitch::new("data_2", &log),
    ]);
    let mut confirm = ScriptedConfirm::default();
    rec.deconfigure(&topo, &mut confirm).await.unwrap();

    assert!(confirm.prompts().is_empty());
    let verifier = CallVerifier::new(&log);
    verifier
        .assert_not_called("data_1", "remove_mlag_interface")
        .unwrap();
    verifier.assert_count("data_1", "delete_vlan", 1).unwrap();
}

#[tokio::test]
async fn test_prompt_eof_aborts_teardown() {
    let cfg = scenarios::mlag_pair().build().unwrap();
    let topo = topology(&cfg);
    let log = CallLog::new();
    let mut rec = reconciler(vec![
        RecordingSwitch::new("data_1", &log).with_mlag_configured(true),
        RecordingSwitch::new("data_2", &log).with_mlag_configured(true),
    ]);
    let mut confirm = ScriptedConfirm::new([false]);
    let err = rec.deconfigure(&topo, &mut confirm).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Prompt(_)));

    let verifier = CallVerifier::new(&log);
    verifier.assert_not_called("data_1", "delete_vlan").unwrap();
    verifier.assert_not_called("data_2", "delete_vlan").unwrap();
}

#[tokio::test]
async fn test_lag_teardown() {
    let cfg = scenarios::single_lag().build().unwrap();
    let topo = topology(&cfg);
    let log = CallLog::new();
    let mut rec = reconciler(vec![RecordingSwitch::new("data_1", &log)]);
    rec.deconfigure(&topo, &mut ScriptedConfirm::default())
        .await
        .unwrap();

    CallVerifier::new(&log)
        .assert_in_order(
            "data_1",
            &[
                DriverCall::RemoveLagInterface(10),
                DriverCall::RemoveVlansFromPort(10, vec![vlan(20)]),
                DriverCall::SetSwitchportMode(10, SwitchportMode::Access),
                DriverCall::RemoveVlansFromPort(11, vec![vlan(20)]),
                DriverCall::SetSwitchportMode(11, SwitchportMode::Access),
                DriverCall::DeleteVlan(vlan(20)),
            ],
        )
        .unwrap();
}

#[tokio::test]
async fn test_driver_failure_aborts_pass() {
    let cfg = scenarios::shared_vlans().build().unwrap();
    let topo = topology(&cfg);
    let log = CallLog::new();
    let mut rec = reconciler(vec![
        RecordingSwitch::new("data_1", &log).fail_on("set_switchport_mode")
    ]);

    match rec.configure(&topo).await {
        Err(ReconcileError::Switch { switch, .. }) => assert_eq!(switch, "data_1"),
        other => panic!("Expected Switch error, got {:?}", other),
    }

    let verifier = CallVerifier::new(&log);
    verifier.assert_count("data_1", "set_switchport_mode", 1).unwrap();
    verifier.assert_not_called("data_1", "add_vlans_to_port").unwrap();
    verifier.assert_not_called("data_1", "set_mtu_for_port").unwrap();
}

#[tokio::test]
async fn test_missing_driver_makes_no_calls() {
    let cfg = scenarios::mlag_pair().build().unwrap();
    let topo = topology(&cfg);
    let log = CallLog::new();
    let mut rec = reconciler(vec![RecordingSwitch::new("data_1", &log)]);

    match rec.configure(&topo).await {
        Err(ReconcileError::MissingDriver { switch }) => assert_eq!(switch, "data_2"),
        other => panic!("Expected MissingDriver error, got {:?}", other),
    }
    assert!(CallVerifier::new(&log).calls().is_empty());
}

#[test]
fn test_topology_renders_as_yaml() {
    let cfg = scenarios::mlag_pair().build().unwrap();
    let text = serde_yaml::to_string(&topology(&cfg)).unwrap();
    assert!(text.contains("port_vlans:"));
    assert!(text.contains("mlag_pairs:"));
    assert!(text.contains("192.168.5.254/24"));
}
