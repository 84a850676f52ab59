//! Reconciliation of aggregated views against switch drivers.
//!
//! Configuration applies VLANs, then MTUs, then MLAG, then port-channels.
//! Deconfiguration walks back through port-channels, MLAG (after operator
//! confirmation), VLANs and MTUs. Driver calls are issued one at a time and
//! the first failure aborts the pass; nothing already applied is rolled back.

use netcfg_common::SwitchDriver;
use netcfg_switch::SwitchFactory;
use netcfg_types::{Mtu, SwitchportMode, VlanId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

use crate::config::ClusterConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::prompt::Confirm;
use crate::views::{ChannelGroup, Topology};

/// Driver instances keyed by switch label.
pub type DriverMap = BTreeMap<String, Box<dyn SwitchDriver>>;

/// Applies or reverses a [`Topology`] on a set of switches.
pub struct Reconciler {
    drivers: DriverMap,
}

impl Reconciler {
    pub fn new(drivers: DriverMap) -> Self {
        Self { drivers }
    }

    /// Creates one driver per data switch in the cluster definition.
    pub fn connect(config: &ClusterConfig, factory: &SwitchFactory) -> ReconcileResult<Self> {
        let mut drivers = DriverMap::new();
        for info in config.access_info() {
            let driver = factory
                .create(&info)
                .map_err(|source| ReconcileError::Factory {
                    switch: info.label.clone(),
                    source,
                })?;
            debug!(switch = %info.label, vendor = %driver.vendor(), "Connected switch driver");
            drivers.insert(info.label, driver);
        }
        Ok(Self::new(drivers))
    }

    /// Labels of the switches with a driver.
    pub fn switches(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(String::as_str)
    }

    fn check_drivers(&self, topo: &Topology) -> ReconcileResult<()> {
        match topo
            .switches()
            .into_iter()
            .find(|switch| !self.drivers.contains_key(*switch))
        {
            Some(switch) => Err(ReconcileError::MissingDriver {
                switch: switch.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn driver(&mut self, switch: &str) -> ReconcileResult<&mut Box<dyn SwitchDriver>> {
        self.drivers
            .get_mut(switch)
            .ok_or_else(|| ReconcileError::MissingDriver {
                switch: switch.to_string(),
            })
    }

    /// Applies the topology.
    #[instrument(skip_all)]
    pub async fn configure(&mut self, topo: &Topology) -> ReconcileResult<()> {
        self.check_drivers(topo)?;
        self.configure_vlans(topo).await?;
        self.configure_mtu(topo).await?;
        self.configure_mlag(topo).await?;
        self.configure_port_channels(topo).await?;
        info!("Data switch configuration complete");
        Ok(())
    }

    /// Reverses the topology, asking `confirm` before tearing down MLAG.
    #[instrument(skip_all)]
    pub async fn deconfigure(
        &mut self,
        topo: &Topology,
        confirm: &mut dyn Confirm,
    ) -> ReconcileResult<()> {
        self.check_drivers(topo)?;
        self.deconfigure_port_channels(topo).await?;
        self.deconfigure_mlag(topo, confirm).await?;
        self.deconfigure_vlans(topo).await?;
        self.deconfigure_mtu(topo).await?;
        info!("Data switch deconfiguration complete");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn configure_vlans(&mut self, topo: &Topology) -> ReconcileResult<()> {
        for (switch, ports) in &topo.port_vlans {
            let driver = self.driver(switch)?;
            let mut created: BTreeSet<VlanId> = BTreeSet::new();
            for (port, vlans) in ports {
                for vlan in vlans {
                    if created.insert(*vlan) {
                        debug!(switch = %switch, vlan = %vlan, "Creating VLAN");
                        driver
                            .create_vlan(*vlan)
                            .await
                            .map_err(ReconcileError::switch(switch))?;
                    }
                }
                driver
                    .set_switchport_mode(*port, SwitchportMode::Trunk)
                    .await
                    .map_err(ReconcileError::switch(switch))?;
                driver
                    .add_vlans_to_port(*port, vlans)
                    .await
                    .map_err(ReconcileError::switch(switch))?;
                debug!(switch = %switch, port = port, vlans = ?vlans, "Trunked VLANs");
            }
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn configure_mtu(&mut self, topo: &Topology) -> ReconcileResult<()> {
        for (switch, mtus) in &topo.mtu_list {
            let driver = self.driver(switch)?;
            for (mtu, ports) in mtus {
                for port in ports {
                    driver
                        .set_mtu_for_port(*port, *mtu)
                        .await
                        .map_err(ReconcileError::switch(switch))?;
                    debug!(switch = %switch, port = port, mtu = %mtu, "Set port MTU");
                }
            }
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn configure_mlag(&mut self, topo: &Topology) -> ReconcileResult<()> {
        for pair in &topo.mlag_pairs {
            debug!(master = %pair.master.switch, "Configuring MLAG pair");
            let port_channel = pair.ipl_port_channel();

            for member in pair.members() {
                let switch = member.switch.as_str();
                let driver = self.driver(switch)?;
                if driver
                    .is_mlag_configured()
                    .await
                    .map_err(ReconcileError::switch(switch))?
                {
                    info!(
                        "MLAG already configured. Skipping MLAG configuration on switch {}",
                        switch
                    );
                    continue;
                }
                info!(switch = %switch, "Configuring MLAG");
                driver
                    .configure_mlag(&member.params(port_channel))
                    .await
                    .map_err(ReconcileError::switch(switch))?;
            }

            // Enable only once both members have had a chance to configure
            for member in pair.members() {
                let switch = member.switch.as_str();
                let driver = self.driver(switch)?;
                if driver
                    .is_mlag_configured()
                    .await
                    .map_err(ReconcileError::switch(switch))?
                {
                    driver
                        .enable_mlag()
                        .await
                        .map_err(ReconcileError::switch(switch))?;
                    info!(switch = %switch, "Enabled MLAG");
                }
            }
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn configure_port_channels(&mut self, topo: &Topology) -> ReconcileResult<()> {
        for group in &topo.channel_groups {
            if group.is_mlag() {
                self.configure_mlag_channels(topo, group).await?;
            } else {
                self.configure_lag_channels(topo, group).await?;
            }
        }
        Ok(())
    }

    async fn configure_mlag_channels(
        &mut self,
        topo: &Topology,
        group: &ChannelGroup,
    ) -> ReconcileResult<()> {
        for (switch, port_groups) in &group.members {
            let driver = self.driver(switch)?;
            for (idx, port_group) in port_groups.iter().enumerate() {
                let chan = group
                    .mlag_channel(idx)
                    .unwrap_or_else(|| port_group.channel_number());
                driver
                    .remove_mlag_interface(chan)
                    .await
                    .map_err(ReconcileError::switch(switch))?;
                driver
                    .create_mlag_interface(chan)
                    .await
                    .map_err(ReconcileError::switch(switch))?;
                debug!(switch = %switch, channel = chan, "Created MLAG interface");

                // Ports of one group carry the same VLANs and MTU
                let lead_port = port_group.channel_number();
                let vlans = topo.port_vlans(switch, lead_port);
                if !vlans.is_empty() {
                    driver
                        .add_vlans_to_mlag_port_channel(chan, vlans)
                        .await
                        .map_err(ReconcileError::switch(switch))?;
                }
                if let Some(mtu) = topo.port_mtu(switch, lead_port) {
                    driver
                        .set_mtu_for_mlag_port_channel(chan, mtu)
                        .await
                        .map_err(ReconcileError::switch(switch))?;
                }
                for port in port_group.ports() {
                    driver
                        .bind_port_to_mlag_interface(*port, chan)
                        .await
                        .map_err(ReconcileError::switch(switch))?;
                    debug!(switch = %switch, port = port, channel = chan, "Bound port to MLAG interface");
                }
            }
        }
        Ok(())
    }

    async fn configure_lag_channels(
        &mut self,
        topo: &Topology,
        group: &ChannelGroup,
    ) -> ReconcileResult<()> {
        for (switch, port_groups) in &group.members {
            let driver = self.driver(switch)?;
            for port_group in port_groups {
                let chan = port_group.channel_number();
                debug!(switch = %switch, channel = chan, "LAG channel group");
                driver
                    .remove_channel_group(chan)
                    .await
                    .map_err(ReconcileError::switch(switch))?;
                driver
                    .create_lag_interface(chan)
                    .await
                    .map_err(ReconcileError::switch(switch))?;
                let vlans = topo.port_vlans(switch, chan);
                if !vlans.is_empty() {
                    driver
                        .add_vlans_to_lag_port_channel(chan, vlans)
                        .await
                        .map_err(ReconcileError::switch(switch))?;
                }
                if let Some(mtu) = topo.port_mtu(switch, chan) {
                    driver
                        .set_mtu_for_lag_port_channel(chan, mtu)
                        .await
                        .map_err(ReconcileError::switch(switch))?;
                }
                driver
                    .bind_ports_to_lag_interface(port_group.ports(), chan)
                    .await
                    .map_err(ReconcileError::switch(switch))?;
            }
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn deconfigure_port_channels(&mut self, topo: &Topology) -> ReconcileResult<()> {
        for group in &topo.channel_groups {
            for (switch, port_groups) in &group.members {
                let driver = self.driver(switch)?;
                if group.is_mlag() {
                    if !driver
                        .is_mlag_configured()
                        .await
                        .map_err(ReconcileError::switch(switch))?
                    {
                        continue;
                    }
                    for (idx, port_group) in port_groups.iter().enumerate() {
                        let chan = group
                            .mlag_channel(idx)
                            .unwrap_or_else(|| port_group.channel_number());
                        info!(switch = %switch, channel = chan, "Deleting MLAG interface");
                        driver
                            .remove_mlag_interface(chan)
                            .await
                            .map_err(ReconcileError::switch(switch))?;
                    }
                } else {
                    for port_group in port_groups {
                        let chan = port_group.channel_number();
                        debug!(switch = %switch, channel = chan, "Deleting LAG interface");
                        driver
                            .remove_lag_interface(chan)
                            .await
                            .map_err(ReconcileError::switch(switch))?;
                    }
                }
            }
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn deconfigure_mlag(
        &mut self,
        topo: &Topology,
        confirm: &mut dyn Confirm,
    ) -> ReconcileResult<()> {
        for pair in &topo.mlag_pairs {
            for member in pair.members() {
                let switch = member.switch.as_str();
                let driver = self.driver(switch)?;
                if !driver
                    .is_mlag_configured()
                    .await
                    .map_err(ReconcileError::switch(switch))?
                {
                    debug!(switch = %switch, "MLAG not configured");
                    continue;
                }

                let question = format!(
                    "About to deconfigure MLAG on switch {}\n\
                     This will stop all MLAG communication on all switch ports\n\
                     OK to deconfigure MLAG?",
                    switch
                );
                if confirm
                    .confirm(&question)
                    .await
                    .map_err(ReconcileError::Prompt)?
                {
                    info!(switch = %switch, "Deconfiguring MLAG");
                    driver
                        .deconfigure_mlag()
                        .await
                        .map_err(ReconcileError::switch(switch))?;
                } else {
                    info!(switch = %switch, "MLAG deconfiguration declined");
                }
            }
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn deconfigure_vlans(&mut self, topo: &Topology) -> ReconcileResult<()> {
        for (switch, ports) in &topo.port_vlans {
            let driver = self.driver(switch)?;
            for (port, vlans) in ports {
                for vlan in vlans {
                    driver
                        .remove_vlans_from_port(*port, &[*vlan])
                        .await
                        .map_err(ReconcileError::switch(switch))?;
                }
                debug!(switch = %switch, port = port, "Setting port to access mode");
                driver
                    .set_switchport_mode(*port, SwitchportMode::Access)
                    .await
                    .map_err(ReconcileError::switch(switch))?;
            }
        }

        for (switch, ports) in &topo.port_vlans {
            let driver = self.driver(switch)?;
            let mut deleted: BTreeSet<VlanId> = BTreeSet::new();
            for vlan in ports.values().flatten() {
                if deleted.insert(*vlan) {
                    driver
                        .delete_vlan(*vlan)
                        .await
                        .map_err(ReconcileError::switch(switch))?;
                    debug!(switch = %switch, vlan = %vlan, "Deleted VLAN");
                }
            }
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn deconfigure_mtu(&mut self, topo: &Topology) -> ReconcileResult<()> {
        for (switch, mtus) in &topo.mtu_list {
            let driver = self.driver(switch)?;
            for port in mtus.values().flatten() {
                driver
                    .set_mtu_for_port(*port, Mtu::RESET)
                    .await
                    .map_err(ReconcileError::switch(switch))?;
                debug!(switch = %switch, port = port, "Reset port MTU");
            }
        }
        Ok(())
    }
}
