//! Mellanox Onyx switch driver

pub mod commands;

use async_trait::async_trait;
use netcfg_common::{AccessInfo, MlagParams, SwitchDriver, SwitchError, SwitchResult};
use netcfg_types::{Mtu, SwitchportMode, VlanId};
use tracing::{debug, info, instrument, warn};

#[cfg(test)]
use std::collections::HashMap;

use crate::transport::Transport;
use commands::{
    build_add_vlan_to_port_cmd, build_bind_port_to_lag_cmd, build_bind_port_to_mlag_cmds,
    build_configure_mlag_cmds, build_create_lag_cmd, build_create_mlag_interface_cmds,
    build_create_vlan_cmd, build_deconfigure_mlag_cmds, build_delete_vlan_cmd,
    build_enable_mlag_cmd, build_port_channel_mtu_cmd, build_port_channel_vlans_cmds,
    build_port_mtu_cmds, build_remote_cmd, build_remove_channel_group_cmd,
    build_remove_lag_cmd, build_remove_mlag_interface_cmd, build_remove_vlan_from_port_cmd,
    build_switchport_mode_cmd, parse_ipl, parse_port_channel_members, parse_switchports,
    vlan_exists, IplInfo, PortState, SHOW_LAG_SUMMARY, SHOW_MLAG, SHOW_SWITCHPORT, SHOW_VLAN,
};

/// Vendor class the registry knows this driver by
pub const VENDOR: &str = "mellanox";

/// Driver for Mellanox switches running Onyx
///
/// In active mode every command is wrapped for the Onyx CLI and sent over
/// ssh, and state changes are read back through show commands. In passive
/// mode commands are appended to the command file and every query reports
/// "not configured".
pub struct Mellanox {
    host: String,
    transport: Transport,

    /// Mock mode for testing
    #[cfg(test)]
    mock_mode: bool,

    /// Captured commands in mock mode
    #[cfg(test)]
    captured_commands: Vec<String>,

    /// Canned show-command output in mock mode
    #[cfg(test)]
    mock_replies: HashMap<String, String>,
}

impl Mellanox {
    /// Creates a driver for the switch described by `info`
    pub fn new(info: &AccessInfo) -> SwitchResult<Self> {
        let transport = Transport::from_access_info(info)?;
        info!(
            switch = %info.label,
            host = %info.host,
            mode = %info.mode,
            "Created Mellanox driver"
        );
        Ok(Self {
            host: info.host.clone(),
            transport,
            #[cfg(test)]
            mock_mode: false,
            #[cfg(test)]
            captured_commands: Vec::new(),
            #[cfg(test)]
            mock_replies: HashMap::new(),
        })
    }

    /// Enables mock mode for testing
    #[cfg(test)]
    pub fn with_mock_mode(mut self) -> Self {
        self.mock_mode = true;
        self
    }

    /// Sets the output returned for a show command in mock mode
    #[cfg(test)]
    pub fn with_reply(mut self, cmd: &str, output: &str) -> Self {
        self.mock_replies.insert(cmd.to_string(), output.to_string());
        self
    }

    /// Gets captured commands (for testing)
    #[cfg(test)]
    pub fn captured_commands(&self) -> &[String] {
        &self.captured_commands
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Send one command (with mock mode support)
    async fn exec(&mut self, cmd: &str) -> SwitchResult<String> {
        #[cfg(test)]
        if self.mock_mode {
            self.captured_commands.push(cmd.to_string());
            debug!("Mock exec: {}", cmd);
            return Ok(self.mock_replies.get(cmd).cloned().unwrap_or_default());
        }

        if self.transport.is_passive() {
            self.transport.send(cmd).await
        } else {
            self.transport.send(&build_remote_cmd(cmd)).await
        }
    }

    async fn exec_all(&mut self, cmds: &[String]) -> SwitchResult<()> {
        for cmd in cmds {
            self.exec(cmd).await?;
        }
        Ok(())
    }

    /// Run a show command; `None` in passive mode
    async fn query(&mut self, cmd: &str) -> SwitchResult<Option<String>> {
        #[cfg(test)]
        let passive = !self.mock_mode && self.transport.is_passive();
        #[cfg(not(test))]
        let passive = self.transport.is_passive();

        if passive {
            return Ok(None);
        }
        self.exec(cmd).await.map(Some)
    }

    async fn is_vlan_created(&mut self, vlan: VlanId) -> SwitchResult<Option<bool>> {
        Ok(self
            .query(SHOW_VLAN)
            .await?
            .map(|output| vlan_exists(&output, vlan)))
    }

    async fn port_state(&mut self, port: u32) -> SwitchResult<Option<PortState>> {
        let Some(output) = self.query(SHOW_SWITCHPORT).await? else {
            return Ok(None);
        };
        parse_switchports(&output)
            .remove(&port)
            .map(Some)
            .ok_or_else(|| {
                SwitchError::unexpected_output(SHOW_SWITCHPORT, format!("no entry for port {}", port))
            })
    }

    async fn ipl_info(&mut self) -> SwitchResult<Option<IplInfo>> {
        let Some(mlag) = self.query(SHOW_MLAG).await? else {
            return Ok(None);
        };
        let (port_channel, vlan) = parse_ipl(&mlag).ok_or_else(|| {
            SwitchError::unexpected_output(SHOW_MLAG, "MLAG port channel information not found")
        })?;
        info!(
            port_channel = port_channel,
            vlan = %vlan,
            "Found IPL port channel"
        );

        let summary = self.query(SHOW_LAG_SUMMARY).await?.unwrap_or_default();
        let ports = parse_port_channel_members(&summary, port_channel);
        if ports.is_empty() {
            return Err(SwitchError::unexpected_output(
                SHOW_LAG_SUMMARY,
                "MLAG IPL port channel information not found",
            ));
        }
        info!(ports = ?ports, "Found IPL ports");
        Ok(Some(IplInfo {
            port_channel,
            vlan,
            ports,
        }))
    }
}

#[async_trait]
impl SwitchDriver for Mellanox {
    fn vendor(&self) -> &str {
        VENDOR
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn create_vlan(&mut self, vlan: VlanId) -> SwitchResult<()> {
        self.exec(&build_create_vlan_cmd(vlan)).await?;
        if self.is_vlan_created(vlan).await? == Some(false) {
            return Err(SwitchError::verification(
                &self.host,
                format!("Failed creating VLAN {}", vlan),
            ));
        }
        debug!("Created VLAN {}", vlan);
        Ok(())
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn delete_vlan(&mut self, vlan: VlanId) -> SwitchResult<()> {
        self.exec(&build_delete_vlan_cmd(vlan)).await?;
        if self.is_vlan_created(vlan).await? == Some(true) {
            warn!("Failed deleting VLAN {}", vlan);
            return Err(SwitchError::verification(
                &self.host,
                format!("Failed deleting VLAN {}", vlan),
            ));
        }
        info!("VLAN {} deleted", vlan);
        Ok(())
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn set_switchport_mode(&mut self, port: u32, mode: SwitchportMode) -> SwitchResult<()> {
        self.exec(&build_switchport_mode_cmd(port, mode)).await?;
        if let Some(state) = self.port_state(port).await? {
            if !state.is_in_mode(mode) {
                return Err(SwitchError::verification(
                    &self.host,
                    format!("Failed setting port {} to {} mode", port, mode),
                ));
            }
        }
        info!("Set port {} to {} mode", port, mode);
        Ok(())
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn add_vlans_to_port(&mut self, port: u32, vlans: &[VlanId]) -> SwitchResult<()> {
        for vlan in vlans {
            self.exec(&build_add_vlan_to_port_cmd(port, *vlan)).await?;
            if let Some(state) = self.port_state(port).await? {
                if !state.allowed_vlans.contains(&vlan.as_u16()) {
                    return Err(SwitchError::verification(
                        &self.host,
                        format!("Failed adding VLAN {} to port {}", vlan, port),
                    ));
                }
            }
            debug!("VLAN {} is allowed for port {}", vlan, port);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn remove_vlans_from_port(&mut self, port: u32, vlans: &[VlanId]) -> SwitchResult<()> {
        for vlan in vlans {
            self.exec(&build_remove_vlan_from_port_cmd(port, *vlan))
                .await?;
            if let Some(state) = self.port_state(port).await? {
                if state.allowed_vlans.contains(&vlan.as_u16()) {
                    return Err(SwitchError::verification(
                        &self.host,
                        format!("Failed removing VLAN {} from port {}", vlan, port),
                    ));
                }
            }
            info!("VLAN {} removed from port {}", vlan, port);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn set_mtu_for_port(&mut self, port: u32, mtu: Mtu) -> SwitchResult<()> {
        self.exec_all(&build_port_mtu_cmds(port, mtu)).await
    }

    async fn is_mlag_configured(&mut self) -> SwitchResult<bool> {
        Ok(self
            .query(SHOW_MLAG)
            .await?
            .is_some_and(|output| parse_ipl(&output).is_some()))
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn configure_mlag(&mut self, params: &MlagParams) -> SwitchResult<()> {
        self.exec_all(&build_configure_mlag_cmds(params)).await?;
        if self.is_vlan_created(params.vlan).await? == Some(false) {
            return Err(SwitchError::verification(
                &self.host,
                format!("Failed creating MLAG VLAN {}", params.vlan),
            ));
        }
        info!(
            vlan = %params.vlan,
            port_channel = params.port_channel,
            "Configured MLAG"
        );
        Ok(())
    }

    async fn enable_mlag(&mut self) -> SwitchResult<()> {
        self.exec(&build_enable_mlag_cmd()).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(host = %self.host))]
    async fn deconfigure_mlag(&mut self) -> SwitchResult<()> {
        let Some(ipl) = self.ipl_info().await? else {
            warn!("MLAG state is unknown in passive mode, nothing removed");
            return Ok(());
        };
        self.exec_all(&build_deconfigure_mlag_cmds(&ipl)).await?;
        info!(port_channel = ipl.port_channel, "Deconfigured MLAG");
        Ok(())
    }

    async fn create_lag_interface(&mut self, channel: u32) -> SwitchResult<()> {
        self.exec(&build_create_lag_cmd(channel)).await?;
        Ok(())
    }

    async fn remove_lag_interface(&mut self, channel: u32) -> SwitchResult<()> {
        self.exec(&build_remove_lag_cmd(channel)).await?;
        Ok(())
    }

    async fn remove_channel_group(&mut self, port: u32) -> SwitchResult<()> {
        self.exec(&build_remove_channel_group_cmd(port)).await?;
        Ok(())
    }

    async fn bind_ports_to_lag_interface(
        &mut self,
        ports: &[u32],
        channel: u32,
    ) -> SwitchResult<()> {
        for port in ports {
            self.exec(&build_bind_port_to_lag_cmd(*port, channel))
                .await?;
        }
        Ok(())
    }

    async fn add_vlans_to_lag_port_channel(
        &mut self,
        channel: u32,
        vlans: &[VlanId],
    ) -> SwitchResult<()> {
        self.exec_all(&build_port_channel_vlans_cmds(channel, vlans, false))
            .await
    }

    async fn set_mtu_for_lag_port_channel(&mut self, channel: u32, mtu: Mtu) -> SwitchResult<()> {
        self.exec(&build_port_channel_mtu_cmd(channel, mtu, false))
            .await?;
        Ok(())
    }

    async fn create_mlag_interface(&mut self, channel: u32) -> SwitchResult<()> {
        self.exec_all(&build_create_mlag_interface_cmds(channel))
            .await
    }

    async fn remove_mlag_interface(&mut self, channel: u32) -> SwitchResult<()> {
        self.exec(&build_remove_mlag_interface_cmd(channel)).await?;
        Ok(())
    }

    async fn bind_port_to_mlag_interface(&mut self, port: u32, channel: u32) -> SwitchResult<()> {
        self.exec_all(&build_bind_port_to_mlag_cmds(port, channel))
            .await
    }

    async fn add_vlans_to_mlag_port_channel(
        &mut self,
        channel: u32,
        vlans: &[VlanId],
    ) -> SwitchResult<()> {
        self.exec_all(&build_port_channel_vlans_cmds(channel, vlans, true))
            .await
    }

    async fn set_mtu_for_mlag_port_channel(
        &mut self,
        channel: u32,
        mtu: Mtu,
    ) -> SwitchResult<()> {
        self.exec(&build_port_channel_mtu_cmd(channel, mtu, true))
            .await?;
        Ok(())
    }
}
