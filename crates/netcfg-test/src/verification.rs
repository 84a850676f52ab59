//! Verification helpers for testing reconciliation
//!
//! Provides a recording switch driver, assertions over what it recorded,
//! and a scripted confirmation prompt.

use async_trait::async_trait;
use data_switch_cfg::{Confirm, DriverMap};
use netcfg_common::{MlagParams, SwitchDriver, SwitchError, SwitchResult};
use netcfg_types::{Mtu, SwitchportMode, VlanId};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// One driver call with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    CreateVlan(VlanId),
    DeleteVlan(VlanId),
    SetSwitchportMode(u32, SwitchportMode),
    AddVlansToPort(u32, Vec<VlanId>),
    RemoveVlansFromPort(u32, Vec<VlanId>),
    SetMtuForPort(u32, Mtu),
    IsMlagConfigured,
    ConfigureMlag(MlagParams),
    EnableMlag,
    DeconfigureMlag,
    CreateLagInterface(u32),
    RemoveLagInterface(u32),
    RemoveChannelGroup(u32),
    BindPortsToLagInterface(Vec<u32>, u32),
    AddVlansToLagPortChannel(u32, Vec<VlanId>),
    SetMtuForLagPortChannel(u32, Mtu),
    CreateMlagInterface(u32),
    RemoveMlagInterface(u32),
    BindPortToMlagInterface(u32, u32),
    AddVlansToMlagPortChannel(u32, Vec<VlanId>),
    SetMtuForMlagPortChannel(u32, Mtu),
}

impl DriverCall {
    /// Name of the driver method, as used for failure injection.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateVlan(_) => "create_vlan",
            Self::DeleteVlan(_) => "delete_vlan",
            Self::SetSwitchportMode(..) => "set_switchport_mode",
            Self::AddVlansToPort(..) => "add_vlans_to_port",
            Self::RemoveVlansFromPort(..) => "remove_vlans_from_port",
            Self::SetMtuForPort(..) => "set_mtu_for_port",
            Self::IsMlagConfigured => "is_mlag_configured",
            Self::ConfigureMlag(_) => "configure_mlag",
            Self::EnableMlag => "enable_mlag",
            Self::DeconfigureMlag => "deconfigure_mlag",
            Self::CreateLagInterface(_) => "create_lag_interface",
            Self::RemoveLagInterface(_) => "remove_lag_interface",
            Self::RemoveChannelGroup(_) => "remove_channel_group",
            Self::BindPortsToLagInterface(..) => "bind_ports_to_lag_interface",
            Self::AddVlansToLagPortChannel(..) => "add_vlans_to_lag_port_channel",
            Self::SetMtuForLagPortChannel(..) => "set_mtu_for_lag_port_channel",
            Self::CreateMlagInterface(_) => "create_mlag_interface",
            Self::RemoveMlagInterface(_) => "remove_mlag_interface",
            Self::BindPortToMlagInterface(..) => "bind_port_to_mlag_interface",
            Self::AddVlansToMlagPortChannel(..) => "add_vlans_to_mlag_port_channel",
            Self::SetMtuForMlagPortChannel(..) => "set_mtu_for_mlag_port_channel",
        }
    }

    /// True for calls that only read switch state.
    pub fn is_query(&self) -> bool {
        matches!(self, Self::IsMlagConfigured)
    }
}

/// A call as seen by one switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub switch: String,
    pub call: DriverCall,
}

/// Call log shared by every [`RecordingSwitch`] of a test, in global order.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<RecordedCall>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, switch: &str, call: DriverCall) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                switch: switch.to_string(),
                call,
            });
    }

    /// Copy of everything recorded so far.
    pub fn snapshot(&self) -> Vec<RecordedCall> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// Switch driver that records calls instead of talking to hardware.
///
/// MLAG state follows the calls: `configure_mlag` sets it and
/// `deconfigure_mlag` clears it.
#[derive(Debug)]
pub struct RecordingSwitch {
    label: String,
    log: CallLog,
    mlag_configured: bool,
    fail_on: Option<&'static str>,
}

impl RecordingSwitch {
    pub fn new(label: impl Into<String>, log: &CallLog) -> Self {
        Self {
            label: label.into(),
            log: log.clone(),
            mlag_configured: false,
            fail_on: None,
        }
    }

    /// Starts with MLAG already configured.
    pub fn with_mlag_configured(mut self, configured: bool) -> Self {
        self.mlag_configured = configured;
        self
    }

    /// Fails every call to the named driver method, after recording it.
    pub fn fail_on(mut self, method: &'static str) -> Self {
        self.fail_on = Some(method);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn record(&mut self, call: DriverCall) -> SwitchResult<()> {
        let name = call.name();
        debug!(switch = %self.label, ?call, "Recorded driver call");
        self.log.push(&self.label, call);
        if self.fail_on == Some(name) {
            return Err(SwitchError::verification(
                &self.label,
                format!("injected failure in {}", name),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SwitchDriver for RecordingSwitch {
    fn vendor(&self) -> &str {
        "recording"
    }

    async fn create_vlan(&mut self, vlan: VlanId) -> SwitchResult<()> {
        self.record(DriverCall::CreateVlan(vlan))
    }

    async fn delete_vlan(&mut self, vlan: VlanId) -> SwitchResult<()> {
        self.record(DriverCall::DeleteVlan(vlan))
    }

    async fn set_switchport_mode(&mut self, port: u32, mode: SwitchportMode) -> SwitchResult<()> {
        self.record(DriverCall::SetSwitchportMode(port, mode))
    }

    async fn add_vlans_to_port(&mut self, port: u32, vlans: &[VlanId]) -> SwitchResult<()> {
        self.record(DriverCall::AddVlansToPort(port, vlans.to_vec()))
    }

    async fn remove_vlans_from_port(&mut self, port: u32, vlans: &[VlanId]) -> SwitchResult<()> {
        self.record(DriverCall::RemoveVlansFromPort(port, vlans.to_vec()))
    }

    async fn set_mtu_for_port(&mut self, port: u32, mtu: Mtu) -> SwitchResult<()> {
        self.record(DriverCall::SetMtuForPort(port, mtu))
    }

    async fn is_mlag_configured(&mut self) -> SwitchResult<bool> {
        self.record(DriverCall::IsMlagConfigured)?;
        Ok(self.mlag_configured)
    }

    async fn configure_mlag(&mut self, params: &MlagParams) -> SwitchResult<()> {
        self.record(DriverCall::ConfigureMlag(params.clone()))?;
        self.mlag_configured = true;
        Ok(())
    }

    async fn enable_mlag(&mut self) -> SwitchResult<()> {
        self.record(DriverCall::EnableMlag)
    }

    async fn deconfigure_mlag(&mut self) -> SwitchResult<()> {
        self.record(DriverCall::DeconfigureMlag)?;
        self.mlag_configured = false;
        Ok(())
    }

    async fn create_lag_interface(&mut self, channel: u32) -> SwitchResult<()> {
        self.record(DriverCall::CreateLagInterface(channel))
    }

    async fn remove_lag_interface(&mut self, channel: u32) -> SwitchResult<()> {
        self.record(DriverCall::RemoveLagInterface(channel))
    }

    async fn remove_channel_group(&mut self, port: u32) -> SwitchResult<()> {
        self.record(DriverCall::RemoveChannelGroup(port))
    }

    async fn bind_ports_to_lag_interface(
        &mut self,
        ports: &[u32],
        channel: u32,
    ) -> SwitchResult<()> {
        self.record(DriverCall::BindPortsToLagInterface(ports.to_vec(), channel))
    }

    async fn add_vlans_to_lag_port_channel(
        &mut self,
        channel: u32,
        vlans: &[VlanId],
    ) -> SwitchResult<()> {
        self.record(DriverCall::AddVlansToLagPortChannel(channel, vlans.to_vec()))
    }

    async fn set_mtu_for_lag_port_channel(&mut self, channel: u32, mtu: Mtu) -> SwitchResult<()> {
        self.record(DriverCall::SetMtuForLagPortChannel(channel, mtu))
    }

    async fn create_mlag_interface(&mut self, channel: u32) -> SwitchResult<()> {
        self.record(DriverCall::CreateMlagInterface(channel))
    }

    async fn remove_mlag_interface(&mut self, channel: u32) -> SwitchResult<()> {
        self.record(DriverCall::RemoveMlagInterface(channel))
    }

    async fn bind_port_to_mlag_interface(&mut self, port: u32, channel: u32) -> SwitchResult<()> {
        self.record(DriverCall::BindPortToMlagInterface(port, channel))
    }

    async fn add_vlans_to_mlag_port_channel(
        &mut self,
        channel: u32,
        vlans: &[VlanId],
    ) -> SwitchResult<()> {
        self.record(DriverCall::AddVlansToMlagPortChannel(channel, vlans.to_vec()))
    }

    async fn set_mtu_for_mlag_port_channel(&mut self, channel: u32, mtu: Mtu) -> SwitchResult<()> {
        self.record(DriverCall::SetMtuForMlagPortChannel(channel, mtu))
    }
}

/// Builds a driver map of recording switches keyed by label.
pub fn recording_drivers<I>(switches: I) -> DriverMap
where
    I: IntoIterator<Item = RecordingSwitch>,
{
    switches
        .into_iter()
        .map(|sw| {
            let label = sw.label().to_string();
            (label, Box::new(sw) as Box<dyn SwitchDriver>)
        })
        .collect()
}

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Switch {switch}: expected call {call} was not made; calls were {actual}")]
    CallNotFound {
        switch: String,
        call: String,
        actual: String,
    },

    #[error("Switch {switch}: unexpected call {call}")]
    UnexpectedCall { switch: String, call: String },

    #[error("Switch {switch}: call {call} out of order; calls were {actual}")]
    OutOfOrder {
        switch: String,
        call: String,
        actual: String,
    },

    #[error("Switch {switch}: expected {expected} calls to {method}, found {actual}")]
    CountMismatch {
        switch: String,
        method: String,
        expected: usize,
        actual: usize,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Assertions over a snapshot of the call log.
pub struct CallVerifier {
    calls: Vec<RecordedCall>,
}

impl CallVerifier {
    pub fn new(log: &CallLog) -> Self {
        Self {
            calls: log.snapshot(),
        }
    }

    /// Every recorded call, in global order.
    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    /// Calls made on one switch, queries excluded.
    pub fn calls_for(&self, switch: &str) -> Vec<&DriverCall> {
        self.calls
            .iter()
            .filter(|rc| rc.switch == switch && !rc.call.is_query())
            .map(|rc| &rc.call)
            .collect()
    }

    /// Number of calls to a driver method on one switch.
    pub fn count(&self, switch: &str, method: &str) -> usize {
        self.calls
            .iter()
            .filter(|rc| rc.switch == switch && rc.call.name() == method)
            .count()
    }

    fn describe(&self, switch: &str) -> String {
        format!("{:?}", self.calls_for(switch))
    }

    /// Verify that a call was made on a switch
    pub fn assert_called(&self, switch: &str, call: &DriverCall) -> VerifyResult<()> {
        if self.calls_for(switch).contains(&call) {
            Ok(())
        } else {
            Err(VerificationError::CallNotFound {
                switch: switch.to_string(),
                call: format!("{:?}", call),
                actual: self.describe(switch),
            })
        }
    }

    /// Verify that a driver method was never called on a switch
    pub fn assert_not_called(&self, switch: &str, method: &str) -> VerifyResult<()> {
        match self
            .calls
            .iter()
            .find(|rc| rc.switch == switch && rc.call.name() == method)
        {
            Some(rc) => Err(VerificationError::UnexpectedCall {
                switch: switch.to_string(),
                call: format!("{:?}", rc.call),
            }),
            None => Ok(()),
        }
    }

    /// Verify the number of calls to a driver method on a switch
    pub fn assert_count(&self, switch: &str, method: &str, expected: usize) -> VerifyResult<()> {
        let actual = self.count(switch, method);
        if actual != expected {
            return Err(VerificationError::CountMismatch {
                switch: switch.to_string(),
                method: method.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Verify that `expected` appears on a switch as a subsequence, other
    /// calls allowed in between.
    pub fn assert_in_order(&self, switch: &str, expected: &[DriverCall]) -> VerifyResult<()> {
        let calls = self.calls_for(switch);
        let mut remaining = calls.iter();
        for call in expected {
            if !remaining.any(|c| *c == call) {
                let err = if calls.contains(&call) {
                    VerificationError::OutOfOrder {
                        switch: switch.to_string(),
                        call: format!("{:?}", call),
                        actual: self.describe(switch),
                    }
                } else {
                    VerificationError::CallNotFound {
                        switch: switch.to_string(),
                        call: format!("{:?}", call),
                        actual: self.describe(switch),
                    }
                };
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Confirmation prompt answering from a script.
///
/// Running out of answers behaves like end of input on a terminal.
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    answers: VecDeque<bool>,
    prompts: Vec<String>,
}

impl ScriptedConfirm {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            prompts: Vec::new(),
        }
    }

    /// Messages shown so far.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

#[async_trait]
impl Confirm for ScriptedConfirm {
    async fn confirm(&mut self, message: &str) -> io::Result<bool> {
        self.prompts.push(message.to_string());
        self.answers.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted answer left")
        })
    }
}
