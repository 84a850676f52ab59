//! Error types for configuration loading, aggregation and reconciliation.

use netcfg_common::SwitchError;
use netcfg_types::ParseError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration and aggregation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for reconciliation passes.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors in the cluster definition.
///
/// Raised while loading or validating the config file, or while aggregating
/// views that depend on cross references the loader cannot check alone.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown data switch '{label}' referenced by {context}")]
    UnknownSwitch { label: String, context: String },

    #[error("Unknown interface '{label}' referenced by {context}")]
    UnknownInterface { label: String, context: String },

    #[error("Duplicate data switch label '{label}'")]
    DuplicateSwitch { label: String },

    #[error("MLAG peering is not symmetric: {switch} names {peer}, which names {peer_of_peer:?}")]
    AsymmetricMlagPeer {
        switch: String,
        peer: String,
        peer_of_peer: Option<String>,
    },

    #[error("Both {switch} and {peer} are flagged as MLAG master")]
    ConflictingMlagMaster { switch: String, peer: String },

    #[error("Switch {switch} has no link to its MLAG peer {peer}")]
    MissingMlagLink { switch: String, peer: String },

    #[error("MLAG link from {switch} to {peer} has no {field}")]
    IncompleteMlagLink {
        switch: String,
        peer: String,
        field: &'static str,
    },

    #[error("Port channel group for bond {bond} (template {template}) spans {count} switches under master {master}")]
    MlagMembership {
        bond: String,
        template: String,
        master: String,
        count: usize,
    },

    #[error("MLAG port groups for bond {bond} (template {template}) do not line up between {master} and {peer}")]
    MisalignedMlagGroups {
        bond: String,
        template: String,
        master: String,
        peer: String,
    },

    #[error("Interface '{label}' has an invalid VLAN device name '{device}'")]
    InvalidVlanInterface { label: String, device: String },

    #[error("No management network prefix in deployer.networks.mgmt")]
    MissingMgmtNetwork,

    #[error("Invalid address in MLAG link: {0}")]
    InvalidAddress(#[from] ParseError),
}

impl ConfigError {
    /// Creates an unknown switch error.
    pub fn unknown_switch(label: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnknownSwitch {
            label: label.into(),
            context: context.into(),
        }
    }

    /// Creates an unknown interface error.
    pub fn unknown_interface(label: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnknownInterface {
            label: label.into(),
            context: context.into(),
        }
    }
}

/// Errors that abort a configure or deconfigure pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A view references a switch with no driver instance.
    #[error("No switch driver for '{switch}'")]
    MissingDriver { switch: String },

    /// A driver call failed.
    #[error("Switch {switch}: {source}")]
    Switch {
        switch: String,
        #[source]
        source: SwitchError,
    },

    /// A driver could not be constructed.
    #[error("Failed to create driver for switch {switch}: {source}")]
    Factory {
        switch: String,
        #[source]
        source: SwitchError,
    },

    /// Reading the operator's answer failed, or input ended.
    #[error("Failed to read confirmation: {0}")]
    Prompt(#[source] io::Error),
}

impl ReconcileError {
    /// Returns a closure wrapping a driver error with the switch label.
    pub fn switch(switch: &str) -> impl FnOnce(SwitchError) -> Self + '_ {
        move |source| Self::Switch {
            switch: switch.to_string(),
            source,
        }
    }
}
