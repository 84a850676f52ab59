//! Data switch configuration for cluster deployment
//!
//! Turns the cluster definition into per-switch views ([`Topology`]) and
//! applies or reverses them through vendor switch drivers:
//!
//! - [`config`]: serde model of `config.yml` with cross-reference validation
//! - [`topology`]: aggregation of VLANs, MTUs, port-channels and MLAG pairs
//! - [`reconcile`]: ordered configure / deconfigure passes over the drivers
//! - [`prompt`]: operator confirmation before MLAG teardown

pub mod config;
pub mod error;
pub mod prompt;
pub mod reconcile;
pub mod topology;
pub mod views;

pub use config::{ClusterConfig, Interface, NodeTemplate, SwitchRecord};
pub use error::{ConfigError, ConfigResult, ReconcileError, ReconcileResult};
pub use prompt::{Confirm, LinePrompt, StdinConfirm};
pub use reconcile::{DriverMap, Reconciler};
pub use topology::TopologyAggregator;
pub use views::{ChannelGroup, MlagMember, MlagPair, PortGroup, Topology};
