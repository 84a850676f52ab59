//! Vendor switch drivers for data switch configuration
//!
//! Provides the [`SwitchFactory`] registry that turns a switch's access info
//! into a [`SwitchDriver`](netcfg_common::SwitchDriver), along with the
//! built-in Mellanox Onyx driver and the ssh / command-file transports it
//! sends commands through.

pub mod factory;
pub mod mellanox;
pub mod transport;

pub use factory::{DriverConstructor, SwitchFactory};
pub use mellanox::Mellanox;
pub use transport::{SshTarget, Transport};
