//! Integration test infrastructure for data switch configuration
//!
//! Provides:
//! - Cluster definition fixtures built through [`ClusterBuilder`]
//! - [`RecordingSwitch`], a driver that logs every call it receives
//! - [`CallVerifier`] assertions over the recorded call log
//! - [`ScriptedConfirm`] answers for the MLAG teardown prompt

pub mod fixtures;
mod verification;

pub use fixtures::*;
pub use verification::*;
