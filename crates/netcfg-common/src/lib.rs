//! Common infrastructure for data switch drivers.
//!
//! This crate provides the pieces shared by the vendor drivers and the
//! reconciliation engine:
//!
//! - [`shell`]: Safe shell command execution with proper quoting
//! - [`SwitchDriver`]: the capability set driven during reconciliation
//! - [`error`]: Error types for switch operations
//!
//! # Architecture
//!
//! A configuration pass follows this pattern:
//!
//! 1. The cluster definition is aggregated into per-switch views
//! 2. One [`SwitchDriver`] is built per switch from its [`AccessInfo`]
//! 3. Views are applied through driver calls, one call at a time
//! 4. The first [`SwitchError`] aborts the pass

pub mod driver;
pub mod error;
pub mod shell;

// Re-export commonly used items at crate root
pub use driver::{AccessInfo, DriverMode, MlagParams, SwitchDriver};
pub use error::{SwitchError, SwitchResult};
