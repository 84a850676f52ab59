//! Vendor driver registry.

use netcfg_common::{AccessInfo, SwitchDriver, SwitchError, SwitchResult};
use std::collections::BTreeMap;
use std::fmt;

use crate::mellanox::{self, Mellanox};

/// Builds a driver for one switch
pub type DriverConstructor =
    Box<dyn Fn(&AccessInfo) -> SwitchResult<Box<dyn SwitchDriver>> + Send + Sync>;

/// Maps vendor classes to driver constructors
///
/// Vendor keys are matched case-insensitively.
#[derive(Default)]
pub struct SwitchFactory {
    constructors: BTreeMap<String, DriverConstructor>,
}

impl SwitchFactory {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every driver shipped in this crate
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        factory.register(mellanox::VENDOR, |info| {
            Ok(Box::new(Mellanox::new(info)?) as Box<dyn SwitchDriver>)
        });
        factory
    }

    /// Registers (or replaces) the constructor for a vendor class
    pub fn register<F>(&mut self, vendor: &str, constructor: F)
    where
        F: Fn(&AccessInfo) -> SwitchResult<Box<dyn SwitchDriver>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(vendor.to_lowercase(), Box::new(constructor));
    }

    /// Builds the driver for a switch from its vendor class
    pub fn create(&self, info: &AccessInfo) -> SwitchResult<Box<dyn SwitchDriver>> {
        let constructor = self
            .constructors
            .get(&info.vendor.to_lowercase())
            .ok_or_else(|| SwitchError::unknown_vendor(&info.vendor))?;
        constructor(info)
    }

    /// Registered vendor classes, sorted
    pub fn vendors(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for SwitchFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchFactory")
            .field("vendors", &self.vendors())
            .finish()
    }
}
