//! Clock tree - fixed-rate sources and name-based bindings
//!
//! Every clock on the Nspire is a hard constant; there are no PLLs or
//! dividers to model. Drivers find "their" clock by `(device, connection)`,
//! where a missing connection means the device's default clock.

use alloc::string::ToString;
use alloc::vec::Vec;
use log::{debug, info};

use crate::{BringupError, Result};

/// A fixed-frequency clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSource {
    pub name: &'static str,
    pub rate_hz: u32,
}

impl ClockSource {
    pub const fn new(name: &'static str, rate_hz: u32) -> Self {
        Self { name, rate_hz }
    }
}

/// Association from `(device, connection)` to a clock source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockBinding {
    pub device_id: &'static str,
    pub connection_id: Option<&'static str>,
    pub clock: &'static ClockSource,
}

impl ClockBinding {
    pub const fn new(
        device_id: &'static str,
        connection_id: Option<&'static str>,
        clock: &'static ClockSource,
    ) -> Self {
        Self {
            device_id,
            connection_id,
            clock,
        }
    }

    fn key(&self) -> (&'static str, Option<&'static str>) {
        (self.device_id, self.connection_id)
    }
}

/// Publishes the static clock table
pub struct ClockRegistrar {
    sources: &'static [&'static ClockSource],
    bindings: &'static [ClockBinding],
}

impl ClockRegistrar {
    pub fn new(
        sources: &'static [&'static ClockSource],
        bindings: &'static [ClockBinding],
    ) -> Self {
        Self { sources, bindings }
    }

    /// Validate and publish the table
    ///
    /// # Errors
    /// `ResourceConflict` for duplicate source names, duplicate binding keys,
    /// or a binding to a source that is not part of the table.
    pub fn publish(self) -> Result<ClockTable> {
        validate_clocks(self.sources, self.bindings)?;

        for source in self.sources {
            debug!("Clock {} at {} Hz", source.name, source.rate_hz);
        }
        info!(
            "Published {} clocks with {} bindings",
            self.sources.len(),
            self.bindings.len()
        );

        Ok(ClockTable {
            sources: self.sources,
            bindings: self.bindings.to_vec(),
        })
    }
}

/// Check a clock table for conflicts
pub fn validate_clocks(
    sources: &[&'static ClockSource],
    bindings: &[ClockBinding],
) -> Result<()> {
    for (i, a) in sources.iter().enumerate() {
        if sources[i + 1..].iter().any(|b| b.name == a.name) {
            return Err(BringupError::ResourceConflict(alloc::format!(
                "clock {} declared twice",
                a.name
            )));
        }
    }

    for (i, a) in bindings.iter().enumerate() {
        if bindings[i + 1..].iter().any(|b| b.key() == a.key()) {
            return Err(BringupError::ResourceConflict(alloc::format!(
                "duplicate clock binding {}/{:?}",
                a.device_id,
                a.connection_id
            )));
        }
        if !sources.iter().any(|s| *s == a.clock) {
            return Err(BringupError::ResourceConflict(alloc::format!(
                "binding {}/{:?} refers to unpublished clock {}",
                a.device_id,
                a.connection_id,
                a.clock.name
            )));
        }
    }

    Ok(())
}

/// The published clock tree
#[derive(Debug)]
pub struct ClockTable {
    sources: &'static [&'static ClockSource],
    bindings: Vec<ClockBinding>,
}

impl ClockTable {
    /// Resolve the clock bound to `(device_id, connection_id)`
    ///
    /// Matching is exact: a default binding does not answer for a named
    /// connection and vice versa.
    pub fn lookup(
        &self,
        device_id: &str,
        connection_id: Option<&str>,
    ) -> Result<&'static ClockSource> {
        self.bindings
            .iter()
            .find(|b| b.device_id == device_id && b.connection_id == connection_id)
            .map(|b| b.clock)
            .ok_or_else(|| BringupError::ClockNotFound {
                device: device_id.to_string(),
                connection: connection_id.map(|c| c.to_string()),
            })
    }

    pub fn sources(&self) -> &[&'static ClockSource] {
        self.sources
    }

    pub fn bindings(&self) -> &[ClockBinding] {
        &self.bindings
    }
}
