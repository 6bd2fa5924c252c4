//! Nspire Board - Hardware bring-up for the TI-Nspire SoC
//!
//! # Purpose
//! Describes the board's physical resources (register windows, clock tree,
//! interrupt wiring, framebuffer memory, keypad matrix) and drives the ordered
//! sequence that takes each subsystem from "physically present" to "usable".
//!
//! # Integration Points
//! - Depends on: virtual mapper, interrupt controller driver, device registry,
//!   DMA-coherent allocator (all behind traits, see [`Platform`])
//! - Provides to: timer, display, serial console, keypad and USB host drivers
//!
//! # Boot Sequence
//! ```text
//! RegionMapper ──▶ InterruptBringup ──▶ ClockRegistrar ──▶ TimerRegistrar ──▶ DeviceRegistrar
//!  (MappedRegions)   (ActiveInterrupts)    (ClockTable)      tick + counters    lcd, uart, keypad, usb-host
//! ```
//! Each stage consumes or borrows the product of the previous one, so the
//! order cannot be violated by a caller. Mapping is refused once the mapper
//! already holds the board's windows, so the sequence runs once per boot. The framebuffer is allocated lazily by
//! the display driver through [`display::DisplayBoardOps`], not at boot.
//!
//! # Testing Strategy
//! - Unit tests: table invariants, clock lookup, IRQ masking, framebuffer lifecycle
//! - Integration tests: full boot sequence against the `mock` platform

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

extern crate alloc;

pub mod clock;
pub mod config;
pub mod device;
pub mod display;
pub mod framebuffer;
pub mod irq;
pub mod keypad;
pub mod mmio;
pub mod resources;
pub mod restart;
pub mod timer;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use clock::{ClockBinding, ClockRegistrar, ClockSource, ClockTable};
pub use config::{BoardConfig, BoardRevision};
pub use device::{
    DeviceConfig, DeviceDescriptor, DeviceHandle, DeviceRegistrar, DeviceRegistry,
    RegistrationReport, Resource,
};
pub use display::{DisplayBoardOps, PanelGeometry};
pub use framebuffer::{
    AddressSpace, DmaAllocator, DmaBlock, FramebufferBuffer, FramebufferError, FramebufferManager,
    FramebufferState,
};
pub use irq::{ActiveInterrupts, InterruptBringup, InterruptController, InterruptLine, IrqMask};
pub use keypad::{KeyCode, KeypadConfig, KeypadMap};
pub use mmio::{
    AccessClass, MapFlags, MappedRegions, MemoryRegion, MmioRegisters, RegionMapper,
    RegisterAccessor, VirtualMapper, PAGE_SIZE,
};
pub use restart::RestartHandler;
pub use timer::{SocTimer, TimerConfig, TimerKind, TimerRegistrar, TimerRole};

use alloc::string::String;
use log::info;
use thiserror::Error;

/// Error types for board bring-up
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BringupError {
    /// Static tables disagree with each other (overlap, duplicate, misalignment)
    #[error("Resource conflict: {0}")]
    ResourceConflict(String),

    #[error("Failed to map region {region} (phys {phys:#x}): {reason}")]
    MappingFailure {
        region: &'static str,
        phys: usize,
        reason: String,
    },

    /// A mapping pass found its windows already mapped
    #[error("Region {region} at {virt:#x} is already mapped")]
    AlreadyMapped { region: &'static str, virt: usize },

    #[error("No such clock: {}/{}", .device, .connection.as_deref().unwrap_or("<default>"))]
    ClockNotFound {
        device: String,
        connection: Option<String>,
    },

    #[error("Registry rejected {device}: {reason}")]
    RegistrationFailure { device: &'static str, reason: String },

    #[error("IRQ {0} is not wired on this board")]
    InvalidInterruptLine(u8),

    #[error("IRQ {0} already claimed")]
    IrqAlreadyClaimed(u8),

    #[error("Interrupt controller initialization failed: {0}")]
    ControllerFailure(String),

    #[error("Invalid keypad map: {0}")]
    InvalidKeymap(String),
}

pub type Result<T> = core::result::Result<T, BringupError>;

/// Failure reported by an external collaborator (mapper, registry, allocator...)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PlatformError(pub String);

impl PlatformError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// The operating-environment services bring-up calls into
pub struct Platform<'a> {
    pub mapper: &'a mut dyn VirtualMapper,
    pub interrupts: &'a mut dyn InterruptController,
    pub registry: &'a mut dyn DeviceRegistry,
}

/// Everything bring-up produced, handed to the rest of the system
pub struct Board<'a> {
    pub mapped: MappedRegions,
    pub interrupts: ActiveInterrupts<'a>,
    pub clocks: ClockTable,
    pub timers: RegistrationReport,
    pub report: RegistrationReport,
}

/// Run the whole bring-up sequence for `config`
///
/// Stops at the first failure of a mandatory stage. Skipped timers are
/// collected in [`Board::timers`], failures of optional peripherals in
/// [`Board::report`].
pub fn bring_up<'a>(config: &BoardConfig, platform: Platform<'a>) -> Result<Board<'a>> {
    info!("Bringing up {} board", config.revision().name());

    let mapped = RegionMapper::new(config.regions()).map(platform.mapper)?;

    let mut interrupts =
        InterruptBringup::new(config.irq_mask()).init(platform.interrupts, &mapped)?;

    let clocks = ClockRegistrar::new(config.clock_sources(), config.clock_bindings()).publish()?;

    let timers = TimerRegistrar::new(config.timers()).register_all(
        platform.registry,
        &clocks,
        &mut interrupts,
    );

    let report = DeviceRegistrar::new(config).register_all(
        platform.registry,
        &clocks,
        &mut interrupts,
    )?;

    info!(
        "Bring-up complete: {} timers and {} devices registered, {} failures",
        timers.registered.len(),
        report.registered.len(),
        timers.failures.len() + report.failures.len()
    );

    Ok(Board {
        mapped,
        interrupts,
        clocks,
        timers,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_clock_not_found_message() {
        let err = BringupError::ClockNotFound {
            device: "lcd".into(),
            connection: None,
        };
        assert_eq!(err.to_string(), "No such clock: lcd/<default>");

        let err = BringupError::ClockNotFound {
            device: "uart".into(),
            connection: Some("apb_pclk".into()),
        };
        assert_eq!(err.to_string(), "No such clock: uart/apb_pclk");
    }

    #[test]
    fn test_platform_error_display() {
        let err = PlatformError::new("no frames left");
        assert_eq!(err.to_string(), "no frames left");
    }
}
