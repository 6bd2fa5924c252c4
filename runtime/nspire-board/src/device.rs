//! Device registration
//!
//! Builds one [`DeviceDescriptor`] per on-board peripheral and hands it to the
//! device registry in a fixed order:
//!
//! 1. `lcd`      - display controller (required)
//! 2. `uart`     - serial console (required)
//! 3. `keypad`   - keypad matrix controller (optional)
//! 4. `usb-host` - USB host controller (optional)
//!
//! Later stages assume the display and console exist, so a failure on either
//! aborts registration before anything after it. Optional peripherals that
//! fail are logged and reported in [`RegistrationReport`].

use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use log::{debug, error, info, warn};

use crate::clock::{ClockSource, ClockTable};
use crate::config::BoardConfig;
use crate::display::DisplayBoardOps;
use crate::irq::{ActiveInterrupts, InterruptLine};
use crate::keypad::KeypadConfig;
use crate::resources::{
    APB_KEYPAD, APB_PHYS_BASE, APB_SLOT_SIZE, APB_UART, IRQ_KEYPAD, IRQ_LCD, IRQ_UART, IRQ_USB,
    LCD_PHYS_BASE, LCD_SIZE, USB_PHYS_BASE, USB_SIZE,
};
use crate::timer::TimerConfig;
use crate::{BringupError, PlatformError, Result};

/// A resource owned by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Physical register window
    Memory { start: usize, length: usize },
    Interrupt(InterruptLine),
}

/// UART flavour wired to the console pins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialKind {
    Ns16550,
    Pl011,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub kind: SerialKind,
    pub baud: u32,
}

/// Driver-specific payload carried by a descriptor
pub enum DeviceConfig {
    Display(Box<dyn DisplayBoardOps>),
    Serial(SerialConfig),
    Keypad(KeypadConfig),
    Timer(TimerConfig),
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceConfig::Display(ops) => f
                .debug_struct("Display")
                .field("name", &ops.name())
                .field("panel", ops.panel())
                .finish(),
            DeviceConfig::Serial(config) => f.debug_tuple("Serial").field(config).finish(),
            DeviceConfig::Keypad(config) => f.debug_tuple("Keypad").field(config).finish(),
            DeviceConfig::Timer(config) => f.debug_tuple("Timer").field(config).finish(),
        }
    }
}

/// Everything the registry needs to bind a driver to a peripheral
#[derive(Debug)]
pub struct DeviceDescriptor {
    pub name: &'static str,
    pub instance_id: u32,
    pub resources: Vec<Resource>,
    /// Default clock, resolved before registration
    pub clock: Option<ClockSource>,
    pub config: Option<DeviceConfig>,
}

impl DeviceDescriptor {
    pub fn interrupts(&self) -> impl Iterator<Item = InterruptLine> + '_ {
        self.resources.iter().filter_map(|r| match r {
            Resource::Interrupt(line) => Some(*line),
            Resource::Memory { .. } => None,
        })
    }
}

/// Registry token for a registered device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub u32);

/// Device/driver registry of the operating environment
pub trait DeviceRegistry {
    fn register(
        &mut self,
        descriptor: DeviceDescriptor,
    ) -> core::result::Result<DeviceHandle, PlatformError>;
}

/// Whether bring-up can survive without a peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    Required,
    Optional,
}

/// Outcome of the registration pass
#[derive(Debug, Default)]
pub struct RegistrationReport {
    pub registered: Vec<(&'static str, DeviceHandle)>,
    /// Optional peripherals that could not be registered
    pub failures: Vec<(&'static str, BringupError)>,
}

impl RegistrationReport {
    pub fn handle(&self, name: &str) -> Option<DeviceHandle> {
        self.registered
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, h)| *h)
    }
}

struct Pending {
    criticality: Criticality,
    descriptor: DeviceDescriptor,
}

/// Registers the on-board peripherals
pub struct DeviceRegistrar {
    display: Box<dyn DisplayBoardOps>,
    serial: SerialConfig,
    keypad: KeypadConfig,
}

impl DeviceRegistrar {
    /// Registrar with the display callbacks of the configured revision
    pub fn new(config: &BoardConfig) -> Self {
        Self::with_display(config, config.revision().display_ops())
    }

    /// Registrar with explicit display callbacks
    pub fn with_display(config: &BoardConfig, display: Box<dyn DisplayBoardOps>) -> Self {
        Self {
            display,
            serial: config.serial(),
            keypad: config.keypad().clone(),
        }
    }

    /// Peripherals in registration order
    fn peripherals(self) -> [Pending; 4] {
        [
            Pending {
                criticality: Criticality::Required,
                descriptor: DeviceDescriptor {
                    name: "lcd",
                    instance_id: 0,
                    resources: vec![
                        Resource::Memory {
                            start: LCD_PHYS_BASE,
                            length: LCD_SIZE,
                        },
                        Resource::Interrupt(IRQ_LCD),
                    ],
                    clock: None,
                    config: Some(DeviceConfig::Display(self.display)),
                },
            },
            Pending {
                criticality: Criticality::Required,
                descriptor: DeviceDescriptor {
                    name: "uart",
                    instance_id: 0,
                    resources: vec![
                        Resource::Memory {
                            start: APB_PHYS_BASE + APB_UART,
                            length: APB_SLOT_SIZE,
                        },
                        Resource::Interrupt(IRQ_UART),
                    ],
                    clock: None,
                    config: Some(DeviceConfig::Serial(self.serial)),
                },
            },
            Pending {
                criticality: Criticality::Optional,
                descriptor: DeviceDescriptor {
                    name: "keypad",
                    instance_id: 0,
                    resources: vec![
                        Resource::Memory {
                            start: APB_PHYS_BASE + APB_KEYPAD,
                            length: APB_SLOT_SIZE,
                        },
                        Resource::Interrupt(IRQ_KEYPAD),
                    ],
                    clock: None,
                    config: Some(DeviceConfig::Keypad(self.keypad)),
                },
            },
            Pending {
                criticality: Criticality::Optional,
                descriptor: DeviceDescriptor {
                    name: "usb-host",
                    instance_id: 0,
                    resources: vec![
                        Resource::Memory {
                            start: USB_PHYS_BASE,
                            length: USB_SIZE,
                        },
                        Resource::Interrupt(IRQ_USB),
                    ],
                    clock: None,
                    config: None,
                },
            },
        ]
    }

    /// Register every peripheral in order
    ///
    /// Takes the published [`ClockTable`] and the initialized controller, so
    /// it cannot run before the clock registrar or interrupt bring-up.
    ///
    /// # Errors
    /// The first failure of a required peripheral. Nothing after it is
    /// registered.
    pub fn register_all(
        self,
        registry: &mut dyn DeviceRegistry,
        clocks: &ClockTable,
        interrupts: &mut ActiveInterrupts<'_>,
    ) -> Result<RegistrationReport> {
        let mut report = RegistrationReport::default();

        for pending in self.peripherals() {
            let name = pending.descriptor.name;
            match register_one(pending.descriptor, registry, clocks, interrupts) {
                Ok(handle) => {
                    debug!("Registered {} as {:?}", name, handle);
                    report.registered.push((name, handle));
                }
                Err(err) if pending.criticality == Criticality::Required => {
                    error!("Required device {} failed: {}", name, err);
                    return Err(err);
                }
                Err(err) => {
                    warn!("Optional device {} not registered: {}", name, err);
                    report.failures.push((name, err));
                }
            }
        }

        info!(
            "Registered {} devices ({} skipped)",
            report.registered.len(),
            report.failures.len()
        );
        Ok(report)
    }
}

/// Resolve clock, claim IRQs, register; IRQs are released on failure
fn register_one(
    mut descriptor: DeviceDescriptor,
    registry: &mut dyn DeviceRegistry,
    clocks: &ClockTable,
    interrupts: &mut ActiveInterrupts<'_>,
) -> Result<DeviceHandle> {
    let name = descriptor.name;
    descriptor.clock = Some(*clocks.lookup(name, None)?);

    let lines: Vec<InterruptLine> = descriptor.interrupts().collect();
    let mut claimed = Vec::with_capacity(lines.len());
    for line in lines {
        if let Err(err) = interrupts.claim(line) {
            claimed.iter().for_each(|l| interrupts.release(*l));
            return Err(err);
        }
        claimed.push(line);
    }

    registry.register(descriptor).map_err(|err| {
        claimed.iter().for_each(|l| interrupts.release(*l));
        BringupError::RegistrationFailure {
            device: name,
            reason: err.to_string(),
        }
    })
}
