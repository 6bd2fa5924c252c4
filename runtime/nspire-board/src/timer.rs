//! Timer bring-up
//!
//! Runs right after the clock tree is published, before any other device.
//! Every timer block gets the board's `"timer"` clock and is registered with
//! a role: the first one whose interrupt line can be claimed drives the tick
//! (clockevent), every other one is a free-running counter (clocksource).
//!
//! A timer that cannot be set up is skipped with a warning; bring-up goes on
//! with the rest.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use log::{debug, info, warn};

use crate::clock::ClockTable;
use crate::device::{DeviceConfig, DeviceDescriptor, DeviceRegistry, RegistrationReport, Resource};
use crate::irq::{ActiveInterrupts, InterruptLine};
use crate::resources::APB_SLOT_SIZE;
use crate::BringupError;

/// Device name, and the clock binding key, of every timer
pub const TIMER_DEVICE: &str = "timer";

/// Timer block flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// ARM dual-timer module
    Sp804,
    /// Timer block of the classic models
    NspireClassic,
}

/// A timer block in the board's register map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocTimer {
    pub physical_base: usize,
    /// Wired interrupt, if the block has one
    pub irq: Option<InterruptLine>,
    pub kind: TimerKind,
}

impl SocTimer {
    pub const fn new(physical_base: usize, irq: Option<InterruptLine>, kind: TimerKind) -> Self {
        Self {
            physical_base,
            irq,
            kind,
        }
    }
}

/// What the kernel uses a timer for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRole {
    /// Interrupt-driven tick source
    Clockevent,
    /// Free-running counter
    Clocksource,
}

/// Driver payload of a timer descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    pub kind: TimerKind,
    pub role: TimerRole,
    /// `<physical base in hex>.timer`
    pub label: String,
}

/// Registers the board's timers
pub struct TimerRegistrar {
    timers: &'static [SocTimer],
}

impl TimerRegistrar {
    pub fn new(timers: &'static [SocTimer]) -> Self {
        Self { timers }
    }

    /// Register every timer in table order
    ///
    /// Takes the published [`ClockTable`], so it cannot run before the clock
    /// registrar. Never fails: a timer without a clock, or one the registry
    /// refuses, is reported and skipped.
    pub fn register_all(
        self,
        registry: &mut dyn DeviceRegistry,
        clocks: &ClockTable,
        interrupts: &mut ActiveInterrupts<'_>,
    ) -> RegistrationReport {
        let mut report = RegistrationReport::default();
        let mut clockevent_found = false;

        for (instance, timer) in self.timers.iter().enumerate() {
            let clock = match clocks.lookup(TIMER_DEVICE, None) {
                Ok(clock) => *clock,
                Err(err) => {
                    warn!("Timer at {:#x} has no clock: {}", timer.physical_base, err);
                    report.failures.push((TIMER_DEVICE, err));
                    continue;
                }
            };

            let mut resources = vec![Resource::Memory {
                start: timer.physical_base,
                length: APB_SLOT_SIZE,
            }];
            let mut role = TimerRole::Clocksource;
            if let (false, Some(line)) = (clockevent_found, timer.irq) {
                match interrupts.claim(line) {
                    Ok(()) => {
                        role = TimerRole::Clockevent;
                        resources.push(Resource::Interrupt(line));
                    }
                    Err(err) => warn!(
                        "Timer at {:#x} cannot drive the tick: {}",
                        timer.physical_base, err
                    ),
                }
            }

            let label = format!("{:x}.{}", timer.physical_base, TIMER_DEVICE);
            let descriptor = DeviceDescriptor {
                name: TIMER_DEVICE,
                instance_id: instance as u32,
                resources,
                clock: Some(clock),
                config: Some(DeviceConfig::Timer(TimerConfig {
                    kind: timer.kind,
                    role,
                    label: label.clone(),
                })),
            };

            match registry.register(descriptor) {
                Ok(handle) => {
                    debug!("Timer {} registered as {:?} ({:?})", label, role, handle);
                    clockevent_found |= role == TimerRole::Clockevent;
                    report.registered.push((TIMER_DEVICE, handle));
                }
                Err(err) => {
                    if role == TimerRole::Clockevent {
                        if let Some(line) = timer.irq {
                            interrupts.release(line);
                        }
                    }
                    warn!("Timer {} not registered: {}", label, err);
                    report.failures.push((
                        TIMER_DEVICE,
                        BringupError::RegistrationFailure {
                            device: TIMER_DEVICE,
                            reason: err.to_string(),
                        },
                    ));
                }
            }
        }

        if !clockevent_found {
            warn!("No timer drives the tick");
        }
        info!(
            "Registered {} timers ({} skipped)",
            report.registered.len(),
            report.failures.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ClockBinding, ClockRegistrar, ClockSource};
    use crate::irq::{InterruptBringup, IrqMask};
    use crate::mmio::RegionMapper;
    use crate::mock::{MockInterruptController, MockMapper, MockRegistry};
    use crate::resources::{
        CX_CLOCKS, CX_CLOCK_BINDINGS, CX_TIMERS, IMPLEMENTED_IRQS, IO_REGIONS, IRQ_TIMER0,
        IRQ_TIMER1,
    };
    use alloc::vec::Vec;

    fn run(
        timers: &'static [SocTimer],
        bindings: &'static [ClockBinding],
        mask: IrqMask,
        registry: &mut MockRegistry,
        controller: &mut MockInterruptController,
    ) -> RegistrationReport {
        let mapped = RegionMapper::new(&IO_REGIONS)
            .map(&mut MockMapper::new())
            .unwrap();
        let mut interrupts = InterruptBringup::new(mask).init(controller, &mapped).unwrap();
        let clocks = ClockRegistrar::new(&CX_CLOCKS, bindings).publish().unwrap();
        TimerRegistrar::new(timers).register_all(registry, &clocks, &mut interrupts)
    }

    fn roles(registry: &MockRegistry) -> Vec<(u32, TimerRole)> {
        registry
            .descriptors()
            .filter_map(|d| match &d.config {
                Some(DeviceConfig::Timer(config)) => Some((d.instance_id, config.role)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_timer_drives_the_tick() {
        let mut registry = MockRegistry::new();
        let mut controller = MockInterruptController::new();

        let report = run(
            &CX_TIMERS,
            &CX_CLOCK_BINDINGS,
            IMPLEMENTED_IRQS,
            &mut registry,
            &mut controller,
        );

        assert_eq!(report.registered.len(), 2);
        assert!(report.failures.is_empty());
        assert_eq!(
            roles(&registry),
            vec![(0, TimerRole::Clockevent), (1, TimerRole::Clocksource)]
        );
        // only the clockevent's line is unmasked
        assert_eq!(controller.unmasked(), &[IRQ_TIMER0]);

        let first = registry.descriptor(TIMER_DEVICE).unwrap();
        assert_eq!(first.clock.unwrap().name, "timer_clk");
        assert!(matches!(
            &first.config,
            Some(DeviceConfig::Timer(TimerConfig { label, .. })) if label == "900c0000.timer"
        ));
    }

    #[test]
    fn test_timer_without_irq_is_a_clocksource() {
        static TIMERS: [SocTimer; 2] = [
            SocTimer::new(0x900C_0000, None, TimerKind::Sp804),
            SocTimer::new(0x900D_0000, Some(IRQ_TIMER1), TimerKind::Sp804),
        ];
        let mut registry = MockRegistry::new();
        let mut controller = MockInterruptController::new();

        run(&TIMERS, &CX_CLOCK_BINDINGS, IMPLEMENTED_IRQS, &mut registry, &mut controller);

        assert_eq!(
            roles(&registry),
            vec![(0, TimerRole::Clocksource), (1, TimerRole::Clockevent)]
        );
        assert_eq!(controller.unmasked(), &[IRQ_TIMER1]);
    }

    #[test]
    fn test_unwired_line_falls_back_to_clocksource() {
        let mut registry = MockRegistry::new();
        let mut controller = MockInterruptController::new();
        let mask = IrqMask::new(IMPLEMENTED_IRQS.bits() & !(1 << IRQ_TIMER0.number()));

        let report = run(&CX_TIMERS, &CX_CLOCK_BINDINGS, mask, &mut registry, &mut controller);

        assert!(report.failures.is_empty());
        assert_eq!(
            roles(&registry),
            vec![(0, TimerRole::Clocksource), (1, TimerRole::Clockevent)]
        );
    }

    #[test]
    fn test_missing_timer_clock_skips_every_timer() {
        static SLOW: ClockSource = ClockSource::new("slow", 32_768);
        static BINDINGS: [ClockBinding; 1] = [ClockBinding::new("uart", None, &SLOW)];
        static SOURCES: [&ClockSource; 1] = [&SLOW];
        let mapped = RegionMapper::new(&IO_REGIONS)
            .map(&mut MockMapper::new())
            .unwrap();
        let mut controller = MockInterruptController::new();
        let mut interrupts = InterruptBringup::new(IMPLEMENTED_IRQS)
            .init(&mut controller, &mapped)
            .unwrap();
        let clocks = ClockRegistrar::new(&SOURCES, &BINDINGS).publish().unwrap();
        let mut registry = MockRegistry::new();

        let report =
            TimerRegistrar::new(&CX_TIMERS).register_all(&mut registry, &clocks, &mut interrupts);

        assert!(report.registered.is_empty());
        assert_eq!(report.failures.len(), 2);
        assert!(matches!(
            report.failures[0].1,
            BringupError::ClockNotFound { .. }
        ));
        assert!(registry.attempted().is_empty());
        assert!(interrupts.claimed().is_empty());
    }

    #[test]
    fn test_rejected_timers_release_the_tick_line() {
        let mut registry = MockRegistry::new().reject(TIMER_DEVICE);
        let mut controller = MockInterruptController::new();

        let report = run(
            &CX_TIMERS,
            &CX_CLOCK_BINDINGS,
            IMPLEMENTED_IRQS,
            &mut registry,
            &mut controller,
        );

        assert_eq!(report.failures.len(), 2);
        // each timer tried for the tick in turn, each line masked again
        assert_eq!(controller.unmasked(), &[IRQ_TIMER0, IRQ_TIMER1]);
        assert_eq!(controller.masked(), &[IRQ_TIMER0, IRQ_TIMER1]);
    }
}
