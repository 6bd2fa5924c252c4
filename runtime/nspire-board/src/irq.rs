//! IRQ Handling - Interrupt controller bring-up and line claiming
//!
//! The Nspire routes every peripheral through a single vectored interrupt
//! controller with 32 lines, not all of which are wired. Bring-up hands the
//! controller its base address and the implemented-lines mask; afterwards the
//! only way to unmask a line is through [`ActiveInterrupts::claim`], which
//! refuses lines outside the mask.

use alloc::vec::Vec;
use log::{debug, error, info};

use crate::mmio::MappedRegions;
use crate::resources::VIC_REGION;
use crate::{BringupError, PlatformError, Result};

/// Number of vectors on the controller
pub const VIC_LINES: u8 = 32;

/// A hardware interrupt vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterruptLine(u8);

impl InterruptLine {
    pub const fn new(line: u8) -> Self {
        Self(line)
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

/// Set of lines the hardware actually wires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqMask(u32);

impl IrqMask {
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, line: InterruptLine) -> bool {
        line.0 < VIC_LINES && self.0 & (1 << line.0) != 0
    }
}

/// Interrupt controller driver of the operating environment
pub trait InterruptController {
    /// Initialize the controller; lines outside `implemented` stay masked
    fn init(&mut self, base: usize, implemented: IrqMask)
        -> core::result::Result<(), PlatformError>;

    fn unmask(&mut self, line: InterruptLine);

    fn mask(&mut self, line: InterruptLine);
}

/// Early-boot controller bring-up
pub struct InterruptBringup {
    implemented: IrqMask,
}

impl InterruptBringup {
    pub fn new(implemented: IrqMask) -> Self {
        Self { implemented }
    }

    /// Initialize the controller at its mapped window
    ///
    /// Requires [`MappedRegions`], so it cannot run before the region mapper.
    pub fn init<'a>(
        self,
        controller: &'a mut dyn InterruptController,
        mapped: &MappedRegions,
    ) -> Result<ActiveInterrupts<'a>> {
        let base = mapped.virtual_base(VIC_REGION)?;

        controller.init(base, self.implemented).map_err(|err| {
            error!("Interrupt controller at {:#x} failed to initialize: {}", base, err);
            BringupError::ControllerFailure(err.0)
        })?;

        info!(
            "Interrupt controller up at {:#x}, implemented mask {:#010x}",
            base,
            self.implemented.bits()
        );

        Ok(ActiveInterrupts {
            controller,
            implemented: self.implemented,
            claimed: Vec::new(),
        })
    }
}

/// Initialized controller and the lines claimed from it so far
pub struct ActiveInterrupts<'a> {
    controller: &'a mut dyn InterruptController,
    implemented: IrqMask,
    claimed: Vec<InterruptLine>,
}

impl<'a> ActiveInterrupts<'a> {
    /// Claim and unmask a line
    ///
    /// # Errors
    /// - `InvalidInterruptLine` if the line is not wired on this board
    /// - `IrqAlreadyClaimed` if another device owns it
    pub fn claim(&mut self, line: InterruptLine) -> Result<()> {
        if !self.implemented.contains(line) {
            return Err(BringupError::InvalidInterruptLine(line.number()));
        }
        if self.claimed.contains(&line) {
            return Err(BringupError::IrqAlreadyClaimed(line.number()));
        }

        self.controller.unmask(line);
        self.claimed.push(line);
        debug!("IRQ {} claimed", line.number());
        Ok(())
    }

    /// Mask a claimed line again and forget the claim
    pub fn release(&mut self, line: InterruptLine) {
        if let Some(pos) = self.claimed.iter().position(|l| *l == line) {
            self.claimed.remove(pos);
            self.controller.mask(line);
            debug!("IRQ {} released", line.number());
        }
    }

    pub fn is_claimed(&self, line: InterruptLine) -> bool {
        self.claimed.contains(&line)
    }

    pub fn claimed(&self) -> &[InterruptLine] {
        &self.claimed
    }

    pub fn implemented(&self) -> IrqMask {
        self.implemented
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::{AccessClass, MemoryRegion, RegionMapper};
    use crate::mock::{MockInterruptController, MockMapper};

    fn mapped() -> MappedRegions {
        static TABLE: [MemoryRegion; 1] = [MemoryRegion::new(
            VIC_REGION,
            0xDC00_0000,
            0xFEF2_0000,
            0x1000,
            AccessClass::Device,
        )];
        RegionMapper::new(&TABLE).map(&mut MockMapper::new()).unwrap()
    }

    #[test]
    fn test_mask_contains() {
        let mask = IrqMask::new(0b1010);
        assert!(!mask.contains(InterruptLine::new(0)));
        assert!(mask.contains(InterruptLine::new(1)));
        assert!(mask.contains(InterruptLine::new(3)));
        assert!(!mask.contains(InterruptLine::new(32)));
        assert!(!IrqMask::new(u32::MAX).contains(InterruptLine::new(200)));
    }

    #[test]
    fn test_init_uses_mapped_base() {
        let mut controller = MockInterruptController::new();
        let mapped = mapped();
        InterruptBringup::new(IrqMask::new(0xFF))
            .init(&mut controller, &mapped)
            .unwrap();

        assert_eq!(controller.initialized(), Some((0xFEF2_0000, IrqMask::new(0xFF))));
    }

    #[test]
    fn test_init_failure_is_reported() {
        let mut controller = MockInterruptController::new().failing();
        let mapped = mapped();
        let result = InterruptBringup::new(IrqMask::new(0xFF)).init(&mut controller, &mapped);
        assert!(matches!(result, Err(BringupError::ControllerFailure(_))));
    }

    #[test]
    fn test_claim_rejects_unwired_line() {
        let mut controller = MockInterruptController::new();
        let mapped = mapped();
        let mut active = InterruptBringup::new(IrqMask::new(1 << 16))
            .init(&mut controller, &mapped)
            .unwrap();

        assert!(active.claim(InterruptLine::new(16)).is_ok());
        assert!(matches!(
            active.claim(InterruptLine::new(17)),
            Err(BringupError::InvalidInterruptLine(17))
        ));
        assert!(matches!(
            active.claim(InterruptLine::new(16)),
            Err(BringupError::IrqAlreadyClaimed(16))
        ));
        drop(active);

        assert_eq!(controller.unmasked(), &[InterruptLine::new(16)]);
    }

    #[test]
    fn test_never_unmasks_outside_mask() {
        let masks = [0u32, 1, 0x8000_0001, 0x003F_FFFF, 0xAAAA_AAAA, u32::MAX];
        for bits in masks {
            let mut controller = MockInterruptController::new();
            let mapped = mapped();
            let mut active = InterruptBringup::new(IrqMask::new(bits))
                .init(&mut controller, &mapped)
                .unwrap();

            for line in 0..=u8::MAX {
                let _ = active.claim(InterruptLine::new(line));
            }
            drop(active);

            for line in controller.unmasked() {
                assert!(line.number() < VIC_LINES);
                assert!(bits & (1 << line.number()) != 0);
            }
            assert_eq!(controller.unmasked().len() as u32, bits.count_ones());
        }
    }

    #[test]
    fn test_release_masks_line() {
        let mut controller = MockInterruptController::new();
        let mapped = mapped();
        let mut active = InterruptBringup::new(IrqMask::new(0xFF))
            .init(&mut controller, &mapped)
            .unwrap();

        active.claim(InterruptLine::new(3)).unwrap();
        active.release(InterruptLine::new(3));
        assert!(!active.is_claimed(InterruptLine::new(3)));

        // claimable again after release
        active.claim(InterruptLine::new(3)).unwrap();
        drop(active);

        assert_eq!(controller.masked(), &[InterruptLine::new(3)]);
    }
}
