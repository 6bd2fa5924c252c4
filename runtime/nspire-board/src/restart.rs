//! Restart handler
//!
//! The misc block has a hardware-reset register; writing the trigger value
//! resets the SoC immediately.

use log::warn;

use crate::mmio::{MappedRegions, MmioRegisters, RegisterAccessor};
use crate::resources::{APB_MISC, APB_REGION, APB_SLOT_SIZE, HWRESET_TRIGGER, MISC_HWRESET};
use crate::Result;

/// Asserts the hardware reset line
pub struct RestartHandler<R: RegisterAccessor> {
    misc: R,
}

impl RestartHandler<MmioRegisters> {
    /// Handler over the misc block of the mapped APB window
    ///
    /// # Safety
    /// The APB window must be live in the current address space.
    pub unsafe fn from_mapped(mapped: &MappedRegions) -> Result<Self> {
        // SAFETY: forwarded to the caller
        let misc = unsafe { mapped.registers(APB_REGION, APB_MISC, APB_SLOT_SIZE)? };
        Ok(Self::new(misc))
    }
}

impl<R: RegisterAccessor> RestartHandler<R> {
    /// `misc` must address the misc register block
    pub fn new(misc: R) -> Self {
        Self { misc }
    }

    /// Reset the board
    ///
    /// Returns only if the hardware ignored the write; any fallback is up to
    /// the caller.
    pub fn restart(&self) {
        warn!("Asserting hardware reset");
        self.misc.write32(MISC_HWRESET, HWRESET_TRIGGER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::RegionMapper;
    use crate::mock::{MockMapper, MockRegisters};
    use crate::resources::{APB_VIRT_BASE, IO_REGIONS};
    use crate::BringupError;

    #[test]
    fn test_restart_writes_trigger() {
        let regs = MockRegisters::new();
        RestartHandler::new(&regs).restart();
        assert_eq!(regs.writes(), vec![(0x08, 2)]);
    }

    #[test]
    fn test_from_mapped_addresses_misc_block() {
        let mapped = RegionMapper::new(&IO_REGIONS)
            .map(&mut MockMapper::new())
            .unwrap();

        // only builds the accessor, no register is touched
        let handler = unsafe { RestartHandler::from_mapped(&mapped) }.unwrap();
        assert_eq!(handler.misc.base(), APB_VIRT_BASE + APB_MISC);
        assert_eq!(handler.misc.size(), APB_SLOT_SIZE);
    }

    #[test]
    fn test_from_mapped_needs_apb_window() {
        let mapped = RegionMapper::new(&IO_REGIONS[1..])
            .map(&mut MockMapper::new())
            .unwrap();

        let result = unsafe { RestartHandler::from_mapped(&mapped) };
        assert!(matches!(
            result,
            Err(BringupError::MappingFailure { region: "apb", .. })
        ));
    }
}
