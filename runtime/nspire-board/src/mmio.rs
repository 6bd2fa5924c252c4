//! MMIO - Register windows, early mapping and register access
//!
//! This module owns the early-boot mapping of the board's register windows
//! (the region mapper) and the register accessor abstraction used by every
//! component that pokes hardware directly.
//!
//! Register access goes through [`RegisterAccessor`] so the restart handler and
//! the backlight endpoint can be exercised against mock registers on the host.

use alloc::vec::Vec;
use bitflags::bitflags;
use core::ptr::{read_volatile, write_volatile};
use log::{debug, error, info};

use crate::{BringupError, PlatformError, Result};

/// Page size (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Memory attributes of a mapped window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessClass {
    /// Strongly ordered device memory: never cached or buffered
    Device,
    /// Ordinary RAM
    Normal,
}

bitflags! {
    /// Page attributes requested from the virtual mapper
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MapFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
        const CACHED = 1 << 3;
        const BUFFERED = 1 << 4;
    }
}

impl AccessClass {
    /// Mapping attributes for this class
    pub fn map_flags(self) -> MapFlags {
        match self {
            AccessClass::Device => MapFlags::READ | MapFlags::WRITE,
            AccessClass::Normal => {
                MapFlags::READ | MapFlags::WRITE | MapFlags::CACHED | MapFlags::BUFFERED
            }
        }
    }
}

/// A physical register window and the virtual address it lives at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub name: &'static str,
    pub physical_base: usize,
    pub virtual_base: usize,
    pub length: usize,
    pub access_class: AccessClass,
}

impl MemoryRegion {
    pub const fn new(
        name: &'static str,
        physical_base: usize,
        virtual_base: usize,
        length: usize,
        access_class: AccessClass,
    ) -> Self {
        Self {
            name,
            physical_base,
            virtual_base,
            length,
            access_class,
        }
    }

    pub fn physical_end(&self) -> Option<usize> {
        self.physical_base.checked_add(self.length)
    }

    pub fn virtual_end(&self) -> Option<usize> {
        self.virtual_base.checked_add(self.length)
    }

    /// Whether `[addr, addr + len)` lies inside the physical window
    pub fn contains_physical(&self, addr: usize, len: usize) -> bool {
        match (addr.checked_add(len), self.physical_end()) {
            (Some(end), Some(region_end)) => addr >= self.physical_base && end <= region_end,
            _ => false,
        }
    }
}

/// Virtual-mapping service of the operating environment
pub trait VirtualMapper {
    /// Establish the mapping for one window
    fn map_region(
        &mut self,
        region: &MemoryRegion,
        flags: MapFlags,
    ) -> core::result::Result<(), PlatformError>;

    /// Whether any page of `[virtual_base, virtual_base + length)` is mapped
    fn is_mapped(&self, virtual_base: usize, length: usize) -> bool;
}

/// Region mapper - maps the static register windows at early boot
///
/// Mapping happens once per boot. A pass over windows the mapper already
/// holds is refused with [`BringupError::AlreadyMapped`] before anything is
/// touched.
pub struct RegionMapper<'a> {
    regions: &'a [MemoryRegion],
}

impl<'a> RegionMapper<'a> {
    pub fn new(regions: &'a [MemoryRegion]) -> Self {
        Self { regions }
    }

    /// Map every region, aborting at the first failure
    ///
    /// The table is validated, and checked against existing mappings, before
    /// the first mapping is attempted. The first failing region aborts the
    /// pass with [`BringupError::MappingFailure`]; windows mapped before it
    /// stay mapped.
    pub fn map(self, mapper: &mut dyn VirtualMapper) -> Result<MappedRegions> {
        validate_regions(self.regions)?;

        if let Some(region) = self
            .regions
            .iter()
            .find(|r| mapper.is_mapped(r.virtual_base, r.length))
        {
            error!(
                "Region {} at {:#x} is already mapped, refusing to map again",
                region.name, region.virtual_base
            );
            return Err(BringupError::AlreadyMapped {
                region: region.name,
                virt: region.virtual_base,
            });
        }

        let mut mapped = Vec::with_capacity(self.regions.len());
        for region in self.regions {
            let flags = region.access_class.map_flags();
            if let Err(err) = mapper.map_region(region, flags) {
                error!(
                    "Mapping {} ({:#x} -> {:#x}) failed: {}",
                    region.name, region.physical_base, region.virtual_base, err
                );
                return Err(BringupError::MappingFailure {
                    region: region.name,
                    phys: region.physical_base,
                    reason: err.0,
                });
            }
            debug!(
                "Mapped {}: phys {:#x} -> virt {:#x} ({:#x} bytes, {:?})",
                region.name, region.physical_base, region.virtual_base, region.length, flags
            );
            mapped.push(*region);
        }

        info!("Mapped {} register windows", mapped.len());
        Ok(MappedRegions { regions: mapped })
    }
}

/// Proof that the register windows are mapped
#[derive(Debug)]
pub struct MappedRegions {
    regions: Vec<MemoryRegion>,
}

impl MappedRegions {
    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    pub fn get(&self, name: &str) -> Option<&MemoryRegion> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Virtual address of a mapped window
    pub fn virtual_base(&self, name: &'static str) -> Result<usize> {
        self.get(name)
            .map(|r| r.virtual_base)
            .ok_or_else(|| BringupError::MappingFailure {
                region: name,
                phys: 0,
                reason: "region is not part of the mapped table".into(),
            })
    }

    /// Register accessor for `size` bytes at `offset` inside a mapped window
    ///
    /// # Safety
    /// The mapping must be live in the current address space, which is only
    /// true on the target after a real mapper ran.
    pub unsafe fn registers(
        &self,
        name: &'static str,
        offset: usize,
        size: usize,
    ) -> Result<MmioRegisters> {
        let region = self.get(name).ok_or_else(|| BringupError::MappingFailure {
            region: name,
            phys: 0,
            reason: "region is not part of the mapped table".into(),
        })?;
        if offset.checked_add(size).map_or(true, |end| end > region.length) {
            return Err(BringupError::ResourceConflict(alloc::format!(
                "register block {:#x}+{:#x} exceeds region {}",
                offset,
                size,
                name
            )));
        }
        // SAFETY: caller guarantees the window is mapped; bounds checked above
        Ok(unsafe { MmioRegisters::new(region.virtual_base + offset, size) })
    }
}

/// Check the static region table
///
/// Every region must be page aligned, a whole number of pages long, and
/// disjoint from every other region in both physical and virtual space.
pub fn validate_regions(regions: &[MemoryRegion]) -> Result<()> {
    for region in regions {
        if region.length == 0 || region.length % PAGE_SIZE != 0 {
            return Err(BringupError::ResourceConflict(alloc::format!(
                "region {} length {:#x} is not a multiple of the page size",
                region.name,
                region.length
            )));
        }
        if !is_aligned(region.physical_base) || !is_aligned(region.virtual_base) {
            return Err(BringupError::ResourceConflict(alloc::format!(
                "region {} is not page aligned",
                region.name
            )));
        }
        if region.physical_end().is_none() || region.virtual_end().is_none() {
            return Err(BringupError::ResourceConflict(alloc::format!(
                "region {} wraps the address space",
                region.name
            )));
        }
    }

    for (i, a) in regions.iter().enumerate() {
        for b in &regions[i + 1..] {
            if ranges_overlap(a.physical_base, a.length, b.physical_base, b.length) {
                return Err(BringupError::ResourceConflict(alloc::format!(
                    "regions {} and {} overlap physically",
                    a.name,
                    b.name
                )));
            }
            if ranges_overlap(a.virtual_base, a.length, b.virtual_base, b.length) {
                return Err(BringupError::ResourceConflict(alloc::format!(
                    "regions {} and {} overlap virtually",
                    a.name,
                    b.name
                )));
            }
        }
    }

    Ok(())
}

/// Half-open range intersection
pub fn ranges_overlap(a_start: usize, a_len: usize, b_start: usize, b_len: usize) -> bool {
    let a_end = a_start.saturating_add(a_len);
    let b_end = b_start.saturating_add(b_len);
    a_start < b_end && b_start < a_end
}

/// Base + offset register access
pub trait RegisterAccessor {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);
}

impl<T: RegisterAccessor + ?Sized> RegisterAccessor for &T {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value)
    }
}

/// Volatile accessor over a mapped register block
#[derive(Debug)]
pub struct MmioRegisters {
    base: usize,
    size: usize,
}

impl MmioRegisters {
    /// Create an accessor for `size` bytes of registers at `base`
    ///
    /// # Safety
    /// `base..base + size` must be mapped device memory for the lifetime of
    /// the accessor.
    pub const unsafe fn new(base: usize, size: usize) -> Self {
        Self { base, size }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl RegisterAccessor for MmioRegisters {
    fn read32(&self, offset: usize) -> u32 {
        debug_assert!(offset + 4 <= self.size);
        debug_assert!(offset % 4 == 0);
        // SAFETY: construction guarantees the block is mapped
        unsafe { read_volatile((self.base + offset) as *const u32) }
    }

    fn write32(&self, offset: usize, value: u32) {
        debug_assert!(offset + 4 <= self.size);
        debug_assert!(offset % 4 == 0);
        // SAFETY: construction guarantees the block is mapped
        unsafe { write_volatile((self.base + offset) as *mut u32, value) }
    }
}

/// Round a length up to whole pages
pub fn align_up(len: usize) -> usize {
    len.next_multiple_of(PAGE_SIZE)
}

pub fn is_aligned(addr: usize) -> bool {
    addr % PAGE_SIZE == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMapper;

    const TABLE: [MemoryRegion; 2] = [
        MemoryRegion::new("apb", 0x9000_0000, 0xFEE0_0000, 0x11_0000, AccessClass::Device),
        MemoryRegion::new("vic", 0xDC00_0000, 0xFEF2_0000, 0x1000, AccessClass::Device),
    ];

    #[test]
    fn test_framebuffer_length_rounds_to_pages() {
        // 153600 bytes of RGB565 span 37.5 pages
        assert_eq!(align_up(320 * 240 * 2), 38 * PAGE_SIZE);
        assert_eq!(align_up(PAGE_SIZE), PAGE_SIZE);
        assert!(is_aligned(0x1100_0000));
        assert!(!is_aligned(0x1100_0040));
    }

    #[test]
    fn test_device_regions_are_uncached() {
        let flags = AccessClass::Device.map_flags();
        assert!(!flags.contains(MapFlags::CACHED));
        assert!(!flags.contains(MapFlags::BUFFERED));
        assert!(AccessClass::Normal.map_flags().contains(MapFlags::CACHED));
    }

    #[test]
    fn test_ranges_overlap() {
        assert!(ranges_overlap(0x1000, 0x1000, 0x1800, 0x1000));
        assert!(!ranges_overlap(0x1000, 0x1000, 0x2000, 0x1000));
        assert!(ranges_overlap(0x1000, 0x4000, 0x2000, 0x1000));
    }

    #[test]
    fn test_validate_accepts_disjoint_table() {
        assert!(validate_regions(&TABLE).is_ok());
    }

    #[test]
    fn test_validate_rejects_virtual_overlap() {
        let table = [
            TABLE[0],
            MemoryRegion::new("vic", 0xDC00_0000, 0xFEF0_0000, 0x1000, AccessClass::Device),
        ];
        let result = validate_regions(&table);
        assert!(matches!(result, Err(BringupError::ResourceConflict(_))));
    }

    #[test]
    fn test_validate_rejects_physical_overlap() {
        let table = [
            TABLE[0],
            MemoryRegion::new("uart", 0x9002_0000, 0xFEF2_0000, 0x1000, AccessClass::Device),
        ];
        assert!(matches!(
            validate_regions(&table),
            Err(BringupError::ResourceConflict(_))
        ));
    }

    #[test]
    fn test_validate_rejects_partial_page() {
        let table = [MemoryRegion::new(
            "odd",
            0x9000_0000,
            0xFEE0_0000,
            0x800,
            AccessClass::Device,
        )];
        assert!(matches!(
            validate_regions(&table),
            Err(BringupError::ResourceConflict(_))
        ));
    }

    #[test]
    fn test_map_all_regions() {
        let mut mapper = MockMapper::new();
        let mapped = RegionMapper::new(&TABLE).map(&mut mapper).unwrap();

        assert_eq!(mapped.regions().len(), 2);
        assert_eq!(mapped.virtual_base("vic").unwrap(), 0xFEF2_0000);
        assert_eq!(mapper.mapped(), &["apb", "vic"]);
        assert!(mapper
            .flags()
            .iter()
            .all(|f| !f.contains(MapFlags::CACHED)));
    }

    #[test]
    fn test_map_aborts_at_first_failure() {
        let mut mapper = MockMapper::new().fail_on("vic");
        let result = RegionMapper::new(&TABLE).map(&mut mapper);

        assert!(matches!(
            result,
            Err(BringupError::MappingFailure { region: "vic", .. })
        ));
        // the window before the failure stays mapped
        assert_eq!(mapper.mapped(), &["apb"]);
    }

    #[test]
    fn test_second_pass_is_refused() {
        let mut mapper = MockMapper::new();
        RegionMapper::new(&TABLE).map(&mut mapper).unwrap();

        let result = RegionMapper::new(&TABLE).map(&mut mapper);

        assert!(matches!(
            result,
            Err(BringupError::AlreadyMapped { region: "apb", virt: 0xFEE0_0000 })
        ));
        assert_eq!(mapper.mapped(), &["apb", "vic"]);
    }

    #[test]
    fn test_overlap_with_existing_mapping_is_refused() {
        let mut mapper = MockMapper::new();
        RegionMapper::new(&TABLE[1..]).map(&mut mapper).unwrap();

        let result = RegionMapper::new(&TABLE).map(&mut mapper);

        assert!(matches!(
            result,
            Err(BringupError::AlreadyMapped { region: "vic", .. })
        ));
        assert_eq!(mapper.mapped(), &["vic"]);
    }

    #[test]
    fn test_invalid_table_maps_nothing() {
        let table = [TABLE[0], TABLE[0]];
        let mut mapper = MockMapper::new();
        assert!(RegionMapper::new(&table).map(&mut mapper).is_err());
        assert!(mapper.mapped().is_empty());
    }

    #[test]
    fn test_register_block_bounds() {
        let mut mapper = MockMapper::new();
        let mapped = RegionMapper::new(&TABLE).map(&mut mapper).unwrap();

        let regs = unsafe { mapped.registers("apb", 0xA0000, 0x1000) }.unwrap();
        assert_eq!(regs.base(), 0xFEE0_0000 + 0xA0000);

        let result = unsafe { mapped.registers("vic", 0x800, 0x1000) };
        assert!(matches!(result, Err(BringupError::ResourceConflict(_))));
    }
}
