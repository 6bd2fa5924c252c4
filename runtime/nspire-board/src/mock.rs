//! In-memory platform for tests and host tooling
//!
//! Implements every interface bring-up consumes and records what was asked
//! of it. Enabled for unit tests and with the `mock` feature.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use spin::Mutex;

use crate::device::{DeviceConfig, DeviceDescriptor, DeviceHandle, DeviceRegistry};
use crate::display::DisplayBoardOps;
use crate::framebuffer::{AddressSpace, DmaAllocator, DmaBlock, FramebufferBuffer};
use crate::irq::{InterruptController, InterruptLine, IrqMask};
use crate::mmio::{
    align_up, ranges_overlap, MapFlags, MemoryRegion, RegisterAccessor, VirtualMapper, PAGE_SIZE,
};
use crate::{Platform, PlatformError};

/// Register file backed by a map; unwritten registers read as 0
#[derive(Debug, Default)]
pub struct MockRegisters {
    values: Mutex<BTreeMap<usize, u32>>,
    writes: Mutex<Vec<(usize, u32)>>,
}

impl MockRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a register without logging a write
    pub fn with(self, offset: usize, value: u32) -> Self {
        self.values.lock().insert(offset, value);
        self
    }

    pub fn value(&self, offset: usize) -> u32 {
        self.values.lock().get(&offset).copied().unwrap_or(0)
    }

    /// Every write in order, as `(offset, value)`
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.writes.lock().clone()
    }
}

impl RegisterAccessor for MockRegisters {
    fn read32(&self, offset: usize) -> u32 {
        self.value(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.values.lock().insert(offset, value);
        self.writes.lock().push((offset, value));
    }
}

#[derive(Debug, Default)]
pub struct MockMapper {
    mapped: Vec<&'static str>,
    windows: Vec<(usize, usize)>,
    flags: Vec<MapFlags>,
    fail_on: Option<&'static str>,
}

impl MockMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail when asked to map the region called `name`
    pub fn fail_on(mut self, name: &'static str) -> Self {
        self.fail_on = Some(name);
        self
    }

    pub fn mapped(&self) -> &[&'static str] {
        &self.mapped
    }

    pub fn flags(&self) -> &[MapFlags] {
        &self.flags
    }
}

impl VirtualMapper for MockMapper {
    fn map_region(&mut self, region: &MemoryRegion, flags: MapFlags) -> Result<(), PlatformError> {
        if self.fail_on == Some(region.name) {
            return Err(PlatformError::new("no page tables left"));
        }
        self.mapped.push(region.name);
        self.windows.push((region.virtual_base, region.length));
        self.flags.push(flags);
        Ok(())
    }

    fn is_mapped(&self, virtual_base: usize, length: usize) -> bool {
        self.windows
            .iter()
            .any(|&(base, len)| ranges_overlap(base, len, virtual_base, length))
    }
}

#[derive(Debug, Default)]
pub struct MockInterruptController {
    initialized: Option<(usize, IrqMask)>,
    unmasked: Vec<InterruptLine>,
    masked: Vec<InterruptLine>,
    fail: bool,
}

impl MockInterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Arguments of the `init` call, if any
    pub fn initialized(&self) -> Option<(usize, IrqMask)> {
        self.initialized
    }

    /// Every unmask call in order
    pub fn unmasked(&self) -> &[InterruptLine] {
        &self.unmasked
    }

    /// Every mask call in order
    pub fn masked(&self) -> &[InterruptLine] {
        &self.masked
    }
}

impl InterruptController for MockInterruptController {
    fn init(&mut self, base: usize, implemented: IrqMask) -> Result<(), PlatformError> {
        if self.fail {
            return Err(PlatformError::new("controller did not respond"));
        }
        self.initialized = Some((base, implemented));
        Ok(())
    }

    fn unmask(&mut self, line: InterruptLine) {
        self.unmasked.push(line);
    }

    fn mask(&mut self, line: InterruptLine) {
        self.masked.push(line);
    }
}

#[derive(Debug, Default)]
pub struct MockRegistry {
    registered: Vec<(DeviceHandle, DeviceDescriptor)>,
    attempted: Vec<&'static str>,
    reject: Vec<&'static str>,
    next_handle: u32,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse descriptors called `name`
    pub fn reject(mut self, name: &'static str) -> Self {
        self.reject.push(name);
        self
    }

    /// Names of accepted descriptors in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.registered.iter().map(|(_, d)| d.name).collect()
    }

    /// Names of every descriptor offered, accepted or not
    pub fn attempted(&self) -> Vec<&'static str> {
        self.attempted.clone()
    }

    /// Accepted descriptors in registration order
    pub fn descriptors(&self) -> impl Iterator<Item = &DeviceDescriptor> + '_ {
        self.registered.iter().map(|(_, d)| d)
    }

    pub fn descriptor(&self, name: &str) -> Option<&DeviceDescriptor> {
        self.registered
            .iter()
            .map(|(_, d)| d)
            .find(|d| d.name == name)
    }

    /// Take the display callbacks out of the registered `lcd` descriptor
    pub fn take_display(&mut self) -> Option<Box<dyn DisplayBoardOps>> {
        let (_, lcd) = self.registered.iter_mut().find(|(_, d)| d.name == "lcd")?;
        match lcd.config.take() {
            Some(DeviceConfig::Display(ops)) => Some(ops),
            other => {
                lcd.config = other;
                None
            }
        }
    }
}

impl DeviceRegistry for MockRegistry {
    fn register(&mut self, descriptor: DeviceDescriptor) -> Result<DeviceHandle, PlatformError> {
        self.attempted.push(descriptor.name);
        if self.reject.contains(&descriptor.name) {
            return Err(PlatformError::new("driver refused the device"));
        }
        let handle = DeviceHandle(self.next_handle);
        self.next_handle += 1;
        self.registered.push((handle, descriptor));
        Ok(handle)
    }
}

/// Bump allocator that never reuses addresses
#[derive(Debug)]
pub struct MockDma {
    next_virtual: usize,
    next_dma: usize,
    allocations: usize,
    freed: Vec<(usize, usize, usize)>,
    exhausted: bool,
    misaligned: bool,
}

impl MockDma {
    pub fn new() -> Self {
        Self {
            next_virtual: 0xFFC0_0000,
            next_dma: 0x1100_0000,
            allocations: 0,
            freed: Vec::new(),
            exhausted: false,
            misaligned: false,
        }
    }

    /// Every allocation fails
    pub fn exhausted(mut self) -> Self {
        self.exhausted = true;
        self
    }

    /// Hand out blocks that are not page aligned
    pub fn misaligned(mut self) -> Self {
        self.misaligned = true;
        self
    }

    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Every free call as `(virtual_addr, dma_addr, length)`
    pub fn freed(&self) -> &[(usize, usize, usize)] {
        &self.freed
    }
}

impl Default for MockDma {
    fn default() -> Self {
        Self::new()
    }
}

impl DmaAllocator for MockDma {
    fn allocate_coherent(&mut self, length: usize) -> Result<DmaBlock, PlatformError> {
        if self.exhausted {
            return Err(PlatformError::new("coherent pool exhausted"));
        }
        let skew = if self.misaligned { 0x40 } else { 0 };
        let block = DmaBlock {
            virtual_addr: self.next_virtual + skew,
            dma_addr: self.next_dma + skew,
        };
        let span = align_up(length) + PAGE_SIZE;
        self.next_virtual += span;
        self.next_dma += span;
        self.allocations += 1;
        Ok(block)
    }

    fn free_coherent(&mut self, virtual_addr: usize, dma_addr: usize, length: usize) {
        self.freed.push((virtual_addr, dma_addr, length));
    }
}

#[derive(Debug)]
pub struct MockAddressSpace {
    next: usize,
    mapped: Vec<FramebufferBuffer>,
    fail: bool,
}

impl MockAddressSpace {
    /// Address space handing out mappings from `base` upwards
    pub fn new(base: usize) -> Self {
        Self {
            next: base,
            mapped: Vec::new(),
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Buffers mapped so far
    pub fn mapped(&self) -> &[FramebufferBuffer] {
        &self.mapped
    }
}

impl AddressSpace for MockAddressSpace {
    fn map_coherent(&mut self, buffer: &FramebufferBuffer) -> Result<usize, PlatformError> {
        if self.fail {
            return Err(PlatformError::new("address space full"));
        }
        let addr = self.next;
        self.next += align_up(buffer.length);
        self.mapped.push(*buffer);
        Ok(addr)
    }
}

/// The three boot-time services bundled together
#[derive(Debug, Default)]
pub struct MockPlatform {
    pub mapper: MockMapper,
    pub interrupts: MockInterruptController,
    pub registry: MockRegistry,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn platform(&mut self) -> Platform<'_> {
        Platform {
            mapper: &mut self.mapper,
            interrupts: &mut self.interrupts,
            registry: &mut self.registry,
        }
    }
}
