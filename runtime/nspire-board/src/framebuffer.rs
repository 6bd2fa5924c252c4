//! Framebuffer lifecycle - the DMA-coherent scanout buffer
//!
//! The display controller scans out of a single DMA-coherent block. The block
//! is allocated lazily by the display driver, may be mapped into process
//! address spaces any number of times, and is freed on teardown:
//!
//! ```text
//! Unallocated ──allocate──▶ Allocated ──free──▶ Freed
//!                            │    ▲               │
//!                            └────┘ expose        └──allocate──▶ Allocated
//! ```
//!
//! A stale `dma_addr` handed to the controller after `free` corrupts memory
//! that now belongs to someone else, so every out-of-order call is an error.
//! All transitions run under one lock per manager.

use log::{debug, error, info};
use spin::Mutex;
use thiserror::Error;

use crate::mmio::is_aligned;
use crate::PlatformError;

/// A DMA-coherent block as returned by the allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaBlock {
    pub virtual_addr: usize,
    pub dma_addr: usize,
}

/// DMA-coherent allocator of the operating environment
pub trait DmaAllocator {
    fn allocate_coherent(&mut self, length: usize) -> Result<DmaBlock, PlatformError>;

    fn free_coherent(&mut self, virtual_addr: usize, dma_addr: usize, length: usize);
}

/// A process address space the framebuffer can be exposed to
pub trait AddressSpace {
    /// Map the buffer's DMA memory, returning the address in the target space
    fn map_coherent(&mut self, buffer: &FramebufferBuffer) -> Result<usize, PlatformError>;
}

/// Addresses of an allocated framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferBuffer {
    pub virtual_addr: usize,
    pub dma_addr: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferState {
    Unallocated,
    Allocated,
    Freed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramebufferError {
    #[error("DMA-coherent allocation of {requested} bytes failed")]
    OutOfMemory { requested: usize },

    #[error("Framebuffer {op} not allowed while {state:?}")]
    InvalidState {
        op: &'static str,
        state: FramebufferState,
    },

    #[error("DMA address {dma_addr:#x} is not page aligned")]
    Misaligned { dma_addr: usize },

    #[error("Failed to map framebuffer: {0}")]
    MapFailed(PlatformError),
}

#[derive(Debug)]
enum Slot {
    Unallocated,
    Allocated {
        buffer: FramebufferBuffer,
        exposures: u32,
    },
    Freed,
}

impl Slot {
    fn state(&self) -> FramebufferState {
        match self {
            Slot::Unallocated => FramebufferState::Unallocated,
            Slot::Allocated { .. } => FramebufferState::Allocated,
            Slot::Freed => FramebufferState::Freed,
        }
    }
}

/// Owner of the single scanout buffer
#[derive(Debug)]
pub struct FramebufferManager {
    length: usize,
    slot: Mutex<Slot>,
}

impl FramebufferManager {
    /// Manager for a buffer of exactly `length` bytes
    pub const fn new(length: usize) -> Self {
        Self {
            length,
            slot: Mutex::new(Slot::Unallocated),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn state(&self) -> FramebufferState {
        self.slot.lock().state()
    }

    /// Current buffer, if allocated
    pub fn buffer(&self) -> Option<FramebufferBuffer> {
        match *self.slot.lock() {
            Slot::Allocated { buffer, .. } => Some(buffer),
            _ => None,
        }
    }

    /// How many times the current buffer was exposed to an address space
    pub fn exposures(&self) -> u32 {
        match *self.slot.lock() {
            Slot::Allocated { exposures, .. } => exposures,
            _ => 0,
        }
    }

    /// Allocate the buffer
    ///
    /// Valid from `Unallocated` and `Freed`; after `Freed` this starts a new
    /// cycle with whatever addresses the allocator hands out.
    ///
    /// # Errors
    /// - `InvalidState` if a buffer is already allocated
    /// - `OutOfMemory` if the allocator fails (state unchanged)
    /// - `Misaligned` if the allocator returned a block that is not page
    ///   aligned (the block is given back, state unchanged)
    pub fn allocate(&self, dma: &mut dyn DmaAllocator) -> Result<FramebufferBuffer, FramebufferError> {
        let mut slot = self.slot.lock();
        if let Slot::Allocated { .. } = *slot {
            error!("Framebuffer allocate while already allocated");
            return Err(FramebufferError::InvalidState {
                op: "allocate",
                state: slot.state(),
            });
        }

        let block = dma.allocate_coherent(self.length).map_err(|err| {
            error!("Framebuffer allocation of {} bytes failed: {}", self.length, err);
            FramebufferError::OutOfMemory {
                requested: self.length,
            }
        })?;

        if !is_aligned(block.dma_addr) {
            dma.free_coherent(block.virtual_addr, block.dma_addr, self.length);
            return Err(FramebufferError::Misaligned {
                dma_addr: block.dma_addr,
            });
        }

        let buffer = FramebufferBuffer {
            virtual_addr: block.virtual_addr,
            dma_addr: block.dma_addr,
            length: self.length,
        };
        *slot = Slot::Allocated {
            buffer,
            exposures: 0,
        };

        info!(
            "Framebuffer allocated: {} bytes, virt {:#x}, dma {:#x}",
            buffer.length, buffer.virtual_addr, buffer.dma_addr
        );
        Ok(buffer)
    }

    /// Map the allocated buffer into `target`
    ///
    /// Uses the stored addresses and never reallocates.
    pub fn expose_to_address_space(
        &self,
        target: &mut dyn AddressSpace,
    ) -> Result<usize, FramebufferError> {
        let mut slot = self.slot.lock();
        let state = slot.state();
        let Slot::Allocated { buffer, exposures } = &mut *slot else {
            error!("Framebuffer expose while {:?}", state);
            return Err(FramebufferError::InvalidState { op: "expose", state });
        };

        let addr = target
            .map_coherent(buffer)
            .map_err(FramebufferError::MapFailed)?;
        *exposures += 1;

        debug!(
            "Framebuffer dma {:#x} exposed at {:#x} ({} mappings)",
            buffer.dma_addr, addr, exposures
        );
        Ok(addr)
    }

    /// Release the buffer back to the allocator
    pub fn free(&self, dma: &mut dyn DmaAllocator) -> Result<(), FramebufferError> {
        let mut slot = self.slot.lock();
        let state = slot.state();
        let Slot::Allocated { buffer, .. } = *slot else {
            error!("Framebuffer free while {:?}", state);
            return Err(FramebufferError::InvalidState { op: "free", state });
        };

        dma.free_coherent(buffer.virtual_addr, buffer.dma_addr, buffer.length);
        *slot = Slot::Freed;

        info!("Framebuffer at dma {:#x} freed", buffer.dma_addr);
        Ok(())
    }
}
